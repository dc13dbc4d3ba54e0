//! Message (de)serialization: the lexer and value codec composed into the
//! wire form of a [`Message`].
//!
//! A response's free-form reason text (e.g. `"send binary data"` in
//! `204- send binary data`) has no dedicated field on [`Message`] — it is
//! simply a run of bareword flag tokens, exactly as the lexer would tokenize
//! it. `Message::response(204).with_flag("send").with_flag("binary")
//! .with_flag("data")` and `"204- send binary data"` are the same message.

use xbdm_types::{Flags, Message, MessageHead, ParamMap, Record};

use crate::error::{LexError, MessageDecodeError};
use crate::lexer::{lex_line, Head};
use crate::value::{encode_value, parse_value};

/// The maximum command/reply line length, including the `\r\n` terminator.
/// Enforced on both read (`Framer::read_line`) and write (here).
pub const MAX_LINE_LEN: usize = 512;

/// Decodes one command/reply line (without its `\r\n`) into a [`Message`].
pub fn decode(line: &[u8]) -> Result<Message, MessageDecodeError> {
    let text = std::str::from_utf8(line).map_err(|_| LexError::NotUtf8)?;
    let lexed = lex_line(text)?;

    let head = match lexed.head {
        Head::Command(verb) => MessageHead::Command(verb),
        Head::Response(code) => MessageHead::Response(code),
    };

    let mut params = ParamMap::new();
    for (key, raw_value) in lexed.params {
        params.insert(key, parse_value(&raw_value)?);
    }

    let mut flags = Flags::new();
    for flag in lexed.flags {
        flags.insert(flag);
    }

    Ok(Message { head, params, flags })
}

/// Encodes a [`Message`] to its canonical wire form, including the `\r\n`
/// terminator. Returns [`MessageDecodeError::LineTooLong`] if the result
/// would exceed [`MAX_LINE_LEN`].
pub fn encode(message: &Message) -> Result<Vec<u8>, MessageDecodeError> {
    let mut out = match &message.head {
        MessageHead::Command(verb) => verb.clone(),
        MessageHead::Response(code) => format!("{code}-"),
    };

    for (key, value) in message.params.iter() {
        out.push(' ');
        out.push_str(key);
        out.push('=');
        out.push_str(&encode_value(value));
    }

    for flag in message.flags.iter() {
        out.push(' ');
        out.push_str(flag);
    }

    out.push_str("\r\n");

    if out.len() > MAX_LINE_LEN {
        return Err(MessageDecodeError::LineTooLong);
    }

    Ok(out.into_bytes())
}

/// Encodes a headless multi-line sub-line: a data record's params and flags
/// with no leading verb or status token. Used for the
/// body lines of a `202-`-prefixed multi-line reply, e.g. a `drivelist`
/// entry (`drivename="HDD"\r\n`) or a `dirlist` entry.
pub fn encode_record(record: &Record) -> Result<Vec<u8>, MessageDecodeError> {
    let mut out = String::new();
    let mut first = true;

    for (key, value) in record.params.iter() {
        if !first {
            out.push(' ');
        }
        first = false;
        out.push_str(key);
        out.push('=');
        out.push_str(&encode_value(value));
    }

    for flag in record.flags.iter() {
        if !first {
            out.push(' ');
        }
        first = false;
        out.push_str(flag);
    }

    out.push_str("\r\n");

    if out.len() > MAX_LINE_LEN {
        return Err(MessageDecodeError::LineTooLong);
    }

    Ok(out.into_bytes())
}

/// Decodes one multi-line sub-line into a headless [`Record`]. The lexer's
/// head classification is ignored here — a bareword like `name=...` would
/// otherwise be misread as a verb — sub-lines are pure param/flag runs, so
/// this re-lexes with a record-shaped grammar rather than `lex_line`'s
/// command/response head rule.
pub fn decode_record(line: &[u8]) -> Result<Record, MessageDecodeError> {
    let text = std::str::from_utf8(line).map_err(|_| LexError::NotUtf8)?;
    let lexed = crate::lexer::lex_record(text)?;

    let mut params = ParamMap::new();
    for (key, raw_value) in lexed.params {
        params.insert(key, parse_value(&raw_value)?);
    }

    let mut flags = Flags::new();
    for flag in lexed.flags {
        flags.insert(flag);
    }

    Ok(Record { params, flags })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_command_with_quoted_param_and_flag() {
        let msg = Message::command("dirlist")
            .with_param("name", "E:\\Games")
            .with_flag("recurse");
        let wire = encode(&msg).unwrap();
        assert_eq!(wire, b"dirlist name=\"E:\\Games\" recurse\r\n");
        assert_eq!(decode(&wire[..wire.len() - 2]).unwrap(), msg);
    }

    #[test]
    fn response_free_text_is_a_flag_run() {
        let msg = Message::response(204)
            .with_flag("send")
            .with_flag("binary")
            .with_flag("data");
        let wire = encode(&msg).unwrap();
        assert_eq!(wire, b"204- send binary data\r\n");
    }

    #[test]
    fn original_key_casing_is_retained_on_emission_but_lookup_is_case_insensitive() {
        let msg = Message::command("systime").with_param("HIGH", 1u32);
        let wire = encode(&msg).unwrap();
        assert_eq!(wire, b"systime HIGH=0x1\r\n");
        let decoded = decode(&wire[..wire.len() - 2]).unwrap();
        assert_eq!(decoded.params.get("high"), Some(&xbdm_types::Parameter::Dword(1)));
    }

    #[test]
    fn overlong_line_is_rejected() {
        let huge = "x".repeat(600);
        let msg = Message::command("drivelist").with_flag(huge);
        assert_eq!(encode(&msg), Err(MessageDecodeError::LineTooLong));
    }

    #[test]
    fn bad_utf8_is_rejected() {
        assert_eq!(decode(&[0xFF, 0xFE]), Err(MessageDecodeError::Lex(LexError::NotUtf8)));
    }

    #[test]
    fn record_round_trips_without_a_head_token() {
        let rec = Record::new()
            .with_param("drivename", "HDD")
            .with_flag("formatted");
        let wire = encode_record(&rec).unwrap();
        assert_eq!(wire, b"drivename=\"HDD\" formatted\r\n");
        assert_eq!(decode_record(&wire[..wire.len() - 2]).unwrap(), rec);
    }

    #[test]
    fn empty_record_encodes_to_bare_crlf() {
        let wire = encode_record(&Record::new()).unwrap();
        assert_eq!(wire, b"\r\n");
    }
}
