//! The reply plan: the tagged value a handler returns instead of writing to
//! the wire directly (§4.4's table, §9's "handlers should be first-class
//! values… returning a reply plan").

use xbdm_types::{Message, Record};

/// Which checksum discipline a single-file receive uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiveKind {
    /// Plain `SENDFILE`: no checksum, ack with `203-` + 4 zero bytes.
    Plain,
    /// `xbupdate!sysfileupd size=… crc=…`: verify CRC-32 on completion,
    /// ack with `200- OK`, fail with `405` on mismatch.
    Xbupdate { expected_crc: u32 },
}

/// What the session does after a handler runs (§4.4's dispatch table).
#[derive(Debug)]
pub enum ReplyPlan {
    /// Emit `message` verbatim. Session stays in `Command`.
    Single(Message),
    /// Emit `202- multiline response follows`, then each record, then `.`.
    MultiLine(Vec<Record>),
    /// Emit `203- binary response follows[ params]*`, then `blob` raw.
    Binary { params: Vec<(String, xbdm_types::Parameter)>, blob: Vec<u8> },
    /// Emit `204- send binary data`; open a sink at `path`; enter
    /// `ReceivingSingle`.
    StartReceiveSingle {
        path: xbdm_types::fs::VirtualPath,
        len: u64,
        kind: ReceiveKind,
    },
    /// Emit `204- send binary data`, then `203- binary response follows` +
    /// `count * 4` NUL bytes; enter `ReceivingMulti-Header`.
    StartReceiveMulti { count: u32 },
    /// Emit `message`, then close the connection.
    CloseAfter(Message),
}

impl ReplyPlan {
    pub fn ok() -> Self {
        ReplyPlan::Single(Message::response(200))
    }

    pub fn ok_with_text(text: impl Into<String>) -> Self {
        let mut msg = Message::response(200);
        for word in text.into().split_ascii_whitespace() {
            msg = msg.with_flag(word.to_string());
        }
        ReplyPlan::Single(msg)
    }

    pub fn error(code: u16, reason: impl Into<String>) -> Self {
        let mut msg = Message::response(code);
        for word in reason.into().split_ascii_whitespace() {
            msg = msg.with_flag(word.to_string());
        }
        ReplyPlan::Single(msg)
    }
}
