//! The command/reply line tokenizer.
//!
//! Tokenizing is hand-rolled rather than built from `nom` combinators:
//! structured grammar (here, parameter *values*, in `value.rs`) goes through
//! `nom`, but byte-level splitting with quote-toggling state is a plain scan.

use crate::error::LexError;

/// The first token of a line, before parameter/flag classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Head {
    /// A command verb, retained with its original casing.
    Command(String),
    /// A three-digit response status code.
    Response(u16),
}

/// A lexed, not-yet-type-inferred line: a head, an ordered list of
/// `(key, raw_value)` pairs (value still carries its literal quoting, if
/// any), and an ordered list of bareword flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexedLine {
    pub head: Head,
    pub params: Vec<(String, String)>,
    pub flags: Vec<String>,
}

/// Splits `line` (no trailing `\r\n`) into whitespace-separated raw tokens,
/// honoring `"`-quoted segments that may contain whitespace. Returns
/// [`LexError::UnterminatedQuote`] if a token opens a quote it never closes.
fn tokenize(line: &str) -> Result<Vec<String>, LexError> {
    let mut tokens = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        // Skip runs of whitespace between tokens.
        while matches!(chars.peek(), Some(c) if c.is_ascii_whitespace()) {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut token = String::new();
        let mut in_quote = false;
        loop {
            match chars.peek() {
                None => break,
                Some(&c) if c.is_ascii_whitespace() && !in_quote => break,
                Some(&c) => {
                    if c == '"' {
                        in_quote = !in_quote;
                    }
                    token.push(c);
                    chars.next();
                }
            }
        }
        if in_quote {
            return Err(LexError::UnterminatedQuote);
        }
        tokens.push(token);
    }

    Ok(tokens)
}

/// Classifies the first raw token as a response code (`"200-"` etc.) or a
/// verb: if it ends with `-` and the preceding text is all digits it is a
/// response code, otherwise it is a verb.
fn classify_head(token: &str) -> Head {
    if let Some(digits) = token.strip_suffix('-') {
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(code) = digits.parse::<u16>() {
                return Head::Response(code);
            }
        }
    }
    Head::Command(token.to_string())
}

/// Splits a non-head raw token into a `key=value` pair or a bareword flag.
/// Only the *first* `=` is considered a separator, so a quoted value may
/// itself contain `=` without being misread.
fn classify_param(token: &str) -> Either<(String, String), String> {
    if let Some(eq) = token.find('=') {
        if eq > 0 {
            return Either::Left((token[..eq].to_string(), token[eq + 1..].to_string()));
        }
    }
    Either::Right(token.to_string())
}

enum Either<L, R> {
    Left(L),
    Right(R),
}

/// Lexes one command/reply line (with its `\r\n` terminator already
/// stripped) into a [`LexedLine`].
pub fn lex_line(line: &str) -> Result<LexedLine, LexError> {
    let tokens = tokenize(line)?;
    let mut iter = tokens.into_iter();
    let head_token = iter.next().ok_or(LexError::Empty)?;
    let head = classify_head(&head_token);

    let mut params = Vec::new();
    let mut flags = Vec::new();
    for token in iter {
        match classify_param(&token) {
            Either::Left((key, value)) => params.push((key, value)),
            Either::Right(flag) => flags.push(flag),
        }
    }

    Ok(LexedLine { head, params, flags })
}

/// A lexed headless sub-line: no head token, just params and flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexedRecord {
    pub params: Vec<(String, String)>,
    pub flags: Vec<String>,
}

/// Lexes one multi-line sub-line: every token is a param or a flag, there is
/// no head token to classify first.
pub fn lex_record(line: &str) -> Result<LexedRecord, LexError> {
    let mut params = Vec::new();
    let mut flags = Vec::new();
    for token in tokenize(line)? {
        match classify_param(&token) {
            Either::Left((key, value)) => params.push((key, value)),
            Either::Right(flag) => flags.push(flag),
        }
    }
    Ok(LexedRecord { params, flags })
}
