//! The in-memory [`Message`] object (§3).
//!
//! A `Message` is either a *command* (a verb, possibly `!`-namespaced such as
//! `xbupdate!sysfileupd`) or a *response* (a three-digit status code). Both
//! carry an ordered, case-insensitively-keyed parameter map and an ordered,
//! case-preserving, deduplicated set of bareword flags. Wire (de)serialization
//! is `xbdm-codec`'s job; this type only models the parsed shape.

use crate::param::Parameter;

/// Discriminates a command message from a response message. Exactly one of
/// the two is ever present on a [`Message`] (the §3 invariant).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageHead {
    /// A command verb, e.g. `"drivelist"` or `"xbupdate!sysfileupd"`.
    Command(String),
    /// A three-digit response status code, e.g. `200`.
    Response(u16),
}

/// An ordered mapping from lowercase key to `(original-case key, value)`.
/// Lookup is case-insensitive; re-inserting an existing key updates its value
/// in place without moving it, so iteration order matches first-insertion
/// order as required by §3.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap {
    entries: Vec<(String, Parameter)>,
}

impl ParamMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Parameter) {
        let key = key.into();
        if let Some(slot) = self
            .entries
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Parameter> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Parameter)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An ordered, case-preserving, deduplicated set of bareword flags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags {
    tokens: Vec<String>,
}

impl Flags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, flag: impl Into<String>) {
        let flag = flag.into();
        if !self.tokens.iter().any(|f| f.eq_ignore_ascii_case(&flag)) {
            self.tokens.push(flag);
        }
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.tokens.iter().any(|f| f.eq_ignore_ascii_case(flag))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.tokens.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// A headless data record: one sub-line of a `202-` multi-line reply (§4.4,
/// §6), e.g. `drivename="HDD"` or `name="a.bin" sizehi=0x0 sizelo=0x3
/// directory`. It carries the same ordered param/flag shape as [`Message`]
/// but no verb or status — multi-line sub-lines are never commands or
/// replies in their own right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub params: ParamMap,
    pub flags: Flags,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.params.insert(key, value.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub head: MessageHead,
    pub params: ParamMap,
    pub flags: Flags,
}

impl Message {
    pub fn command(verb: impl Into<String>) -> Self {
        Self {
            head: MessageHead::Command(verb.into()),
            params: ParamMap::new(),
            flags: Flags::new(),
        }
    }

    pub fn response(code: u16) -> Self {
        Self {
            head: MessageHead::Response(code),
            params: ParamMap::new(),
            flags: Flags::new(),
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.params.insert(key, value.into());
        self
    }

    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.insert(flag);
        self
    }

    /// The verb, case-insensitively, if this is a command.
    pub fn verb(&self) -> Option<&str> {
        match &self.head {
            MessageHead::Command(v) => Some(v.as_str()),
            MessageHead::Response(_) => None,
        }
    }

    pub fn is_verb(&self, candidate: &str) -> bool {
        self.verb().is_some_and(|v| v.eq_ignore_ascii_case(candidate))
    }

    pub fn status(&self) -> Option<u16> {
        match self.head {
            MessageHead::Response(code) => Some(code),
            MessageHead::Command(_) => None,
        }
    }
}
