//! Typed parameter values (§3, §4.2).

/// The closed set of wire parameter types.
///
/// `BYTES` is represented as [`Parameter::String`]: it is a `STRING` on the
/// wire (a hex payload), and callers that need raw bytes decode the string
/// themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parameter {
    Integer(i64),
    Dword(u32),
    Qword(u64),
    String(String),
    QuotedString(String),
}

/// The type tag of a [`Parameter`], used when a caller only needs to assert a
/// shape (e.g. "this handler requires a DWORD") without matching the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    Integer,
    Dword,
    Qword,
    String,
    QuotedString,
}

impl Parameter {
    pub fn kind(&self) -> ParameterKind {
        match self {
            Parameter::Integer(_) => ParameterKind::Integer,
            Parameter::Dword(_) => ParameterKind::Dword,
            Parameter::Qword(_) => ParameterKind::Qword,
            Parameter::String(_) => ParameterKind::String,
            Parameter::QuotedString(_) => ParameterKind::QuotedString,
        }
    }

    /// Interprets this parameter as an unsigned integer, regardless of
    /// whether it was lexed as `INTEGER`, `DWORD`, or `QWORD`. Handlers that
    /// accept any integral parameter shape (e.g. `ADDR=`) use this instead of
    /// matching on `kind()`.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Parameter::Integer(v) => u64::try_from(*v).ok(),
            Parameter::Dword(v) => Some(u64::from(*v)),
            Parameter::Qword(v) => Some(*v),
            Parameter::String(_) | Parameter::QuotedString(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Parameter::String(s) | Parameter::QuotedString(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl From<u32> for Parameter {
    fn from(v: u32) -> Self {
        Parameter::Dword(v)
    }
}

impl From<u64> for Parameter {
    fn from(v: u64) -> Self {
        Parameter::Qword(v)
    }
}

impl From<i64> for Parameter {
    fn from(v: i64) -> Self {
        Parameter::Integer(v)
    }
}

impl From<String> for Parameter {
    fn from(v: String) -> Self {
        Parameter::QuotedString(v)
    }
}

impl From<&str> for Parameter {
    fn from(v: &str) -> Self {
        Parameter::QuotedString(v.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn as_u64_widens_integral_kinds() {
        assert_eq!(Parameter::Dword(7).as_u64(), Some(7));
        assert_eq!(Parameter::Qword(7).as_u64(), Some(7));
        assert_eq!(Parameter::Integer(7).as_u64(), Some(7));
        assert_eq!(Parameter::Integer(-1).as_u64(), None);
        assert_eq!(Parameter::String("x".into()).as_u64(), None);
    }
}
