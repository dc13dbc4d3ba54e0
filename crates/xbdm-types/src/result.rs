//! The result-code taxonomy (§3, §4.7).
//!
//! Reason phrases are the canonical strings from the Microsoft XBDM result
//! table (carried over verbatim from `original_source/codes.py`'s
//! `XBDMResult` constants where they overlap with this closed subset).

/// The closed subset of XBDM result codes this crate knows about.
///
/// `Other` carries any additional numeric code a handler wants to emit
/// without extending this enum (e.g. a future-proof escape hatch); callers
/// that only care about success/failure should match on
/// [`ResultCode::code`] rather than exhaustively matching this enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultCode {
    Ok,
    Connected,
    MultiLineFollows,
    BinaryFollows,
    SendBinaryData,
    NotificationChannel,
    FileOrDirectoryNotFound,
    GenericError,
    IsDebugger,
    NotLocked,
    PathNotFound,
    Other(u16),
}

impl ResultCode {
    pub fn code(self) -> u16 {
        match self {
            ResultCode::Ok => 200,
            ResultCode::Connected => 201,
            ResultCode::MultiLineFollows => 202,
            ResultCode::BinaryFollows => 203,
            ResultCode::SendBinaryData => 204,
            ResultCode::NotificationChannel => 205,
            ResultCode::FileOrDirectoryNotFound => 402,
            ResultCode::GenericError => 405,
            ResultCode::IsDebugger => 410,
            ResultCode::NotLocked => 420,
            ResultCode::PathNotFound => 430,
            ResultCode::Other(code) => code,
        }
    }

    /// The canonical reason phrase for codes specified by §3/§4.7. `Other`
    /// codes have no canonical phrase and return an empty string; callers
    /// supply their own text.
    pub fn reason(self) -> &'static str {
        match self {
            ResultCode::Ok => "OK",
            ResultCode::Connected => "connected",
            ResultCode::MultiLineFollows => "multiline response follows",
            ResultCode::BinaryFollows => "binary response follows",
            ResultCode::SendBinaryData => "send binary data",
            ResultCode::NotificationChannel => "now a notification channel",
            ResultCode::FileOrDirectoryNotFound => "file/directory not found",
            ResultCode::GenericError => "generic error",
            ResultCode::IsDebugger => "is-debugger",
            ResultCode::NotLocked => "box is not locked",
            ResultCode::PathNotFound => "path not found",
            ResultCode::Other(_) => "",
        }
    }

    /// Whether this is a 2xx success code. Clients key decisions off the
    /// numeric code only (§4.7); this is a convenience over that rule.
    pub fn is_success(self) -> bool {
        (200..300).contains(&self.code())
    }

    pub fn from_code(code: u16) -> Self {
        match code {
            200 => ResultCode::Ok,
            201 => ResultCode::Connected,
            202 => ResultCode::MultiLineFollows,
            203 => ResultCode::BinaryFollows,
            204 => ResultCode::SendBinaryData,
            205 => ResultCode::NotificationChannel,
            402 => ResultCode::FileOrDirectoryNotFound,
            405 => ResultCode::GenericError,
            410 => ResultCode::IsDebugger,
            420 => ResultCode::NotLocked,
            430 => ResultCode::PathNotFound,
            other => ResultCode::Other(other),
        }
    }
}
