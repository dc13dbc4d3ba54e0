//! Failure modes a client operation can raise.

use thiserror::Error;

use xbdm_codec::{FramerError, MessageDecodeError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Framer(#[from] FramerError),
    #[error(transparent)]
    Decode(#[from] MessageDecodeError),
    #[error("server rejected the request: {code}- {reason}")]
    Rejected { code: u16, reason: String },
    #[error("unexpected reply shape for this operation (status {0})")]
    UnexpectedReply(u16),
    #[error("malformed multi-file upload acknowledgement")]
    MalformedAck,
    #[error("uploaded file failed CRC verification")]
    CrcMismatch,
}
