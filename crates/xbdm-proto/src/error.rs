//! Errors a handler or the session loop can raise while servicing one
//! connection. These are never sent to the peer directly — `session.rs`
//! translates each into a [`crate::reply::ReplyPlan`] reply.

use thiserror::Error;

use xbdm_codec::{FramerError, MessageDecodeError};
use xbdm_types::fs::FsError;

/// A handler-level failure, already carrying enough information for the
/// session loop to pick a result code without inspecting the verb again.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("file or directory not found: {0}")]
    NotFound(String),
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("missing or malformed parameter: {0}")]
    BadParam(&'static str),
    #[error("{0}")]
    Generic(String),
}

impl From<FsError> for HandlerError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound(path) => HandlerError::NotFound(path),
            FsError::Traversal(path) => HandlerError::PathNotFound(path),
            FsError::Io(err) => HandlerError::Generic(err.to_string()),
        }
    }
}

/// Fatal errors that end the session outright rather than producing a reply.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Framer(#[from] FramerError),
    #[error(transparent)]
    Encode(#[from] MessageDecodeError),
    #[error("malformed multi-file transfer header")]
    MalformedMultiHeader,
}
