//! The path sandbox contract (§6, §3 "Virtual path").
//!
//! The virtual-path to local-path mapping is an injected path-resolver
//! collaborator, not logic this crate owns. This module defines that
//! contract ([`Filesystem`]) plus the small value types ([`VirtualPath`],
//! [`DirEntry`], [`FileMeta`]) the protocol engine exchanges with it.
//! `xbdm-server::sandbox` provides the one concrete, traversal-protected
//! implementation over a local directory tree.

use std::fmt;
use std::io::{self, Read, Write};

use crate::filetime::FileTime;

/// An XBDM virtual path, e.g. `E:\a.bin` or `\Device\Harddisk0\Partition1\a.bin`.
/// Kept as an opaque wrapper (rather than a bare `String`) so call sites can't
/// accidentally pass an already-resolved local path where a virtual one is
/// expected.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPath(String);

impl VirtualPath {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path's components, split on `\`, with empty components (from a
    /// leading separator or repeated separators) dropped.
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.0.split('\\').filter(|c| !c.is_empty())
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileMeta {
    pub size: u64,
    pub created: FileTime,
    pub modified: FileTime,
    pub is_directory: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub meta: FileMeta,
}

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("path not found: {0}")]
    NotFound(String),
    #[error("path escapes sandbox root: {0}")]
    Traversal(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// An open, in-progress write target. Receive-mode sinks (§3 "Lifecycles",
/// §5 "Resource discipline") are guaranteed-closed on every exit path; the
/// session calls [`OpenSink::finish`] on success and simply drops the sink
/// (closing the underlying file) on error or cancellation.
pub trait OpenSink: Write + Send {
    /// Flushes and closes the sink. Consumes `self` so a caller cannot
    /// accidentally write after finishing.
    fn finish(self: Box<Self>) -> io::Result<()>;
}

/// The injected path-resolver/filesystem contract the protocol engine
/// consumes (§6). Implementations must be `Send + Sync`: §5 requires the
/// sandbox to be usable concurrently across sessions, serializing only
/// directory creation.
pub trait Filesystem: Send + Sync {
    fn stat(&self, path: &VirtualPath) -> Result<FileMeta, FsError>;
    fn list_dir(&self, path: &VirtualPath) -> Result<Vec<DirEntry>, FsError>;
    fn open_read(&self, path: &VirtualPath) -> Result<Box<dyn Read + Send>, FsError>;
    fn create_write(&self, path: &VirtualPath) -> Result<Box<dyn OpenSink>, FsError>;
    fn mkdir(&self, path: &VirtualPath) -> Result<(), FsError>;
    fn remove(&self, path: &VirtualPath) -> Result<(), FsError>;
    fn remove_tree(&self, path: &VirtualPath) -> Result<(), FsError>;
    fn rename(&self, from: &VirtualPath, to: &VirtualPath) -> Result<(), FsError>;
}
