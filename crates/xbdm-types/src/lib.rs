#![deny(missing_debug_implementations)]

//! Misuse-resistant data structures for the XBDM (Xbox Debug Monitor) wire
//! protocol.
//!
//! This crate carries only the data model and the service contracts the
//! protocol engine consumes: [`Message`](message::Message),
//! [`Parameter`](param::Parameter), the [`ResultCode`](result::ResultCode)
//! taxonomy, [`FileTime`](filetime::FileTime), and the injected
//! [`Filesystem`](fs::Filesystem) / [`ConfigProvider`](config::ConfigProvider)
//! traits. Wire (de)serialization lives in `xbdm-codec`; dispatch and session
//! handling live in `xbdm-proto`.

pub mod config;
pub mod filetime;
pub mod fs;
pub mod memory;
pub mod message;
pub mod param;
pub mod result;

pub use config::{ConfigProvider, Screenshot};
pub use filetime::FileTime;
pub use fs::{DirEntry, FileMeta, Filesystem, FsError, OpenSink, VirtualPath};
pub use memory::{MemoryAccess, MemoryError, SimMemory};
pub use message::{Flags, Message, MessageHead, ParamMap, Record};
pub use param::{Parameter, ParameterKind};
pub use result::ResultCode;
