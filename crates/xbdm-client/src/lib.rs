#![deny(missing_debug_implementations)]

//! The XBDM client peer: a synchronous, one-connection-per-operation façade
//! over `xbdm-codec`'s framer and message codec.

pub mod client;
pub mod error;

pub use client::Client;
pub use error::ClientError;
