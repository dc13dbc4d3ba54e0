#![deny(missing_debug_implementations)]

//! Lexer, value codec, message codec, framer, and CRC-32 for the XBDM wire
//! protocol.
//!
//! ```
//! use xbdm_codec::message::{decode, encode};
//! use xbdm_types::Message;
//!
//! let cmd = Message::command("drivelist");
//! let wire = encode(&cmd).unwrap();
//! assert_eq!(wire, b"drivelist\r\n");
//! assert_eq!(decode(&wire[..wire.len() - 2]).unwrap(), cmd);
//! ```

pub mod crc;
pub mod error;
pub mod framer;
pub mod lexer;
pub mod message;
pub mod value;

pub use crc::{crc32_xbupdate, XbupdateCrc32};
pub use error::{FramerError, LexError, MessageDecodeError, ValueError};
pub use framer::Framer;
pub use message::{decode_record, encode_record};
