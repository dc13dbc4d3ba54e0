#![deny(missing_debug_implementations)]

//! The session state machine and verb dispatcher that sit between the wire
//! codec (`xbdm-codec`) and the two peers (`xbdm-server`, `xbdm-client`).
//!
//! [`session::Session`] owns one connection's framer and receive-mode state;
//! [`dispatch::Dispatcher`] maps a command verb to a handler; [`reply::ReplyPlan`]
//! is what a handler hands back for the session to turn into wire bytes.

pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod reply;
pub mod session;

pub use dispatch::{Dispatcher, Handler, Services};
pub use error::{HandlerError, SessionError};
pub use reply::{ReceiveKind, ReplyPlan};
pub use session::Session;
