//! The dispatcher: a case-insensitive verb → handler registry (§4.5).
//!
//! Handlers are plain `fn(&Message, &Services) -> Result<..>` values held in
//! a map, rather than one large `match` over verbs, so each is registrable
//! and testable independently.

use std::collections::HashMap;

use xbdm_types::{ConfigProvider, Filesystem, MemoryAccess, Message};

use crate::error::HandlerError;
use crate::reply::ReplyPlan;

/// The injected collaborators every handler receives (§6): the path sandbox,
/// the configuration provider, and console memory access. Bundled by
/// reference so a `Dispatcher` can be built once and reused across every
/// session on the same server.
pub struct Services<'a> {
    pub fs: &'a dyn Filesystem,
    pub config: &'a dyn ConfigProvider,
    pub memory: &'a dyn MemoryAccess,
}

impl std::fmt::Debug for Services<'_> {
    /// `Filesystem`/`MemoryAccess` aren't `Debug` (they're trait objects over
    /// injected collaborators); print the config, which is.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").field("config", &self.config).finish_non_exhaustive()
    }
}

pub type Handler = fn(&Message, &Services<'_>) -> Result<ReplyPlan, HandlerError>;

/// Maps a lowercased verb to its handler. Built once at server startup via
/// [`Dispatcher::with_default_handlers`] and shared (immutably) across every
/// session thread.
#[derive(Default, Debug)]
pub struct Dispatcher {
    handlers: HashMap<String, Handler>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `verb`, case-insensitively. A later
    /// registration for the same verb replaces the earlier one.
    pub fn register(&mut self, verb: &str, handler: Handler) {
        self.handlers.insert(verb.to_ascii_lowercase(), handler);
    }

    /// Looks up and runs the handler for `message`'s verb. Unknown verbs
    /// produce `405- unknown command` (§4.5) rather than an `Err`, since an
    /// unknown verb is an ordinary protocol outcome, not a handler failure.
    pub fn dispatch(&self, message: &Message, services: &Services<'_>) -> ReplyPlan {
        let Some(verb) = message.verb() else {
            return ReplyPlan::error(405, "unknown command");
        };
        match self.handlers.get(&verb.to_ascii_lowercase()) {
            Some(handler) => match handler(message, services) {
                Ok(plan) => plan,
                Err(HandlerError::NotFound(_)) => ReplyPlan::error(402, "file/directory not found"),
                Err(HandlerError::PathNotFound(_)) => ReplyPlan::error(430, "path not found"),
                Err(HandlerError::BadParam(_) | HandlerError::Generic(_)) => {
                    ReplyPlan::error(405, "generic error")
                }
            },
            None => ReplyPlan::error(405, "unknown command"),
        }
    }

    /// Builds a dispatcher with every handler named by the mandatory verb
    /// table (§4.5) plus the supplemental verbs pulled in from
    /// `original_source/` (`getmemex`, `setsystime`, `altaddr`,
    /// `debugoptions`, `isdebugger`).
    pub fn with_default_handlers() -> Self {
        let mut d = Self::new();
        crate::handlers::register_all(&mut d);
        d
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_verb_is_405() {
        let d = Dispatcher::new();
        let config = xbdm_types::config::StaticConfig::default();
        let fs = crate::handlers::tests::MemFs::default();
        let memory = xbdm_types::SimMemory::new(16);
        let services = Services { fs: &fs, config: &config, memory: &memory };
        let plan = d.dispatch(&Message::command("wat"), &services);
        match plan {
            ReplyPlan::Single(msg) => assert_eq!(msg.status(), Some(405)),
            other => panic!("expected Single, got {other:?}"),
        }
    }

    #[test]
    fn registration_is_case_insensitive() {
        let mut d = Dispatcher::new();
        d.register("BYE", |_msg, _services| Ok(ReplyPlan::CloseAfter(Message::response(200))));
        let config = xbdm_types::config::StaticConfig::default();
        let fs = crate::handlers::tests::MemFs::default();
        let memory = xbdm_types::SimMemory::new(16);
        let services = Services { fs: &fs, config: &config, memory: &memory };
        let plan = d.dispatch(&Message::command("bye"), &services);
        assert!(matches!(plan, ReplyPlan::CloseAfter(_)));
    }
}
