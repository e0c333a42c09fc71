//! Host ports
//!
//! The lifecycle state machine never touches a DOM. Everything it needs from
//! the host page goes through these traits: script injection and teardown,
//! the external widget SDK, and session storage for the access gate.
//!
//! # Implementations
//!
//! - [`RecordingScriptPort`], [`RecordingContextSdk`], [`MemorySessionStore`]:
//!   in-memory hosts that record what they were asked to do. Used by tests,
//!   the benchmark and the `lcw-registry simulate` command.
//! - The `lcw-wasm` crate implements all three against `web-sys`.

mod recording;

pub use recording::{MemorySessionStore, MockNode, PortCall, RecordingContextSdk, RecordingScriptPort};

use crate::error::Result;
use crate::lifecycle::{LoadTicket, ScriptElement};
use crate::visitor::VisitorContext;

/// Callback the widget SDK invokes to read visitor context
pub type ContextProvider = Box<dyn Fn() -> VisitorContext>;

/// DOM mutation primitives used for widget injection and teardown
pub trait ScriptInjectionPort {
    /// Insert a script element; the host must report a load failure of this
    /// element by handing `ticket` back to the lifecycle manager
    fn insert_script(&mut self, script: &ScriptElement, ticket: &LoadTicket) -> Result<()>;

    /// Remove the script element with `id` if attached
    fn remove_script(&mut self, id: &str) -> bool;

    /// Remove every node matching a comma-separated selector list, returning
    /// how many were removed
    fn remove_matching(&mut self, selectors: &str) -> usize;

    /// Delete the global object at a dotted path, returning whether it existed
    fn clear_namespace(&mut self, path: &str) -> bool;

    /// Port name (for logging)
    fn name(&self) -> &'static str;
}

/// Context registration surface of the external widget SDK
pub trait ContextSdk {
    /// Whether the registration function at `entry_point` exists right now
    fn has_context_api(&self, entry_point: &str) -> bool;

    /// Register `provider`, replacing any previous one
    fn set_context_provider(&mut self, entry_point: &str, provider: ContextProvider) -> Result<()>;
}

/// Session-scoped key/value storage
pub trait SessionStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: &str) -> Result<()>;
}
