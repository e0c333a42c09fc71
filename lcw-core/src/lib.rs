//! # LCW Core - Live Chat Widget loader
//!
//! Loads an externally hosted chat widget into a page and feeds it visitor
//! context:
//!
//! - **Registry**: which widget configuration belongs to each
//!   (environment, agent) pair, and which pairs are available
//! - **Lifecycle**: tears down the old widget, injects the new script, and
//!   swaps in the fallback source when the primary fails to load
//! - **Bridge**: registers a visitor context provider when the widget
//!   signals readiness
//! - **Selection**: keeps the environment and agent pickers consistent
//!
//! All page access goes through the traits in [`port`], so the state machine
//! runs the same against a browser (see the `lcw-wasm` crate) and against the
//! recording backends used in tests.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use lcw_core::{AgentType, ConfigRegistry, Environment, WidgetLifecycleManager};
//! use lcw_core::port::RecordingScriptPort;
//!
//! let registry = Arc::new(ConfigRegistry::builtin().unwrap());
//! let mut manager = WidgetLifecycleManager::new(registry, RecordingScriptPort::new());
//!
//! // Load the specialist widget in the default environment
//! let ticket = manager.select_agent(&AgentType::from("specialist")).unwrap();
//! assert_eq!(manager.port().script_count(), 1);
//!
//! // The host reports that the primary source failed to load
//! manager.handle_load_failure(&ticket).unwrap();
//! let script = manager.port().script(&ticket.script_id).unwrap();
//! assert!(script.src.contains("blob.core.windows.net"));
//!
//! // Production has no agents enabled: switching there leaves no widget
//! let selection = manager.select_environment(Environment::Prd).unwrap();
//! assert!(selection.selected.is_none());
//! assert_eq!(manager.port().script_count(), 0);
//! ```

pub mod app;
pub mod bridge;
pub mod diagnostics;
pub mod error;
pub mod gate;
pub mod lifecycle;
pub mod port;
pub mod registry;
pub mod selection;
pub mod visitor;

// Re-export main types
pub use app::{AppSnapshot, HostPorts, WidgetApp};
pub use bridge::ReadinessContextBridge;
pub use diagnostics::{Diagnostic, DiagnosticKind, DiagnosticLevel, DiagnosticLog};
pub use error::{ErrorCategory, ErrorReport, Result, WidgetError};
pub use gate::{AccessGate, GateOutcome};
pub use lifecycle::{
    EnvironmentSelection, LoadPhase, LoadRecovery, LoadTicket, ScriptElement, ScriptSource,
    SelectionState, WidgetLifecycleManager, WidgetState,
};
pub use port::{ContextProvider, ContextSdk, ScriptInjectionPort, SessionStore};
pub use registry::{
    AccessConfig, AgentAvailability, AgentType, AvailabilityMatrix, ConfigRegistry, Environment,
    LoaderManifest, TeardownConfig, VisitorConfig, WidgetConfig,
};
pub use selection::{AgentChosen, EnvironmentChosen, PickerOption, SelectionController};
pub use visitor::{
    BrowserName, ContextField, CoordinateStatus, Coordinates, DeviceType, LocationStatus,
    VisitorContext, VisitorState,
};

/// Loader version
pub const LCW_VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::{MemorySessionStore, RecordingContextSdk, RecordingScriptPort};

    type TestApp = WidgetApp<RecordingScriptPort, RecordingContextSdk, MemorySessionStore>;

    fn create_test_app() -> TestApp {
        let manifest = LoaderManifest::builtin().unwrap();
        let visitor = VisitorState::from_page(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) Version/17.0 Safari/605.1.15",
            0,
            "?referrer=%27KHL2%27",
            &manifest.visitor,
        );
        let ports = HostPorts {
            script: RecordingScriptPort::new(),
            sdk: RecordingContextSdk::new(),
            session: MemorySessionStore::new(),
        };
        WidgetApp::new(&manifest, ports, visitor).unwrap()
    }

    #[test]
    fn test_nothing_loads_before_unlock() {
        let mut app = create_test_app();

        assert_eq!(app.restore_session().unwrap(), GateOutcome::Locked);
        assert_eq!(app.manager().port().script_count(), 0);

        let err = app
            .on_agent_chosen(AgentChosen { agent: "specialist".into() })
            .unwrap_err();
        assert_eq!(err.error_code(), "GATE_LOCKED");
    }

    #[test]
    fn test_unlock_loads_checked_agent_once() {
        let mut app = create_test_app();

        app.unlock("code123").unwrap();
        app.unlock("code123").unwrap();

        assert_eq!(app.diagnostics().count(DiagnosticKind::WidgetInjected), 1);
        assert_eq!(app.manager().current_agent(), Some(&AgentType::from("default")));
    }

    #[test]
    fn test_ready_uses_live_visitor_state() {
        let mut app = create_test_app();
        app.unlock("code123").unwrap();
        app.visitor_mut().set_ip(Some("203.0.113.9".to_string()));

        let ctx = app.on_ready().unwrap();

        assert_eq!(ctx.visitor_ip.value, "203.0.113.9");
        assert_eq!(ctx.referral.value, "KHL2");
        assert_eq!(ctx.device_type.value, "Mac");
        assert_eq!(ctx.browser.value, "Safari");
        assert_eq!(app.sdk().query().unwrap(), ctx);
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut app = create_test_app();
        app.unlock("code123").unwrap();

        let json = serde_json::to_value(app.snapshot()).unwrap();
        assert_eq!(json["unlocked"], true);
        assert_eq!(json["environment"], "dev");
        assert_eq!(json["agent"], "default");
        assert_eq!(json["widget"]["state"], "loaded");
        assert_eq!(json["widget"]["phase"], "primary");
    }
}
