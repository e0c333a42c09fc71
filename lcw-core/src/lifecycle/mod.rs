//! Widget Lifecycle - injecting, replacing and recovering the chat widget
//!
//! ## State machine
//!
//! ```text
//!                  select_agent / select_environment
//!        ┌───────┐ ─────────────────────────────────► ┌────────────────┐
//!        │ Empty │                                    │ Loaded/Primary │
//!        └───────┘ ◄── teardown / empty environment ─ └────────────────┘
//!                                                        │ primary error
//!                                                        ▼
//!                                                  ┌─────────────────┐
//!                                                  │ Loaded/Fallback │
//!                                                  └─────────────────┘
//!                                                        │ fallback error
//!                                                        ▼
//!                                                  ┌──────────────────┐
//!                                                  │ Loaded/Exhausted │
//!                                                  └──────────────────┘
//! ```
//!
//! Every transition into `Loaded` starts with a teardown, and every teardown
//! bumps the selection generation so late error events from a replaced
//! widget are recognised and dropped.

mod manager;
mod script;

pub use manager::{
    EnvironmentSelection, LoadPhase, LoadRecovery, SelectionState, WidgetLifecycleManager,
    WidgetState,
};
pub use script::{LoadTicket, ScriptElement, ScriptSource};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::diagnostics::DiagnosticKind;
    use crate::port::{PortCall, RecordingScriptPort};
    use crate::registry::{AgentType, ConfigRegistry, Environment};

    fn manager() -> WidgetLifecycleManager<RecordingScriptPort> {
        let registry = Arc::new(ConfigRegistry::builtin().unwrap());
        WidgetLifecycleManager::new(registry, RecordingScriptPort::new())
    }

    #[test]
    fn test_starts_empty_on_default_environment() {
        let manager = manager();
        assert_eq!(manager.state(), &WidgetState::Empty);
        assert_eq!(manager.current_environment(), Environment::Dev);
        assert!(manager.current_agent().is_none());
        assert_eq!(manager.port().script_count(), 0);
    }

    #[test]
    fn test_select_agent_injects_primary() {
        let mut manager = manager();
        let ticket = manager.select_agent(&AgentType::from("default")).unwrap();

        assert_eq!(ticket.source, ScriptSource::Primary);
        assert_eq!(manager.current_agent(), Some(&AgentType::from("default")));
        let script = manager.port().script(&ticket.script_id).unwrap();
        assert!(script.src.contains("oc-cdn-public-oce"));
        assert!(script.is_async);
    }

    #[test]
    fn test_unavailable_agent_touches_nothing() {
        let mut manager = manager();
        manager.select_environment(Environment::Uat).unwrap();
        manager.port_mut().clear_calls();
        let before = manager.selection().clone();

        let err = manager
            .select_agent(&AgentType::from("specialist"))
            .unwrap_err();

        assert_eq!(err.error_code(), "AGENT_UNAVAILABLE");
        assert!(manager.port().calls().is_empty());
        assert_eq!(manager.selection(), &before);
        assert_eq!(manager.diagnostics().count(DiagnosticKind::ConfigurationMiss), 1);
    }

    #[test]
    fn test_teardown_is_idempotent() {
        let mut manager = manager();
        manager.teardown();
        manager.teardown();

        assert_eq!(manager.state(), &WidgetState::Empty);
        assert_eq!(manager.selection().generation, 2);
        assert_eq!(manager.diagnostics().count(DiagnosticKind::WidgetTornDown), 0);
    }

    #[test]
    fn test_teardown_runs_before_insert() {
        let mut manager = manager();
        manager.select_agent(&AgentType::from("default")).unwrap();
        manager.port_mut().clear_calls();

        manager.select_agent(&AgentType::from("specialist")).unwrap();

        let calls = manager.port().calls();
        assert!(matches!(calls.first(), Some(PortCall::RemoveScript { removed: true, .. })));
        assert!(matches!(calls.last(), Some(PortCall::InsertScript { .. })));
    }

    #[test]
    fn test_stale_ticket_is_ignored() {
        let mut manager = manager();
        let old = manager.select_agent(&AgentType::from("default")).unwrap();
        manager.select_agent(&AgentType::from("specialist")).unwrap();

        let outcome = manager.handle_load_failure(&old).unwrap();

        assert_eq!(outcome, LoadRecovery::Ignored);
        assert_eq!(manager.port().script_count(), 1);
        assert_eq!(manager.diagnostics().count(DiagnosticKind::StaleLoadIgnored), 1);
    }

    #[test]
    fn test_insert_failure_propagates() {
        let mut manager = manager();
        manager.port_mut().reject_inserts(true);

        let err = manager.select_agent(&AgentType::from("default")).unwrap_err();
        assert_eq!(err.error_code(), "PORT_ERROR");
        assert_eq!(manager.state(), &WidgetState::Empty);
    }
}
