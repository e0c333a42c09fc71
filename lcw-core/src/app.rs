//! Page-session application wiring
//!
//! `WidgetApp` owns one of everything for a page: the lifecycle manager and
//! its script port, the pickers, the readiness bridge and SDK port, the
//! access gate and its session store, and the live visitor state. Host glue
//! forwards each browser event to the matching `on_*` method.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bridge::ReadinessContextBridge;
use crate::diagnostics::{DiagnosticKind, DiagnosticLog};
use crate::error::{Result, WidgetError};
use crate::gate::{AccessGate, GateOutcome};
use crate::lifecycle::{
    EnvironmentSelection, LoadRecovery, LoadTicket, WidgetLifecycleManager, WidgetState,
};
use crate::port::{ContextSdk, ScriptInjectionPort, SessionStore};
use crate::registry::{AgentType, ConfigRegistry, Environment, LoaderManifest, VisitorConfig};
use crate::selection::{AgentChosen, EnvironmentChosen, PickerOption, SelectionController};
use crate::visitor::{VisitorContext, VisitorState};

/// Host implementations of every port
pub struct HostPorts<P, S, T> {
    pub script: P,
    pub sdk: S,
    pub session: T,
}

/// Serializable view of the page state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSnapshot {
    pub unlocked: bool,
    pub environment: Environment,
    pub agent: Option<AgentType>,
    pub widget: WidgetState,
    pub environments: Vec<PickerOption<Environment>>,
    pub agents: Vec<PickerOption<AgentType>>,
}

pub struct WidgetApp<P, S, T>
where
    P: ScriptInjectionPort,
    S: ContextSdk,
    T: SessionStore,
{
    manager: WidgetLifecycleManager<P>,
    controller: SelectionController,
    bridge: ReadinessContextBridge,
    gate: AccessGate,
    visitor: VisitorState,
    visitor_config: VisitorConfig,
    sdk: S,
    session: T,
    diagnostics: DiagnosticLog,
}

impl<P, S, T> WidgetApp<P, S, T>
where
    P: ScriptInjectionPort,
    S: ContextSdk,
    T: SessionStore,
{
    pub fn new(manifest: &LoaderManifest, ports: HostPorts<P, S, T>, visitor: VisitorState) -> Result<Self> {
        let diagnostics = DiagnosticLog::new();
        let registry = Arc::new(ConfigRegistry::from_manifest(manifest)?);

        let controller = SelectionController::new(&registry, registry.default_environment());
        let bridge = ReadinessContextBridge::with_diagnostics(
            registry.readiness_event(),
            registry.teardown().context_api.clone(),
            diagnostics.clone(),
        );
        let gate = AccessGate::with_diagnostics(manifest.access.clone(), diagnostics.clone());
        let manager = WidgetLifecycleManager::with_diagnostics(registry, ports.script, diagnostics.clone());

        Ok(Self {
            manager,
            controller,
            bridge,
            gate,
            visitor,
            visitor_config: manifest.visitor.clone(),
            sdk: ports.sdk,
            session: ports.session,
            diagnostics,
        })
    }

    pub fn manager(&self) -> &WidgetLifecycleManager<P> {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut WidgetLifecycleManager<P> {
        &mut self.manager
    }

    pub fn controller(&self) -> &SelectionController {
        &self.controller
    }

    pub fn bridge(&self) -> &ReadinessContextBridge {
        &self.bridge
    }

    pub fn gate(&self) -> &AccessGate {
        &self.gate
    }

    pub fn visitor(&self) -> &VisitorState {
        &self.visitor
    }

    /// Live visitor state, for collaborator results as they arrive
    pub fn visitor_mut(&mut self) -> &mut VisitorState {
        &mut self.visitor
    }

    pub fn visitor_config(&self) -> &VisitorConfig {
        &self.visitor_config
    }

    pub fn sdk(&self) -> &S {
        &self.sdk
    }

    pub fn sdk_mut(&mut self) -> &mut S {
        &mut self.sdk
    }

    pub fn session(&self) -> &T {
        &self.session
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn readiness_event(&self) -> &str {
        self.bridge.event_name()
    }

    /// Claim the page-lifetime readiness subscription (see
    /// [`ReadinessContextBridge::subscribe`])
    pub fn subscribe_readiness(&mut self) -> bool {
        self.bridge.subscribe()
    }

    /// Unlock from session storage, loading the widget on first unlock
    pub fn restore_session(&mut self) -> Result<GateOutcome> {
        let outcome = self.gate.restore(&self.session);
        self.after_unlock(outcome)?;
        Ok(outcome)
    }

    /// Check an entered access code, loading the widget on first unlock
    pub fn unlock(&mut self, code: &str) -> Result<GateOutcome> {
        let outcome = self.gate.submit(&mut self.session, code)?;
        self.after_unlock(outcome)?;
        Ok(outcome)
    }

    fn after_unlock(&mut self, outcome: GateOutcome) -> Result<()> {
        if outcome != (GateOutcome::Unlocked { first_unlock: true }) {
            return Ok(());
        }

        let environment = self.manager.current_environment();
        let agent = self
            .controller
            .selected_agent()
            .or_else(|| self.manager.registry().first_available_agent(environment))
            .cloned();

        match agent {
            Some(agent) => {
                self.controller
                    .on_agent_chosen(AgentChosen { agent }, &mut self.manager)?;
            }
            None => self.diagnostics.record(
                DiagnosticKind::EnvironmentEmpty,
                format!("unlocked with no agents available in '{}'", environment),
            ),
        }
        Ok(())
    }

    fn ensure_unlocked(&self) -> Result<()> {
        if self.gate.is_unlocked() {
            Ok(())
        } else {
            Err(WidgetError::GateLocked)
        }
    }

    pub fn on_environment_chosen(&mut self, event: EnvironmentChosen) -> Result<EnvironmentSelection> {
        self.ensure_unlocked()?;
        self.controller
            .on_environment_chosen(event, &mut self.manager)
    }

    pub fn on_agent_chosen(&mut self, event: AgentChosen) -> Result<LoadTicket> {
        self.ensure_unlocked()?;
        self.controller.on_agent_chosen(event, &mut self.manager)
    }

    /// A widget script element fired its error event
    pub fn on_script_error(&mut self, ticket: &LoadTicket) -> Result<LoadRecovery> {
        self.manager.handle_load_failure(ticket)
    }

    /// The widget fired its readiness signal
    pub fn on_ready(&mut self) -> Result<VisitorContext> {
        self.bridge.on_ready(&mut self.sdk, &self.visitor)
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            unlocked: self.gate.is_unlocked(),
            environment: self.manager.current_environment(),
            agent: self.manager.current_agent().cloned(),
            widget: self.manager.state().clone(),
            environments: self.controller.environment_options().to_vec(),
            agents: self.controller.agent_options().to_vec(),
        }
    }
}
