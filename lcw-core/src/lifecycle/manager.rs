//! Widget lifecycle manager implementation

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::script::{LoadTicket, ScriptElement, ScriptSource};
use crate::diagnostics::{DiagnosticKind, DiagnosticLog};
use crate::error::{Result, WidgetError};
use crate::port::ScriptInjectionPort;
use crate::registry::{AgentAvailability, AgentType, ConfigRegistry, Environment};

/// Current environment/agent selection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionState {
    pub environment: Environment,
    /// Agent of the active widget; `None` until a selection succeeds
    pub agent: Option<AgentType>,
    /// Bumped on every teardown; tags load tickets
    pub generation: u64,
}

/// How far the load of the active widget has fallen back
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPhase {
    Primary,
    Fallback,
    /// Fallback failed too; the widget will not appear
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum WidgetState {
    Empty,
    Loaded { agent: AgentType, phase: LoadPhase },
}

/// Result of switching environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSelection {
    pub environment: Environment,
    /// Agent availability for display
    pub agents: Vec<AgentAvailability>,
    /// Auto-selected agent, `None` when the environment has no available agent
    pub selected: Option<AgentType>,
    pub ticket: Option<LoadTicket>,
}

/// Outcome of a load-failure notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadRecovery {
    FallbackInjected(LoadTicket),
    /// The ticket belongs to a widget that is no longer current
    Ignored,
}

/// Owns the selection state and the single injected widget
///
/// Every injection is preceded by a full teardown in the same call, so at
/// most one widget script is attached at any time.
pub struct WidgetLifecycleManager<P: ScriptInjectionPort> {
    registry: Arc<ConfigRegistry>,
    port: P,
    selection: SelectionState,
    state: WidgetState,
    diagnostics: DiagnosticLog,
}

impl<P: ScriptInjectionPort> WidgetLifecycleManager<P> {
    /// Create a manager in the Empty state on the registry's default environment
    pub fn new(registry: Arc<ConfigRegistry>, port: P) -> Self {
        Self::with_diagnostics(registry, port, DiagnosticLog::new())
    }

    pub fn with_diagnostics(registry: Arc<ConfigRegistry>, port: P, diagnostics: DiagnosticLog) -> Self {
        let environment = registry.default_environment();
        Self {
            registry,
            port,
            selection: SelectionState {
                environment,
                agent: None,
                generation: 0,
            },
            state: WidgetState::Empty,
            diagnostics,
        }
    }

    pub fn registry(&self) -> &ConfigRegistry {
        &self.registry
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn state(&self) -> &WidgetState {
        &self.state
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn current_environment(&self) -> Environment {
        self.selection.environment
    }

    pub fn current_agent(&self) -> Option<&AgentType> {
        self.selection.agent.as_ref()
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, WidgetState::Loaded { .. })
    }

    /// Agent availability of the current environment
    pub fn availability(&self) -> Vec<AgentAvailability> {
        self.registry.availability(self.selection.environment).to_vec()
    }

    /// Replace the active widget with the one for `agent`
    ///
    /// Unavailable or unregistered pairs are rejected before anything on the
    /// page is touched.
    pub fn select_agent(&mut self, agent: &AgentType) -> Result<LoadTicket> {
        let environment = self.selection.environment;

        if !self.registry.is_available(environment, agent) {
            self.diagnostics.record(
                DiagnosticKind::ConfigurationMiss,
                format!(
                    "agent '{}' is not available in '{}'; widget left unchanged",
                    agent, environment
                ),
            );
            return Err(WidgetError::AgentUnavailable {
                environment: environment.to_string(),
                agent: agent.to_string(),
            });
        }

        let config = match self.registry.require_config(environment, agent) {
            Ok(config) => config.clone(),
            Err(err) => {
                self.diagnostics.record(
                    DiagnosticKind::ConfigurationMiss,
                    format!("no widget configured for '{}' in '{}'", agent, environment),
                );
                return Err(err);
            }
        };

        self.teardown();

        let ticket = LoadTicket {
            generation: self.selection.generation,
            environment,
            agent: agent.clone(),
            script_id: config.script_element_id.clone(),
            source: ScriptSource::Primary,
        };
        let script = ScriptElement::from_config(&config, ScriptSource::Primary);
        self.port.insert_script(&script, &ticket)?;

        self.state = WidgetState::Loaded {
            agent: agent.clone(),
            phase: LoadPhase::Primary,
        };
        self.selection.agent = Some(agent.clone());
        self.diagnostics.record(
            DiagnosticKind::WidgetInjected,
            format!("loaded '{}' widget in '{}' from {}", agent, environment, script.src),
        );

        Ok(ticket)
    }

    /// Switch environment and auto-select its first available agent
    ///
    /// An environment without available agents leaves the page with no
    /// widget; that is a valid end state, not an error.
    pub fn select_environment(&mut self, environment: Environment) -> Result<EnvironmentSelection> {
        let previous = self.selection.environment;
        self.selection.environment = environment;
        self.selection.agent = None;
        self.diagnostics.record(
            DiagnosticKind::EnvironmentChanged,
            format!("environment changed from '{}' to '{}'", previous, environment),
        );

        let agents = self.registry.availability(environment).to_vec();
        let first = self.registry.first_available_agent(environment).cloned();

        match first {
            Some(agent) => {
                let ticket = self.select_agent(&agent)?;
                Ok(EnvironmentSelection {
                    environment,
                    agents,
                    selected: Some(agent),
                    ticket: Some(ticket),
                })
            }
            None => {
                self.teardown();
                self.diagnostics.record(
                    DiagnosticKind::EnvironmentEmpty,
                    format!("no agents available in '{}'; chat disabled", environment),
                );
                Ok(EnvironmentSelection {
                    environment,
                    agents,
                    selected: None,
                    ticket: None,
                })
            }
        }
    }

    /// Remove every trace of a widget from the page
    ///
    /// Safe to call with nothing loaded. Invalidates all outstanding tickets.
    pub fn teardown(&mut self) {
        let registry = Arc::clone(&self.registry);
        let teardown = registry.teardown();

        let mut scripts = 0;
        for id in registry.script_element_ids() {
            while self.port.remove_script(id) {
                scripts += 1;
            }
        }
        let frames = self.port.remove_matching(&teardown.iframe_selectors);
        let containers = self.port.remove_matching(&teardown.container_selectors);
        let namespace = self.port.clear_namespace(&teardown.sdk_namespace);

        self.selection.generation += 1;
        self.selection.agent = None;

        if let WidgetState::Loaded { agent, .. } = &self.state {
            self.diagnostics.record(
                DiagnosticKind::WidgetTornDown,
                format!(
                    "removed '{}' widget ({} script, {} frame, {} container nodes; namespace cleared: {})",
                    agent, scripts, frames, containers, namespace
                ),
            );
        } else {
            tracing::debug!(
                port = self.port.name(),
                scripts,
                frames,
                containers,
                namespace,
                "teardown with no active widget"
            );
        }
        self.state = WidgetState::Empty;
    }

    /// Handle a script load failure reported by the host
    ///
    /// A failed primary is replaced by exactly one fallback element. A failed
    /// fallback ends the attempt. Tickets from replaced widgets are ignored.
    pub fn handle_load_failure(&mut self, ticket: &LoadTicket) -> Result<LoadRecovery> {
        let phase = match &self.state {
            WidgetState::Loaded { agent, phase }
                if ticket.generation == self.selection.generation && agent == &ticket.agent =>
            {
                *phase
            }
            _ => return Ok(self.ignore_stale(ticket)),
        };

        match (ticket.source, phase) {
            (ScriptSource::Primary, LoadPhase::Primary) => {
                let config = self
                    .registry
                    .require_config(ticket.environment, &ticket.agent)?
                    .clone();

                self.port.remove_script(&ticket.script_id);

                let fallback_ticket = LoadTicket {
                    source: ScriptSource::Fallback,
                    ..ticket.clone()
                };
                let script = ScriptElement::from_config(&config, ScriptSource::Fallback);
                if let Err(err) = self.port.insert_script(&script, &fallback_ticket) {
                    // Primary is already gone: nothing of this widget is left
                    self.state = WidgetState::Empty;
                    self.selection.agent = None;
                    self.diagnostics.record(
                        DiagnosticKind::FallbackExhausted,
                        format!("fallback for '{}' could not be inserted: {}", ticket.agent, err),
                    );
                    return Err(err);
                }

                self.state = WidgetState::Loaded {
                    agent: ticket.agent.clone(),
                    phase: LoadPhase::Fallback,
                };
                self.diagnostics.record(
                    DiagnosticKind::FallbackInjected,
                    format!(
                        "primary source failed for '{}'; retrying from {}",
                        ticket.agent, script.src
                    ),
                );
                Ok(LoadRecovery::FallbackInjected(fallback_ticket))
            }
            (ScriptSource::Fallback, LoadPhase::Fallback) => {
                let source_url = self
                    .registry
                    .get_config(ticket.environment, &ticket.agent)
                    .map(|c| c.fallback_source_url.clone())
                    .unwrap_or_default();

                self.state = WidgetState::Loaded {
                    agent: ticket.agent.clone(),
                    phase: LoadPhase::Exhausted,
                };
                self.diagnostics.record(
                    DiagnosticKind::FallbackExhausted,
                    format!("fallback source failed for '{}'; chat unavailable", ticket.agent),
                );
                Err(WidgetError::ScriptLoadFailure {
                    agent: ticket.agent.to_string(),
                    source_url,
                    terminal: true,
                })
            }
            _ => Ok(self.ignore_stale(ticket)),
        }
    }

    fn ignore_stale(&self, ticket: &LoadTicket) -> LoadRecovery {
        self.diagnostics.record(
            DiagnosticKind::StaleLoadIgnored,
            format!(
                "ignored {:?} load failure for '{}' (generation {}, current {})",
                ticket.source, ticket.agent, ticket.generation, self.selection.generation
            ),
        );
        LoadRecovery::Ignored
    }
}
