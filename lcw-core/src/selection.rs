//! Selection Controller
//!
//! Translates picker interaction into lifecycle calls and keeps the two
//! pickers consistent: exactly one environment is selected, and at most one
//! agent (none when the environment has nothing available).

use serde::{Deserialize, Serialize};

use crate::error::{Result, WidgetError};
use crate::lifecycle::{EnvironmentSelection, LoadTicket, WidgetLifecycleManager};
use crate::port::ScriptInjectionPort;
use crate::registry::{AgentType, ConfigRegistry, Environment};

/// The visitor picked an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvironmentChosen {
    pub environment: Environment,
}

/// The visitor picked an agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentChosen {
    pub agent: AgentType,
}

/// One radio option
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickerOption<T> {
    pub value: T,
    pub enabled: bool,
    pub selected: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionController {
    environments: Vec<PickerOption<Environment>>,
    agents: Vec<PickerOption<AgentType>>,
}

impl SelectionController {
    /// Pickers for `environment`, with its first available agent pre-checked
    ///
    /// Nothing is loaded here; the access gate triggers the first load.
    pub fn new(registry: &ConfigRegistry, environment: Environment) -> Self {
        let environments = registry
            .environments()
            .into_iter()
            .map(|env| PickerOption {
                value: env,
                enabled: true,
                selected: env == environment,
            })
            .collect();

        let mut controller = Self {
            environments,
            agents: Vec::new(),
        };
        controller.rebuild_agents(
            registry,
            environment,
            registry.first_available_agent(environment),
        );
        controller
    }

    pub fn environment_options(&self) -> &[PickerOption<Environment>] {
        &self.environments
    }

    pub fn agent_options(&self) -> &[PickerOption<AgentType>] {
        &self.agents
    }

    pub fn selected_environment(&self) -> Option<Environment> {
        self.environments
            .iter()
            .find(|o| o.selected)
            .map(|o| o.value)
    }

    pub fn selected_agent(&self) -> Option<&AgentType> {
        self.agents.iter().find(|o| o.selected).map(|o| &o.value)
    }

    pub fn on_environment_chosen<P: ScriptInjectionPort>(
        &mut self,
        event: EnvironmentChosen,
        manager: &mut WidgetLifecycleManager<P>,
    ) -> Result<EnvironmentSelection> {
        let outcome = manager.select_environment(event.environment);

        for option in &mut self.environments {
            option.selected = option.value == event.environment;
        }

        // Even if the auto-selected load failed the environment changed, so
        // the agent picker follows whatever the manager ended up with.
        let active = manager.current_agent().cloned();
        self.rebuild_agents(manager.registry(), event.environment, active.as_ref());

        outcome
    }

    /// Load the chosen agent; unavailable choices leave the pickers and the
    /// page untouched
    pub fn on_agent_chosen<P: ScriptInjectionPort>(
        &mut self,
        event: AgentChosen,
        manager: &mut WidgetLifecycleManager<P>,
    ) -> Result<LoadTicket> {
        let environment = manager.current_environment();
        if !manager.registry().is_available(environment, &event.agent) {
            tracing::warn!(
                agent = %event.agent,
                environment = %environment,
                "agent choice rejected: not available"
            );
            return Err(WidgetError::AgentUnavailable {
                environment: environment.to_string(),
                agent: event.agent.to_string(),
            });
        }

        match manager.select_agent(&event.agent) {
            Ok(ticket) => {
                self.mark_agent(&event.agent);
                Ok(ticket)
            }
            Err(err) => {
                // A failed injection may already have torn the old widget down
                let active = manager.current_agent().cloned();
                self.rebuild_agents(manager.registry(), environment, active.as_ref());
                Err(err)
            }
        }
    }

    fn rebuild_agents(
        &mut self,
        registry: &ConfigRegistry,
        environment: Environment,
        selected: Option<&AgentType>,
    ) {
        self.agents = registry
            .availability(environment)
            .iter()
            .map(|a| PickerOption {
                value: a.agent.clone(),
                enabled: a.available,
                selected: a.available && Some(&a.agent) == selected,
            })
            .collect();
    }

    fn mark_agent(&mut self, agent: &AgentType) {
        for option in &mut self.agents {
            option.selected = &option.value == agent;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::port::RecordingScriptPort;

    fn setup() -> (SelectionController, WidgetLifecycleManager<RecordingScriptPort>) {
        let registry = Arc::new(ConfigRegistry::builtin().unwrap());
        let controller = SelectionController::new(&registry, registry.default_environment());
        let manager = WidgetLifecycleManager::new(registry, RecordingScriptPort::new());
        (controller, manager)
    }

    fn selected_count<T>(options: &[PickerOption<T>]) -> usize {
        options.iter().filter(|o| o.selected).count()
    }

    #[test]
    fn test_initial_pickers() {
        let (controller, manager) = setup();

        assert_eq!(controller.selected_environment(), Some(Environment::Dev));
        assert_eq!(controller.selected_agent(), Some(&AgentType::from("default")));
        assert_eq!(selected_count(controller.environment_options()), 1);
        assert!(!manager.is_loaded());
    }

    #[test]
    fn test_agent_choice_loads_and_marks() {
        let (mut controller, mut manager) = setup();

        controller
            .on_agent_chosen(AgentChosen { agent: "specialist".into() }, &mut manager)
            .unwrap();

        assert_eq!(controller.selected_agent(), Some(&AgentType::from("specialist")));
        assert_eq!(selected_count(controller.agent_options()), 1);
        assert_eq!(manager.current_agent(), Some(&AgentType::from("specialist")));
    }

    #[test]
    fn test_unavailable_choice_rejected_without_call() {
        let (mut controller, mut manager) = setup();
        controller
            .on_environment_chosen(EnvironmentChosen { environment: Environment::Uat }, &mut manager)
            .unwrap();
        let generation = manager.selection().generation;
        let options = controller.agent_options().to_vec();

        let err = controller
            .on_agent_chosen(AgentChosen { agent: "specialist".into() }, &mut manager)
            .unwrap_err();

        assert_eq!(err.error_code(), "AGENT_UNAVAILABLE");
        assert_eq!(controller.agent_options(), options.as_slice());
        assert_eq!(manager.selection().generation, generation);
    }

    #[test]
    fn test_failed_load_unchecks_agent_picker() {
        let (mut controller, mut manager) = setup();
        controller
            .on_agent_chosen(AgentChosen { agent: "default".into() }, &mut manager)
            .unwrap();
        manager.port_mut().reject_inserts(true);

        let err = controller
            .on_agent_chosen(AgentChosen { agent: "specialist".into() }, &mut manager)
            .unwrap_err();

        assert_eq!(err.error_code(), "PORT_ERROR");
        assert_eq!(manager.current_agent(), None);
        assert_eq!(controller.selected_agent(), None);
        assert_eq!(selected_count(controller.agent_options()), 0);
        assert!(controller.agent_options().iter().all(|o| o.enabled));
    }

    #[test]
    fn test_empty_environment_clears_agent_picker() {
        let (mut controller, mut manager) = setup();

        let selection = controller
            .on_environment_chosen(EnvironmentChosen { environment: Environment::Prd }, &mut manager)
            .unwrap();

        assert!(selection.selected.is_none());
        assert_eq!(controller.selected_environment(), Some(Environment::Prd));
        assert_eq!(selected_count(controller.environment_options()), 1);
        assert_eq!(selected_count(controller.agent_options()), 0);
        assert!(controller.agent_options().iter().all(|o| !o.enabled));
    }
}
