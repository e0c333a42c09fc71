//! Config Registry implementation

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::manifest::{LoaderManifest, TeardownConfig, WidgetConfig};
use crate::error::{Result, WidgetError};

/// Deployment environment of the widget backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Uat,
    Prd,
}

impl Environment {
    /// All environments in display order
    pub const ALL: [Environment; 3] = [Environment::Dev, Environment::Uat, Environment::Prd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Uat => "uat",
            Environment::Prd => "prd",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = WidgetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "uat" => Ok(Environment::Uat),
            "prd" => Ok(Environment::Prd),
            _ => Err(WidgetError::UnknownEnvironment {
                value: s.to_string(),
            }),
        }
    }
}

/// Chat routing target, meaningful only relative to an environment
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentType(String);

impl AgentType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AgentType {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Availability of one agent, as shown in the agent picker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentAvailability {
    pub agent: AgentType,
    pub available: bool,
}

/// Environment -> agent -> bool, in registration order
///
/// Closed world: any pair not listed is unavailable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AvailabilityMatrix {
    rows: Vec<(Environment, Vec<AgentAvailability>)>,
}

impl AvailabilityMatrix {
    fn row(&self, env: Environment) -> Option<&[AgentAvailability]> {
        self.rows
            .iter()
            .find(|(e, _)| *e == env)
            .map(|(_, agents)| agents.as_slice())
    }

    pub fn is_available(&self, env: Environment, agent: &AgentType) -> bool {
        self.row(env)
            .and_then(|agents| agents.iter().find(|a| &a.agent == agent))
            .map(|a| a.available)
            .unwrap_or(false)
    }

    pub fn first_available(&self, env: Environment) -> Option<&AgentType> {
        self.row(env)?
            .iter()
            .find(|a| a.available)
            .map(|a| &a.agent)
    }

    /// Every registered agent of an environment with its availability
    pub fn agents(&self, env: Environment) -> &[AgentAvailability] {
        self.row(env).unwrap_or(&[])
    }

    pub fn environments(&self) -> impl Iterator<Item = Environment> + '_ {
        self.rows.iter().map(|(e, _)| *e)
    }
}

/// Static registry of widget configurations
///
/// Built once from a [`LoaderManifest`] and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct ConfigRegistry {
    default_environment: Environment,
    readiness_event: String,
    matrix: AvailabilityMatrix,
    configs: HashMap<(Environment, AgentType), WidgetConfig>,
    teardown: TeardownConfig,
}

impl ConfigRegistry {
    /// Build a registry from a validated manifest
    pub fn from_manifest(manifest: &LoaderManifest) -> Result<Self> {
        manifest.validate()?;

        let mut rows = Vec::with_capacity(manifest.environments.len());
        let mut configs = HashMap::new();

        for env in &manifest.environments {
            let mut agents = Vec::with_capacity(env.agents.len());
            for entry in &env.agents {
                agents.push(AgentAvailability {
                    agent: entry.agent.clone(),
                    available: entry.available,
                });
                configs.insert((env.environment, entry.agent.clone()), entry.widget.clone());
            }
            rows.push((env.environment, agents));
        }

        Ok(Self {
            default_environment: manifest.default_environment,
            readiness_event: manifest.readiness_event.clone(),
            matrix: AvailabilityMatrix { rows },
            configs,
            teardown: manifest.teardown.clone(),
        })
    }

    /// Registry for the manifest embedded in the crate
    pub fn builtin() -> Result<Self> {
        Self::from_manifest(&LoaderManifest::builtin()?)
    }

    /// Look up the launch configuration for a pair
    ///
    /// `None` means the pair is not registered and nothing may be injected.
    pub fn get_config(&self, env: Environment, agent: &AgentType) -> Option<&WidgetConfig> {
        self.configs.get(&(env, agent.clone()))
    }

    /// Like [`get_config`](Self::get_config) but reports a `ConfigurationMiss`
    pub fn require_config(&self, env: Environment, agent: &AgentType) -> Result<&WidgetConfig> {
        self.get_config(env, agent)
            .ok_or_else(|| WidgetError::ConfigurationMiss {
                environment: env.to_string(),
                agent: agent.to_string(),
            })
    }

    pub fn is_available(&self, env: Environment, agent: &AgentType) -> bool {
        self.matrix.is_available(env, agent)
    }

    /// First available agent of `env` in registration order
    pub fn first_available_agent(&self, env: Environment) -> Option<&AgentType> {
        self.matrix.first_available(env)
    }

    pub fn availability(&self, env: Environment) -> &[AgentAvailability] {
        self.matrix.agents(env)
    }

    pub fn matrix(&self) -> &AvailabilityMatrix {
        &self.matrix
    }

    pub fn environments(&self) -> Vec<Environment> {
        self.matrix.environments().collect()
    }

    pub fn default_environment(&self) -> Environment {
        self.default_environment
    }

    pub fn readiness_event(&self) -> &str {
        &self.readiness_event
    }

    pub fn teardown(&self) -> &TeardownConfig {
        &self.teardown
    }

    /// Distinct script element ids used by any configuration
    pub fn script_element_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .configs
            .values()
            .map(|c| c.script_element_id.as_str())
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
