//! Loader manifest definitions
//!
//! The manifest is the single JSON document describing every environment,
//! its agents in registration order, the widget launch configuration for each
//! pair, and the constants the loader needs at runtime.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::registry::{AgentType, Environment};
use crate::error::{Result, WidgetError};

/// Built-in manifest shipped with the crate
pub const BUILTIN_MANIFEST: &str = include_str!("../../config/widgets.json");

/// Root of the loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoaderManifest {
    /// Environment selected when the page starts
    pub default_environment: Environment,

    /// Name of the DOM event the widget fires once its SDK is initialized
    #[serde(default = "default_readiness_event")]
    pub readiness_event: String,

    /// Environments in display order
    pub environments: Vec<ManifestEnvironment>,

    /// What teardown removes before each injection
    #[serde(default)]
    pub teardown: TeardownConfig,

    /// Visitor data collection settings
    #[serde(default)]
    pub visitor: VisitorConfig,

    /// Access gate settings
    #[serde(default)]
    pub access: AccessConfig,
}

fn default_readiness_event() -> String {
    "lcw:ready".to_string()
}

/// One environment and its agents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestEnvironment {
    pub environment: Environment,

    /// Agents in registration order
    #[serde(default)]
    pub agents: Vec<ManifestAgent>,
}

/// One agent entry within an environment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestAgent {
    pub agent: AgentType,

    /// Availability matrix value for this pair
    #[serde(default)]
    pub available: bool,

    pub widget: WidgetConfig,
}

/// Immutable widget launch configuration
///
/// Every attribute is applied to the injected script element as a literal
/// string attribute, including empty-valued flags such as `v2`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetConfig {
    pub script_element_id: String,
    pub primary_source_url: String,
    pub fallback_source_url: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Selectors and globals removed during teardown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeardownConfig {
    /// Comma-separated selector list for widget iframes
    #[serde(default = "default_iframe_selectors")]
    pub iframe_selectors: String,

    /// Comma-separated selector list for widget container nodes
    #[serde(default = "default_container_selectors")]
    pub container_selectors: String,

    /// Dotted path of the global namespace the SDK installs
    #[serde(default = "default_sdk_namespace")]
    pub sdk_namespace: String,

    /// Dotted path of the context-provider registration function
    #[serde(default = "default_context_api")]
    pub context_api: String,
}

fn default_iframe_selectors() -> String {
    r#"iframe[id*="oc-lcw"], iframe[title*="Chat"], iframe[src*="livechatwidget"]"#.to_string()
}

fn default_container_selectors() -> String {
    r#"div[id*="oc-lcw"], div[class*="oc-lcw"]"#.to_string()
}

fn default_sdk_namespace() -> String {
    "Microsoft.Omnichannel.LiveChatWidget".to_string()
}

fn default_context_api() -> String {
    "Microsoft.Omnichannel.LiveChatWidget.SDK.setContextProvider".to_string()
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            iframe_selectors: default_iframe_selectors(),
            container_selectors: default_container_selectors(),
            sdk_namespace: default_sdk_namespace(),
            context_api: default_context_api(),
        }
    }
}

/// Visitor data collection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorConfig {
    /// Query-string parameter carrying the referral code
    #[serde(default = "default_referral_parameter")]
    pub referral_parameter: String,

    /// Referral code used when the parameter is absent or empty
    #[serde(default = "default_referral")]
    pub default_referral: String,

    #[serde(default = "default_ip_lookup_url")]
    pub ip_lookup_url: String,

    #[serde(default = "default_geo_lookup_url")]
    pub geo_lookup_url: String,
}

fn default_referral_parameter() -> String {
    "referrer".to_string()
}

fn default_referral() -> String {
    "KHL".to_string()
}

fn default_ip_lookup_url() -> String {
    "https://api.ipify.org?format=json".to_string()
}

fn default_geo_lookup_url() -> String {
    "https://ipapi.co/json/".to_string()
}

impl Default for VisitorConfig {
    fn default() -> Self {
        Self {
            referral_parameter: default_referral_parameter(),
            default_referral: default_referral(),
            ip_lookup_url: default_ip_lookup_url(),
            geo_lookup_url: default_geo_lookup_url(),
        }
    }
}

/// Access gate settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    pub access_code: String,

    /// Session storage key holding the unlock flag
    #[serde(default = "default_session_key")]
    pub session_key: String,
}

fn default_session_key() -> String {
    "isAuthenticated".to_string()
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            access_code: "code123".to_string(),
            session_key: default_session_key(),
        }
    }
}

impl LoaderManifest {
    /// Parse and validate the manifest embedded in the crate
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_MANIFEST)
    }

    /// Parse and validate a manifest from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let manifest: LoaderManifest = serde_json::from_str(json)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Read, parse and validate a manifest file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check the structural invariants the registry relies on
    pub fn validate(&self) -> Result<()> {
        if self.environments.is_empty() {
            return Err(invalid("no environments defined"));
        }

        let mut seen_envs = HashSet::new();
        for env in &self.environments {
            if !seen_envs.insert(env.environment) {
                return Err(invalid(format!(
                    "environment '{}' listed more than once",
                    env.environment
                )));
            }

            let mut seen_agents = HashSet::new();
            for entry in &env.agents {
                if entry.agent.as_str().is_empty() {
                    return Err(invalid(format!(
                        "empty agent name in environment '{}'",
                        env.environment
                    )));
                }
                if !seen_agents.insert(&entry.agent) {
                    return Err(invalid(format!(
                        "agent '{}' listed more than once in environment '{}'",
                        entry.agent, env.environment
                    )));
                }
                validate_widget(env.environment, &entry.agent, &entry.widget)?;
            }
        }

        if !seen_envs.contains(&self.default_environment) {
            return Err(invalid(format!(
                "default environment '{}' is not defined",
                self.default_environment
            )));
        }

        if self.readiness_event.trim().is_empty() {
            return Err(invalid("readiness_event must not be empty"));
        }

        Ok(())
    }

    /// Find an environment entry
    pub fn environment(&self, env: Environment) -> Option<&ManifestEnvironment> {
        self.environments.iter().find(|e| e.environment == env)
    }
}

fn validate_widget(env: Environment, agent: &AgentType, widget: &WidgetConfig) -> Result<()> {
    let fields = [
        ("script_element_id", &widget.script_element_id),
        ("primary_source_url", &widget.primary_source_url),
        ("fallback_source_url", &widget.fallback_source_url),
    ];
    for (name, value) in fields {
        if value.trim().is_empty() {
            return Err(invalid(format!(
                "{} is empty for agent '{}' in environment '{}'",
                name, agent, env
            )));
        }
    }
    Ok(())
}

fn invalid(reason: impl Into<String>) -> WidgetError {
    WidgetError::InvalidManifest {
        reason: reason.into(),
    }
}
