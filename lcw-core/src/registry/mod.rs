//! Config Registry - which widget loads where
//!
//! Maps an (environment, agent) pair to the launch configuration of the
//! externally hosted widget script, and answers availability questions from
//! a closed-world matrix.
//!
//! ```text
//!   widgets.json ──► LoaderManifest ──validate──► ConfigRegistry
//!                                                   │
//!               get_config(env, agent) ◄────────────┤
//!               is_available(env, agent) ◄──────────┤
//!               first_available_agent(env) ◄────────┘
//! ```

mod manifest;
#[allow(clippy::module_inception)]
mod registry;

pub use manifest::{
    AccessConfig, LoaderManifest, ManifestAgent, ManifestEnvironment, TeardownConfig,
    VisitorConfig, WidgetConfig, BUILTIN_MANIFEST,
};
pub use registry::{AgentAvailability, AgentType, AvailabilityMatrix, ConfigRegistry, Environment};

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> ConfigRegistry {
        ConfigRegistry::builtin().unwrap()
    }

    #[test]
    fn test_get_config_for_registered_pair() {
        let registry = registry();
        let config = registry
            .get_config(Environment::Dev, &AgentType::from("specialist"))
            .unwrap();

        assert_eq!(config.script_element_id, "Microsoft_Omnichannel_LCWidget");
        assert_eq!(
            config.attributes.get("data-app-id").map(String::as_str),
            Some("7eaac707-889b-4572-98c2-b9bb1eb80b03")
        );
        assert_eq!(config.attributes.get("v2").map(String::as_str), Some(""));
    }

    #[test]
    fn test_get_config_miss() {
        let registry = registry();
        assert!(registry
            .get_config(Environment::Dev, &AgentType::from("billing"))
            .is_none());

        let err = registry
            .require_config(Environment::Uat, &AgentType::from("billing"))
            .unwrap_err();
        assert_eq!(err.error_code(), "CONFIGURATION_MISS");
    }

    #[test]
    fn test_availability_defaults_to_false() {
        let registry = registry();
        assert!(registry.is_available(Environment::Dev, &AgentType::from("default")));
        assert!(!registry.is_available(Environment::Uat, &AgentType::from("specialist")));
        assert!(!registry.is_available(Environment::Dev, &AgentType::from("billing")));
    }

    #[test]
    fn test_first_available_agent_uses_registration_order() {
        let registry = registry();
        assert_eq!(
            registry.first_available_agent(Environment::Dev),
            Some(&AgentType::from("default"))
        );
        assert_eq!(registry.first_available_agent(Environment::Prd), None);
    }

    #[test]
    fn test_script_element_ids_are_distinct() {
        let registry = registry();
        assert_eq!(
            registry.script_element_ids(),
            vec!["Microsoft_Omnichannel_LCWidget"]
        );
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!("UAT".parse::<Environment>().unwrap(), Environment::Uat);
        let err = "staging".parse::<Environment>().unwrap_err();
        assert_eq!(err.error_code(), "UNKNOWN_ENVIRONMENT");
    }
}
