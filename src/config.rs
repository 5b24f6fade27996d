use crate::error::ConfigError;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub enabled: bool,
    #[serde(default = "default_discovery_prefix")]
    pub topic_prefix: String,
}

fn default_discovery_prefix() -> String {
    crate::consts::HA_DISCOVERY_TOPIC.to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            enabled: true,
            topic_prefix: default_discovery_prefix(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Relay channel ids, opaque labels. One MQTT switch each.
    pub output: Vec<String>,
    /// Input channel ids, opaque labels. One gesture classifier each.
    #[serde(default)]
    pub input: Vec<String>,
    /// Optional input id -> relay id map; a single click on the input
    /// toggles the relay.
    #[serde(default)]
    pub relay_input_map: HashMap<String, String>,
    #[serde(default)]
    pub ha_discovery: DiscoveryConfig,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(filename: P) -> anyhow::Result<Self> {
        let handle = File::open(filename)?;
        let data: Config = serde_yaml::from_reader(handle)?;
        data.validate()?;
        Ok(data)
    }

    /// Startup-time validation. Errors here are fatal.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut relays = HashSet::new();
        for id in &self.output {
            if id.is_empty() {
                return Err(ConfigError::EmptyId("output"));
            }
            if !relays.insert(id.as_str()) {
                return Err(ConfigError::DuplicateRelay(id.clone()));
            }
        }

        let mut inputs = HashSet::new();
        for id in &self.input {
            if id.is_empty() {
                return Err(ConfigError::EmptyId("input"));
            }
            if !inputs.insert(id.as_str()) {
                return Err(ConfigError::DuplicateInput(id.clone()));
            }
        }

        for (input, relay) in &self.relay_input_map {
            if !inputs.contains(input.as_str()) {
                return Err(ConfigError::UnknownBindingInput(input.clone()));
            }
            if !relays.contains(relay.as_str()) {
                return Err(ConfigError::UnknownBindingRelay {
                    input: input.clone(),
                    relay: relay.clone(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).expect("yaml should parse")
    }

    #[test]
    fn should_accept_full_config() {
        let config = parse(
            "output: [r1, r2]\n\
             input: [b1, b2]\n\
             relay_input_map:\n  b1: r2\n\
             ha_discovery:\n  enabled: false\n  topic_prefix: custom\n",
        );
        assert!(config.validate().is_ok());
        assert_eq!(config.relay_input_map.get("b1"), Some(&"r2".to_string()));
        assert!(!config.ha_discovery.enabled);
    }

    #[test]
    fn should_default_discovery_when_missing() {
        let config = parse("output: [r1]\n");
        assert!(config.validate().is_ok());
        assert!(config.ha_discovery.enabled);
        assert_eq!(config.ha_discovery.topic_prefix, "homeassistant");
    }

    #[test]
    fn should_reject_binding_to_unknown_relay() {
        let config = parse(
            "output: [r1]\ninput: [b1]\nrelay_input_map:\n  b1: nope\n",
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownBindingRelay {
                input: "b1".into(),
                relay: "nope".into()
            })
        );
    }

    #[test]
    fn should_reject_binding_from_unknown_input() {
        let config = parse(
            "output: [r1]\ninput: [b1]\nrelay_input_map:\n  ghost: r1\n",
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownBindingInput("ghost".into()))
        );
    }

    #[test]
    fn should_reject_duplicate_relay_ids() {
        let config = parse("output: [r1, r1]\n");
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateRelay("r1".into()))
        );
    }
}
