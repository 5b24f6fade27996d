//! Home Assistant MQTT discovery payloads.
//!
//! Pure functions of their inputs: calling twice with identical arguments
//! yields byte-identical payloads (serde_json keeps struct field order).

use crate::consts;
use serde::Serialize;

#[derive(Serialize, Debug)]
pub struct Availability {
    pub topic: String,
}

/// Device identity shown in the HA device registry.
#[derive(Serialize, Debug)]
pub struct Device {
    pub identifiers: Vec<String>,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
    pub sw_version: String,
}

/// One `switch` component config.
#[derive(Serialize, Debug)]
pub struct SwitchConfig {
    pub availability: Vec<Availability>,
    pub command_topic: String,
    pub device: Device,
    pub name: String,
    pub payload_off: String,
    pub payload_on: String,
    pub state_topic: String,
    pub unique_id: String,
    pub value_template: String,
}

/// A discovery payload together with the config topic it goes to.
#[derive(Debug)]
pub struct Announcement {
    pub topic: String,
    pub config: SwitchConfig,
}

impl Announcement {
    pub fn serialize(&self) -> String {
        serde_json::to_string(&self.config).expect("All should be serializable")
    }
}

/// Build the discovery announcement for one relay.
pub fn new_switch(topic_prefix: &str, relay_id: &str, discovery_prefix: &str) -> Announcement {
    let config = SwitchConfig {
        availability: vec![Availability {
            topic: format!("{}/{}", topic_prefix, consts::STATE),
        }],
        command_topic: format!("{}/{}/{}/set", topic_prefix, consts::RELAY, relay_id),
        device: Device {
            identifiers: vec![topic_prefix.to_string()],
            manufacturer: consts::GATE_NAME.to_string(),
            model: "GPIO Relay Board".to_string(),
            name: format!("{} {}", consts::GATE_NAME, topic_prefix),
            sw_version: consts::GATE_VERSION.to_string(),
        },
        name: format!("Relay {}", relay_id),
        payload_off: consts::OFF.to_string(),
        payload_on: consts::ON.to_string(),
        state_topic: format!("{}/{}/{}", topic_prefix, consts::RELAY, relay_id),
        unique_id: format!("{}{}{}", topic_prefix, consts::RELAY, relay_id),
        value_template: "{{ value_json.state }}".to_string(),
    };

    Announcement {
        topic: format!("{}/switch/{}/switch/config", discovery_prefix, topic_prefix),
        config,
    }
}
