use thiserror::Error;

/// Fatal configuration problems. Any of these aborts startup before the
/// first MQTT subscription happens.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("duplicate relay id '{0}'")]
    DuplicateRelay(String),

    #[error("duplicate input id '{0}'")]
    DuplicateInput(String),

    #[error("binding references unknown input '{0}'")]
    UnknownBindingInput(String),

    #[error("binding for input '{input}' references unknown relay '{relay}'")]
    UnknownBindingRelay { input: String, relay: String },

    #[error("empty id in {0} list")]
    EmptyId(&'static str),
}

/// A physical write failed. Reported, never fatal; the relay keeps its
/// previously confirmed state and nothing is published.
#[derive(Error, Debug)]
#[error("output '{pin}' write failed: {reason}")]
pub struct HardwareError {
    pub pin: String,
    pub reason: String,
}
