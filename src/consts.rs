use std::time::Duration;

// MQTT payloads. Case sensitive, matched exactly.
pub const ON: &str = "ON";
pub const OFF: &str = "OFF";
pub const ONLINE: &str = "online";

// Topic path segments under the configured prefix.
pub const RELAY: &str = "relay";
pub const INPUT: &str = "input";
pub const STATE: &str = "state";

/// A press within this window of the first press counts as the second click
/// of the same gesture.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_secs(1);
/// Holding the button at least this long classifies the gesture as long.
pub const LONG_PRESS_THRESHOLD: Duration = Duration::from_secs(1);
/// How often a pending gesture is re-checked while the button is held.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// After a release, how long to wait for a second click before classifying.
pub const SECOND_CLICK_WINDOW: Duration = Duration::from_millis(300);

/// Gesture classification of one complete press/release interaction.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ClickKind {
    /// One press and release, no second click within the window.
    Single,
    /// Two presses within the debounce window. Emitted once, on the probe.
    Double,
    /// Held past the long-press threshold. Emitted while still held.
    Long,
}

impl ClickKind {
    /// Wire payload for the input notification topic.
    pub fn as_str(self) -> &'static str {
        match self {
            ClickKind::Single => "single",
            ClickKind::Double => "double",
            ClickKind::Long => "long",
        }
    }
}

/// Software version
pub const GATE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GATE_NAME: &str = "gpio-gate";

pub const HA_DISCOVERY_TOPIC: &str = "homeassistant";
