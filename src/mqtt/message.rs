use super::discovery;
use crate::consts::ClickKind;

/// Things we publish to the bus.
#[derive(Debug)]
pub enum Outgoing {
    /// Subscribe to a topic given as argument. Not a real message.
    Subscribe(String),
    /// `{prefix}/state` = "online", sent once on startup.
    Online,
    /// Confirmed relay state, published retained to `{prefix}/relay/{id}`.
    RelayState { relay_id: String, on: bool },
    /// Gesture notification for `{prefix}/input/{id}`.
    Gesture { channel_id: String, kind: ClickKind },
    /// Home Assistant discovery payload with its config topic.
    Discovery(discovery::Announcement),
}

/// Things the bus sends to us.
#[derive(Debug)]
pub enum Incoming {
    /// Raw payload seen on `{prefix}/relay/{id}/set`. Decoding (and
    /// ignoring noise) is the manager's call.
    RelayCommand { relay_id: String, payload: String },
}
