//! Relay coordination: routes bus commands and classified gestures to the
//! physical outputs and mirrors confirmed state back out.
//!
//! The manager's run loop is the sole writer of relay state. Commands and
//! gestures funnel through one `select!`, so a command racing a
//! gesture-triggered toggle on the same relay can never interleave its
//! read-modify-write.

use crate::config::DiscoveryConfig;
use crate::consts::{self, ClickKind};
use crate::error::ConfigError;
use crate::input::GestureEvent;
use crate::mqtt::{discovery, Bus, Incoming, Outgoing};
use crate::relay::Relay;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

pub struct RelayManager {
    relays: HashMap<String, Relay>,
    /// Startup/publish order; HashMap iteration is not deterministic.
    relay_order: Vec<String>,
    /// input id -> relay id toggled by a single click.
    bindings: HashMap<String, String>,
    topic_prefix: String,
    outgoing: mpsc::Sender<Outgoing>,
}

impl RelayManager {
    /// Build the manager. A binding pointing at a relay we do not own is a
    /// fatal configuration error, caught before anything subscribes.
    pub fn new(
        relays: Vec<Relay>,
        bindings: HashMap<String, String>,
        topic_prefix: impl Into<String>,
        outgoing: mpsc::Sender<Outgoing>,
    ) -> Result<Self, ConfigError> {
        let relay_order: Vec<String> = relays.iter().map(|r| r.id().to_string()).collect();
        let relays: HashMap<String, Relay> =
            relays.into_iter().map(|r| (r.id().to_string(), r)).collect();
        if relay_order.len() != relays.len() {
            // Two relays collapsed onto one id.
            let mut seen = HashSet::new();
            let duplicate = relay_order
                .iter()
                .find(|id| !seen.insert(id.as_str()))
                .cloned()
                .unwrap_or_default();
            return Err(ConfigError::DuplicateRelay(duplicate));
        }
        for (input, relay) in &bindings {
            if !relays.contains_key(relay) {
                return Err(ConfigError::UnknownBindingRelay {
                    input: input.clone(),
                    relay: relay.clone(),
                });
            }
        }

        Ok(RelayManager {
            relays,
            relay_order,
            bindings,
            topic_prefix: topic_prefix.into(),
            outgoing,
        })
    }

    /// Startup sequence: drive every relay OFF and publish its state, send
    /// discovery payloads, subscribe to command topics, then announce
    /// ourselves online.
    pub async fn start(&mut self, discovery_config: &DiscoveryConfig) -> anyhow::Result<()> {
        for relay_id in self.relay_order.clone() {
            if let Some(relay) = self.relays.get_mut(&relay_id) {
                match relay.turn_off() {
                    Ok(()) => {
                        let on = relay.is_active();
                        self.outgoing
                            .send(Outgoing::RelayState {
                                relay_id: relay_id.clone(),
                                on,
                            })
                            .await?;
                    }
                    Err(err) => error!("Initial off failed: {}", err),
                }
            }

            if discovery_config.enabled {
                let announcement = discovery::new_switch(
                    &self.topic_prefix,
                    &relay_id,
                    &discovery_config.topic_prefix,
                );
                self.outgoing.send(Outgoing::Discovery(announcement)).await?;
            }

            self.outgoing
                .send(Outgoing::Subscribe(format!(
                    "{}/{}/{}/set",
                    self.topic_prefix,
                    consts::RELAY,
                    relay_id
                )))
                .await?;
        }

        self.outgoing.send(Outgoing::Online).await?;
        info!("Manager started with {} relays", self.relay_order.len());
        Ok(())
    }

    /// Apply a raw command payload to a relay. Unknown relays and foreign
    /// payloads are bus noise, not errors. The same command twice produces
    /// the same state and a fresh publish each time; the publish doubles as
    /// a liveness confirmation.
    pub async fn handle_command(&mut self, relay_id: &str, payload: &str) {
        let on = match payload {
            consts::ON => true,
            consts::OFF => false,
            _ => {
                debug!("Unrecognized payload '{}' for relay {} - ignoring", payload, relay_id);
                return;
            }
        };
        let Some(relay) = self.relays.get_mut(relay_id) else {
            debug!("Command for unknown relay {} - ignoring", relay_id);
            return;
        };

        let result = if on { relay.turn_on() } else { relay.turn_off() };
        match result {
            Ok(()) => self.publish_state(relay_id).await,
            // Failed write: published state keeps reflecting the last
            // confirmed level.
            Err(err) => error!("Actuation failed: {}", err),
        }
    }

    /// Forward a classified gesture. The notification goes out regardless
    /// of bindings; only a single click on a bound input actuates.
    pub async fn handle_gesture(&mut self, channel_id: &str, kind: ClickKind) {
        self.publish(Outgoing::Gesture {
            channel_id: channel_id.to_string(),
            kind,
        })
        .await;

        if kind != ClickKind::Single {
            return;
        }
        let Some(relay_id) = self.bindings.get(channel_id).cloned() else {
            return;
        };
        let Some(relay) = self.relays.get_mut(&relay_id) else {
            return;
        };
        match relay.toggle() {
            Ok(()) => self.publish_state(&relay_id).await,
            Err(err) => error!("Toggle failed: {}", err),
        }
    }

    async fn publish_state(&self, relay_id: &str) {
        let Some(relay) = self.relays.get(relay_id) else {
            return;
        };
        self.publish(Outgoing::RelayState {
            relay_id: relay_id.to_string(),
            on: relay.is_active(),
        })
        .await;
    }

    async fn publish(&self, msg: Outgoing) {
        // Transport-side failures are logged downstream; a closed queue
        // only happens on shutdown.
        if self.outgoing.send(msg).await.is_err() {
            error!("Publish queue closed");
        }
    }

    /// Event loop: single writer for all relay state.
    pub async fn run(mut self, bus: Arc<Bus>, mut gestures: mpsc::Receiver<GestureEvent>) {
        loop {
            tokio::select! {
                incoming = bus.recv() => {
                    match incoming {
                        Some(Incoming::RelayCommand { relay_id, payload }) => {
                            info!("Command for relay {}: '{}'", relay_id, payload);
                            self.handle_command(&relay_id, &payload).await;
                        }
                        None => break,
                    }
                }
                gesture = gestures.recv() => {
                    match gesture {
                        Some(event) => {
                            info!("Gesture {} on input {}", event.kind.as_str(), event.channel_id);
                            self.handle_gesture(&event.channel_id, event.kind).await;
                        }
                        None => break,
                    }
                }
            }
        }
        info!("Manager loop finishing");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HardwareError;
    use crate::gpio::OutputPin;
    use std::sync::Mutex;

    #[derive(Default)]
    struct PinProbe {
        on: bool,
        writes: usize,
        fail: bool,
    }

    struct FakePin(Arc<Mutex<PinProbe>>);

    impl OutputPin for FakePin {
        fn write(&mut self, on: bool) -> Result<(), HardwareError> {
            let mut probe = self.0.lock().unwrap();
            if probe.fail {
                return Err(HardwareError {
                    pin: "fake".into(),
                    reason: "write refused".into(),
                });
            }
            probe.on = on;
            probe.writes += 1;
            Ok(())
        }

        fn read(&self) -> bool {
            self.0.lock().unwrap().on
        }
    }

    fn fake_relay(id: &str) -> (Relay, Arc<Mutex<PinProbe>>) {
        let probe = Arc::new(Mutex::new(PinProbe::default()));
        (Relay::new(id, Box::new(FakePin(probe.clone()))), probe)
    }

    fn manager_with_one_relay(
        bindings: HashMap<String, String>,
    ) -> (RelayManager, Arc<Mutex<PinProbe>>, mpsc::Receiver<Outgoing>) {
        let (tx, rx) = mpsc::channel(32);
        let (relay, probe) = fake_relay("r1");
        let manager = RelayManager::new(vec![relay], bindings, "gate", tx).unwrap();
        (manager, probe, rx)
    }

    #[tokio::test]
    async fn should_reject_binding_to_missing_relay() {
        let (tx, _rx) = mpsc::channel(8);
        let (relay, _) = fake_relay("r1");
        let bindings = HashMap::from([("b1".to_string(), "ghost".to_string())]);
        let result = RelayManager::new(vec![relay], bindings, "gate", tx);
        assert!(matches!(
            result,
            Err(ConfigError::UnknownBindingRelay { .. })
        ));
    }

    #[tokio::test]
    async fn should_ignore_command_for_unknown_relay() {
        let (mut manager, probe, mut rx) = manager_with_one_relay(HashMap::new());
        manager.handle_command("ghost", "ON").await;
        assert!(rx.try_recv().is_err());
        assert_eq!(probe.lock().unwrap().writes, 0);
    }

    #[tokio::test]
    async fn should_ignore_unrecognized_payload() {
        let (mut manager, probe, mut rx) = manager_with_one_relay(HashMap::new());
        manager.handle_command("r1", "on").await;
        manager.handle_command("r1", "TOGGLE").await;
        assert!(rx.try_recv().is_err());
        assert_eq!(probe.lock().unwrap().writes, 0);
    }

    #[tokio::test]
    async fn should_actuate_and_publish_on_each_repeated_command() {
        let (mut manager, probe, mut rx) = manager_with_one_relay(HashMap::new());
        manager.handle_command("r1", "ON").await;
        manager.handle_command("r1", "ON").await;

        for _ in 0..2 {
            match rx.try_recv().unwrap() {
                Outgoing::RelayState { relay_id, on } => {
                    assert_eq!(relay_id, "r1");
                    assert!(on);
                }
                other => panic!("unexpected message {:?}", other),
            }
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(probe.lock().unwrap().writes, 2);
    }

    #[tokio::test]
    async fn should_turn_off_on_command() {
        let (mut manager, probe, mut rx) = manager_with_one_relay(HashMap::new());
        manager.handle_command("r1", "ON").await;
        manager.handle_command("r1", "OFF").await;

        let _ = rx.try_recv().unwrap();
        match rx.try_recv().unwrap() {
            Outgoing::RelayState { on, .. } => assert!(!on),
            other => panic!("unexpected message {:?}", other),
        }
        assert!(!probe.lock().unwrap().on);
    }

    #[tokio::test]
    async fn should_not_publish_when_write_fails() {
        let (mut manager, probe, mut rx) = manager_with_one_relay(HashMap::new());
        probe.lock().unwrap().fail = true;
        manager.handle_command("r1", "ON").await;
        assert!(rx.try_recv().is_err());
        assert_eq!(probe.lock().unwrap().writes, 0);
    }

    #[tokio::test]
    async fn should_toggle_bound_relay_on_single_click() {
        let bindings = HashMap::from([("b1".to_string(), "r1".to_string())]);
        let (mut manager, probe, mut rx) = manager_with_one_relay(bindings);

        manager.handle_gesture("b1", ClickKind::Single).await;

        match rx.try_recv().unwrap() {
            Outgoing::Gesture { channel_id, kind } => {
                assert_eq!(channel_id, "b1");
                assert_eq!(kind, ClickKind::Single);
            }
            other => panic!("unexpected message {:?}", other),
        }
        match rx.try_recv().unwrap() {
            Outgoing::RelayState { relay_id, on } => {
                assert_eq!(relay_id, "r1");
                assert!(on);
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert_eq!(probe.lock().unwrap().writes, 1);

        // Second single click toggles back off.
        manager.handle_gesture("b1", ClickKind::Single).await;
        let _ = rx.try_recv().unwrap();
        match rx.try_recv().unwrap() {
            Outgoing::RelayState { on, .. } => assert!(!on),
            other => panic!("unexpected message {:?}", other),
        }
    }

    #[tokio::test]
    async fn should_not_actuate_on_double_or_long_even_when_bound() {
        let bindings = HashMap::from([("b1".to_string(), "r1".to_string())]);
        let (mut manager, probe, mut rx) = manager_with_one_relay(bindings);

        manager.handle_gesture("b1", ClickKind::Double).await;
        manager.handle_gesture("b1", ClickKind::Long).await;

        assert!(matches!(rx.try_recv().unwrap(), Outgoing::Gesture { .. }));
        assert!(matches!(rx.try_recv().unwrap(), Outgoing::Gesture { .. }));
        assert!(rx.try_recv().is_err());
        assert_eq!(probe.lock().unwrap().writes, 0);
    }

    #[tokio::test]
    async fn should_publish_gesture_for_unbound_input() {
        let (mut manager, probe, mut rx) = manager_with_one_relay(HashMap::new());
        manager.handle_gesture("b9", ClickKind::Single).await;
        assert!(matches!(rx.try_recv().unwrap(), Outgoing::Gesture { .. }));
        assert!(rx.try_recv().is_err());
        assert_eq!(probe.lock().unwrap().writes, 0);
    }

    #[tokio::test]
    async fn should_run_startup_sequence_in_order() {
        let (mut manager, probe, mut rx) = manager_with_one_relay(HashMap::new());
        let discovery_config = DiscoveryConfig::default();
        manager.start(&discovery_config).await.unwrap();

        match rx.try_recv().unwrap() {
            Outgoing::RelayState { relay_id, on } => {
                assert_eq!(relay_id, "r1");
                assert!(!on);
            }
            other => panic!("unexpected message {:?}", other),
        }
        assert!(matches!(rx.try_recv().unwrap(), Outgoing::Discovery(_)));
        match rx.try_recv().unwrap() {
            Outgoing::Subscribe(topic) => assert_eq!(topic, "gate/relay/r1/set"),
            other => panic!("unexpected message {:?}", other),
        }
        assert!(matches!(rx.try_recv().unwrap(), Outgoing::Online));
        assert_eq!(probe.lock().unwrap().writes, 1);
    }

    #[tokio::test]
    async fn should_skip_discovery_when_disabled() {
        let (mut manager, _probe, mut rx) = manager_with_one_relay(HashMap::new());
        let discovery_config = DiscoveryConfig {
            enabled: false,
            topic_prefix: "homeassistant".into(),
        };
        manager.start(&discovery_config).await.unwrap();

        assert!(matches!(rx.try_recv().unwrap(), Outgoing::RelayState { .. }));
        assert!(matches!(rx.try_recv().unwrap(), Outgoing::Subscribe(_)));
        assert!(matches!(rx.try_recv().unwrap(), Outgoing::Online));
        assert!(rx.try_recv().is_err());
    }
}
