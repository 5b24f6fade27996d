use super::{Incoming, Outgoing};
use crate::consts;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use rumqttc::{Event, Packet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::{sync::Mutex, task};

use tracing::{debug, error, info, warn};

pub struct Initiator {
    client: AsyncClient,
    event_loop: EventLoop,
    topic_prefix: String,
}

/// MQTT bus endpoint the rest of the daemon talks to.
pub struct Bus {
    /// Outgoing event queue: things we publish.
    outgoing: mpsc::Sender<Outgoing>,
    /// Incoming event queue: commands read from the bus.
    incoming: Mutex<mpsc::Receiver<Incoming>>,
}

/// Extract the relay id from a `{prefix}/relay/{id}/set` topic.
fn parse_command_topic(topic_prefix: &str, topic: &str) -> Option<String> {
    let rest = topic.strip_prefix(topic_prefix)?.strip_prefix('/')?;
    let mut parts = rest.split('/');
    if parts.next() != Some(consts::RELAY) {
        return None;
    }
    let relay_id = parts.next()?;
    if relay_id.is_empty() || parts.next() != Some("set") || parts.next().is_some() {
        return None;
    }
    Some(relay_id.to_string())
}

impl Initiator {
    /// Connect to the broker. A broken connection here is a startup error
    /// and bubbles up, unlike transport hiccups later on.
    pub async fn new(
        id: &str,
        host: &str,
        port: u16,
        username: &str,
        password: &str,
        topic_prefix: &str,
    ) -> anyhow::Result<Self> {
        let mut mqttoptions = MqttOptions::new(id, host, port);
        mqttoptions.set_keep_alive(Duration::from_secs(5));
        mqttoptions.set_credentials(username, password);

        let (client, mut event_loop) = AsyncClient::new(mqttoptions, 10);

        // Fail early if parameters are invalid.
        if let Err(err) = event_loop.poll().await {
            warn!("Initial connection to MQTT failed. Check connection parameters");
            anyhow::bail!("Unable to contact MQTT: {err}");
        }

        Ok(Initiator {
            client,
            event_loop,
            topic_prefix: topic_prefix.to_string(),
        })
    }

    async fn receiver(
        mut event_loop: EventLoop,
        topic_prefix: String,
        queue: mpsc::Sender<Incoming>,
    ) {
        loop {
            let notification = event_loop.poll().await;
            let result = match notification {
                Ok(Event::Incoming(Packet::Publish(msg))) => {
                    debug!("RX message to {} with payload '{:?}'", msg.topic, msg.payload);
                    let Some(relay_id) = parse_command_topic(&topic_prefix, &msg.topic) else {
                        // Shared bus; unrelated topics are expected noise.
                        debug!("Not a relay command topic - ignoring: {}", msg.topic);
                        continue;
                    };
                    let payload = String::from_utf8_lossy(&msg.payload).to_string();
                    queue
                        .send(Incoming::RelayCommand { relay_id, payload })
                        .await
                }
                Ok(Event::Outgoing(_))
                | Ok(Event::Incoming(Packet::PingResp))
                | Ok(Event::Incoming(Packet::SubAck(_)))
                | Ok(Event::Incoming(Packet::PubAck(_))) => {
                    // Silence common messages
                    continue;
                }
                Err(err) => {
                    // Transport errors are non-fatal; rumqttc reconnects on
                    // the next poll.
                    warn!("MQTT connection error: {:?}", err);
                    continue;
                }
                _ => {
                    debug!("Received other message = {:?}", notification);
                    continue;
                }
            };
            if result.is_err() {
                error!("Command consumer went away. Quitting receive loop");
                return;
            }
        }
    }

    async fn sender(client: AsyncClient, topic_prefix: String, mut queue: mpsc::Receiver<Outgoing>) {
        while let Some(command) = queue.recv().await {
            let result = match command {
                Outgoing::Subscribe(topic) => {
                    info!("Subscribing to {}", topic);
                    client.subscribe(&topic, QoS::AtMostOnce).await
                }
                Outgoing::Online => {
                    client
                        .publish(
                            format!("{}/{}", topic_prefix, consts::STATE),
                            QoS::AtLeastOnce,
                            false,
                            consts::ONLINE,
                        )
                        .await
                }
                Outgoing::RelayState { relay_id, on } => {
                    let payload = serde_json::json!({
                        consts::STATE: if on { consts::ON } else { consts::OFF }
                    });
                    client
                        .publish(
                            format!("{}/{}/{}", topic_prefix, consts::RELAY, relay_id),
                            QoS::AtLeastOnce,
                            true,
                            payload.to_string(),
                        )
                        .await
                }
                Outgoing::Gesture { channel_id, kind } => {
                    client
                        .publish(
                            format!("{}/{}/{}", topic_prefix, consts::INPUT, channel_id),
                            QoS::AtLeastOnce,
                            false,
                            kind.as_str(),
                        )
                        .await
                }
                Outgoing::Discovery(announcement) => {
                    let payload = announcement.serialize();
                    debug!(
                        "Sending discovery payload to {}: {}",
                        announcement.topic, payload
                    );
                    client
                        .publish(announcement.topic, QoS::AtLeastOnce, false, payload)
                        .await
                }
            };
            if let Err(err) = result {
                // Queued into a dead client; nothing left to publish to.
                error!("Unable to queue MQTT operation: {:?}", err);
                return;
            }
        }
    }

    pub fn start(self) -> Bus {
        let (out_sender, out_receiver) = mpsc::channel::<Outgoing>(10);
        let (in_sender, in_receiver) = mpsc::channel::<Incoming>(10);
        task::spawn(Self::receiver(
            self.event_loop,
            self.topic_prefix.clone(),
            in_sender,
        ));
        task::spawn(Self::sender(self.client, self.topic_prefix, out_receiver));

        Bus {
            outgoing: out_sender,
            incoming: Mutex::new(in_receiver),
        }
    }
}

impl Bus {
    /// Receive an incoming command. None means the receive loop finished.
    pub async fn recv(&self) -> Option<Incoming> {
        let mut incoming = self.incoming.lock().await;
        incoming.recv().await
    }

    /// Sender handle for components that publish on their own.
    pub fn sender(&self) -> mpsc::Sender<Outgoing> {
        self.outgoing.clone()
    }
}
