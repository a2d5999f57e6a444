//! MQTT adapter for the home automation message bus.

use super::{Destination, Inbound, Topics, Transport};
use crate::config::MqttConfig;
use crate::error::Result;
use log::{debug, error, info, warn};
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

/// MQTT connection plus the event loop that feeds the controller.
pub struct MqttClient {
    client: AsyncClient,
    event_loop: EventLoop,
}

impl MqttClient {
    /// Create a new MQTT client from configuration.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(&config.client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(Duration::from_secs(30));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }

        let (client, event_loop) = AsyncClient::new(options, 100);

        Self { client, event_loop }
    }

    /// Get a clone of the async client for publishing from other tasks.
    pub fn client(&self) -> AsyncClient {
        self.client.clone()
    }

    /// Poll the broker connection forever, routing publishes on the
    /// controller's inbound topics into `tx`.
    ///
    /// Inbound topics are subscribed on every ConnAck so a broker restart
    /// does not silently drop the subscriptions.
    pub async fn run(mut self, topics: Topics, tx: mpsc::Sender<Inbound>) {
        info!("[MQTT] Starting event loop");

        loop {
            match self.event_loop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("[MQTT] Connected, subscribing to inbound topics");
                    for topic in topics.subscribe_topics() {
                        if let Err(e) = self.client.try_subscribe(topic.clone(), QoS::AtMostOnce)
                        {
                            warn!("[MQTT] Failed to subscribe to {}: {:?}", topic, e);
                        }
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    let payload = match String::from_utf8(publish.payload.to_vec()) {
                        Ok(s) => s,
                        Err(e) => {
                            warn!("[MQTT] Invalid UTF-8 in payload on {}: {}", publish.topic, e);
                            continue;
                        }
                    };

                    debug!("[MQTT] Received on {}: {}", publish.topic, payload);

                    let inbound = match topics.route(&publish.topic, &payload) {
                        Ok(inbound) => inbound,
                        Err(e) => {
                            warn!("[MQTT] Dropping message on {}: {}", publish.topic, e);
                            continue;
                        }
                    };
                    if tx.send(inbound).await.is_err() {
                        info!("[MQTT] Controller channel closed, stopping event loop");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[MQTT] Connection error: {:?}", e);
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }
    }
}

/// [`Transport`] that publishes onto the bus without waiting.
pub struct MqttTransport {
    client: AsyncClient,
    topics: Topics,
}

impl MqttTransport {
    /// Publish through `client`, addressing by `topics`.
    pub fn new(client: AsyncClient, topics: Topics) -> Self {
        Self { client, topics }
    }
}

impl Transport for MqttTransport {
    fn send(&self, destination: &Destination, message: &Value) -> Result<()> {
        let topic = self.topics.outbound(destination);
        debug!("[MQTT] Publishing to {}: {}", topic, message);
        self.client
            .try_publish(topic, QoS::AtMostOnce, false, serde_json::to_vec(message)?)?;
        Ok(())
    }
}
