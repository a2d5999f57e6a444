//! Simulated adaptors for exercising the controller without hardware.
//!
//! Usage:
//!   cargo run --bin sensor-sim -- --app-id basic_alarm
//!
//! Publishes a manager configuration and discovery messages for a keyfob and
//! a door contact, arms the alarm with the keyfob, then toggles the door
//! contact every 30 seconds.

use clap::Parser;
use home_alarm::bus::Topics;
use home_alarm::bus::mqtt::MqttClient;
use home_alarm::config::Config;
use log::{info, warn};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::time::{Duration, interval};

const KEYFOB: &str = "SIM_FOB";
const DOOR: &str = "SIM_DOOR";

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut config = Config::parse();
    config.mqtt.client_id = format!("{}-sim", config.mqtt.client_id);
    let topics = Topics::new(&config.mqtt.topic_prefix, &config.alarm.app_id);

    info!(
        "Simulating sensors for {} via {}:{}",
        config.alarm.app_id, config.mqtt.broker_host, config.mqtt.broker_port
    );

    let mqtt_client = MqttClient::new(&config.mqtt);
    let publisher = mqtt_client.client();

    // Listen on a separate id so the simulator never consumes the
    // controller's inbound traffic.
    let own_topics = Topics::new(
        &config.mqtt.topic_prefix,
        format!("{}-sim", config.alarm.app_id),
    );
    let (tx, mut rx) = mpsc::channel(16);
    let mqtt_handle = tokio::spawn(mqtt_client.run(own_topics, tx));
    let drain = tokio::spawn(async move {
        while let Some(inbound) = rx.recv().await {
            info!("[Sim] Received {:?}", inbound);
        }
    });

    // Give the connection a moment before publishing the setup burst.
    tokio::time::sleep(Duration::from_secs(1)).await;

    let adaptor_topic = topics.adaptor_inbound();
    let setup = [
        (
            topics.manager_inbound(),
            json!({"adaptors": [
                {"id": KEYFOB, "name": "sim_fob", "friendly_name": "Sim Keyfob"},
                {"id": DOOR, "name": "sim_door", "friendly_name": "Sim Front Door"}
            ]}),
        ),
        (
            adaptor_topic.clone(),
            json!({"id": KEYFOB, "service": [{"characteristic": "buttons", "interval": 0}]}),
        ),
        (
            adaptor_topic.clone(),
            json!({"id": DOOR, "service": [{"characteristic": "binary_sensor", "interval": 0}]}),
        ),
        (
            adaptor_topic.clone(),
            json!({"id": KEYFOB, "characteristic": "buttons",
                   "data": {"rightButton": 1, "leftButton": 0}}),
        ),
    ];
    for (topic, payload) in &setup {
        publish(&publisher, topic, payload).await;
    }

    let toggle = tokio::spawn({
        let publisher = publisher.clone();
        async move {
            let mut ticker = interval(Duration::from_secs(30));
            let mut open = false;
            loop {
                ticker.tick().await;
                open = !open;
                let state = if open { "on" } else { "off" };
                info!("[Sim] Door contact {}", state);
                let payload = json!({"id": DOOR, "characteristic": "binary_sensor", "data": state});
                publish(&publisher, &adaptor_topic, &payload).await;
            }
        }
    });

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    toggle.abort();
    drain.abort();
    mqtt_handle.abort();
    info!("Simulation stopped");
}

async fn publish(client: &rumqttc::AsyncClient, topic: &str, payload: &Value) {
    if let Err(e) = client
        .publish(topic, rumqttc::QoS::AtMostOnce, false, payload.to_string())
        .await
    {
        warn!("[Sim] Failed to publish to {}: {}", topic, e);
    }
}
