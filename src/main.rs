use clap::Parser;
use home_alarm::bus::mqtt::{MqttClient, MqttTransport};
use home_alarm::bus::{Topics, Transport};
use home_alarm::config::Config;
use home_alarm::controller::AlarmController;
use home_alarm::instance_lock::InstanceLock;
use log::{error, info};
use std::sync::Arc;
use tokio::sync::mpsc;

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();
}

#[tokio::main]
async fn main() {
    init_logger();
    let config = Config::parse();
    info!("Starting home alarm controller");

    let _lock = match InstanceLock::acquire(&config.alarm.app_id) {
        Ok(lock) => lock,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    let paths = config.alarm.state_paths();
    info!("Configuration loaded:");
    info!("  App ID: {}", config.alarm.app_id);
    info!("  Remote client: {}", config.alarm.remote_id);
    info!(
        "  MQTT broker: {}:{}",
        config.mqtt.broker_host, config.mqtt.broker_port
    );
    info!("  Enable flag: {:?}", paths.enable_flag);
    info!("  Options file: {:?}", paths.options);

    let topics = Topics::new(&config.mqtt.topic_prefix, &config.alarm.app_id);
    let mqtt_client = MqttClient::new(&config.mqtt);
    let transport: Arc<dyn Transport> =
        Arc::new(MqttTransport::new(mqtt_client.client(), topics.clone()));

    let (tx, rx) = mpsc::channel(64);
    let mqtt_task = tokio::spawn(mqtt_client.run(topics, tx));

    let controller = AlarmController::new(&config.alarm, &paths, transport);
    controller
        .run(rx, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    // Let the event loop flush the final lifecycle report.
    tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;
    mqtt_task.abort();

    info!("Home alarm controller stopped");
}
