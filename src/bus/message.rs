//! Wire formats exchanged with the manager, adaptors and the concentrator.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use strum::{Display, EnumString};

/// Characteristics the alarm understands. Anything else an adaptor declares
/// is ignored.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
pub enum Characteristic {
    /// Two-button panel: right arms, left disarms.
    Buttons,
    /// Keypad: "1" arms, "3" disarms.
    NumberButtons,
    /// Contact or motion sensor reporting "on"/"off".
    BinarySensor,
    /// Output device that mirrors the enable state.
    Switch,
}

/// One adaptor entry from the manager's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdaptorInfo {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub friendly_name: String,
}

/// Adaptor list pushed by the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub adaptors: Vec<AdaptorInfo>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub characteristic: String,
    #[serde(default)]
    pub interval: f64,
}

impl ServiceEntry {
    /// The declared characteristic, if the alarm understands it.
    pub fn characteristic(&self) -> Option<Characteristic> {
        self.characteristic.parse().ok()
    }
}

/// Service announcement: the capabilities a device offers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceMessage {
    pub id: String,
    pub service: Vec<ServiceEntry>,
}

/// A reading pushed by a device for one characteristic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataMessage {
    pub id: String,
    pub characteristic: String,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum AdaptorMessage {
    Service(ServiceMessage),
    Data(DataMessage),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientBody {
    #[serde(default)]
    pub n: Option<u64>,
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
}

/// Anything the concentrator sends back: readiness, acks, or config pushes.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ClientMessage {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub body: Option<ClientBody>,
    #[serde(default)]
    pub config: Option<Map<String, Value>>,
}

impl ClientMessage {
    pub fn is_ready(&self) -> bool {
        self.status.as_deref() == Some("ready")
    }

    /// Config may arrive at the top level or inside the envelope body.
    pub fn config(&self) -> Option<&Map<String, Value>> {
        self.config
            .as_ref()
            .or_else(|| self.body.as_ref().and_then(|b| b.config.as_ref()))
    }

    pub fn ack(&self) -> Option<u64> {
        self.body.as_ref().and_then(|b| b.n)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LifecycleState {
    Stopped,
    Starting,
    Running,
}

/// Ask a device to stream one characteristic to this controller.
pub fn subscribe_request(app_id: &str, characteristic: Characteristic) -> Value {
    json!({
        "id": app_id,
        "request": "service",
        "service": [
            {"characteristic": characteristic.to_string(), "interval": 0}
        ]
    })
}

/// Switch an output device on or off.
pub fn command_request(app_id: &str, on: bool) -> Value {
    let data = if on { "on" } else { "off" };
    json!({"id": app_id, "request": "command", "data": data})
}

/// Ask a device to re-initialise after a configuration change.
pub fn reinit_request(app_id: &str) -> Value {
    json!({"id": app_id, "request": "reinit"})
}

/// Lifecycle report for the manager.
pub fn lifecycle_status(app_id: &str, state: LifecycleState) -> Value {
    json!({"id": app_id, "status": "state", "state": state.to_string()})
}

/// Alert body for the concentrator; `timestamp` is Unix seconds.
pub fn alert_body(text: &str, timestamp: i64) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("m".into(), json!("alert"));
    body.insert("a".into(), json!(text));
    body.insert("t".into(), json!(timestamp));
    body
}

/// Request for the client-side configuration.
pub fn config_request_body(timestamp: i64) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("m".into(), json!("req_config"));
    body.insert("t".into(), json!(timestamp));
    body
}
