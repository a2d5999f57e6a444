//! Interprets sensor readings against the enable flag and the set of
//! sensors already tripped.

use super::enable_store::EnableStore;
use super::registry::SensorRegistry;
use crate::bus::message::{Characteristic, DataMessage, alert_body};
use crate::remote::RemoteClient;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::Value;

const ARM_KEY: &str = "1";
const DISARM_KEY: &str = "3";

#[derive(Debug, Default)]
pub struct AlarmLogic {
    /// Tripped sensors in the order they tripped.
    active: Vec<String>,
    last_trigger: Option<DateTime<Utc>>,
}

impl AlarmLogic {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn tripped(ids: &[&str], last_trigger: DateTime<Utc>) -> Self {
        Self {
            active: ids.iter().map(|id| id.to_string()).collect(),
            last_trigger: Some(last_trigger),
        }
    }

    /// Tripped sensor ids in trip order.
    pub fn active_sensors(&self) -> &[String] {
        &self.active
    }

    /// When a sensor last tripped while armed.
    pub fn last_trigger(&self) -> Option<DateTime<Utc>> {
        self.last_trigger
    }

    /// Forget every tripped sensor.
    pub fn clear_active(&mut self) {
        self.active.clear();
    }

    /// Handle one reading. Readings from unknown devices, or on a
    /// characteristic the device was not registered for, are ignored.
    pub fn on_sensor_event(
        &mut self,
        message: &DataMessage,
        registry: &SensorRegistry,
        enable: &EnableStore,
        client: &mut RemoteClient,
        now: DateTime<Utc>,
    ) {
        let Some(device) = registry.get(&message.id) else {
            debug!("[Alarm] Ignoring data from unknown device {}", message.id);
            return;
        };
        let Ok(characteristic) = message.characteristic.parse::<Characteristic>() else {
            debug!(
                "[Alarm] Ignoring {} data from {}",
                message.characteristic, message.id
            );
            return;
        };
        if !device.accepts(characteristic) {
            debug!("[Alarm] {} not handled for {}", characteristic, message.id);
            return;
        }

        match characteristic {
            Characteristic::Buttons => {
                if let Some(enabled) = button_panel_command(&message.data) {
                    enable.enable(enabled);
                }
            }
            Characteristic::NumberButtons => {
                if let Some(enabled) = keypad_command(&message.data) {
                    enable.enable(enabled);
                }
            }
            Characteristic::BinarySensor => {
                let Some(state) = message.data.as_str() else {
                    warn!(
                        "[Alarm] Binary sensor {} sent non-string data {}",
                        message.id, message.data
                    );
                    return;
                };
                if state == "on" && enable.is_enabled() {
                    self.trip(&message.id, registry, client, now);
                }
            }
            Characteristic::Switch => {}
        }
    }

    fn trip(
        &mut self,
        id: &str,
        registry: &SensorRegistry,
        client: &mut RemoteClient,
        now: DateTime<Utc>,
    ) {
        if self.active.iter().any(|active| active == id) {
            debug!("[Alarm] {} already active, alert suppressed", id);
            return;
        }
        self.active.push(id.to_string());
        self.last_trigger = Some(now);

        let names: Vec<&str> = self
            .active
            .iter()
            .map(|active| registry.friendly_name(active))
            .collect();
        let text = format!("Intruder detected by {}", names.join(", "));
        info!("[Alarm] {}", text);
        client.send(alert_body(&text, now.timestamp()));
    }
}

/// Right button arms and is checked first; left button disarms.
fn button_panel_command(data: &Value) -> Option<bool> {
    let Some(buttons) = data.as_object() else {
        warn!("[Alarm] Button data is not an object: {}", data);
        return None;
    };
    let pressed = |name: &str| buttons.get(name).and_then(Value::as_i64) == Some(1);
    if pressed("rightButton") {
        Some(true)
    } else if pressed("leftButton") {
        Some(false)
    } else {
        None
    }
}

/// Keys are applied in sorted order, so with both "1" and "3" present the
/// later "3" wins and the alarm ends up disarmed.
fn keypad_command(data: &Value) -> Option<bool> {
    let Some(keys) = data.as_object() else {
        warn!("[Alarm] Keypad data is not an object: {}", data);
        return None;
    };
    let mut sorted: Vec<&String> = keys.keys().collect();
    sorted.sort();
    sorted.into_iter().fold(None, |command, key| match key.as_str() {
        ARM_KEY => Some(true),
        DISARM_KEY => Some(false),
        _ => command,
    })
}
