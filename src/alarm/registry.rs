//! Known devices, their friendly names and what they can do.

use super::enable_store::EnableStore;
use crate::bus::message::{AdaptorInfo, Characteristic, ServiceEntry, subscribe_request};
use crate::bus::{Destination, Transport};
use log::{debug, info, warn};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    pub id: String,
    pub friendly_name: String,
    pub characteristics: BTreeSet<Characteristic>,
}

impl Device {
    /// Whether the device declared `characteristic` at discovery.
    pub fn has(&self, characteristic: Characteristic) -> bool {
        self.characteristics.contains(&characteristic)
    }

    /// A switch that also reports a binary state is an indicator mirroring
    /// the enable flag, not an intrusion sensor.
    pub fn is_indicator(&self) -> bool {
        self.has(Characteristic::Switch) && self.has(Characteristic::BinarySensor)
    }

    /// Whether a reading on `characteristic` should reach the alarm logic.
    pub fn accepts(&self, characteristic: Characteristic) -> bool {
        match characteristic {
            Characteristic::BinarySensor => self.has(characteristic) && !self.is_indicator(),
            _ => self.has(characteristic),
        }
    }
}

pub struct SensorRegistry {
    app_id: String,
    names: HashMap<String, String>,
    devices: HashMap<String, Device>,
    transport: Arc<dyn Transport>,
}

impl SensorRegistry {
    /// Create an empty registry that subscribes as `app_id`.
    pub fn new(app_id: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            app_id: app_id.into(),
            names: HashMap::new(),
            devices: HashMap::new(),
            transport,
        }
    }

    /// Record friendly names from the manager's adaptor list. Ids already
    /// named keep their first name. Returns how many were new.
    pub fn on_configure(&mut self, adaptors: &[AdaptorInfo]) -> usize {
        let mut added = 0;
        for adaptor in adaptors {
            if self.names.contains_key(&adaptor.id) {
                continue;
            }
            let friendly_name = adaptor.friendly_name.replace(' ', "_");
            debug!(
                "[Registry] Adaptor {} name: {} friendly_name: {}",
                adaptor.id, adaptor.name, friendly_name
            );
            if let Some(device) = self.devices.get_mut(&adaptor.id) {
                device.friendly_name = friendly_name.clone();
            }
            self.names.insert(adaptor.id.clone(), friendly_name);
            added += 1;
        }
        added
    }

    /// Register a newly announced device and subscribe to each
    /// characteristic the alarm uses. Returns false for an already known id.
    pub fn on_discovery(
        &mut self,
        id: &str,
        declared: &[ServiceEntry],
        enable: &mut EnableStore,
    ) -> bool {
        if self.devices.contains_key(id) {
            debug!("[Registry] {} already known, ignoring re-discovery", id);
            return false;
        }

        let characteristics: BTreeSet<Characteristic> = declared
            .iter()
            .filter_map(ServiceEntry::characteristic)
            .collect();
        let device = Device {
            id: id.to_string(),
            friendly_name: self.names.get(id).cloned().unwrap_or_else(|| id.to_string()),
            characteristics,
        };

        for characteristic in &device.characteristics {
            let request = subscribe_request(&self.app_id, *characteristic);
            if let Err(e) = self
                .transport
                .send(&Destination::Device(id.to_string()), &request)
            {
                warn!("[Registry] Failed to subscribe to {} on {}: {}", characteristic, id, e);
            }
        }
        if device.has(Characteristic::Switch) {
            enable.register_output_device(id);
        }

        info!(
            "[Registry] Discovered {} ({}) with {:?}{}",
            device.friendly_name,
            id,
            device.characteristics,
            if device.is_indicator() { " as indicator" } else { "" }
        );
        self.devices.insert(id.to_string(), device);
        true
    }

    /// Look up a discovered device.
    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    /// Display name for `id`, or the id itself for an unknown device.
    pub fn friendly_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.devices
            .get(id)
            .map(|d| d.friendly_name.as_str())
            .unwrap_or(id)
    }

    /// Ids of every discovered device.
    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.devices.keys().map(String::as_str)
    }

    /// Number of discovered devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::RecordingTransport;
    use serde_json::json;

    fn entries(names: &[&str]) -> Vec<ServiceEntry> {
        names
            .iter()
            .map(|c| ServiceEntry {
                characteristic: c.to_string(),
                interval: 0.0,
            })
            .collect()
    }

    fn setup() -> (SensorRegistry, EnableStore, Arc<RecordingTransport>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let transport = Arc::new(RecordingTransport::default());
        let registry = SensorRegistry::new("alarm", transport.clone());
        let enable = EnableStore::new("alarm", dir.path().join("alarm.enabled"), transport.clone());
        (registry, enable, transport, dir)
    }

    #[test]
    fn test_discovery_subscribes_per_characteristic() {
        let (mut registry, mut enable, transport, _dir) = setup();
        registry.on_configure(&[AdaptorInfo {
            id: "ADT1".into(),
            name: "keyfob".into(),
            friendly_name: "Hall Keyfob".into(),
        }]);

        assert!(registry.on_discovery(
            "ADT1",
            &entries(&["buttons", "number_buttons", "battery"]),
            &mut enable
        ));

        let sent = transport.sent_to(&Destination::Device("ADT1".into()));
        let subscribed: Vec<_> = sent
            .iter()
            .map(|m| m["service"][0]["characteristic"].clone())
            .collect();
        assert_eq!(subscribed, vec![json!("buttons"), json!("number_buttons")]);
        assert_eq!(registry.friendly_name("ADT1"), "Hall_Keyfob");
        assert!(enable.output_devices().is_empty());
    }

    #[test]
    fn test_rediscovery_is_idempotent() {
        let (mut registry, mut enable, transport, _dir) = setup();
        let declared = entries(&["binary_sensor"]);

        assert!(registry.on_discovery("ADT2", &declared, &mut enable));
        assert!(!registry.on_discovery("ADT2", &declared, &mut enable));

        assert_eq!(registry.len(), 1);
        assert_eq!(transport.sent().len(), 1);
    }

    #[test]
    fn test_switch_registers_output_and_suppresses_binary_sensor() {
        let (mut registry, mut enable, _transport, _dir) = setup();
        registry.on_discovery("SW1", &entries(&["switch", "binary_sensor"]), &mut enable);
        registry.on_discovery("PIR1", &entries(&["binary_sensor"]), &mut enable);

        assert_eq!(enable.output_devices(), ["SW1"]);

        let indicator = registry.get("SW1").unwrap();
        assert!(indicator.is_indicator());
        assert!(!indicator.accepts(Characteristic::BinarySensor));
        assert!(indicator.accepts(Characteristic::Switch));

        let sensor = registry.get("PIR1").unwrap();
        assert!(sensor.accepts(Characteristic::BinarySensor));
        assert!(!sensor.accepts(Characteristic::Buttons));
    }

    #[test]
    fn test_unnamed_device_falls_back_to_id_until_configured() {
        let (mut registry, mut enable, _transport, _dir) = setup();
        registry.on_discovery("ADT9", &entries(&["binary_sensor"]), &mut enable);
        assert_eq!(registry.friendly_name("ADT9"), "ADT9");

        let info = AdaptorInfo {
            id: "ADT9".into(),
            name: "door".into(),
            friendly_name: "Back Door".into(),
        };
        assert_eq!(registry.on_configure(&[info.clone()]), 1);
        assert_eq!(registry.on_configure(&[info]), 0);
        assert_eq!(registry.friendly_name("ADT9"), "Back_Door");
    }
}
