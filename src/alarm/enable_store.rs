//! Persisted armed/disarmed flag, mirrored onto switch-type output devices.

use crate::bus::message::command_request;
use crate::bus::{Destination, Transport};
use crate::error::{AlarmError, Result};
use log::{info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct EnableStore {
    app_id: String,
    path: PathBuf,
    outputs: Vec<String>,
    transport: Arc<dyn Transport>,
}

impl EnableStore {
    /// Create a store backed by the flag file at `path`, with no outputs yet.
    pub fn new(app_id: impl Into<String>, path: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> Self {
        Self {
            app_id: app_id.into(),
            path: path.into(),
            outputs: Vec::new(),
            transport,
        }
    }

    /// Read the persisted flag. Any failure reads as disarmed.
    pub fn is_enabled(&self) -> bool {
        match read_flag(&self.path) {
            Ok(enabled) => enabled,
            Err(e) => {
                warn!("[Enable] Cannot read {:?}: {}, treating alarm as disarmed", self.path, e);
                false
            }
        }
    }

    /// Persist `enabled`, then command every output device to match.
    ///
    /// A failed write is only logged; outputs are still commanded.
    pub fn enable(&self, enabled: bool) {
        info!("[Enable] Alarm {}", if enabled { "armed" } else { "disarmed" });
        if let Err(e) = write_flag(&self.path, enabled) {
            warn!("[Enable] Failed to persist flag to {:?}: {}", self.path, e);
        }
        let command = command_request(&self.app_id, enabled);
        for id in &self.outputs {
            if let Err(e) = self
                .transport
                .send(&Destination::Device(id.clone()), &command)
            {
                warn!("[Enable] Failed to command output {}: {}", id, e);
            }
        }
    }

    /// Add a switch device that mirrors the enable state. Known ids are ignored.
    pub fn register_output_device(&mut self, id: &str) {
        if self.outputs.iter().any(|known| known == id) {
            return;
        }
        info!("[Enable] Registered output device {}", id);
        self.outputs.push(id.to_string());
    }

    #[cfg(test)]
    pub(crate) fn output_devices(&self) -> &[String] {
        &self.outputs
    }
}

fn read_flag(path: &Path) -> Result<bool> {
    let contents = fs::read_to_string(path)?;
    match contents.trim() {
        "1" => Ok(true),
        "0" => Ok(false),
        other => Err(AlarmError::InvalidFlag(other.to_string())),
    }
}

fn write_flag(path: &Path, enabled: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, if enabled { "1" } else { "0" })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::testing::RecordingTransport;
    use serde_json::json;

    fn store(path: PathBuf) -> (EnableStore, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::default());
        (EnableStore::new("alarm", path, transport.clone()), transport)
    }

    #[test]
    fn test_missing_file_reads_disarmed() {
        let dir = tempfile::tempdir().unwrap();
        let (store, _) = store(dir.path().join("alarm.enabled"));
        assert!(!store.is_enabled());
    }

    #[test]
    fn test_corrupt_file_reads_disarmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarm.enabled");
        fs::write(&path, "yes").unwrap();
        let (store, _) = store(path);
        assert!(!store.is_enabled());
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alarm.enabled");
        let (store, _) = store(path.clone());

        for value in [true, false, true, true] {
            store.enable(value);
            assert_eq!(store.is_enabled(), value);
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "1");
    }

    #[test]
    fn test_failed_write_reads_disarmed_and_still_commands_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let (mut store, transport) = store(blocker.join("alarm.enabled"));
        store.register_output_device("SW1");

        store.enable(true);
        assert!(!store.is_enabled());
        assert_eq!(
            transport.sent_to(&Destination::Device("SW1".into())),
            vec![json!({"id": "alarm", "request": "command", "data": "on"})]
        );
    }

    #[test]
    fn test_outputs_mirror_every_change() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, transport) = store(dir.path().join("alarm.enabled"));
        store.register_output_device("SW1");
        store.register_output_device("SW2");
        store.register_output_device("SW1");
        assert_eq!(store.output_devices(), ["SW1", "SW2"]);

        store.enable(false);
        let sent = transport.take();
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|(_, msg)| msg["data"] == json!("off")));
    }

    #[test]
    fn test_send_failure_does_not_stop_other_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let (mut store, transport) = store(dir.path().join("alarm.enabled"));
        store.register_output_device("SW1");
        transport.set_failing(true);

        store.enable(true);
        assert!(store.is_enabled());
        assert!(transport.sent().is_empty());
    }
}
