//! Exchange with the remote concentrator: numbered outgoing messages,
//! acknowledgments, and configuration pushed from the client side.

use crate::alarm::{OptionsStore, SensorRegistry};
use crate::bus::message::{ClientMessage, config_request_body, reinit_request};
use crate::bus::{Destination, Transport};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde_json::{Map, Value, json};
use std::sync::Arc;

/// An outgoing message waiting for the remote side to acknowledge it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMessage {
    pub n: u64,
    pub envelope: Value,
}

pub struct RemoteClient {
    app_id: String,
    remote_id: String,
    count: u64,
    pending: Vec<PendingMessage>,
    transport: Arc<dyn Transport>,
}

impl RemoteClient {
    /// Create a client sending as `app_id` to the endpoint `remote_id`.
    pub fn new(
        app_id: impl Into<String>,
        remote_id: impl Into<String>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            remote_id: remote_id.into(),
            count: 0,
            pending: Vec::new(),
            transport,
        }
    }

    /// Number `body`, queue it until acknowledged and send it once.
    pub fn send(&mut self, mut body: Map<String, Value>) {
        let n = self.count;
        self.count += 1;
        body.insert("n".into(), json!(n));
        let envelope = json!({
            "source": self.app_id,
            "destination": self.remote_id,
            "body": body,
        });
        if let Err(e) = self.transport.send(&Destination::Concentrator, &envelope) {
            warn!("[Remote] Failed to send message {}: {}", n, e);
        }
        self.pending.push(PendingMessage { n, envelope });
    }

    /// Messages sent but not yet acknowledged, oldest first.
    pub fn pending(&self) -> &[PendingMessage] {
        &self.pending
    }

    /// Drop the queued message numbered `n`. Returns false if none matched.
    pub fn acknowledge(&mut self, n: u64) -> bool {
        let before = self.pending.len();
        self.pending.retain(|m| m.n != n);
        let removed = self.pending.len() != before;
        if removed {
            debug!("[Remote] Message {} acknowledged", n);
        } else {
            debug!("[Remote] Ack {} matches no queued message", n);
        }
        removed
    }

    /// The client link came up: ask the remote side for its configuration.
    pub fn on_transport_ready(&mut self, now: DateTime<Utc>) {
        info!("[Remote] Client link ready, requesting configuration");
        self.send(config_request_body(now.timestamp()));
    }

    /// Merge remote options; when they change, tell every known device to
    /// re-initialise.
    pub fn receive_config(
        &mut self,
        config: &Map<String, Value>,
        options: &mut OptionsStore,
        registry: &SensorRegistry,
    ) {
        if let Some(warning) = config.get("warning").and_then(Value::as_str) {
            warn!("[Remote] Client reported: {}", warning);
            return;
        }
        if !options.merge_remote(config) {
            debug!("[Remote] Configuration unchanged");
            return;
        }
        info!("[Remote] Configuration updated: {}", Value::Object(options.options().as_map().clone()));
        let request = reinit_request(&self.app_id);
        for id in registry.device_ids() {
            if let Err(e) = self
                .transport
                .send(&Destination::Device(id.to_string()), &request)
            {
                warn!("[Remote] Failed to re-initialise {}: {}", id, e);
            }
        }
    }

    /// Handle a readiness notice, an acknowledgment or a config push.
    pub fn receive(
        &mut self,
        message: &ClientMessage,
        options: &mut OptionsStore,
        registry: &SensorRegistry,
        now: DateTime<Utc>,
    ) {
        if message.is_ready() {
            self.on_transport_ready(now);
        }
        if let Some(n) = message.ack() {
            self.acknowledge(n);
        }
        if let Some(config) = message.config() {
            self.receive_config(config, options, registry);
        }
    }
}
