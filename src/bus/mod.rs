//! Message bus seam between the alarm core and the outside world.
//!
//! The core only ever talks to a [`Transport`]; the MQTT adapter in
//! [`mqtt`] is the production implementation.

pub mod message;
pub mod mqtt;

use crate::error::{AlarmError, Result};
use serde_json::Value;

/// Where an outbound message is addressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// An adaptor device, by id.
    Device(String),
    /// The platform manager (lifecycle reports).
    Manager,
    /// The remote concentrator relaying to client endpoints.
    Concentrator,
}

/// Best-effort outbound channel. Implementations must not block.
pub trait Transport: Send + Sync {
    /// Hand `message` to the bus for `destination`.
    fn send(&self, destination: &Destination, message: &Value) -> Result<()>;
}

/// Inbound messages, classified by where they came from.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Manager(Value),
    Adaptor(Value),
    Client(Value),
}

/// Topic naming for one controller under a shared prefix.
#[derive(Debug, Clone)]
pub struct Topics {
    prefix: String,
    app_id: String,
}

impl Topics {
    /// Create the topic set for `app_id` under `prefix`.
    pub fn new(prefix: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            app_id: app_id.into(),
        }
    }

    /// Topic the manager publishes configuration on.
    pub fn manager_inbound(&self) -> String {
        format!("{}/{}/manager", self.prefix, self.app_id)
    }

    /// Topic adaptors publish discovery and data on.
    pub fn adaptor_inbound(&self) -> String {
        format!("{}/{}/adaptor", self.prefix, self.app_id)
    }

    /// Topic the concentrator relays client messages on.
    pub fn client_inbound(&self) -> String {
        format!("{}/{}/client", self.prefix, self.app_id)
    }

    /// All inbound topics to subscribe to.
    pub fn subscribe_topics(&self) -> Vec<String> {
        vec![
            self.manager_inbound(),
            self.adaptor_inbound(),
            self.client_inbound(),
        ]
    }

    /// Topic for messages addressed to `destination`.
    pub fn outbound(&self, destination: &Destination) -> String {
        match destination {
            Destination::Device(id) => format!("{}/{}", self.prefix, id),
            Destination::Manager => format!("{}/manager", self.prefix),
            Destination::Concentrator => format!("{}/conc", self.prefix),
        }
    }

    /// Classify a received publish and decode its JSON payload.
    pub fn route(&self, topic: &str, payload: &str) -> Result<Inbound> {
        let wrap: fn(Value) -> Inbound = if topic == self.manager_inbound() {
            Inbound::Manager
        } else if topic == self.adaptor_inbound() {
            Inbound::Adaptor
        } else if topic == self.client_inbound() {
            Inbound::Client
        } else {
            return Err(AlarmError::UnknownTopic(topic.to_string()));
        };
        Ok(wrap(serde_json::from_str(payload)?))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Records every send so tests can assert on outbound traffic.
    #[derive(Default)]
    pub struct RecordingTransport {
        sent: Mutex<Vec<(Destination, Value)>>,
        fail: Mutex<bool>,
    }

    impl RecordingTransport {
        pub fn sent(&self) -> Vec<(Destination, Value)> {
            self.sent.lock().clone()
        }

        pub fn take(&self) -> Vec<(Destination, Value)> {
            std::mem::take(&mut *self.sent.lock())
        }

        pub fn sent_to(&self, destination: &Destination) -> Vec<Value> {
            self.sent
                .lock()
                .iter()
                .filter(|(d, _)| d == destination)
                .map(|(_, v)| v.clone())
                .collect()
        }

        pub fn set_failing(&self, fail: bool) {
            *self.fail.lock() = fail;
        }
    }

    impl Transport for RecordingTransport {
        fn send(&self, destination: &Destination, message: &Value) -> Result<()> {
            if *self.fail.lock() {
                return Err(std::io::Error::other("transport offline").into());
            }
            self.sent.lock().push((destination.clone(), message.clone()));
            Ok(())
        }
    }
}
