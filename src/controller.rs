//! The controller owns every alarm component and processes one inbound
//! event at a time, so handlers never overlap.

use crate::alarm::{AlarmLogic, EnableStore, OptionsStore, ResetTimer, SensorRegistry};
use crate::bus::message::{
    AdaptorMessage, ClientMessage, LifecycleState, ManagerConfig, lifecycle_status,
};
use crate::bus::{Destination, Inbound, Transport};
use crate::config::{AlarmConfig, RESET_PERIOD, StatePaths};
use crate::remote::RemoteClient;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

pub struct AlarmController {
    app_id: String,
    state: LifecycleState,
    transport: Arc<dyn Transport>,
    options: OptionsStore,
    enable: EnableStore,
    registry: SensorRegistry,
    alarm: AlarmLogic,
    client: RemoteClient,
    reset_timer: ResetTimer,
}

impl AlarmController {
    /// Build every component, loading persisted options from `paths`.
    pub fn new(config: &AlarmConfig, paths: &StatePaths, transport: Arc<dyn Transport>) -> Self {
        Self {
            app_id: config.app_id.clone(),
            state: LifecycleState::Stopped,
            options: OptionsStore::load(&paths.options),
            enable: EnableStore::new(&config.app_id, &paths.enable_flag, transport.clone()),
            registry: SensorRegistry::new(&config.app_id, transport.clone()),
            alarm: AlarmLogic::new(),
            client: RemoteClient::new(&config.app_id, &config.remote_id, transport.clone()),
            reset_timer: ResetTimer::new(RESET_PERIOD),
            transport,
        }
    }

    /// Override the reset timer period.
    pub fn with_reset_period(mut self, period: Duration) -> Self {
        self.reset_timer = ResetTimer::new(period);
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn alarm(&self) -> &AlarmLogic {
        &self.alarm
    }

    pub fn enable_store(&self) -> &EnableStore {
        &self.enable
    }

    pub fn registry(&self) -> &SensorRegistry {
        &self.registry
    }

    pub fn client(&self) -> &RemoteClient {
        &self.client
    }

    pub fn options(&self) -> &OptionsStore {
        &self.options
    }

    /// Record the lifecycle state and report it to the manager. The report is
    /// sent every time, so a manager that missed one catches up on the next.
    pub fn set_state(&mut self, state: LifecycleState) {
        if self.state != state {
            info!("[Lifecycle] {} -> {}", self.state, state);
        }
        self.state = state;
        if let Err(e) = self
            .transport
            .send(&Destination::Manager, &lifecycle_status(&self.app_id, state))
        {
            warn!("[Lifecycle] Failed to report state {}: {}", state, e);
        }
    }

    /// Dispatch one inbound message to the component that owns it.
    pub fn handle(&mut self, inbound: Inbound, now: DateTime<Utc>) {
        match inbound {
            Inbound::Manager(value) => self.on_manager(value),
            Inbound::Adaptor(value) => self.on_adaptor(value, now),
            Inbound::Client(value) => self.on_client(value, now),
        }
    }

    fn on_manager(&mut self, value: Value) {
        let Some(config) = decode::<ManagerConfig>("manager", value) else {
            return;
        };
        let added = self.registry.on_configure(&config.adaptors);
        debug!("[Lifecycle] Manager configuration named {} new adaptor(s)", added);
        self.set_state(LifecycleState::Starting);
    }

    fn on_adaptor(&mut self, value: Value, now: DateTime<Utc>) {
        match decode::<AdaptorMessage>("adaptor", value) {
            Some(AdaptorMessage::Service(service)) => {
                self.registry
                    .on_discovery(&service.id, &service.service, &mut self.enable);
                self.set_state(LifecycleState::Running);
            }
            Some(AdaptorMessage::Data(data)) => {
                self.alarm.on_sensor_event(
                    &data,
                    &self.registry,
                    &self.enable,
                    &mut self.client,
                    now,
                );
            }
            None => {}
        }
    }

    fn on_client(&mut self, value: Value, now: DateTime<Utc>) {
        let Some(message) = decode::<ClientMessage>("client", value) else {
            return;
        };
        if message.status.is_none() && message.body.is_none() && message.config.is_none() {
            warn!("[Remote] Received message from client with no body");
            return;
        }
        self.client
            .receive(&message, &mut self.options, &self.registry, now);
    }

    /// One reset-timer period has elapsed.
    pub fn tick(&mut self, now: DateTime<Utc>) -> bool {
        let ignore_time = self.options.options().ignore_time();
        self.reset_timer.tick(&mut self.alarm, ignore_time, now)
    }

    /// Process inbound events and reset ticks until `shutdown` resolves or
    /// the inbound channel closes, then report `stopped`.
    pub async fn run(mut self, mut rx: mpsc::Receiver<Inbound>, shutdown: impl Future<Output = ()>) {
        let mut ticker = tokio::time::interval(self.reset_timer.period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        tokio::pin!(shutdown);

        info!("[Lifecycle] Controller {} running event loop", self.app_id);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("[Lifecycle] Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick(Utc::now());
                }
                inbound = rx.recv() => match inbound {
                    Some(inbound) => self.handle(inbound, Utc::now()),
                    None => {
                        info!("[Lifecycle] Inbound channel closed");
                        break;
                    }
                },
            }
        }

        self.set_state(LifecycleState::Stopped);
    }
}

fn decode<T: DeserializeOwned>(kind: &str, value: Value) -> Option<T> {
    match serde_json::from_value(value) {
        Ok(message) => Some(message),
        Err(e) => {
            warn!("[Lifecycle] Ignoring malformed {} message: {}", kind, e);
            None
        }
    }
}
