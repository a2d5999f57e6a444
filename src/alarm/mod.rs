//! Alarm core: enable state, device registry, trip handling and reset.

pub mod enable_store;
pub mod logic;
pub mod options;
pub mod registry;
pub mod reset_timer;

pub use enable_store::EnableStore;
pub use logic::AlarmLogic;
pub use options::{AlarmOptions, OptionsStore};
pub use registry::{Device, SensorRegistry};
pub use reset_timer::ResetTimer;
