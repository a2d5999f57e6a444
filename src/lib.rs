//! Home security alarm controller.
//!
//! Subscribes to button, keypad, binary sensor and switch devices on a home
//! automation message bus, keeps an armed/disarmed flag on disk, and sends
//! intruder alerts to a remote concentrator when an armed sensor trips.

pub mod alarm;
pub mod bus;
pub mod config;
pub mod controller;
pub mod error;
pub mod instance_lock;
pub mod remote;
