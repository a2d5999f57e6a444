//! Named alarm options with built-in defaults, a local JSON file overlay and
//! remote updates.

use log::{info, warn};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const IGNORE_TIME: &str = "ignore_time";
pub const DEFAULT_IGNORE_TIME_SECS: u64 = 120;

/// Option mapping. Always holds at least the defaults; updates only overlay
/// the keys they carry.
#[derive(Debug, Clone, PartialEq)]
pub struct AlarmOptions {
    values: Map<String, Value>,
}

impl Default for AlarmOptions {
    fn default() -> Self {
        let mut values = Map::new();
        values.insert(IGNORE_TIME.into(), json!(DEFAULT_IGNORE_TIME_SECS));
        Self { values }
    }
}

impl AlarmOptions {
    /// Insert every key of `update`, replacing existing values.
    pub fn overlay(&mut self, update: &Map<String, Value>) {
        for (key, value) in update {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Every option, defaults included.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    /// How long after the last trip the active-sensor set is kept.
    pub fn ignore_time(&self) -> Duration {
        let value = self.values.get(IGNORE_TIME).unwrap_or(&Value::Null);
        parse_ignore_time(value).unwrap_or_else(|| {
            warn!(
                "[Options] Unusable {} value {}, using {}s",
                IGNORE_TIME, value, DEFAULT_IGNORE_TIME_SECS
            );
            Duration::from_secs(DEFAULT_IGNORE_TIME_SECS)
        })
    }
}

/// Non-negative whole or fractional seconds that fit in a [`Duration`].
fn parse_ignore_time(value: &Value) -> Option<Duration> {
    if let Some(secs) = value.as_u64() {
        return Some(Duration::from_secs(secs));
    }
    Duration::try_from_secs_f64(value.as_f64()?).ok()
}

/// Options backed by a JSON file.
pub struct OptionsStore {
    path: PathBuf,
    current: AlarmOptions,
    /// What is known to be on disk; `None` until the file exists.
    persisted: Option<Map<String, Value>>,
}

impl OptionsStore {
    /// Defaults overlaid with the file at `path`. A missing or corrupt file
    /// leaves the defaults in place.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mut current = AlarmOptions::default();
        let persisted = match read_map(&path) {
            Ok(Some(map)) => {
                info!("[Options] Loaded {} option(s) from {:?}", map.len(), path);
                current.overlay(&map);
                Some(map)
            }
            Ok(None) => {
                info!("[Options] No options file at {:?}, using defaults", path);
                None
            }
            Err(e) => {
                warn!("[Options] Failed to read {:?}: {}, using defaults", path, e);
                None
            }
        };
        Self {
            path,
            current,
            persisted,
        }
    }

    /// Options currently in effect.
    pub fn options(&self) -> &AlarmOptions {
        &self.current
    }

    /// Merge a remote update. Returns true when the merged options differ
    /// from what was on disk (or no file existed), in which case they are
    /// written back. A failed write is logged; memory keeps the merged value.
    ///
    /// An `ignore_time` that cannot be used as a duration is dropped from the
    /// update so it is never persisted.
    pub fn merge_remote(&mut self, update: &Map<String, Value>) -> bool {
        let mut update = update.clone();
        if let Some(value) = update.get(IGNORE_TIME)
            && parse_ignore_time(value).is_none()
        {
            warn!("[Options] Rejecting remote {} value {}", IGNORE_TIME, value);
            update.remove(IGNORE_TIME);
            if update.is_empty() {
                return false;
            }
        }
        self.current.overlay(&update);
        if self.persisted.as_ref() == Some(self.current.as_map()) {
            return false;
        }
        match self.save() {
            Ok(()) => {
                info!("[Options] Saved options to {:?}", self.path);
                self.persisted = Some(self.current.as_map().clone());
            }
            Err(e) => warn!("[Options] Failed to save {:?}: {}", self.path, e),
        }
        true
    }

    fn save(&self) -> crate::error::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(self.current.as_map())?)?;
        Ok(())
    }
}

fn read_map(path: &Path) -> crate::error::Result<Option<Map<String, Value>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
