use crate::error::TrackerResult;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration for the recorder and the file stores.
///
/// Every field has a default, so a config file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrackerConfig {
    /// Directory holding activities.json, badges.json and user-badges.json
    pub data_dir: PathBuf,
    /// Display refresh period while recording
    pub tick_interval_ms: u64,
    /// Buffered fixes between the location service and the recorder
    pub fix_channel_capacity: usize,
    /// Where each tick writes the live status JSON, if anywhere
    pub live_status_file: Option<PathBuf>,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            tick_interval_ms: 1000,
            fix_channel_capacity: 100,
            live_status_file: None,
        }
    }
}

impl TrackerConfig {
    /// Load from a JSON file
    pub fn load(path: &Path) -> TrackerResult<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn tick_interval(&self) -> Duration {
        // A zero period would make tokio's interval panic
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    pub fn activities_file(&self) -> PathBuf {
        self.data_dir.join("activities.json")
    }

    pub fn badges_file(&self) -> PathBuf {
        self.data_dir.join("badges.json")
    }

    pub fn earned_badges_file(&self) -> PathBuf {
        self.data_dir.join("user-badges.json")
    }

    pub fn routes_file(&self) -> PathBuf {
        self.data_dir.join("community-routes.json")
    }
}
