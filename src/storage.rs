use crate::activity::Activity;
use crate::error::{TrackerError, TrackerResult};
use chrono::{DateTime, Utc};
use log::{error, info};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Activity as persisted, with store-assigned identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredActivity {
    pub id: String,
    #[serde(flatten)]
    pub activity: Activity,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Editable fields of a saved activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityUpdate {
    pub name: Option<String>,
    pub notes: Option<String>,
}

/// Persistence collaborator for finished rides
pub trait ActivityStore {
    fn list(&self) -> TrackerResult<Vec<StoredActivity>>;
    fn get(&self, id: &str) -> TrackerResult<Option<StoredActivity>>;
    fn save(&mut self, activity: Activity) -> TrackerResult<StoredActivity>;
    fn update(&mut self, id: &str, update: ActivityUpdate) -> TrackerResult<StoredActivity>;
    fn delete(&mut self, id: &str) -> TrackerResult<()>;
}

fn validate(activity: &Activity) -> TrackerResult<()> {
    if activity.name.trim().is_empty() {
        return Err(TrackerError::InvalidParameters(
            "Activity name is required".to_string(),
        ));
    }
    if !activity.distance.is_finite() || activity.distance < 0.0 {
        return Err(TrackerError::InvalidParameters(format!(
            "Invalid distance: {}",
            activity.distance
        )));
    }
    if !activity.average_speed.is_finite() || !activity.max_speed.is_finite() {
        return Err(TrackerError::InvalidParameters(
            "Speeds must be finite".to_string(),
        ));
    }
    Ok(())
}

fn not_found(id: &str) -> TrackerError {
    TrackerError::StorageError(format!("Activity not found: {}", id))
}

fn insert(activities: &mut Vec<StoredActivity>, activity: Activity) -> TrackerResult<StoredActivity> {
    validate(&activity)?;

    let created_at = Utc::now();
    let base = created_at.timestamp_millis();
    let mut suffix = activities.len();
    let mut id = format!("{}{:03}", base, suffix);
    while activities.iter().any(|a| a.id == id) {
        suffix += 1;
        id = format!("{}{:03}", base, suffix);
    }

    let stored = StoredActivity {
        id,
        activity,
        created_at,
        updated_at: None,
    };
    activities.push(stored.clone());
    Ok(stored)
}

fn apply_update(
    activities: &mut [StoredActivity],
    id: &str,
    update: ActivityUpdate,
) -> TrackerResult<StoredActivity> {
    let stored = activities
        .iter_mut()
        .find(|a| a.id == id)
        .ok_or_else(|| not_found(id))?;

    if let Some(name) = update.name {
        if name.trim().is_empty() {
            return Err(TrackerError::InvalidParameters(
                "Activity name is required".to_string(),
            ));
        }
        stored.activity.name = name;
    }
    if let Some(notes) = update.notes {
        stored.activity.notes = notes;
    }
    stored.updated_at = Some(Utc::now());
    Ok(stored.clone())
}

fn remove(activities: &mut Vec<StoredActivity>, id: &str) -> TrackerResult<()> {
    let before = activities.len();
    activities.retain(|a| a.id != id);
    if activities.len() == before {
        return Err(not_found(id));
    }
    Ok(())
}

/// Read a JSON array file; a missing file reads as empty
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> TrackerResult<Vec<T>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let data = fs::read_to_string(path)?;
    serde_json::from_str(&data).map_err(|e| {
        error!("Error reading {}: {}", path.display(), e);
        TrackerError::StorageError(format!("Corrupt data file {}: {}", path.display(), e))
    })
}

/// Write a JSON array file, creating parent directories as needed
pub fn write_json_file<T: Serialize>(path: &Path, items: &[T]) -> TrackerResult<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let json = serde_json::to_string_pretty(items)?;
    fs::write(path, json)?;
    Ok(())
}

/// Activities kept in one pretty-printed JSON array file
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open the store, creating the directory and an empty file on first use
    pub fn open(path: impl Into<PathBuf>) -> TrackerResult<Self> {
        let path = path.into();
        if !path.exists() {
            write_json_file::<StoredActivity>(&path, &[])?;
            info!("Created activity store at {}", path.display());
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> TrackerResult<Vec<StoredActivity>> {
        read_json_file(&self.path)
    }

    fn store(&self, activities: &[StoredActivity]) -> TrackerResult<()> {
        write_json_file(&self.path, activities)
    }
}

impl ActivityStore for JsonFileStore {
    fn list(&self) -> TrackerResult<Vec<StoredActivity>> {
        self.load()
    }

    fn get(&self, id: &str) -> TrackerResult<Option<StoredActivity>> {
        Ok(self.load()?.into_iter().find(|a| a.id == id))
    }

    fn save(&mut self, activity: Activity) -> TrackerResult<StoredActivity> {
        let mut activities = self.load()?;
        let stored = insert(&mut activities, activity)?;
        self.store(&activities)?;
        Ok(stored)
    }

    fn update(&mut self, id: &str, update: ActivityUpdate) -> TrackerResult<StoredActivity> {
        let mut activities = self.load()?;
        let stored = apply_update(&mut activities, id, update)?;
        self.store(&activities)?;
        Ok(stored)
    }

    fn delete(&mut self, id: &str) -> TrackerResult<()> {
        let mut activities = self.load()?;
        remove(&mut activities, id)?;
        self.store(&activities)
    }
}

/// In-process store for hosts that persist elsewhere
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    activities: Vec<StoredActivity>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ActivityStore for MemoryStore {
    fn list(&self) -> TrackerResult<Vec<StoredActivity>> {
        Ok(self.activities.clone())
    }

    fn get(&self, id: &str) -> TrackerResult<Option<StoredActivity>> {
        Ok(self.activities.iter().find(|a| a.id == id).cloned())
    }

    fn save(&mut self, activity: Activity) -> TrackerResult<StoredActivity> {
        insert(&mut self.activities, activity)
    }

    fn update(&mut self, id: &str, update: ActivityUpdate) -> TrackerResult<StoredActivity> {
        apply_update(&mut self.activities, id, update)
    }

    fn delete(&mut self, id: &str) -> TrackerResult<()> {
        remove(&mut self.activities, id)
    }
}
