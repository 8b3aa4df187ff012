use crate::session::{SessionSnapshot, SessionState};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Display-ready view of the live session, refreshed on every tick
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LiveStatus {
    pub timestamp: f64,
    pub state: SessionState,
    pub point_count: usize,
    pub distance_km: f64,
    pub elapsed_secs: u64,
    pub current_speed_kmh: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    // Formatted for display
    pub distance_text: String,
    pub elapsed_text: String,
    pub current_speed_text: String,
    pub average_speed_text: String,
    // Diagnostics
    pub rejected_fixes: u32,
    pub location_errors: u32,
    pub last_location_error: Option<String>,
}

impl LiveStatus {
    pub fn new() -> Self {
        Self {
            timestamp: current_timestamp(),
            state: SessionState::Idle,
            point_count: 0,
            distance_km: 0.0,
            elapsed_secs: 0,
            current_speed_kmh: 0.0,
            average_speed_kmh: 0.0,
            max_speed_kmh: 0.0,
            distance_text: format_distance(0.0),
            elapsed_text: format_elapsed(0),
            current_speed_text: format_speed(0.0),
            average_speed_text: format_speed(0.0),
            rejected_fixes: 0,
            location_errors: 0,
            last_location_error: None,
        }
    }

    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        Self {
            timestamp: current_timestamp(),
            state: snapshot.state,
            point_count: snapshot.point_count,
            distance_km: snapshot.distance_km,
            elapsed_secs: snapshot.elapsed_secs,
            current_speed_kmh: snapshot.current_speed_kmh,
            average_speed_kmh: snapshot.average_speed_kmh,
            max_speed_kmh: snapshot.max_speed_kmh,
            distance_text: format_distance(snapshot.distance_km),
            elapsed_text: format_elapsed(snapshot.elapsed_secs),
            current_speed_text: format_speed(snapshot.current_speed_kmh),
            average_speed_text: format_speed(snapshot.average_speed_kmh),
            rejected_fixes: snapshot.poor_accuracy_rejections + snapshot.movement_rejections,
            location_errors: snapshot.location_errors,
            last_location_error: snapshot.last_location_error.map(|e| e.to_string()),
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

impl Default for LiveStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// `HH:MM:SS`, hours keep growing past 99
pub fn format_elapsed(total_secs: u64) -> String {
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

pub fn format_distance(km: f64) -> String {
    format!("{:.2} km", km)
}

pub fn format_speed(kmh: f64) -> String {
    format!("{:.1} km/h", kmh)
}

pub fn current_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}
