use crate::error::{TrackerError, TrackerResult};
use crate::fix::RoutePoint;
use crate::geo::route_length_km;

/// Manually entered waypoints for a planned route
#[derive(Debug, Clone, Default)]
pub struct RoutePlanner {
    waypoints: Vec<RoutePoint>,
}

impl RoutePlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_waypoint(&mut self, lat: f64, lng: f64) -> TrackerResult<()> {
        let point = RoutePoint::new(lat, lng, 0.0);
        if !point.is_valid() {
            return Err(TrackerError::InvalidParameters(format!(
                "Waypoint out of range: {}, {}",
                lat, lng
            )));
        }
        self.waypoints.push(point);
        Ok(())
    }

    pub fn undo_last(&mut self) -> Option<RoutePoint> {
        self.waypoints.pop()
    }

    pub fn clear(&mut self) {
        self.waypoints.clear();
    }

    pub fn waypoints(&self) -> &[RoutePoint] {
        &self.waypoints
    }

    /// Recomputed over every waypoint, no movement threshold
    pub fn total_distance_km(&self) -> f64 {
        route_length_km(&self.waypoints)
    }

    pub fn distance_text(&self) -> String {
        format!("{:.1}", self.total_distance_km())
    }
}

/// Parse a `lat,lng` pair as typed on the command line
pub fn parse_waypoint(text: &str) -> TrackerResult<(f64, f64)> {
    let invalid = || TrackerError::InvalidParameters(format!("Expected 'lat,lng', got '{}'", text));
    let (lat, lng) = text.split_once(',').ok_or_else(invalid)?;
    let lat = lat.trim().parse::<f64>().map_err(|_| invalid())?;
    let lng = lng.trim().parse::<f64>().map_err(|_| invalid())?;
    Ok((lat, lng))
}
