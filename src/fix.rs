use serde::{Deserialize, Serialize};

/// Position fix as delivered by the platform location service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionFix {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub elevation: f64,
    /// Horizontal accuracy in meters; `None` when the platform did not report one
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Instantaneous speed in m/s
    #[serde(default)]
    pub speed: Option<f64>,
    /// Milliseconds
    pub timestamp: i64,
}

impl PositionFix {
    pub fn new(latitude: f64, longitude: f64, accuracy: f64, timestamp: i64) -> Self {
        Self {
            latitude,
            longitude,
            elevation: 0.0,
            accuracy: Some(accuracy),
            speed: None,
            timestamp,
        }
    }

    pub fn with_speed(mut self, speed_ms: f64) -> Self {
        self.speed = Some(speed_ms);
        self
    }

    pub fn with_elevation(mut self, elevation: f64) -> Self {
        self.elevation = elevation;
        self
    }

    pub fn route_point(&self) -> RoutePoint {
        RoutePoint::new(self.latitude, self.longitude, self.elevation)
    }
}

/// Accepted position in a recorded path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoutePoint {
    pub lat: f64,
    pub lng: f64,
    #[serde(default)]
    pub elevation: f64,
}

impl RoutePoint {
    pub fn new(lat: f64, lng: f64, elevation: f64) -> Self {
        Self { lat, lng, elevation }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

impl From<&PositionFix> for RoutePoint {
    fn from(fix: &PositionFix) -> Self {
        fix.route_point()
    }
}
