/// m/s to km/h
pub const MS_TO_KMH: f64 = 3.6;

/// Speed samples reported by the location service, in km/h
#[derive(Debug, Clone, Default)]
pub struct SpeedEstimator {
    samples_kmh: Vec<f64>,
    max_kmh: f64,
}

impl SpeedEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the speed carried by an accepted fix.
    ///
    /// Missing or negative speeds are gaps and add no sample. Returns the stored km/h value.
    pub fn record(&mut self, speed_ms: Option<f64>) -> Option<f64> {
        let speed_ms = speed_ms.filter(|s| s.is_finite() && *s >= 0.0)?;
        let kmh = speed_ms * MS_TO_KMH;
        self.samples_kmh.push(kmh);
        self.max_kmh = self.max_kmh.max(kmh);
        Some(kmh)
    }

    /// Most recent sample, 0 before the first one
    pub fn current_kmh(&self) -> f64 {
        self.samples_kmh.last().copied().unwrap_or(0.0)
    }

    pub fn max_kmh(&self) -> f64 {
        self.max_kmh
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples_kmh
    }

    pub fn clear(&mut self) {
        self.samples_kmh.clear();
        self.max_kmh = 0.0;
    }
}

/// Average speed over the elapsed time; 0 when no time has passed.
pub fn average_speed_kmh(distance_km: f64, elapsed_secs: u64) -> f64 {
    if elapsed_secs == 0 {
        return 0.0;
    }
    distance_km / (elapsed_secs as f64 / 3600.0)
}
