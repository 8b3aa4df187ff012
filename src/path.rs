use crate::filter::{self, Rejection, Verdict};
use crate::fix::{PositionFix, RoutePoint};

/// Ordered accepted points and the running distance between them
#[derive(Debug, Clone, Default)]
pub struct PathAccumulator {
    points: Vec<RoutePoint>,
    distance_km: f64,
    last_accepted: Option<PositionFix>,
}

impl PathAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fix` through the filter and append it when accepted.
    ///
    /// Returns the distance added (0.0 for the first point). The read of the last accepted
    /// fix, the comparison and the append happen under the same `&mut self` borrow.
    pub fn offer(&mut self, fix: &PositionFix) -> Result<f64, Rejection> {
        match filter::evaluate(fix, self.last_accepted.as_ref()) {
            Verdict::Reject(rejection) => Err(rejection),
            Verdict::Accept { distance_km } => {
                let increment = distance_km.unwrap_or(0.0);
                self.points.push(fix.route_point());
                self.distance_km += increment;
                self.last_accepted = Some(*fix);
                Ok(increment)
            }
        }
    }

    pub fn points(&self) -> &[RoutePoint] {
        &self.points
    }

    /// Points appended at or after `index`, for incremental map feeds
    pub fn points_since(&self, index: usize) -> &[RoutePoint] {
        self.points.get(index..).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn last_accepted(&self) -> Option<&PositionFix> {
        self.last_accepted.as_ref()
    }

    pub fn clear(&mut self) {
        self.points.clear();
        self.distance_km = 0.0;
        self.last_accepted = None;
    }
}
