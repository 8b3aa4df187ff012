use crate::fix::RoutePoint;
use crate::geo::route_length_km;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Route shared by the community
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityRoute {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub difficulty: String,
    /// Published distance in km
    pub distance: f64,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub route: Vec<RoutePoint>,
}

impl CommunityRoute {
    /// Length of the shared point sequence, as shown next to the map
    pub fn measured_distance_km(&self) -> f64 {
        route_length_km(&self.route)
    }
}

/// Browse filters; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteQuery {
    pub difficulty: Option<String>,
    pub min_distance: Option<f64>,
    pub max_distance: Option<f64>,
    pub min_rating: Option<f64>,
}

impl RouteQuery {
    pub fn matches(&self, route: &CommunityRoute) -> bool {
        if let Some(difficulty) = &self.difficulty {
            if !route.difficulty.eq_ignore_ascii_case(difficulty) {
                return false;
            }
        }
        if self.min_distance.is_some_and(|min| route.distance < min) {
            return false;
        }
        if self.max_distance.is_some_and(|max| route.distance > max) {
            return false;
        }
        if self.min_rating.is_some_and(|min| route.rating < min) {
            return false;
        }
        true
    }
}

/// Filter `routes` and sort by rating, best first
pub fn browse(routes: &[CommunityRoute], query: &RouteQuery) -> Vec<CommunityRoute> {
    let mut found: Vec<CommunityRoute> = routes
        .iter()
        .filter(|r| query.matches(r))
        .cloned()
        .collect();
    found.sort_by(|a, b| b.rating.partial_cmp(&a.rating).unwrap_or(Ordering::Equal));
    found
}
