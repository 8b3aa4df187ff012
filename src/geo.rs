//! Great-circle distance shared by the tracker, the route planner and community routes.
//!
//! Every distance shown to the rider goes through [`haversine_km`] so that planned and
//! recorded distances agree to the bit.

use crate::fix::RoutePoint;

/// Mean Earth radius used for every distance in the app
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance in kilometers between two coordinates given in degrees.
#[inline]
pub fn haversine_km(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Distance between two route points in kilometers
#[inline]
pub fn distance_km(p1: &RoutePoint, p2: &RoutePoint) -> f64 {
    haversine_km(p1.lat, p1.lng, p2.lat, p2.lng)
}

/// Total length of a point sequence, summed pairwise.
///
/// Empty or single-point sequences return 0.0.
pub fn route_length_km(points: &[RoutePoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| distance_km(&w[0], &w[1]))
        .sum()
}
