use crate::fix::PositionFix;
use crate::geo::haversine_km;
use thiserror::Error;

/// Fixes less accurate than this are dropped (meters)
pub const MAX_ACCURACY_M: f64 = 50.0;

/// Minimum movement from the last accepted fix before a new point is recorded (km)
pub const MIN_MOVEMENT_KM: f64 = 0.005;

/// Why a fix did not become a route point
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    #[error("poor GPS accuracy ({accuracy:?} m)")]
    PoorAccuracy { accuracy: Option<f64> },

    #[error("moved {distance_km:.4} km, below movement threshold")]
    BelowMovementThreshold { distance_km: f64 },
}

/// Filter verdict for a single fix
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Accepted; `distance_km` is the increment from the last accepted fix, `None` for the first
    Accept { distance_km: Option<f64> },
    Reject(Rejection),
}

/// Decide whether `fix` should be appended after `last_accepted`.
///
/// Stateless: the session owns the last accepted fix and passes it in.
pub fn evaluate(fix: &PositionFix, last_accepted: Option<&PositionFix>) -> Verdict {
    match fix.accuracy {
        Some(accuracy) if accuracy <= MAX_ACCURACY_M => {}
        accuracy => return Verdict::Reject(Rejection::PoorAccuracy { accuracy }),
    }

    let Some(last) = last_accepted else {
        return Verdict::Accept { distance_km: None };
    };

    let distance_km = haversine_km(last.latitude, last.longitude, fix.latitude, fix.longitude);
    if distance_km < MIN_MOVEMENT_KM {
        return Verdict::Reject(Rejection::BelowMovementThreshold { distance_km });
    }

    Verdict::Accept {
        distance_km: Some(distance_km),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_accuracy_rejected() {
        let mut fix = PositionFix::new(0.0, 0.0, 5.0, 0);
        fix.accuracy = None;
        assert_eq!(
            evaluate(&fix, None),
            Verdict::Reject(Rejection::PoorAccuracy { accuracy: None })
        );
    }

    #[test]
    fn test_accuracy_boundary() {
        let at_limit = PositionFix::new(0.0, 0.0, 50.0, 0);
        assert_eq!(evaluate(&at_limit, None), Verdict::Accept { distance_km: None });

        let over = PositionFix::new(0.0, 0.0, 50.1, 0);
        assert!(matches!(
            evaluate(&over, None),
            Verdict::Reject(Rejection::PoorAccuracy { .. })
        ));
    }

    #[test]
    fn test_poor_accuracy_checked_before_first_fix() {
        let fix = PositionFix::new(0.0, 0.0, 80.0, 0);
        assert!(matches!(evaluate(&fix, None), Verdict::Reject(_)));
    }

    #[test]
    fn test_jitter_rejected() {
        let first = PositionFix::new(0.0, 0.0, 5.0, 0);
        // ~3.3 m east
        let jitter = PositionFix::new(0.0, 0.00003, 5.0, 1000);
        match evaluate(&jitter, Some(&first)) {
            Verdict::Reject(Rejection::BelowMovementThreshold { distance_km }) => {
                assert!(distance_km < MIN_MOVEMENT_KM);
            }
            other => panic!("expected movement rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_movement_accepted_with_increment() {
        let first = PositionFix::new(0.0, 0.0, 5.0, 0);
        let next = PositionFix::new(0.0, 0.0001, 5.0, 1000);
        match evaluate(&next, Some(&first)) {
            Verdict::Accept { distance_km: Some(d) } => assert!((d - 0.01112).abs() < 1e-4),
            other => panic!("expected accept, got {other:?}"),
        }
    }
}
