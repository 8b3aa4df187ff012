use crate::activity::{default_activity_name, Activity};
use crate::error::{LocationError, TrackerError, TrackerResult};
use crate::filter::Rejection;
use crate::fix::{PositionFix, RoutePoint};
use crate::path::PathAccumulator;
use crate::speed::{average_speed_kmh, SpeedEstimator};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Session state machine states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Created, nothing recorded yet
    Idle,
    /// Ingesting fixes
    Recording,
    /// Recording finished, path frozen
    Stopped,
}

/// What happened to a fix pushed into the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixOutcome {
    Accepted {
        point: RoutePoint,
        distance_added_km: f64,
        speed_kmh: Option<f64>,
    },
    Rejected(Rejection),
    /// Session was not recording; the fix was discarded
    Ignored,
}

/// Read-only aggregate view of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub started_at: Option<DateTime<Utc>>,
    pub distance_km: f64,
    pub elapsed_secs: u64,
    pub point_count: usize,
    pub current_speed_kmh: f64,
    pub average_speed_kmh: f64,
    pub max_speed_kmh: f64,
    pub poor_accuracy_rejections: u32,
    pub movement_rejections: u32,
    pub location_errors: u32,
    pub last_location_error: Option<LocationError>,
}

/// One ride recording from start to stop
#[derive(Debug, Clone)]
pub struct TrackSession {
    state: SessionState,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    duration_secs: u64,
    path: PathAccumulator,
    speeds: SpeedEstimator,
    poor_accuracy_rejections: u32,
    movement_rejections: u32,
    location_errors: u32,
    last_location_error: Option<LocationError>,
}

impl TrackSession {
    /// Create new session in Idle state
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            started_at: None,
            ended_at: None,
            duration_secs: 0,
            path: PathAccumulator::new(),
            speeds: SpeedEstimator::new(),
            poor_accuracy_rejections: 0,
            movement_rejections: 0,
            location_errors: 0,
            last_location_error: None,
        }
    }

    /// Transition to Recording state (Idle → Recording)
    pub fn start(&mut self, now: DateTime<Utc>) -> TrackerResult<()> {
        match self.state {
            SessionState::Idle => {
                self.path.clear();
                self.speeds.clear();
                self.poor_accuracy_rejections = 0;
                self.movement_rejections = 0;
                self.location_errors = 0;
                self.last_location_error = None;
                self.ended_at = None;
                self.duration_secs = 0;
                self.started_at = Some(now);
                self.state = SessionState::Recording;
                info!("Recording started at {}", now.to_rfc3339());
                Ok(())
            }
            SessionState::Recording => Err(TrackerError::AlreadyRecording),
            SessionState::Stopped => Err(TrackerError::InvalidState(
                "Session already stopped, start a new one".to_string(),
            )),
        }
    }

    /// Transition to Stopped state (Recording → Stopped). Returns the duration in seconds.
    pub fn stop(&mut self, now: DateTime<Utc>) -> TrackerResult<u64> {
        if self.state != SessionState::Recording {
            return Err(TrackerError::NotRecording);
        }

        self.duration_secs = self.elapsed_secs(now);
        self.ended_at = Some(now);
        self.state = SessionState::Stopped;
        info!(
            "Recording stopped after {}s: {} points, {:.3} km",
            self.duration_secs,
            self.path.len(),
            self.path.distance_km()
        );
        Ok(self.duration_secs)
    }

    /// Filter a fix and, if accepted, extend the path and speed samples
    pub fn push_fix(&mut self, fix: &PositionFix) -> FixOutcome {
        // Only accept fixes while recording
        if self.state != SessionState::Recording {
            debug!("Discarding fix at {} (session {:?})", fix.timestamp, self.state);
            return FixOutcome::Ignored;
        }

        match self.path.offer(fix) {
            Ok(distance_added_km) => {
                let speed_kmh = self.speeds.record(fix.speed);
                FixOutcome::Accepted {
                    point: fix.route_point(),
                    distance_added_km,
                    speed_kmh,
                }
            }
            Err(rejection) => {
                match rejection {
                    Rejection::PoorAccuracy { .. } => self.poor_accuracy_rejections += 1,
                    Rejection::BelowMovementThreshold { .. } => self.movement_rejections += 1,
                }
                debug!("Fix at {} rejected: {}", fix.timestamp, rejection);
                FixOutcome::Rejected(rejection)
            }
        }
    }

    /// Count a location service failure; the recording carries on with a gap
    pub fn note_location_error(&mut self, error: LocationError) {
        if self.state == SessionState::Recording {
            self.location_errors += 1;
            self.last_location_error = Some(error);
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    pub fn route_points(&self) -> &[RoutePoint] {
        self.path.points()
    }

    pub fn points_since(&self, index: usize) -> &[RoutePoint] {
        self.path.points_since(index)
    }

    pub fn distance_km(&self) -> f64 {
        self.path.distance_km()
    }

    pub fn speed_samples(&self) -> &[f64] {
        self.speeds.samples()
    }

    /// Whole seconds since start; frozen duration once stopped
    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> u64 {
        match (self.state, self.started_at) {
            (SessionState::Recording, Some(start)) => {
                now.signed_duration_since(start).num_seconds().max(0) as u64
            }
            (SessionState::Stopped, _) => self.duration_secs,
            _ => 0,
        }
    }

    /// Get aggregate snapshot
    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        let elapsed_secs = self.elapsed_secs(now);
        SessionSnapshot {
            state: self.state,
            started_at: self.started_at,
            distance_km: self.path.distance_km(),
            elapsed_secs,
            point_count: self.path.len(),
            current_speed_kmh: self.speeds.current_kmh(),
            average_speed_kmh: average_speed_kmh(self.path.distance_km(), elapsed_secs),
            max_speed_kmh: self.speeds.max_kmh(),
            poor_accuracy_rejections: self.poor_accuracy_rejections,
            movement_rejections: self.movement_rejections,
            location_errors: self.location_errors,
            last_location_error: self.last_location_error,
        }
    }

    /// Build the activity record for a stopped session.
    ///
    /// A blank `name` falls back to a name derived from the start time.
    pub fn finalize(&self, name: Option<&str>, notes: &str) -> TrackerResult<Activity> {
        let (SessionState::Stopped, Some(started_at)) = (self.state, self.started_at) else {
            return Err(TrackerError::InvalidState(format!(
                "Cannot finalize a session in state {:?}",
                self.state
            )));
        };

        let points = self.path.len();
        if points < 2 {
            return Err(TrackerError::InsufficientRoutePoints { points });
        }

        let name = match name.map(str::trim) {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => default_activity_name(started_at),
        };

        Ok(Activity {
            name,
            date: started_at,
            distance: self.path.distance_km(),
            duration: self.duration_secs,
            average_speed: average_speed_kmh(self.path.distance_km(), self.duration_secs),
            max_speed: self.speeds.max_kmh(),
            elevation_gain: 0.0,
            route: self.path.points().to_vec(),
            notes: notes.to_string(),
        })
    }
}

impl Default for TrackSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to a session for the ingestion task and its readers.
///
/// Every operation takes the lock once, so filter, append and state checks are atomic per call.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<Mutex<TrackSession>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> TrackerResult<MutexGuard<'_, TrackSession>> {
        self.inner
            .lock()
            .map_err(|_| TrackerError::Internal("Failed to acquire session lock".to_string()))
    }

    pub fn start(&self, now: DateTime<Utc>) -> TrackerResult<()> {
        self.lock()?.start(now)
    }

    pub fn stop(&self, now: DateTime<Utc>) -> TrackerResult<u64> {
        self.lock()?.stop(now)
    }

    pub fn push_fix(&self, fix: &PositionFix) -> TrackerResult<FixOutcome> {
        Ok(self.lock()?.push_fix(fix))
    }

    pub fn note_location_error(&self, error: LocationError) -> TrackerResult<()> {
        self.lock()?.note_location_error(error);
        Ok(())
    }

    pub fn state(&self) -> TrackerResult<SessionState> {
        Ok(self.lock()?.state())
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> TrackerResult<SessionSnapshot> {
        Ok(self.lock()?.snapshot(now))
    }

    pub fn route_points(&self) -> TrackerResult<Vec<RoutePoint>> {
        Ok(self.lock()?.route_points().to_vec())
    }

    pub fn points_since(&self, index: usize) -> TrackerResult<Vec<RoutePoint>> {
        Ok(self.lock()?.points_since(index).to_vec())
    }

    pub fn finalize(&self, name: Option<&str>, notes: &str) -> TrackerResult<Activity> {
        self.lock()?.finalize(name, notes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::{haversine_km, route_length_km};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn fix(lat: f64, lng: f64, accuracy: f64) -> PositionFix {
        PositionFix::new(lat, lng, accuracy, 0)
    }

    #[test]
    fn test_session_state_transitions() {
        let mut session = TrackSession::new();

        // Initial state is Idle
        assert_eq!(session.state(), SessionState::Idle);
        assert!(!session.is_recording());

        // Idle → Recording
        session.start(t0()).unwrap();
        assert_eq!(session.state(), SessionState::Recording);
        assert!(session.is_recording());

        // Recording → Stopped
        session.stop(t0() + Duration::seconds(30)).unwrap();
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_invalid_state_transitions() {
        let mut session = TrackSession::new();

        // Can't stop while idle
        assert!(matches!(session.stop(t0()), Err(TrackerError::NotRecording)));

        // Can't start twice
        session.start(t0()).unwrap();
        assert!(matches!(
            session.start(t0()),
            Err(TrackerError::AlreadyRecording)
        ));
        assert_eq!(session.state(), SessionState::Recording);

        // Can't stop twice or restart a stopped session
        session.stop(t0()).unwrap();
        assert!(matches!(session.stop(t0()), Err(TrackerError::NotRecording)));
        assert!(matches!(
            session.start(t0()),
            Err(TrackerError::InvalidState(_))
        ));
    }

    #[test]
    fn test_idle_is_empty() {
        let session = TrackSession::new();
        let snap = session.snapshot(t0());
        assert_eq!(snap.point_count, 0);
        assert_eq!(snap.distance_km, 0.0);
        assert_eq!(snap.elapsed_secs, 0);
    }

    #[test]
    fn test_fixes_ignored_outside_recording() {
        let mut session = TrackSession::new();
        assert_eq!(session.push_fix(&fix(0.0, 0.0, 5.0)), FixOutcome::Ignored);

        session.start(t0()).unwrap();
        session.push_fix(&fix(0.0, 0.0, 5.0));
        session.push_fix(&fix(0.0, 0.001, 5.0));
        session.stop(t0() + Duration::seconds(10)).unwrap();

        assert_eq!(session.push_fix(&fix(0.0, 0.002, 5.0)), FixOutcome::Ignored);
        assert_eq!(session.route_points().len(), 2);
    }

    #[test]
    fn test_poor_accuracy_changes_nothing() {
        let mut session = TrackSession::new();
        session.start(t0()).unwrap();
        session.push_fix(&fix(0.0, 0.0, 5.0).with_speed(3.0));

        let before = session.snapshot(t0());
        let outcome = session.push_fix(&fix(0.0, 0.01, 51.0).with_speed(9.0));
        assert!(matches!(
            outcome,
            FixOutcome::Rejected(Rejection::PoorAccuracy { .. })
        ));

        let after = session.snapshot(t0());
        assert_eq!(after.point_count, before.point_count);
        assert_eq!(after.distance_km, before.distance_km);
        assert_eq!(session.speed_samples().len(), 1);
        assert_eq!(after.max_speed_kmh, before.max_speed_kmh);
        assert_eq!(after.poor_accuracy_rejections, 1);
    }

    #[test]
    fn test_reference_scenario() {
        let mut session = TrackSession::new();
        session.start(t0()).unwrap();

        assert!(matches!(
            session.push_fix(&fix(0.0, 0.0, 5.0)),
            FixOutcome::Accepted { .. }
        ));
        assert!(matches!(
            session.push_fix(&fix(0.0, 0.0001, 5.0)),
            FixOutcome::Accepted { .. }
        ));
        assert!(matches!(
            session.push_fix(&fix(0.0, 0.00005, 80.0)),
            FixOutcome::Rejected(Rejection::PoorAccuracy { .. })
        ));
        assert!(matches!(
            session.push_fix(&fix(0.0, 0.00015, 5.0)),
            FixOutcome::Accepted { .. }
        ));

        let points = session.route_points();
        assert_eq!(points.len(), 3);
        assert_eq!(points[2].lng, 0.00015);

        let expected = haversine_km(0.0, 0.0, 0.0, 0.0001) + haversine_km(0.0, 0.0001, 0.0, 0.00015);
        assert!((session.distance_km() - expected).abs() < 1e-12);
        assert!((session.distance_km() - route_length_km(points)).abs() < 1e-12);
    }

    #[test]
    fn test_elapsed_and_average_speed() {
        let mut session = TrackSession::new();
        session.start(t0()).unwrap();
        session.push_fix(&fix(0.0, 0.0, 5.0));
        session.push_fix(&fix(0.0, 0.01, 5.0));

        let snap = session.snapshot(t0() + Duration::seconds(90));
        assert_eq!(snap.elapsed_secs, 90);
        let expected = session.distance_km() / (90.0 / 3600.0);
        assert!((snap.average_speed_kmh - expected).abs() < 1e-9);

        // zero elapsed time means zero average
        let snap = session.snapshot(t0());
        assert_eq!(snap.average_speed_kmh, 0.0);
    }

    #[test]
    fn test_duration_truncates() {
        let mut session = TrackSession::new();
        session.start(t0()).unwrap();
        let duration = session
            .stop(t0() + Duration::milliseconds(61_999))
            .unwrap();
        assert_eq!(duration, 61);
        // frozen after stop
        assert_eq!(session.elapsed_secs(t0() + Duration::hours(5)), 61);
    }

    #[test]
    fn test_finalize_requires_two_points() {
        for count in 0..2 {
            let mut session = TrackSession::new();
            session.start(t0()).unwrap();
            for i in 0..count {
                session.push_fix(&fix(0.0, i as f64 * 0.001, 5.0));
            }
            session.stop(t0() + Duration::seconds(5)).unwrap();
            assert_eq!(session.elapsed_secs(t0()), 5);

            match session.finalize(Some("Ride"), "") {
                Err(TrackerError::InsufficientRoutePoints { points }) => assert_eq!(points, count),
                other => panic!("expected InsufficientRoutePoints, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_finalize_builds_activity() {
        let mut session = TrackSession::new();
        session.start(t0()).unwrap();
        session.push_fix(&fix(0.0, 0.0, 5.0).with_speed(4.0));
        session.push_fix(&fix(0.0, 0.01, 5.0).with_speed(6.0));
        session.push_fix(&fix(0.0, 0.02, 5.0));
        session.stop(t0() + Duration::seconds(3600)).unwrap();

        let activity = session.finalize(Some("  Morning loop "), "windy").unwrap();
        assert_eq!(activity.name, "Morning loop");
        assert_eq!(activity.date, t0());
        assert_eq!(activity.distance, session.distance_km());
        assert_eq!(activity.duration, 3600);
        assert_eq!(activity.route.len(), 3);
        assert_eq!(activity.average_speed, session.distance_km());
        assert!((activity.max_speed - 21.6).abs() < 1e-9);
        assert_eq!(activity.elevation_gain, 0.0);
        assert_eq!(activity.notes, "windy");
    }

    #[test]
    fn test_finalize_while_recording_is_refused() {
        let mut session = TrackSession::new();
        session.start(t0()).unwrap();
        assert!(matches!(
            session.finalize(None, ""),
            Err(TrackerError::InvalidState(_))
        ));
    }

    #[test]
    fn test_location_errors_counted_while_recording() {
        let mut session = TrackSession::new();
        session.note_location_error(LocationError::Timeout);
        assert_eq!(session.snapshot(t0()).location_errors, 0);

        session.start(t0()).unwrap();
        session.note_location_error(LocationError::PositionUnavailable);
        let snap = session.snapshot(t0());
        assert_eq!(snap.location_errors, 1);
        assert_eq!(
            snap.last_location_error,
            Some(LocationError::PositionUnavailable)
        );
        assert!(snap.state == SessionState::Recording);
    }

    #[test]
    fn test_handle_shares_state() {
        let handle = SessionHandle::new();
        let reader = handle.clone();
        handle.start(t0()).unwrap();
        handle.push_fix(&fix(1.0, 1.0, 5.0)).unwrap();
        assert_eq!(reader.snapshot(t0()).unwrap().point_count, 1);
        assert_eq!(reader.state().unwrap(), SessionState::Recording);
    }
}
