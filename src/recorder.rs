//! Live recording workflow.
//!
//! The platform pushes [`FixEvent`]s into an mpsc channel. One tokio task owns the receiving
//! end together with a periodic tick, and both feed the same [`SessionHandle`], so every
//! mutation of the session goes through one serialized boundary. The tick only refreshes the
//! published [`LiveStatus`].

use crate::clock::{Clock, SystemClock};
use crate::config::TrackerConfig;
use crate::error::{LocationError, TrackerError, TrackerResult};
use crate::fix::{PositionFix, RoutePoint};
use crate::live_status::LiveStatus;
use crate::session::{FixOutcome, SessionHandle, SessionSnapshot, SessionState};
use crate::storage::{ActivityStore, StoredActivity};
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Event delivered by the location service
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FixEvent {
    Fix(PositionFix),
    Error(LocationError),
}

pub type FixSender = mpsc::Sender<FixEvent>;
pub type FixReceiver = mpsc::Receiver<FixEvent>;

/// Channel between the location service callback and the recorder
pub fn fix_channel(capacity: usize) -> (FixSender, FixReceiver) {
    mpsc::channel(capacity.max(1))
}

struct Subscription {
    task: JoinHandle<()>,
    stream_end: Option<oneshot::Receiver<()>>,
}

/// Lifecycle owner of the live session
pub struct Recorder {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    session: SessionHandle,
    subscription: Option<Subscription>,
    status_tx: Arc<watch::Sender<LiveStatus>>,
}

impl Recorder {
    pub fn new(config: TrackerConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: TrackerConfig, clock: Arc<dyn Clock>) -> Self {
        let (status_tx, _) = watch::channel(LiveStatus::new());
        Self {
            config,
            clock,
            session: SessionHandle::new(),
            subscription: None,
            status_tx: Arc::new(status_tx),
        }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Live status feed, updated on every tick and on stop
    pub fn subscribe_status(&self) -> watch::Receiver<LiveStatus> {
        self.status_tx.subscribe()
    }

    pub fn state(&self) -> TrackerResult<SessionState> {
        self.session.state()
    }

    pub fn snapshot(&self) -> TrackerResult<SessionSnapshot> {
        self.session.snapshot(self.clock.now())
    }

    pub fn route_points(&self) -> TrackerResult<Vec<RoutePoint>> {
        self.session.route_points()
    }

    /// Points appended since `index`, for incremental map drawing
    pub fn points_since(&self, index: usize) -> TrackerResult<Vec<RoutePoint>> {
        self.session.points_since(index)
    }

    /// Start recording and begin consuming `fixes`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self, fixes: FixReceiver) -> TrackerResult<()> {
        self.session.start(self.clock.now())?;

        let (end_tx, end_rx) = oneshot::channel();
        let worker = IngestWorker {
            session: self.session.clone(),
            clock: Arc::clone(&self.clock),
            status_tx: Arc::clone(&self.status_tx),
            status_file: self.config.live_status_file.clone(),
            tick: self.config.tick_interval(),
        };
        let task = tokio::spawn(worker.run(fixes, end_tx));

        self.subscription = Some(Subscription {
            task,
            stream_end: Some(end_rx),
        });
        Ok(())
    }

    /// Wait until the location service closes its side of the fix channel and every fix
    /// queued before that has been processed.
    pub async fn wait_for_fix_stream_end(&mut self) -> TrackerResult<()> {
        let stream_end = self
            .subscription
            .as_mut()
            .and_then(|s| s.stream_end.take())
            .ok_or(TrackerError::NotRecording)?;

        stream_end
            .await
            .map_err(|_| TrackerError::Internal("Ingestion task ended early".to_string()))
    }

    /// Stop recording.
    ///
    /// The session is marked stopped under its lock before the ingestion task is cancelled,
    /// so a fix still in flight finds the session stopped and is discarded.
    pub fn stop(&mut self) -> TrackerResult<SessionSnapshot> {
        let now = self.clock.now();
        self.session.stop(now)?;
        self.unsubscribe();

        let snapshot = self.session.snapshot(now)?;
        self.publish(&snapshot);
        Ok(snapshot)
    }

    /// Finalize the stopped session into `store` and replace it with a fresh one.
    ///
    /// When the session cannot be finalized it stays stopped so the rider can discard it.
    pub fn save<S: ActivityStore + ?Sized>(
        &mut self,
        store: &mut S,
        name: Option<&str>,
        notes: &str,
    ) -> TrackerResult<StoredActivity> {
        let activity = match self.session.finalize(name, notes) {
            Ok(activity) => activity,
            Err(e) => {
                warn!("Not saving activity: {}", e);
                return Err(e);
            }
        };

        let stored = store.save(activity)?;
        info!(
            "Saved activity {} '{}' ({:.2} km, {}s)",
            stored.id, stored.activity.name, stored.activity.distance, stored.activity.duration
        );
        self.reset();
        Ok(stored)
    }

    /// Drop the current session, stopping it first if needed
    pub fn discard(&mut self) -> TrackerResult<()> {
        if self.session.state()? == SessionState::Recording {
            self.stop()?;
        }
        info!("Session discarded");
        self.reset();
        Ok(())
    }

    fn reset(&mut self) {
        self.unsubscribe();
        self.session = SessionHandle::new();
        self.status_tx.send_replace(LiveStatus::new());
    }

    fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.task.abort();
        }
    }

    fn publish(&self, snapshot: &SessionSnapshot) {
        publish_status(&self.status_tx, self.config.live_status_file.as_ref(), snapshot);
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

fn publish_status(
    status_tx: &watch::Sender<LiveStatus>,
    status_file: Option<&PathBuf>,
    snapshot: &SessionSnapshot,
) {
    let status = LiveStatus::from_snapshot(snapshot);
    if let Some(path) = status_file {
        if let Err(e) = status.save(path) {
            warn!("Failed to write live status to {}: {}", path.display(), e);
        }
    }
    status_tx.send_replace(status);
}

struct IngestWorker {
    session: SessionHandle,
    clock: Arc<dyn Clock>,
    status_tx: Arc<watch::Sender<LiveStatus>>,
    status_file: Option<PathBuf>,
    tick: Duration,
}

impl IngestWorker {
    async fn run(self, mut fixes: FixReceiver, end_tx: oneshot::Sender<()>) {
        let mut ticker = interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut end_tx = Some(end_tx);

        loop {
            tokio::select! {
                event = fixes.recv(), if end_tx.is_some() => match event {
                    Some(FixEvent::Fix(fix)) => self.handle_fix(&fix),
                    Some(FixEvent::Error(err)) => self.handle_location_error(err),
                    None => {
                        info!("Fix stream closed, timer keeps running until stop");
                        if let Some(tx) = end_tx.take() {
                            let _ = tx.send(());
                        }
                    }
                },
                _ = ticker.tick() => self.handle_tick(),
            }
        }
    }

    fn handle_fix(&self, fix: &PositionFix) {
        match self.session.push_fix(fix) {
            Ok(FixOutcome::Accepted {
                point,
                distance_added_km,
                ..
            }) => {
                debug!(
                    "Route point ({:.6}, {:.6}) +{:.4} km",
                    point.lat, point.lng, distance_added_km
                );
            }
            Ok(FixOutcome::Rejected(_)) | Ok(FixOutcome::Ignored) => {}
            Err(e) => error!("Failed to record fix: {}", e),
        }
    }

    fn handle_location_error(&self, err: LocationError) {
        warn!("{}", TrackerError::Location(err));
        if let Err(e) = self.session.note_location_error(err) {
            error!("Failed to record location error: {}", e);
        }
    }

    fn handle_tick(&self) {
        match self.session.snapshot(self.clock.now()) {
            Ok(snapshot) => {
                publish_status(&self.status_tx, self.status_file.as_ref(), &snapshot)
            }
            Err(e) => error!("Failed to read session: {}", e),
        }
    }
}
