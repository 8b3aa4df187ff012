// Ride Tracker
// GPS ride recording core for the cycling companion: fix filtering, path and speed
// accumulation, session lifecycle, and the activity records built from it.

pub mod activity;
pub mod badges;
pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod fix;
pub mod geo;
pub mod live_status;
pub mod path;
pub mod planner;
pub mod recorder;
pub mod routes;
pub mod session;
pub mod speed;
pub mod storage;

pub use activity::Activity;
pub use clock::{Clock, ReplayClock, SystemClock};
pub use config::TrackerConfig;
pub use error::{LocationError, TrackerError, TrackerResult};
pub use filter::Rejection;
pub use fix::{PositionFix, RoutePoint};
pub use geo::{haversine_km, route_length_km};
pub use live_status::LiveStatus;
pub use recorder::{fix_channel, FixEvent, Recorder};
pub use session::{FixOutcome, SessionHandle, SessionSnapshot, SessionState, TrackSession};
pub use storage::{ActivityStore, JsonFileStore, MemoryStore, StoredActivity};
