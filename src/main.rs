use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use flate2::read::GzDecoder;
use log::{info, warn};
use serde::Deserialize;

use ride_tracker::badges::award_badges;
use ride_tracker::live_status::{format_distance, format_elapsed, format_speed};
use ride_tracker::planner::{parse_waypoint, RoutePlanner};
use ride_tracker::routes::{browse, CommunityRoute, RouteQuery};
use ride_tracker::storage::read_json_file;
use ride_tracker::{
    fix_channel, ActivityStore, FixEvent, JsonFileStore, LocationError, PositionFix, Recorder,
    ReplayClock, SessionSnapshot, TrackerConfig, TrackerError,
};

#[derive(Parser, Debug)]
#[command(name = "ride_tracker")]
#[command(about = "Record, replay and review bike rides", long_about = None)]
struct Args {
    /// JSON config file (defaults apply for anything it leaves out)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding activities.json and the badge files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Feed a recorded fix log (.json or .json.gz) through the recorder
    Replay {
        log: PathBuf,

        /// Save the finished ride to the activity store
        #[arg(long, default_value_t = false)]
        save: bool,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Distance of a planned route through `lat,lng` waypoints
    Plan {
        #[arg(required = true, allow_hyphen_values = true)]
        waypoints: Vec<String>,
    },

    /// Browse community routes, best rated first
    Routes {
        #[arg(long)]
        difficulty: Option<String>,

        #[arg(long)]
        min_distance: Option<f64>,

        #[arg(long)]
        max_distance: Option<f64>,

        #[arg(long)]
        min_rating: Option<f64>,
    },

    /// Saved activities
    Activities {
        #[command(subcommand)]
        action: ActivitiesAction,
    },
}

#[derive(Subcommand, Debug)]
enum ActivitiesAction {
    List,
    Show { id: String },
    Delete { id: String },
    /// Export as GPX 1.1
    Gpx {
        id: String,

        /// Write to a file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// One line of a recorded fix log: either a position or a location service error
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LogEntry {
    Error { error: LocationError, timestamp: i64 },
    Fix(PositionFix),
}

impl LogEntry {
    fn timestamp(&self) -> i64 {
        match self {
            LogEntry::Error { timestamp, .. } => *timestamp,
            LogEntry::Fix(fix) => fix.timestamp,
        }
    }

    fn into_event(self) -> FixEvent {
        match self {
            LogEntry::Error { error, .. } => FixEvent::Error(error),
            LogEntry::Fix(fix) => FixEvent::Fix(fix),
        }
    }
}

fn load_log(path: &Path) -> Result<Vec<LogEntry>> {
    let file = File::open(path)?;
    if path.extension().map(|e| e == "gz").unwrap_or(false) {
        let gz = GzDecoder::new(file);
        let reader = BufReader::new(gz);
        Ok(serde_json::from_reader(reader)?)
    } else {
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TrackerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrackerConfig::default(),
    };
    if let Some(dir) = args.data_dir {
        config.data_dir = dir;
    }

    match args.command {
        Command::Replay {
            log,
            save,
            name,
            notes,
        } => replay(config, &log, save, name.as_deref(), &notes).await,
        Command::Plan { waypoints } => plan(&waypoints),
        Command::Routes {
            difficulty,
            min_distance,
            max_distance,
            min_rating,
        } => routes(
            &config,
            &RouteQuery {
                difficulty,
                min_distance,
                max_distance,
                min_rating,
            },
        ),
        Command::Activities { action } => activities(&config, action),
    }
}

async fn replay(
    config: TrackerConfig,
    log: &Path,
    save: bool,
    name: Option<&str>,
    notes: &str,
) -> Result<()> {
    let entries =
        load_log(log).with_context(|| format!("Failed to load fix log {}", log.display()))?;
    info!("Loaded {} entries from {}", entries.len(), log.display());

    // Elapsed time follows the fix timestamps, not the wall clock
    let clock = ReplayClock::new(entries.first().map(LogEntry::timestamp).unwrap_or(0));
    let capacity = config.fix_channel_capacity;
    let mut recorder = Recorder::with_clock(config.clone(), Arc::new(clock.clone()));

    let (tx, rx) = fix_channel(capacity);
    recorder.start(rx)?;

    for entry in entries {
        clock.advance_to(entry.timestamp());
        tx.send(entry.into_event())
            .await
            .map_err(|_| anyhow!("Recorder stopped consuming fixes"))?;
    }
    drop(tx);
    recorder.wait_for_fix_stream_end().await?;

    let snapshot = recorder.stop()?;
    print_summary(&snapshot);

    if !save {
        return Ok(());
    }

    let mut store = JsonFileStore::open(config.activities_file())?;
    match recorder.save(&mut store, name, notes) {
        Ok(stored) => {
            println!("Saved activity {} '{}'", stored.id, stored.activity.name);
        }
        Err(TrackerError::InsufficientRoutePoints { points }) => {
            warn!("Ride has only {} route point(s), discarding", points);
            recorder.discard()?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    let badges_file = config.badges_file();
    if badges_file.exists() {
        let rides: Vec<_> = store.list()?.into_iter().map(|s| s.activity).collect();
        let earned = award_badges(&badges_file, &config.earned_badges_file(), &rides, Utc::now())?;
        for badge in earned {
            println!("New badge: {}", badge.badge.name);
        }
    }
    Ok(())
}

fn print_summary(snapshot: &SessionSnapshot) {
    println!("\n=== Ride Summary ===");
    println!("Duration:    {}", format_elapsed(snapshot.elapsed_secs));
    println!("Distance:    {}", format_distance(snapshot.distance_km));
    println!("Avg speed:   {}", format_speed(snapshot.average_speed_kmh));
    println!("Max speed:   {}", format_speed(snapshot.max_speed_kmh));
    println!("Points:      {}", snapshot.point_count);
    println!(
        "Rejected:    {} poor accuracy, {} too close",
        snapshot.poor_accuracy_rejections, snapshot.movement_rejections
    );
    if snapshot.location_errors > 0 {
        println!("Loc errors:  {}", snapshot.location_errors);
    }
}

fn plan(waypoints: &[String]) -> Result<()> {
    let mut planner = RoutePlanner::new();
    for text in waypoints {
        let (lat, lng) = parse_waypoint(text)?;
        planner.add_waypoint(lat, lng)?;
    }
    println!(
        "{} waypoints, {} km",
        planner.waypoints().len(),
        planner.distance_text()
    );
    Ok(())
}

fn routes(config: &TrackerConfig, query: &RouteQuery) -> Result<()> {
    let catalogue: Vec<CommunityRoute> = read_json_file(&config.routes_file())?;
    let found = browse(&catalogue, query);
    if found.is_empty() {
        println!("No routes match");
    }
    for route in found {
        println!(
            "{:<16} {:<28} {:<10} {:>7.1} km  {:.1}*",
            route.id, route.name, route.difficulty, route.distance, route.rating
        );
    }
    Ok(())
}

fn activities(config: &TrackerConfig, action: ActivitiesAction) -> Result<()> {
    let mut store = JsonFileStore::open(config.activities_file())?;

    match action {
        ActivitiesAction::List => {
            let all = store.list()?;
            if all.is_empty() {
                println!("No saved activities");
            }
            for stored in all {
                let a = &stored.activity;
                println!(
                    "{}  {}  {}  {}  {}",
                    stored.id,
                    a.date.format("%Y-%m-%d %H:%M"),
                    format_distance(a.distance),
                    format_elapsed(a.duration),
                    a.name
                );
            }
        }
        ActivitiesAction::Show { id } => {
            let stored = store
                .get(&id)?
                .ok_or_else(|| anyhow!("Activity not found: {}", id))?;
            println!("{}", serde_json::to_string_pretty(&stored)?);
        }
        ActivitiesAction::Delete { id } => {
            store.delete(&id)?;
            println!("Deleted {}", id);
        }
        ActivitiesAction::Gpx { id, output } => {
            let stored = store
                .get(&id)?
                .ok_or_else(|| anyhow!("Activity not found: {}", id))?;
            let gpx = stored.activity.to_gpx();
            match output {
                Some(path) => {
                    std::fs::write(&path, gpx)?;
                    println!("Wrote {}", path.display());
                }
                None => print!("{}", gpx),
            }
        }
    }
    Ok(())
}
