use std::sync::Arc;

use approx::assert_relative_eq;
use ride_tracker::storage::ActivityUpdate;
use ride_tracker::{
    fix_channel, haversine_km, ActivityStore, FixEvent, JsonFileStore, LocationError,
    PositionFix, Recorder, ReplayClock, SessionState, TrackerConfig, TrackerError,
};

fn temp_dir(tag: &str) -> std::path::PathBuf {
    let dir = std::env::temp_dir().join(format!("ride_tracker_it_{}_{}", std::process::id(), tag));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn config(data_dir: std::path::PathBuf) -> TrackerConfig {
    TrackerConfig {
        data_dir,
        tick_interval_ms: 20,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_ride_recorded_and_saved_to_disk() {
    let dir = temp_dir("ride");
    let config = config(dir.clone());
    let clock = ReplayClock::new(0);
    let mut recorder = Recorder::with_clock(config.clone(), Arc::new(clock.clone()));
    let (tx, rx) = fix_channel(config.fix_channel_capacity);
    recorder.start(rx).unwrap();

    let fixes = [
        PositionFix::new(0.0, 0.0, 5.0, 0).with_speed(5.0),
        PositionFix::new(0.0, 0.0001, 5.0, 10_000).with_speed(6.0),
        // poor accuracy
        PositionFix::new(0.0, 0.00005, 80.0, 15_000).with_speed(20.0),
        PositionFix::new(0.0, 0.00015, 5.0, 20_000).with_speed(4.0),
        // under the movement threshold
        PositionFix::new(0.0, 0.000151, 5.0, 25_000).with_speed(30.0),
    ];
    for fix in fixes {
        clock.advance_to(fix.timestamp);
        tx.send(FixEvent::Fix(fix)).await.unwrap();
    }
    tx.send(FixEvent::Error(LocationError::PositionUnavailable))
        .await
        .unwrap();
    drop(tx);
    recorder.wait_for_fix_stream_end().await.unwrap();

    clock.advance_to(60_000);
    let snapshot = recorder.stop().unwrap();

    let expected = haversine_km(0.0, 0.0, 0.0, 0.0001) + haversine_km(0.0, 0.0001, 0.0, 0.00015);
    assert_eq!(snapshot.state, SessionState::Stopped);
    assert_eq!(snapshot.point_count, 3);
    assert_relative_eq!(snapshot.distance_km, expected, epsilon = 1e-12);
    assert_eq!(snapshot.elapsed_secs, 60);
    assert_relative_eq!(snapshot.max_speed_kmh, 21.6, epsilon = 1e-9);
    assert_relative_eq!(snapshot.current_speed_kmh, 14.4, epsilon = 1e-9);
    assert_relative_eq!(snapshot.average_speed_kmh, expected / (60.0 / 3600.0), epsilon = 1e-9);
    assert_eq!(snapshot.poor_accuracy_rejections, 1);
    assert_eq!(snapshot.movement_rejections, 1);
    assert_eq!(snapshot.location_errors, 1);

    let mut store = JsonFileStore::open(config.activities_file()).unwrap();
    let stored = recorder
        .save(&mut store, Some("Lunch loop"), "windy")
        .unwrap();
    assert_eq!(recorder.state().unwrap(), SessionState::Idle);

    // Reopen from disk
    let reopened = JsonFileStore::open(config.activities_file()).unwrap();
    let loaded = reopened.get(&stored.id).unwrap().unwrap();
    assert_eq!(loaded.activity.name, "Lunch loop");
    assert_eq!(loaded.activity.notes, "windy");
    assert_eq!(loaded.activity.duration, 60);
    assert_eq!(loaded.activity.route.len(), 3);
    assert_relative_eq!(loaded.activity.distance, expected, epsilon = 1e-12);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_short_ride_cannot_be_saved() {
    let dir = temp_dir("short");
    let config = config(dir.clone());
    let clock = ReplayClock::new(0);
    let mut recorder = Recorder::with_clock(config.clone(), Arc::new(clock.clone()));
    let (tx, rx) = fix_channel(4);
    recorder.start(rx).unwrap();
    tx.send(FixEvent::Fix(PositionFix::new(1.0, 1.0, 5.0, 0)))
        .await
        .unwrap();
    drop(tx);
    recorder.wait_for_fix_stream_end().await.unwrap();
    recorder.stop().unwrap();

    let mut store = JsonFileStore::open(config.activities_file()).unwrap();
    let result = recorder.save(&mut store, None, "");
    assert!(matches!(
        result,
        Err(TrackerError::InsufficientRoutePoints { points: 1 })
    ));
    assert!(store.list().unwrap().is_empty());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn test_store_update_and_delete() {
    let dir = temp_dir("store");
    let mut store = JsonFileStore::open(dir.join("activities.json")).unwrap();

    let mut session = ride_tracker::TrackSession::new();
    let start = chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap();
    session.start(start).unwrap();
    session.push_fix(&PositionFix::new(10.0, 10.0, 3.0, 0));
    session.push_fix(&PositionFix::new(10.0, 10.01, 3.0, 0));
    session
        .stop(start + chrono::Duration::seconds(300))
        .unwrap();
    let activity = session.finalize(None, "").unwrap();

    let stored = store.save(activity).unwrap();
    let updated = store
        .update(
            &stored.id,
            ActivityUpdate {
                name: Some("Renamed".to_string()),
                notes: None,
            },
        )
        .unwrap();
    assert_eq!(updated.activity.name, "Renamed");
    assert!(updated.updated_at.is_some());

    store.delete(&stored.id).unwrap();
    assert!(store.get(&stored.id).unwrap().is_none());
    assert!(matches!(
        store.delete(&stored.id),
        Err(TrackerError::StorageError(_))
    ));

    let _ = std::fs::remove_dir_all(&dir);
}
