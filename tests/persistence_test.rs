//! Restart-safety tests for the persistent generator mode.
//!
//! Tests:
//! - Save then reload reproduces the last timestamp
//! - A restarted generator never reuses the saved millisecond
//! - Load and save failures surface as typed errors

mod common;

use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use common::{at, TestFixture};
use flakegen::{FileStore, Generator, GeneratorError, ManualClock, StorageError, TimestampStore};

#[test]
fn test_first_run_without_state_file() {
    let fixture = TestFixture::new();
    let clock = ManualClock::new(at(5_000));

    let generator = Generator::builder(1)
        .clock(clock.clone())
        .state_file(&fixture.state_path)
        .build()
        .unwrap();

    assert!(generator.is_persistent());
    assert_eq!(generator.last_timestamp(), at(5_000));
    // Construction alone writes nothing
    assert!(fixture.saved_timestamp().is_none());

    clock.advance(1);
    generator.next_id().unwrap();
    generator.save_last_time().unwrap();
    assert_eq!(fixture.saved_timestamp(), Some(at(5_001)));
}

#[test]
fn test_save_and_reload_round_trip() {
    let fixture = TestFixture::new();
    let clock = ManualClock::new(at(10_000));

    let first = Generator::builder(8)
        .clock(clock.clone())
        .state_file(&fixture.state_path)
        .build()
        .unwrap();
    clock.advance(25);
    first.next_batch(10).unwrap();
    first.save_last_time().unwrap();
    drop(first);

    let second = Generator::builder(8)
        .clock(clock.clone())
        .state_file(&fixture.state_path)
        .build()
        .unwrap();
    assert!(second.last_timestamp() >= at(10_025));
}

#[test]
fn test_restart_behind_saved_time_waits() {
    let fixture = TestFixture::new();
    fs::write(&fixture.state_path, at(2_000).to_string()).unwrap();

    // The host clock was set back between runs
    let clock = ManualClock::new(at(1_500));
    let generator = Arc::new(
        Generator::builder(4)
            .clock(clock.clone())
            .state_file(&fixture.state_path)
            .build()
            .unwrap(),
    );

    let worker = Arc::clone(&generator);
    let handle = thread::spawn(move || worker.next_id());

    thread::sleep(Duration::from_millis(50));
    assert!(!handle.is_finished());

    clock.set(at(2_001));
    let decoded = generator.decode(handle.join().unwrap().unwrap());
    assert_eq!(decoded.timestamp_millis, at(2_001));
    assert_eq!(decoded.sequence, 0);
}

#[test]
fn test_restart_in_saved_millisecond_does_not_reuse_it() {
    let fixture = TestFixture::new();
    fs::write(&fixture.state_path, at(3_000).to_string()).unwrap();

    let clock = ManualClock::new(at(3_000));
    let generator = Generator::builder(4)
        .clock(clock.clone())
        .state_file(&fixture.state_path)
        .max_stall(Duration::from_millis(20))
        .build()
        .unwrap();

    // Same millisecond as the previous run: ids there may already exist
    assert!(matches!(
        generator.next_id(),
        Err(GeneratorError::ClockRegression { last, .. }) if last == at(3_000)
    ));

    clock.advance(1);
    let decoded = generator.decode(generator.next_id().unwrap());
    assert!(decoded.timestamp_millis > at(3_000));
}

#[test]
fn test_restart_after_saved_time_issues_immediately() {
    let fixture = TestFixture::new();
    fs::write(&fixture.state_path, at(100).to_string()).unwrap();

    let clock = ManualClock::new(at(9_000));
    let generator = Generator::builder(4)
        .clock(clock)
        .state_file(&fixture.state_path)
        .build()
        .unwrap();

    let decoded = generator.decode(generator.next_id().unwrap());
    assert_eq!(decoded.timestamp_delta, 9_000);
    assert_eq!(decoded.sequence, 0);
}

#[test]
fn test_state_file_is_unix_millis_not_epoch_delta() {
    let fixture = TestFixture::new();
    let clock = ManualClock::new(at(42));
    let generator = Generator::builder(1)
        .clock(clock.clone())
        .state_file(&fixture.state_path)
        .build()
        .unwrap();

    clock.advance(1);
    generator.next_id().unwrap();
    generator.save_last_time().unwrap();

    let contents = fs::read_to_string(&fixture.state_path).unwrap();
    assert_eq!(contents, "1672531200043");
}

#[test]
fn test_corrupt_state_file_refuses_to_start() {
    let fixture = TestFixture::new();
    fs::write(&fixture.state_path, "12abc").unwrap();

    let err = Generator::with_storage(1, &fixture.state_path).unwrap_err();
    match err {
        GeneratorError::PersistenceLoad(StorageError::Parse { contents, .. }) => {
            assert_eq!(contents, "12abc");
        }
        other => panic!("expected PersistenceLoad, got {other:?}"),
    }
}

#[test]
fn test_out_of_range_node_checked_before_state_file() {
    let fixture = TestFixture::new();
    fs::write(&fixture.state_path, "garbage").unwrap();

    let err = Generator::with_storage(2048, &fixture.state_path).unwrap_err();
    assert!(matches!(err, GeneratorError::NodeOutOfRange { node_id: 2048, .. }));
}

#[test]
fn test_save_failure_is_reported_to_explicit_caller() {
    let fixture = TestFixture::new();
    let generator = Generator::builder(1)
        .clock(ManualClock::new(at(1)))
        .state_file(fixture.temp_dir.path().join("missing-dir").join("last_time"))
        .build()
        .unwrap();

    assert!(matches!(
        generator.save_last_time(),
        Err(GeneratorError::PersistenceSave(StorageError::Io { .. }))
    ));
    // Shutdown paths swallow the same failure
    assert!(!generator.flush_best_effort());
}

#[test]
fn test_with_storage_uses_file_store() {
    let fixture = TestFixture::new();
    let generator = Generator::with_storage(3, &fixture.state_path).unwrap();
    let id = generator.next_id().unwrap();
    generator.save_last_time().unwrap();

    let saved = FileStore::new(&fixture.state_path).load().unwrap().unwrap();
    assert_eq!(saved, generator.decode(id).timestamp_millis);
}
