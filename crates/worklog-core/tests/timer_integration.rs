//! Integration tests for the session timer against both store backends.
//!
//! Covers the full start/pause/resume/stop lifecycle, recovery after a
//! restart, and saving the timer context in the database key-value table.

use chrono::{Duration, TimeZone, Utc};
use worklog_core::{
    Database, Event, ManualClock, MemoryStore, NewCategory, SessionTimer, SilentNotifier, Store,
    TimerContext, TimerState,
};

fn clock() -> ManualClock {
    ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 4, 8, 30, 0).unwrap())
}

fn dev_category(store: &impl Store) -> String {
    store
        .create_category(NewCategory::new("Dev", "#3b82f6").unwrap())
        .unwrap()
        .id
}

fn run_lifecycle(store: &impl Store) {
    let clock = clock();
    let cat = dev_category(store);
    let mut timer = SessionTimer::new(store, SilentNotifier, clock.clone());

    timer.start(&cat).unwrap();
    clock.advance(Duration::minutes(25));
    timer.pause().unwrap();
    clock.advance(Duration::milliseconds(61_999));
    timer.resume().unwrap();
    clock.advance(Duration::minutes(10));
    timer.pause().unwrap();
    clock.advance(Duration::seconds(30));
    timer.resume().unwrap();
    clock.advance(Duration::minutes(5));

    let Some(Event::TimerStopped { session, .. }) = timer.stop().unwrap() else {
        panic!("expected TimerStopped");
    };
    assert_eq!(session.pause_duration, 61 + 30);
    assert_eq!(session.total_duration, Some(40 * 60));

    let stored = store.list_sessions().unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0], session);
    assert!(store.open_session().unwrap().is_none());
}

#[test]
fn lifecycle_against_memory_store() {
    run_lifecycle(&MemoryStore::new());
}

#[test]
fn lifecycle_against_sqlite() {
    run_lifecycle(&Database::open_memory().unwrap());
}

#[test]
fn recover_after_restart_from_sqlite_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("worklog.db");
    let clock = clock();

    let session_id = {
        let db = Database::open_at(&path).unwrap();
        let cat = dev_category(&db);
        let mut timer = SessionTimer::new(&db, SilentNotifier, clock.clone());
        let Event::TimerStarted { session_id, .. } = timer.start(&cat).unwrap() else {
            panic!("expected TimerStarted");
        };
        session_id
    };

    clock.advance(Duration::minutes(45));
    let db = Database::open_at(&path).unwrap();
    let mut timer = SessionTimer::new(&db, SilentNotifier, clock.clone());
    let recovered = timer.recover().unwrap();
    assert!(matches!(
        recovered,
        Some(Event::TimerRecovered { session_id: ref id, elapsed_secs: 2700, .. }) if *id == session_id
    ));
    assert_eq!(timer.state(), TimerState::Running);

    clock.advance(Duration::minutes(15));
    let Some(Event::TimerStopped { session, .. }) = timer.stop().unwrap() else {
        panic!("expected TimerStopped");
    };
    assert_eq!(session.total_duration, Some(3600));
}

#[test]
fn saved_context_round_trips_through_kv() {
    let db = Database::open_memory().unwrap();
    let clock = clock();
    let cat = dev_category(&db);

    {
        let mut timer = SessionTimer::new(&db, SilentNotifier, clock.clone());
        timer.start(&cat).unwrap();
        clock.advance(Duration::minutes(3));
        timer.pause().unwrap();
        let json = serde_json::to_string(timer.context()).unwrap();
        db.kv_set("timer_context", &json).unwrap();
    }

    clock.advance(Duration::minutes(2));
    let json = db.kv_get("timer_context").unwrap().unwrap();
    let saved: TimerContext = serde_json::from_str(&json).unwrap();

    let mut timer = SessionTimer::new(&db, SilentNotifier, clock.clone());
    timer.restore(saved).unwrap();
    assert_eq!(timer.state(), TimerState::Paused);
    assert_eq!(timer.displayed_elapsed(), 180);

    let Some(Event::TimerStopped { session, .. }) = timer.stop().unwrap() else {
        panic!("expected TimerStopped");
    };
    assert_eq!(session.pause_duration, 120);
    assert_eq!(session.total_duration, Some(180));
}

#[test]
fn deleting_category_removes_its_open_session() {
    let db = Database::open_memory().unwrap();
    let clock = clock();
    let cat = dev_category(&db);

    let mut timer = SessionTimer::new(&db, SilentNotifier, clock);
    timer.start(&cat).unwrap();
    db.delete_category(&cat).unwrap();

    assert!(db.open_session().unwrap().is_none());
    assert!(timer.stop().is_err(), "closing a vanished session must fail");
    assert_eq!(timer.state(), TimerState::Running);
}
