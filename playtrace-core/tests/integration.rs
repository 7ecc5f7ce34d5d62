//! Integration tests for the snapshot store and session inference
//!
//! These tests run against a real SQLite file in a temp directory to verify
//! the end-to-end append, dedup, and inference flow, including writers on
//! separate connections.

use chrono::{DateTime, Duration, TimeZone, Utc};
use playtrace_core::db::Database;
use playtrace_core::{
    infer_sessions, AnomalyKind, AppendOutcome, RawGame, RawSnapshot, SessionQuery, SnapshotSource,
    SnapshotStore, TimeWindow,
};
use std::path::Path;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

const A: i64 = 620;
const B: i64 = 440;

fn t(n: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 23, 8, 0, 0).unwrap() + Duration::hours(n)
}

fn raw(player: &str, at: DateTime<Utc>, games: &[(i64, f64)]) -> RawSnapshot {
    RawSnapshot {
        player_id: player.to_string(),
        player_name: Some("Gordon".to_string()),
        captured_at: at,
        source: SnapshotSource::SteamApi,
        games: games
            .iter()
            .map(|(id, minutes)| RawGame::new(*id, format!("Game {}", id), *minutes))
            .collect(),
    }
}

fn open_db(path: &Path) -> Database {
    let db = Database::open(path).expect("open database");
    db.migrate().expect("migrate");
    db
}

fn stored(db: &Database, player: &str) -> Vec<playtrace_core::Snapshot> {
    db.read_range(player, &TimeWindow::all()).expect("read range")
}

// ============================================
// Example scenarios
// ============================================

#[test]
fn test_unchanged_snapshot_skipped() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir.path().join("data.db"));

    assert_eq!(db.append(&raw("p1", t(1), &[(A, 100.0)])).unwrap(), AppendOutcome::Written);
    assert_eq!(db.append(&raw("p1", t(2), &[(A, 100.0)])).unwrap(), AppendOutcome::Skipped);

    let snapshots = stored(&db, "p1");
    assert_eq!(snapshots.len(), 1);
    assert!(infer_sessions(&snapshots).sessions.is_empty());
}

#[test]
fn test_increase_becomes_session() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir.path().join("data.db"));

    db.append(&raw("p1", t(1), &[(A, 100.0)])).unwrap();
    db.append(&raw("p1", t(2), &[(A, 160.0)])).unwrap();

    let report = infer_sessions(&stored(&db, "p1"));
    assert_eq!(report.sessions.len(), 1);
    let session = &report.sessions[0];
    assert_eq!(
        (session.game_id, session.window_start, session.window_end, session.minutes),
        (A, t(1), t(2), 60)
    );
}

#[test]
fn test_new_game_emits_nothing() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir.path().join("data.db"));

    db.append(&raw("p1", t(1), &[(A, 100.0)])).unwrap();
    assert_eq!(
        db.append(&raw("p1", t(2), &[(A, 100.0), (B, 20.0)])).unwrap(),
        AppendOutcome::Written
    );

    assert!(infer_sessions(&stored(&db, "p1")).sessions.is_empty());
}

#[test]
fn test_only_changed_game_emits() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir.path().join("data.db"));

    db.append(&raw("p1", t(1), &[(A, 100.0), (B, 20.0)])).unwrap();
    db.append(&raw("p1", t(2), &[(A, 160.0), (B, 20.0)])).unwrap();

    let report = infer_sessions(&stored(&db, "p1"));
    let games: Vec<(i64, u64)> = report.sessions.iter().map(|s| (s.game_id, s.minutes)).collect();
    assert_eq!(games, vec![(A, 60)]);
}

#[test]
fn test_rollback_is_anomaly() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir.path().join("data.db"));

    db.append(&raw("p1", t(1), &[(A, 160.0)])).unwrap();
    db.append(&raw("p1", t(2), &[(A, 100.0)])).unwrap();

    let report = infer_sessions(&stored(&db, "p1"));
    assert!(report.sessions.is_empty());
    assert_eq!(report.anomalies.len(), 1);
    assert!(matches!(
        report.anomalies[0].kind,
        AnomalyKind::PlaytimeDecreased { game_id: A, .. }
    ));
}

#[test]
fn test_three_snapshots_in_order() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir.path().join("data.db"));

    for (n, minutes) in [(1, 0.0), (2, 30.0), (3, 90.0)] {
        db.append(&raw("p1", t(n), &[(A, minutes)])).unwrap();
    }

    let report = SessionQuery::new(&db)
        .sessions_for("p1", &TimeWindow::all())
        .unwrap();
    let sessions: Vec<(DateTime<Utc>, DateTime<Utc>, u64)> = report
        .sessions
        .iter()
        .map(|s| (s.window_start, s.window_end, s.minutes))
        .collect();
    assert_eq!(sessions, vec![(t(1), t(2), 30), (t(2), t(3), 60)]);
}

// ============================================
// Persistence
// ============================================

#[test]
fn test_history_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.db");

    {
        let db = open_db(&path);
        db.append(&raw("p1", t(1), &[(A, 10.0)])).unwrap();
        db.append(&raw("p1", t(2), &[(A, 25.0)])).unwrap();
    }

    let db = open_db(&path);
    assert_eq!(db.list_players().unwrap(), vec!["p1".to_string()]);
    // Dedup compares against what is already on disk
    assert_eq!(db.append(&raw("p1", t(3), &[(A, 25.0)])).unwrap(), AppendOutcome::Skipped);
    assert_eq!(stored(&db, "p1").len(), 2);
}

#[test]
fn test_profile_scraper_hours_compare_in_minutes() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir.path().join("data.db"));

    let mut first = raw("p1", t(1), &[(A, 1.5)]);
    first.source = SnapshotSource::ProfileScraper;
    let mut second = raw("p1", t(2), &[(A, 2.0)]);
    second.source = SnapshotSource::ProfileScraper;

    db.append(&first).unwrap();
    db.append(&second).unwrap();

    let report = infer_sessions(&stored(&db, "p1"));
    assert_eq!(report.sessions[0].minutes, 30);
}

#[test]
fn test_empty_poll_keeps_baseline() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir.path().join("data.db"));

    db.append(&raw("p1", t(1), &[(A, 100.0)])).unwrap();
    // Private profile or upstream blip: the poll returns no games at all
    assert_eq!(db.append(&raw("p1", t(2), &[])).unwrap(), AppendOutcome::Skipped);
    db.append(&raw("p1", t(3), &[(A, 160.0)])).unwrap();

    assert_eq!(stored(&db, "p1").len(), 2);
    let report = SessionQuery::new(&db)
        .sessions_for("p1", &TimeWindow::all())
        .unwrap();
    let sessions: Vec<(i64, DateTime<Utc>, DateTime<Utc>, u64)> = report
        .sessions
        .iter()
        .map(|s| (s.game_id, s.window_start, s.window_end, s.minutes))
        .collect();
    assert_eq!(sessions, vec![(A, t(1), t(3), 60)]);
}

#[test]
fn test_padded_player_id_queries_same_player() {
    let dir = TempDir::new().unwrap();
    let db = open_db(&dir.path().join("data.db"));

    db.append(&raw(" p1", t(1), &[(A, 10.0)])).unwrap();
    db.append(&raw(" p1", t(2), &[(A, 40.0)])).unwrap();

    let query = SessionQuery::new(&db);
    let report = query.sessions_for(" p1", &TimeWindow::all()).unwrap();
    assert_eq!(report.sessions.len(), 1);
    assert_eq!(report.sessions[0].player_id, "p1");
    assert_eq!(query.summarize(" p1 ", &TimeWindow::all()).unwrap().player_id, "p1");
}

// ============================================
// Concurrent writers
// ============================================

#[test]
fn test_concurrent_identical_appends_store_once() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.db");

    let db = open_db(&path);
    db.append(&raw("p1", t(0), &[(A, 10.0)])).unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = [t(1), t(2)]
        .into_iter()
        .map(|at| {
            let path = path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                barrier.wait();
                db.append(&raw("p1", at, &[(A, 40.0)])).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<AppendOutcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let written = outcomes.iter().filter(|o| **o == AppendOutcome::Written).count();
    assert_eq!(written, 1, "outcomes: {:?}", outcomes);
    assert_eq!(stored(&db, "p1").len(), 2);
}

#[test]
fn test_concurrent_players_do_not_interfere() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data.db");
    let db = open_db(&path);

    let handles: Vec<_> = ["p1", "p2", "p3"]
        .into_iter()
        .map(|player| {
            let path = path.clone();
            thread::spawn(move || {
                let db = Database::open(&path).unwrap();
                for n in 0..10 {
                    let outcome = db
                        .append(&raw(player, t(n), &[(A, (n * 15) as f64)]))
                        .unwrap();
                    assert_eq!(outcome, AppendOutcome::Written);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for player in ["p1", "p2", "p3"] {
        let snapshots = stored(&db, player);
        assert_eq!(snapshots.len(), 10);
        assert!(snapshots.windows(2).all(|w| w[0].captured_at < w[1].captured_at));

        let report = infer_sessions(&snapshots);
        assert_eq!(report.sessions.len(), 9);
        assert!(report.sessions.iter().all(|s| s.player_id == player && s.minutes == 15));
    }
}
