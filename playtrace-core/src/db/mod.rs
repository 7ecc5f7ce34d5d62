//! Database layer for playtrace
//!
//! This module provides the storage layer using SQLite with:
//! - Schema migrations
//! - Deduplicating snapshot appends
//! - Range reads over a player's snapshot history
//!
//! Consumers that only need the store contract depend on [`SnapshotStore`],
//! so tests can swap in fake backends.

pub mod repo;
pub mod schema;

pub use repo::{Database, PlayerOverview, DEFAULT_BUSY_TIMEOUT};

use crate::error::Result;
use crate::types::{AppendOutcome, RawSnapshot, Snapshot, TimeWindow};
use chrono::{DateTime, Utc};

/// Persistent, per-player snapshot history.
///
/// Implementations must make `append` atomic per player: the comparison
/// against the most recent snapshot and the insert happen as one step.
/// Faults surface as errors; an empty `Vec` always means "no data".
pub trait SnapshotStore: Send + Sync {
    /// Store `raw` unless its canonical form equals the player's latest snapshot.
    fn append(&self, raw: &RawSnapshot) -> Result<AppendOutcome>;

    /// Snapshots of `player_id` inside `window`, ascending by capture time.
    fn read_range(&self, player_id: &str, window: &TimeWindow) -> Result<Vec<Snapshot>>;

    /// Newest snapshot strictly before `before`.
    fn latest_before(&self, player_id: &str, before: DateTime<Utc>) -> Result<Option<Snapshot>>;

    /// Oldest snapshot strictly after `after`.
    fn earliest_after(&self, player_id: &str, after: DateTime<Utc>) -> Result<Option<Snapshot>>;

    /// Players with at least one stored snapshot.
    fn list_players(&self) -> Result<Vec<String>>;
}

impl SnapshotStore for Database {
    fn append(&self, raw: &RawSnapshot) -> Result<AppendOutcome> {
        self.append_snapshot(raw)
    }

    fn read_range(&self, player_id: &str, window: &TimeWindow) -> Result<Vec<Snapshot>> {
        self.get_snapshots_in_range(player_id, window)
    }

    fn latest_before(&self, player_id: &str, before: DateTime<Utc>) -> Result<Option<Snapshot>> {
        self.get_snapshot_before(player_id, before)
    }

    fn earliest_after(&self, player_id: &str, after: DateTime<Utc>) -> Result<Option<Snapshot>> {
        self.get_snapshot_after(player_id, after)
    }

    fn list_players(&self) -> Result<Vec<String>> {
        self.list_player_ids()
    }
}
