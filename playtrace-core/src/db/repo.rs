//! Database repository layer
//!
//! Provides append and query operations for player snapshots.

use crate::error::{Error, Result};
use crate::normalize::{self, CanonicalForm};
use crate::types::*;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Default bound on how long any statement waits for a competing writer.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

const SNAPSHOT_COLUMNS: &str = "player_id, player_name, captured_at, source, games";

/// Per-player summary for list views.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerOverview {
    /// Player id
    pub player_id: String,
    /// Most recent non-empty display name seen for this player
    pub player_name: Option<String>,
    /// Number of stored (non-skipped) snapshots
    pub snapshot_count: i64,
    /// Capture time of the oldest stored snapshot
    pub first_captured_at: DateTime<Utc>,
    /// Capture time of the newest stored snapshot
    pub last_captured_at: DateTime<Utc>,
}

/// Database handle (single connection, serialized by a mutex)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Open or create a database, bounding lock waits by `busy_timeout`
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;

        // WAL lets readers proceed while a poller is appending
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.lock()?;
        super::schema::run_migrations(&conn)
    }

    /// Get the underlying connection (for advanced use)
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.lock()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::StorageUnavailable(format!("connection lock poisoned: {}", e)))
    }

    // ============================================
    // Snapshot writes
    // ============================================

    /// Append a snapshot unless its canonical content equals the newest stored one.
    ///
    /// Read-latest, compare and insert run inside one `BEGIN IMMEDIATE`
    /// transaction, so two writers for the same player (even in different
    /// processes) cannot both observe the same "latest" and both insert.
    /// Any failure rolls the transaction back and leaves the store unchanged.
    pub fn append_snapshot(&self, raw: &RawSnapshot) -> Result<AppendOutcome> {
        normalize::validate(raw)?;
        let games = normalize::normalize(raw.source, &raw.games)?;
        let canonical = CanonicalForm::from_readings(&games);
        let content_hash = canonical.content_hash();
        let captured_at = format_ts(raw.captured_at);
        let player_id = normalize::player_key(&raw.player_id);

        // An empty poll (private profile, upstream blip) carries no information;
        // storing it would erase every game's baseline.
        if canonical.is_empty() {
            tracing::warn!(player_id, captured_at = %captured_at, "Empty reading, nothing to store");
            return Ok(AppendOutcome::Skipped);
        }

        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let latest: Option<(String, String)> = tx
            .query_row(
                "SELECT captured_at, content_hash FROM snapshots
                 WHERE player_id = ? ORDER BY captured_at DESC LIMIT 1",
                [player_id],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?;

        match &latest {
            Some((_, latest_hash)) if *latest_hash == content_hash => {
                tracing::debug!(player_id, captured_at = %captured_at, "Snapshot unchanged, skipping");
                return Ok(AppendOutcome::Skipped);
            }
            Some((latest_at, _)) if captured_at <= *latest_at => {
                return Err(Error::InvalidInput(format!(
                    "snapshot for {} at {} is not after the latest stored snapshot at {}",
                    player_id, captured_at, latest_at
                )));
            }
            _ => {}
        }

        tx.execute(
            r#"
            INSERT INTO snapshots (player_id, player_name, captured_at, source, game_count, content_hash, games)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                player_id,
                raw.player_name.as_deref().map(str::trim).filter(|n| !n.is_empty()),
                captured_at,
                raw.source.as_str(),
                games.len() as i64,
                content_hash,
                serde_json::to_string(&games)?,
            ],
        )?;
        tx.commit()?;

        tracing::info!(
            player_id,
            captured_at = %captured_at,
            games = games.len(),
            source = %raw.source,
            "Stored snapshot"
        );
        Ok(AppendOutcome::Written)
    }

    // ============================================
    // Snapshot reads
    // ============================================

    /// Snapshots of one player inside `window` (bounds inclusive), ascending by capture time
    pub fn get_snapshots_in_range(
        &self,
        player_id: &str,
        window: &TimeWindow,
    ) -> Result<Vec<Snapshot>> {
        let conn = self.lock()?;

        let mut sql = format!("SELECT {} FROM snapshots WHERE player_id = ?", SNAPSHOT_COLUMNS);
        let mut params: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(normalize::player_key(player_id).to_string())];

        if let Some(since) = &window.since {
            sql.push_str(" AND captured_at >= ?");
            params.push(Box::new(format_ts(*since)));
        }

        if let Some(until) = &window.until {
            sql.push_str(" AND captured_at <= ?");
            params.push(Box::new(format_ts(*until)));
        }

        sql.push_str(" ORDER BY captured_at ASC");

        let mut stmt = conn.prepare(&sql)?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let snapshots = stmt
            .query_map(param_refs.as_slice(), Self::row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(snapshots)
    }

    /// Newest snapshot of a player
    pub fn get_latest_snapshot(&self, player_id: &str) -> Result<Option<Snapshot>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM snapshots WHERE player_id = ? ORDER BY captured_at DESC LIMIT 1",
                SNAPSHOT_COLUMNS
            ),
            [normalize::player_key(player_id)],
            Self::row_to_snapshot,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Newest snapshot strictly before `before`
    pub fn get_snapshot_before(
        &self,
        player_id: &str,
        before: DateTime<Utc>,
    ) -> Result<Option<Snapshot>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM snapshots WHERE player_id = ? AND captured_at < ?
                 ORDER BY captured_at DESC LIMIT 1",
                SNAPSHOT_COLUMNS
            ),
            params![normalize::player_key(player_id), format_ts(before)],
            Self::row_to_snapshot,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Oldest snapshot strictly after `after`
    pub fn get_snapshot_after(
        &self,
        player_id: &str,
        after: DateTime<Utc>,
    ) -> Result<Option<Snapshot>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {} FROM snapshots WHERE player_id = ? AND captured_at > ?
                 ORDER BY captured_at ASC LIMIT 1",
                SNAPSHOT_COLUMNS
            ),
            params![normalize::player_key(player_id), format_ts(after)],
            Self::row_to_snapshot,
        )
        .optional()
        .map_err(Error::from)
    }

    /// Ids of all players with at least one stored snapshot
    pub fn list_player_ids(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT DISTINCT player_id FROM snapshots ORDER BY player_id")?;
        let ids = stmt
            .query_map([], |r| r.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    /// Count stored snapshots for a player
    pub fn count_player_snapshots(&self, player_id: &str) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE player_id = ?",
            [normalize::player_key(player_id)],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// One summary row per player, ordered by player id
    pub fn list_player_overviews(&self) -> Result<Vec<PlayerOverview>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT s.player_id,
                   (SELECT n.player_name FROM snapshots n
                     WHERE n.player_id = s.player_id AND n.player_name IS NOT NULL
                     ORDER BY n.captured_at DESC LIMIT 1) AS player_name,
                   COUNT(*) AS snapshot_count,
                   MIN(s.captured_at) AS first_captured_at,
                   MAX(s.captured_at) AS last_captured_at
            FROM snapshots s
            GROUP BY s.player_id
            ORDER BY s.player_id
            "#,
        )?;

        let overviews = stmt
            .query_map([], |row| {
                let first: String = row.get(3)?;
                let last: String = row.get(4)?;
                Ok(PlayerOverview {
                    player_id: row.get(0)?,
                    player_name: row.get(1)?,
                    snapshot_count: row.get(2)?,
                    first_captured_at: parse_ts(3, &first)?,
                    last_captured_at: parse_ts(4, &last)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(overviews)
    }

    fn row_to_snapshot(row: &Row) -> rusqlite::Result<Snapshot> {
        let captured_at_str: String = row.get(2)?;
        let source_str: String = row.get(3)?;
        let games_str: String = row.get(4)?;

        let source = source_str
            .parse::<SnapshotSource>()
            .map_err(|e| conversion_error(3, e))?;
        let mut games: Vec<GameReading> =
            serde_json::from_str(&games_str).map_err(|e| conversion_error(4, e))?;
        // Written sorted; re-sort so hand-edited rows still satisfy the invariant
        games.sort_by_key(|g| g.game_id);

        Ok(Snapshot {
            player_id: row.get(0)?,
            player_name: row.get(1)?,
            captured_at: parse_ts(2, &captured_at_str)?,
            source,
            games,
        })
    }
}

/// Fixed-width UTC timestamp; lexical order matches chronological order.
fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(idx: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}
