//! Core domain types for playtrace
//!
//! Playtrace never sees whether a player is online. It only sees periodic
//! readings of *cumulative* playtime per game, and infers bounded windows of
//! play from the differences between consecutive readings.
//!
//! ## Terminology
//!
//! | Term | Definition |
//! |------|------------|
//! | **Player** | Identified solely by a stable id string (a 64-bit Steam id) |
//! | **Snapshot** | One poll's per-game cumulative playtime reading, with a capture time |
//! | **Session** | An inferred interval in which some positive amount of play happened |
//! | **Anomaly** | A reading that contradicts monotonic playtime or capture ordering |
//!
//! Snapshots are persisted; sessions and anomalies are derived on demand and
//! never stored.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================
// Sources
// ============================================

/// Where a raw reading came from.
///
/// Each source reports playtime in its own unit; normalization converts
/// everything to whole minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotSource {
    /// Steam Web API `GetOwnedGames` (minutes, full library)
    SteamApi,
    /// Public profile page scrape (decimal hours, recent games only)
    ProfileScraper,
}

impl SnapshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSource::SteamApi => "steam_api",
            SnapshotSource::ProfileScraper => "profile_scraper",
        }
    }
}

impl std::str::FromStr for SnapshotSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steam_api" | "steam-api" => Ok(SnapshotSource::SteamApi),
            "profile_scraper" | "profile-scraper" => Ok(SnapshotSource::ProfileScraper),
            _ => Err(format!("unknown snapshot source: {}", s)),
        }
    }
}

impl std::fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Raw input
// ============================================

/// One game entry exactly as an upstream source reported it.
///
/// `playtime` is in the source's unit (see [`SnapshotSource`]). Anything the
/// source sends beyond id, name and playtime lands in `extra` and is kept for
/// display only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawGame {
    #[serde(default, alias = "appid")]
    pub game_id: Option<i64>,
    #[serde(default, alias = "name", alias = "game_name")]
    pub display_name: Option<String>,
    #[serde(
        default,
        alias = "playtime_forever",
        alias = "playtime_total",
        alias = "cumulative_minutes"
    )]
    pub playtime: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl RawGame {
    /// Convenience constructor for a reading without extra fields.
    pub fn new(game_id: i64, display_name: impl Into<String>, playtime: f64) -> Self {
        Self {
            game_id: Some(game_id),
            display_name: Some(display_name.into()),
            playtime: Some(playtime),
            extra: serde_json::Map::new(),
        }
    }
}

/// A complete raw poll result for one player, as handed over by a poller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSnapshot {
    pub player_id: String,
    /// Advisory display name of the player at capture time
    #[serde(default)]
    pub player_name: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub source: SnapshotSource,
    pub games: Vec<RawGame>,
}

// ============================================
// Snapshots
// ============================================

/// A normalized per-game reading as it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameReading {
    pub game_id: i64,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Total lifetime playtime in minutes at capture time
    pub cumulative_minutes: u64,
    /// Source fields irrelevant to change detection (achievements, last played, ...)
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub details: serde_json::Map<String, serde_json::Value>,
}

impl GameReading {
    /// Display name, falling back to `appid <id>` when the source gave none.
    pub fn label(&self) -> String {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name.to_string(),
            _ => format!("appid {}", self.game_id),
        }
    }
}

/// A stored snapshot. `games` is always sorted ascending by `game_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub player_id: String,
    pub player_name: Option<String>,
    pub captured_at: DateTime<Utc>,
    pub source: SnapshotSource,
    pub games: Vec<GameReading>,
}

impl Snapshot {
    /// Id-keyed view of the cumulative minutes in this snapshot.
    pub fn minutes_by_game(&self) -> HashMap<i64, &GameReading> {
        self.games.iter().map(|g| (g.game_id, g)).collect()
    }
}

/// Result of [`crate::db::SnapshotStore::append`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppendOutcome {
    /// A new row was persisted
    Written,
    /// Canonical content equals the most recent stored snapshot; nothing written
    Skipped,
}

impl AppendOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppendOutcome::Written => "written",
            AppendOutcome::Skipped => "skipped",
        }
    }
}

// ============================================
// Derived: sessions and anomalies
// ============================================

/// An inferred play window for one game.
///
/// The player played `minutes` of this game at some point in
/// `(window_start, window_end]`; the exact start and end are not derivable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub player_id: String,
    pub game_id: i64,
    pub display_name: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Always > 0
    pub minutes: u64,
}

impl Session {
    /// Length of the bounding window in minutes.
    pub fn window_minutes(&self) -> i64 {
        self.window_end
            .signed_duration_since(self.window_start)
            .num_minutes()
    }
}

/// What kind of inconsistency was observed between two consecutive snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Cumulative minutes went down (playtime reset or bad upstream data)
    PlaytimeDecreased {
        game_id: i64,
        previous_minutes: u64,
        current_minutes: u64,
    },
    /// The later snapshot is not strictly after the earlier one
    OutOfOrder,
    /// The pair mixes snapshots of two different players
    PlayerMismatch { other_player_id: String },
}

/// A non-fatal diagnostic reported alongside inferred sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anomaly {
    pub player_id: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

impl std::fmt::Display for Anomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            AnomalyKind::PlaytimeDecreased {
                game_id,
                previous_minutes,
                current_minutes,
            } => write!(
                f,
                "{}: playtime of game {} dropped from {} to {} minutes between {} and {}",
                self.player_id,
                game_id,
                previous_minutes,
                current_minutes,
                self.window_start.to_rfc3339(),
                self.window_end.to_rfc3339()
            ),
            AnomalyKind::OutOfOrder => write!(
                f,
                "{}: snapshot at {} does not follow snapshot at {}",
                self.player_id,
                self.window_end.to_rfc3339(),
                self.window_start.to_rfc3339()
            ),
            AnomalyKind::PlayerMismatch { other_player_id } => write!(
                f,
                "{}: sequence contains a snapshot of {} at {}",
                self.player_id,
                other_player_id,
                self.window_end.to_rfc3339()
            ),
        }
    }
}

// ============================================
// Query window
// ============================================

/// Inclusive time window; `None` means unbounded on that side.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeWindow {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl TimeWindow {
    /// The whole history.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn between(since: DateTime<Utc>, until: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            until: Some(until),
        }
    }

    /// True if the instant lies inside the window (bounds inclusive).
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        self.since.map_or(true, |s| ts >= s) && self.until.map_or(true, |u| ts <= u)
    }

    /// True if the interval `(start, end]` shares any time with the window.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.since.map_or(true, |s| end > s) && self.until.map_or(true, |u| start < u)
    }
}
