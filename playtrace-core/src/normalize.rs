//! Snapshot normalization
//!
//! Turns a raw, unordered per-game reading into:
//! - the persisted form ([`GameReading`]s sorted by game id, extras kept), and
//! - the canonical form ([`CanonicalForm`]) used for change detection.
//!
//! Only `(game_id, cumulative_minutes)` pairs take part in change detection.
//! Display names, achievement counts and "last played" labels can change
//! without producing a new snapshot.

use crate::error::{Error, Result};
use crate::types::{GameReading, RawGame, RawSnapshot, SnapshotSource};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Comparable projection of a snapshot: `(game_id, cumulative_minutes)` sorted by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CanonicalForm(Vec<(i64, u64)>);

impl CanonicalForm {
    /// Project already-normalized readings.
    pub fn from_readings(readings: &[GameReading]) -> Self {
        let mut entries: Vec<(i64, u64)> = readings
            .iter()
            .map(|g| (g.game_id, g.cumulative_minutes))
            .collect();
        entries.sort_unstable_by_key(|(id, _)| *id);
        Self(entries)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 (hex) over the canonical entries.
    ///
    /// Stored next to each snapshot so dedup compares one column instead of
    /// re-reading the payload.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        for (game_id, minutes) in &self.0 {
            hasher.update(format!("{}:{}\n", game_id, minutes).as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}

/// Key a player id is stored and looked up under.
pub fn player_key(player_id: &str) -> &str {
    player_id.trim()
}

/// Reject raw snapshots that cannot be normalized at all.
pub fn validate(raw: &RawSnapshot) -> Result<()> {
    if raw.player_id.trim().is_empty() {
        return Err(Error::InvalidInput("snapshot is missing a player id".to_string()));
    }
    Ok(())
}

/// Normalize raw readings from `source` into sorted, deduplicated [`GameReading`]s.
///
/// - entries without a game id are dropped
/// - duplicate ids keep the last occurrence
/// - missing playtime counts as 0
/// - negative or non-finite playtime is rejected
pub fn normalize(source: SnapshotSource, raw_games: &[RawGame]) -> Result<Vec<GameReading>> {
    let mut by_id: BTreeMap<i64, GameReading> = BTreeMap::new();

    for raw in raw_games {
        let Some(game_id) = raw.game_id else {
            tracing::debug!(name = ?raw.display_name, "Dropping game entry without id");
            continue;
        };

        let playtime = raw.playtime.unwrap_or(0.0);
        let cumulative_minutes = match source {
            SnapshotSource::SteamApi => api_minutes(game_id, playtime)?,
            SnapshotSource::ProfileScraper => scraped_hours_to_minutes(game_id, playtime)?,
        };

        by_id.insert(
            game_id,
            GameReading {
                game_id,
                display_name: raw
                    .display_name
                    .as_ref()
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                cumulative_minutes,
                details: raw.extra.clone(),
            },
        );
    }

    Ok(by_id.into_values().collect())
}

/// Canonical form of a raw reading; the only thing compared for dedup.
pub fn canonicalize(source: SnapshotSource, raw_games: &[RawGame]) -> Result<CanonicalForm> {
    Ok(CanonicalForm::from_readings(&normalize(source, raw_games)?))
}

fn check_playtime(game_id: i64, value: f64) -> Result<f64> {
    if !value.is_finite() || value < 0.0 {
        return Err(Error::InvalidInput(format!(
            "game {} has invalid playtime {}",
            game_id, value
        )));
    }
    Ok(value)
}

/// The Web API already reports whole minutes.
fn api_minutes(game_id: i64, playtime: f64) -> Result<u64> {
    Ok(check_playtime(game_id, playtime)?.round() as u64)
}

/// Profile pages show hours with one decimal ("722.5 hrs on record").
fn scraped_hours_to_minutes(game_id: i64, hours: f64) -> Result<u64> {
    Ok((check_playtime(game_id, hours)? * 60.0).round() as u64)
}
