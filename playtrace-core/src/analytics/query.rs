//! Per-player session lists and per-game totals for presentation.
//!
//! Totals are an approximation: a session whose window straddles the query
//! boundary counts with its full minutes. Snapshots only say how much was
//! played between two captures, not when, so there is no honest way to
//! apportion part of a session to one side of the boundary.

use crate::db::SnapshotStore;
use crate::error::Result;
use crate::inference::{infer_sessions, InferenceReport};
use crate::normalize::player_key;
use crate::types::{Anomaly, Session, TimeWindow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Playtime of one game inside a query window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameTotal {
    pub game_id: i64,
    pub display_name: String,
    /// Sum of the minutes of every overlapping session
    pub minutes: u64,
    pub session_count: usize,
    /// Earliest `window_start` among the counted sessions
    pub first_window_start: DateTime<Utc>,
    /// Latest `window_end` among the counted sessions
    pub last_window_end: DateTime<Utc>,
}

/// Headline numbers for a player.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    pub player_id: String,
    pub total_minutes: u64,
    pub session_count: usize,
    pub distinct_games: usize,
    /// Game with the most minutes in the window (lowest id wins ties)
    pub top_game: Option<GameTotal>,
    pub anomaly_count: usize,
}

/// Read-side service over any [`SnapshotStore`].
pub struct SessionQuery<'a> {
    store: &'a dyn SnapshotStore,
}

impl<'a> SessionQuery<'a> {
    pub fn new(store: &'a dyn SnapshotStore) -> Self {
        Self { store }
    }

    /// Sessions of `player_id` whose interval overlaps `window`, with anomalies seen.
    ///
    /// The snapshot right before and right after the window are read too, so
    /// sessions straddling either edge are included.
    pub fn sessions_for(&self, player_id: &str, window: &TimeWindow) -> Result<InferenceReport> {
        let player_id = player_key(player_id);
        let mut snapshots = Vec::new();

        if let Some(since) = window.since {
            snapshots.extend(self.store.latest_before(player_id, since)?);
        }
        snapshots.extend(self.store.read_range(player_id, window)?);
        if let Some(until) = window.until {
            snapshots.extend(self.store.earliest_after(player_id, until)?);
        }

        let mut report = infer_sessions(&snapshots);
        // Bracketing snapshots are only there to close pairs at the edges;
        // pairs entirely outside the window report nothing.
        report
            .sessions
            .retain(|s| window.overlaps(s.window_start, s.window_end));
        report
            .anomalies
            .retain(|a| window.overlaps(a.window_start, a.window_end));

        tracing::debug!(
            player_id,
            snapshots = snapshots.len(),
            sessions = report.sessions.len(),
            anomalies = report.anomalies.len(),
            "Inferred sessions"
        );

        Ok(report)
    }

    /// Total minutes per game for sessions overlapping `window`.
    pub fn totals_for(&self, player_id: &str, window: &TimeWindow) -> Result<BTreeMap<i64, GameTotal>> {
        let report = self.sessions_for(player_id, window)?;
        Ok(totals_from_sessions(&report.sessions))
    }

    /// Headline numbers for `player_id` in `window`.
    pub fn summarize(&self, player_id: &str, window: &TimeWindow) -> Result<PlayerSummary> {
        let report = self.sessions_for(player_id, window)?;
        let totals = totals_from_sessions(&report.sessions);

        Ok(PlayerSummary {
            player_id: player_key(player_id).to_string(),
            total_minutes: totals.values().map(|t| t.minutes).sum(),
            session_count: report.sessions.len(),
            distinct_games: totals.len(),
            top_game: ranked_totals(&totals).into_iter().next(),
            anomaly_count: report.anomalies.len(),
        })
    }

    /// Sessions of every stored player (or only `players`, when given).
    ///
    /// Returned sorted by player, then game, then window start.
    pub fn sessions_for_players(
        &self,
        players: Option<&[String]>,
        window: &TimeWindow,
    ) -> Result<(Vec<Session>, Vec<Anomaly>)> {
        let player_ids = match players {
            Some(ids) => ids.to_vec(),
            None => self.store.list_players()?,
        };

        let mut sessions = Vec::new();
        let mut anomalies = Vec::new();
        for player_id in &player_ids {
            let report = self.sessions_for(player_id, window)?;
            sessions.extend(report.sessions);
            anomalies.extend(report.anomalies);
        }

        sessions.sort_by(|a, b| {
            (&a.player_id, a.game_id, a.window_start).cmp(&(&b.player_id, b.game_id, b.window_start))
        });
        Ok((sessions, anomalies))
    }
}

/// Fold sessions into per-game totals.
pub fn totals_from_sessions(sessions: &[Session]) -> BTreeMap<i64, GameTotal> {
    let mut totals: BTreeMap<i64, GameTotal> = BTreeMap::new();

    for session in sessions {
        totals
            .entry(session.game_id)
            .and_modify(|total| {
                total.minutes += session.minutes;
                total.session_count += 1;
                total.first_window_start = total.first_window_start.min(session.window_start);
                if session.window_end >= total.last_window_end {
                    total.last_window_end = session.window_end;
                    total.display_name = session.display_name.clone();
                }
            })
            .or_insert_with(|| GameTotal {
                game_id: session.game_id,
                display_name: session.display_name.clone(),
                minutes: session.minutes,
                session_count: 1,
                first_window_start: session.window_start,
                last_window_end: session.window_end,
            });
    }

    totals
}

/// Totals ordered most-played first (ties broken by game id).
pub fn ranked_totals(totals: &BTreeMap<i64, GameTotal>) -> Vec<GameTotal> {
    let mut ranked: Vec<GameTotal> = totals.values().cloned().collect();
    ranked.sort_by(|a, b| b.minutes.cmp(&a.minutes).then(a.game_id.cmp(&b.game_id)));
    ranked
}
