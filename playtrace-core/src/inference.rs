//! Session inference
//!
//! Derives play sessions by differencing consecutive snapshots of one player.
//! For each pair `(earlier, later)` and each game present in `later`:
//!
//! | Game in `earlier`? | Delta | Result |
//! |--------------------|-------|--------|
//! | no  | -   | nothing (baseline unknown) |
//! | yes | > 0 | session `(earlier.captured_at, later.captured_at, delta)` |
//! | yes | 0   | nothing |
//! | yes | < 0 | nothing, plus a [`AnomalyKind::PlaytimeDecreased`] anomaly |
//!
//! Games that disappear from `later` are ignored: some sources only report a
//! recent subset, so absence says nothing about play.
//!
//! Inference is pure and deterministic; it never touches storage.

use crate::types::{Anomaly, AnomalyKind, Session, Snapshot};
use serde::Serialize;
use std::cmp::Ordering;

/// Sessions inferred from a snapshot sequence, plus anything suspicious seen on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InferenceReport {
    /// Ordered by `window_start`, then `game_id`
    pub sessions: Vec<Session>,
    /// Ordered by the position of the offending pair in the input
    pub anomalies: Vec<Anomaly>,
}

/// Infer sessions from an ascending snapshot sequence of a single player.
///
/// A bad pair (out of order, mixed players, decreasing playtime) is reported
/// as an anomaly and skipped; inference continues with the next pair.
pub fn infer_sessions(snapshots: &[Snapshot]) -> InferenceReport {
    let mut report = InferenceReport::default();

    for pair in snapshots.windows(2) {
        infer_pair(&pair[0], &pair[1], &mut report);
    }

    // Pairs already arrive in capture order; this only matters when an
    // out-of-order pair was skipped.
    report
        .sessions
        .sort_by(|a, b| (a.window_start, a.game_id).cmp(&(b.window_start, b.game_id)));

    for anomaly in &report.anomalies {
        tracing::warn!(player_id = %anomaly.player_id, "Snapshot anomaly: {}", anomaly);
    }

    report
}

fn infer_pair(earlier: &Snapshot, later: &Snapshot, report: &mut InferenceReport) {
    let anomaly = |kind: AnomalyKind| Anomaly {
        player_id: earlier.player_id.clone(),
        window_start: earlier.captured_at,
        window_end: later.captured_at,
        kind,
    };

    if later.player_id != earlier.player_id {
        report.anomalies.push(anomaly(AnomalyKind::PlayerMismatch {
            other_player_id: later.player_id.clone(),
        }));
        return;
    }

    if later.captured_at <= earlier.captured_at {
        report.anomalies.push(anomaly(AnomalyKind::OutOfOrder));
        return;
    }

    let previous = earlier.minutes_by_game();

    // `later.games` is sorted by id, so sessions of one pair come out in id order
    for game in &later.games {
        let Some(before) = previous.get(&game.game_id) else {
            continue;
        };

        match game.cumulative_minutes.cmp(&before.cumulative_minutes) {
            Ordering::Greater => report.sessions.push(Session {
                player_id: later.player_id.clone(),
                game_id: game.game_id,
                display_name: match game.display_name {
                    Some(_) => game.label(),
                    None => before.label(),
                },
                window_start: earlier.captured_at,
                window_end: later.captured_at,
                minutes: game.cumulative_minutes - before.cumulative_minutes,
            }),
            Ordering::Equal => {}
            Ordering::Less => report.anomalies.push(anomaly(AnomalyKind::PlaytimeDecreased {
                game_id: game.game_id,
                previous_minutes: before.cumulative_minutes,
                current_minutes: game.cumulative_minutes,
            })),
        }
    }
}
