//! JSON export of inferred sessions for static dashboards.

use crate::error::Result;
use crate::types::Session;
use std::path::Path;

/// Keep only the `limit` sessions with the latest windows.
///
/// The result stays in the input's order otherwise.
pub fn most_recent(sessions: Vec<Session>, limit: Option<usize>) -> Vec<Session> {
    let Some(limit) = limit.filter(|l| *l > 0) else {
        return sessions;
    };
    if sessions.len() <= limit {
        return sessions;
    }

    let mut by_recency: Vec<usize> = (0..sessions.len()).collect();
    by_recency.sort_by(|a, b| {
        (sessions[*b].window_end, sessions[*b].game_id).cmp(&(sessions[*a].window_end, sessions[*a].game_id))
    });
    let mut keep = vec![false; sessions.len()];
    for idx in by_recency.into_iter().take(limit) {
        keep[idx] = true;
    }

    sessions
        .into_iter()
        .zip(keep)
        .filter_map(|(session, kept)| kept.then_some(session))
        .collect()
}

/// Write sessions as a pretty-printed JSON array, creating parent directories.
pub fn write_sessions_json(sessions: &[Session], output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let json = serde_json::to_string_pretty(sessions)?;
    std::fs::write(output_path, json)?;

    tracing::info!(
        path = %output_path.display(),
        sessions = sessions.len(),
        "Exported sessions"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tempfile::TempDir;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 23, hour, 0, 0).unwrap()
    }

    fn session(game_id: i64, start: u32) -> Session {
        Session {
            player_id: "p1".to_string(),
            game_id,
            display_name: "Portal 2".to_string(),
            window_start: ts(start),
            window_end: ts(start + 1),
            minutes: 10,
        }
    }

    #[test]
    fn test_most_recent_keeps_latest_in_order() {
        let sessions = vec![session(1, 5), session(2, 1), session(1, 9), session(2, 7)];
        let kept = most_recent(sessions.clone(), Some(2));
        assert_eq!(kept, vec![session(1, 9), session(2, 7)]);

        assert_eq!(most_recent(sessions.clone(), None), sessions);
        assert_eq!(most_recent(sessions.clone(), Some(0)), sessions);
        assert_eq!(most_recent(sessions.clone(), Some(10)), sessions);
    }

    #[test]
    fn test_write_sessions_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("web").join("sessions.json");

        write_sessions_json(&[session(620, 3)], &path).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[0]["game_id"], 620);
        assert_eq!(value[0]["minutes"], 10);
        assert_eq!(value[0]["window_start"], "2025-11-23T03:00:00Z");
    }
}
