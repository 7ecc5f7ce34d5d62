//! Steam playtime poller
//!
//! Fetches the owned-games list of each configured player and appends it to a
//! [`SnapshotStore`]. The store decides whether anything changed; the poller
//! only counts outcomes.
//!
//! A failing player never aborts a cycle. There are no retries here; the next
//! cycle is the retry.

pub mod client;

pub use client::{parse_owned_games, parse_vanity_response, SteamApiClient};

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{Config, PlayerConfig};
use crate::db::SnapshotStore;
use crate::error::{Error, Result};
use crate::types::{AppendOutcome, RawGame, RawSnapshot, SnapshotSource};

/// Outcome counts of one poll cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollReport {
    /// Players whose new snapshot was stored
    pub written: usize,
    /// Players whose library was unchanged
    pub skipped: usize,
    /// Players that could not be resolved, fetched, or stored
    pub failed: usize,
}

impl PollReport {
    pub fn record(&mut self, outcome: &Result<AppendOutcome>) {
        match outcome {
            Ok(AppendOutcome::Written) => self.written += 1,
            Ok(AppendOutcome::Skipped) => self.skipped += 1,
            Err(_) => self.failed += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.written + self.skipped + self.failed
    }
}

/// Build the raw snapshot for one fetched owned-games list.
pub fn owned_games_snapshot(steamid: &str, captured_at: DateTime<Utc>, games: Vec<RawGame>) -> RawSnapshot {
    RawSnapshot {
        player_id: steamid.to_string(),
        player_name: None,
        captured_at,
        source: SnapshotSource::SteamApi,
        games,
    }
}

/// Synchronous wrapper around [`SteamApiClient`]
///
/// Owns a current-thread runtime so the binaries stay fully synchronous.
pub struct SyncPoller {
    client: SteamApiClient,
    runtime: tokio::runtime::Runtime,
    /// vanity URL -> steamid, resolved once per poller
    resolved: HashMap<String, String>,
}

impl SyncPoller {
    /// Create a poller from configuration.
    ///
    /// Fails when no API key is configured.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.steam.resolve_api_key().ok_or_else(|| {
            Error::Config(format!(
                "no Steam Web API key: set {} or steam.api_key",
                config.steam.api_key_env_var
            ))
        })?;
        let client = SteamApiClient::new(api_key, Duration::from_secs(config.polling.timeout_secs))?;
        Self::with_client(client)
    }

    pub fn with_client(client: SteamApiClient) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| Error::Poller(format!("failed to create runtime: {}", e)))?;

        Ok(Self {
            client,
            runtime,
            resolved: HashMap::new(),
        })
    }

    /// Steamid for a configured player, resolving its vanity URL if needed (blocking).
    pub fn resolve(&mut self, player: &PlayerConfig) -> Result<String> {
        if let Some(steamid) = &player.steamid {
            return Ok(steamid.clone());
        }
        let vanity = player
            .vanity_url
            .as_deref()
            .ok_or_else(|| Error::Config("player needs a steamid or vanity_url".to_string()))?;

        if let Some(steamid) = self.resolved.get(vanity) {
            return Ok(steamid.clone());
        }

        let steamid = self
            .runtime
            .block_on(self.client.resolve_vanity_url(vanity))?
            .ok_or_else(|| Error::Poller(format!("could not resolve vanity URL {:?}", vanity)))?;
        tracing::info!(vanity_url = vanity, steamid = %steamid, "Resolved vanity URL");
        self.resolved.insert(vanity.to_string(), steamid.clone());
        Ok(steamid)
    }

    /// Fetch a raw snapshot for `steamid` without storing it (blocking).
    pub fn fetch(&self, steamid: &str) -> Result<RawSnapshot> {
        let games = self.runtime.block_on(self.client.get_owned_games(steamid))?;
        Ok(owned_games_snapshot(steamid, Utc::now(), games))
    }

    /// Poll every player once and append the results to `store` (blocking).
    pub fn poll_once(&mut self, store: &dyn SnapshotStore, players: &[PlayerConfig]) -> PollReport {
        let mut report = PollReport::default();

        for player in players {
            let outcome = self
                .resolve(player)
                .and_then(|steamid| self.fetch(&steamid))
                .and_then(|raw| store.append(&raw).map(|outcome| (raw, outcome)));

            match &outcome {
                Ok((raw, outcome)) => tracing::info!(
                    player_id = %raw.player_id,
                    games = raw.games.len(),
                    outcome = outcome.as_str(),
                    "Polled player"
                ),
                Err(e) => tracing::warn!(
                    steamid = ?player.steamid,
                    vanity_url = ?player.vanity_url,
                    error = %e,
                    "Poll failed for player"
                ),
            }
            report.record(&outcome.map(|(_, outcome)| outcome));
        }

        tracing::info!(
            written = report.written,
            skipped = report.skipped,
            failed = report.failed,
            "Poll cycle finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use chrono::TimeZone;

    #[test]
    fn test_report_counts() {
        let mut report = PollReport::default();
        report.record(&Ok(AppendOutcome::Written));
        report.record(&Ok(AppendOutcome::Skipped));
        report.record(&Ok(AppendOutcome::Skipped));
        report.record(&Err(Error::Poller("timeout".to_string())));

        assert_eq!(
            report,
            PollReport {
                written: 1,
                skipped: 2,
                failed: 1
            }
        );
        assert_eq!(report.total(), 4);
    }

    #[test]
    fn test_owned_games_snapshot_appends() {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        let at = Utc.with_ymd_and_hms(2025, 11, 23, 12, 0, 0).unwrap();

        let body = serde_json::json!({
            "response": {"games": [{"appid": 620, "name": "Portal 2", "playtime_forever": 754}]}
        });
        let raw = owned_games_snapshot("76561197960287930", at, parse_owned_games(&body));
        assert_eq!(raw.source, SnapshotSource::SteamApi);

        assert_eq!(db.append(&raw).unwrap(), AppendOutcome::Written);
        let again = owned_games_snapshot("76561197960287930", at + chrono::Duration::minutes(1), raw.games.clone());
        assert_eq!(db.append(&again).unwrap(), AppendOutcome::Skipped);
    }

    #[test]
    fn test_resolve_prefers_steamid() {
        let client = SteamApiClient::with_base_url("key", Duration::from_secs(1), "http://127.0.0.1:9").unwrap();
        let mut poller = SyncPoller::with_client(client).unwrap();

        let player = PlayerConfig {
            steamid: Some("76561197960287930".to_string()),
            vanity_url: Some("ignored".to_string()),
        };
        assert_eq!(poller.resolve(&player).unwrap(), "76561197960287930");
        assert!(poller.resolve(&PlayerConfig::default()).is_err());
    }

    #[test]
    fn test_new_requires_api_key() {
        let mut config = Config::default();
        config.steam.api_key_env_var = "PLAYTRACE_TEST_MISSING_KEY".to_string();
        assert!(matches!(SyncPoller::new(&config), Err(Error::Config(_))));
    }
}
