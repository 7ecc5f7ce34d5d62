//! HTTP client for the Steam Web API
//!
//! Only two endpoints are used:
//! - `IPlayerService/GetOwnedGames/v1` for cumulative playtime per game
//! - `ISteamUser/ResolveVanityURL/v1` to turn a custom profile name into a steamid

use std::time::Duration;

use serde_json::Value;

use crate::error::{Error, Result};
use crate::types::RawGame;

/// Default Steam Web API host
pub const STEAM_API_BASE: &str = "https://api.steampowered.com";

/// Async client for the Steam Web API
pub struct SteamApiClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl SteamApiClient {
    /// Create a client for the public Steam Web API host
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Self::with_base_url(api_key, timeout, STEAM_API_BASE)
    }

    /// Create a client against a custom host (proxies, test servers)
    pub fn with_base_url(
        api_key: impl Into<String>,
        timeout: Duration,
        base_url: &str,
    ) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::Config("steam.api_key is required".to_string()));
        }

        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch every owned game of `steamid`, including played free games.
    pub async fn get_owned_games(&self, steamid: &str) -> Result<Vec<RawGame>> {
        let url = self.url(
            "IPlayerService/GetOwnedGames/v1/",
            &[
                ("steamid", steamid),
                ("include_appinfo", "1"),
                ("include_played_free_games", "1"),
            ],
        );
        let body = self.get_json(&url).await?;
        Ok(parse_owned_games(&body))
    }

    /// Resolve a vanity URL name to a steamid. `None` when Steam knows no such name.
    pub async fn resolve_vanity_url(&self, vanity_url: &str) -> Result<Option<String>> {
        let url = self.url("ISteamUser/ResolveVanityURL/v1/", &[("vanityurl", vanity_url)]);
        let body = self.get_json(&url).await?;
        Ok(parse_vanity_response(&body))
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> String {
        let mut url = format!(
            "{}/{}?key={}&format=json",
            self.base_url,
            path,
            urlencoding::encode(&self.api_key)
        );
        for (name, value) in params {
            url.push('&');
            url.push_str(name);
            url.push('=');
            url.push_str(&urlencoding::encode(value));
        }
        url
    }

    async fn get_json(&self, url: &str) -> Result<Value> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Poller(format!("HTTP request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            // The URL carries the API key; never echo it.
            return Err(Error::Poller(format!("Steam API error ({})", status)));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| Error::Poller(format!("failed to parse response: {}", e.without_url())))
    }
}

/// Extract game entries from a `GetOwnedGames` response body.
///
/// Entries that do not look like a game object are skipped; private profiles
/// answer with an empty `response` and yield no games.
pub fn parse_owned_games(body: &Value) -> Vec<RawGame> {
    let Some(games) = body
        .get("response")
        .and_then(|r| r.get("games"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    games
        .iter()
        .filter_map(|entry| match serde_json::from_value::<RawGame>(entry.clone()) {
            Ok(game) => Some(game),
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed owned-game entry");
                None
            }
        })
        .collect()
}

/// Extract the steamid from a `ResolveVanityURL` response body.
pub fn parse_vanity_response(body: &Value) -> Option<String> {
    let response = body.get("response")?;
    if response.get("success").and_then(Value::as_i64) != Some(1) {
        return None;
    }
    match response.get("steamid")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_owned_games() {
        let body = json!({
            "response": {
                "game_count": 3,
                "games": [
                    {"appid": 620, "name": "Portal 2", "playtime_forever": 754, "playtime_2weeks": 30},
                    {"appid": 440, "playtime_forever": 0},
                    "not a game"
                ]
            }
        });

        let games = parse_owned_games(&body);
        assert_eq!(games.len(), 2);
        assert_eq!(games[0].game_id, Some(620));
        assert_eq!(games[0].display_name.as_deref(), Some("Portal 2"));
        assert_eq!(games[0].playtime, Some(754.0));
        assert_eq!(games[0].extra.get("playtime_2weeks"), Some(&json!(30)));
        assert_eq!(games[1].display_name, None);
    }

    #[test]
    fn test_parse_private_profile() {
        assert!(parse_owned_games(&json!({"response": {}})).is_empty());
        assert!(parse_owned_games(&json!({})).is_empty());
    }

    #[test]
    fn test_parse_vanity_response() {
        let ok = json!({"response": {"steamid": "76561197960287930", "success": 1}});
        assert_eq!(parse_vanity_response(&ok).as_deref(), Some("76561197960287930"));

        let missing = json!({"response": {"success": 42, "message": "No match"}});
        assert_eq!(parse_vanity_response(&missing), None);
    }

    #[test]
    fn test_url_encodes_values() {
        let client =
            SteamApiClient::with_base_url("k&y", Duration::from_secs(1), "http://localhost/").unwrap();
        let url = client.url("ISteamUser/ResolveVanityURL/v1/", &[("vanityurl", "a b")]);
        assert_eq!(
            url,
            "http://localhost/ISteamUser/ResolveVanityURL/v1/?key=k%26y&format=json&vanityurl=a%20b"
        );
    }

    #[test]
    fn test_empty_api_key_rejected() {
        let result = SteamApiClient::new("  ", Duration::from_secs(1));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
