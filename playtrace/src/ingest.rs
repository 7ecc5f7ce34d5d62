//! playtrace-ingest - append one raw snapshot produced by an external poller
//!
//! Reads the game list as JSON from a file (or `-` for stdin) and appends it
//! for one player. Accepted shapes:
//! - a bare array of game entries
//! - an object with a `games` array
//! - a raw `GetOwnedGames` response (`{"response": {"games": [...]}}`)
//!
//! Prints `written` or `skipped`.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use playtrace_core::poller::parse_owned_games;
use playtrace_core::{Config, Database, RawGame, RawSnapshot, SnapshotSource, SnapshotStore};
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "playtrace-ingest")]
#[command(about = "Append one raw playtime snapshot to the database")]
#[command(version)]
struct Args {
    /// Player id (steamid) the snapshot belongs to
    #[arg(long)]
    player: String,

    /// Where the readings came from
    #[arg(long, default_value = "steam-api")]
    source: SnapshotSource,

    /// Player display name at capture time
    #[arg(long)]
    name: Option<String>,

    /// Capture time as RFC 3339 (default: now)
    #[arg(long)]
    captured_at: Option<DateTime<Utc>>,

    /// Database file (default: from config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// JSON input file, or `-` for stdin
    input: PathBuf,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        playtrace_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let content = read_input(&args.input)?;
    let games = parse_games(&content).context("failed to parse game list")?;

    let raw = RawSnapshot {
        player_id: args.player.clone(),
        player_name: args.name.clone(),
        captured_at: args.captured_at.unwrap_or_else(Utc::now),
        source: args.source,
        games,
    };

    let db_path = args.db.clone().unwrap_or_else(|| config.resolved_database_path());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open_with_timeout(&db_path, config.storage.busy_timeout())
        .context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    let outcome = db
        .append(&raw)
        .with_context(|| format!("failed to append snapshot for {}", raw.player_id))?;

    tracing::info!(
        player_id = %raw.player_id,
        captured_at = %raw.captured_at,
        source = raw.source.as_str(),
        outcome = outcome.as_str(),
        "Ingested snapshot"
    );
    println!("{}", outcome.as_str());
    Ok(())
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut content = String::new();
        std::io::stdin()
            .read_to_string(&mut content)
            .context("failed to read stdin")?;
        Ok(content)
    } else {
        std::fs::read_to_string(input).with_context(|| format!("failed to read {}", input.display()))
    }
}

fn parse_games(content: &str) -> Result<Vec<RawGame>> {
    let value: Value = serde_json::from_str(content)?;
    match value {
        Value::Array(_) => Ok(serde_json::from_value(value)?),
        Value::Object(ref map) if map.contains_key("response") => Ok(parse_owned_games(&value)),
        Value::Object(mut map) => {
            let games = map
                .remove("games")
                .context("expected a JSON array or an object with a \"games\" array")?;
            Ok(serde_json::from_value(games)?)
        }
        _ => anyhow::bail!("expected a JSON array or an object with a \"games\" array"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_games_shapes() {
        let array = parse_games(r#"[{"appid": 620, "playtime_forever": 10}]"#).unwrap();
        assert_eq!(array[0].game_id, Some(620));

        let object = parse_games(r#"{"games": [{"game_id": 620, "playtime_total": 1.5}]}"#).unwrap();
        assert_eq!(object[0].playtime, Some(1.5));

        let response =
            parse_games(r#"{"response": {"games": [{"appid": 440, "playtime_forever": 3}]}}"#)
                .unwrap();
        assert_eq!(response[0].game_id, Some(440));

        assert!(parse_games(r#"{"other": 1}"#).is_err());
        assert!(parse_games("42").is_err());
    }
}
