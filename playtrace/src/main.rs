//! playtrace - query recorded playtime
//!
//! Sessions and totals are inferred from stored snapshots on every call;
//! nothing derived is ever written back.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use playtrace_core::analytics::{most_recent, ranked_totals, write_sessions_json, GameTotal};
use playtrace_core::format::{format_minutes, format_window};
use playtrace_core::{Anomaly, Config, Database, SessionQuery, TimeWindow};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "playtrace")]
#[command(about = "Query play sessions inferred from playtime snapshots")]
#[command(version)]
struct Cli {
    /// Database file (default: from config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List recorded players
    Players {
        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show inferred sessions for a player
    Sessions {
        #[command(flatten)]
        range: RangeArgs,

        /// Keep only the N most recent sessions
        #[arg(long)]
        limit: Option<usize>,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show per-game totals for a player, most played first
    Totals {
        #[command(flatten)]
        range: RangeArgs,

        /// Output JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Write all sessions as a JSON array for a static dashboard
    Export {
        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Restrict to these players (repeatable; default: all)
        #[arg(long = "player")]
        players: Vec<String>,
    },
}

#[derive(clap::Args)]
struct RangeArgs {
    /// Player id (steamid)
    #[arg(long)]
    player: String,

    /// Window start, RFC 3339 or YYYY-MM-DD (UTC)
    #[arg(long, value_parser = parse_time)]
    since: Option<DateTime<Utc>>,

    /// Window end, RFC 3339 or YYYY-MM-DD (UTC)
    #[arg(long, value_parser = parse_time)]
    until: Option<DateTime<Utc>>,
}

impl RangeArgs {
    fn window(&self) -> Result<TimeWindow> {
        if let (Some(since), Some(until)) = (self.since, self.until) {
            if since > until {
                anyhow::bail!("--since must not be after --until");
            }
        }
        Ok(TimeWindow {
            since: self.since,
            until: self.until,
        })
    }
}

fn parse_time(value: &str) -> std::result::Result<DateTime<Utc>, String> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
        .ok_or_else(|| format!("invalid time {:?}: expected RFC 3339 or YYYY-MM-DD", value))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load().context("failed to load configuration")?;
    let _log_guard =
        playtrace_core::logging::init(&config.logging).context("failed to initialize logging")?;

    let db_path = cli.db.clone().unwrap_or_else(|| config.resolved_database_path());
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open_with_timeout(&db_path, config.storage.busy_timeout())
        .context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match cli.command {
        Command::Players { json } => cmd_players(&db, json),
        Command::Sessions { range, limit, json } => cmd_sessions(&db, &range, limit, json),
        Command::Totals { range, json } => cmd_totals(&db, &range, json),
        Command::Export { output, players } => cmd_export(&db, &output, &players),
    }
}

fn cmd_players(db: &Database, json: bool) -> Result<()> {
    let players = db.list_player_overviews().context("failed to list players")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&players)?);
        return Ok(());
    }

    if players.is_empty() {
        println!("No players recorded yet.");
        println!("Run 'playtrace-poll' or 'playtrace-ingest' first.");
        return Ok(());
    }

    println!("{:<20} {:<24} {:>9}  LAST CAPTURE", "PLAYER", "NAME", "SNAPSHOTS");
    for p in &players {
        println!(
            "{:<20} {:<24} {:>9}  {}",
            p.player_id,
            p.player_name.as_deref().unwrap_or("-"),
            p.snapshot_count,
            p.last_captured_at.format("%Y-%m-%d %H:%M UTC")
        );
    }
    Ok(())
}

fn cmd_sessions(db: &Database, range: &RangeArgs, limit: Option<usize>, json: bool) -> Result<()> {
    let window = range.window()?;
    let report = SessionQuery::new(db)
        .sessions_for(&range.player, &window)
        .with_context(|| format!("failed to read sessions for {}", range.player))?;

    print_anomalies(&report.anomalies);
    let sessions = most_recent(report.sessions, limit);

    if json {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
        return Ok(());
    }

    if sessions.is_empty() {
        println!("No sessions found for {}.", range.player);
        return Ok(());
    }

    for s in &sessions {
        let window = u64::try_from(s.window_minutes()).unwrap_or(0);
        println!(
            "{:<28} {:>8} of {:<8} {}",
            format_window(s.window_start, s.window_end),
            format_minutes(s.minutes),
            format_minutes(window),
            s.display_name
        );
    }
    let total: u64 = sessions.iter().map(|s| s.minutes).sum();
    println!("\n{} session(s), {} played", sessions.len(), format_minutes(total));
    Ok(())
}

fn cmd_totals(db: &Database, range: &RangeArgs, json: bool) -> Result<()> {
    let window = range.window()?;
    let totals = SessionQuery::new(db)
        .totals_for(&range.player, &window)
        .with_context(|| format!("failed to compute totals for {}", range.player))?;
    let ranked: Vec<GameTotal> = ranked_totals(&totals);

    if json {
        println!("{}", serde_json::to_string_pretty(&ranked)?);
        return Ok(());
    }

    if ranked.is_empty() {
        println!("No playtime recorded for {}.", range.player);
        return Ok(());
    }

    for t in &ranked {
        println!(
            "{:>8}  {:>3} session(s)  {}",
            format_minutes(t.minutes),
            t.session_count,
            t.display_name
        );
    }
    Ok(())
}

fn cmd_export(db: &Database, output: &Path, players: &[String]) -> Result<()> {
    let only = (!players.is_empty()).then_some(players);
    let (sessions, anomalies) = SessionQuery::new(db)
        .sessions_for_players(only, &TimeWindow::all())
        .context("failed to read sessions")?;

    print_anomalies(&anomalies);
    write_sessions_json(&sessions, output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!("Exported {} session(s) to {}", sessions.len(), output.display());
    Ok(())
}

fn print_anomalies(anomalies: &[Anomaly]) {
    for anomaly in anomalies {
        eprintln!("warning: {}", anomaly);
    }
}
