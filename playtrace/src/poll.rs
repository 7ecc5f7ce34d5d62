//! playtrace-poll - record Steam playtime snapshots
//!
//! Polls the Steam Web API for every configured player and appends the
//! owned-games list to the snapshot database. Unchanged libraries are skipped
//! by the store, so polling often costs nothing but a read.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/playtrace/data.db (~/.local/share/playtrace/data.db)
//! - Logs: $XDG_STATE_HOME/playtrace/playtrace.log (~/.local/state/playtrace/playtrace.log)
//! - Config: $XDG_CONFIG_HOME/playtrace/config.toml (~/.config/playtrace/config.toml)

mod process_lock;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use playtrace_core::config::PlayerConfig;
use playtrace_core::{Config, Database, PollReport, SyncPoller};
use process_lock::acquire_poll_guard;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Parser)]
#[command(name = "playtrace-poll")]
#[command(about = "Poll Steam playtime and record snapshots")]
#[command(version)]
struct Args {
    /// Dry run - fetch and summarize, but don't store anything
    #[arg(long)]
    dry_run: bool,

    /// Watch mode - poll continuously instead of once
    #[arg(short, long)]
    watch: bool,

    /// Seconds between polls (only with --watch; default from config)
    #[arg(long)]
    interval: Option<u64>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard =
        playtrace_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::info!("playtrace-poll starting");

    let players = config.steam.players();
    if players.is_empty() {
        anyhow::bail!(
            "no players configured: add [[steam.players]] entries to {}",
            Config::config_path().display()
        );
    }

    let mut poller = SyncPoller::new(&config).context("failed to create Steam poller")?;

    if args.dry_run {
        return run_dry_run(&mut poller, &players);
    }

    let db_path = config.resolved_database_path();
    let _poll_guard = acquire_poll_guard(&db_path).context("failed to acquire process lock")?;

    tracing::info!(path = %db_path.display(), "Opening database");
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open_with_timeout(&db_path, config.storage.busy_timeout())
        .context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    println!("Database: {}", db_path.display());

    if args.watch {
        let interval = args.interval.unwrap_or(config.polling.interval_seconds);
        if interval == 0 {
            anyhow::bail!("--interval must be a positive number of seconds");
        }
        run_watch_mode(&mut poller, &db, &players, Duration::from_secs(interval))
    } else {
        run_single_poll(&mut poller, &db, &players)
    }
}

/// Fetch every player and print what would be stored
fn run_dry_run(poller: &mut SyncPoller, players: &[PlayerConfig]) -> Result<()> {
    for player in players {
        let snapshot = poller.resolve(player).and_then(|steamid| poller.fetch(&steamid));
        match snapshot {
            Ok(raw) => {
                let minutes: f64 = raw.games.iter().filter_map(|g| g.playtime).sum();
                println!(
                    "  {}: {} game(s), {} total",
                    raw.player_id,
                    raw.games.len(),
                    playtrace_core::format::format_minutes(minutes.max(0.0).round() as u64)
                );
            }
            Err(e) => println!("  {:?}: error: {}", player, e),
        }
    }
    println!("\nDry run - nothing stored");
    tracing::info!("Dry run complete");
    Ok(())
}

/// Poll once with a spinner
fn run_single_poll(poller: &mut SyncPoller, db: &Database, players: &[PlayerConfig]) -> Result<()> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .context("invalid progress template")?,
    );
    pb.set_message(format!("Polling {} player(s)...", players.len()));
    pb.enable_steady_tick(Duration::from_millis(100));

    let report = poller.poll_once(db, players);

    pb.finish_and_clear();
    print_report(&report);

    if report.failed > 0 && report.failed == report.total() {
        anyhow::bail!("every player failed to poll; see {}", Config::log_path().display());
    }
    Ok(())
}

/// Poll until Ctrl+C
fn run_watch_mode(
    poller: &mut SyncPoller,
    db: &Database,
    players: &[PlayerConfig],
    interval: Duration,
) -> Result<()> {
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    ctrlc::set_handler(move || {
        eprintln!("\nShutting down...");
        r.store(false, Ordering::SeqCst);
    })
    .context("failed to set Ctrl+C handler")?;

    println!(
        "Watch mode active (poll every {}s). Press Ctrl+C to stop.",
        interval.as_secs()
    );
    println!();

    let mut iteration = 0u64;

    while running.load(Ordering::SeqCst) {
        iteration += 1;

        let report = poller.poll_once(db, players);

        if report.written > 0 || report.failed > 0 {
            let timestamp = chrono::Local::now().format("%H:%M:%S");
            println!(
                "[{}] written: {}, unchanged: {}, failed: {}",
                timestamp, report.written, report.skipped, report.failed
            );
        }
        tracing::debug!(iteration, "watch poll iteration");

        // Sleep in short slices so Ctrl+C is honoured promptly.
        let deadline = Instant::now() + interval;
        while running.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(200));
        }
    }

    println!("Watch mode stopped.");
    tracing::info!("playtrace-poll watch mode stopped");

    Ok(())
}

fn print_report(report: &PollReport) {
    println!("\nPoll complete:");
    println!("  Written:   {}", report.written);
    println!("  Unchanged: {}", report.skipped);
    println!("  Failed:    {}", report.failed);
}
