//! # playtrace-core
//!
//! Core library for playtrace - a playtime snapshot recorder and session
//! inference engine.
//!
//! This library provides:
//! - Domain types for raw and canonical snapshots, sessions, and anomalies
//! - Source normalization and content hashing
//! - A deduplicating, append-only SQLite snapshot store
//! - Session inference over consecutive snapshots
//! - Per-game totals and JSON export for presentation
//! - A Steam Web API poller
//! - Configuration and logging infrastructure
//!
//! ## Architecture
//!
//! Data flows through three layers:
//! - **Raw:** what a source reported (Steam Web API, profile scraper)
//! - **Canonical:** normalized snapshots, stored only when content changed
//! - **Derived:** sessions and totals, recomputed from snapshots on every read
//!
//! ## Example
//!
//! ```rust,no_run
//! use playtrace_core::{Config, Database, SessionQuery, TimeWindow};
//!
//! let config = Config::load().expect("failed to load config");
//!
//! let db = Database::open(&config.resolved_database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//!
//! let query = SessionQuery::new(&db);
//! let report = query
//!     .sessions_for("76561197960287930", &TimeWindow::all())
//!     .expect("failed to read sessions");
//! println!("{} sessions", report.sessions.len());
//! ```

// Re-export commonly used items at the crate root
pub use analytics::SessionQuery;
pub use config::Config;
pub use db::{Database, SnapshotStore};
pub use error::{Error, Result};
pub use inference::{infer_sessions, InferenceReport};
pub use poller::{PollReport, SyncPoller};
pub use types::*;

// Public modules
pub mod analytics;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod inference;
pub mod logging;
pub mod normalize;
pub mod poller;
pub mod types;
