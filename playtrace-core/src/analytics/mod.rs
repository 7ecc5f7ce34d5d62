//! Analytics module for playtrace
//!
//! Assembles inferred sessions into presentation-ready data:
//! - Per-player session lists over a time window
//! - Per-game totals and per-player summaries
//! - JSON export for static dashboards
//!
//! Everything here is recomputed from stored snapshots on each call.

pub mod export;
pub mod query;

pub use export::{most_recent, write_sessions_json};
pub use query::{ranked_totals, totals_from_sessions, GameTotal, PlayerSummary, SessionQuery};
