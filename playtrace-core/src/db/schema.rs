//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: snapshot history
    r#"
    -- One row per stored (non-skipped) poll result.
    -- captured_at is fixed-width RFC 3339 UTC, so text order is time order.
    CREATE TABLE IF NOT EXISTS snapshots (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        player_id        TEXT NOT NULL,
        player_name      TEXT,
        captured_at      DATETIME NOT NULL,
        source           TEXT NOT NULL,
        game_count       INTEGER NOT NULL,

        -- SHA-256 of the canonical (game_id, minutes) projection
        content_hash     TEXT NOT NULL,

        -- Full per-game reading, including display-only fields
        games            JSON NOT NULL,

        UNIQUE(player_id, captured_at)
    );

    CREATE INDEX IF NOT EXISTS idx_snapshots_player_time
        ON snapshots(player_id, captured_at DESC);
    "#,
];

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> crate::error::Result<()> {
    let current_version = get_schema_version(conn)?;

    tracing::info!(
        current_version,
        target_version = SCHEMA_VERSION,
        "Checking database migrations"
    );

    for (i, migration) in MIGRATIONS.iter().enumerate() {
        let version = (i + 1) as i32;
        if version > current_version {
            tracing::info!(version, "Running migration");
            conn.execute_batch(migration)?;
            conn.execute(&format!("PRAGMA user_version = {}", version), [])?;
        }
    }

    if current_version < SCHEMA_VERSION {
        tracing::info!(
            from = current_version,
            to = SCHEMA_VERSION,
            "Migrations complete"
        );
    }

    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> crate::error::Result<i32> {
    let version: i32 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    Ok(version)
}
