//! Database schema and migrations
//!
//! Uses SQLite with embedded migrations managed via PRAGMA user_version.

use rusqlite::Connection;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// SQL migrations, indexed by version number
const MIGRATIONS: &[&str] = &[
    // Version 1: tracking and match metadata
    r#"
    CREATE TABLE IF NOT EXISTS matches (
        match_id         TEXT PRIMARY KEY,
        home_team_id     TEXT,
        away_team_id     TEXT,
        competition      TEXT,
        kickoff_at       TEXT,
        metadata         JSON
    );

    -- One row per tracked object per frame. Timestamps are RFC 3339 UTC
    -- with millisecond precision so they sort lexically.
    CREATE TABLE IF NOT EXISTS tracking (
        match_id         TEXT NOT NULL,
        frame            INTEGER NOT NULL,
        timestamp_iso    TEXT NOT NULL,
        team_id          TEXT,
        player_id        TEXT,
        x                REAL NOT NULL,
        y                REAL NOT NULL,
        z                REAL NOT NULL DEFAULT 0,
        speed            REAL,
        orientation      REAL
    );

    CREATE INDEX IF NOT EXISTS idx_tracking_match_frame ON tracking(match_id, frame);
    CREATE INDEX IF NOT EXISTS idx_tracking_player ON tracking(match_id, player_id);
    "#,
    // Version 2: detected events
    r#"
    CREATE TABLE IF NOT EXISTS events (
        event_id         TEXT PRIMARY KEY,
        match_id         TEXT NOT NULL,
        event_type       TEXT NOT NULL,
        start_time       TEXT NOT NULL,
        end_time         TEXT NOT NULL,
        start_frame      INTEGER NOT NULL,
        end_frame        INTEGER NOT NULL,
        team_id          TEXT,
        players_involved JSON NOT NULL DEFAULT '[]',
        metadata_json    JSON NOT NULL DEFAULT '{}'
    );

    CREATE INDEX IF NOT EXISTS idx_events_match_type ON events(match_id, event_type);
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
