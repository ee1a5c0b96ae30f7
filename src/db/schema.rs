//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Registered pots
        CREATE TABLE IF NOT EXISTS devices (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            species TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- Raw telemetry, one row per ingest
        CREATE TABLE IF NOT EXISTS sensor_readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id TEXT NOT NULL REFERENCES devices(id),
            recorded_at TEXT NOT NULL,
            temperature REAL NOT NULL,
            moisture REAL NOT NULL,
            light REAL NOT NULL,
            event TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_readings_device
            ON sensor_readings(device_id, recorded_at);

        -- Finished turns, appended after delivery
        CREATE TABLE IF NOT EXISTS conversations (
            id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL REFERENCES devices(id),
            started_at TEXT NOT NULL,
            transcription TEXT,
            reply_text TEXT NOT NULL,
            intent TEXT,
            mood TEXT NOT NULL,
            priority TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_conversations_device
            ON conversations(device_id, started_at);

        PRAGMA user_version = 1;
        ",
    )?;
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Species knowledge consulted by the lookup stage
        CREATE TABLE IF NOT EXISTS species_profiles (
            species TEXT PRIMARY KEY,
            biological_info TEXT NOT NULL,
            care_tips TEXT NOT NULL,
            lore TEXT NOT NULL
        );

        PRAGMA user_version = 2;
        ",
    )?;
    Ok(())
}
