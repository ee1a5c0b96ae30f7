//! Append-only archival of telemetry and finished turns

use chrono::{DateTime, Utc};

use super::DbPool;
use crate::turn::TurnState;
use crate::{Error, Result};

/// An archived conversation turn
#[derive(Debug, Clone)]
pub struct ArchivedTurn {
    pub id: String,
    pub device_id: String,
    pub started_at: DateTime<Utc>,
    pub transcription: Option<String>,
    pub reply_text: String,
    pub intent: Option<String>,
    pub mood: String,
    pub priority: String,
}

/// Turn archival repository
#[derive(Clone)]
pub struct TurnRepo {
    pool: DbPool,
}

impl TurnRepo {
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Record one sensor reading
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn record_reading(
        &self,
        device_id: &str,
        temperature: f64,
        moisture: f64,
        light: f64,
        event: Option<&str>,
    ) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO sensor_readings
             (device_id, recorded_at, temperature, moisture, light, event)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                device_id,
                Utc::now().to_rfc3339(),
                temperature,
                moisture,
                light,
                event
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Append a finished turn to the conversation log
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails
    pub fn archive(&self, conversation_id: &str, state: &TurnState) -> Result<()> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.execute(
            "INSERT INTO conversations
             (id, device_id, started_at, transcription, reply_text, intent, mood, priority)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                conversation_id,
                &state.device_id,
                Utc::now().to_rfc3339(),
                state.query.as_deref(),
                &state.reply_text,
                state.intent.map(|i| i.as_str()),
                state.mood.as_str(),
                state.priority.as_str(),
            ],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(())
    }

    /// Fetch one archived turn
    ///
    /// # Errors
    ///
    /// Returns error if the database operation fails or the id is unknown
    pub fn get(&self, conversation_id: &str) -> Result<ArchivedTurn> {
        let conn = self
            .pool
            .get()
            .map_err(|e| Error::Database(e.to_string()))?;

        conn.query_row(
            "SELECT id, device_id, started_at, transcription, reply_text, intent, mood, priority
             FROM conversations WHERE id = ?1",
            [conversation_id],
            |row| {
                Ok(ArchivedTurn {
                    id: row.get(0)?,
                    device_id: row.get(1)?,
                    started_at: parse_datetime(&row.get::<_, String>(2)?),
                    transcription: row.get(3)?,
                    reply_text: row.get(4)?,
                    intent: row.get(5)?,
                    mood: row.get(6)?,
                    priority: row.get(7)?,
                })
            },
        )
        .map_err(|_| Error::NotFound(format!("conversation {conversation_id}")))
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map_or_else(|_| Utc::now(), |dt| dt.with_timezone(&Utc))
}
