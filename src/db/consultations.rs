//! Consultation record persistence.
//!
//! CRUD operations for the `consultations` table. Raw SQL with rusqlite,
//! no ORM.

use anyhow::{Context, Result};
use rusqlite::{params, Connection};

use crate::call::CallPhase;

/// A consultation record from the database.
#[derive(Debug, Clone)]
pub struct ConsultationRecord {
    pub id: i64,
    pub appointment_id: String,
    pub room_name: String,
    pub status: String,
    pub duration_seconds: Option<i64>,
    pub transcription_id: Option<String>,
    pub error: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub created_at: String,
}

/// Repository for consultation records.
pub struct ConsultationRepository;

impl ConsultationRepository {
    /// Insert a new consultation record (status = active).
    /// Returns the new consultation ID.
    pub fn insert(conn: &Connection, appointment_id: &str, room_name: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO consultations (appointment_id, room_name, status) VALUES (?1, ?2, ?3)",
            params![appointment_id, room_name, CallPhase::Active.as_str()],
        )
        .context("Failed to insert consultation")?;

        Ok(conn.last_insert_rowid())
    }

    /// Update the consultation status.
    pub fn update_status(conn: &Connection, id: i64, phase: CallPhase) -> Result<()> {
        conn.execute(
            "UPDATE consultations SET status = ?1 WHERE id = ?2",
            params![phase.as_str(), id],
        )
        .context("Failed to update consultation status")?;
        Ok(())
    }

    /// Mark consultation as ended with its duration.
    pub fn complete(conn: &Connection, id: i64, duration_seconds: i64) -> Result<()> {
        conn.execute(
            "UPDATE consultations SET status = ?1, duration_seconds = ?2, \
             ended_at = CURRENT_TIMESTAMP WHERE id = ?3",
            params![CallPhase::Ended.as_str(), duration_seconds, id],
        )
        .context("Failed to complete consultation")?;
        Ok(())
    }

    /// Attach the remote transcription job to the consultation.
    pub fn set_transcription(conn: &Connection, id: i64, transcription_id: &str) -> Result<()> {
        conn.execute(
            "UPDATE consultations SET transcription_id = ?1 WHERE id = ?2",
            params![transcription_id, id],
        )
        .context("Failed to record transcription id")?;
        Ok(())
    }

    /// Mark consultation as failed with error.
    pub fn fail(conn: &Connection, id: i64, error: &str) -> Result<()> {
        conn.execute(
            "UPDATE consultations SET status = ?1, error = ?2, \
             ended_at = CURRENT_TIMESTAMP WHERE id = ?3",
            params![CallPhase::Error.as_str(), error, id],
        )
        .context("Failed to mark consultation as failed")?;
        Ok(())
    }

    /// Get a consultation by ID.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<ConsultationRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, appointment_id, room_name, status, duration_seconds, \
                 transcription_id, error, started_at, ended_at, created_at \
                 FROM consultations WHERE id = ?1",
            )
            .context("Failed to prepare consultation query")?;

        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(ConsultationRecord {
                    id: row.get(0)?,
                    appointment_id: row.get(1)?,
                    room_name: row.get(2)?,
                    status: row.get(3)?,
                    duration_seconds: row.get(4)?,
                    transcription_id: row.get(5)?,
                    error: row.get(6)?,
                    started_at: row.get(7)?,
                    ended_at: row.get(8)?,
                    created_at: row.get(9)?,
                })
            })
            .context("Failed to query consultation")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List consultations, newest first.
    pub fn list(conn: &Connection, limit: usize) -> Result<Vec<ConsultationRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, appointment_id, room_name, status, duration_seconds, \
                 transcription_id, error, started_at, ended_at, created_at \
                 FROM consultations ORDER BY started_at DESC, id DESC LIMIT ?1",
            )
            .context("Failed to prepare consultations list query")?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(ConsultationRecord {
                    id: row.get(0)?,
                    appointment_id: row.get(1)?,
                    room_name: row.get(2)?,
                    status: row.get(3)?,
                    duration_seconds: row.get(4)?,
                    transcription_id: row.get(5)?,
                    error: row.get(6)?,
                    started_at: row.get(7)?,
                    ended_at: row.get(8)?,
                    created_at: row.get(9)?,
                })
            })
            .context("Failed to list consultations")?;

        let mut consultations = Vec::new();
        for row in rows {
            consultations.push(row?);
        }

        Ok(consultations)
    }
}
