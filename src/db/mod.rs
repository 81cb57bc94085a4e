use anyhow::{Context, Result};
use rusqlite::Connection;

pub mod consultations;

pub use consultations::{ConsultationRecord, ConsultationRepository};

pub fn init_db() -> Result<Connection> {
    let db_path = crate::global::db_file()?;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(&db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS consultations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            appointment_id TEXT NOT NULL,
            room_name TEXT NOT NULL,
            status TEXT NOT NULL,
            duration_seconds INTEGER,
            transcription_id TEXT,
            error TEXT,
            started_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
            ended_at TIMESTAMP,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create consultations table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_consultations_started_at \
         ON consultations(started_at DESC)",
        [],
    )
    .context("Failed to create index on started_at")?;

    Ok(())
}
