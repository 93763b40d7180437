use anyhow::Result;
use rusqlite::{params, Connection};

use crate::models::attendance::AttendanceRecord;

/// Conditional insert backed by the UNIQUE(user_id, date) constraint.
/// Returns `false` when a record for that user and day already exists.
pub fn insert_attendance(conn: &Connection, record: &AttendanceRecord) -> Result<bool> {
    let n = conn.execute(
        "INSERT OR IGNORE INTO attendance (user_id, date, time) VALUES (?, ?, ?)",
        params![record.user_id, record.date, record.time],
    )?;
    Ok(n == 1)
}
