use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

use crate::models::attendance::StoredAttendance;

fn row_to_attendance(row: &Row<'_>) -> rusqlite::Result<StoredAttendance> {
    Ok(StoredAttendance {
        id: row.get("id")?,
        user_id: row.get("user_id")?,
        date: row.get("date")?,
        time: row.get("time")?,
    })
}

pub fn attendance_exists(conn: &Connection, user_id: i32, date: NaiveDate) -> Result<bool> {
    let mut stmt = conn.prepare_cached("SELECT EXISTS(SELECT 1 FROM attendance WHERE user_id = ? AND date = ?)")?;
    let found: bool = stmt.query_row(params![user_id, date], |r| r.get(0))?;
    Ok(found)
}

pub fn count_attendance(conn: &Connection) -> Result<i64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM attendance", [], |r| r.get(0))?;
    Ok(n)
}

/// Records ordered by date then time; `date` narrows to a single day.
pub fn list_attendance(conn: &Connection, date: Option<NaiveDate>) -> Result<Vec<StoredAttendance>> {
    let items = match date {
        Some(d) => {
            let mut stmt = conn.prepare("SELECT * FROM attendance WHERE date = ? ORDER BY time, id")?;
            let rows = stmt.query_map(params![d], row_to_attendance)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
        None => {
            let mut stmt = conn.prepare("SELECT * FROM attendance ORDER BY date, time, id")?;
            let rows = stmt.query_map([], row_to_attendance)?;
            rows.collect::<std::result::Result<Vec<_>, _>>()?
        }
    };
    Ok(items)
}
