pub mod schema;
pub mod writer;
pub mod query;

use anyhow::Result;
use chrono::NaiveDate;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;
use std::path::Path;

use crate::error::AttendanceError;
use crate::models::attendance::AttendanceRecord;
use crate::pipeline::recognize::AttendanceStore;

pub type Pool = r2d2::Pool<SqliteConnectionManager>;

pub fn open_or_create<P: AsRef<Path>>(db_path: P) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    schema::apply_pragmas(&conn)?;
    schema::apply_schema(&conn)?;
    Ok(conn)
}

/// Pooled connections to the attendance database; the schema is applied once
/// before the pool is handed out.
pub fn create_pool<P: AsRef<Path>>(db_path: P, size: u32) -> Result<Pool> {
    drop(open_or_create(db_path.as_ref())?);
    let manager = SqliteConnectionManager::file(db_path.as_ref()).with_init(|c| {
        c.execute_batch("PRAGMA synchronous = NORMAL; PRAGMA busy_timeout = 5000;")
    });
    let pool = r2d2::Pool::builder().max_size(size).build(manager)?;
    Ok(pool)
}

/// SQLite-backed [`AttendanceStore`].
#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, AttendanceError> {
        self.pool
            .get()
            .map_err(|e| AttendanceError::PersistenceFailure(format!("pool error: {}", e)))
    }
}

impl AttendanceStore for SqliteStore {
    fn exists(&self, user_id: i32, date: NaiveDate) -> Result<bool, AttendanceError> {
        let conn = self.conn()?;
        query::attendance_exists(&conn, user_id, date).map_err(|e| AttendanceError::PersistenceFailure(e.to_string()))
    }

    fn insert(&self, record: &AttendanceRecord) -> Result<bool, AttendanceError> {
        let conn = self.conn()?;
        writer::insert_attendance(&conn, record).map_err(|e| AttendanceError::PersistenceFailure(e.to_string()))
    }
}
