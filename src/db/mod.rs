pub mod deleted_index;
pub mod kinds;
pub mod records;
pub mod soft_delete;
pub mod timeline;
pub mod users;

use crate::errors::{AppError, AppResult};
use crate::models::{DeletedObject, EntityKind, TimelineDraft, TimelineEntry};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Transaction};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

const SCHEMA_SQL: &str = include_str!("schema.sql");

#[derive(Debug)]
pub struct Database {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl Database {
    pub fn new(path: &Path) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| AppError::Io(err.to_string()))?;
        }
        let conn = Connection::open(path).map_err(AppError::from)?;
        conn.execute_batch(SCHEMA_SQL).map_err(AppError::from)?;

        tracing::debug!(path = %path.to_string_lossy(), "database schema ready");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> AppResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("database mutex poisoned".to_string()))
    }

    /// Runs read-only work against the shared connection.
    pub fn read<T>(&self, work: impl FnOnce(&Connection) -> AppResult<T>) -> AppResult<T> {
        let conn = self.lock()?;
        work(&conn)
    }

    /// Runs `work` in one transaction; any error rolls every statement back.
    pub fn transaction<T>(&self, work: impl FnOnce(&Transaction<'_>) -> AppResult<T>) -> AppResult<T> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let value = work(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn soft_delete(&self, kind: EntityKind, id: &str) -> AppResult<()> {
        self.transaction(|tx| soft_delete::soft_delete(tx, kind, id))
    }

    pub fn restore(&self, kind: &str, id: &str) -> AppResult<EntityKind> {
        self.transaction(|tx| soft_delete::restore(tx, kind, id))
    }

    pub fn list_deleted(&self, company_id: &str) -> AppResult<Vec<DeletedObject>> {
        self.read(|conn| deleted_index::list_deleted(conn, company_id))
    }

    pub fn record_timeline(&self, draft: &TimelineDraft) -> AppResult<TimelineEntry> {
        self.transaction(|tx| timeline::insert_timeline(tx, draft))
    }

    pub fn list_timeline(&self, company_id: &str) -> AppResult<Vec<TimelineEntry>> {
        self.read(|conn| timeline::list_timeline(conn, company_id))
    }
}

/// Fixed-width RFC 3339 so that text ordering in SQL matches time ordering.
pub(crate) fn format_time(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now() -> String {
    format_time(Utc::now())
}

pub(crate) fn parse_time(raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
            )
        })
}

pub(crate) fn parse_optional_time(raw: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    raw.map(|raw| parse_time(&raw)).transpose()
}

pub(crate) fn parse_kind(raw: &str) -> rusqlite::Result<EntityKind> {
    raw.parse::<EntityKind>().map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, error.to_string())),
        )
    })
}
