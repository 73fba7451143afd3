//! Time entry repository
//!
//! Database operations for time entries.
//!
//! This module provides:
//! - `TimeEntryRepository` trait defining the interface for time entry access
//! - `SqlxTimeEntryRepository` implementing the trait for SQLite and MySQL
//!
//! The single-running-timer rule lives in the schema (see `migrations`):
//! `create_running` reports a unique violation as `Ok(None)` instead of an
//! error, and `close` only touches rows that are still running.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{NewTimeEntry, TaskRef, TimeEntry, TimeEntryFilter, TrackedEntry};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Time entry repository trait
#[async_trait]
pub trait TimeEntryRepository: Send + Sync {
    /// Insert a running entry.
    ///
    /// Returns `None` when the user already has a running entry.
    async fn create_running(&self, entry: &NewTimeEntry) -> Result<Option<TimeEntry>>;

    /// Insert an entry that already has an end time and duration
    async fn create_closed(&self, entry: &NewTimeEntry) -> Result<TimeEntry>;

    /// Get entry by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<TimeEntry>>;

    /// Get the user's running entry, if any
    async fn find_running(&self, user_id: i64) -> Result<Option<TimeEntry>>;

    /// Stop a running entry.
    ///
    /// Returns `false` if the entry is missing, owned by someone else or
    /// already stopped.
    async fn close(
        &self,
        id: i64,
        user_id: i64,
        end_time: DateTime<Utc>,
        duration: i64,
    ) -> Result<bool>;

    /// Write back the editable fields of an entry.
    ///
    /// Only applies if the stored entry is still in the same running/stopped
    /// state as `entry`; returns `false` otherwise.
    async fn update(&self, entry: &TimeEntry) -> Result<bool>;

    /// Delete an entry owned by `user_id`
    async fn delete(&self, id: i64, user_id: i64) -> Result<bool>;

    /// List the user's entries, newest first
    async fn list_by_user(&self, user_id: i64, filter: &TimeEntryFilter) -> Result<Vec<TimeEntry>>;

    /// Entries starting in `[from, to)` joined with their task and project,
    /// ordered by start time then id
    async fn list_in_range(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TrackedEntry>>;
}

/// SQLx-based time entry repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxTimeEntryRepository {
    pool: DynDatabasePool,
}

impl SqlxTimeEntryRepository {
    /// Create a new SQLx time entry repository
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TimeEntryRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        self.pool.as_sqlite().context("SQLite pool expected")
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        self.pool.as_mysql().context("MySQL pool expected")
    }
}

const ENTRY_COLUMNS: &str =
    "id, user_id, task_id, description, start_time, end_time, duration, created_at, updated_at";

const INSERT_SQL: &str = r#"
    INSERT INTO time_entries
        (user_id, task_id, description, start_time, end_time, duration, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, ?, ?)
"#;

const CLOSE_SQL: &str = r#"
    UPDATE time_entries
    SET end_time = ?, duration = ?, updated_at = ?
    WHERE id = ? AND user_id = ? AND end_time IS NULL
"#;

const UPDATE_SQL: &str = r#"
    UPDATE time_entries
    SET description = ?, start_time = ?, end_time = ?, duration = ?, updated_at = ?
    WHERE id = ? AND user_id = ? AND (end_time IS NULL) = ?
"#;

const RANGE_SQL: &str = r#"
    SELECT te.id, te.user_id, te.task_id, te.description, te.start_time, te.end_time,
           te.duration, te.created_at, te.updated_at,
           t.title AS task_title, p.id AS project_id, p.name AS project_name
    FROM time_entries te
    INNER JOIN tasks t ON t.id = te.task_id
    INNER JOIN projects p ON p.id = t.project_id
    WHERE te.user_id = ? AND te.start_time >= ? AND te.start_time < ?
    ORDER BY te.start_time ASC, te.id ASC
"#;

fn select_by_id_sql() -> String {
    format!("SELECT {} FROM time_entries WHERE id = ?", ENTRY_COLUMNS)
}

fn select_running_sql() -> String {
    format!(
        "SELECT {} FROM time_entries WHERE user_id = ? AND end_time IS NULL",
        ENTRY_COLUMNS
    )
}

/// Build the listing query; binds follow the order
/// `user_id, task_id?, from?, to?, limit, offset`
fn list_sql(filter: &TimeEntryFilter) -> String {
    let mut sql = format!("SELECT {} FROM time_entries WHERE user_id = ?", ENTRY_COLUMNS);
    if filter.task_id.is_some() {
        sql.push_str(" AND task_id = ?");
    }
    if filter.from.is_some() {
        sql.push_str(" AND start_time >= ?");
    }
    if filter.to.is_some() {
        sql.push_str(" AND start_time < ?");
    }
    sql.push_str(" ORDER BY start_time DESC, id DESC LIMIT ? OFFSET ?");
    sql
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn inserted(entry: &NewTimeEntry, id: i64) -> TimeEntry {
    TimeEntry {
        id,
        user_id: entry.user_id,
        task_id: entry.task_id,
        description: entry.description.clone(),
        start_time: entry.start_time,
        end_time: entry.end_time,
        duration: entry.duration,
        created_at: entry.recorded_at,
        updated_at: entry.recorded_at,
    }
}

#[async_trait]
impl TimeEntryRepository for SqlxTimeEntryRepository {
    async fn create_running(&self, entry: &NewTimeEntry) -> Result<Option<TimeEntry>> {
        let result = match self.pool.driver() {
            DatabaseDriver::Sqlite => insert_sqlite(self.sqlite()?, entry).await,
            DatabaseDriver::Mysql => insert_mysql(self.mysql()?, entry).await,
        };

        match result {
            Ok(id) => Ok(Some(inserted(entry, id))),
            Err(e) if is_unique_violation(&e) => Ok(None),
            Err(e) => Err(anyhow::Error::new(e).context("Failed to create running time entry")),
        }
    }

    async fn create_closed(&self, entry: &NewTimeEntry) -> Result<TimeEntry> {
        let id = match self.pool.driver() {
            DatabaseDriver::Sqlite => insert_sqlite(self.sqlite()?, entry).await,
            DatabaseDriver::Mysql => insert_mysql(self.mysql()?, entry).await,
        }
        .context("Failed to create time entry")?;

        Ok(inserted(entry, id))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TimeEntry>> {
        let sql = select_by_id_sql();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.sqlite()?)
                    .await
                    .context("Failed to get time entry by ID")?;
                row.map(|r| row_to_entry_sqlite(&r)).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.mysql()?)
                    .await
                    .context("Failed to get time entry by ID")?;
                row.map(|r| row_to_entry_mysql(&r)).transpose()
            }
        }
    }

    async fn find_running(&self, user_id: i64) -> Result<Option<TimeEntry>> {
        let sql = select_running_sql();
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_optional(self.sqlite()?)
                    .await
                    .context("Failed to get running time entry")?;
                row.map(|r| row_to_entry_sqlite(&r)).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_optional(self.mysql()?)
                    .await
                    .context("Failed to get running time entry")?;
                row.map(|r| row_to_entry_mysql(&r)).transpose()
            }
        }
    }

    async fn close(
        &self,
        id: i64,
        user_id: i64,
        end_time: DateTime<Utc>,
        duration: i64,
    ) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(CLOSE_SQL)
                .bind(end_time)
                .bind(duration)
                .bind(end_time)
                .bind(id)
                .bind(user_id)
                .execute(self.sqlite()?)
                .await
                .context("Failed to stop time entry")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(CLOSE_SQL)
                .bind(end_time)
                .bind(duration)
                .bind(end_time)
                .bind(id)
                .bind(user_id)
                .execute(self.mysql()?)
                .await
                .context("Failed to stop time entry")?
                .rows_affected(),
        };

        Ok(affected > 0)
    }

    async fn update(&self, entry: &TimeEntry) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(UPDATE_SQL)
                .bind(&entry.description)
                .bind(entry.start_time)
                .bind(entry.end_time)
                .bind(entry.duration)
                .bind(entry.updated_at)
                .bind(entry.id)
                .bind(entry.user_id)
                .bind(entry.is_running())
                .execute(self.sqlite()?)
                .await
                .context("Failed to update time entry")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(UPDATE_SQL)
                .bind(&entry.description)
                .bind(entry.start_time)
                .bind(entry.end_time)
                .bind(entry.duration)
                .bind(entry.updated_at)
                .bind(entry.id)
                .bind(entry.user_id)
                .bind(entry.is_running())
                .execute(self.mysql()?)
                .await
                .context("Failed to update time entry")?
                .rows_affected(),
        };

        Ok(affected > 0)
    }

    async fn delete(&self, id: i64, user_id: i64) -> Result<bool> {
        let sql = "DELETE FROM time_entries WHERE id = ? AND user_id = ?";
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.sqlite()?)
                .await
                .context("Failed to delete time entry")?
                .rows_affected(),
            DatabaseDriver::Mysql => sqlx::query(sql)
                .bind(id)
                .bind(user_id)
                .execute(self.mysql()?)
                .await
                .context("Failed to delete time entry")?
                .rows_affected(),
        };

        Ok(affected > 0)
    }

    async fn list_by_user(&self, user_id: i64, filter: &TimeEntryFilter) -> Result<Vec<TimeEntry>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => list_by_user_sqlite(self.sqlite()?, user_id, filter).await,
            DatabaseDriver::Mysql => list_by_user_mysql(self.mysql()?, user_id, filter).await,
        }
    }

    async fn list_in_range(
        &self,
        user_id: i64,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TrackedEntry>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(RANGE_SQL)
                    .bind(user_id)
                    .bind(from)
                    .bind(to)
                    .fetch_all(self.sqlite()?)
                    .await
                    .context("Failed to list time entries in range")?;
                rows.iter()
                    .map(|row| -> Result<TrackedEntry> {
                        Ok(TrackedEntry {
                            entry: row_to_entry_sqlite(row)?,
                            task: TaskRef {
                                task_id: row.try_get("task_id")?,
                                task_title: row.try_get("task_title")?,
                                project_id: row.try_get("project_id")?,
                                project_name: row.try_get("project_name")?,
                            },
                        })
                    })
                    .collect()
            }
            DatabaseDriver::Mysql => {
                let rows = sqlx::query(RANGE_SQL)
                    .bind(user_id)
                    .bind(from)
                    .bind(to)
                    .fetch_all(self.mysql()?)
                    .await
                    .context("Failed to list time entries in range")?;
                rows.iter()
                    .map(|row| -> Result<TrackedEntry> {
                        Ok(TrackedEntry {
                            entry: row_to_entry_mysql(row)?,
                            task: TaskRef {
                                task_id: row.try_get("task_id")?,
                                task_title: row.try_get("task_title")?,
                                project_id: row.try_get("project_id")?,
                                project_name: row.try_get("project_name")?,
                            },
                        })
                    })
                    .collect()
            }
        }
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn insert_sqlite(pool: &SqlitePool, entry: &NewTimeEntry) -> sqlx::Result<i64> {
    let result = sqlx::query(INSERT_SQL)
        .bind(entry.user_id)
        .bind(entry.task_id)
        .bind(&entry.description)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(entry.duration)
        .bind(entry.recorded_at)
        .bind(entry.recorded_at)
        .execute(pool)
        .await?;
    Ok(result.last_insert_rowid())
}

async fn list_by_user_sqlite(
    pool: &SqlitePool,
    user_id: i64,
    filter: &TimeEntryFilter,
) -> Result<Vec<TimeEntry>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql).bind(user_id);
    if let Some(task_id) = filter.task_id {
        query = query.bind(task_id);
    }
    if let Some(from) = filter.from {
        query = query.bind(from);
    }
    if let Some(to) = filter.to {
        query = query.bind(to);
    }

    let offset = filter.offset().context("Page offset out of range")?;
    let rows = query
        .bind(filter.per_page)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list time entries")?;

    rows.iter().map(row_to_entry_sqlite).collect()
}

fn row_to_entry_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<TimeEntry> {
    Ok(TimeEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        task_id: row.try_get("task_id")?,
        description: row.try_get("description")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        duration: row.try_get("duration")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn insert_mysql(pool: &MySqlPool, entry: &NewTimeEntry) -> sqlx::Result<i64> {
    let result = sqlx::query(INSERT_SQL)
        .bind(entry.user_id)
        .bind(entry.task_id)
        .bind(&entry.description)
        .bind(entry.start_time)
        .bind(entry.end_time)
        .bind(entry.duration)
        .bind(entry.recorded_at)
        .bind(entry.recorded_at)
        .execute(pool)
        .await?;
    Ok(result.last_insert_id() as i64)
}

async fn list_by_user_mysql(
    pool: &MySqlPool,
    user_id: i64,
    filter: &TimeEntryFilter,
) -> Result<Vec<TimeEntry>> {
    let sql = list_sql(filter);
    let mut query = sqlx::query(&sql).bind(user_id);
    if let Some(task_id) = filter.task_id {
        query = query.bind(task_id);
    }
    if let Some(from) = filter.from {
        query = query.bind(from);
    }
    if let Some(to) = filter.to {
        query = query.bind(to);
    }

    let offset = filter.offset().context("Page offset out of range")?;
    let rows = query
        .bind(filter.per_page)
        .bind(offset)
        .fetch_all(pool)
        .await
        .context("Failed to list time entries")?;

    rows.iter().map(row_to_entry_mysql).collect()
}

fn row_to_entry_mysql(row: &sqlx::mysql::MySqlRow) -> Result<TimeEntry> {
    Ok(TimeEntry {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        task_id: row.try_get("task_id")?,
        description: row.try_get("description")?,
        start_time: row.try_get("start_time")?,
        end_time: row.try_get("end_time")?,
        duration: row.try_get("duration")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
