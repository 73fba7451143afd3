//! Task repository
//!
//! Resolves task ids to their owning project. Projects and tasks belong to
//! the surrounding project-management system; this store only reads them,
//! plus the two inserts needed to seed a database.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::TaskRef;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

/// Task repository trait
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Resolve a task to its title and owning project
    async fn resolve(&self, task_id: i64) -> Result<Option<TaskRef>>;

    /// Create a project, returning its ID
    async fn create_project(&self, name: &str) -> Result<i64>;

    /// Create a task under a project, returning its ID
    async fn create_task(&self, project_id: i64, title: &str) -> Result<i64>;
}

/// SQLx-based task repository implementation
pub struct SqlxTaskRepository {
    pool: DynDatabasePool,
}

impl SqlxTaskRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TaskRepository> {
        Arc::new(Self::new(pool))
    }

    fn sqlite(&self) -> Result<&SqlitePool> {
        self.pool.as_sqlite().context("SQLite pool expected")
    }

    fn mysql(&self) -> Result<&MySqlPool> {
        self.pool.as_mysql().context("MySQL pool expected")
    }
}

const RESOLVE_SQL: &str = r#"
    SELECT t.id AS task_id, t.title AS task_title, p.id AS project_id, p.name AS project_name
    FROM tasks t
    INNER JOIN projects p ON p.id = t.project_id
    WHERE t.id = ?
"#;

#[async_trait]
impl TaskRepository for SqlxTaskRepository {
    async fn resolve(&self, task_id: i64) -> Result<Option<TaskRef>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(RESOLVE_SQL)
                    .bind(task_id)
                    .fetch_optional(self.sqlite()?)
                    .await
                    .context("Failed to resolve task")?;
                row.as_ref().map(row_to_task_sqlite).transpose()
            }
            DatabaseDriver::Mysql => {
                let row = sqlx::query(RESOLVE_SQL)
                    .bind(task_id)
                    .fetch_optional(self.mysql()?)
                    .await
                    .context("Failed to resolve task")?;
                row.as_ref().map(row_to_task_mysql).transpose()
            }
        }
    }

    async fn create_project(&self, name: &str) -> Result<i64> {
        let sql = "INSERT INTO projects (name) VALUES (?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let result = sqlx::query(sql)
                    .bind(name)
                    .execute(self.sqlite()?)
                    .await
                    .context("Failed to create project")?;
                Ok(result.last_insert_rowid())
            }
            DatabaseDriver::Mysql => {
                let result = sqlx::query(sql)
                    .bind(name)
                    .execute(self.mysql()?)
                    .await
                    .context("Failed to create project")?;
                Ok(result.last_insert_id() as i64)
            }
        }
    }

    async fn create_task(&self, project_id: i64, title: &str) -> Result<i64> {
        let sql = "INSERT INTO tasks (project_id, title) VALUES (?, ?)";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let result = sqlx::query(sql)
                    .bind(project_id)
                    .bind(title)
                    .execute(self.sqlite()?)
                    .await
                    .context("Failed to create task")?;
                Ok(result.last_insert_rowid())
            }
            DatabaseDriver::Mysql => {
                let result = sqlx::query(sql)
                    .bind(project_id)
                    .bind(title)
                    .execute(self.mysql()?)
                    .await
                    .context("Failed to create task")?;
                Ok(result.last_insert_id() as i64)
            }
        }
    }
}

fn row_to_task_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<TaskRef> {
    Ok(TaskRef {
        task_id: row.try_get("task_id")?,
        task_title: row.try_get("task_title")?,
        project_id: row.try_get("project_id")?,
        project_name: row.try_get("project_name")?,
    })
}

fn row_to_task_mysql(row: &sqlx::mysql::MySqlRow) -> Result<TaskRef> {
    Ok(TaskRef {
        task_id: row.try_get("task_id")?,
        task_title: row.try_get("task_title")?,
        project_id: row.try_get("project_id")?,
        project_name: row.try_get("project_name")?,
    })
}
