//! Database migrations
//!
//! Migrations are embedded as SQL strings so the binary carries its own schema.
//! Each [`Migration`] has a SQLite and a MySQL variant; applied versions are
//! recorded in `_migrations`.
//!
//! The `time_entries` schema carries the single-running-timer rule:
//! - SQLite: a unique partial index on `user_id WHERE end_time IS NULL`
//! - MySQL: a unique index on the generated column `running_user_id`, which is
//!   `user_id` while the entry runs and `NULL` afterwards (NULLs never collide)

use anyhow::{Context, Result};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_projects_and_tasks",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                project_id INTEGER NOT NULL,
                title VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_tasks_project_id ON tasks(project_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS projects (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE TABLE IF NOT EXISTS tasks (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                project_id BIGINT NOT NULL,
                title VARCHAR(255) NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (project_id) REFERENCES projects(id) ON DELETE CASCADE
            );
            CREATE INDEX idx_tasks_project_id ON tasks(project_id);
        "#,
    },
    Migration {
        version: 2,
        name: "create_time_entries",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS time_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                task_id INTEGER NOT NULL,
                description TEXT,
                start_time TIMESTAMP NOT NULL,
                end_time TIMESTAMP,
                duration INTEGER,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL,
                CHECK (end_time IS NULL OR end_time >= start_time),
                CHECK (duration IS NULL OR duration >= 0)
            );
            CREATE INDEX IF NOT EXISTS idx_time_entries_user_start ON time_entries(user_id, start_time);
            CREATE INDEX IF NOT EXISTS idx_time_entries_task_id ON time_entries(task_id);
            CREATE UNIQUE INDEX IF NOT EXISTS uniq_time_entries_running
                ON time_entries(user_id) WHERE end_time IS NULL;
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS time_entries (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                user_id BIGINT NOT NULL,
                task_id BIGINT NOT NULL,
                description TEXT,
                start_time TIMESTAMP NOT NULL,
                end_time TIMESTAMP NULL DEFAULT NULL,
                duration BIGINT NULL,
                running_user_id BIGINT AS (CASE WHEN end_time IS NULL THEN user_id ELSE NULL END) STORED,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                CONSTRAINT chk_time_entries_range CHECK (end_time IS NULL OR end_time >= start_time),
                CONSTRAINT chk_time_entries_duration CHECK (duration IS NULL OR duration >= 0)
            );
            CREATE INDEX idx_time_entries_user_start ON time_entries(user_id, start_time);
            CREATE INDEX idx_time_entries_task_id ON time_entries(task_id);
            CREATE UNIQUE INDEX uniq_time_entries_running ON time_entries(running_user_id);
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = applied_versions(pool).await?;
    let mut count = 0;

    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        tracing::info!(
            "Applying migration {}: {}",
            migration.version,
            migration.name
        );
        apply_migration(pool, migration)
            .await
            .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
        count += 1;
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn applied_versions(pool: &DynDatabasePool) -> Result<Vec<i32>> {
    const SQL: &str = "SELECT version FROM _migrations ORDER BY version";

    let versions: Vec<i64> = match pool.driver() {
        DatabaseDriver::Sqlite => {
            let sqlite = pool.as_sqlite().context("SQLite pool expected")?;
            sqlx::query_scalar(SQL).fetch_all(sqlite).await?
        }
        DatabaseDriver::Mysql => {
            let mysql = pool.as_mysql().context("MySQL pool expected")?;
            sqlx::query_scalar::<_, i32>(SQL)
                .fetch_all(mysql)
                .await?
                .into_iter()
                .map(i64::from)
                .collect()
        }
    };

    Ok(versions.into_iter().map(|v| v as i32).collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    for statement in split_sql_statements(sql) {
        pool.execute(statement)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    // name is a compile-time constant, safe to inline
    pool.execute(&format!(
        "INSERT INTO _migrations (version, name) VALUES ({}, '{}')",
        migration.version, migration.name
    ))
    .await?;

    Ok(())
}

fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    create_migrations_table(pool).await?;
    let applied = applied_versions(pool).await?;
    Ok(MIGRATIONS.iter().all(|m| applied.contains(&m.version)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    #[tokio::test]
    async fn test_run_migrations() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, MIGRATIONS.len());

        // Running again should apply 0 migrations
        let count = run_migrations(&pool).await.expect("Failed to run migrations");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_is_up_to_date() {
        let pool = create_test_pool().await.expect("Failed to create test pool");

        assert!(!is_up_to_date(&pool).await.expect("Failed to check"));
        run_migrations(&pool).await.expect("Failed to run migrations");
        assert!(is_up_to_date(&pool).await.expect("Failed to check"));
    }

    #[tokio::test]
    async fn test_running_entry_index_is_unique_per_user() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");
        let sqlite = pool.as_sqlite().unwrap();

        let insert = "INSERT INTO time_entries (user_id, task_id, start_time, end_time, duration, created_at, updated_at) \
                      VALUES (?, 1, '2024-01-01T09:00:00+00:00', ?, ?, '2024-01-01T09:00:00+00:00', '2024-01-01T09:00:00+00:00')";

        // Any number of stopped entries
        for _ in 0..2 {
            sqlx::query(insert)
                .bind(7i64)
                .bind(Some("2024-01-01T10:00:00+00:00"))
                .bind(Some(60i64))
                .execute(sqlite)
                .await
                .expect("Stopped entries never collide");
        }

        // One running entry
        sqlx::query(insert)
            .bind(7i64)
            .bind(None::<&str>)
            .bind(None::<i64>)
            .execute(sqlite)
            .await
            .expect("First running entry should insert");

        // A second running entry for the same user is rejected
        let err = sqlx::query(insert)
            .bind(7i64)
            .bind(None::<&str>)
            .bind(None::<i64>)
            .execute(sqlite)
            .await
            .expect_err("Second running entry must be rejected");
        match err {
            sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
            other => panic!("unexpected error: {other}"),
        }

        // Another user is unaffected
        sqlx::query(insert)
            .bind(8i64)
            .bind(None::<&str>)
            .bind(None::<i64>)
            .execute(sqlite)
            .await
            .expect("Other users can run their own timer");
    }

    #[tokio::test]
    async fn test_end_before_start_rejected() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        run_migrations(&pool).await.expect("Failed to run migrations");

        let result = pool
            .execute(
                "INSERT INTO time_entries (user_id, task_id, start_time, end_time, duration, created_at, updated_at) \
                 VALUES (1, 1, '2024-01-01T10:00:00+00:00', '2024-01-01T09:00:00+00:00', 0, \
                 '2024-01-01T10:00:00+00:00', '2024-01-01T10:00:00+00:00')",
            )
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_split_sql_statements() {
        let sql = "CREATE TABLE a (id INT); CREATE TABLE b (id INT);";
        assert_eq!(split_sql_statements(sql).len(), 2);

        let sql_with_comments = "-- Comment\nCREATE TABLE a (id INT);\n-- trailing";
        assert_eq!(split_sql_statements(sql_with_comments).len(), 1);
    }

    #[test]
    fn test_every_migration_splits_into_statements() {
        for migration in MIGRATIONS {
            assert!(!split_sql_statements(migration.up_sqlite).is_empty());
            assert_eq!(
                split_sql_statements(migration.up_sqlite).len(),
                split_sql_statements(migration.up_mysql).len(),
                "migration {} differs between backends",
                migration.name
            );
        }
    }

    #[test]
    fn test_is_comment_only() {
        assert!(is_comment_only("-- This is a comment"));
        assert!(is_comment_only("-- Line 1\n-- Line 2"));
        assert!(!is_comment_only("CREATE TABLE test"));
        assert!(!is_comment_only("-- Comment\nCREATE TABLE test"));
    }
}
