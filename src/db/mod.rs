//! Database layer
//!
//! Time entries are stored in either:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for shared deployments)
//!
//! The driver is selected by `database.driver` in the configuration. Services
//! only see the `DatabasePool` trait and the repository traits.
//!
//! # Usage
//!
//! ```ignore
//! use timetrack::config::DatabaseConfig;
//! use timetrack::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
