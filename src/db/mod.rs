//! Database layer
//!
//! This module provides database abstraction for Tradepost.
//! It supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL (for larger deployments)
//!
//! The database driver is selected based on configuration.
//!
//! # Architecture
//!
//! The `DatabasePool` trait hides the concrete backend. Repositories use the
//! [`with_pool!`] macro to run one query body against whichever sqlx pool is
//! active, so each query is written once and mapped through `sqlx::FromRow`.
//!
//! # Usage
//!
//! ```ignore
//! use tradepost::config::DatabaseConfig;
//! use tradepost::db::{create_pool, migrations};
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

use sqlx::mysql::MySqlQueryResult;
use sqlx::sqlite::SqliteQueryResult;

/// Run `$body` with `$pool` bound to the concrete sqlx pool of `$db`.
///
/// The body is expanded once per driver, so it may only use APIs that are
/// generic over the database (binds, `FromRow` mappings, transactions).
/// A pool that cannot be downcast becomes an `anyhow` error.
#[macro_export]
macro_rules! with_pool {
    ($db:expr, |$pool:ident| $body:expr) => {{
        use anyhow::Context as _;
        match $db.driver() {
            $crate::config::DatabaseDriver::Sqlite => {
                let $pool = $db.as_sqlite().context("SQLite pool is not available")?;
                $body
            }
            $crate::config::DatabaseDriver::Mysql => {
                let $pool = $db.as_mysql().context("MySQL pool is not available")?;
                $body
            }
        }
    }};
}

/// Uniform access to the generated key of an INSERT.
pub trait InsertedId {
    fn inserted_id(&self) -> i64;
}

impl InsertedId for SqliteQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_rowid()
    }
}

impl InsertedId for MySqlQueryResult {
    fn inserted_id(&self) -> i64 {
        self.last_insert_id() as i64
    }
}

/// Escape `%` and `_` so user search input is matched literally.
///
/// Pair with `LIKE ? ESCAPE '!'`; a backslash escape is not portable to MySQL
/// string literals.
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('!', "!!")
        .replace('%', "!%")
        .replace('_', "!_");
    format!("%{}%", escaped)
}
