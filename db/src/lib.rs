#![allow(proc_macro_derive_resolution_fallback)]

#[macro_use]
extern crate diesel;

#[cfg(not(feature = "mysql"))]
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;

/// Connection type for the configured database backend.
#[cfg(not(feature = "mysql"))]
pub type DbConnection = SqliteConnection;

/// Connection type for the configured database backend.
#[cfg(feature = "mysql")]
pub type DbConnection = MysqlConnection;

/// Schema migrations compiled into the crate.
#[cfg(not(feature = "mysql"))]
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Schema migrations compiled into the crate.
#[cfg(feature = "mysql")]
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations_mysql");

#[derive(Clone, Error, Debug)]
pub enum DbError {
    #[error("Could not connect to the database. Root cause: {}.", cause)]
    Connection { cause: String },

    #[error("Could not open the SSH tunnel. Root cause: {}.", cause)]
    Tunnel { cause: String },

    #[error("Query execution failed. Root cause: {}.", cause)]
    Query { cause: String },

    #[error("There was a database migration error. Root cause: {:?}.", cause)]
    Migration { cause: String },

    #[error("Invalid configuration: {}.", cause)]
    Config { cause: String },

    #[error("'{}' is not a known query.", name)]
    UnknownQuery { name: String },

    #[error("'{}' is not a valid age. Expected BC or AD.", age)]
    InvalidAge { age: String },

    #[error("'{}' is not a valid year.", year)]
    InvalidYear { year: String },

    #[error("Invalid entry: {}.", reason)]
    InvalidEntry { reason: String },

    #[error("The result is missing the '{}' column.", column)]
    MissingColumn { column: String },

    #[error("Column '{}' holds '{}', which is not {}.", column, value, expected)]
    InvalidValue {
        column: String,
        value: String,
        expected: String,
    },

    #[error("'{}' is not a valid scripture reference.", reference)]
    InvalidReference { reference: String },
}

impl DbError {
    /// Whether the failure happened before any statement ran.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, DbError::Connection { .. } | DbError::Tunnel { .. })
    }
}

/// Maps a Diesel query error into a [DbError](crate::DbError).
pub(crate) fn query_error(e: diesel::result::Error) -> DbError {
    DbError::Query {
        cause: e.to_string(),
    }
}

/// Establishes a non-pooled database connection.
pub fn establish_connection(db_url: &str) -> Result<DbConnection, DbError> {
    #[allow(unused_mut)]
    let mut conn = DbConnection::establish(db_url).map_err(|e| DbError::Connection {
        cause: e.to_string(),
    })?;

    #[cfg(not(feature = "mysql"))]
    conn.batch_execute("PRAGMA foreign_keys = ON")
        .map_err(|e| DbError::Connection {
            cause: e.to_string(),
        })?;

    Ok(conn)
}

/// Run any pending Diesel migrations.
pub fn run_migrations(conn: &mut DbConnection) -> Result<usize, DbError> {
    conn.run_pending_migrations(MIGRATIONS)
        .map(|applied| applied.len())
        .map_err(|e| DbError::Migration {
            cause: e.to_string(),
        })
}

pub mod analysis;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod dashboard;
pub mod models;
pub mod reconcile;
mod schema;
pub mod store;
pub mod table;
#[cfg(test)]
mod testing;
pub mod tunnel;

pub use cache::{CacheKey, Loader, QueryCache};
pub use config::Config;
pub use dashboard::{ChildOutcome, Dashboard, InsertOutcome, QueryOutcome};
pub use reconcile::{DeleteOutcome, EditSession, SaveOutcome};
pub use store::{DbSession, Provision, Provisioner, Session};
pub use table::{Cell, Digest, Table};
