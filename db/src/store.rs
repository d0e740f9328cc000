//! Database sessions: one connection, and the SSH tunnel it runs through.

use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::BigInt;
use log::{debug, info, warn};

use crate::config::Config;
use crate::models::{NewDoctrine, NewScripture, NewYearInfo, Scripture};
use crate::schema::{doctrine, scripture_study, year_info};
use crate::table::{Record, Table};
use crate::tunnel::SshTunnel;
use crate::{establish_connection, query_error, DbConnection, DbError};

#[cfg(not(feature = "mysql"))]
define_sql_function! {
    fn last_insert_rowid() -> BigInt;
}

#[cfg(feature = "mysql")]
define_sql_function! {
    #[sql_name = "LAST_INSERT_ID"]
    fn last_insert_rowid() -> BigInt;
}

/// The store operations the dashboard needs from an open connection.
pub trait Session {
    /// Runs read-only SQL, with `LIMIT ?` bound when `limit` is given.
    fn fetch(&mut self, sql: &str, limit: Option<u32>) -> Result<Table, DbError>;

    /// Inserts a `scripture_study` row and returns its generated id.
    fn insert_scripture(&mut self, row: &NewScripture) -> Result<i32, DbError>;

    fn insert_year_info(&mut self, row: &NewYearInfo) -> Result<(), DbError>;

    fn insert_doctrine(&mut self, row: &NewDoctrine) -> Result<(), DbError>;

    /// Overwrites every column of the row with the scripture's id.
    fn update_scripture(&mut self, scripture: &Scripture) -> Result<usize, DbError>;

    fn delete_scriptures(&mut self, ids: &[i32]) -> Result<usize, DbError>;

    /// Opens a transaction, or a savepoint when one is already open.
    fn begin(&mut self) -> Result<(), DbError>;

    fn commit(&mut self) -> Result<(), DbError>;

    fn rollback(&mut self) -> Result<(), DbError>;

    /// Runs `f` in a transaction (or savepoint), committing on `Ok` and rolling
    /// back on `Err`.
    fn transaction<T, F>(&mut self, f: F) -> Result<T, DbError>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, DbError>,
    {
        self.begin()?;
        match f(self) {
            Ok(value) => match self.commit() {
                Ok(()) => Ok(value),
                Err(e) => {
                    if let Err(rollback) = self.rollback() {
                        debug!("Rollback after failed commit: {}", rollback);
                    }
                    Err(e)
                }
            },
            Err(e) => {
                if let Err(rollback) = self.rollback() {
                    warn!("Could not roll back: {}", rollback);
                }
                Err(e)
            }
        }
    }
}

/// Hands out sessions, one per logical operation.
pub trait Provision {
    type Session: Session;

    fn acquire(&self) -> Result<Self::Session, DbError>;
}

/// A live database connection, reached through an SSH tunnel when configured.
pub struct DbSession {
    // Fields drop in declaration order: the connection closes before the tunnel.
    conn: DbConnection,
    tunnel: Option<SshTunnel>,
}

impl DbSession {
    pub fn new(conn: DbConnection, tunnel: Option<SshTunnel>) -> Self {
        DbSession { conn, tunnel }
    }

    pub fn connection(&mut self) -> &mut DbConnection {
        &mut self.conn
    }

    pub fn is_tunnelled(&self) -> bool {
        self.tunnel.is_some()
    }
}

/// Strips trailing whitespace and semicolons, so a `LIMIT` clause can follow.
pub fn trim_statement(sql: &str) -> &str {
    sql.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}

impl Session for DbSession {
    fn fetch(&mut self, sql: &str, limit: Option<u32>) -> Result<Table, DbError> {
        let sql = trim_statement(sql);
        let records: Vec<Record> = match limit.filter(|&n| n > 0) {
            Some(n) => {
                debug!("DB: {} LIMIT {}", sql, n);
                sql_query(format!("{} LIMIT ?", sql))
                    .bind::<BigInt, _>(i64::from(n))
                    .load::<Record>(&mut self.conn)
            }
            None => {
                debug!("DB: {}", sql);
                sql_query(sql).load::<Record>(&mut self.conn)
            }
        }
        .map_err(query_error)?;

        Ok(Table::from_records(records))
    }

    fn insert_scripture(&mut self, row: &NewScripture) -> Result<i32, DbError> {
        diesel::insert_into(scripture_study::table)
            .values(row)
            .execute(&mut self.conn)
            .map_err(query_error)?;

        let id = diesel::select(last_insert_rowid())
            .get_result::<i64>(&mut self.conn)
            .map_err(query_error)?;
        debug!("DB: inserted scripture_study {}", id);

        i32::try_from(id).map_err(|_| DbError::InvalidValue {
            column: "id".to_string(),
            value: id.to_string(),
            expected: "a 32-bit id".to_string(),
        })
    }

    fn insert_year_info(&mut self, row: &NewYearInfo) -> Result<(), DbError> {
        diesel::insert_into(year_info::table)
            .values(row)
            .execute(&mut self.conn)
            .map(|_| ())
            .map_err(query_error)
    }

    fn insert_doctrine(&mut self, row: &NewDoctrine) -> Result<(), DbError> {
        diesel::insert_into(doctrine::table)
            .values(row)
            .execute(&mut self.conn)
            .map(|_| ())
            .map_err(query_error)
    }

    fn update_scripture(&mut self, scripture: &Scripture) -> Result<usize, DbError> {
        use crate::schema::scripture_study::dsl::*;

        diesel::update(scripture_study.filter(id.eq(scripture.id)))
            .set((
                volume.eq(&scripture.volume),
                book.eq(&scripture.book),
                chapter.eq(&scripture.chapter),
                verse.eq(&scripture.verse),
            ))
            .execute(&mut self.conn)
            .map_err(query_error)
    }

    fn delete_scriptures(&mut self, ids: &[i32]) -> Result<usize, DbError> {
        use crate::schema::scripture_study::dsl::*;

        diesel::delete(scripture_study.filter(id.eq_any(ids)))
            .execute(&mut self.conn)
            .map_err(query_error)
    }

    fn begin(&mut self) -> Result<(), DbError> {
        AnsiTransactionManager::begin_transaction(&mut self.conn).map_err(query_error)
    }

    fn commit(&mut self) -> Result<(), DbError> {
        AnsiTransactionManager::commit_transaction(&mut self.conn).map_err(query_error)
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        AnsiTransactionManager::rollback_transaction(&mut self.conn).map_err(query_error)
    }
}

/// Opens a fresh tunnel and connection for every session. There is no pooling.
#[derive(Clone, Debug)]
pub struct Provisioner {
    config: Config,
}

impl Provisioner {
    pub fn new(config: Config) -> Self {
        Provisioner { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Provision for Provisioner {
    type Session = DbSession;

    fn acquire(&self) -> Result<DbSession, DbError> {
        let database = &self.config.database;
        let tunnel = match &self.config.ssh {
            Some(ssh) => Some(SshTunnel::open(ssh, &database.host, database.port)?),
            None => None,
        };

        let url = database.url(tunnel.as_ref().map(SshTunnel::local_port))?;
        let conn = establish_connection(&url)?;
        info!(
            "Connected to {}{}",
            database.name,
            if tunnel.is_some() { " through SSH" } else { "" }
        );

        Ok(DbSession::new(conn, tunnel))
    }
}
