//! The dashboard's operations: cached reads, the query explorer and row mutations.

use std::collections::BTreeSet;
use std::sync::Arc;

use log::{info, warn};
use serde_derive::Serialize;

use crate::cache::{CacheKey, Loader, QueryCache};
use crate::catalog;
use crate::models::{ChartPoint, EntryForm, Scripture, TimelineEntry};
use crate::store::{trim_statement, Provision, Session};
use crate::table::Table;
use crate::DbError;

/// Result of a catalog query.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct QueryOutcome {
    pub name: String,
    pub table: Table,
    pub row_count: usize,
}

/// What happened to one of the optional child rows of an insert.
#[derive(Clone, Debug)]
pub enum ChildOutcome {
    Inserted,
    /// Nothing was given for this child.
    Skipped,
    /// The child was not written. The parent row was kept regardless.
    Failed(DbError),
}

impl ChildOutcome {
    pub fn is_inserted(&self) -> bool {
        matches!(self, ChildOutcome::Inserted)
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, ChildOutcome::Skipped)
    }

    pub fn error(&self) -> Option<&DbError> {
        match self {
            ChildOutcome::Failed(e) => Some(e),
            _ => None,
        }
    }

    fn from_result(result: Result<(), DbError>) -> Self {
        match result {
            Ok(()) => ChildOutcome::Inserted,
            Err(e) => ChildOutcome::Failed(e),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InsertOutcome {
    pub scripture_id: i32,
    pub year_info: ChildOutcome,
    pub doctrine: ChildOutcome,
}

pub struct Dashboard<P> {
    provisioner: P,
    cache: Arc<QueryCache>,
}

impl<P: Provision> Dashboard<P> {
    /// A dashboard with a cache of its own.
    pub fn new(provisioner: P) -> Self {
        Dashboard::with_cache(provisioner, Arc::new(QueryCache::new()))
    }

    /// A dashboard sharing `cache`, e.g. [QueryCache::shared](crate::cache::QueryCache::shared).
    pub fn with_cache(provisioner: P, cache: Arc<QueryCache>) -> Self {
        Dashboard { provisioner, cache }
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn provisioner(&self) -> &P {
        &self.provisioner
    }

    /// Runs `sql` with an optional row limit. A limit of zero means no limit.
    ///
    /// Repeated column names are disambiguated. Results are cached per
    /// statement and limit until the next write.
    pub fn run(&self, sql: &str, limit: Option<u32>) -> Result<Table, DbError> {
        let limit = limit.filter(|&n| n > 0);
        let key = CacheKey::Query {
            sql: trim_statement(sql).to_string(),
            limit,
        };

        self.cache.get_or_try_insert_with(key, || {
            let mut session = self.provisioner.acquire()?;
            Ok(session.fetch(sql, limit)?.dedupe_columns())
        })
    }

    /// Runs a query of the [catalog](crate::catalog) by name.
    pub fn run_query(&self, name: &str, limit: Option<u32>) -> Result<QueryOutcome, DbError> {
        let query = catalog::find(name).ok_or_else(|| DbError::UnknownQuery {
            name: name.to_string(),
        })?;

        let table = self.run(query.sql, limit)?;
        info!("Query '{}' returned {} rows", query.name, table.len());

        Ok(QueryOutcome {
            name: query.name.to_string(),
            row_count: table.len(),
            table,
        })
    }

    pub fn load_timeline(&self) -> Result<Table, DbError> {
        self.load(Loader::Timeline)
    }

    pub fn load_scriptures(&self) -> Result<Table, DbError> {
        self.load(Loader::Scriptures)
    }

    pub fn load_chart_data(&self) -> Result<Table, DbError> {
        self.load(Loader::ChartData)
    }

    pub fn timeline(&self) -> Result<Vec<TimelineEntry>, DbError> {
        TimelineEntry::from_table(&self.load_timeline()?)
    }

    pub fn scriptures(&self) -> Result<Vec<Scripture>, DbError> {
        Scripture::from_table(&self.load_scriptures()?)
    }

    pub fn chart_points(&self) -> Result<Vec<ChartPoint>, DbError> {
        ChartPoint::from_table(&self.load_chart_data()?)
    }

    fn load(&self, loader: Loader) -> Result<Table, DbError> {
        self.cache
            .get_or_try_insert_with(CacheKey::Loader(loader), || {
                let mut session = self.provisioner.acquire()?;
                Ok(session.fetch(loader.sql(), None)?.or_columns(loader.columns()))
            })
    }

    /// Adds a scripture entry, with its year and doctrine when given.
    ///
    /// Failures of the child rows are reported in the outcome and never fail the
    /// insert. The entry and its children are committed together.
    pub fn insert_row(&self, form: &EntryForm) -> Result<InsertOutcome, DbError> {
        form.validate()?;

        let mut session = self.provisioner.acquire()?;
        let outcome = session.transaction(|session| {
            let scripture_id = session.insert_scripture(&form.scripture())?;

            let year_info = match form.year_info(scripture_id) {
                None => ChildOutcome::Skipped,
                Some(Err(e)) => ChildOutcome::Failed(e),
                Some(Ok(row)) => ChildOutcome::from_result(
                    session.transaction(|session| session.insert_year_info(&row)),
                ),
            };

            let doctrine = match form.doctrine(scripture_id) {
                None => ChildOutcome::Skipped,
                Some(row) => ChildOutcome::from_result(
                    session.transaction(|session| session.insert_doctrine(&row)),
                ),
            };

            Ok(InsertOutcome {
                scripture_id,
                year_info,
                doctrine,
            })
        })?;
        self.cache.invalidate();

        if let Some(e) = outcome.year_info.error() {
            warn!("Entry {} was added without its year: {}", outcome.scripture_id, e);
        }
        if let Some(e) = outcome.doctrine.error() {
            warn!("Entry {} was added without its doctrine: {}", outcome.scripture_id, e);
        }
        info!("Added entry {} ({})", outcome.scripture_id, form.scripture().book);

        Ok(outcome)
    }

    /// Writes back every row of `edited` that differs from the row at the same
    /// position of `original`, and returns the number of rows written.
    ///
    /// No connection is opened when nothing changed.
    pub fn update_rows(&self, edited: &Table, original: &Table) -> Result<usize, DbError> {
        let changed = edited
            .iter()
            .zip(original.iter())
            .filter(|(edited, original)| edited.differs_from(original))
            .map(|(edited, _)| Scripture::from_row(&edited))
            .collect::<Result<Vec<_>, _>>()?;

        if changed.is_empty() {
            return Ok(0);
        }

        let mut session = self.provisioner.acquire()?;
        let written = session.transaction(|session| {
            changed.iter().try_fold(0, |written, scripture| {
                Ok(written + session.update_scripture(scripture)?)
            })
        })?;
        self.cache.invalidate();
        info!("Updated {} of {} changed rows", written, changed.len());

        Ok(written)
    }

    /// Deletes the entries with the given ids, and with them their children.
    pub fn delete_rows<I>(&self, ids: I) -> Result<usize, DbError>
    where
        I: IntoIterator<Item = i32>,
    {
        let ids: Vec<i32> = ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let mut session = self.provisioner.acquire()?;
        let deleted = session.transaction(|session| session.delete_scriptures(&ids))?;
        self.cache.invalidate();
        info!("Deleted {} entries", deleted);

        Ok(deleted)
    }
}
