//! Memoized reads with generation-based invalidation.
//!
//! Every cached table is tagged with the generation that was current when its
//! computation started. [invalidate](crate::cache::QueryCache::invalidate) bumps
//! the generation, so anything computed before a write is never served after it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lazy_static::lazy_static;
use log::debug;

use crate::table::Table;
use crate::DbError;

/// The fixed read queries behind the dashboard pages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Loader {
    Timeline,
    Scriptures,
    ChartData,
}

impl Loader {
    pub fn sql(self) -> &'static str {
        match self {
            Loader::Timeline => {
                "SELECT timeline_year, year_of_event, age, volume, book, chapter, verse, doctrine_name \
                 FROM timeline \
                 ORDER BY timeline_year"
            }
            Loader::Scriptures => {
                "SELECT id, volume, book, chapter, verse \
                 FROM scripture_study \
                 ORDER BY id"
            }
            Loader::ChartData => {
                "SELECT timeline_year, year_of_event, age, book \
                 FROM timeline \
                 ORDER BY timeline_year"
            }
        }
    }

    /// Result columns, used as the header of an empty result.
    pub fn columns(self) -> &'static [&'static str] {
        match self {
            Loader::Timeline => &[
                "timeline_year",
                "year_of_event",
                "age",
                "volume",
                "book",
                "chapter",
                "verse",
                "doctrine_name",
            ],
            Loader::Scriptures => &["id", "volume", "book", "chapter", "verse"],
            Loader::ChartData => &["timeline_year", "year_of_event", "age", "book"],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CacheKey {
    Loader(Loader),
    Query { sql: String, limit: Option<u32> },
}

struct Entry {
    generation: u64,
    table: Table,
}

lazy_static! {
    static ref SHARED: Arc<QueryCache> = Arc::new(QueryCache::new());
}

#[derive(Default)]
pub struct QueryCache {
    generation: AtomicU64,
    entries: Mutex<HashMap<CacheKey, Entry>>,
}

impl QueryCache {
    pub fn new() -> Self {
        QueryCache::default()
    }

    /// The process-wide cache shared by every dashboard that asks for it.
    pub fn shared() -> Arc<QueryCache> {
        Arc::clone(&SHARED)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Returns the cached table for `key`, computing and storing it on a miss.
    ///
    /// Errors are returned as-is and never cached.
    pub fn get_or_try_insert_with<F>(&self, key: CacheKey, compute: F) -> Result<Table, DbError>
    where
        F: FnOnce() -> Result<Table, DbError>,
    {
        let generation = self.generation();

        if let Some(table) = self.lookup(&key, generation) {
            debug!("Cache hit for {:?} at generation {}", key, generation);
            return Ok(table);
        }

        debug!("Cache miss for {:?} at generation {}", key, generation);
        let table = compute()?;
        self.lock().insert(
            key,
            Entry {
                generation,
                table: table.clone(),
            },
        );

        Ok(table)
    }

    /// Drops every cached table, including ones still being computed.
    pub fn invalidate(&self) -> u64 {
        let current = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.lock().retain(|_, entry| entry.generation >= current);
        debug!("Cache invalidated, now at generation {}", current);
        current
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lookup(key, self.generation()).is_some()
    }

    pub fn len(&self) -> usize {
        let generation = self.generation();
        self.lock()
            .values()
            .filter(|entry| entry.generation == generation)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &CacheKey, generation: u64) -> Option<Table> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.generation == generation => Some(entry.table.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
