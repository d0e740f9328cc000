//! An in-memory store that records every call made through it.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::cache::Loader;
use crate::models::{NewDoctrine, NewScripture, NewYearInfo, Scripture};
use crate::store::{trim_statement, Provision, Session};
use crate::table::{Cell, Table};
use crate::DbError;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    Acquire,
    Fetch { sql: String, limit: Option<u32> },
    InsertScripture { book: String },
    InsertYearInfo { scripture_id: i32, year: i32, age: String },
    InsertDoctrine { scripture_id: i32, name: String },
    Update { id: i32 },
    Delete { ids: Vec<i32> },
    Begin,
    Commit,
    Rollback,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    scriptures: Vec<Scripture>,
    tables: HashMap<String, Table>,
    next_id: i32,
    fail_acquire: bool,
    fail_year_info: bool,
    fail_doctrine: bool,
}

/// Cloning shares the underlying state, so a test can keep a handle for inspection.
#[derive(Clone, Default)]
pub struct MockStore {
    state: Rc<RefCell<State>>,
}

impl MockStore {
    pub fn new() -> Self {
        MockStore::default()
    }

    pub fn with_scriptures(scriptures: Vec<Scripture>) -> Self {
        let store = MockStore::new();
        {
            let mut state = store.state.borrow_mut();
            state.next_id = scriptures.iter().map(|s| s.id).max().unwrap_or(0);
            state.scriptures = scriptures;
        }
        store
    }

    /// Serves `table` for `sql`, whatever the limit.
    pub fn with_table(self, sql: &str, table: Table) -> Self {
        self.state
            .borrow_mut()
            .tables
            .insert(trim_statement(sql).to_string(), table);
        self
    }

    pub fn failing_acquire(self) -> Self {
        self.state.borrow_mut().fail_acquire = true;
        self
    }

    pub fn failing_year_info(self) -> Self {
        self.state.borrow_mut().fail_year_info = true;
        self
    }

    pub fn failing_doctrine(self) -> Self {
        self.state.borrow_mut().fail_doctrine = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|c| matches(c)).count()
    }

    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    pub fn scriptures(&self) -> Vec<Scripture> {
        self.state.borrow().scriptures.clone()
    }

    fn record(&self, call: Call) {
        self.state.borrow_mut().calls.push(call);
    }
}

pub fn scripture(id: i32, volume: &str, book: &str, chapter: &str, verse: &str) -> Scripture {
    Scripture {
        id,
        volume: volume.to_string(),
        book: book.to_string(),
        chapter: chapter.to_string(),
        verse: verse.to_string(),
    }
}

pub fn scripture_table(scriptures: &[Scripture]) -> Table {
    Table::new(
        Loader::Scriptures.columns().to_vec(),
        scriptures
            .iter()
            .map(|s| {
                vec![
                    Cell::from(s.id),
                    Cell::from(&*s.volume),
                    Cell::from(&*s.book),
                    Cell::from(&*s.chapter),
                    Cell::from(&*s.verse),
                ]
            })
            .collect(),
    )
}

impl Provision for MockStore {
    type Session = MockStore;

    fn acquire(&self) -> Result<MockStore, DbError> {
        self.record(Call::Acquire);
        if self.state.borrow().fail_acquire {
            return Err(DbError::Connection {
                cause: "connection refused".to_string(),
            });
        }
        Ok(self.clone())
    }
}

impl Session for MockStore {
    fn fetch(&mut self, sql: &str, limit: Option<u32>) -> Result<Table, DbError> {
        let sql = trim_statement(sql);
        self.record(Call::Fetch {
            sql: sql.to_string(),
            limit,
        });

        let state = self.state.borrow();
        let table = if sql == Loader::Scriptures.sql() {
            scripture_table(&state.scriptures)
        } else {
            state.tables.get(sql).cloned().unwrap_or_default()
        };

        Ok(match limit {
            Some(n) if (n as usize) < table.len() => {
                Table::new(table.columns().to_vec(), table.rows()[..n as usize].to_vec())
            }
            _ => table,
        })
    }

    fn insert_scripture(&mut self, row: &NewScripture) -> Result<i32, DbError> {
        self.record(Call::InsertScripture {
            book: row.book.to_string(),
        });

        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        let id = state.next_id;
        state
            .scriptures
            .push(scripture(id, row.volume, row.book, row.chapter, row.verse));
        Ok(id)
    }

    fn insert_year_info(&mut self, row: &NewYearInfo) -> Result<(), DbError> {
        self.record(Call::InsertYearInfo {
            scripture_id: row.scripture_study_id,
            year: row.year_of_event,
            age: row.age.to_string(),
        });
        if self.state.borrow().fail_year_info {
            return Err(DbError::Query {
                cause: "year_info is locked".to_string(),
            });
        }
        Ok(())
    }

    fn insert_doctrine(&mut self, row: &NewDoctrine) -> Result<(), DbError> {
        self.record(Call::InsertDoctrine {
            scripture_id: row.scripture_study_id,
            name: row.doctrine_name.to_string(),
        });
        if self.state.borrow().fail_doctrine {
            return Err(DbError::Query {
                cause: "doctrine is locked".to_string(),
            });
        }
        Ok(())
    }

    fn update_scripture(&mut self, scripture: &Scripture) -> Result<usize, DbError> {
        self.record(Call::Update { id: scripture.id });

        let mut state = self.state.borrow_mut();
        match state.scriptures.iter_mut().find(|s| s.id == scripture.id) {
            Some(existing) => {
                *existing = scripture.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    fn delete_scriptures(&mut self, ids: &[i32]) -> Result<usize, DbError> {
        self.record(Call::Delete { ids: ids.to_vec() });

        let mut state = self.state.borrow_mut();
        let before = state.scriptures.len();
        state.scriptures.retain(|s| !ids.contains(&s.id));
        Ok(before - state.scriptures.len())
    }

    fn begin(&mut self) -> Result<(), DbError> {
        self.record(Call::Begin);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), DbError> {
        self.record(Call::Commit);
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), DbError> {
        self.record(Call::Rollback);
        Ok(())
    }
}
