//! Reconciling an edited grid with the rows it was loaded from.
//!
//! An [EditSession](crate::reconcile::EditSession) remembers the table handed to the
//! editor and its [Digest](crate::table::Digest). Saving a table with the same
//! digest writes nothing; otherwise only the rows that differ are written back.

use log::{debug, info};

use crate::dashboard::{Dashboard, InsertOutcome};
use crate::models::EntryForm;
use crate::store::Provision;
use crate::table::{Cell, Digest, Table};
use crate::DbError;

/// The editor-only checkbox column marking rows for deletion.
pub const DELETE_MARKER: &str = "delete";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveOutcome {
    Unchanged,
    Saved { rows_written: usize },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    NothingSelected,
    Deleted(usize),
}

#[derive(Clone, Debug)]
pub struct EditSession {
    snapshot: Table,
    digest: Digest,
}

impl EditSession {
    pub fn new(snapshot: Table) -> Self {
        let snapshot = snapshot.without_columns(&[DELETE_MARKER]);
        let digest = snapshot.digest();
        EditSession { snapshot, digest }
    }

    /// Starts a session over the current `scripture_study` rows.
    pub fn load<P: Provision>(dashboard: &Dashboard<P>) -> Result<Self, DbError> {
        Ok(EditSession::new(dashboard.load_scriptures()?))
    }

    pub fn snapshot(&self) -> &Table {
        &self.snapshot
    }

    pub fn digest(&self) -> Digest {
        self.digest
    }

    /// The snapshot with an unticked delete marker on every row.
    pub fn editor_table(&self) -> Table {
        self.snapshot
            .clone()
            .with_column(DELETE_MARKER, Cell::Bool(false))
    }

    pub fn is_modified(&self, edited: &Table) -> bool {
        edited.without_columns(&[DELETE_MARKER]).digest() != self.digest
    }

    /// Writes back the rows of `edited` that differ from the snapshot, which
    /// `edited` then replaces.
    pub fn save<P: Provision>(
        &mut self,
        dashboard: &Dashboard<P>,
        edited: &Table,
    ) -> Result<SaveOutcome, DbError> {
        let edited = edited.without_columns(&[DELETE_MARKER]);
        let digest = edited.digest();
        if digest == self.digest {
            debug!("No changes to save ({})", digest);
            return Ok(SaveOutcome::Unchanged);
        }

        let rows_written = dashboard.update_rows(&edited, &self.snapshot)?;
        self.snapshot = edited;
        self.digest = digest;

        Ok(SaveOutcome::Saved { rows_written })
    }

    /// Ids of the rows whose delete marker is ticked.
    pub fn marked_ids(edited: &Table) -> Result<Vec<i32>, DbError> {
        if edited.column_index(DELETE_MARKER).is_none() {
            return Ok(Vec::new());
        }

        edited
            .iter()
            .filter(|row| row.get(DELETE_MARKER).map_or(false, Cell::is_truthy))
            .map(|row| {
                let id = row.integer("id")?;
                i32::try_from(id).map_err(|_| DbError::InvalidValue {
                    column: "id".to_string(),
                    value: id.to_string(),
                    expected: "a 32-bit id".to_string(),
                })
            })
            .collect()
    }

    /// Deletes the marked rows and reloads the snapshot.
    pub fn delete_marked<P: Provision>(
        &mut self,
        dashboard: &Dashboard<P>,
        edited: &Table,
    ) -> Result<DeleteOutcome, DbError> {
        let ids = EditSession::marked_ids(edited)?;
        if ids.is_empty() {
            return Ok(DeleteOutcome::NothingSelected);
        }

        let deleted = dashboard.delete_rows(ids)?;
        self.refresh(dashboard)?;

        Ok(DeleteOutcome::Deleted(deleted))
    }

    /// Adds an entry and reloads the snapshot.
    pub fn insert<P: Provision>(
        &mut self,
        dashboard: &Dashboard<P>,
        form: &EntryForm,
    ) -> Result<InsertOutcome, DbError> {
        let outcome = dashboard.insert_row(form)?;
        self.refresh(dashboard)?;
        Ok(outcome)
    }

    pub fn refresh<P: Provision>(&mut self, dashboard: &Dashboard<P>) -> Result<(), DbError> {
        *self = EditSession::load(dashboard)?;
        info!("Reloaded {} rows for editing", self.snapshot.len());
        Ok(())
    }
}
