// src/ledger/rows.rs
//! Row lists for multi-row production entry.
//!
//! Rows are never edited in place: every change yields a new `EntryRows`
//! sharing storage with the previous one until it is written to.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::error::{LedgerError, LedgerResult};
use crate::models::ProductionEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RowId(pub u32);

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryRow {
    pub id: RowId,
    #[serde(flatten)]
    pub entry: ProductionEntry,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryRows {
    rows: Arc<Vec<EntryRow>>,
    next_id: u32,
}

impl EntryRows {
    pub fn new() -> Self {
        Self::default()
    }

    /// Numbers rows by position, which is how submitted row lists are reported back.
    pub fn from_entries(entries: impl IntoIterator<Item = ProductionEntry>) -> Self {
        let rows: Vec<EntryRow> = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| EntryRow { id: RowId(index as u32), entry })
            .collect();
        let next_id = rows.len() as u32;
        Self { rows: Arc::new(rows), next_id }
    }

    pub fn with_row(&self, entry: ProductionEntry) -> (Self, RowId) {
        let id = RowId(self.next_id);
        let mut next = self.clone();
        Arc::make_mut(&mut next.rows).push(EntryRow { id, entry });
        next.next_id += 1;
        (next, id)
    }

    pub fn with_updated<F>(&self, id: RowId, update: F) -> LedgerResult<Self>
    where
        F: FnOnce(&mut ProductionEntry),
    {
        let index = self.position(id)?;
        let mut next = self.clone();
        update(&mut Arc::make_mut(&mut next.rows)[index].entry);
        Ok(next)
    }

    pub fn without(&self, id: RowId) -> LedgerResult<Self> {
        let index = self.position(id)?;
        let mut next = self.clone();
        Arc::make_mut(&mut next.rows).remove(index);
        Ok(next)
    }

    pub fn get(&self, id: RowId) -> Option<&EntryRow> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryRow> {
        self.rows.iter()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row id at a submitted position.
    pub fn id_at(&self, position: usize) -> Option<RowId> {
        self.rows.get(position).map(|row| row.id)
    }

    pub fn entries(&self) -> Vec<ProductionEntry> {
        self.rows.iter().map(|row| row.entry.clone()).collect()
    }

    fn position(&self, id: RowId) -> LedgerResult<usize> {
        self.rows
            .iter()
            .position(|row| row.id == id)
            .ok_or_else(|| LedgerError::NotFound { entity: "row", id: id.0.to_string() })
    }
}
