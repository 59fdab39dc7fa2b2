// src/ledger/memory.rs
//! In-memory store for exercising the ledger without a database.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;

use super::error::LedgerResult;
use super::process::{Process, ProductionStatus};
use super::store::{LedgerStore, StatusTotal};
use crate::models::{Batch, BatchSuggestion, NewProductionRecord, NewTagRecord};

#[derive(Default)]
pub struct MemoryStore {
    batches: Mutex<Vec<Batch>>,
    children: Mutex<Vec<(String, String)>>,
    records: Mutex<Vec<NewProductionRecord>>,
    tags: Mutex<Vec<NewTagRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch(self, batch_id: &str, component: &str, max_qty: i64) -> Self {
        self.batches.lock().unwrap().push(Batch {
            batch_id: batch_id.to_string(),
            component: component.to_string(),
            grade: Some("EN8".to_string()),
            heat_no: Some("H-77".to_string()),
            customer: None,
            supplier: None,
            max_qty,
            slug_weight: None,
            created_by: None,
            created_at: Utc::now(),
        });
        self
    }

    pub fn with_child(self, parent: &str, child: &str) -> Self {
        self.children
            .lock()
            .unwrap()
            .push((parent.to_string(), child.to_string()));
        self
    }

    pub fn records(&self) -> Vec<NewProductionRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn tags(&self) -> Vec<NewTagRecord> {
        self.tags.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn find_batch(&self, batch_id: &str) -> LedgerResult<Option<Batch>> {
        let batches = self.batches.lock().unwrap();
        Ok(batches.iter().find(|b| b.batch_id == batch_id).cloned())
    }

    async fn child_components(&self, parent_component: &str) -> LedgerResult<Vec<String>> {
        let children = self.children.lock().unwrap();
        Ok(children
            .iter()
            .filter(|(parent, _)| parent == parent_component)
            .map(|(_, child)| child.clone())
            .collect())
    }

    async fn produced_total(
        &self,
        batch_id: &str,
        process: Process,
        component: Option<&str>,
    ) -> LedgerResult<i64> {
        // a real store awaits I/O here; let other submissions run
        tokio::task::yield_now().await;
        let records = self.records.lock().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.batch_id == batch_id && r.process == process)
            .filter(|r| r.status == ProductionStatus::Ok)
            .filter(|r| component.map_or(true, |c| r.component == c))
            .map(|r| r.quantity_produced)
            .sum())
    }

    async fn status_totals(&self, batch_id: &str) -> LedgerResult<Vec<StatusTotal>> {
        let records = self.records.lock().unwrap();
        let mut totals: Vec<StatusTotal> = Vec::new();
        for record in records.iter().filter(|r| r.batch_id == batch_id) {
            match totals.iter_mut().find(|t| {
                t.process == record.process && t.component == record.component && t.status == record.status
            }) {
                Some(total) => total.quantity += record.quantity_produced,
                None => totals.push(StatusTotal {
                    process: record.process,
                    component: record.component.clone(),
                    status: record.status,
                    quantity: record.quantity_produced,
                }),
            }
        }
        Ok(totals)
    }

    async fn append_records(&self, records: &[NewProductionRecord]) -> LedgerResult<()> {
        self.records.lock().unwrap().extend_from_slice(records);
        Ok(())
    }

    async fn append_tags(&self, tags: &[NewTagRecord]) -> LedgerResult<()> {
        self.tags.lock().unwrap().extend_from_slice(tags);
        Ok(())
    }

    async fn suggest_batches(&self, partial: &str, limit: i64) -> LedgerResult<Vec<BatchSuggestion>> {
        let batches = self.batches.lock().unwrap();
        Ok(batches
            .iter()
            .filter(|b| b.batch_id.contains(partial))
            .take(limit.max(0) as usize)
            .map(|b| BatchSuggestion { batch_id: b.batch_id.clone() })
            .collect())
    }
}
