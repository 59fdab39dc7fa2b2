// src/ledger/store.rs
//! Storage seam of the ledger.

use async_trait::async_trait;
use serde::Serialize;

use super::error::LedgerResult;
use super::process::{Process, ProductionStatus};
use crate::models::{Batch, BatchSuggestion, NewProductionRecord, NewTagRecord};

/// Quantity booked at one stage for one component under one status.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct StatusTotal {
    pub process: Process,
    pub component: String,
    pub status: ProductionStatus,
    pub quantity: i64,
}

/// Everything the ledger reads and appends. Records are append-only, so
/// implementations never expose updates or deletes.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_batch(&self, batch_id: &str) -> LedgerResult<Option<Batch>>;

    async fn child_components(&self, parent_component: &str) -> LedgerResult<Vec<String>>;

    /// Sum of `ok` quantities at `process`. `None` sums across every component.
    async fn produced_total(
        &self,
        batch_id: &str,
        process: Process,
        component: Option<&str>,
    ) -> LedgerResult<i64>;

    async fn status_totals(&self, batch_id: &str) -> LedgerResult<Vec<StatusTotal>>;

    /// Appends all records or none.
    async fn append_records(&self, records: &[NewProductionRecord]) -> LedgerResult<()>;

    async fn append_tags(&self, tags: &[NewTagRecord]) -> LedgerResult<()>;

    async fn suggest_batches(&self, partial: &str, limit: i64) -> LedgerResult<Vec<BatchSuggestion>>;
}
