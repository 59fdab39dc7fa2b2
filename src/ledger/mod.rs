// src/ledger/mod.rs
//! Batch production ledger: how much of a batch each department may still
//! produce, whether an entry is acceptable, and where the batch goes next.
//!
//! The backend runs [`Ledger`] over SQLite; department screens reuse the pure
//! parts (sequence table, validator, component selection) through the client
//! session so both sides reach the same verdict.

pub mod components;
pub mod error;
pub mod process;
pub mod resolver;
pub mod rows;
pub mod sequence;
pub mod store;
pub mod validation;

#[cfg(test)]
pub(crate) mod memory;

pub use components::{BatchResolution, ComponentSelection};
pub use error::{LedgerError, LedgerResult, RowError};
pub use process::{Department, Process, ProductionStatus};
pub use resolver::{availability, bucket_scope, Availability};
pub use rows::{EntryRow, EntryRows, RowId};
pub use sequence::{advance, ProcessSequence, StageState, CANONICAL_SEQUENCE};
pub use store::{LedgerStore, StatusTotal};
pub use validation::{parse_pieces, ProductionValidator, TolerancePolicy, QUANTITY_FIELD};

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use strum::IntoEnumIterator;
use tokio::sync::Mutex;

use crate::models::{
    Batch, BatchDetails, BatchSuggestion, NewProductionRecord, NewTag, NewTagRecord,
    ProductionEntry, RemainingResponse,
};

/// Per-stage totals of the production-analysis view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageSummary {
    pub process: Process,
    /// Set for stages kept per child component.
    pub component: Option<String>,
    pub ok: i64,
    pub reject: i64,
    pub rework: i64,
    pub upstream_supply: i64,
    pub remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchLedger {
    pub batch: BatchDetails,
    pub stages: Vec<StageSummary>,
}

type PoolKey = (String, Option<String>);

pub struct Ledger {
    store: Arc<dyn LedgerStore>,
    policy: TolerancePolicy,
    // validate-then-append must not interleave between submissions
    write_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(store: Arc<dyn LedgerStore>, policy: TolerancePolicy) -> Self {
        Self { store, policy, write_lock: Mutex::new(()) }
    }

    pub fn policy(&self) -> &TolerancePolicy {
        &self.policy
    }

    pub async fn batch(&self, batch_id: &str) -> LedgerResult<Batch> {
        let batch_id = batch_id.trim();
        self.store
            .find_batch(batch_id)
            .await?
            .ok_or_else(|| LedgerError::batch_not_found(batch_id))
    }

    pub async fn child_components(&self, parent_component: &str) -> LedgerResult<Vec<String>> {
        let mut children = self.store.child_components(parent_component.trim()).await?;
        children.sort();
        children.dedup();
        Ok(children)
    }

    /// The batch and the components `process` may record against.
    pub async fn resolve_batch(&self, batch_id: &str, process: Process) -> LedgerResult<BatchResolution> {
        let batch = self.batch(batch_id).await?;
        let children = if process.is_child_scoped() {
            self.store.child_components(&batch.component).await?
        } else {
            Vec::new()
        };
        Ok(BatchResolution::new(batch, process, children))
    }

    pub async fn remaining(
        &self,
        batch_id: &str,
        process: Process,
        component: Option<&str>,
    ) -> LedgerResult<RemainingResponse> {
        let resolution = self.resolve_batch(batch_id, process).await?;
        let component = resolution.component(component)?;
        let available = availability(self.store.as_ref(), &resolution.batch, process, &component).await?;

        Ok(RemainingResponse::new(&resolution.batch.batch_id, process, &component, available))
    }

    pub async fn suggest_batches(&self, partial: &str, limit: i64) -> LedgerResult<Vec<BatchSuggestion>> {
        let partial = partial.trim();
        if partial.is_empty() {
            return Ok(Vec::new());
        }
        self.store.suggest_batches(partial, limit).await
    }

    /// Validates every row against what is left and appends them together.
    ///
    /// Rows drawing from the same batch and component share one running
    /// remaining figure, so two rows cannot each claim the same pieces. If any
    /// row fails, nothing is stored and each failure is reported by row id.
    pub async fn submit_production(
        &self,
        department: Department,
        process: Process,
        rows: &EntryRows,
        actor: &str,
    ) -> LedgerResult<Vec<NewProductionRecord>> {
        ProcessSequence::allowed_next(department, process)?;
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let validator = ProductionValidator::new(process, &self.policy);
        let _guard = self.write_lock.lock().await;

        let mut resolutions: HashMap<String, BatchResolution> = HashMap::new();
        let mut pools: HashMap<PoolKey, i64> = HashMap::new();
        let mut records = Vec::with_capacity(rows.len());
        let mut rejected = Vec::new();

        for row in rows.iter() {
            let accepted = self
                .accept_entry(department, process, &validator, &row.entry, actor, &mut resolutions, &mut pools)
                .await;
            match accepted {
                Ok(record) => records.push(record),
                Err(err @ LedgerError::Storage(_)) => return Err(err),
                Err(err) => rejected.push(RowError::from_ledger(row.id, &err)),
            }
        }

        if !rejected.is_empty() {
            log::warn!(
                "{}: {} of {} row(s) from {} rejected",
                process.display_name(),
                rejected.len(),
                rows.len(),
                actor
            );
            return Err(LedgerError::RowsRejected(rejected));
        }

        self.store.append_records(&records).await?;
        log::info!("{}: {} recorded {} row(s)", process.display_name(), actor, records.len());
        Ok(records)
    }

    #[allow(clippy::too_many_arguments)]
    async fn accept_entry(
        &self,
        department: Department,
        process: Process,
        validator: &ProductionValidator,
        entry: &ProductionEntry,
        actor: &str,
        resolutions: &mut HashMap<String, BatchResolution>,
        pools: &mut HashMap<PoolKey, i64>,
    ) -> LedgerResult<NewProductionRecord> {
        let batch_id = entry.batch_id.trim();
        if !resolutions.contains_key(batch_id) {
            let resolution = self.resolve_batch(batch_id, process).await?;
            resolutions.insert(batch_id.to_string(), resolution);
        }
        let resolution = &resolutions[batch_id];
        let component = resolution.component(entry.component.as_deref())?;

        let key = (
            resolution.batch.batch_id.clone(),
            bucket_scope(process, &component).map(str::to_string),
        );
        let remaining = match pools.get(&key) {
            Some(remaining) => *remaining,
            None => {
                availability(self.store.as_ref(), &resolution.batch, process, &component)
                    .await?
                    .remaining
            }
        };

        let quantity = validator.check(entry.quantity_produced, remaining, entry.status)?;
        if let Some(next) = entry.next_process {
            advance(department, process, entry.status, Some(next))?;
        }

        let left = if entry.status.advances() {
            (remaining - quantity).max(0)
        } else {
            remaining
        };
        pools.insert(key, left);

        Ok(NewProductionRecord {
            batch_id: resolution.batch.batch_id.clone(),
            process,
            component,
            date: entry.date,
            shift: entry.shift.trim().to_string(),
            quantity_produced: quantity,
            status: entry.status,
            verified_by: entry.verified_by.clone(),
            next_process: entry.next_process,
            measurements: entry.measurements.clone(),
            created_by: actor.to_string(),
        })
    }

    /// Records move-and-status tags. Each tag is checked for its quantity and
    /// its transition; tags do not draw down availability.
    pub async fn submit_tags(
        &self,
        department: Department,
        tags: &[NewTag],
        actor: &str,
    ) -> LedgerResult<Vec<NewTagRecord>> {
        let _guard = self.write_lock.lock().await;

        let mut records = Vec::with_capacity(tags.len());
        let mut rejected = Vec::new();

        for (index, tag) in tags.iter().enumerate() {
            match self.accept_tag(department, tag, actor).await {
                Ok(record) => records.push(record),
                Err(err @ LedgerError::Storage(_)) => return Err(err),
                Err(err) => rejected.push(RowError::from_ledger(RowId(index as u32), &err)),
            }
        }

        if !rejected.is_empty() {
            log::warn!("{} rejected {} of {} tag(s)", actor, rejected.len(), tags.len());
            return Err(LedgerError::RowsRejected(rejected));
        }
        if records.is_empty() {
            return Ok(records);
        }

        self.store.append_tags(&records).await?;
        log::info!("{} recorded {} tag(s)", actor, records.len());
        Ok(records)
    }

    async fn accept_tag(&self, department: Department, tag: &NewTag, actor: &str) -> LedgerResult<NewTagRecord> {
        let resolution = self.resolve_batch(&tag.batch_id, tag.current_process).await?;
        let component = resolution.component(tag.component.as_deref())?;
        let qty = parse_pieces("qty", tag.qty)?;
        advance(department, tag.current_process, tag.status, tag.next_process)?;

        Ok(NewTagRecord {
            batch_id: resolution.batch.batch_id,
            component,
            current_process: tag.current_process,
            next_process: if tag.status.advances() { tag.next_process } else { None },
            qty,
            status: tag.status,
            created_by: actor.to_string(),
        })
    }

    /// Every stage's ok/reject/rework totals and what is still open there.
    pub async fn batch_ledger(&self, batch_id: &str) -> LedgerResult<BatchLedger> {
        let batch = self.batch(batch_id).await?;
        let totals = self.store.status_totals(&batch.batch_id).await?;

        let mut components: BTreeSet<String> = self
            .store
            .child_components(&batch.component)
            .await?
            .into_iter()
            .collect();
        components.extend(
            totals
                .iter()
                .filter(|t| bucket_scope(t.process, &t.component).is_some())
                .map(|t| t.component.clone()),
        );
        if components.is_empty() {
            components.insert(batch.component.clone());
        }

        let mut stages = Vec::new();
        for process in Process::iter() {
            let scopes: Vec<Option<&str>> = if bucket_scope(process, &batch.component).is_some() {
                components.iter().map(|c| Some(c.as_str())).collect()
            } else {
                vec![None]
            };

            for scope in scopes {
                let booked = |status: ProductionStatus| -> i64 {
                    totals
                        .iter()
                        .filter(|t| t.process == process && t.status == status)
                        .filter(|t| scope.map_or(true, |c| t.component == c))
                        .map(|t| t.quantity)
                        .sum()
                };
                let component = scope.unwrap_or(batch.component.as_str());
                let available = availability(self.store.as_ref(), &batch, process, component).await?;

                stages.push(StageSummary {
                    process,
                    component: scope.map(str::to_string),
                    ok: booked(ProductionStatus::Ok),
                    reject: booked(ProductionStatus::Reject),
                    rework: booked(ProductionStatus::Rework),
                    upstream_supply: available.upstream_supply,
                    remaining: available.remaining,
                });
            }
        }

        Ok(BatchLedger { batch: batch.into(), stages })
    }
}
