// src/client/session.rs
//! Per-department entry session: the state behind one production form.
//!
//! Reads that may race (batch lookup, remaining quantity) are split into a
//! `begin` step that issues a ticket and an `apply` step that drops the
//! response if the ticket went stale in between. Submission is split the same
//! way so the form can stay responsive while rows are in flight, with at most
//! one submission per session.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::search::{LatestWins, Ticket};
use super::{LedgerApi, RequestContext};
use crate::ledger::{
    advance, ComponentSelection, Department, EntryRows, LedgerError, LedgerResult, Process,
    ProcessSequence, ProductionValidator, RowError, RowId, TolerancePolicy,
};
use crate::models::{BatchDetails, ProductionEntry, RemainingResponse};

// ==================== LOOKUP ====================

/// A batch lookup in flight.
#[derive(Debug, Clone)]
pub struct Lookup {
    ticket: Ticket,
    batch_id: String,
}

impl Lookup {
    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }
}

/// Everything a batch lookup fetches for one stage.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub batch: BatchDetails,
    pub selection: ComponentSelection,
    /// Present once a component is settled.
    pub remaining: Option<RemainingResponse>,
}

async fn resolve(
    api: &dyn LedgerApi,
    ctx: &RequestContext,
    process: Process,
    batch_id: &str,
) -> LedgerResult<Resolved> {
    let batch = api.batch_details(ctx, batch_id).await?;
    let selection = if process.is_child_scoped() {
        let children = api.child_components(ctx, &batch.component).await?;
        ComponentSelection::from_children(&batch.component, children)
    } else {
        ComponentSelection::Parent(batch.component.clone())
    };

    let remaining = match selection.preselected() {
        Some(component) => Some(
            api.remaining(ctx, process, &batch.batch_id, Some(component)).await?,
        ),
        None => None,
    };

    Ok(Resolved { batch, selection, remaining })
}

/// A remaining-quantity read in flight.
#[derive(Debug, Clone)]
pub struct RemainingRead {
    ticket: Ticket,
    batch_id: String,
    component: String,
}

impl RemainingRead {
    pub fn component(&self) -> &str {
        &self.component
    }
}

// ==================== SUBMISSION ====================

/// Clears the in-flight flag when the submission ends, however it ends.
#[derive(Debug)]
struct SubmitGuard {
    flag: Arc<AtomicBool>,
}

impl SubmitGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag: flag.clone() })
    }
}

impl Drop for SubmitGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Rows accepted locally and on their way to the backend.
pub struct Submission {
    api: Arc<dyn LedgerApi>,
    ctx: RequestContext,
    process: Process,
    rows: EntryRows,
    entries: Vec<ProductionEntry>,
    _guard: SubmitGuard,
}

impl Submission {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sends the rows. Row errors come back keyed by the session's row ids.
    pub async fn send(self) -> LedgerResult<usize> {
        let result = self.api.bulk_add(&self.ctx, self.process, &self.entries).await;
        match result {
            Err(LedgerError::RowsRejected(errors)) => {
                let errors = errors
                    .into_iter()
                    .map(|mut error| {
                        if let Some(id) = self.rows.id_at(error.row.0 as usize) {
                            error.row = id;
                        }
                        error
                    })
                    .collect();
                Err(LedgerError::RowsRejected(errors))
            }
            other => other,
        }
    }
}

// ==================== SESSION ====================

pub struct EntrySession {
    api: Arc<dyn LedgerApi>,
    ctx: RequestContext,
    department: Department,
    process: Process,
    validator: ProductionValidator,
    lookups: LatestWins,
    remaining_reads: LatestWins,
    batch_id: String,
    batch: Option<BatchDetails>,
    selection: Option<ComponentSelection>,
    component: Option<String>,
    remaining: Option<RemainingResponse>,
    rows: EntryRows,
    submitting: Arc<AtomicBool>,
}

impl EntrySession {
    /// Opens a form for `department` recording at `process`.
    pub fn new(
        api: Arc<dyn LedgerApi>,
        ctx: RequestContext,
        department: Department,
        process: Process,
        policy: &TolerancePolicy,
    ) -> LedgerResult<Self> {
        ProcessSequence::allowed_next(department, process)?;
        Ok(Self {
            api,
            ctx,
            department,
            process,
            validator: ProductionValidator::new(process, policy),
            lookups: LatestWins::new(),
            remaining_reads: LatestWins::new(),
            batch_id: String::new(),
            batch: None,
            selection: None,
            component: None,
            remaining: None,
            rows: EntryRows::new(),
            submitting: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn department(&self) -> Department {
        self.department
    }

    pub fn process(&self) -> Process {
        self.process
    }

    pub fn batch_id(&self) -> &str {
        &self.batch_id
    }

    pub fn batch(&self) -> Option<&BatchDetails> {
        self.batch.as_ref()
    }

    pub fn heat_no(&self) -> Option<&str> {
        self.batch.as_ref().and_then(|b| b.heat_no.as_deref())
    }

    pub fn grade(&self) -> Option<&str> {
        self.batch.as_ref().and_then(|b| b.grade.as_deref())
    }

    pub fn selection(&self) -> Option<&ComponentSelection> {
        self.selection.as_ref()
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn remaining(&self) -> Option<i64> {
        self.remaining.as_ref().map(|r| r.remaining_qty)
    }

    pub fn rows(&self) -> &EntryRows {
        &self.rows
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::SeqCst)
    }

    /// Stages the operator may move the batch to after an `ok` entry.
    pub fn allowed_next(&self) -> LedgerResult<Vec<Process>> {
        ProcessSequence::allowed_next(self.department, self.process)
    }

    // -------------------- batch lookup --------------------

    /// Starts looking up `batch_id`. Earlier lookups and remaining reads
    /// become stale.
    pub fn begin_lookup(&mut self, batch_id: &str) -> Lookup {
        self.batch_id = batch_id.trim().to_string();
        self.remaining_reads.invalidate();
        Lookup { ticket: self.lookups.issue(), batch_id: self.batch_id.clone() }
    }

    /// The network half of a lookup; does not borrow the session.
    pub fn fetch(&self, lookup: &Lookup) -> impl Future<Output = LedgerResult<Resolved>> + Send + 'static {
        let api = self.api.clone();
        let ctx = self.ctx.clone();
        let process = self.process;
        let batch_id = lookup.batch_id.clone();
        async move { resolve(api.as_ref(), &ctx, process, &batch_id).await }
    }

    /// Applies a lookup result. Returns `Ok(false)` when a newer lookup made
    /// this one stale and the result was dropped.
    pub fn apply_lookup(&mut self, lookup: &Lookup, outcome: LedgerResult<Resolved>) -> LedgerResult<bool> {
        if !self.lookups.is_current(lookup.ticket) {
            log::debug!("Dropping stale lookup for '{}'", lookup.batch_id);
            return Ok(false);
        }

        match outcome {
            Ok(resolved) => {
                self.component = resolved.selection.preselected().map(str::to_string);
                self.selection = Some(resolved.selection);
                self.batch = Some(resolved.batch);
                self.remaining = resolved.remaining;
                Ok(true)
            }
            Err(err @ LedgerError::NotFound { .. }) => {
                self.clear_batch_fields();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Lookup in one go, for callers that do not overlap requests.
    pub async fn select_batch(&mut self, batch_id: &str) -> LedgerResult<()> {
        let lookup = self.begin_lookup(batch_id);
        let outcome = self.fetch(&lookup).await;
        self.apply_lookup(&lookup, outcome).map(|_| ())
    }

    fn clear_batch_fields(&mut self) {
        self.batch = None;
        self.selection = None;
        self.component = None;
        self.remaining = None;
    }

    // -------------------- component and remaining --------------------

    /// Picks one of the offered child components and reloads the remaining
    /// quantity for it.
    pub async fn select_component(&mut self, name: &str) -> LedgerResult<()> {
        let (parent, selection) = match (&self.batch, &self.selection) {
            (Some(batch), Some(selection)) => (batch.component.clone(), selection),
            _ => return Err(LedgerError::batch_not_found(&self.batch_id)),
        };
        let component = selection.select(&parent, Some(name))?;
        self.component = Some(component);
        self.remaining = None;
        self.refresh_remaining().await
    }

    /// Starts reloading the remaining quantity for the current batch and
    /// component. Earlier reads become stale, as they do on a new lookup.
    pub fn begin_remaining(&self) -> LedgerResult<RemainingRead> {
        let component = self.settled_component()?;
        Ok(RemainingRead {
            ticket: self.remaining_reads.issue(),
            batch_id: self.batch_id.clone(),
            component,
        })
    }

    pub fn fetch_remaining(
        &self,
        read: &RemainingRead,
    ) -> impl Future<Output = LedgerResult<RemainingResponse>> + Send + 'static {
        let api = self.api.clone();
        let ctx = self.ctx.clone();
        let process = self.process;
        let read = read.clone();
        async move { api.remaining(&ctx, process, &read.batch_id, Some(&read.component)).await }
    }

    /// Applies a remaining read. Returns `Ok(false)` when the read went stale.
    pub fn apply_remaining(
        &mut self,
        read: &RemainingRead,
        outcome: LedgerResult<RemainingResponse>,
    ) -> LedgerResult<bool> {
        if !self.remaining_reads.is_current(read.ticket) {
            log::debug!("Dropping stale remaining quantity for '{}'", read.batch_id);
            return Ok(false);
        }
        match outcome {
            Ok(remaining) => {
                self.remaining = Some(remaining);
                Ok(true)
            }
            Err(err @ LedgerError::NotFound { .. }) => {
                self.clear_batch_fields();
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    /// Reloads the remaining quantity in one go.
    pub async fn refresh_remaining(&mut self) -> LedgerResult<()> {
        let read = self.begin_remaining()?;
        let outcome = self.fetch_remaining(&read).await;
        self.apply_remaining(&read, outcome).map(|_| ())
    }

    fn settled_component(&self) -> LedgerResult<String> {
        let batch = self
            .batch
            .as_ref()
            .ok_or_else(|| LedgerError::batch_not_found(&self.batch_id))?;
        match (&self.component, &self.selection) {
            (Some(component), _) => Ok(component.clone()),
            (None, Some(selection)) => selection.select(&batch.component, None),
            (None, None) => Ok(batch.component.clone()),
        }
    }

    // -------------------- rows --------------------

    pub fn add_row(&mut self, entry: ProductionEntry) -> RowId {
        let (rows, id) = self.rows.with_row(entry);
        self.rows = rows;
        id
    }

    pub fn update_row<F>(&mut self, id: RowId, update: F) -> LedgerResult<()>
    where
        F: FnOnce(&mut ProductionEntry),
    {
        self.rows = self.rows.with_updated(id, update)?;
        Ok(())
    }

    pub fn remove_row(&mut self, id: RowId) -> LedgerResult<()> {
        self.rows = self.rows.without(id)?;
        Ok(())
    }

    /// Checks every row the way the backend will, drawing each accepted
    /// `ok` row down from the same remaining figure.
    pub fn validate_rows(&self) -> LedgerResult<()> {
        self.settled_component()?;
        let mut remaining = self
            .remaining
            .as_ref()
            .map(|r| r.remaining_qty)
            .ok_or_else(|| LedgerError::RemainingNotLoaded { batch_id: self.batch_id.clone() })?;

        let mut rejected = Vec::new();
        for row in self.rows.iter() {
            let entry = &row.entry;
            let checked = self
                .validator
                .check(entry.quantity_produced, remaining, entry.status)
                .and_then(|quantity| {
                    if entry.next_process.is_some() {
                        advance(self.department, self.process, entry.status, entry.next_process)?;
                    }
                    Ok(quantity)
                });
            match checked {
                Ok(quantity) if entry.status.advances() => remaining -= quantity,
                Ok(_) => {}
                Err(err) => rejected.push(RowError::from_ledger(row.id, &err)),
            }
        }

        if rejected.is_empty() {
            Ok(())
        } else {
            Err(LedgerError::RowsRejected(rejected))
        }
    }

    /// Validates locally and hands back the rows to send. `Ok(None)` means
    /// another submission from this session is still in flight.
    pub fn prepare_submission(&self) -> LedgerResult<Option<Submission>> {
        let guard = match SubmitGuard::acquire(&self.submitting) {
            Some(guard) => guard,
            None => return Ok(None),
        };
        self.validate_rows()?;

        let component = self.settled_component()?;
        let entries = self
            .rows
            .entries()
            .into_iter()
            .map(|mut entry| {
                entry.batch_id = self.batch_id.clone();
                entry.component = Some(component.clone());
                entry
            })
            .collect();

        Ok(Some(Submission {
            api: self.api.clone(),
            ctx: self.ctx.clone(),
            process: self.process,
            rows: self.rows.clone(),
            entries,
            _guard: guard,
        }))
    }

    /// Records the outcome of a submission; accepted rows leave the form.
    pub fn finish_submission(&mut self, outcome: &LedgerResult<usize>) {
        if outcome.is_ok() {
            self.rows = EntryRows::new();
        }
    }

    /// Validate, send, and reload the remaining quantity.
    pub async fn submit(&mut self) -> LedgerResult<Option<usize>> {
        let submission = match self.prepare_submission()? {
            Some(submission) => submission,
            None => return Ok(None),
        };
        if submission.is_empty() {
            return Ok(Some(0));
        }

        let outcome = submission.send().await;
        self.finish_submission(&outcome);
        let recorded = outcome?;
        self.refresh_remaining().await?;
        Ok(Some(recorded))
    }

    /// Row errors from the last rejection, grouped per row for display.
    pub fn errors_by_row(err: &LedgerError) -> HashMap<RowId, Vec<String>> {
        let mut grouped: HashMap<RowId, Vec<String>> = HashMap::new();
        if let LedgerError::RowsRejected(rows) = err {
            for row in rows {
                grouped.entry(row.row).or_default().push(row.message.clone());
            }
        }
        grouped
    }
}
