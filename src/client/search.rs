// src/client/search.rs
//! Debounced, latest-wins batch search.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{LedgerApi, RequestContext};
use crate::config::ClientConfig;
use crate::ledger::LedgerResult;
use crate::models::BatchSuggestion;

/// Proof that a read was started while a given generation was current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

/// Generation counter for one input field. A response may only be applied
/// while the ticket issued for its request is still the newest one.
#[derive(Debug, Clone, Default)]
pub struct LatestWins {
    generation: Arc<AtomicU64>,
}

impl LatestWins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&self) -> Ticket {
        Ticket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Makes every outstanding ticket stale.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }
}

pub struct BatchSearch {
    api: Arc<dyn LedgerApi>,
    ctx: RequestContext,
    debounce: Duration,
    latest: LatestWins,
}

impl BatchSearch {
    pub fn new(api: Arc<dyn LedgerApi>, ctx: RequestContext, debounce: Duration) -> Self {
        Self { api, ctx, debounce, latest: LatestWins::new() }
    }

    pub fn from_config(api: Arc<dyn LedgerApi>, ctx: RequestContext, config: &ClientConfig) -> Self {
        Self::new(api, ctx, Duration::from_millis(config.debounce_ms))
    }

    /// Runs one keystroke's search.
    ///
    /// Waits out the debounce window first; if another keystroke arrived in
    /// the meantime, or arrives before the response does, this call yields
    /// `None` and the newer call owns the result.
    pub async fn search(&self, partial: &str) -> LedgerResult<Option<Vec<BatchSuggestion>>> {
        let ticket = self.latest.issue();
        tokio::time::sleep(self.debounce).await;
        if !self.latest.is_current(ticket) {
            return Ok(None);
        }

        let partial = partial.trim();
        if partial.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let result = self.api.suggest_batches(&self.ctx, partial).await;
        if !self.latest.is_current(ticket) {
            log::debug!("Dropping stale suggestions for '{}'", partial);
            return Ok(None);
        }
        result.map(Some)
    }

    /// Drops whatever is in flight, e.g. when the field is cleared.
    pub fn cancel(&self) {
        self.latest.invalidate();
    }
}
