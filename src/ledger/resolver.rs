// src/ledger/resolver.rs
//! Remaining-quantity computation.

use serde::{Deserialize, Serialize};

use super::error::LedgerResult;
use super::process::Process;
use super::store::LedgerStore;
use crate::models::Batch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Availability {
    pub upstream_supply: i64,
    pub already_produced: i64,
    /// Never negative, even when a prior stage over-produced.
    pub remaining: i64,
}

impl Availability {
    pub fn new(upstream_supply: i64, already_produced: i64) -> Self {
        Self {
            upstream_supply,
            already_produced,
            remaining: (upstream_supply - already_produced).max(0),
        }
    }
}

/// The component a stage's figures are kept per, if any.
///
/// Between two child-scoped stages supply and consumption are per child. At
/// the split (Machining) and at Dispatch the pool spans every component.
pub fn bucket_scope(process: Process, component: &str) -> Option<&str> {
    let upstream_split = process
        .predecessor()
        .map(|p| p.is_child_scoped())
        .unwrap_or(false);
    if process.is_child_scoped() && upstream_split {
        Some(component)
    } else {
        None
    }
}

/// How much of `batch` is still available to `process` for `component`.
pub async fn availability(
    store: &dyn LedgerStore,
    batch: &Batch,
    process: Process,
    component: &str,
) -> LedgerResult<Availability> {
    let scope = bucket_scope(process, component);

    let upstream_supply = match process.predecessor() {
        None => batch.max_qty,
        Some(previous) => store.produced_total(&batch.batch_id, previous, scope).await?,
    };
    let already_produced = store.produced_total(&batch.batch_id, process, scope).await?;

    Ok(Availability::new(upstream_supply, already_produced))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining_is_clamped() {
        assert_eq!(Availability::new(300, 100).remaining, 200);
        assert_eq!(Availability::new(300, 450).remaining, 0);
        assert_eq!(Availability::new(0, 0).remaining, 0);
    }

    #[test]
    fn test_bucket_scope_follows_the_split() {
        assert_eq!(bucket_scope(Process::PreMachining, "C1"), None);
        assert_eq!(bucket_scope(Process::Machining, "C1"), None);
        assert_eq!(bucket_scope(Process::FinalInspection, "C1"), Some("C1"));
        assert_eq!(bucket_scope(Process::Marking, "C1"), Some("C1"));
        assert_eq!(bucket_scope(Process::Visual, "C1"), Some("C1"));
        assert_eq!(bucket_scope(Process::Dispatch, "C1"), None);
    }
}
