//! Compensation ledger replay
//!
//! As a multi-step operation succeeds, each step records the action
//! that would undo it. When a later step fails, the ledger is replayed
//! best-effort: newest batch first, entries within a batch in parallel,
//! and a failed undo never aborts the remaining attempts. The goal is
//! maximum cleanup, not all-or-nothing rollback.

use crate::fanout;
use convoy_cloud::{AdapterAction, AdapterRequest, CloudAdapter};
use convoy_core::{UndoAction, UndoEntry};
use std::collections::BTreeMap;

/// Working-state key set when a failed record's ledger has been replayed
///
/// Persisted together with the `Failed` transition, so a record is never
/// replayed twice even if the failure path is re-entered.
pub const REPLAY_MARKER: &str = "compensation_replayed";

/// Ordered undo actions for one task record
#[derive(Debug, Default)]
pub struct CompensationLedger {
    entries: Vec<UndoEntry>,
}

impl CompensationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rehydrate the ledger persisted on a task record
    pub fn from_entries(entries: Vec<UndoEntry>) -> Self {
        Self { entries }
    }

    /// Append an undo descriptor, oldest first
    ///
    /// Callers record an entry only after the action it compensates has
    /// durably succeeded, never speculatively.
    pub fn record(&mut self, entry: UndoEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Execute all recorded undo actions, newest batch first
    ///
    /// Entries sharing a batch are independent and dispatched in
    /// parallel; batches stay strictly ordered relative to each other
    /// (a role is revoked before the resource it references is
    /// deleted). Consumes the ledger: replay happens at most once.
    pub async fn replay(self, adapter: &dyn CloudAdapter) -> ReplayOutcome {
        let mut batches: BTreeMap<u32, Vec<UndoEntry>> = BTreeMap::new();
        for entry in self.entries {
            batches.entry(entry.batch).or_default().push(entry);
        }

        let mut outcome = ReplayOutcome::default();
        for (batch, entries) in batches.into_iter().rev() {
            tracing::debug!("Replaying compensation batch {} ({} entries)", batch, entries.len());
            let joined = fanout::dispatch(entries, |entry| {
                let request = undo_request(&entry);
                async move { adapter.invoke(request).await }
            })
            .await;

            for (entry, result) in joined.into_outcomes() {
                outcome.attempted += 1;
                match result {
                    Ok(_) => {
                        tracing::debug!("Undid {} on {}", entry.action, entry.target_link);
                        outcome.undone += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            "Compensation of {} failed, continuing replay: {}",
                            entry.target_link,
                            e
                        );
                        outcome.failed.push(ReplayFailure {
                            target_link: entry.target_link,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
        outcome
    }
}

/// Map a recorded undo entry to the adapter request that executes it
fn undo_request(entry: &UndoEntry) -> AdapterRequest {
    let action = match entry.action {
        UndoAction::Delete => AdapterAction::Delete,
        UndoAction::Revoke => AdapterAction::Revoke,
        UndoAction::Stop => AdapterAction::Stop,
    };
    AdapterRequest::new(action, entry.target_link.clone()).with_payload(entry.payload.clone())
}

/// Aggregate result of one replay
#[derive(Debug, Default)]
pub struct ReplayOutcome {
    /// Undo actions issued
    pub attempted: usize,

    /// Undo actions that succeeded
    pub undone: usize,

    /// Undo actions that failed, logged and collected
    pub failed: Vec<ReplayFailure>,
}

impl ReplayOutcome {
    pub fn fully_undone(&self) -> bool {
        self.failed.is_empty()
    }
}

/// One failed undo attempt
#[derive(Debug)]
pub struct ReplayFailure {
    pub target_link: String,
    pub message: String,
}
