//! Lifecycle and sub-stage machinery
//!
//! A task moves through two coordinates: the coarse [`LifecycleStage`]
//! shared by every task kind, and a workflow-specific [`SubStage`] enum
//! that advances strictly forward while the lifecycle sits in `Started`.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;

/// Coarse lifecycle of a task record
///
/// Terminal values (`Finished`, `Failed`, `Cancelled`) are immutable:
/// once observed, no further transition is ever accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleStage {
    /// Persisted but no stage action has completed yet
    Created,
    /// At least one stage action has run; re-entrant while running
    Started,
    /// All stages completed successfully
    Finished,
    /// A stage action failed; the record carries a failure reason
    Failed,
    /// Cancelled by the caller before reaching a natural terminal
    Cancelled,
}

impl LifecycleStage {
    /// Whether this stage admits no further transitions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LifecycleStage::Finished | LifecycleStage::Failed | LifecycleStage::Cancelled
        )
    }

    /// The monotonic transition lattice
    ///
    /// `Started -> Started` is the re-entrant self-transition taken on
    /// every successful stage completion; everything else moves forward
    /// exactly once. `Cancelled` is reachable only from `Started`: a
    /// caller cancelling a `Created` record moves it through `Started`
    /// first.
    pub fn can_transition_to(&self, next: LifecycleStage) -> bool {
        use LifecycleStage::*;
        match (self, next) {
            (Created, Started) | (Created, Failed) => true,
            (Started, Started) | (Started, Finished) | (Started, Failed) | (Started, Cancelled) => {
                true
            }
            _ => false,
        }
    }
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleStage::Created => write!(f, "created"),
            LifecycleStage::Started => write!(f, "started"),
            LifecycleStage::Finished => write!(f, "finished"),
            LifecycleStage::Failed => write!(f, "failed"),
            LifecycleStage::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Workflow-specific stage progression
///
/// Implemented by each workflow's stage enum. The transition function is
/// a pure lookup from the current stage to the next; the derived `Ord`
/// must match progression order so that "already passed" checks work.
pub trait SubStage:
    fmt::Debug + Copy + Eq + Ord + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The stage every new record starts in
    const FIRST: Self;

    /// The stage that follows this one, or `None` for the last stage
    fn next(self) -> Option<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_stages() {
        assert!(!LifecycleStage::Created.is_terminal());
        assert!(!LifecycleStage::Started.is_terminal());
        assert!(LifecycleStage::Finished.is_terminal());
        assert!(LifecycleStage::Failed.is_terminal());
        assert!(LifecycleStage::Cancelled.is_terminal());
    }

    #[test]
    fn test_reentrant_started() {
        assert!(LifecycleStage::Started.can_transition_to(LifecycleStage::Started));
        assert!(!LifecycleStage::Created.can_transition_to(LifecycleStage::Created));
    }

    #[test]
    fn test_terminal_is_immutable() {
        for terminal in [
            LifecycleStage::Finished,
            LifecycleStage::Failed,
            LifecycleStage::Cancelled,
        ] {
            for next in [
                LifecycleStage::Created,
                LifecycleStage::Started,
                LifecycleStage::Finished,
                LifecycleStage::Failed,
                LifecycleStage::Cancelled,
            ] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn test_created_cannot_finish_directly() {
        assert!(!LifecycleStage::Created.can_transition_to(LifecycleStage::Finished));
    }

    #[test]
    fn test_cancelled_only_reachable_from_started() {
        assert!(!LifecycleStage::Created.can_transition_to(LifecycleStage::Cancelled));
        assert!(LifecycleStage::Started.can_transition_to(LifecycleStage::Cancelled));
    }
}
