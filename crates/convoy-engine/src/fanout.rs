//! Fan-out/join of independent sub-requests
//!
//! [`dispatch`] runs one future per request concurrently and waits for
//! every one of them to reach a terminal outcome. It never
//! short-circuits on the first failure: the caller always gets exactly
//! N keyed outcomes for N requests and decides itself whether a partial
//! failure is fatal (provisioning: usually yes; stats rollup: no).

use futures_util::future::join_all;
use std::future::Future;

/// Combined result of one fan-out, one entry per dispatched request
#[derive(Debug)]
pub struct FanOutResult<K, T, E> {
    outcomes: Vec<(K, Result<T, E>)>,
}

impl<K, T, E> FanOutResult<K, T, E> {
    /// All outcomes, in dispatch order
    pub fn outcomes(&self) -> &[(K, Result<T, E>)] {
        &self.outcomes
    }

    pub fn into_outcomes(self) -> Vec<(K, Result<T, E>)> {
        self.outcomes
    }

    /// Number of dispatched requests
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Requests that succeeded, with their results
    pub fn successes(&self) -> impl Iterator<Item = (&K, &T)> {
        self.outcomes
            .iter()
            .filter_map(|(k, r)| r.as_ref().ok().map(|t| (k, t)))
    }

    /// Requests that failed, with their errors
    pub fn failures(&self) -> impl Iterator<Item = (&K, &E)> {
        self.outcomes
            .iter()
            .filter_map(|(k, r)| r.as_ref().err().map(|e| (k, e)))
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, r)| r.is_ok())
    }

    pub fn first_failure(&self) -> Option<(&K, &E)> {
        self.failures().next()
    }
}

/// Dispatch all requests concurrently and join every outcome
///
/// An empty request list resolves immediately with an empty result;
/// zero sub-requests is a valid, non-error outcome.
pub async fn dispatch<K, T, E, F, Fut>(requests: Vec<K>, op: F) -> FanOutResult<K, T, E>
where
    K: Clone,
    F: Fn(K) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let branches = requests.into_iter().map(|request| {
        let branch = op(request.clone());
        async move { (request, branch.await) }
    });
    FanOutResult {
        outcomes: join_all(branches).await,
    }
}
