//! Stats rollup workflow
//!
//! Stage order: collect the parent's children from the store, fan one
//! metric query per child out through the adapter, merge. An empty
//! child set is a valid "no metrics" result, never a failure; so is a
//! child whose metric query errors.

use crate::merge::{self, MetricSample};
use convoy_cloud::{AdapterAction, AdapterRequest};
use convoy_core::{SubStage, TaskInputs, TaskRecord};
use convoy_engine::{EngineError, Result, StageContext, StageOutcome, Workflow, fanout};
use convoy_store::QuerySpec;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

const CHILD_LINKS: &str = "child_links";
const SAMPLES: &str = "samples";
const CHILDREN_QUERIED: &str = "children_queried";

/// Rollup progression, strictly forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollupStage {
    CollectChildren,
    QueryMetrics,
    Aggregate,
}

impl SubStage for RollupStage {
    const FIRST: Self = RollupStage::CollectChildren;

    fn next(self) -> Option<Self> {
        match self {
            RollupStage::CollectChildren => Some(RollupStage::QueryMetrics),
            RollupStage::QueryMetrics => Some(RollupStage::Aggregate),
            RollupStage::Aggregate => None,
        }
    }
}

/// Aggregates metrics across the children of one parent resource
#[derive(Default)]
pub struct StatsRollupWorkflow;

impl StatsRollupWorkflow {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Workflow for StatsRollupWorkflow {
    type Stage = RollupStage;

    const KIND: &'static str = "stats-tasks";

    fn validate(&self, inputs: &TaskInputs) -> convoy_core::Result<()> {
        inputs.validate()?;
        if inputs.parent_link.is_none() {
            return Err(convoy_core::CoreError::InvalidRequest(
                "parent_link is required for a stats rollup".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        record: &TaskRecord<RollupStage>,
    ) -> Result<StageOutcome> {
        match record.sub_stage {
            RollupStage::CollectChildren => collect_children(ctx, record).await,
            RollupStage::QueryMetrics => query_metrics(ctx, record).await,
            RollupStage::Aggregate => aggregate(record),
        }
    }
}

/// Query the store for every resource whose parent link matches
async fn collect_children(
    ctx: &StageContext,
    record: &TaskRecord<RollupStage>,
) -> Result<StageOutcome> {
    let parent_link = record
        .inputs
        .parent_link
        .clone()
        .ok_or_else(|| EngineError::Validation("parent_link is missing".to_string()))?;

    let mut spec = QuerySpec::children_of(parent_link.clone());
    if let Some(kind) = record.inputs.extra::<String>("child_kind") {
        spec = spec.with_kind(kind);
    }

    let mut child_links = Vec::new();
    loop {
        let page = ctx.store.query(spec.clone()).await?;
        child_links.extend(page.documents.into_iter().map(|d| d.self_link));
        match page.next_cursor {
            Some(cursor) => spec = spec.with_cursor(cursor),
            None => break,
        }
    }
    tracing::debug!("Parent {} has {} children", parent_link, child_links.len());

    // zero children is a valid outcome; the rollup finishes with an
    // empty metrics set rather than failing
    let mut working = HashMap::new();
    working.insert(CHILD_LINKS.to_string(), json!(child_links));
    Ok(StageOutcome::proceed_with(working))
}

/// Fan one metric query per child out through the adapter
async fn query_metrics(
    ctx: &StageContext,
    record: &TaskRecord<RollupStage>,
) -> Result<StageOutcome> {
    let child_links: Vec<String> = record.working_value(CHILD_LINKS).unwrap_or_default();
    let queried = child_links.len();

    let joined = fanout::dispatch(child_links, |child| {
        let request = AdapterRequest::new(AdapterAction::QueryMetrics, child);
        async move { ctx.adapter.invoke(request).await }
    })
    .await;

    // per-child failures are excluded from the numerator, not fatal
    for (child, err) in joined.failures() {
        tracing::debug!("Child {} reported no metrics: {}", child, err);
    }

    let mut samples: HashMap<String, Vec<MetricSample>> = HashMap::new();
    for (child, response) in joined.successes() {
        let parsed: Vec<MetricSample> = match response.body.get("metrics") {
            Some(value) => match serde_json::from_value(value.clone()) {
                Ok(parsed) => parsed,
                // a child answering with garbage is a failed reporter,
                // not a failed rollup; it stays in the denominator
                Err(err) => {
                    tracing::debug!("Child {} returned unreadable metrics: {}", child, err);
                    continue;
                }
            },
            None => Vec::new(),
        };
        samples.insert(child.clone(), parsed);
    }

    let mut working = HashMap::new();
    working.insert(SAMPLES.to_string(), serde_json::to_value(&samples)?);
    working.insert(CHILDREN_QUERIED.to_string(), json!(queried));
    Ok(StageOutcome::proceed_with(working))
}

/// Merge per-child samples, single-threaded, after the join resolved
fn aggregate(record: &TaskRecord<RollupStage>) -> Result<StageOutcome> {
    let samples: HashMap<String, Vec<MetricSample>> =
        record.working_value(SAMPLES).unwrap_or_default();
    let queried: usize = record.working_value(CHILDREN_QUERIED).unwrap_or(0);

    let stats = merge::aggregate(&samples, queried);
    tracing::info!(
        "Rollup for {} aggregated {} metrics from {}/{} children",
        record.inputs.parent_link.as_deref().unwrap_or("?"),
        stats.metrics.len(),
        stats.children_reported,
        stats.children_queried
    );

    let mut outputs = HashMap::new();
    outputs.insert("stats".to_string(), serde_json::to_value(&stats)?);
    Ok(StageOutcome::finish(outputs))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        assert_eq!(RollupStage::FIRST, RollupStage::CollectChildren);
        assert_eq!(
            RollupStage::CollectChildren.next(),
            Some(RollupStage::QueryMetrics)
        );
        assert_eq!(RollupStage::QueryMetrics.next(), Some(RollupStage::Aggregate));
        assert_eq!(RollupStage::Aggregate.next(), None);
    }

    #[test]
    fn test_validate_requires_parent_link() {
        let workflow = StatsRollupWorkflow::new();
        assert!(workflow.validate(&TaskInputs::new("rollup")).is_err());
        assert!(
            workflow
                .validate(&TaskInputs::new("rollup").with_parent_link("/hosts/h1"))
                .is_ok()
        );
    }
}
