//! Project teardown workflow
//!
//! Deletes a provisioned project in reverse order of creation: stop
//! auxiliary services, revoke auth, delete the resource. Stop failures
//! are tolerated (the service may already be gone); a failed revoke or
//! delete fails the task so the caller sees what was left behind.

use convoy_cloud::{AdapterAction, AdapterRequest};
use convoy_core::{SubStage, TaskInputs, TaskRecord};
use convoy_engine::{EngineError, Result, StageContext, StageOutcome, Workflow, fanout};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Teardown progression, reverse of provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownStage {
    StopAuxServices,
    RevokeAuth,
    DeleteResource,
}

impl SubStage for TeardownStage {
    const FIRST: Self = TeardownStage::StopAuxServices;

    fn next(self) -> Option<Self> {
        match self {
            TeardownStage::StopAuxServices => Some(TeardownStage::RevokeAuth),
            TeardownStage::RevokeAuth => Some(TeardownStage::DeleteResource),
            TeardownStage::DeleteResource => None,
        }
    }
}

/// Deletes a provisioned project
#[derive(Default)]
pub struct TeardownWorkflow;

impl TeardownWorkflow {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Workflow for TeardownWorkflow {
    type Stage = TeardownStage;

    const KIND: &'static str = "teardown-tasks";

    fn validate(&self, inputs: &TaskInputs) -> convoy_core::Result<()> {
        inputs.validate()?;
        if inputs.extra::<String>("resource_link").is_none() {
            return Err(convoy_core::CoreError::InvalidRequest(
                "resource_link is required for teardown".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        record: &TaskRecord<TeardownStage>,
    ) -> Result<StageOutcome> {
        match record.sub_stage {
            TeardownStage::StopAuxServices => stop_aux_services(ctx, record).await,
            TeardownStage::RevokeAuth => revoke_auth(ctx, record).await,
            TeardownStage::DeleteResource => delete_resource(ctx, record).await,
        }
    }
}

async fn stop_aux_services(
    ctx: &StageContext,
    record: &TaskRecord<TeardownStage>,
) -> Result<StageOutcome> {
    let services: Vec<String> = record.inputs.extra("aux_services").unwrap_or_default();

    let joined = fanout::dispatch(services, |service| {
        let request = AdapterRequest::new(AdapterAction::Stop, service);
        async move { ctx.adapter.invoke(request).await }
    })
    .await;

    // a service that fails to stop must not block the deletion
    for (service, err) in joined.failures() {
        tracing::warn!("Stopping {} failed, continuing teardown: {}", service, err);
    }

    let mut working = HashMap::new();
    working.insert(
        "aux_stopped".to_string(),
        json!(joined.successes().count()),
    );
    Ok(StageOutcome::proceed_with(working))
}

async fn revoke_auth(
    ctx: &StageContext,
    record: &TaskRecord<TeardownStage>,
) -> Result<StageOutcome> {
    if let Some(auth_link) = record.inputs.extra::<String>("auth_link") {
        ctx.adapter
            .invoke(AdapterRequest::new(AdapterAction::Revoke, auth_link))
            .await?;
    }
    Ok(StageOutcome::proceed())
}

async fn delete_resource(
    ctx: &StageContext,
    record: &TaskRecord<TeardownStage>,
) -> Result<StageOutcome> {
    let resource_link = record
        .inputs
        .extra::<String>("resource_link")
        .ok_or_else(|| EngineError::Validation("resource_link is missing".to_string()))?;
    ctx.adapter
        .invoke(AdapterRequest::new(AdapterAction::Delete, resource_link.clone()))
        .await?;
    tracing::info!("Deleted resource {}", resource_link);

    let mut outputs = HashMap::new();
    outputs.insert("deleted".to_string(), json!(resource_link));
    Ok(StageOutcome::finish(outputs))
}
