//! Project provisioning workflow
//!
//! Stage order: validate credentials, create the resource, grant auth,
//! start auxiliary services. Each creating stage records its undo only
//! after the provider confirmed the action, so a mid-sequence failure
//! replays a ledger that matches exactly what exists.

use convoy_cloud::{AdapterAction, AdapterRequest};
use convoy_core::{SubStage, TaskInputs, TaskRecord, UndoAction, UndoEntry};
use convoy_engine::{EngineError, Result, StageContext, StageOutcome, Workflow, fanout};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

/// Working-state keys the stages hand forward
const RESOURCE_LINK: &str = "resource_link";
const AUTH_LINK: &str = "auth_link";

/// Provisioning progression, strictly forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStage {
    ValidateCredentials,
    CreateResource,
    CreateAuth,
    StartAuxServices,
}

impl SubStage for ProvisionStage {
    const FIRST: Self = ProvisionStage::ValidateCredentials;

    fn next(self) -> Option<Self> {
        match self {
            ProvisionStage::ValidateCredentials => Some(ProvisionStage::CreateResource),
            ProvisionStage::CreateResource => Some(ProvisionStage::CreateAuth),
            ProvisionStage::CreateAuth => Some(ProvisionStage::StartAuxServices),
            ProvisionStage::StartAuxServices => None,
        }
    }
}

/// Creates a project resource with rollback on failure
#[derive(Default)]
pub struct ProvisionWorkflow;

impl ProvisionWorkflow {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Workflow for ProvisionWorkflow {
    type Stage = ProvisionStage;

    const KIND: &'static str = "provision-tasks";

    fn validate(&self, inputs: &TaskInputs) -> convoy_core::Result<()> {
        inputs.validate()?;
        if inputs.endpoint_link.is_none() {
            return Err(convoy_core::CoreError::InvalidRequest(
                "endpoint_link is required for provisioning".to_string(),
            ));
        }
        Ok(())
    }

    async fn execute(
        &self,
        ctx: &StageContext,
        record: &TaskRecord<ProvisionStage>,
    ) -> Result<StageOutcome> {
        match record.sub_stage {
            ProvisionStage::ValidateCredentials => validate_credentials(ctx, record).await,
            ProvisionStage::CreateResource => create_resource(ctx, record).await,
            ProvisionStage::CreateAuth => create_auth(ctx, record).await,
            ProvisionStage::StartAuxServices => start_aux_services(ctx, record).await,
        }
    }
}

async fn validate_credentials(
    ctx: &StageContext,
    record: &TaskRecord<ProvisionStage>,
) -> Result<StageOutcome> {
    let endpoint = endpoint_link(record)?;
    ctx.adapter
        .invoke(AdapterRequest::new(AdapterAction::CheckAuth, endpoint))
        .await?;
    Ok(StageOutcome::proceed())
}

async fn create_resource(
    ctx: &StageContext,
    record: &TaskRecord<ProvisionStage>,
) -> Result<StageOutcome> {
    let endpoint = endpoint_link(record)?;
    let response = ctx
        .adapter
        .invoke(
            AdapterRequest::new(AdapterAction::Create, endpoint)
                .with_payload(json!({ "name": record.inputs.resource_name })),
        )
        .await?;

    let resource_link = response
        .body
        .get(RESOURCE_LINK)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("/resources/{}", record.inputs.resource_name));
    tracing::info!("Created resource {}", resource_link);

    let mut working = HashMap::new();
    working.insert(RESOURCE_LINK.to_string(), json!(resource_link));
    Ok(StageOutcome::Proceed {
        working,
        undo: vec![UndoEntry::new(resource_link, UndoAction::Delete, 0)],
    })
}

async fn create_auth(
    ctx: &StageContext,
    record: &TaskRecord<ProvisionStage>,
) -> Result<StageOutcome> {
    let resource_link = working_link(record, RESOURCE_LINK)?;
    let role = record
        .inputs
        .extra::<String>("role")
        .unwrap_or_else(|| "owner".to_string());
    let response = ctx
        .adapter
        .invoke(
            AdapterRequest::new(AdapterAction::Grant, resource_link.clone())
                .with_payload(json!({ "role": role })),
        )
        .await?;

    let auth_link = response
        .body
        .get(AUTH_LINK)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}/auth", resource_link));
    tracing::info!("Granted {} on {}", role, resource_link);

    let mut working = HashMap::new();
    working.insert(AUTH_LINK.to_string(), json!(auth_link));
    Ok(StageOutcome::Proceed {
        working,
        // revoked before the resource it references is deleted
        undo: vec![UndoEntry::new(auth_link, UndoAction::Revoke, 1)],
    })
}

async fn start_aux_services(
    ctx: &StageContext,
    record: &TaskRecord<ProvisionStage>,
) -> Result<StageOutcome> {
    let services: Vec<String> = record.inputs.extra("aux_services").unwrap_or_default();

    let joined = fanout::dispatch(services, |service| {
        let request = AdapterRequest::new(AdapterAction::Start, service);
        async move { ctx.adapter.invoke(request).await }
    })
    .await;

    // one failed start fails the whole stage; the ledger rolls the rest back
    if let Some((service, err)) = joined.first_failure() {
        return Err(EngineError::stage(
            ProvisionStage::StartAuxServices,
            format!("starting {} failed: {}", service, err),
        ));
    }

    let mut outputs = HashMap::new();
    outputs.insert(
        RESOURCE_LINK.to_string(),
        json!(working_link(record, RESOURCE_LINK)?),
    );
    outputs.insert(AUTH_LINK.to_string(), json!(working_link(record, AUTH_LINK)?));
    outputs.insert("aux_started".to_string(), json!(joined.len()));
    Ok(StageOutcome::finish(outputs))
}

fn endpoint_link(record: &TaskRecord<ProvisionStage>) -> Result<String> {
    record
        .inputs
        .endpoint_link
        .clone()
        .ok_or_else(|| EngineError::Validation("endpoint_link is missing".to_string()))
}

fn working_link(record: &TaskRecord<ProvisionStage>, key: &str) -> Result<String> {
    record.working_value(key).ok_or_else(|| {
        EngineError::stage(record.sub_stage, format!("working state lacks {}", key))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = ProvisionStage::FIRST;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage, "stages must advance strictly forward");
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 4);
        assert_eq!(stage, ProvisionStage::StartAuxServices);
    }

    #[test]
    fn test_validate_requires_endpoint() {
        let workflow = ProvisionWorkflow::new();
        let inputs = TaskInputs::new("proj-1");
        assert!(workflow.validate(&inputs).is_err());
        assert!(
            workflow
                .validate(&inputs.with_endpoint_link("/endpoints/azure"))
                .is_ok()
        );
    }
}
