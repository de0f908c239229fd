//! Typed routes of the pipeline API on top of a [`RemoteClient`].

use reel_core::cache::QueryKey;
use reel_core::cache::QueryPayload;
use reel_core::commands::Command;
use reel_core::commands::CommandOutcome;
use reel_core::commands::StartWorkflowRequest;
use reel_core::error::RequestError;
use reel_core::model::AbTestStatus;
use reel_core::model::HealthStatus;
use reel_core::model::WorkflowDetail;
use reel_core::model::WorkflowId;
use reel_core::model::WorkflowSummary;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::client::ApiPath;
use crate::client::Method;
use crate::client::RemoteClient;
use crate::contracts::ApproveRequest;
use crate::contracts::DeclareWinnerRequest;
use crate::contracts::ReviewDecision;
use crate::contracts::SelectThumbnailRequest;
use crate::contracts::StopTestRequest;

#[derive(Debug, Clone)]
pub struct ConsoleApi<C> {
    client: C,
}

impl<C: RemoteClient> ConsoleApi<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn health(&self) -> Result<HealthStatus, RequestError> {
        self.get(ApiPath::new(["health"]))
    }

    pub fn list_workflows(&self) -> Result<Vec<WorkflowSummary>, RequestError> {
        self.get(ApiPath::new(["workflows"]))
    }

    pub fn start_workflow(
        &self,
        request: &StartWorkflowRequest,
    ) -> Result<WorkflowDetail, RequestError> {
        self.post(ApiPath::new(["workflows", "start"]), request)
    }

    pub fn workflow_status(&self, id: &WorkflowId) -> Result<WorkflowDetail, RequestError> {
        self.get(workflow_path(id, "status"))
    }

    pub fn ab_status(&self, id: &WorkflowId) -> Result<AbTestStatus, RequestError> {
        self.get(workflow_path(id, "ab-status"))
    }

    pub fn approve_script(
        &self,
        id: &WorkflowId,
        script_id: &str,
    ) -> Result<WorkflowDetail, RequestError> {
        let body = ApproveRequest {
            action: ReviewDecision::Approve,
            selected_script_id: Some(script_id.to_string()),
        };
        self.post(workflow_path(id, "approve"), &body)
    }

    pub fn reject_scripts(&self, id: &WorkflowId) -> Result<WorkflowDetail, RequestError> {
        let body = ApproveRequest {
            action: ReviewDecision::Reject,
            selected_script_id: None,
        };
        self.post(workflow_path(id, "approve"), &body)
    }

    pub fn select_thumbnail(
        &self,
        id: &WorkflowId,
        thumbnail_id: &str,
    ) -> Result<WorkflowDetail, RequestError> {
        let body = SelectThumbnailRequest {
            selected_thumbnail_id: thumbnail_id.to_string(),
        };
        self.post(workflow_path(id, "select-thumbnail"), &body)
    }

    /// The acknowledgement body is opaque; callers refetch the A/B status.
    pub fn declare_winner(
        &self,
        id: &WorkflowId,
        thumbnail_id: &str,
    ) -> Result<Value, RequestError> {
        let body = DeclareWinnerRequest {
            thumbnail_id: thumbnail_id.to_string(),
        };
        self.post(workflow_path(id, "declare-winner"), &body)
    }

    pub fn stop_test(&self, id: &WorkflowId, reason: Option<&str>) -> Result<Value, RequestError> {
        let body = StopTestRequest {
            reason: reason.map(str::to_string),
        };
        self.post(workflow_path(id, "stop-test"), &body)
    }

    /// Fetches the snapshot behind a cache key.
    pub fn execute_query(&self, key: &QueryKey) -> Result<QueryPayload, RequestError> {
        match key {
            QueryKey::Workflow(id) => self.workflow_status(id).map(QueryPayload::Workflow),
            QueryKey::AbStatus(id) => self.ab_status(id).map(QueryPayload::AbStatus),
            QueryKey::WorkflowList => self.list_workflows().map(QueryPayload::WorkflowList),
            QueryKey::Health => self.health().map(QueryPayload::Health),
        }
    }

    pub fn execute_command(&self, command: &Command) -> Result<CommandOutcome, RequestError> {
        match command {
            Command::Approve {
                workflow_id,
                script_id,
            } => self
                .approve_script(workflow_id, script_id)
                .map(CommandOutcome::Workflow),
            Command::Reject { workflow_id } => {
                self.reject_scripts(workflow_id).map(CommandOutcome::Workflow)
            }
            Command::SelectThumbnail {
                workflow_id,
                thumbnail_id,
            } => self
                .select_thumbnail(workflow_id, thumbnail_id)
                .map(CommandOutcome::Workflow),
            Command::DeclareWinner {
                workflow_id,
                thumbnail_id,
            } => self
                .declare_winner(workflow_id, thumbnail_id)
                .map(CommandOutcome::Ack),
            Command::StopTest {
                workflow_id,
                reason,
            } => self
                .stop_test(workflow_id, Some(reason))
                .map(CommandOutcome::Ack),
            Command::StartWorkflow(request) => {
                self.start_workflow(request).map(CommandOutcome::Workflow)
            }
        }
    }

    fn get<T: DeserializeOwned>(&self, path: ApiPath) -> Result<T, RequestError> {
        let value = self.client.request(Method::Get, &path, None)?;
        decode(&path, value)
    }

    fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: ApiPath,
        body: &B,
    ) -> Result<T, RequestError> {
        let body = serde_json::to_value(body)
            .map_err(|err| RequestError::transport(format!("failed to encode request: {err}")))?;
        let value = self.client.request(Method::Post, &path, Some(&body))?;
        decode(&path, value)
    }
}

fn workflow_path(id: &WorkflowId, action: &str) -> ApiPath {
    ApiPath::new(["workflows", id.as_str(), action])
}

fn decode<T: DeserializeOwned>(path: &ApiPath, value: Value) -> Result<T, RequestError> {
    serde_json::from_value(value).map_err(|err| {
        debug!(event = "decode_failed", path = %path, error = %err);
        RequestError::transport(format!("unexpected response from {path}: {err}"))
    })
}
