//! In-memory pipeline that answers the same routes as the real backend.
//!
//! Progression is driven purely by the calls it receives, so a session is
//! reproducible: every status poll moves a workflow one step further along the
//! pipeline and every A/B poll adds one simulated hour of traffic.

use std::collections::BTreeMap;
use std::sync::Mutex;

use reel_core::commands::StartWorkflowRequest;
use reel_core::error::RequestError;
use reel_core::model::AbTestPhase;
use reel_core::model::AbTestStatus;
use reel_core::model::ScriptVariant;
use reel_core::model::ThumbnailVariant;
use reel_core::model::VariantMetrics;
use reel_core::model::WorkflowDetail;
use reel_core::model::WorkflowId;
use reel_core::model::WorkflowStatus;
use reel_core::model::WorkflowSummary;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use serde_json::Value;

use crate::client::ApiPath;
use crate::client::Method;
use crate::client::RemoteClient;
use crate::contracts::ApproveRequest;
use crate::contracts::DeclareWinnerRequest;
use crate::contracts::ReviewDecision;
use crate::contracts::SelectThumbnailRequest;
use crate::contracts::StopTestRequest;

const STYLES: [(&str, f64); 3] = [
    ("face_focus", 0.085),
    ("product_demo", 0.062),
    ("text_heavy", 0.058),
];
const IMPRESSIONS_PER_HOUR: u64 = 600;
const HOURS_TO_CONFIDENCE: u32 = 6;
const TEST_WINDOW_SECONDS: f64 = 72.0 * 3_600.0;
const STARTED_AT: f64 = 1_700_000_000.0;

#[derive(Debug, Clone)]
struct SimTest {
    variants: Vec<(String, String, f64)>,
    hours: u32,
    phase: AbTestPhase,
    winner_id: Option<String>,
}

impl SimTest {
    fn new(thumbnails: &[ThumbnailVariant]) -> Self {
        Self {
            variants: thumbnails
                .iter()
                .zip(STYLES)
                .map(|(thumbnail, (_, ctr))| (thumbnail.id.clone(), thumbnail.style.clone(), ctr))
                .collect(),
            hours: 0,
            phase: AbTestPhase::Running,
            winner_id: None,
        }
    }

    fn is_running(&self) -> bool {
        self.phase == AbTestPhase::Running
    }

    fn best(&self) -> Option<String> {
        self.variants
            .iter()
            .fold(None::<&(String, String, f64)>, |best, variant| match best {
                Some(current) if current.2 >= variant.2 => Some(current),
                _ => Some(variant),
            })
            .map(|(id, _, _)| id.clone())
    }

    fn confidence(&self) -> f64 {
        (f64::from(self.hours) / f64::from(HOURS_TO_CONFIDENCE) * 0.96).min(0.99)
    }

    fn advance(&mut self) {
        if !self.is_running() {
            return;
        }
        self.hours += 1;
        if self.hours >= HOURS_TO_CONFIDENCE {
            self.phase = AbTestPhase::Completed;
            self.winner_id = self.best();
        }
    }

    fn snapshot(&self, workflow_id: &WorkflowId) -> AbTestStatus {
        let per_variant = IMPRESSIONS_PER_HOUR * u64::from(self.hours);
        let variants: Vec<VariantMetrics> = self
            .variants
            .iter()
            .map(|(id, style, ctr)| VariantMetrics {
                thumbnail_id: id.clone(),
                style: style.clone(),
                impressions: per_variant,
                clicks: (per_variant as f64 * ctr) as u64,
                ctr: *ctr,
                avg_view_duration: 40.0,
                confidence: self.confidence(),
            })
            .collect();
        let elapsed = f64::from(self.hours) * 3_600.0;
        AbTestStatus {
            workflow_id: workflow_id.clone(),
            status: self.phase.clone(),
            is_running: self.is_running(),
            total_impressions: per_variant * variants.len() as u64,
            variants,
            current_confidence: self.confidence(),
            winner_id: self.winner_id.clone(),
            elapsed_time_seconds: elapsed,
            estimated_time_remaining: if self.is_running() {
                TEST_WINDOW_SECONDS - elapsed
            } else {
                0.0
            },
            checks_completed: self.hours,
            can_declare_early: self.confidence() >= 0.9,
        }
    }
}

#[derive(Debug, Clone)]
struct SimWorkflow {
    detail: WorkflowDetail,
    topic: String,
    created_ts: f64,
    updated_ts: f64,
    script_round: u32,
    test: Option<SimTest>,
}

impl SimWorkflow {
    fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            workflow_id: self.detail.workflow_id.clone(),
            topic: self.topic.clone(),
            status: self.detail.status.clone(),
            current_step: self.detail.current_step.clone(),
            created_ts: self.created_ts,
            updated_ts: self.updated_ts,
        }
    }

    fn set_status(&mut self, status: WorkflowStatus, step: &str, requires_action: Option<&str>) {
        self.detail.status = status;
        self.detail.current_step = step.to_string();
        self.detail.requires_action = requires_action.map(str::to_string);
        self.updated_ts += 60.0;
    }

    fn regenerate_scripts(&mut self) {
        self.script_round += 1;
        let round = self.script_round;
        self.detail.scripts = (1..=3)
            .map(|n| ScriptVariant {
                id: format!("s{round}-{n}"),
                hook: format!("Hook {n} for {}", self.topic),
                body: format!("Round {round} draft {n} about {}", self.topic),
                cta: "Follow for more".to_string(),
                tone: Some(["energetic", "calm", "curious"][(n - 1) as usize].to_string()),
                predicted_retention: Some(0.4 + f64::from(n) * 0.1),
            })
            .collect();
        self.detail.selected_script_id = None;
        *self.detail.token_usage.entry("scripts".to_string()).or_default() += 1_200.0;
    }

    /// One pipeline step per status poll while the backend owns the workflow.
    fn advance(&mut self) {
        match self.detail.status {
            WorkflowStatus::GeneratingScripts => {
                self.regenerate_scripts();
                self.set_status(
                    WorkflowStatus::AwaitingApproval,
                    "script_review",
                    Some("approve_script"),
                );
            }
            WorkflowStatus::Running if self.detail.thumbnails.is_empty() => {
                self.detail.thumbnails = STYLES
                    .iter()
                    .enumerate()
                    .map(|(idx, (style, _))| ThumbnailVariant {
                        id: format!("t{}", idx + 1),
                        style: style.to_string(),
                        prompt: format!("{style} thumbnail for {}", self.topic),
                        image_url: format!(
                            "https://images.invalid/{}/t{}.png",
                            self.detail.workflow_id,
                            idx + 1
                        ),
                        seed: 1_000 + idx as i64,
                    })
                    .collect();
                *self.detail.token_usage.entry("thumbnails".to_string()).or_default() += 300.0;
                self.set_status(
                    WorkflowStatus::AwaitingThumbnailSelection,
                    "thumbnail_review",
                    Some("select_thumbnail"),
                );
            }
            _ => {}
        }
    }

    fn finish_test(&mut self) {
        self.set_status(WorkflowStatus::Completed, "done", None);
    }
}

#[derive(Debug, Default)]
struct SimBackend {
    workflows: BTreeMap<WorkflowId, SimWorkflow>,
    next_id: u64,
}

impl SimBackend {
    fn workflow_mut(&mut self, id: &str) -> Result<&mut SimWorkflow, RequestError> {
        self.workflows
            .get_mut(&WorkflowId::from(id))
            .ok_or_else(|| RequestError::http(404, "Workflow not found"))
    }

    fn start(&mut self, request: StartWorkflowRequest) -> Result<Value, RequestError> {
        let topic = request.topic.trim().to_string();
        if topic.is_empty() {
            return Err(RequestError::http(422, "topic must not be empty"));
        }
        self.next_id += 1;
        let id = WorkflowId::from(format!("sim-{:04}", self.next_id));
        let created_ts = STARTED_AT + self.next_id as f64 * 3_600.0;
        let workflow = SimWorkflow {
            detail: WorkflowDetail {
                workflow_id: id.clone(),
                status: WorkflowStatus::GeneratingScripts,
                current_step: "script_generation".to_string(),
                requires_action: None,
                scripts: Vec::new(),
                selected_script_id: None,
                thumbnails: Vec::new(),
                selected_thumbnail_id: None,
                token_usage: BTreeMap::new(),
            },
            topic,
            created_ts,
            updated_ts: created_ts,
            script_round: 0,
            test: None,
        };
        let detail = workflow.detail.clone();
        self.workflows.insert(id, workflow);
        encode(&detail)
    }

    fn route(
        &mut self,
        method: Method,
        path: &ApiPath,
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        let segments: Vec<&str> = path.segments().collect();
        match (method, segments.as_slice()) {
            (Method::Get, ["health"]) => Ok(json!({"status": "healthy"})),
            (Method::Get, ["workflows"]) => {
                let list: Vec<WorkflowSummary> = self
                    .workflows
                    .values()
                    .rev()
                    .map(SimWorkflow::summary)
                    .collect();
                encode(&list)
            }
            (Method::Post, ["workflows", "start"]) => self.start(decode(body)?),
            (Method::Get, ["workflows", id, "status"]) => {
                let workflow = self.workflow_mut(id)?;
                let detail = workflow.detail.clone();
                workflow.advance();
                encode(&detail)
            }
            (Method::Post, ["workflows", id, "approve"]) => {
                let request: ApproveRequest = decode(body)?;
                let workflow = self.workflow_mut(id)?;
                if workflow.detail.status != WorkflowStatus::AwaitingApproval {
                    return Err(RequestError::http(409, "Workflow is not awaiting approval"));
                }
                match request.action {
                    ReviewDecision::Approve => {
                        let script_id = request
                            .selected_script_id
                            .filter(|id| workflow.detail.script(id).is_some())
                            .ok_or_else(|| RequestError::http(400, "Unknown script id"))?;
                        workflow.detail.selected_script_id = Some(script_id);
                        workflow.set_status(WorkflowStatus::Running, "thumbnail_generation", None);
                    }
                    ReviewDecision::Reject => {
                        workflow.regenerate_scripts();
                        workflow.set_status(
                            WorkflowStatus::AwaitingApproval,
                            "script_review",
                            Some("approve_script"),
                        );
                    }
                }
                encode(&workflow.detail)
            }
            (Method::Post, ["workflows", id, "select-thumbnail"]) => {
                let request: SelectThumbnailRequest = decode(body)?;
                let workflow = self.workflow_mut(id)?;
                if workflow.detail.status != WorkflowStatus::AwaitingThumbnailSelection {
                    return Err(RequestError::http(
                        409,
                        "Workflow is not awaiting thumbnail selection",
                    ));
                }
                if workflow.detail.thumbnail(&request.selected_thumbnail_id).is_none() {
                    return Err(RequestError::http(400, "Unknown thumbnail id"));
                }
                workflow.detail.selected_thumbnail_id = Some(request.selected_thumbnail_id);
                workflow.test = Some(SimTest::new(&workflow.detail.thumbnails));
                workflow.set_status(WorkflowStatus::AbTesting, "ab_testing", None);
                encode(&workflow.detail)
            }
            (Method::Get, ["workflows", id, "ab-status"]) => {
                let workflow = self.workflow_mut(id)?;
                let Some(test) = workflow.test.as_mut() else {
                    return Err(RequestError::http(404, "No A/B test for this workflow"));
                };
                test.advance();
                let snapshot = test.snapshot(&workflow.detail.workflow_id);
                if !snapshot.is_running && workflow.detail.status == WorkflowStatus::AbTesting {
                    workflow.finish_test();
                }
                encode(&snapshot)
            }
            (Method::Post, ["workflows", id, "declare-winner"]) => {
                let request: DeclareWinnerRequest = decode(body)?;
                let workflow = self.workflow_mut(id)?;
                let test = running_test(workflow)?;
                if !test.variants.iter().any(|(id, _, _)| *id == request.thumbnail_id) {
                    return Err(RequestError::http(400, "Unknown thumbnail id"));
                }
                test.phase = AbTestPhase::ManualOverride;
                test.winner_id = Some(request.thumbnail_id.clone());
                workflow.finish_test();
                Ok(json!({"status": "winner_declared", "winner_id": request.thumbnail_id}))
            }
            (Method::Post, ["workflows", id, "stop-test"]) => {
                let request: StopTestRequest = decode(body)?;
                let workflow = self.workflow_mut(id)?;
                let test = running_test(workflow)?;
                test.phase = AbTestPhase::Completed;
                test.winner_id = test.best();
                let winner_id = test.winner_id.clone();
                workflow.finish_test();
                Ok(json!({
                    "status": "stopped",
                    "reason": request.reason,
                    "winner_id": winner_id,
                }))
            }
            _ => Err(RequestError::http(404, "Not Found")),
        }
    }
}

fn running_test(workflow: &mut SimWorkflow) -> Result<&mut SimTest, RequestError> {
    match workflow.test.as_mut() {
        Some(test) if test.is_running() => Ok(test),
        _ => Err(RequestError::http(409, "A/B test is not running")),
    }
}

fn decode<T: DeserializeOwned>(body: Option<&Value>) -> Result<T, RequestError> {
    let body = body.cloned().unwrap_or(Value::Null);
    serde_json::from_value(body).map_err(|err| RequestError::http(422, err.to_string()))
}

fn encode<T: Serialize>(value: &T) -> Result<Value, RequestError> {
    serde_json::to_value(value).map_err(|err| RequestError::transport(err.to_string()))
}

/// Deterministic stand-in for the pipeline backend.
#[derive(Debug, Default)]
pub struct SimulatedRemoteClient {
    backend: Mutex<SimBackend>,
}

impl SimulatedRemoteClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a workflow directly, bypassing the HTTP surface.
    pub fn seed_workflow(&self, topic: &str) -> Result<WorkflowId, RequestError> {
        let value = self.lock()?.start(StartWorkflowRequest {
            topic: topic.to_string(),
            platforms: vec!["youtube".to_string()],
            user_id: None,
            brand_voice: None,
        })?;
        let detail: WorkflowDetail = decode(Some(&value))?;
        Ok(detail.workflow_id)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, SimBackend>, RequestError> {
        self.backend
            .lock()
            .map_err(|_| RequestError::transport("simulated backend poisoned"))
    }
}

impl RemoteClient for SimulatedRemoteClient {
    fn request(
        &self,
        method: Method,
        path: &ApiPath,
        body: Option<&Value>,
    ) -> Result<Value, RequestError> {
        self.lock()?.route(method, path, body)
    }
}
