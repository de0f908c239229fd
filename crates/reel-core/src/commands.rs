//! Mutating requests and the client-side guards that run before them.

use serde::Deserialize;
use serde::Serialize;

use crate::cache::QueryKey;
use crate::error::PreconditionError;
use crate::model::WorkflowDetail;
use crate::model::WorkflowId;
use crate::stage::resolve_stage;
use crate::stage::StageInput;
use crate::state::ConsoleState;
use crate::state::Route;

pub const MAX_TOPIC_CHARS: usize = 160;
pub const DEFAULT_PLATFORM: &str = "youtube";
pub const DEFAULT_STOP_REASON: &str = "manual_stop";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandKind {
    Approve,
    Reject,
    SelectThumbnail,
    DeclareWinner,
    StopTest,
    StartWorkflow,
}

impl CommandKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::SelectThumbnail => "select-thumbnail",
            Self::DeclareWinner => "declare-winner",
            Self::StopTest => "stop-test",
            Self::StartWorkflow => "start-workflow",
        }
    }
}

/// Commands for the same scope never run concurrently.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CommandScope {
    Workflow(WorkflowId),
    Dashboard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartWorkflowRequest {
    pub topic: String,
    pub platforms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_voice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Approve {
        workflow_id: WorkflowId,
        script_id: String,
    },
    Reject {
        workflow_id: WorkflowId,
    },
    SelectThumbnail {
        workflow_id: WorkflowId,
        thumbnail_id: String,
    },
    DeclareWinner {
        workflow_id: WorkflowId,
        thumbnail_id: String,
    },
    StopTest {
        workflow_id: WorkflowId,
        reason: String,
    },
    StartWorkflow(StartWorkflowRequest),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::Approve { .. } => CommandKind::Approve,
            Self::Reject { .. } => CommandKind::Reject,
            Self::SelectThumbnail { .. } => CommandKind::SelectThumbnail,
            Self::DeclareWinner { .. } => CommandKind::DeclareWinner,
            Self::StopTest { .. } => CommandKind::StopTest,
            Self::StartWorkflow(_) => CommandKind::StartWorkflow,
        }
    }

    pub fn workflow_id(&self) -> Option<&WorkflowId> {
        match self {
            Self::Approve { workflow_id, .. }
            | Self::Reject { workflow_id }
            | Self::SelectThumbnail { workflow_id, .. }
            | Self::DeclareWinner { workflow_id, .. }
            | Self::StopTest { workflow_id, .. } => Some(workflow_id),
            Self::StartWorkflow(_) => None,
        }
    }

    pub fn scope(&self) -> CommandScope {
        match self.workflow_id() {
            Some(id) => CommandScope::Workflow(id.clone()),
            None => CommandScope::Dashboard,
        }
    }

    /// Snapshots to refetch once the command succeeds.
    pub fn invalidates(&self) -> Vec<QueryKey> {
        match self {
            Self::Approve { workflow_id, .. }
            | Self::Reject { workflow_id }
            | Self::SelectThumbnail { workflow_id, .. } => vec![
                QueryKey::Workflow(workflow_id.clone()),
                QueryKey::WorkflowList,
            ],
            Self::DeclareWinner { workflow_id, .. } | Self::StopTest { workflow_id, .. } => vec![
                QueryKey::AbStatus(workflow_id.clone()),
                QueryKey::Workflow(workflow_id.clone()),
                QueryKey::WorkflowList,
            ],
            Self::StartWorkflow(_) => vec![QueryKey::WorkflowList],
        }
    }

    pub fn success_message(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "Script approved successfully!",
            Self::Reject { .. } => "Scripts rejected, regenerating...",
            Self::SelectThumbnail { .. } => "Thumbnail selected! Starting A/B test...",
            Self::DeclareWinner { .. } => "Winner declared manually!",
            Self::StopTest { .. } => "Test stopped early. Winner selected based on best CTR.",
            Self::StartWorkflow(_) => "Workflow started",
        }
    }

    pub fn failure_message(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "Error approving script",
            Self::Reject { .. } => "Error rejecting scripts",
            Self::SelectThumbnail { .. } => "Error selecting thumbnail",
            Self::DeclareWinner { .. } => "Error declaring winner",
            Self::StopTest { .. } => "Error stopping test",
            Self::StartWorkflow(_) => "Failed to start workflow",
        }
    }
}

/// Identifies a submitted command when its result comes back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTicket {
    pub seq: u64,
    pub generation: u64,
    pub scope: CommandScope,
    pub kind: CommandKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Workflow(WorkflowDetail),
    Ack(serde_json::Value),
}

pub fn approve_command(state: &ConsoleState) -> Result<Command, PreconditionError> {
    let (workflow_id, workflow) = review_subject(state)?;
    ensure_idle(state, workflow_id)?;
    if !resolve_stage(StageInput::from_workflow(workflow)).actions.approve {
        return Err(unavailable("approve", workflow.status.as_str()));
    }
    let script_id = state
        .selection
        .script
        .clone()
        .ok_or(PreconditionError::NoScriptSelected)?;
    Ok(Command::Approve {
        workflow_id: workflow_id.clone(),
        script_id,
    })
}

pub fn reject_command(state: &ConsoleState) -> Result<Command, PreconditionError> {
    let (workflow_id, workflow) = review_subject(state)?;
    ensure_idle(state, workflow_id)?;
    if !resolve_stage(StageInput::from_workflow(workflow)).actions.reject {
        return Err(unavailable("reject", workflow.status.as_str()));
    }
    Ok(Command::Reject {
        workflow_id: workflow_id.clone(),
    })
}

pub fn finalize_command(state: &ConsoleState) -> Result<Command, PreconditionError> {
    let (workflow_id, workflow) = review_subject(state)?;
    ensure_idle(state, workflow_id)?;
    if !resolve_stage(StageInput::from_workflow(workflow)).actions.finalize {
        return Err(unavailable("finalize", workflow.status.as_str()));
    }
    let thumbnail_id = state
        .selection
        .thumbnail
        .clone()
        .ok_or(PreconditionError::NoThumbnailSelected)?;
    Ok(Command::SelectThumbnail {
        workflow_id: workflow_id.clone(),
        thumbnail_id,
    })
}

pub fn declare_winner_command(
    state: &ConsoleState,
    thumbnail_id: &str,
) -> Result<Command, PreconditionError> {
    let workflow_id = running_test_subject(state)?;
    let running = state
        .cache
        .ab_status(workflow_id)
        .ok_or(PreconditionError::TestNotRunning)?;
    if !running.has_variant(thumbnail_id) {
        return Err(PreconditionError::UnknownVariant(thumbnail_id.to_string()));
    }
    Ok(Command::DeclareWinner {
        workflow_id: workflow_id.clone(),
        thumbnail_id: thumbnail_id.to_string(),
    })
}

pub fn stop_test_command(
    state: &ConsoleState,
    reason: Option<&str>,
) -> Result<Command, PreconditionError> {
    let workflow_id = running_test_subject(state)?;
    let reason = reason
        .map(str::trim)
        .filter(|reason| !reason.is_empty())
        .unwrap_or(DEFAULT_STOP_REASON);
    Ok(Command::StopTest {
        workflow_id: workflow_id.clone(),
        reason: reason.to_string(),
    })
}

pub fn start_workflow_command(
    state: &ConsoleState,
    topic: &str,
    platforms: &[String],
) -> Result<Command, PreconditionError> {
    if state.commands.is_busy(&CommandScope::Dashboard) {
        return Err(PreconditionError::StartInFlight);
    }
    let topic = topic.trim();
    if topic.is_empty() {
        return Err(PreconditionError::EmptyTopic);
    }
    if topic.chars().count() > MAX_TOPIC_CHARS {
        return Err(PreconditionError::TopicTooLong {
            max: MAX_TOPIC_CHARS,
        });
    }
    let platforms = if platforms.is_empty() {
        vec![DEFAULT_PLATFORM.to_string()]
    } else {
        platforms.to_vec()
    };
    Ok(Command::StartWorkflow(StartWorkflowRequest {
        topic: topic.to_string(),
        platforms,
        user_id: None,
        brand_voice: None,
    }))
}

fn review_subject(
    state: &ConsoleState,
) -> Result<(&WorkflowId, &WorkflowDetail), PreconditionError> {
    let Route::WorkflowDetail(workflow_id) = &state.route else {
        return Err(PreconditionError::NoSubject);
    };
    let workflow = state
        .cache
        .workflow(workflow_id)
        .ok_or(PreconditionError::NotLoaded)?;
    Ok((workflow_id, workflow))
}

fn running_test_subject(state: &ConsoleState) -> Result<&WorkflowId, PreconditionError> {
    let Route::AbMonitor(workflow_id) = &state.route else {
        return Err(PreconditionError::NoSubject);
    };
    ensure_idle(state, workflow_id)?;
    match state.cache.ab_status(workflow_id) {
        Some(status) if status.is_running => Ok(workflow_id),
        _ => Err(PreconditionError::TestNotRunning),
    }
}

fn ensure_idle(state: &ConsoleState, workflow_id: &WorkflowId) -> Result<(), PreconditionError> {
    if state
        .commands
        .is_busy(&CommandScope::Workflow(workflow_id.clone()))
    {
        return Err(PreconditionError::CommandInFlight(workflow_id.clone()));
    }
    Ok(())
}

fn unavailable(action: &'static str, status: &str) -> PreconditionError {
    PreconditionError::ActionUnavailable {
        action,
        status: status.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::config::Config;

    #[test]
    fn start_workflow_trims_topic_and_defaults_platform() {
        let state = ConsoleState::new(Config::default());
        let command = start_workflow_command(&state, "  iPhone Battery Tips ", &[]).expect("ok");

        assert_eq!(
            command,
            Command::StartWorkflow(StartWorkflowRequest {
                topic: "iPhone Battery Tips".to_string(),
                platforms: vec!["youtube".to_string()],
                user_id: None,
                brand_voice: None,
            })
        );
        assert_eq!(command.scope(), CommandScope::Dashboard);
    }

    #[test]
    fn start_workflow_rejects_blank_and_oversized_topics() {
        let state = ConsoleState::new(Config::default());
        assert_eq!(
            start_workflow_command(&state, "   ", &[]),
            Err(PreconditionError::EmptyTopic)
        );
        let long = "x".repeat(MAX_TOPIC_CHARS + 1);
        assert_eq!(
            start_workflow_command(&state, &long, &[]),
            Err(PreconditionError::TopicTooLong {
                max: MAX_TOPIC_CHARS
            })
        );
    }

    #[test]
    fn ab_commands_invalidate_both_channels() {
        let command = Command::StopTest {
            workflow_id: WorkflowId::from("wf-1"),
            reason: DEFAULT_STOP_REASON.to_string(),
        };
        assert_eq!(
            command.invalidates(),
            vec![
                QueryKey::AbStatus(WorkflowId::from("wf-1")),
                QueryKey::Workflow(WorkflowId::from("wf-1")),
                QueryKey::WorkflowList,
            ]
        );
    }

    #[test]
    fn start_request_omits_absent_optionals() {
        let body = serde_json::to_value(StartWorkflowRequest {
            topic: "t".to_string(),
            platforms: vec!["youtube".to_string()],
            user_id: None,
            brand_voice: Some("playful".to_string()),
        })
        .expect("encode");

        assert_eq!(
            body,
            serde_json::json!({"topic": "t", "platforms": ["youtube"], "brand_voice": "playful"})
        );
    }
}
