//! Snapshot types mirrored from the backend's JSON contract.
//!
//! Every type here is owned by the backend: the engine only ever replaces a
//! snapshot wholesale with a newer one, it never patches fields locally.

use std::collections::BTreeMap;
use std::fmt;

use chrono::Local;
use chrono::TimeZone;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub String);

impl WorkflowId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkflowId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for WorkflowId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Workflow status as reported by the backend. Unknown strings are kept in
/// `Other` and resolve to the generic status display.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WorkflowStatus {
    GeneratingScripts,
    AwaitingApproval,
    Running,
    AwaitingThumbnailSelection,
    AbTesting,
    Completed,
    Other(String),
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::GeneratingScripts => "generating_scripts",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Running => "running",
            Self::AwaitingThumbnailSelection => "awaiting_thumbnail_selection",
            Self::AbTesting => "ab_testing",
            Self::Completed => "completed",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Statuses under which the backend is still expected to change the
    /// workflow without further operator input.
    pub fn keeps_polling(&self) -> bool {
        matches!(
            self,
            Self::Running
                | Self::AwaitingApproval
                | Self::AwaitingThumbnailSelection
                | Self::GeneratingScripts
        )
    }
}

impl From<String> for WorkflowStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "generating_scripts" => Self::GeneratingScripts,
            "awaiting_approval" => Self::AwaitingApproval,
            "running" => Self::Running,
            "awaiting_thumbnail_selection" => Self::AwaitingThumbnailSelection,
            "ab_testing" => Self::AbTesting,
            "completed" => Self::Completed,
            _ => Self::Other(value),
        }
    }
}

impl From<&str> for WorkflowStatus {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<WorkflowStatus> for String {
    fn from(value: WorkflowStatus) -> Self {
        match value {
            WorkflowStatus::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptVariant {
    pub id: String,
    pub hook: String,
    pub body: String,
    pub cta: String,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub predicted_retention: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThumbnailVariant {
    pub id: String,
    pub style: String,
    pub prompt: String,
    pub image_url: String,
    #[serde(default)]
    pub seed: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDetail {
    pub workflow_id: WorkflowId,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub requires_action: Option<String>,
    #[serde(default)]
    pub scripts: Vec<ScriptVariant>,
    #[serde(default)]
    pub selected_script_id: Option<String>,
    #[serde(default)]
    pub thumbnails: Vec<ThumbnailVariant>,
    #[serde(default)]
    pub selected_thumbnail_id: Option<String>,
    #[serde(default)]
    pub token_usage: BTreeMap<String, f64>,
}

impl WorkflowDetail {
    pub fn script(&self, id: &str) -> Option<&ScriptVariant> {
        self.scripts.iter().find(|script| script.id == id)
    }

    pub fn thumbnail(&self, id: &str) -> Option<&ThumbnailVariant> {
        self.thumbnails.iter().find(|thumbnail| thumbnail.id == id)
    }

    /// Backend script selection, ignored when it does not reference a script
    /// in the current list.
    pub fn valid_selected_script(&self) -> Option<&str> {
        self.selected_script_id
            .as_deref()
            .filter(|id| self.script(id).is_some())
    }

    pub fn valid_selected_thumbnail(&self) -> Option<&str> {
        self.selected_thumbnail_id
            .as_deref()
            .filter(|id| self.thumbnail(id).is_some())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_id: WorkflowId,
    #[serde(default)]
    pub topic: String,
    pub status: WorkflowStatus,
    #[serde(default)]
    pub current_step: String,
    #[serde(default)]
    pub created_ts: f64,
    #[serde(default)]
    pub updated_ts: f64,
}

impl WorkflowSummary {
    pub fn created_label(&self) -> String {
        local_time_label(self.created_ts)
    }

    pub fn updated_label(&self) -> String {
        local_time_label(self.updated_ts)
    }
}

/// Renders epoch seconds in the operator's local time zone.
pub fn local_time_label(epoch_seconds: f64) -> String {
    let millis = (epoch_seconds * 1_000.0).floor() as i64;
    match Local.timestamp_millis_opt(millis).single() {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => "-".to_string(),
    }
}

/// A/B test phase string. Only `is_running` drives polling; the phase is used
/// for the completion redirect.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AbTestPhase {
    Running,
    Completed,
    Timeout,
    ManualOverride,
    Other(String),
}

impl AbTestPhase {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Timeout => "timeout",
            Self::ManualOverride => "manual_override",
            Self::Other(raw) => raw.as_str(),
        }
    }

    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl From<String> for AbTestPhase {
    fn from(value: String) -> Self {
        match value.as_str() {
            "running" => Self::Running,
            "completed" => Self::Completed,
            "timeout" => Self::Timeout,
            "manual_override" => Self::ManualOverride,
            _ => Self::Other(value),
        }
    }
}

impl From<AbTestPhase> for String {
    fn from(value: AbTestPhase) -> Self {
        match value {
            AbTestPhase::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub thumbnail_id: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub impressions: u64,
    #[serde(default)]
    pub clicks: u64,
    #[serde(default)]
    pub ctr: f64,
    #[serde(default)]
    pub avg_view_duration: f64,
    #[serde(default)]
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbTestStatus {
    pub workflow_id: WorkflowId,
    pub status: AbTestPhase,
    pub is_running: bool,
    #[serde(default)]
    pub variants: Vec<VariantMetrics>,
    #[serde(default)]
    pub current_confidence: f64,
    #[serde(default)]
    pub total_impressions: u64,
    #[serde(default)]
    pub winner_id: Option<String>,
    #[serde(default)]
    pub elapsed_time_seconds: f64,
    #[serde(default)]
    pub estimated_time_remaining: f64,
    #[serde(default)]
    pub checks_completed: u32,
    #[serde(default)]
    pub can_declare_early: bool,
}

impl AbTestStatus {
    pub fn has_variant(&self, thumbnail_id: &str) -> bool {
        self.variants
            .iter()
            .any(|variant| variant.thumbnail_id == thumbnail_id)
    }

    pub fn is_finished(&self) -> bool {
        self.status == AbTestPhase::Completed && !self.is_running
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn unknown_workflow_status_is_kept_verbatim() {
        let detail: WorkflowDetail = serde_json::from_value(serde_json::json!({
            "workflow_id": "wf-1",
            "status": "publishing",
            "current_step": "upload",
            "scripts": [],
            "thumbnails": [],
            "token_usage": {"prompt": 120}
        }))
        .expect("decode");

        assert_eq!(detail.status, WorkflowStatus::Other("publishing".to_string()));
        assert_eq!(detail.status.to_string(), "publishing");
        assert_eq!(detail.token_usage.get("prompt"), Some(&120.0));
    }

    #[test]
    fn known_statuses_round_trip_through_strings() {
        for raw in [
            "generating_scripts",
            "awaiting_approval",
            "running",
            "awaiting_thumbnail_selection",
            "ab_testing",
            "completed",
        ] {
            let status = WorkflowStatus::from(raw);
            assert!(!matches!(status, WorkflowStatus::Other(_)), "{raw}");
            assert_eq!(String::from(status), raw);
        }
    }

    #[test]
    fn dangling_backend_selection_is_ignored() {
        let detail: WorkflowDetail = serde_json::from_value(serde_json::json!({
            "workflow_id": "wf-1",
            "status": "awaiting_approval",
            "scripts": [{"id": "s1", "hook": "h", "body": "b", "cta": "c"}],
            "selected_script_id": "gone"
        }))
        .expect("decode");

        assert_eq!(detail.valid_selected_script(), None);
        assert!(detail.script("s1").is_some());
    }

    #[test]
    fn ab_status_decodes_with_defaults() {
        let status: AbTestStatus = serde_json::from_value(serde_json::json!({
            "workflow_id": "wf-1",
            "status": "manual_override",
            "is_running": false,
            "winner_id": "t2"
        }))
        .expect("decode");

        assert_eq!(status.status, AbTestPhase::ManualOverride);
        assert_eq!(status.status.label(), "manual override");
        assert!(status.variants.is_empty());
        assert!(!status.is_finished());
    }

    #[test]
    fn fractional_epochs_before_1970_round_down() {
        assert_eq!(local_time_label(-1.5), local_time_label(-2.0));
        assert_ne!(local_time_label(-1.5), local_time_label(-1.0));
        assert_eq!(local_time_label(1.5), local_time_label(1.0));
    }
}
