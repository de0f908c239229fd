use crate::model::WorkflowDetail;
use crate::model::WorkflowStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewStage {
    ScriptLoading,
    ScriptReview,
    ThumbnailLoading,
    ThumbnailReview,
    RedirectToMonitor,
    CompletionSummary,
    GenericStatus,
}

impl ReviewStage {
    pub fn label(self) -> &'static str {
        match self {
            Self::ScriptLoading => "script-loading",
            Self::ScriptReview => "script-review",
            Self::ThumbnailLoading => "thumbnail-loading",
            Self::ThumbnailReview => "thumbnail-review",
            Self::RedirectToMonitor => "redirect-to-monitor",
            Self::CompletionSummary => "completion-summary",
            Self::GenericStatus => "generic-status-display",
        }
    }
}

/// Which actions the workflow status allows. Data presence never widens this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActionFlags {
    pub approve: bool,
    pub reject: bool,
    pub finalize: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PanelVisibility {
    pub script_placeholder: bool,
    pub scripts: bool,
    pub thumbnail_placeholder: bool,
    pub thumbnails: bool,
    pub completion_summary: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageProjection {
    pub stage: ReviewStage,
    pub panels: PanelVisibility,
    pub actions: ActionFlags,
}

#[derive(Debug, Clone, Copy)]
pub struct StageInput<'a> {
    pub status: &'a WorkflowStatus,
    pub has_scripts: bool,
    pub has_thumbnails: bool,
    pub has_selected_script: bool,
}

impl<'a> StageInput<'a> {
    pub fn from_workflow(workflow: &'a WorkflowDetail) -> Self {
        Self {
            status: &workflow.status,
            has_scripts: !workflow.scripts.is_empty(),
            has_thumbnails: !workflow.thumbnails.is_empty(),
            has_selected_script: workflow.selected_script_id.is_some(),
        }
    }
}

pub fn resolve_stage(input: StageInput<'_>) -> StageProjection {
    let stage = match input.status {
        WorkflowStatus::GeneratingScripts => ReviewStage::ScriptLoading,
        WorkflowStatus::AwaitingApproval => ReviewStage::ScriptReview,
        WorkflowStatus::Running if input.has_selected_script && !input.has_thumbnails => {
            ReviewStage::ThumbnailLoading
        }
        WorkflowStatus::AwaitingThumbnailSelection => ReviewStage::ThumbnailReview,
        WorkflowStatus::AbTesting => ReviewStage::RedirectToMonitor,
        WorkflowStatus::Completed => ReviewStage::CompletionSummary,
        // Backend statuses are open-ended; anything unrecognised is shown as-is.
        WorkflowStatus::Running | WorkflowStatus::Other(_) => ReviewStage::GenericStatus,
    };

    let actions = ActionFlags {
        approve: stage == ReviewStage::ScriptReview,
        reject: stage == ReviewStage::ScriptReview,
        finalize: stage == ReviewStage::ThumbnailReview,
    };

    let panels = PanelVisibility {
        script_placeholder: stage == ReviewStage::ScriptLoading,
        scripts: (stage == ReviewStage::ScriptReview || input.has_scripts)
            && stage != ReviewStage::ScriptLoading,
        thumbnail_placeholder: stage == ReviewStage::ThumbnailLoading,
        thumbnails: (stage == ReviewStage::ThumbnailReview || input.has_thumbnails)
            && stage != ReviewStage::ThumbnailLoading,
        completion_summary: stage == ReviewStage::CompletionSummary,
    };

    StageProjection {
        stage,
        panels,
        actions,
    }
}
