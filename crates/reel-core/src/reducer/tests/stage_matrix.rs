use super::*;
use crate::stage::resolve_stage;
use crate::stage::ActionFlags;
use crate::stage::StageInput;
use pretty_assertions::assert_eq;

struct Row {
    status: &'static str,
    has_scripts: bool,
    has_thumbnails: bool,
    has_selected_script: bool,
    stage: ReviewStage,
    actions: ActionFlags,
}

const NONE: ActionFlags = ActionFlags {
    approve: false,
    reject: false,
    finalize: false,
};

const REVIEW_SCRIPTS: ActionFlags = ActionFlags {
    approve: true,
    reject: true,
    finalize: false,
};

const FINALIZE: ActionFlags = ActionFlags {
    approve: false,
    reject: false,
    finalize: true,
};

fn row(
    status: &'static str,
    (has_scripts, has_thumbnails, has_selected_script): (bool, bool, bool),
    stage: ReviewStage,
    actions: ActionFlags,
) -> Row {
    Row {
        status,
        has_scripts,
        has_thumbnails,
        has_selected_script,
        stage,
        actions,
    }
}

#[test]
fn every_status_resolves_to_its_stage() {
    let rows = vec![
        row("generating_scripts", (false, false, false), ReviewStage::ScriptLoading, NONE),
        row("generating_scripts", (true, false, false), ReviewStage::ScriptLoading, NONE),
        row("awaiting_approval", (true, false, false), ReviewStage::ScriptReview, REVIEW_SCRIPTS),
        row("awaiting_approval", (false, false, false), ReviewStage::ScriptReview, REVIEW_SCRIPTS),
        row("running", (true, false, true), ReviewStage::ThumbnailLoading, NONE),
        row("running", (true, true, true), ReviewStage::GenericStatus, NONE),
        row("running", (true, false, false), ReviewStage::GenericStatus, NONE),
        row(
            "awaiting_thumbnail_selection",
            (true, true, true),
            ReviewStage::ThumbnailReview,
            FINALIZE,
        ),
        row("ab_testing", (true, true, true), ReviewStage::RedirectToMonitor, NONE),
        row("completed", (true, true, true), ReviewStage::CompletionSummary, NONE),
        row("failed", (false, false, false), ReviewStage::GenericStatus, NONE),
        row("", (true, true, true), ReviewStage::GenericStatus, NONE),
    ];

    for row in rows {
        let status = WorkflowStatus::from(row.status);
        let projection = resolve_stage(StageInput {
            status: &status,
            has_scripts: row.has_scripts,
            has_thumbnails: row.has_thumbnails,
            has_selected_script: row.has_selected_script,
        });
        assert_eq!(projection.stage, row.stage, "status {:?}", row.status);
        assert_eq!(projection.actions, row.actions, "status {:?}", row.status);
    }
}

#[test]
fn panels_follow_data_but_placeholders_follow_stage() {
    let status = WorkflowStatus::Completed;
    let projection = resolve_stage(StageInput {
        status: &status,
        has_scripts: true,
        has_thumbnails: true,
        has_selected_script: true,
    });
    assert!(projection.panels.scripts);
    assert!(projection.panels.thumbnails);
    assert!(projection.panels.completion_summary);

    let status = WorkflowStatus::Running;
    let projection = resolve_stage(StageInput {
        status: &status,
        has_scripts: true,
        has_thumbnails: false,
        has_selected_script: true,
    });
    assert!(projection.panels.thumbnail_placeholder);
    assert!(!projection.panels.thumbnails);
    assert!(projection.panels.scripts);
}

#[test]
fn review_view_reports_stage_of_cached_snapshot() {
    let state = open_detail(workflow(
        "wf-1",
        "awaiting_thumbnail_selection",
        &["s1"],
        &["t1", "t2"],
    ));

    let view = review_view(&state).expect("detail view");
    assert_eq!(
        view.projection.map(|projection| projection.stage),
        Some(ReviewStage::ThumbnailReview)
    );
    assert!(view.controls.finalize);
    assert!(view.controls.pick_thumbnail);
    assert!(!view.controls.pick_script);
    assert!(!view.controls.approve);
}
