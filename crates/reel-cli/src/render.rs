//! Plain-text frames for the console views.

use std::fmt::Write as _;

use reel_core::model::WorkflowDetail;
use reel_core::view::dashboard_view;
use reel_core::view::monitor_view;
use reel_core::view::percent_label;
use reel_core::view::review_view;
use reel_core::view::DashboardView;
use reel_core::view::MonitorView;
use reel_core::view::ReviewView;
use reel_core::ConsoleState;
use reel_core::Notification;
use reel_core::ReviewSelection;

pub fn frame(state: &ConsoleState) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", state.route.path());
    if let Some(view) = dashboard_view(state) {
        dashboard(&mut out, &view);
    } else if let Some(view) = review_view(state) {
        review(&mut out, &view);
    } else if let Some(view) = monitor_view(state) {
        monitor(&mut out, &view);
    }
    for notification in state.notifications.iter() {
        let _ = writeln!(out, "{}", notification_line(notification));
    }
    out
}

pub fn notification_line(notification: &Notification) -> String {
    format!(
        "[#{} {}] {}",
        notification.seq,
        notification.level.label(),
        notification.message
    )
}

fn dashboard(out: &mut String, view: &DashboardView<'_>) {
    match (view.health, view.health_error) {
        (Some(health), _) => {
            let _ = writeln!(out, "backend: {}", health.status);
        }
        (None, Some(err)) => {
            let _ = writeln!(out, "backend: unreachable ({err})");
        }
        (None, None) => {
            let _ = writeln!(out, "backend: checking...");
        }
    }
    if view.starting {
        let _ = writeln!(out, "starting workflow...");
    }
    if let Some(err) = view.validation {
        let _ = writeln!(out, "! {err}");
    }
    if let Some(err) = view.list_error {
        let _ = writeln!(out, "failed to load workflows: {err}");
    }
    if view.loading {
        let _ = writeln!(out, "loading workflows...");
        return;
    }
    if view.workflows.is_empty() {
        let _ = writeln!(out, "no workflows yet");
        return;
    }
    for summary in view.workflows {
        let _ = writeln!(
            out,
            "  {:<14} {:<30} {:<30} updated {}",
            summary.workflow_id.as_str(),
            summary.topic,
            summary.status.as_str(),
            summary.updated_label()
        );
    }
}

fn review(out: &mut String, view: &ReviewView<'_>) {
    if let Some(err) = view.load_error {
        let _ = writeln!(out, "failed to load workflow: {err}");
    }
    let (Some(workflow), Some(projection)) = (view.workflow, view.projection) else {
        if view.loading {
            let _ = writeln!(out, "loading workflow {}...", view.workflow_id);
        }
        return;
    };

    let _ = writeln!(
        out,
        "{} | {} | step {}",
        workflow.workflow_id,
        projection.stage.label(),
        workflow.current_step
    );
    if projection.panels.script_placeholder {
        let _ = writeln!(out, "scripts are being generated...");
    }
    if projection.panels.scripts {
        scripts(out, workflow, view.selection);
    }
    if projection.panels.thumbnail_placeholder {
        let _ = writeln!(out, "thumbnails are being generated...");
    }
    if projection.panels.thumbnails {
        thumbnails(out, workflow, view.selection);
    }
    if projection.panels.completion_summary {
        completion(out, workflow);
    }

    let controls = view.controls;
    let available: Vec<&str> = [
        (controls.approve, "approve"),
        (controls.reject, "reject"),
        (controls.finalize, "finalize"),
    ]
    .into_iter()
    .filter_map(|(enabled, name)| enabled.then_some(name))
    .collect();
    if view.busy {
        let _ = writeln!(out, "working...");
    } else if !available.is_empty() {
        let _ = writeln!(out, "actions: {}", available.join(", "));
    }
    if let Some(err) = view.validation {
        let _ = writeln!(out, "! {err}");
    }
}

fn scripts(out: &mut String, workflow: &WorkflowDetail, selection: &ReviewSelection) {
    let _ = writeln!(out, "scripts:");
    for script in &workflow.scripts {
        let marker = marker(selection.script.as_deref() == Some(script.id.as_str()));
        let _ = writeln!(out, " {marker} {:<8} {}", script.id, script.hook);
        if let Some(retention) = script.predicted_retention {
            let _ = writeln!(out, "            predicted retention {}", percent_label(retention));
        }
    }
}

fn thumbnails(out: &mut String, workflow: &WorkflowDetail, selection: &ReviewSelection) {
    let _ = writeln!(out, "thumbnails:");
    for thumbnail in &workflow.thumbnails {
        let marker = marker(selection.thumbnail.as_deref() == Some(thumbnail.id.as_str()));
        let _ = writeln!(
            out,
            " {marker} {:<8} {:<16} {}",
            thumbnail.id,
            thumbnail.style.replace('_', " "),
            thumbnail.image_url
        );
    }
}

fn completion(out: &mut String, workflow: &WorkflowDetail) {
    let _ = writeln!(out, "workflow complete");
    if let Some(script) = workflow.valid_selected_script().and_then(|id| workflow.script(id)) {
        let _ = writeln!(out, "  script: {}", script.hook);
    }
    if let Some(thumbnail) = workflow
        .valid_selected_thumbnail()
        .and_then(|id| workflow.thumbnail(id))
    {
        let _ = writeln!(out, "  thumbnail: {}", thumbnail.image_url);
    }
    let tokens: f64 = workflow.token_usage.values().sum();
    if tokens > 0.0 {
        let _ = writeln!(out, "  tokens used: {tokens:.0}");
    }
}

fn monitor(out: &mut String, view: &MonitorView<'_>) {
    if let Some(err) = view.load_error {
        let _ = writeln!(out, "failed to load test status: {err}");
    }
    let Some(status) = view.status else {
        if view.loading {
            let _ = writeln!(out, "loading test for {}...", view.workflow_id);
        }
        return;
    };

    let _ = writeln!(
        out,
        "{} | test {} | {} impressions | confidence {}",
        view.workflow_id,
        view.phase_label,
        status.total_impressions,
        percent_label(status.current_confidence)
    );
    if let Some(timer) = &view.timer {
        let _ = writeln!(
            out,
            "elapsed {} | remaining {} | {:.0}%",
            timer.elapsed, timer.remaining, timer.progress_percent
        );
    }
    if view.waiting {
        let _ = writeln!(out, "waiting for enough impressions...");
    } else {
        for row in &view.variants {
            let badge = if row.is_winner {
                " WINNER"
            } else if row.is_leader {
                " leading"
            } else {
                ""
            };
            let _ = writeln!(
                out,
                "  {:<8} {:<16} ctr {:>6} | {} impressions | {} clicks{badge}",
                row.metrics.thumbnail_id,
                row.style_label,
                row.ctr_label,
                row.metrics.impressions,
                row.metrics.clicks
            );
        }
    }
    if let Some(winner) = view.presenting_winner {
        let _ = writeln!(
            out,
            "*** winner: {} at {} ctr (dismiss to hide) ***",
            winner.thumbnail_id,
            percent_label(winner.ctr)
        );
    }
    if view.override_enabled {
        let _ = writeln!(out, "actions: winner <thumbnail>, stop [reason]");
    }
    if let Some(err) = view.validation {
        let _ = writeln!(out, "! {err}");
    }
}

fn marker(selected: bool) -> char {
    if selected {
        '>'
    } else {
        ' '
    }
}
