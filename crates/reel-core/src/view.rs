//! Read-only projections of `ConsoleState` for whatever renders the console.

use crate::cache::QueryKey;
use crate::commands::CommandScope;
use crate::error::PreconditionError;
use crate::error::RequestError;
use crate::model::AbTestStatus;
use crate::model::HealthStatus;
use crate::model::VariantMetrics;
use crate::model::WorkflowDetail;
use crate::model::WorkflowId;
use crate::model::WorkflowSummary;
use crate::stage::resolve_stage;
use crate::stage::StageInput;
use crate::stage::StageProjection;
use crate::state::ConsoleState;
use crate::state::ReviewSelection;
use crate::state::Route;

/// Controls the operator can use right now: the stage allows the action, a
/// selection exists where one is needed, and no command is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReviewControls {
    pub pick_script: bool,
    pub pick_thumbnail: bool,
    pub approve: bool,
    pub reject: bool,
    pub finalize: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReviewView<'a> {
    pub workflow_id: &'a WorkflowId,
    pub workflow: Option<&'a WorkflowDetail>,
    pub projection: Option<StageProjection>,
    pub selection: &'a ReviewSelection,
    pub controls: ReviewControls,
    pub busy: bool,
    pub loading: bool,
    pub load_error: Option<&'a RequestError>,
    pub validation: Option<&'a PreconditionError>,
}

pub fn review_view(state: &ConsoleState) -> Option<ReviewView<'_>> {
    let Route::WorkflowDetail(workflow_id) = &state.route else {
        return None;
    };
    let entry = state.cache.entry(&QueryKey::Workflow(workflow_id.clone()))?;
    let workflow = state.cache.workflow(workflow_id);
    let projection = workflow.map(|workflow| resolve_stage(StageInput::from_workflow(workflow)));
    let busy = state
        .commands
        .is_busy(&CommandScope::Workflow(workflow_id.clone()));

    let controls = match projection {
        Some(projection) => ReviewControls {
            pick_script: projection.actions.approve,
            pick_thumbnail: projection.actions.finalize,
            approve: projection.actions.approve && !busy && state.selection.script.is_some(),
            reject: projection.actions.reject && !busy,
            finalize: projection.actions.finalize
                && !busy
                && state.selection.thumbnail.is_some(),
        },
        None => ReviewControls::default(),
    };

    Some(ReviewView {
        workflow_id,
        workflow,
        projection,
        selection: &state.selection,
        controls,
        busy,
        loading: entry.is_loading(),
        load_error: entry.error.as_ref(),
        validation: state.validation.as_ref(),
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariantRow<'a> {
    pub metrics: &'a VariantMetrics,
    pub style_label: String,
    pub ctr_label: String,
    pub image_url: Option<&'a str>,
    pub is_winner: bool,
    pub is_leader: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TestTimer {
    pub elapsed: String,
    pub remaining: String,
    pub progress_percent: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorView<'a> {
    pub workflow_id: &'a WorkflowId,
    pub status: Option<&'a AbTestStatus>,
    pub phase_label: String,
    pub waiting: bool,
    pub variants: Vec<VariantRow<'a>>,
    pub leader_id: Option<&'a str>,
    pub timer: Option<TestTimer>,
    pub override_enabled: bool,
    pub presenting_winner: Option<&'a VariantMetrics>,
    pub loading: bool,
    pub load_error: Option<&'a RequestError>,
    pub validation: Option<&'a PreconditionError>,
}

pub fn monitor_view(state: &ConsoleState) -> Option<MonitorView<'_>> {
    let Route::AbMonitor(workflow_id) = &state.route else {
        return None;
    };
    let entry = state.cache.entry(&QueryKey::AbStatus(workflow_id.clone()))?;
    let status = state.cache.ab_status(workflow_id);
    let workflow = state.cache.workflow(workflow_id);
    let busy = state
        .commands
        .is_busy(&CommandScope::Workflow(workflow_id.clone()));
    let threshold = state.config.lifecycle.waiting_impressions_threshold;

    let mut view = MonitorView {
        workflow_id,
        status,
        phase_label: String::new(),
        waiting: false,
        variants: Vec::new(),
        leader_id: None,
        timer: None,
        override_enabled: false,
        presenting_winner: None,
        loading: entry.is_loading(),
        load_error: entry.error.as_ref(),
        validation: state.validation.as_ref(),
    };
    let Some(status) = status else {
        return Some(view);
    };

    let winner_id = status.winner_id.as_deref();
    let leader_id = match winner_id {
        Some(_) => None,
        None => leader(&status.variants),
    };
    view.phase_label = status.status.label();
    view.waiting = status.is_running && status.total_impressions < threshold;
    view.leader_id = leader_id;
    view.variants = status
        .variants
        .iter()
        .map(|metrics| VariantRow {
            metrics,
            style_label: metrics.style.replace('_', " ").to_lowercase(),
            ctr_label: percent_label(metrics.ctr),
            image_url: workflow
                .and_then(|workflow| workflow.thumbnail(&metrics.thumbnail_id))
                .map(|thumbnail| thumbnail.image_url.as_str()),
            is_winner: winner_id == Some(metrics.thumbnail_id.as_str()),
            is_leader: leader_id == Some(metrics.thumbnail_id.as_str()),
        })
        .collect();
    let window_seconds = (state.config.lifecycle.test_window_hours * 3_600) as f64;
    view.timer = Some(test_timer(
        status.elapsed_time_seconds,
        status.estimated_time_remaining,
        status.is_running.then_some(window_seconds),
    ));
    view.override_enabled = status.is_running && !busy;
    if state.lifecycle.winner.is_presenting() {
        view.presenting_winner = winner_id.and_then(|id| {
            status
                .variants
                .iter()
                .find(|variant| variant.thumbnail_id == id)
        });
    }
    Some(view)
}

/// Highest CTR; the earlier variant wins a tie.
pub fn leader(variants: &[VariantMetrics]) -> Option<&str> {
    let mut best = variants.first()?;
    for variant in &variants[1..] {
        if variant.ctr > best.ctr {
            best = variant;
        }
    }
    Some(best.thumbnail_id.as_str())
}

pub fn percent_label(ratio: f64) -> String {
    format!("{:.1}%", ratio * 100.0)
}

/// Elapsed/remaining labels and progress. A running test without a positive
/// estimate counts down from `window_seconds` instead.
pub fn test_timer(
    elapsed_seconds: f64,
    remaining_seconds: f64,
    window_seconds: Option<f64>,
) -> TestTimer {
    let elapsed = elapsed_seconds.max(0.0);
    let remaining = match window_seconds {
        Some(window) if remaining_seconds <= 0.0 => window - elapsed,
        _ => remaining_seconds,
    };
    let total = elapsed + remaining.max(0.0);
    let progress_percent = if total > 0.0 {
        (elapsed / total * 100.0).min(100.0)
    } else {
        0.0
    };
    TestTimer {
        elapsed: duration_label(elapsed),
        remaining: if remaining <= 0.0 {
            "Timeout".to_string()
        } else {
            duration_label(remaining)
        },
        progress_percent,
    }
}

pub fn duration_label(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    let hours = total / 3_600;
    let minutes = (total % 3_600) / 60;
    let secs = total % 60;
    if hours > 0 {
        format!("{hours}h {minutes}m {secs}s")
    } else if minutes > 0 {
        format!("{minutes}m {secs}s")
    } else {
        format!("{secs}s")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardView<'a> {
    pub health: Option<&'a HealthStatus>,
    pub health_error: Option<&'a RequestError>,
    pub workflows: &'a [WorkflowSummary],
    pub loading: bool,
    pub list_error: Option<&'a RequestError>,
    pub starting: bool,
    pub validation: Option<&'a PreconditionError>,
}

pub fn dashboard_view(state: &ConsoleState) -> Option<DashboardView<'_>> {
    if state.route != Route::Dashboard {
        return None;
    }
    let list = state.cache.entry(&QueryKey::WorkflowList)?;
    let health = state.cache.entry(&QueryKey::Health)?;
    Some(DashboardView {
        health: state.cache.health(),
        health_error: health.error.as_ref(),
        workflows: state.cache.workflow_list().unwrap_or(&[]),
        loading: list.is_loading(),
        list_error: list.error.as_ref(),
        starting: state.commands.is_busy(&CommandScope::Dashboard),
        validation: state.validation.as_ref(),
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn variant(id: &str, ctr: f64) -> VariantMetrics {
        VariantMetrics {
            thumbnail_id: id.to_string(),
            style: "BOLD_TEXT".to_string(),
            impressions: 100,
            clicks: (ctr * 100.0) as u64,
            ctr,
            avg_view_duration: 12.0,
            confidence: 0.5,
        }
    }

    #[test]
    fn leader_keeps_first_variant_on_ties() {
        let variants = vec![variant("t1", 0.04), variant("t2", 0.06), variant("t3", 0.06)];
        assert_eq!(leader(&variants), Some("t2"));
        assert_eq!(leader(&[]), None);
    }

    #[test]
    fn durations_drop_leading_zero_units() {
        assert_eq!(duration_label(3_725.0), "1h 2m 5s");
        assert_eq!(duration_label(125.9), "2m 5s");
        assert_eq!(duration_label(7.0), "7s");
        assert_eq!(duration_label(-4.0), "0s");
    }

    #[test]
    fn timer_reports_timeout_and_caps_progress() {
        let running = test_timer(3_600.0, 10_800.0, None);
        assert_eq!(running.elapsed, "1h 0m 0s");
        assert_eq!(running.remaining, "3h 0m 0s");
        assert_eq!(running.progress_percent, 25.0);

        let expired = test_timer(259_200.0, -30.0, None);
        assert_eq!(expired.remaining, "Timeout");
        assert_eq!(expired.progress_percent, 100.0);
    }

    #[test]
    fn missing_estimate_counts_down_the_test_window() {
        let fallback = test_timer(3_600.0, 0.0, Some(14_400.0));
        assert_eq!(fallback.remaining, "3h 0m 0s");
        assert_eq!(fallback.progress_percent, 25.0);

        let estimate_present = test_timer(3_600.0, 3_600.0, Some(14_400.0));
        assert_eq!(estimate_present.remaining, "1h 0m 0s");
        assert_eq!(estimate_present.progress_percent, 50.0);

        let past_window = test_timer(20_000.0, 0.0, Some(14_400.0));
        assert_eq!(past_window.remaining, "Timeout");
        assert_eq!(past_window.progress_percent, 100.0);
    }

    #[test]
    fn percent_label_uses_one_decimal() {
        assert_eq!(percent_label(0.0423), "4.2%");
    }
}
