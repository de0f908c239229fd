pub(super) use super::reduce;
pub(super) use super::ConsoleEffect;
pub(super) use crate::actions::ConsoleAction;
pub(super) use crate::actions::RuntimeAction;
pub(super) use crate::actions::UserAction;
pub(super) use crate::cache::FetchTicket;
pub(super) use crate::cache::QueryKey;
pub(super) use crate::cache::QueryPayload;
pub(super) use crate::commands::Command;
pub(super) use crate::commands::CommandOutcome;
pub(super) use crate::commands::CommandTicket;
pub(super) use crate::config::Config;
pub(super) use crate::error::PreconditionError;
pub(super) use crate::error::RequestError;
pub(super) use crate::lifecycle::RedirectTimer;
pub(super) use crate::lifecycle::WinnerPresentation;
pub(super) use crate::model::AbTestPhase;
pub(super) use crate::model::AbTestStatus;
pub(super) use crate::model::HealthStatus;
pub(super) use crate::model::ScriptVariant;
pub(super) use crate::model::ThumbnailVariant;
pub(super) use crate::model::VariantMetrics;
pub(super) use crate::model::WorkflowDetail;
pub(super) use crate::model::WorkflowId;
pub(super) use crate::model::WorkflowStatus;
pub(super) use crate::model::WorkflowSummary;
pub(super) use crate::stage::ReviewStage;
pub(super) use crate::state::ConsoleState;
pub(super) use crate::state::NotificationLevel;
pub(super) use crate::state::Route;
pub(super) use crate::view::monitor_view;
pub(super) use crate::view::review_view;

mod selection_seeding;
mod stage_matrix;

fn state() -> ConsoleState {
    ConsoleState::new(Config::default())
}

fn wf(id: &str) -> WorkflowId {
    WorkflowId::from(id)
}

fn script(id: &str) -> ScriptVariant {
    ScriptVariant {
        id: id.to_string(),
        hook: format!("hook {id}"),
        body: format!("body {id}"),
        cta: "Subscribe".to_string(),
        tone: None,
        predicted_retention: None,
    }
}

fn thumbnail(id: &str) -> ThumbnailVariant {
    ThumbnailVariant {
        id: id.to_string(),
        style: "BOLD_TEXT".to_string(),
        prompt: format!("prompt {id}"),
        image_url: format!("https://cdn.example/{id}.png"),
        seed: 7,
    }
}

fn workflow(id: &str, status: &str, scripts: &[&str], thumbnails: &[&str]) -> WorkflowDetail {
    WorkflowDetail {
        workflow_id: wf(id),
        status: WorkflowStatus::from(status),
        current_step: status.to_string(),
        requires_action: None,
        scripts: scripts.iter().map(|id| script(id)).collect(),
        selected_script_id: None,
        thumbnails: thumbnails.iter().map(|id| thumbnail(id)).collect(),
        selected_thumbnail_id: None,
        token_usage: Default::default(),
    }
}

fn variant(id: &str, impressions: u64, ctr: f64) -> VariantMetrics {
    VariantMetrics {
        thumbnail_id: id.to_string(),
        style: "BOLD_TEXT".to_string(),
        impressions,
        clicks: (impressions as f64 * ctr) as u64,
        ctr,
        avg_view_duration: 30.0,
        confidence: 0.4,
    }
}

fn ab_status(
    id: &str,
    phase: &str,
    is_running: bool,
    impressions: u64,
    winner: Option<&str>,
) -> AbTestStatus {
    AbTestStatus {
        workflow_id: wf(id),
        status: AbTestPhase::from(phase.to_string()),
        is_running,
        variants: vec![
            variant("t1", impressions / 2, 0.05),
            variant("t2", impressions - impressions / 2, 0.04),
        ],
        current_confidence: 0.6,
        total_impressions: impressions,
        winner_id: winner.map(str::to_string),
        elapsed_time_seconds: 3_600.0,
        estimated_time_remaining: 7_200.0,
        checks_completed: 3,
        can_declare_early: false,
    }
}

fn user(state: &mut ConsoleState, action: UserAction) -> Vec<ConsoleEffect> {
    reduce(state, ConsoleAction::User(action))
}

fn runtime(state: &mut ConsoleState, action: RuntimeAction) -> Vec<ConsoleEffect> {
    reduce(state, ConsoleAction::Runtime(action))
}

fn tick(state: &mut ConsoleState, now_ms: u64) -> Vec<ConsoleEffect> {
    runtime(state, RuntimeAction::Tick { now_ms })
}

fn navigate(state: &mut ConsoleState, route: Route) -> Vec<ConsoleEffect> {
    user(state, UserAction::Navigate(route))
}

fn resolve(
    state: &mut ConsoleState,
    ticket: FetchTicket,
    result: Result<QueryPayload, RequestError>,
) -> Vec<ConsoleEffect> {
    runtime(state, RuntimeAction::FetchResolved { ticket, result })
}

fn fetches(effects: &[ConsoleEffect]) -> Vec<FetchTicket> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            ConsoleEffect::Fetch(ticket) => Some(ticket.clone()),
            _ => None,
        })
        .collect()
}

fn fetch_for(effects: &[ConsoleEffect], key: &QueryKey) -> FetchTicket {
    fetches(effects)
        .into_iter()
        .find(|ticket| &ticket.key == key)
        .unwrap_or_else(|| panic!("no fetch for {key:?} in {effects:?}"))
}

fn sent_command(effects: &[ConsoleEffect]) -> (CommandTicket, Command) {
    effects
        .iter()
        .find_map(|effect| match effect {
            ConsoleEffect::SendCommand { ticket, command } => {
                Some((ticket.clone(), command.clone()))
            }
            _ => None,
        })
        .unwrap_or_else(|| panic!("no command sent in {effects:?}"))
}

fn navigations(effects: &[ConsoleEffect]) -> Vec<Route> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            ConsoleEffect::Navigate(route) => Some(route.clone()),
            _ => None,
        })
        .collect()
}

fn winner_presentations(effects: &[ConsoleEffect]) -> usize {
    effects
        .iter()
        .filter(|effect| matches!(effect, ConsoleEffect::PresentWinner { .. }))
        .count()
}

/// Opens the detail view for `id` and answers its first poll with `detail`.
fn open_detail(detail: WorkflowDetail) -> ConsoleState {
    let mut state = state();
    let id = detail.workflow_id.clone();
    let effects = navigate(&mut state, Route::WorkflowDetail(id.clone()));
    let ticket = fetch_for(&effects, &QueryKey::Workflow(id));
    resolve(&mut state, ticket, Ok(QueryPayload::Workflow(detail)));
    state
}

/// Opens the A/B monitor for `id` and answers its first A/B poll with
/// `status`. The workflow poll is left outstanding.
fn open_monitor(status: AbTestStatus) -> (ConsoleState, Vec<ConsoleEffect>) {
    let mut state = state();
    let id = status.workflow_id.clone();
    let effects = navigate(&mut state, Route::AbMonitor(id.clone()));
    let ticket = fetch_for(&effects, &QueryKey::AbStatus(id));
    let effects = resolve(&mut state, ticket, Ok(QueryPayload::AbStatus(status)));
    (state, effects)
}
