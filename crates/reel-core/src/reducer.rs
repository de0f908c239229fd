use tracing::debug;
use tracing::info;
use tracing::warn;

use super::actions::ConsoleAction;
use super::actions::RuntimeAction;
use super::actions::UserAction;
use super::cache::poll_interval;
use super::cache::FetchTicket;
use super::cache::QueryKey;
use super::cache::QueryPayload;
use super::commands::approve_command;
use super::commands::declare_winner_command;
use super::commands::finalize_command;
use super::commands::reject_command;
use super::commands::start_workflow_command;
use super::commands::stop_test_command;
use super::commands::Command;
use super::commands::CommandOutcome;
use super::commands::CommandTicket;
use super::error::PreconditionError;
use super::error::RequestError;
use super::error::StaleDataError;
use super::lifecycle::LifecycleSignal;
use super::model::WorkflowDetail;
use super::model::WorkflowId;
use super::stage::resolve_stage;
use super::stage::StageInput;
use super::state::ConsoleState;
use super::state::InFlightCommand;
use super::state::Notification;
use super::state::NotificationLevel;
use super::state::ReviewSelection;
use super::state::Route;

#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleEffect {
    Fetch(FetchTicket),
    SendCommand {
        ticket: CommandTicket,
        command: Command,
    },
    Navigate(Route),
    Notify(Notification),
    PresentWinner {
        workflow_id: WorkflowId,
        winner_id: String,
    },
    RequestFrame,
}

/// Applies `action` and returns the effects the runtime must carry out.
/// Every mounted channel that has come due is fetched before returning.
pub fn reduce(state: &mut ConsoleState, action: ConsoleAction) -> Vec<ConsoleEffect> {
    let mut effects = match action {
        ConsoleAction::User(user) => reduce_user(state, user),
        ConsoleAction::Runtime(runtime) => reduce_runtime(state, runtime),
    };
    issue_due_fetches(state, &mut effects);
    effects
}

fn reduce_user(state: &mut ConsoleState, action: UserAction) -> Vec<ConsoleEffect> {
    match action {
        UserAction::Navigate(route) => {
            let mut effects = Vec::new();
            navigate(state, route, &mut effects);
            effects
        }
        UserAction::Reload => {
            state.cache.mark_all_stale();
            vec![ConsoleEffect::RequestFrame]
        }
        UserAction::SelectScript(id) => {
            let result = check_script_choice(state, &id);
            apply_choice(state, result, |selection| selection.script = Some(id))
        }
        UserAction::SelectThumbnail(id) => {
            let result = check_thumbnail_choice(state, &id);
            apply_choice(state, result, |selection| selection.thumbnail = Some(id))
        }
        UserAction::Approve => {
            let built = approve_command(state);
            submit(state, built)
        }
        UserAction::Reject => {
            let built = reject_command(state);
            submit(state, built)
        }
        UserAction::Finalize => {
            let built = finalize_command(state);
            submit(state, built)
        }
        UserAction::DeclareWinner { thumbnail_id } => {
            let built = declare_winner_command(state, &thumbnail_id);
            submit(state, built)
        }
        UserAction::StopTest { reason } => {
            let built = stop_test_command(state, reason.as_deref());
            submit(state, built)
        }
        UserAction::StartWorkflow { topic, platforms } => {
            let built = start_workflow_command(state, &topic, &platforms);
            submit(state, built)
        }
        UserAction::DismissWinner => {
            if state.lifecycle.dismiss_winner() {
                vec![ConsoleEffect::RequestFrame]
            } else {
                Vec::new()
            }
        }
        UserAction::DismissNotification(seq) => {
            if state.notifications.dismiss(seq) {
                vec![ConsoleEffect::RequestFrame]
            } else {
                Vec::new()
            }
        }
    }
}

fn reduce_runtime(state: &mut ConsoleState, action: RuntimeAction) -> Vec<ConsoleEffect> {
    let mut effects = Vec::new();
    match action {
        RuntimeAction::Tick { now_ms } => {
            state.now_ms = state.now_ms.max(now_ms);
            if state.notifications.prune(state.now_ms) {
                effects.push(ConsoleEffect::RequestFrame);
            }
            let route = state.route.clone();
            if let Some(signal) = state.lifecycle.on_tick(&route, state.now_ms) {
                apply_signal(state, signal, &mut effects);
            }
        }
        RuntimeAction::FetchResolved { ticket, result } => {
            fetch_resolved(state, ticket, result, &mut effects);
        }
        RuntimeAction::CommandResolved {
            ticket,
            command,
            result,
        } => {
            command_resolved(state, ticket, command, result, &mut effects);
        }
    }
    effects
}

fn issue_due_fetches(state: &mut ConsoleState, effects: &mut Vec<ConsoleEffect>) {
    for key in state.cache.due_keys(state.now_ms) {
        if let Some(ticket) = state.cache.begin_fetch(&key, state.generation) {
            effects.push(ConsoleEffect::Fetch(ticket));
        }
    }
}

fn navigate(state: &mut ConsoleState, route: Route, effects: &mut Vec<ConsoleEffect>) {
    if state.route == route {
        return;
    }
    state.generation += 1;
    state.cache.remount(&route.mounted_keys());
    state.selection = ReviewSelection::default();
    state.validation = None;
    state.lifecycle.reset_for_route(&route);
    info!(
        event = "navigate",
        from = %state.route.path(),
        to = %route.path(),
        generation = state.generation
    );
    state.route = route.clone();
    effects.push(ConsoleEffect::Navigate(route));
    effects.push(ConsoleEffect::RequestFrame);
}

fn apply_signal(
    state: &mut ConsoleState,
    signal: LifecycleSignal,
    effects: &mut Vec<ConsoleEffect>,
) {
    match signal {
        LifecycleSignal::Navigate(route) => navigate(state, route, effects),
        LifecycleSignal::PresentWinner {
            workflow_id,
            winner_id,
        } => {
            info!(event = "winner_presented", workflow_id = %workflow_id, winner_id = %winner_id);
            effects.push(ConsoleEffect::PresentWinner {
                workflow_id,
                winner_id,
            });
            effects.push(ConsoleEffect::RequestFrame);
        }
    }
}

fn fetch_resolved(
    state: &mut ConsoleState,
    ticket: FetchTicket,
    result: Result<QueryPayload, RequestError>,
    effects: &mut Vec<ConsoleEffect>,
) {
    if ticket.generation != state.generation {
        let err = StaleDataError::Generation {
            issued: ticket.generation,
            current: state.generation,
        };
        debug!(event = "fetch_discarded", resource = ticket.key.resource().label(), error = %err);
        return;
    }

    let now_ms = state.now_ms;
    let polling = state.config.polling;
    let entry = match state.cache.finish_fetch(&ticket) {
        Ok(entry) => entry,
        Err(err) => {
            debug!(
                event = "fetch_discarded",
                resource = ticket.key.resource().label(),
                error = %err
            );
            return;
        }
    };

    let payload = match result {
        Ok(payload) => payload,
        Err(error) => {
            warn!(event = "fetch_failed", resource = ticket.key.resource().label(), error = %error);
            entry.error = Some(error);
            entry.next_poll_at_ms = poll_interval(&ticket.key, entry.snapshot.as_ref(), &polling)
                .map(|delay| now_ms.saturating_add(delay));
            effects.push(ConsoleEffect::RequestFrame);
            return;
        }
    };

    if let Err(err) = check_payload(&ticket.key, &payload) {
        debug!(event = "fetch_discarded", resource = ticket.key.resource().label(), error = %err);
        entry.next_poll_at_ms = poll_interval(&ticket.key, entry.snapshot.as_ref(), &polling)
            .map(|delay| now_ms.saturating_add(delay));
        return;
    }

    entry.next_poll_at_ms = poll_interval(&ticket.key, Some(&payload), &polling)
        .map(|delay| now_ms.saturating_add(delay));
    if entry.next_poll_at_ms.is_none() {
        debug!(event = "polling_stopped", resource = ticket.key.resource().label());
    }
    entry.snapshot = Some(payload);
    entry.error = None;
    entry.last_success_ms = Some(now_ms);

    observe_snapshot(state, &ticket.key, effects);
    effects.push(ConsoleEffect::RequestFrame);
}

fn check_payload(key: &QueryKey, payload: &QueryPayload) -> Result<(), StaleDataError> {
    if key.resource() != payload.resource() {
        return Err(StaleDataError::Superseded);
    }
    match (key.subject(), payload.subject()) {
        (Some(expected), Some(received)) if expected != received => {
            Err(StaleDataError::Subject {
                expected: expected.clone(),
                received: received.clone(),
            })
        }
        _ => Ok(()),
    }
}

fn observe_snapshot(state: &mut ConsoleState, key: &QueryKey, effects: &mut Vec<ConsoleEffect>) {
    let route = state.route.clone();
    match key {
        QueryKey::Workflow(id) => {
            let Some(workflow) = state.cache.workflow(id) else {
                return;
            };
            reconcile_selection(&mut state.selection, workflow);
            if let Some(signal) = state.lifecycle.observe_workflow(&route, workflow) {
                apply_signal(state, signal, effects);
            }
        }
        QueryKey::AbStatus(id) => {
            let Some(status) = state.cache.ab_status(id) else {
                return;
            };
            let signals = state.lifecycle.observe_ab_status(
                &route,
                status,
                state.now_ms,
                state.config.lifecycle.redirect_grace_ms,
            );
            for signal in signals {
                apply_signal(state, signal, effects);
            }
        }
        QueryKey::WorkflowList | QueryKey::Health => {}
    }
}

/// Seeds the operator's selection the first time a list appears and
/// leaves it alone afterwards. An empty list clears it.
fn reconcile_selection(selection: &mut ReviewSelection, workflow: &WorkflowDetail) {
    let first_script = workflow.scripts.first().map(|script| script.id.as_str());
    selection.script = seed_choice(
        selection.script.take(),
        first_script,
        workflow.valid_selected_script(),
    );

    let first_thumbnail = workflow.thumbnails.first().map(|thumb| thumb.id.as_str());
    selection.thumbnail = seed_choice(
        selection.thumbnail.take(),
        first_thumbnail,
        workflow.valid_selected_thumbnail(),
    );
}

fn seed_choice(
    current: Option<String>,
    first: Option<&str>,
    backend: Option<&str>,
) -> Option<String> {
    let first = first?;
    current.or_else(|| Some(backend.unwrap_or(first).to_string()))
}

fn check_script_choice(state: &ConsoleState, id: &str) -> Result<(), PreconditionError> {
    let workflow = state.current_workflow().ok_or(PreconditionError::NotLoaded)?;
    if !resolve_stage(StageInput::from_workflow(workflow)).actions.approve {
        return Err(PreconditionError::ActionUnavailable {
            action: "select-script",
            status: workflow.status.to_string(),
        });
    }
    if workflow.script(id).is_none() {
        return Err(PreconditionError::UnknownVariant(id.to_string()));
    }
    Ok(())
}

fn check_thumbnail_choice(state: &ConsoleState, id: &str) -> Result<(), PreconditionError> {
    let workflow = state.current_workflow().ok_or(PreconditionError::NotLoaded)?;
    if !resolve_stage(StageInput::from_workflow(workflow)).actions.finalize {
        return Err(PreconditionError::ActionUnavailable {
            action: "select-thumbnail",
            status: workflow.status.to_string(),
        });
    }
    if workflow.thumbnail(id).is_none() {
        return Err(PreconditionError::UnknownVariant(id.to_string()));
    }
    Ok(())
}

fn apply_choice(
    state: &mut ConsoleState,
    result: Result<(), PreconditionError>,
    apply: impl FnOnce(&mut ReviewSelection),
) -> Vec<ConsoleEffect> {
    match result {
        Ok(()) => {
            apply(&mut state.selection);
            state.validation = None;
        }
        Err(err) => {
            debug!(event = "selection_rejected", error = %err);
            state.validation = Some(err);
        }
    }
    vec![ConsoleEffect::RequestFrame]
}

fn submit(
    state: &mut ConsoleState,
    built: Result<Command, PreconditionError>,
) -> Vec<ConsoleEffect> {
    let command = match built {
        Ok(command) => command,
        Err(err) => {
            debug!(event = "command_rejected", error = %err);
            state.validation = Some(err);
            return vec![ConsoleEffect::RequestFrame];
        }
    };

    state.validation = None;
    let seq = state.commands.next_seq;
    state.commands.next_seq += 1;
    let kind = command.kind();
    let scope = command.scope();
    state
        .commands
        .in_flight
        .insert(scope.clone(), InFlightCommand { seq, kind });

    info!(event = "command_sent", command = kind.label(), seq);
    let ticket = CommandTicket {
        seq,
        generation: state.generation,
        scope,
        kind,
    };
    vec![
        ConsoleEffect::SendCommand { ticket, command },
        ConsoleEffect::RequestFrame,
    ]
}

fn command_resolved(
    state: &mut ConsoleState,
    ticket: CommandTicket,
    command: Command,
    result: Result<CommandOutcome, RequestError>,
    effects: &mut Vec<ConsoleEffect>,
) {
    let holds_slot = state
        .commands
        .in_flight
        .get(&ticket.scope)
        .is_some_and(|in_flight| in_flight.seq == ticket.seq);
    if !holds_slot {
        let err = StaleDataError::Superseded;
        debug!(event = "command_discarded", command = ticket.kind.label(), error = %err);
        return;
    }
    state.commands.in_flight.remove(&ticket.scope);
    effects.push(ConsoleEffect::RequestFrame);

    if ticket.generation != state.generation {
        let err = StaleDataError::Generation {
            issued: ticket.generation,
            current: state.generation,
        };
        debug!(event = "command_discarded", command = ticket.kind.label(), error = %err);
        return;
    }

    match result {
        Ok(outcome) => {
            info!(event = "command_succeeded", command = ticket.kind.label());
            apply_command_outcome(state, &command, outcome, effects);
        }
        Err(error) => {
            warn!(event = "command_failed", command = ticket.kind.label(), error = %error);
            let message = format!("{}: {}", command.failure_message(), error.message);
            notify(state, NotificationLevel::Error, message, effects);
        }
    }
}

fn apply_command_outcome(
    state: &mut ConsoleState,
    command: &Command,
    outcome: CommandOutcome,
    effects: &mut Vec<ConsoleEffect>,
) {
    let mut started = None;
    if let CommandOutcome::Workflow(detail) = outcome {
        match command {
            Command::StartWorkflow(_) => started = Some(detail.workflow_id.clone()),
            Command::Reject { .. } => {
                state.selection = ReviewSelection {
                    script: detail.scripts.first().map(|script| script.id.clone()),
                    thumbnail: None,
                };
            }
            _ => reconcile_selection(&mut state.selection, &detail),
        }
        let key = QueryKey::Workflow(detail.workflow_id.clone());
        state
            .cache
            .store_snapshot(&key, QueryPayload::Workflow(detail), state.now_ms);
    }

    for key in command.invalidates() {
        state.cache.mark_stale(&key);
    }
    notify(
        state,
        NotificationLevel::Success,
        command.success_message(),
        effects,
    );

    match command {
        Command::SelectThumbnail { workflow_id, .. } => {
            navigate(state, Route::AbMonitor(workflow_id.clone()), effects);
        }
        Command::StartWorkflow(_) => {
            if let Some(id) = started {
                navigate(state, Route::WorkflowDetail(id), effects);
            }
        }
        _ => {}
    }
}

fn notify(
    state: &mut ConsoleState,
    level: NotificationLevel,
    message: impl Into<std::sync::Arc<str>>,
    effects: &mut Vec<ConsoleEffect>,
) {
    let expires_at_ms = state
        .now_ms
        .saturating_add(state.config.notifications.ttl_ms);
    let notification = state.notifications.push(level, message, expires_at_ms);
    effects.push(ConsoleEffect::Notify(notification));
}

#[cfg(test)]
mod tests;
