use super::*;
use pretty_assertions::assert_eq;

#[test]
fn first_snapshot_seeds_first_script_without_backend_selection() {
    let state = open_detail(workflow("wf-1", "awaiting_approval", &["s1", "s2"], &[]));

    assert_eq!(state.selection.script.as_deref(), Some("s1"));
    assert_eq!(state.selection.thumbnail, None);
}

#[test]
fn backend_selection_wins_over_first_element() {
    let mut detail = workflow("wf-1", "awaiting_thumbnail_selection", &["s1", "s2"], &["t1", "t2"]);
    detail.selected_script_id = Some("s2".to_string());
    detail.selected_thumbnail_id = Some("t2".to_string());

    let state = open_detail(detail);

    assert_eq!(state.selection.script.as_deref(), Some("s2"));
    assert_eq!(state.selection.thumbnail.as_deref(), Some("t2"));
}

#[test]
fn dangling_backend_selection_falls_back_to_first_element() {
    let mut detail = workflow("wf-1", "awaiting_approval", &["s1", "s2"], &[]);
    detail.selected_script_id = Some("s9".to_string());

    let state = open_detail(detail);

    assert_eq!(state.selection.script.as_deref(), Some("s1"));
}

#[test]
fn later_polls_never_overwrite_operator_choice() {
    let mut state = open_detail(workflow("wf-1", "awaiting_approval", &["s1", "s2"], &[]));
    user(&mut state, UserAction::SelectScript("s2".to_string()));
    assert_eq!(state.selection.script.as_deref(), Some("s2"));

    let effects = tick(&mut state, 2_000);
    let ticket = fetch_for(&effects, &QueryKey::Workflow(wf("wf-1")));
    let mut detail = workflow("wf-1", "awaiting_approval", &["s1", "s2"], &[]);
    detail.selected_script_id = Some("s1".to_string());
    resolve(&mut state, ticket, Ok(QueryPayload::Workflow(detail)));

    assert_eq!(state.selection.script.as_deref(), Some("s2"));
}

#[test]
fn different_script_list_keeps_choice_and_leaves_membership_to_the_backend() {
    let mut state = open_detail(workflow("wf-1", "awaiting_approval", &["s1", "s2"], &[]));
    assert_eq!(state.selection.script.as_deref(), Some("s1"));

    let effects = tick(&mut state, 2_000);
    let ticket = fetch_for(&effects, &QueryKey::Workflow(wf("wf-1")));
    resolve(
        &mut state,
        ticket,
        Ok(QueryPayload::Workflow(workflow("wf-1", "awaiting_approval", &["x1", "x2"], &[]))),
    );

    assert_eq!(state.selection.script.as_deref(), Some("s1"));
    assert!(review_view(&state).expect("detail view").controls.approve);

    let effects = user(&mut state, UserAction::Approve);
    assert_eq!(state.validation, None);
    let (_, command) = sent_command(&effects);
    assert_eq!(
        command,
        Command::Approve {
            workflow_id: wf("wf-1"),
            script_id: "s1".to_string(),
        }
    );
}

#[test]
fn empty_list_clears_selection_and_next_list_reseeds() {
    let mut state = open_detail(workflow("wf-1", "awaiting_approval", &["s1", "s2"], &[]));

    let effects = tick(&mut state, 2_000);
    let ticket = fetch_for(&effects, &QueryKey::Workflow(wf("wf-1")));
    resolve(
        &mut state,
        ticket,
        Ok(QueryPayload::Workflow(workflow("wf-1", "generating_scripts", &[], &[]))),
    );
    assert_eq!(state.selection.script, None);

    let effects = tick(&mut state, 4_000);
    let ticket = fetch_for(&effects, &QueryKey::Workflow(wf("wf-1")));
    resolve(
        &mut state,
        ticket,
        Ok(QueryPayload::Workflow(workflow("wf-1", "awaiting_approval", &["n1", "n2"], &[]))),
    );
    assert_eq!(state.selection.script.as_deref(), Some("n1"));
}

#[test]
fn picking_an_unknown_or_locked_variant_is_rejected() {
    let mut state = open_detail(workflow("wf-1", "awaiting_approval", &["s1"], &[]));

    user(&mut state, UserAction::SelectScript("s7".to_string()));
    assert_eq!(
        state.validation,
        Some(PreconditionError::UnknownVariant("s7".to_string()))
    );
    assert_eq!(state.selection.script.as_deref(), Some("s1"));

    user(&mut state, UserAction::SelectThumbnail("t1".to_string()));
    assert_eq!(
        state.validation,
        Some(PreconditionError::ActionUnavailable {
            action: "select-thumbnail",
            status: "awaiting_approval".to_string(),
        })
    );

    user(&mut state, UserAction::SelectScript("s1".to_string()));
    assert_eq!(state.validation, None);
}
