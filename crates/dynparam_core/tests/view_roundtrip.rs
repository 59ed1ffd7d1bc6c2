//! Attaching, detaching and re-attaching control views

mod common;

use std::collections::BTreeSet;

use common::{outline, test_config, RecordingView, SynthOwner, ViewEvent};
use dynparam_core::{EngineError, EngineResult, GroupId, Instance, Value, ViewContext};

fn build_tree(instance: &Instance) -> GroupId {
    instance
        .with_producer_blocking(|session| -> EngineResult<GroupId> {
            let root = session.root();
            let env = session.add_group(root, "env", &[("section", Some("modulation"))])?;
            session.add_float(env, "attack", 0.01, 0.0, 2.0)?;
            session.add_float(env, "release", 0.3, 0.0, 8.0)?;
            session.add_command(env, "reset", &[])?;
            session.add_boolean(root, "bypass", false)?;
            Ok(env)
        })
        .unwrap()
        .unwrap()
}

fn appeared_contexts(events: &[ViewEvent]) -> BTreeSet<ViewContext> {
    events
        .iter()
        .filter_map(|event| match event {
            ViewEvent::GroupAppeared { context, .. }
            | ViewEvent::ParameterAppeared { context, .. }
            | ViewEvent::CommandAppeared { context, .. } => Some(*context),
            _ => None,
        })
        .collect()
}

fn disappeared_contexts(events: &[ViewEvent]) -> BTreeSet<ViewContext> {
    events
        .iter()
        .filter_map(|event| match event {
            ViewEvent::GroupDisappeared { context }
            | ViewEvent::ParameterDisappeared { context }
            | ViewEvent::CommandDisappeared { context } => Some(*context),
            _ => None,
        })
        .collect()
}

#[test]
fn test_reattach_announces_same_tree() {
    let mut owner = SynthOwner::new(false);
    let instance = Instance::attach(&mut owner, test_config()).unwrap();
    build_tree(&instance);

    let (view, first) = RecordingView::new();
    instance.control_attach_view(Box::new(view)).unwrap();
    let first_outline = outline(&first.lock());
    assert_eq!(first_outline.len(), 6);

    let detached = instance.control_detach_view();
    assert!(detached.is_some());
    assert!(!instance.is_view_attached());
    instance.check_invariants().unwrap();

    // every node the view was told about is withdrawn, nothing else
    let events = first.lock();
    let appeared = appeared_contexts(&events);
    let (_, withdrawn) = events.split_at(6);
    assert_eq!(disappeared_contexts(withdrawn), appeared);
    assert_eq!(withdrawn.len(), appeared.len());
    drop(events);

    let (view, second) = RecordingView::new();
    instance.control_attach_view(Box::new(view)).unwrap();
    assert_eq!(outline(&second.lock()), first_outline);
    instance.check_invariants().unwrap();
}

#[test]
fn test_second_view_is_refused() {
    let mut owner = SynthOwner::new(true);
    let instance = Instance::attach(&mut owner, test_config()).unwrap();
    let (view, _) = RecordingView::new();
    instance.control_attach_view(Box::new(view)).unwrap();

    let (other, events) = RecordingView::new();
    assert!(matches!(
        instance.control_attach_view(Box::new(other)),
        Err(EngineError::ProtocolViolation(_))
    ));
    assert!(events.lock().is_empty());
}

#[test]
fn test_detach_without_view() {
    let mut owner = SynthOwner::new(false);
    let instance = Instance::attach(&mut owner, test_config()).unwrap();
    assert!(instance.control_detach_view().is_none());
}

#[test]
fn test_detach_frees_nodes_waiting_for_removal() {
    let mut owner = SynthOwner::new(false);
    let instance = Instance::attach(&mut owner, test_config()).unwrap();
    let env = build_tree(&instance);
    let (view, events) = RecordingView::new();
    instance.control_attach_view(Box::new(view)).unwrap();
    assert_eq!(instance.pool_usage().parameters, 3);

    instance
        .try_producer(|session| session.remove_group(env))
        .unwrap()
        .unwrap();
    assert_eq!(instance.pool_usage().parameters, 3);

    instance.control_detach_view();
    assert_eq!(instance.pool_usage().parameters, 1);
    assert_eq!(instance.pool_usage().commands, 0);
    instance.check_invariants().unwrap();

    let events = events.lock();
    assert_eq!(appeared_contexts(&events), disappeared_contexts(&events));
}

#[test]
fn test_changes_made_while_detached_show_on_attach() {
    let mut owner = SynthOwner::new(true);
    let instance = Instance::attach(&mut owner, test_config()).unwrap();
    let cutoff = owner.cutoff.unwrap();
    let (view, _) = RecordingView::new();
    instance.control_attach_view(Box::new(view)).unwrap();
    instance.control_detach_view();

    instance
        .try_producer(|session| -> EngineResult<()> {
            session.set_value(cutoff, Value::Float(0.9))?;
            let root = session.root();
            session.add_integer(root, "voices", 4, 1, 16)?;
            Ok(())
        })
        .unwrap()
        .unwrap();
    // nobody is listening, so nothing is queued
    assert_eq!(instance.pool_usage().messages, 0);
    assert!(instance.control_run().diagnostics.is_clean());

    let (view, events) = RecordingView::new();
    instance.control_attach_view(Box::new(view)).unwrap();
    assert_eq!(
        outline(&events.lock()),
        vec![
            "+group synth",
            "+param cutoff Float(0.9)",
            "+param voices Integer(4)",
        ]
    );
}

#[test]
fn test_hints_reach_view_as_copies() {
    let mut owner = SynthOwner::new(false);
    let instance = Instance::attach(&mut owner, test_config()).unwrap();

    let unit = String::from("unit");
    let hertz = String::from("Hz");
    instance
        .with_producer_blocking(|session| -> EngineResult<GroupId> {
            let root = session.root();
            session.add_float(root, "cutoff", 440.0, 20.0, 20000.0)?;
            session.add_group(root, "tone", &[(unit.as_str(), Some(hertz.as_str()))])
        })
        .unwrap()
        .unwrap();

    let (view, events) = RecordingView::new();
    let addresses = std::sync::Arc::clone(&view.hint_addresses);
    instance.control_attach_view(Box::new(view)).unwrap();

    let events = events.lock();
    let hints = events
        .iter()
        .find_map(|event| match event {
            ViewEvent::GroupAppeared { name, hints, .. } if name == "tone" => Some(hints.clone()),
            _ => None,
        })
        .unwrap();
    assert_eq!(hints, vec![("unit".to_string(), Some("Hz".to_string()))]);

    let addresses = addresses.lock();
    assert_eq!(addresses.len(), 1);
    assert_ne!(addresses[0], unit.as_ptr() as usize);
}
