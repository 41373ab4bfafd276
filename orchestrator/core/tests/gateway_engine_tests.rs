// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for gateway synchronization
//!
//! These tests exercise the gateway engine against parsed process models:
//! 1. Inclusive split activation and failure
//! 2. Inclusive join waiting and single synchronization
//! 3. Deadlock sweep with controlled timestamps

use chrono::{Duration as ChronoDuration, Utc};
use meridian_core::application::gateway_engine::{
    GatewayEngine, GatewayError, GatewayOutcome, PathUpdateKind,
};
use meridian_core::domain::context::{
    AbstractLocation, EvaluatedCondition, ExecutionContext, InclusiveGatewayState,
    LocationMetadata, PathId,
};
use meridian_core::domain::process::ProcessModel;
use serde_json::json;
use std::time::Duration;

const THREE_WAY: &str = r#"
processes:
  - id: p
    elements:
      - { id: start, type: startEvent }
      - { id: split, type: inclusiveGateway, default: f_default }
      - { id: a, type: task }
      - { id: b, type: task }
      - { id: c, type: task }
      - { id: fallback, type: task }
      - { id: join, type: inclusiveGateway }
      - { id: end, type: endEvent }
    flows:
      - { id: f0, source: start, target: split }
      - { id: f_a, source: split, target: a, condition: A }
      - { id: f_b, source: split, target: b, condition: B }
      - { id: f_c, source: split, target: c, condition: C }
      - { id: f_default, source: split, target: fallback }
      - { id: f_a2, source: a, target: join }
      - { id: f_b2, source: b, target: join }
      - { id: f_c2, source: c, target: join }
      - { id: f_d2, source: fallback, target: join }
      - { id: f_end, source: join, target: end }
"#;

const NO_DEFAULT: &str = r#"
processes:
  - id: p
    elements:
      - { id: start, type: startEvent }
      - { id: split, type: inclusiveGateway }
      - { id: a, type: task }
      - { id: b, type: task }
      - { id: c, type: task }
    flows:
      - { id: f0, source: start, target: split }
      - { id: f_a, source: split, target: a, condition: A }
      - { id: f_b, source: split, target: b, condition: B }
      - { id: f_c, source: split, target: c, condition: "C == 'yes'" }
"#;

fn context(a: bool, b: bool, c: bool) -> ExecutionContext {
    let mut ctx = ExecutionContext::new("p");
    ctx.set_variable("A", json!(a));
    ctx.set_variable("B", json!(b));
    ctx.set_variable("C", json!(c));
    ctx
}

fn split(model: &ProcessModel, ctx: &mut ExecutionContext) -> GatewayOutcome {
    GatewayEngine::new()
        .process(model, &AbstractLocation::node("split", "p"), ctx)
        .unwrap()
}

/// The location a split branch has when it reaches the join.
fn arrival_at_join(branch: &AbstractLocation) -> AbstractLocation {
    let mut location = AbstractLocation::node("join", &branch.routine_id);
    location.metadata = branch.metadata.clone();
    location.metadata.parent_node = Some(branch.node_id.clone());
    location
}

fn state_aged(id: &str, gateway: &str, age: ChronoDuration) -> InclusiveGatewayState {
    let at = Utc::now() - age;
    InclusiveGatewayState {
        id: id.to_string(),
        gateway_id: gateway.to_string(),
        evaluated_conditions: vec![EvaluatedCondition {
            flow_id: "f_a".to_string(),
            expression: Some("A".to_string()),
            result: true,
            evaluated_at: at,
        }],
        activated_paths: vec![PathId::derive(id, 0)],
        created_at: at,
        origin: LocationMetadata::default(),
    }
}

#[test]
fn test_inclusive_split_activates_true_subset() {
    let model = ProcessModel::load(THREE_WAY).unwrap();
    let mut ctx = context(true, true, false);

    let outcome = split(&model, &mut ctx);

    let targets: Vec<&str> = outcome
        .next_locations
        .iter()
        .map(|l| l.node_id.as_str())
        .collect();
    assert_eq!(targets, vec!["a", "b"]);
    assert!(outcome.processing_complete);

    let state = &ctx.inclusive_states()[0];
    assert_eq!(state.activated_paths.len(), 2);
    assert_eq!(state.evaluated_conditions.len(), 3);
    assert!(!state.evaluated_conditions[2].result);

    let activated = outcome
        .path_updates
        .iter()
        .filter(|u| u.kind == PathUpdateKind::Activated)
        .count();
    assert_eq!(activated, 2);

    for location in &outcome.next_locations {
        assert_eq!(location.metadata.inclusive_gateway.as_deref(), Some("split"));
        assert!(state.owns_path(location.metadata.path_id.as_ref().unwrap()));
    }
}

#[test]
fn test_inclusive_split_falls_back_to_default_flow() {
    let model = ProcessModel::load(THREE_WAY).unwrap();
    let mut ctx = context(false, false, false);

    let outcome = split(&model, &mut ctx);

    assert_eq!(outcome.next_locations.len(), 1);
    assert_eq!(outcome.next_locations[0].node_id, "fallback");
    // Default flow is the fourth outgoing flow
    let state = &ctx.inclusive_states()[0];
    assert_eq!(state.activated_paths, vec![PathId::derive(&state.id, 3)]);
}

#[test]
fn test_split_with_no_true_condition_fails() {
    let model = ProcessModel::load(NO_DEFAULT).unwrap();
    let mut ctx = context(false, false, false);

    let err = GatewayEngine::new()
        .process(&model, &AbstractLocation::node("split", "p"), &mut ctx)
        .unwrap_err();

    assert_eq!(err, GatewayError::NoPathsActivated("split".into()));
    assert!(ctx.inclusive_states().is_empty());
}

#[test]
fn test_malformed_split_condition_does_not_open_path() {
    let model = ProcessModel::load(NO_DEFAULT).unwrap();
    let mut ctx = context(true, false, false);
    ctx.set_variable("C", json!("yes"));

    let outcome = split(&model, &mut ctx);
    assert_eq!(outcome.next_locations.len(), 2);

    // Comparing against a non-numeric operand is malformed and counts as false
    let mut ctx = context(true, false, false);
    let engine = GatewayEngine::new();
    let model = ProcessModel::load(&NO_DEFAULT.replace("C == 'yes'", "C >= 'yes'")).unwrap();
    let outcome = engine
        .process(&model, &AbstractLocation::node("split", "p"), &mut ctx)
        .unwrap();
    assert_eq!(outcome.next_locations.len(), 1);
    assert_eq!(outcome.next_locations[0].node_id, "a");
}

#[test]
fn test_join_waits_until_all_paths_arrive() {
    let model = ProcessModel::load(THREE_WAY).unwrap();
    let engine = GatewayEngine::new();
    let mut ctx = context(true, false, true);
    let branches = split(&model, &mut ctx).next_locations;
    assert_eq!(branches.len(), 2);

    let first = engine
        .process(&model, &arrival_at_join(&branches[0]), &mut ctx)
        .unwrap();
    assert!(!first.processing_complete);
    assert_eq!(first.next_locations.len(), 1);
    assert!(first.next_locations[0].is_wait_marker());
    assert_eq!(first.path_updates.len(), 1);
    assert_eq!(first.path_updates[0].kind, PathUpdateKind::Completed);

    let second = engine
        .process(&model, &arrival_at_join(&branches[1]), &mut ctx)
        .unwrap();
    assert!(second.processing_complete);
    assert_eq!(second.next_locations.len(), 1);
    assert_eq!(second.next_locations[0].node_id, "end");
    let synchronized = second
        .path_updates
        .iter()
        .filter(|u| u.kind == PathUpdateKind::Synchronized)
        .count();
    assert_eq!(synchronized, 1);

    // The continuation no longer belongs to the split
    assert!(second.next_locations[0].metadata.path_id.is_none());
    assert!(ctx.completed_paths("join").is_none());
}

#[test]
fn test_duplicate_arrival_before_sync_does_not_complete() {
    let model = ProcessModel::load(THREE_WAY).unwrap();
    let engine = GatewayEngine::new();
    let mut ctx = context(true, true, false);
    let branches = split(&model, &mut ctx).next_locations;

    let arrival = arrival_at_join(&branches[0]);
    assert!(!engine.process(&model, &arrival, &mut ctx).unwrap().processing_complete);
    assert!(!engine.process(&model, &arrival, &mut ctx).unwrap().processing_complete);
    assert_eq!(ctx.completed_paths("join").map(|s| s.len()), Some(1));
}

#[test]
fn test_join_fires_at_most_once() {
    let model = ProcessModel::load(THREE_WAY).unwrap();
    let engine = GatewayEngine::new();
    let mut ctx = context(true, true, false);
    let branches = split(&model, &mut ctx).next_locations;
    let instance = ctx.inclusive_states()[0].id.clone();

    for branch in &branches {
        engine
            .process(&model, &arrival_at_join(branch), &mut ctx)
            .unwrap();
    }
    assert!(ctx.inclusive_state(&instance).is_none());

    let stale = engine.process(&model, &arrival_at_join(&branches[0]), &mut ctx);
    assert!(matches!(
        stale,
        Err(GatewayError::SynchronizationStateMissing { .. })
    ));
}

#[test]
fn test_arrival_without_path_id_is_rejected() {
    let model = ProcessModel::load(THREE_WAY).unwrap();
    let mut ctx = context(true, true, false);
    let err = GatewayEngine::new()
        .process(&model, &AbstractLocation::node("join", "p"), &mut ctx)
        .unwrap_err();
    assert_eq!(err, GatewayError::MissingPathId("join".into()));
}

#[test]
fn test_concurrent_split_instances_synchronize_independently() {
    let model = ProcessModel::load(THREE_WAY).unwrap();
    let engine = GatewayEngine::new();
    let mut ctx = context(true, true, false);

    let first = split(&model, &mut ctx).next_locations;
    let second = split(&model, &mut ctx).next_locations;
    assert_eq!(ctx.inclusive_states().len(), 2);

    engine.process(&model, &arrival_at_join(&first[0]), &mut ctx).unwrap();
    engine.process(&model, &arrival_at_join(&second[0]), &mut ctx).unwrap();
    let done = engine
        .process(&model, &arrival_at_join(&first[1]), &mut ctx)
        .unwrap();

    assert!(done.processing_complete);
    assert_eq!(ctx.inclusive_states().len(), 1);
    // The second instance's arrival is still recorded
    assert_eq!(ctx.completed_paths("join").map(|s| s.len()), Some(1));
}

#[test]
fn test_deadlock_sweep_is_time_bound() {
    let engine = GatewayEngine::new();
    let mut ctx = ExecutionContext::new("p");
    ctx.insert_inclusive_state(state_aged("old", "split", ChronoDuration::minutes(10)));
    ctx.insert_inclusive_state(state_aged("young", "split", ChronoDuration::minutes(1)));
    ctx.insert_inclusive_state(state_aged("elsewhere", "other", ChronoDuration::minutes(10)));
    ctx.path_ledger_mut().record("join", PathId::derive("old", 0));

    let removed = engine.resolve_deadlock(&mut ctx, "split", Duration::from_secs(300));

    assert_eq!(removed, vec!["old".to_string()]);
    assert!(ctx.inclusive_state("young").is_some());
    assert!(ctx.inclusive_state("elsewhere").is_some());
    assert!(ctx.completed_paths("join").is_none());
}

#[test]
fn test_deadlock_sweep_by_join_gateway() {
    let engine = GatewayEngine::new();
    let mut ctx = ExecutionContext::new("p");
    ctx.insert_inclusive_state(state_aged("stuck", "split", ChronoDuration::minutes(10)));
    ctx.path_ledger_mut().record("join", PathId::derive("stuck", 0));

    let now = Utc::now();
    assert!(engine
        .resolve_deadlock_at(&mut ctx, "join", Duration::from_secs(3600), now)
        .is_empty());
    let removed = engine.resolve_deadlock_at(&mut ctx, "join", Duration::from_secs(60), now);
    assert_eq!(removed, vec!["stuck".to_string()]);
}

#[test]
fn test_late_arrival_after_sweep_is_an_error() {
    let model = ProcessModel::load(THREE_WAY).unwrap();
    let engine = GatewayEngine::new();
    let mut ctx = context(true, true, false);
    let branches = split(&model, &mut ctx).next_locations;

    let future = Utc::now() + ChronoDuration::hours(1);
    let removed = engine.resolve_deadlock_at(&mut ctx, "split", Duration::from_secs(60), future);
    assert_eq!(removed.len(), 1);

    let late = engine.process(&model, &arrival_at_join(&branches[0]), &mut ctx);
    assert!(matches!(
        late,
        Err(GatewayError::SynchronizationStateMissing { .. })
    ));
}
