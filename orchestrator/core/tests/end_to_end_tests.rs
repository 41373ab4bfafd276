// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end tests for process navigation
//!
//! These tests verify the full process-tier pipeline:
//! 1. Parse a process definition fixture
//! 2. Drive it with the navigator or the routine runner
//! 3. Verify routing, synchronization and the events published back

use async_trait::async_trait;
use meridian_core::application::navigator::ProcessNavigator;
use meridian_core::application::routine_runner::{
    NavigatorRoutineRunner, RoutineError, RoutineRequest, RoutineRunner, TaskError, TaskExecutor,
};
use meridian_core::domain::condition::Variables;
use meridian_core::domain::context::ExecutionContext;
use meridian_core::domain::engine_config::EngineConfig;
use meridian_core::domain::events::{event_types, Event};
use meridian_core::domain::process::{Node, ProcessModel};
use meridian_core::infrastructure::event_bus::{EventBus, EventReceiver};
use meridian_core::infrastructure::process_parser::ProcessParser;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

fn review_model() -> ProcessModel {
    ProcessParser::parse_file(fixture("inclusive_review.yaml"))
        .expect("Failed to parse inclusive_review.yaml")
}

/// Records every executed task; fails tasks listed in `failing`.
#[derive(Default)]
struct RecordingExecutor {
    executed: Mutex<Vec<String>>,
    failing: Vec<String>,
}

#[async_trait]
impl TaskExecutor for RecordingExecutor {
    async fn execute(&self, task: &Node, _variables: &Variables) -> Result<Variables, TaskError> {
        if self.failing.contains(&task.id) {
            return Err(TaskError::new(format!("{} exploded", task.id)));
        }
        self.executed.lock().unwrap().push(task.id.clone());
        let mut updates = Variables::new();
        updates.insert(format!("{}_done", task.id), json!(true));
        Ok(updates)
    }
}

fn request(plan: Value) -> RoutineRequest {
    RoutineRequest {
        swarm_id: "swarm-e2e".into(),
        plan,
        user_id: "tester".into(),
        correlation_id: Uuid::new_v4(),
    }
}

fn drain(receiver: &mut EventReceiver) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

#[test]
fn test_four_way_inclusive_reaches_end_exactly_once() {
    let model = review_model();
    let navigator = ProcessNavigator::default();
    let mut ctx = ExecutionContext::new("review");
    ctx.set_variable("conditionA", json!(true));
    ctx.set_variable("conditionB", json!(false));
    ctx.set_variable("conditionC", json!(true));

    let mut queue: VecDeque<_> = navigator.start(&model, "review").unwrap().into();
    let mut visited = Vec::new();
    let mut ends = 0;
    let mut waits = 0;

    while let Some(location) = queue.pop_front() {
        visited.push(location.node_id.clone());
        let step = navigator.advance(&model, &location, &mut ctx).unwrap();
        if step.completed {
            ends += 1;
        }
        if step.waiting {
            waits += 1;
        }
        queue.extend(step.next.into_iter().filter(|l| !l.is_wait_marker()));
    }

    assert_eq!(ends, 1);
    assert_eq!(waits, 1);
    assert!(visited.contains(&"taskA".to_string()));
    assert!(visited.contains(&"taskC".to_string()));
    assert!(!visited.contains(&"taskB".to_string()));
    assert!(!visited.contains(&"taskDefault".to_string()));
    assert_eq!(visited.iter().filter(|n| *n == "finalize").count(), 1);
    assert!(ctx.inclusive_states().is_empty());
}

const NESTED_PARALLEL: &str = r#"
processes:
  - id: nested
    elements:
      - { id: start, type: startEvent }
      - { id: outer, type: parallelGateway }
      - { id: inner, type: parallelGateway }
      - { id: a, type: task }
      - { id: b, type: task }
      - { id: inner_join, type: parallelGateway }
      - { id: c, type: task }
      - { id: outer_join, type: parallelGateway }
      - { id: end, type: endEvent }
    flows:
      - { id: f1, source: start, target: outer }
      - { id: f2, source: outer, target: inner }
      - { id: f3, source: outer, target: c }
      - { id: f4, source: inner, target: a }
      - { id: f5, source: inner, target: b }
      - { id: f6, source: a, target: inner_join }
      - { id: f7, source: b, target: inner_join }
      - { id: f8, source: inner_join, target: outer_join }
      - { id: f9, source: c, target: outer_join }
      - { id: f10, source: outer_join, target: end }
"#;

#[test]
fn test_nested_parallel_splits_retire_every_branch() {
    let model = assert_ok!(ProcessModel::load(NESTED_PARALLEL));
    let navigator = ProcessNavigator::default();
    let mut ctx = ExecutionContext::new("nested");

    let mut queue: VecDeque<_> = assert_ok!(navigator.start(&model, "nested")).into();
    let mut ends = 0;
    let mut peak_branches = 0;

    while let Some(location) = queue.pop_front() {
        let step = assert_ok!(navigator.advance(&model, &location, &mut ctx));
        peak_branches = peak_branches.max(ctx.active_branches().len());
        if step.completed {
            ends += 1;
        }
        queue.extend(step.next);
    }

    assert_eq!(ends, 1);
    assert_eq!(peak_branches, 4);
    assert!(ctx.active_branches().is_empty(), "leftover: {:?}", ctx.active_branches());
    assert!(!ctx.has_pending_parallel_joins());
}

#[tokio::test]
async fn test_runner_publishes_progress_then_completed() {
    let bus = EventBus::new(64);
    let mut receiver = bus.subscribe();
    let executor = Arc::new(RecordingExecutor::default());
    let runner = NavigatorRoutineRunner::new(bus.clone(), executor.clone(), EngineConfig::default())
        .register("review", review_model());

    let plan = json!({
        "process": "review",
        "variables": {"conditionA": true, "conditionB": false, "conditionC": true}
    });
    let summary = assert_ok!(runner.run(Uuid::new_v4(), &request(plan)).await);

    let executed = executor.executed.lock().unwrap().clone();
    assert_eq!(executed.len(), 3);
    assert_eq!(executed.last().map(String::as_str), Some("finalize"));
    assert_eq!(summary.tasks_completed, 3);
    assert_eq!(summary.variables.get("taskA_done"), Some(&json!(true)));

    let events = drain(&mut receiver);
    let progress = events.iter().filter(|e| e.is(event_types::ROUTINE_PROGRESS)).count();
    assert_eq!(progress, 3);
    let last = events.last().unwrap();
    assert!(last.is(event_types::ROUTINE_COMPLETED));
    assert_eq!(last.target.as_deref(), Some("swarm-e2e"));
    assert_eq!(last.data["variables"]["taskC_done"], json!(true));
}

#[tokio::test]
async fn test_request_execution_reports_through_bus() {
    let bus = EventBus::new(64);
    let mut receiver = bus.subscribe_target("swarm-e2e");
    let runner = NavigatorRoutineRunner::new(
        bus.clone(),
        Arc::new(RecordingExecutor::default()),
        EngineConfig::default(),
    )
    .register("review", review_model());

    let req = request(json!({"process": "review", "variables": {"conditionB": true}}));
    let correlation = req.correlation_id;
    let handle = assert_ok!(runner.request_execution(req).await);
    assert_eq!(handle.process, "review");

    let completed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = receiver.recv().await.unwrap();
            if event.is(event_types::ROUTINE_COMPLETED) {
                return event;
            }
        }
    })
    .await
    .expect("routine did not complete");

    assert_eq!(completed.metadata.correlation_id, correlation);
    assert_eq!(completed.data_str("routine_id"), Some(handle.routine_id.to_string().as_str()));
}

#[tokio::test]
async fn test_task_failure_without_boundary_fails_routine() {
    let bus = EventBus::new(64);
    let mut receiver = bus.subscribe();
    let executor = Arc::new(RecordingExecutor {
        failing: vec!["taskA".into()],
        ..Default::default()
    });
    let runner = NavigatorRoutineRunner::new(bus.clone(), executor, EngineConfig::default())
        .register("review", review_model());

    let err = runner
        .run(Uuid::new_v4(), &request(json!({"process": "review", "variables": {"conditionA": true}})))
        .await
        .unwrap_err();
    assert!(matches!(err, RoutineError::Task { ref task, .. } if task == "taskA"));

    let events = drain(&mut receiver);
    let failed = events.last().unwrap();
    assert!(failed.is(event_types::ROUTINE_FAILED));
    assert!(failed.data_str("error").unwrap().contains("taskA"));
}

#[tokio::test]
async fn test_error_boundary_recovers_parallel_branch() {
    let model = ProcessParser::parse_file(fixture("parallel_with_error_boundary.yaml")).unwrap();
    let executor = Arc::new(RecordingExecutor {
        failing: vec!["lint".into()],
        ..Default::default()
    });
    let runner = NavigatorRoutineRunner::new(EventBus::new(64), executor.clone(), EngineConfig::default())
        .register("build", model);

    let summary = assert_ok!(
        runner
            .run(Uuid::new_v4(), &request(json!({"process": "build"})))
            .await
    );

    let executed = executor.executed.lock().unwrap().clone();
    assert!(executed.contains(&"report_lint".to_string()));
    assert_eq!(executed.iter().filter(|t| *t == "publish").count(), 3);
    assert_eq!(summary.tasks_completed, 5);
}

#[tokio::test]
async fn test_engine_config_fixture_drives_loop_limit() {
    let config = EngineConfig::from_file(fixture("engine_config.yaml")).unwrap();
    assert_eq!(config.navigator.max_node_visits, 25);
    assert_eq!(config.gateway.deadlock_timeout, Duration::from_secs(150));

    let looping = r#"
processes:
  - id: spin
    elements:
      - { id: start, type: startEvent }
      - { id: again, type: exclusiveGateway, default: back }
      - { id: work, type: task }
    flows:
      - { id: f1, source: start, target: work }
      - { id: f2, source: work, target: again }
      - { id: back, source: again, target: work }
      - { id: out, source: again, target: work, condition: never }
"#;
    let runner = NavigatorRoutineRunner::new(
        EventBus::new(256),
        Arc::new(RecordingExecutor::default()),
        config,
    )
    .register("spin", ProcessModel::load(looping).unwrap());

    let outcome = runner
        .run(Uuid::new_v4(), &request(json!({"process": "spin"})))
        .await;
    assert_err!(&outcome);
    assert!(matches!(outcome, Err(RoutineError::Navigation(_))));
}
