// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Routine Runner
//!
//! Boundary between the coordination tier and the process tier. A swarm asks
//! for a routine by handing over a plan; the runner resolves the plan to a
//! registered [`ProcessModel`], drives it to completion with the
//! [`ProcessNavigator`] and reports back exclusively through the [`EventBus`]:
//!
//! | Event | When |
//! |-------|------|
//! | `routine.progress` | after every executed task |
//! | `routine.completed` | all branches reached an end |
//! | `routine.failed` | navigation or task failure, or a stalled join |
//!
//! Each routine owns its [`ExecutionContext`] for its whole run; nothing about
//! it is shared back except the final variables carried in the events.

use crate::application::navigator::{NavigationError, ProcessNavigator};
use crate::domain::condition::Variables;
use crate::domain::context::{AbstractLocation, ExecutionContext};
use crate::domain::engine_config::EngineConfig;
use crate::domain::events::{event_types, Event, EventSource, Tier};
use crate::domain::process::{Node, NodeKind, ProcessModel};
use crate::infrastructure::event_bus::EventBus;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const COMPONENT: &str = "routine_runner";

// ============================================================================
// Ports
// ============================================================================

/// Request from a swarm to execute a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineRequest {
    pub swarm_id: String,
    /// Opaque plan; `plan["process"]` names the process to run and
    /// `plan["variables"]` seeds the routine's variables.
    pub plan: Value,
    pub user_id: String,
    pub correlation_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineHandle {
    pub routine_id: Uuid,
    pub process: String,
}

#[async_trait]
pub trait RoutineRunner: Send + Sync {
    /// Accept a routine for execution. Results arrive later as events.
    async fn request_execution(&self, request: RoutineRequest) -> Result<RoutineHandle, RoutineError>;
}

/// Executes the body of one task node and returns variable updates.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, task: &Node, variables: &Variables) -> Result<Variables, TaskError>;
}

/// Executor that completes every task immediately without output.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTaskExecutor;

#[async_trait]
impl TaskExecutor for NoopTaskExecutor {
    async fn execute(&self, _task: &Node, _variables: &Variables) -> Result<Variables, TaskError> {
        Ok(Variables::new())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct TaskError {
    pub message: String,
    /// Boundary event the failure should trigger, if the task chooses one
    pub boundary_event: Option<String>,
}

impl TaskError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            boundary_event: None,
        }
    }

    pub fn with_boundary(mut self, boundary_event: impl Into<String>) -> Self {
        self.boundary_event = Some(boundary_event.into());
        self
    }
}

// ============================================================================
// Application Service: NavigatorRoutineRunner
// ============================================================================

/// Summary of a finished routine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineSummary {
    pub routine_id: Uuid,
    pub process: String,
    pub variables: Variables,
    pub tasks_completed: u64,
    pub steps: u64,
}

#[derive(Clone)]
pub struct NavigatorRoutineRunner {
    models: HashMap<String, Arc<ProcessModel>>,
    executor: Arc<dyn TaskExecutor>,
    event_bus: EventBus,
    navigator: ProcessNavigator,
    config: EngineConfig,
}

impl NavigatorRoutineRunner {
    pub fn new(event_bus: EventBus, executor: Arc<dyn TaskExecutor>, config: EngineConfig) -> Self {
        Self {
            models: HashMap::new(),
            executor,
            event_bus,
            navigator: ProcessNavigator::new(config.navigator.clone()),
            config,
        }
    }

    /// Make a model available to plans under `name`.
    pub fn register(mut self, name: impl Into<String>, model: ProcessModel) -> Self {
        self.models.insert(name.into(), Arc::new(model));
        self
    }

    /// Execute a routine to the end, publishing its events along the way.
    pub async fn run(
        &self,
        routine_id: Uuid,
        request: &RoutineRequest,
    ) -> Result<RoutineSummary, RoutineError> {
        let (name, model, process_id) = self.resolve(&request.plan)?;
        let variables = seed_variables(&request.plan)?;

        let result = self
            .drive(routine_id, request, &name, &model, &process_id, variables)
            .await;

        match &result {
            Ok(summary) => {
                info!(
                    routine_id = %routine_id,
                    swarm_id = %request.swarm_id,
                    tasks = summary.tasks_completed,
                    "Routine completed"
                );
                self.publish(
                    event_types::ROUTINE_COMPLETED,
                    routine_id,
                    request,
                    json!({
                        "swarm_id": request.swarm_id,
                        "routine_id": routine_id,
                        "process": name,
                        "variables": summary.variables,
                        "tasks_completed": summary.tasks_completed,
                    }),
                );
            }
            Err(e) => {
                error!(routine_id = %routine_id, swarm_id = %request.swarm_id, error = %e, "Routine failed");
                self.publish(
                    event_types::ROUTINE_FAILED,
                    routine_id,
                    request,
                    json!({
                        "swarm_id": request.swarm_id,
                        "routine_id": routine_id,
                        "process": name,
                        "error": e.to_string(),
                    }),
                );
            }
        }
        result
    }

    async fn drive(
        &self,
        routine_id: Uuid,
        request: &RoutineRequest,
        name: &str,
        model: &ProcessModel,
        process_id: &str,
        variables: Variables,
    ) -> Result<RoutineSummary, RoutineError> {
        let mut context = ExecutionContext::new(process_id).with_variables(variables);
        let mut queue: VecDeque<AbstractLocation> =
            self.navigator.start(model, process_id)?.into_iter().collect();
        let mut tasks_completed = 0u64;
        let mut steps = 0u64;

        while let Some(location) = queue.pop_front() {
            steps += 1;
            let node = model
                .get_node(&location.node_id)
                .ok_or_else(|| NavigationError::NodeNotFound(location.node_id.clone()))?;

            let step = if node.kind == NodeKind::Task {
                let executed = self.executor.execute(node, &context.variables).await;
                match executed {
                    Ok(updates) => {
                        context.apply_updates(updates);
                        tasks_completed += 1;
                        self.publish(
                            event_types::ROUTINE_PROGRESS,
                            routine_id,
                            request,
                            json!({
                                "swarm_id": request.swarm_id,
                                "routine_id": routine_id,
                                "node_id": node.id,
                                "tasks_completed": tasks_completed,
                            }),
                        );
                        self.navigator.advance(model, &location, &mut context)?
                    }
                    Err(task_error) => {
                        let boundary = task_error
                            .boundary_event
                            .clone()
                            .or_else(|| model.boundary_events(&node.id).first().cloned())
                            .ok_or_else(|| RoutineError::Task {
                                task: node.id.clone(),
                                message: task_error.message.clone(),
                            })?;
                        warn!(
                            task_id = %node.id,
                            boundary_id = %boundary,
                            error = %task_error,
                            "Task failed, continuing from boundary event"
                        );
                        self.navigator
                            .trigger_boundary_event(model, &location, &boundary, &mut context)?
                    }
                }
            } else {
                self.navigator.advance(model, &location, &mut context)?
            };

            debug!(
                routine_id = %routine_id,
                node_id = %location.node_id,
                next = step.next.len(),
                waiting = step.waiting,
                "Navigation step"
            );
            queue.extend(step.next.into_iter().filter(|l| !l.is_wait_marker()));

            self.sweep_abandoned_joins(&mut context);
        }

        let mut stalled: Vec<String> = context
            .inclusive_states()
            .iter()
            .map(|s| s.gateway_id.clone())
            .chain(context.pending_parallel_joins().map(str::to_string))
            .collect();
        if !stalled.is_empty() {
            stalled.sort();
            stalled.dedup();
            return Err(RoutineError::Stalled(stalled));
        }

        Ok(RoutineSummary {
            routine_id,
            process: name.to_string(),
            variables: context.variables,
            tasks_completed,
            steps,
        })
    }

    fn sweep_abandoned_joins(&self, context: &mut ExecutionContext) {
        let mut gateways: Vec<String> = context
            .inclusive_states()
            .iter()
            .map(|s| s.gateway_id.clone())
            .collect();
        gateways.sort();
        gateways.dedup();
        for gateway_id in gateways {
            self.navigator.gateway_engine().resolve_deadlock(
                context,
                &gateway_id,
                self.config.gateway.deadlock_timeout,
            );
        }
    }

    fn resolve(&self, plan: &Value) -> Result<(String, Arc<ProcessModel>, String), RoutineError> {
        let name = plan
            .get("process")
            .and_then(Value::as_str)
            .ok_or_else(|| RoutineError::InvalidPlan("plan does not name a process".to_string()))?;
        let model = self
            .models
            .get(name)
            .cloned()
            .ok_or_else(|| RoutineError::UnknownProcess(name.to_string()))?;

        let process_id = match plan.get("process_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => model
                .process_ids()
                .next()
                .map(str::to_string)
                .ok_or_else(|| RoutineError::UnknownProcess(name.to_string()))?,
        };
        Ok((name.to_string(), model, process_id))
    }

    fn publish(&self, event_type: &str, routine_id: Uuid, request: &RoutineRequest, data: Value) {
        self.event_bus.publish(
            Event::new(
                event_type,
                EventSource::new(Tier::Process, COMPONENT, routine_id.to_string()),
                data,
            )
            .with_target(request.swarm_id.clone())
            .with_correlation(request.correlation_id),
        );
    }
}

fn seed_variables(plan: &Value) -> Result<Variables, RoutineError> {
    match plan.get("variables") {
        None | Some(Value::Null) => Ok(Variables::new()),
        Some(Value::Object(map)) => Ok(map.clone().into_iter().collect()),
        Some(_) => Err(RoutineError::InvalidPlan(
            "plan variables must be a mapping".to_string(),
        )),
    }
}

#[async_trait]
impl RoutineRunner for NavigatorRoutineRunner {
    async fn request_execution(&self, request: RoutineRequest) -> Result<RoutineHandle, RoutineError> {
        // Reject unusable plans up front; execution errors arrive as events
        let (name, _, _) = self.resolve(&request.plan)?;
        seed_variables(&request.plan)?;

        let routine_id = Uuid::new_v4();
        info!(
            routine_id = %routine_id,
            swarm_id = %request.swarm_id,
            user_id = %request.user_id,
            process = %name,
            "Routine accepted"
        );

        let runner = self.clone();
        tokio::spawn(async move {
            // Failures are already published as routine.failed
            let _ = runner.run(routine_id, &request).await;
        });

        Ok(RoutineHandle {
            routine_id,
            process: name,
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RoutineError {
    #[error("Unknown process: {0}")]
    UnknownProcess(String),

    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    #[error("Task {task} failed: {message}")]
    Task { task: String, message: String },

    #[error("Routine stalled at unsynchronized gateways {0:?}")]
    Stalled(Vec<String>),

    #[error(transparent)]
    Navigation(#[from] NavigationError),
}
