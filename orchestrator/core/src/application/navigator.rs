// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Process Navigator
//!
//! Moves an [`AbstractLocation`] one step through a [`ProcessModel`].
//! Gateways are delegated to the [`GatewayEngine`]; everything else
//! (events, tasks, subprocess boundaries, boundary events) is handled here.
//!
//! The navigator never executes task bodies. Callers execute the task at a
//! location first and then call [`ProcessNavigator::advance`] to learn where
//! execution continues.

use crate::application::gateway_engine::{GatewayEngine, GatewayError, PathUpdate};
use crate::domain::condition::{ConditionEvaluator, Variables};
use crate::domain::context::{AbstractLocation, ExecutionContext, LocationKind};
use crate::domain::engine_config::NavigatorConfig;
use crate::domain::process::{Flow, Node, NodeKind, ProcessModel};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Where execution goes after one navigation step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavigationStep {
    /// Locations to continue from. While `waiting`, holds the join's wait marker.
    pub next: Vec<AbstractLocation>,
    pub path_updates: Vec<PathUpdate>,
    /// The branch reached a top-level end event
    pub completed: bool,
    /// The branch is parked at a join until its sibling paths arrive
    pub waiting: bool,
}

impl NavigationStep {
    fn continue_to(next: Vec<AbstractLocation>) -> Self {
        Self {
            next,
            ..Self::default()
        }
    }

    fn finished() -> Self {
        Self {
            completed: true,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProcessNavigator {
    engine: GatewayEngine,
    config: NavigatorConfig,
}

impl ProcessNavigator {
    pub fn new(config: NavigatorConfig) -> Self {
        Self {
            engine: GatewayEngine::new(),
            config,
        }
    }

    pub fn gateway_engine(&self) -> &GatewayEngine {
        &self.engine
    }

    /// Initial locations of a top-level process: one per start event.
    pub fn start(
        &self,
        model: &ProcessModel,
        process_id: &str,
    ) -> Result<Vec<AbstractLocation>, NavigationError> {
        if !model.process_ids().any(|p| p == process_id) {
            return Err(NavigationError::ProcessNotFound(process_id.to_string()));
        }
        let starts = model.start_events(process_id);
        if starts.is_empty() {
            return Err(NavigationError::NoStartEvent(process_id.to_string()));
        }
        Ok(starts
            .into_iter()
            .map(|n| AbstractLocation::node(&n.id, process_id))
            .collect())
    }

    /// Advance past the node at `location`.
    pub fn advance(
        &self,
        model: &ProcessModel,
        location: &AbstractLocation,
        context: &mut ExecutionContext,
    ) -> Result<NavigationStep, NavigationError> {
        if location.is_wait_marker() {
            return Ok(NavigationStep {
                waiting: true,
                ..NavigationStep::default()
            });
        }

        let node = model
            .get_node(&location.node_id)
            .ok_or_else(|| NavigationError::NodeNotFound(location.node_id.clone()))?;

        // Remaining multi-instance runs repeat the same location
        if let Some(total) = node.loop_cardinality.filter(|t| *t > 1) {
            if !context.complete_instance(&node.id, total) {
                return Ok(NavigationStep::continue_to(vec![location.clone()]));
            }
        }

        let visits = context.increment_visit(&node.id);
        if visits > self.config.max_node_visits {
            return Err(NavigationError::LoopLimitExceeded {
                node: node.id.clone(),
                limit: self.config.max_node_visits,
            });
        }

        match node.kind {
            NodeKind::ExclusiveGateway | NodeKind::ParallelGateway | NodeKind::InclusiveGateway => {
                let outcome = self.engine.process(model, location, context)?;
                Ok(NavigationStep {
                    waiting: !outcome.processing_complete,
                    next: outcome.next_locations,
                    path_updates: outcome.path_updates,
                    completed: false,
                })
            }
            NodeKind::SubProcess => self.enter_subprocess(model, node, location, context),
            NodeKind::EndEvent => match node.parent.as_deref() {
                Some(subprocess_id) => self.exit_subprocess(model, subprocess_id, context),
                None => {
                    debug!(node_id = %node.id, routine_id = %location.routine_id, "Reached end event");
                    Ok(NavigationStep::finished())
                }
            },
            NodeKind::StartEvent | NodeKind::Task | NodeKind::BoundaryEvent => {
                match node.parent.as_deref() {
                    // Implicit end inside a subprocess completes the subprocess
                    Some(subprocess_id) if model.outgoing_flows(&node.id).is_empty() => {
                        self.exit_subprocess(model, subprocess_id, context)
                    }
                    _ => self.follow_flows(model, node, location, &context.variables),
                }
            }
        }
    }

    /// Fire a boundary event attached to the activity at `activity_location`.
    ///
    /// Returns a step positioned on the boundary event itself; advancing it
    /// follows the boundary's outgoing flows. An interrupting event cancels the
    /// activity: its parallel branch is retired and, for a subprocess, the
    /// subprocess frame is dropped.
    pub fn trigger_boundary_event(
        &self,
        model: &ProcessModel,
        activity_location: &AbstractLocation,
        boundary_id: &str,
        context: &mut ExecutionContext,
    ) -> Result<NavigationStep, NavigationError> {
        let boundary = model
            .get_node(boundary_id)
            .filter(|n| n.kind == NodeKind::BoundaryEvent)
            .filter(|n| n.attached_to.as_deref() == Some(activity_location.node_id.as_str()))
            .ok_or_else(|| NavigationError::BoundaryNotAttached {
                boundary: boundary_id.to_string(),
                activity: activity_location.node_id.clone(),
            })?;

        if boundary.cancel_activity {
            if let Some(branch_id) = &activity_location.metadata.branch_id {
                context.retire_branch(branch_id);
            }
            if model.get_node(&activity_location.node_id).map(|n| n.kind) == Some(NodeKind::SubProcess) {
                context.exit_subprocess(&activity_location.node_id);
            }
        }

        debug!(
            boundary_id = %boundary.id,
            activity_id = %activity_location.node_id,
            interrupting = boundary.cancel_activity,
            "Boundary event triggered"
        );

        let mut metadata = activity_location.metadata.inherited();
        metadata.parent_node = Some(activity_location.node_id.clone());
        let location = AbstractLocation::node(&boundary.id, &activity_location.routine_id)
            .with_kind(LocationKind::BoundaryEvent)
            .with_metadata(metadata);
        Ok(NavigationStep::continue_to(vec![location]))
    }

    fn follow_flows(
        &self,
        model: &ProcessModel,
        node: &Node,
        location: &AbstractLocation,
        variables: &Variables,
    ) -> Result<NavigationStep, NavigationError> {
        let outgoing = model.outgoing_flows(&node.id);
        if outgoing.is_empty() {
            // Implicit end
            return Ok(NavigationStep::finished());
        }

        let taken: Vec<&Flow> = outgoing
            .into_iter()
            .filter(|f| ConditionEvaluator::evaluate_guard(f.condition.as_deref(), variables))
            .collect();
        if taken.is_empty() {
            return Err(NavigationError::NoEligibleFlow(node.id.clone()));
        }

        Ok(NavigationStep::continue_to(
            taken
                .into_iter()
                .map(|f| successor(node, f, location))
                .collect(),
        ))
    }

    fn enter_subprocess(
        &self,
        model: &ProcessModel,
        node: &Node,
        location: &AbstractLocation,
        context: &mut ExecutionContext,
    ) -> Result<NavigationStep, NavigationError> {
        let starts = model.subprocess_start_events(&node.id);
        if starts.is_empty() {
            return Err(NavigationError::NoStartEvent(node.id.clone()));
        }
        context.enter_subprocess(&node.id, location.clone());
        debug!(subprocess_id = %node.id, "Entered subprocess");

        let mut metadata = location.metadata.inherited();
        metadata.parent_node = Some(node.id.clone());
        metadata.subprocess_id = Some(node.id.clone());
        Ok(NavigationStep::continue_to(
            starts
                .into_iter()
                .map(|s| {
                    AbstractLocation::node(&s.id, &location.routine_id).with_metadata(metadata.clone())
                })
                .collect(),
        ))
    }

    fn exit_subprocess(
        &self,
        model: &ProcessModel,
        subprocess_id: &str,
        context: &mut ExecutionContext,
    ) -> Result<NavigationStep, NavigationError> {
        let frame = context
            .exit_subprocess(subprocess_id)
            .ok_or_else(|| NavigationError::SubprocessNotActive(subprocess_id.to_string()))?;
        debug!(subprocess_id, "Exited subprocess");

        let subprocess = model
            .get_node(subprocess_id)
            .ok_or_else(|| NavigationError::NodeNotFound(subprocess_id.to_string()))?;
        match subprocess.parent.as_deref() {
            Some(outer) if model.outgoing_flows(subprocess_id).is_empty() => {
                self.exit_subprocess(model, outer, context)
            }
            _ => self.follow_flows(model, subprocess, &frame.parent_location, &context.variables),
        }
    }
}

fn successor(node: &Node, flow: &Flow, location: &AbstractLocation) -> AbstractLocation {
    let mut metadata = location.metadata.inherited();
    metadata.parent_node = Some(node.id.clone());
    AbstractLocation::node(&flow.target, &location.routine_id).with_metadata(metadata)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NavigationError {
    #[error("Process not found: {0}")]
    ProcessNotFound(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("No start event in {0}")]
    NoStartEvent(String),

    #[error("No outgoing flow of {0} has a true guard")]
    NoEligibleFlow(String),

    #[error("Node {node} visited more than {limit} times")]
    LoopLimitExceeded { node: String, limit: u32 },

    #[error("Boundary event {boundary} is not attached to {activity}")]
    BoundaryNotAttached { boundary: String, activity: String },

    #[error("Subprocess {0} is not active")]
    SubprocessNotActive(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}
