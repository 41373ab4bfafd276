// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Gateway Engine Application Service
//!
//! Computes the routing outcome of a single gateway visit.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Split fan-out and join synchronization for exclusive,
//!   parallel and inclusive gateways
//! - **Dependencies:** Domain (ProcessModel, ExecutionContext, ConditionEvaluator)
//!
//! The engine holds no instance state. Every call reads the model, mutates the
//! caller's [`ExecutionContext`] and returns a [`GatewayOutcome`]. It is safe to
//! run concurrently over independent contexts, never over the same one.
//!
//! # Visit Phases
//!
//! ```text
//! incoming > 1 ──► join phase   (parallel: AND counter, inclusive: path ledger)
//!                      │ complete
//!                      ▼
//! outgoing > 1 ──► split phase  (exclusive: first match, parallel: all,
//!                                inclusive: every true condition)
//! otherwise    ──► pass-through
//! ```

use crate::domain::condition::ConditionEvaluator;
use crate::domain::context::{
    AbstractLocation, EvaluatedCondition, ExecutionContext, InclusiveGatewayState, LocationKind,
    LocationMetadata, ParallelBranch, PathId,
};
use crate::domain::process::{Flow, Node, NodeKind, ProcessModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

// ============================================================================
// Outcome Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PathUpdateKind {
    /// A split opened this path
    Activated,
    /// The path arrived at its join
    Completed,
    /// Every activated path arrived and the join fired
    Synchronized,
}

/// Path bookkeeping notification produced by an inclusive gateway visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathUpdate {
    pub kind: PathUpdateKind,
    pub gateway_id: String,
    pub gateway_instance: String,
    /// Absent on `Synchronized`, which concerns the whole instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_id: Option<PathId>,
    pub timestamp: DateTime<Utc>,
}

impl PathUpdate {
    fn new(
        kind: PathUpdateKind,
        gateway_id: &str,
        gateway_instance: &str,
        path_id: Option<PathId>,
    ) -> Self {
        Self {
            kind,
            gateway_id: gateway_id.to_string(),
            gateway_instance: gateway_instance.to_string(),
            path_id,
            timestamp: Utc::now(),
        }
    }
}

/// Result of one gateway visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOutcome {
    pub gateway_id: String,
    /// Locations to resume from. A waiting inclusive join yields a single
    /// `GatewayEvaluation` marker here instead of graph positions.
    pub next_locations: Vec<AbstractLocation>,
    /// False while a join is still waiting for other paths
    pub processing_complete: bool,
    pub path_updates: Vec<PathUpdate>,
}

impl GatewayOutcome {
    fn waiting(gateway_id: &str, marker: Option<AbstractLocation>, updates: Vec<PathUpdate>) -> Self {
        Self {
            gateway_id: gateway_id.to_string(),
            next_locations: marker.into_iter().collect(),
            processing_complete: false,
            path_updates: updates,
        }
    }

    /// Whether this outcome holds a real graph position to continue from.
    pub fn advances(&self) -> bool {
        self.processing_complete && !self.next_locations.is_empty()
    }
}

// ============================================================================
// Application Service: GatewayEngine
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayEngine;

impl GatewayEngine {
    pub fn new() -> Self {
        Self
    }

    /// Process the arrival of `location` at its gateway node.
    pub fn process(
        &self,
        model: &ProcessModel,
        location: &AbstractLocation,
        context: &mut ExecutionContext,
    ) -> Result<GatewayOutcome, GatewayError> {
        let gateway = model
            .get_node(&location.node_id)
            .filter(|n| n.kind.is_gateway())
            .ok_or_else(|| GatewayError::GatewayNotFound(location.node_id.clone()))?;

        let incoming = model.incoming_flows(&gateway.id).len();
        let outgoing = model.outgoing_flows(&gateway.id);
        if outgoing.is_empty() {
            return Err(GatewayError::NoOutgoingFlows(gateway.id.clone()));
        }

        let mut path_updates = Vec::new();
        let mut metadata = location.metadata.clone();

        if incoming > 1 {
            match gateway.kind {
                NodeKind::ParallelGateway => {
                    if !self.parallel_join(gateway, incoming, &mut metadata, context) {
                        return Ok(GatewayOutcome::waiting(&gateway.id, None, path_updates));
                    }
                }
                NodeKind::InclusiveGateway => {
                    match self.inclusive_join(gateway, location, context)? {
                        JoinResult::Waiting { marker, update } => {
                            path_updates.push(update);
                            return Ok(GatewayOutcome::waiting(
                                &gateway.id,
                                Some(marker),
                                path_updates,
                            ));
                        }
                        JoinResult::Synchronized { origin, update } => {
                            path_updates.push(update);
                            metadata = origin;
                        }
                    }
                }
                // Exclusive merges never wait
                _ => {}
            }
        }

        let next_locations = if outgoing.len() > 1 {
            match gateway.kind {
                NodeKind::ExclusiveGateway => {
                    let flow = self.exclusive_split(model, gateway, &outgoing, context)?;
                    vec![successor(gateway, flow, &metadata, &location.routine_id)]
                }
                NodeKind::ParallelGateway => {
                    self.parallel_split(gateway, &outgoing, &metadata, &location.routine_id, context)
                }
                _ => self.inclusive_split(
                    model,
                    gateway,
                    &outgoing,
                    &metadata,
                    &location.routine_id,
                    context,
                    &mut path_updates,
                )?,
            }
        } else {
            vec![successor(gateway, outgoing[0], &metadata, &location.routine_id)]
        };

        Ok(GatewayOutcome {
            gateway_id: gateway.id.clone(),
            next_locations,
            processing_complete: true,
            path_updates,
        })
    }

    // ------------------------------------------------------------------------
    // Splits
    // ------------------------------------------------------------------------

    fn exclusive_split<'m>(
        &self,
        model: &'m ProcessModel,
        gateway: &Node,
        outgoing: &[&'m Flow],
        context: &ExecutionContext,
    ) -> Result<&'m Flow, GatewayError> {
        let default_id = gateway.default_flow.as_deref();
        let chosen = outgoing
            .iter()
            .copied()
            .filter(|f| Some(f.id.as_str()) != default_id)
            .find(|f| ConditionEvaluator::evaluate(f.condition.as_deref(), &context.variables))
            .or_else(|| model.default_flow(&gateway.id));

        match chosen {
            Some(flow) => {
                debug!(gateway_id = %gateway.id, flow_id = %flow.id, "Exclusive gateway selected flow");
                Ok(flow)
            }
            None => Err(GatewayError::NoPathsActivated(gateway.id.clone())),
        }
    }

    fn parallel_split(
        &self,
        gateway: &Node,
        outgoing: &[&Flow],
        metadata: &LocationMetadata,
        routine_id: &str,
        context: &mut ExecutionContext,
    ) -> Vec<AbstractLocation> {
        let now = Utc::now();
        outgoing
            .iter()
            .enumerate()
            .map(|(ordinal, flow)| {
                let branch_id = format!("{}:{}", gateway.id, ordinal);
                context.register_branch(
                    branch_id.clone(),
                    ParallelBranch {
                        gateway_id: gateway.id.clone(),
                        flow_id: flow.id.clone(),
                        started_at: now,
                        parent_branch: metadata.branch_id.clone(),
                    },
                );
                let mut next = successor(gateway, flow, metadata, routine_id);
                next.metadata.branch_id = Some(branch_id);
                next
            })
            .collect()
    }

    #[allow(clippy::too_many_arguments)]
    fn inclusive_split(
        &self,
        model: &ProcessModel,
        gateway: &Node,
        outgoing: &[&Flow],
        metadata: &LocationMetadata,
        routine_id: &str,
        context: &mut ExecutionContext,
        path_updates: &mut Vec<PathUpdate>,
    ) -> Result<Vec<AbstractLocation>, GatewayError> {
        let default_id = gateway.default_flow.as_deref();
        let mut evaluated = Vec::with_capacity(outgoing.len());
        let mut activated: Vec<(usize, &Flow)> = Vec::new();

        for (ordinal, flow) in outgoing.iter().enumerate() {
            if Some(flow.id.as_str()) == default_id {
                continue;
            }
            let result = ConditionEvaluator::evaluate(flow.condition.as_deref(), &context.variables);
            evaluated.push(EvaluatedCondition {
                flow_id: flow.id.clone(),
                expression: flow.condition.clone(),
                result,
                evaluated_at: Utc::now(),
            });
            if result {
                activated.push((ordinal, flow));
            }
        }

        if activated.is_empty() {
            if let Some(default) = model.default_flow(&gateway.id) {
                if let Some(ordinal) = outgoing.iter().position(|f| f.id == default.id) {
                    activated.push((ordinal, default));
                }
            }
        }
        if activated.is_empty() {
            warn!(gateway_id = %gateway.id, "Inclusive gateway activated no paths");
            return Err(GatewayError::NoPathsActivated(gateway.id.clone()));
        }

        let instance = Uuid::new_v4().to_string();
        let mut paths = Vec::with_capacity(activated.len());
        let mut next_locations = Vec::with_capacity(activated.len());

        for (ordinal, flow) in activated {
            let path_id = PathId::derive(&instance, ordinal);
            let mut next = successor(gateway, flow, metadata, routine_id);
            next.metadata.inclusive_gateway = Some(gateway.id.clone());
            next.metadata.gateway_instance = Some(instance.clone());
            next.metadata.path_id = Some(path_id.clone());

            path_updates.push(PathUpdate::new(
                PathUpdateKind::Activated,
                &gateway.id,
                &instance,
                Some(path_id.clone()),
            ));
            paths.push(path_id);
            next_locations.push(next);
        }

        info!(
            gateway_id = %gateway.id,
            gateway_instance = %instance,
            activated = paths.len(),
            "Inclusive gateway split"
        );

        context.insert_inclusive_state(InclusiveGatewayState {
            id: instance,
            gateway_id: gateway.id.clone(),
            evaluated_conditions: evaluated,
            activated_paths: paths,
            created_at: Utc::now(),
            origin: metadata.clone(),
        });

        Ok(next_locations)
    }

    // ------------------------------------------------------------------------
    // Joins
    // ------------------------------------------------------------------------

    /// Count an arrival; returns true once every incoming flow has arrived.
    fn parallel_join(
        &self,
        gateway: &Node,
        incoming: usize,
        metadata: &mut LocationMetadata,
        context: &mut ExecutionContext,
    ) -> bool {
        if let Some(branch_id) = metadata.branch_id.take() {
            metadata.branch_id = context
                .retire_branch(&branch_id)
                .and_then(|branch| branch.parent_branch);
        }
        let arrived = context.record_parallel_arrival(&gateway.id);
        debug!(gateway_id = %gateway.id, arrived, expected = incoming, "Parallel join arrival");
        if arrived < incoming {
            return false;
        }
        context.reset_parallel_arrivals(&gateway.id);
        true
    }

    fn inclusive_join(
        &self,
        gateway: &Node,
        location: &AbstractLocation,
        context: &mut ExecutionContext,
    ) -> Result<JoinResult, GatewayError> {
        let path_id = location
            .metadata
            .path_id
            .clone()
            .ok_or_else(|| GatewayError::MissingPathId(gateway.id.clone()))?;

        let state = context
            .inclusive_state_for_path(&path_id)
            .cloned()
            .ok_or_else(|| GatewayError::SynchronizationStateMissing {
                gateway: gateway.id.clone(),
                path_id: path_id.clone(),
            })?;

        let completed = context
            .path_ledger_mut()
            .record(&gateway.id, path_id.clone());
        let synchronized = state
            .activated_paths
            .iter()
            .all(|p| completed.contains(p));

        if !synchronized {
            debug!(
                gateway_id = %gateway.id,
                path_id = %path_id,
                "Inclusive join waiting for remaining paths"
            );
            let marker = AbstractLocation::node(&gateway.id, &location.routine_id)
                .with_kind(LocationKind::GatewayEvaluation)
                .with_metadata(location.metadata.clone());
            return Ok(JoinResult::Waiting {
                marker,
                update: PathUpdate::new(
                    PathUpdateKind::Completed,
                    &gateway.id,
                    &state.id,
                    Some(path_id),
                ),
            });
        }

        context
            .path_ledger_mut()
            .clear_paths(&gateway.id, &state.activated_paths);
        context.remove_inclusive_state(&state.id);

        info!(
            gateway_id = %gateway.id,
            gateway_instance = %state.id,
            paths = state.activated_paths.len(),
            "Inclusive join synchronized"
        );

        Ok(JoinResult::Synchronized {
            update: PathUpdate::new(PathUpdateKind::Synchronized, &gateway.id, &state.id, None),
            origin: state.origin,
        })
    }

    // ------------------------------------------------------------------------
    // Deadlock recovery
    // ------------------------------------------------------------------------

    /// Remove abandoned inclusive states of `gateway_id` older than `timeout`.
    ///
    /// `gateway_id` may name either the split that created a state or the join
    /// holding its arrived paths. Returns the removed instance ids.
    pub fn resolve_deadlock(
        &self,
        context: &mut ExecutionContext,
        gateway_id: &str,
        timeout: Duration,
    ) -> Vec<String> {
        self.resolve_deadlock_at(context, gateway_id, timeout, Utc::now())
    }

    /// [`resolve_deadlock`](Self::resolve_deadlock) against an explicit clock.
    pub fn resolve_deadlock_at(
        &self,
        context: &mut ExecutionContext,
        gateway_id: &str,
        timeout: Duration,
        now: DateTime<Utc>,
    ) -> Vec<String> {
        let timeout = chrono::Duration::from_std(timeout).unwrap_or(chrono::Duration::MAX);

        let expired: Vec<InclusiveGatewayState> = context
            .inclusive_states()
            .iter()
            .filter(|s| {
                s.gateway_id == gateway_id
                    || context
                        .path_ledger()
                        .joins_holding(&s.activated_paths)
                        .iter()
                        .any(|j| j == gateway_id)
            })
            .filter(|s| now.signed_duration_since(s.oldest_timestamp()) > timeout)
            .cloned()
            .collect();

        let mut removed = Vec::with_capacity(expired.len());
        for state in expired {
            context.path_ledger_mut().purge(&state.activated_paths);
            context.remove_inclusive_state(&state.id);
            warn!(
                gateway_id = %state.gateway_id,
                gateway_instance = %state.id,
                "Removed abandoned inclusive gateway state"
            );
            removed.push(state.id);
        }

        if !removed.is_empty() {
            metrics::counter!("meridian_gateway_deadlocks_resolved_total")
                .increment(removed.len() as u64);
        }
        removed
    }
}

enum JoinResult {
    Waiting {
        marker: AbstractLocation,
        update: PathUpdate,
    },
    Synchronized {
        origin: LocationMetadata,
        update: PathUpdate,
    },
}

fn successor(
    gateway: &Node,
    flow: &Flow,
    metadata: &LocationMetadata,
    routine_id: &str,
) -> AbstractLocation {
    let mut metadata = metadata.inherited();
    metadata.parent_node = Some(gateway.id.clone());
    AbstractLocation::node(&flow.target, routine_id).with_metadata(metadata)
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway not found: {0}")]
    GatewayNotFound(String),

    #[error("No paths activated at gateway {0}")]
    NoPathsActivated(String),

    #[error("Inclusive join {0} reached by a location without a path id")]
    MissingPathId(String),

    #[error("No synchronization state for path {path_id} at join {gateway}")]
    SynchronizationStateMissing { gateway: String, path_id: PathId },

    #[error("Gateway {0} has no outgoing flows")]
    NoOutgoingFlows(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::process::ProcessMetadata;
    use crate::domain::process::ProcessDefinition;

    fn node(id: &str, kind: NodeKind) -> Node {
        Node::new(id, kind, "p")
    }

    fn flow(id: &str, source: &str, target: &str) -> Flow {
        Flow {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            condition: None,
            process_id: "p".to_string(),
        }
    }

    fn diamond(kind: NodeKind) -> ProcessModel {
        ProcessModel::new(
            ProcessMetadata::default(),
            vec![ProcessDefinition {
                id: "p".into(),
                name: None,
                is_executable: true,
            }],
            vec![
                node("start", NodeKind::StartEvent),
                node("split", kind),
                node("a", NodeKind::Task),
                node("b", NodeKind::Task),
                node("join", kind),
                node("end", NodeKind::EndEvent),
            ],
            vec![
                flow("f0", "start", "split"),
                flow("fa", "split", "a"),
                flow("fb", "split", "b"),
                flow("fa2", "a", "join"),
                flow("fb2", "b", "join"),
                flow("f9", "join", "end"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_non_gateway_node_is_rejected() {
        let model = diamond(NodeKind::ParallelGateway);
        let mut ctx = ExecutionContext::new("p");
        let err = GatewayEngine::new()
            .process(&model, &AbstractLocation::node("a", "p"), &mut ctx)
            .unwrap_err();
        assert_eq!(err, GatewayError::GatewayNotFound("a".into()));
    }

    #[test]
    fn test_parallel_join_waits_for_every_branch() {
        let model = diamond(NodeKind::ParallelGateway);
        let engine = GatewayEngine::new();
        let mut ctx = ExecutionContext::new("p");

        let split = engine
            .process(&model, &AbstractLocation::node("split", "p"), &mut ctx)
            .unwrap();
        assert_eq!(split.next_locations.len(), 2);
        assert_eq!(ctx.active_branches().len(), 2);

        let mut arrivals = split.next_locations.into_iter().map(|mut loc| {
            loc.node_id = "join".into();
            loc
        });
        let first = engine.process(&model, &arrivals.next().unwrap(), &mut ctx).unwrap();
        assert!(!first.processing_complete);
        assert!(first.next_locations.is_empty());

        let second = engine.process(&model, &arrivals.next().unwrap(), &mut ctx).unwrap();
        assert!(second.advances());
        assert_eq!(second.next_locations[0].node_id, "end");
        assert!(second.next_locations[0].metadata.branch_id.is_none());
        assert!(ctx.active_branches().is_empty());
        assert!(!ctx.has_pending_parallel_joins());
    }

    #[test]
    fn test_exclusive_merge_passes_through() {
        let model = diamond(NodeKind::ExclusiveGateway);
        let mut ctx = ExecutionContext::new("p");
        let outcome = GatewayEngine::new()
            .process(&model, &AbstractLocation::node("join", "p"), &mut ctx)
            .unwrap();
        assert!(outcome.advances());
        assert_eq!(outcome.next_locations[0].metadata.parent_node.as_deref(), Some("join"));
    }
}
