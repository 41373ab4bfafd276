// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Execution Context
//!
//! Mutable state threaded through every navigation step of one routine
//! execution. The caller owns the context and passes it by `&mut` into the
//! navigator and gateway engine; nothing here is global.
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ExecutionContext`] | variables plus all synchronization bookkeeping |
//! | [`InclusiveGatewayState`] | record of one inclusive split instance |
//! | [`PathLedger`] | per-join set of arrived path ids |
//! | [`AbstractLocation`] | "where execution currently is" |

use crate::domain::condition::Variables;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use uuid::Uuid;

// ============================================================================
// Value Objects: Path Identifiers
// ============================================================================

/// Deterministic identifier tying an inclusive split branch to its join arrival.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathId(String);

impl PathId {
    /// Derive the path id for the flow at `ordinal` of a gateway instance.
    pub fn derive(gateway_instance: &str, ordinal: usize) -> Self {
        Self(format!("{gateway_instance}:path:{ordinal}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PathId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Value Objects: Locations
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// A real graph node
    Node,
    /// Wait marker emitted by an unsynchronized join, not a graph position
    GatewayEvaluation,
    /// Continuation out of a triggered boundary event
    BoundaryEvent,
}

/// Free-form metadata carried by a location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_node: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subprocess_id: Option<String>,
    /// Split gateway that produced this path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inclusive_gateway: Option<String>,
    /// Instance id of the split that produced this path
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_id: Option<PathId>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, Value>,
}

impl LocationMetadata {
    /// Metadata a successor node inherits: everything except the parent link.
    pub fn inherited(&self) -> Self {
        Self {
            parent_node: None,
            ..self.clone()
        }
    }
}

/// Addressable position in a process instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractLocation {
    pub id: Uuid,
    pub node_id: String,
    /// Owning process (routine) id
    pub routine_id: String,
    pub kind: LocationKind,
    #[serde(default)]
    pub metadata: LocationMetadata,
}

impl AbstractLocation {
    pub fn node(node_id: impl Into<String>, routine_id: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            node_id: node_id.into(),
            routine_id: routine_id.into(),
            kind: LocationKind::Node,
            metadata: LocationMetadata::default(),
        }
    }

    pub fn with_kind(mut self, kind: LocationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_metadata(mut self, metadata: LocationMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn is_wait_marker(&self) -> bool {
        self.kind == LocationKind::GatewayEvaluation
    }
}

// ============================================================================
// Entities: Gateway Synchronization
// ============================================================================

/// Audit record of one evaluated split condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedCondition {
    pub flow_id: String,
    pub expression: Option<String>,
    pub result: bool,
    pub evaluated_at: DateTime<Utc>,
}

/// Record of one inclusive split instance, consumed by its join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InclusiveGatewayState {
    /// Gateway instance id
    pub id: String,
    /// Split gateway node id
    pub gateway_id: String,
    pub evaluated_conditions: Vec<EvaluatedCondition>,
    pub activated_paths: Vec<PathId>,
    pub created_at: DateTime<Utc>,
    /// Metadata of the location that reached the split, restored after the join
    #[serde(default)]
    pub origin: LocationMetadata,
}

impl InclusiveGatewayState {
    /// Oldest evaluation timestamp, or creation time if nothing was evaluated.
    pub fn oldest_timestamp(&self) -> DateTime<Utc> {
        self.evaluated_conditions
            .iter()
            .map(|c| c.evaluated_at)
            .min()
            .unwrap_or(self.created_at)
    }

    pub fn owns_path(&self, path_id: &PathId) -> bool {
        self.activated_paths.contains(path_id)
    }
}

/// Per-join record of path ids that have arrived.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathLedger {
    completed: HashMap<String, BTreeSet<PathId>>,
}

impl PathLedger {
    /// Record an arrival and return the join's completed set.
    pub fn record(&mut self, join_gateway: &str, path_id: PathId) -> &BTreeSet<PathId> {
        let entry = self.completed.entry(join_gateway.to_string()).or_default();
        entry.insert(path_id);
        entry
    }

    pub fn completed(&self, join_gateway: &str) -> Option<&BTreeSet<PathId>> {
        self.completed.get(join_gateway)
    }

    /// Remove the given paths from a join's ledger, dropping the entry once empty.
    pub fn clear_paths(&mut self, join_gateway: &str, paths: &[PathId]) {
        if let Some(entry) = self.completed.get_mut(join_gateway) {
            for path in paths {
                entry.remove(path);
            }
            if entry.is_empty() {
                self.completed.remove(join_gateway);
            }
        }
    }

    /// Remove the given paths from every join; used by deadlock recovery.
    pub fn purge(&mut self, paths: &[PathId]) {
        self.completed.retain(|_, entry| {
            entry.retain(|p| !paths.contains(p));
            !entry.is_empty()
        });
    }

    /// Join gateways whose ledger holds any of the given paths.
    pub fn joins_holding(&self, paths: &[PathId]) -> Vec<String> {
        self.completed
            .iter()
            .filter(|(_, entry)| paths.iter().any(|p| entry.contains(p)))
            .map(|(join, _)| join.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.completed.is_empty()
    }
}

/// One live branch of a parallel split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelBranch {
    pub gateway_id: String,
    pub flow_id: String,
    pub started_at: DateTime<Utc>,
    /// Branch of an enclosing split, restored when this split's join fires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_branch: Option<String>,
}

/// A subprocess currently being executed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubprocessFrame {
    pub subprocess_id: String,
    pub entered_at: DateTime<Utc>,
    /// Location that entered the subprocess; execution resumes from it on exit
    pub parent_location: AbstractLocation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiInstanceCounter {
    pub total: u32,
    pub completed: u32,
}

// ============================================================================
// Aggregate: ExecutionContext
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionContext {
    pub routine_id: String,
    pub variables: Variables,
    inclusive_states: Vec<InclusiveGatewayState>,
    path_ledger: PathLedger,
    parallel_arrivals: HashMap<String, usize>,
    active_branches: HashMap<String, ParallelBranch>,
    active_subprocesses: HashMap<String, SubprocessFrame>,
    loop_counters: HashMap<String, u32>,
    multi_instance: HashMap<String, MultiInstanceCounter>,
}

impl ExecutionContext {
    pub fn new(routine_id: impl Into<String>) -> Self {
        Self {
            routine_id: routine_id.into(),
            ..Self::default()
        }
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: Value) {
        self.variables.insert(key.into(), value);
    }

    pub fn get_variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    /// Merge task output into the variable mapping.
    pub fn apply_updates(&mut self, updates: Variables) {
        self.variables.extend(updates);
    }

    // ------------------------------------------------------------------------
    // Inclusive gateway states
    // ------------------------------------------------------------------------

    pub fn inclusive_states(&self) -> &[InclusiveGatewayState] {
        &self.inclusive_states
    }

    pub fn inclusive_state(&self, id: &str) -> Option<&InclusiveGatewayState> {
        self.inclusive_states.iter().find(|s| s.id == id)
    }

    /// State whose activated paths include `path_id`.
    pub fn inclusive_state_for_path(&self, path_id: &PathId) -> Option<&InclusiveGatewayState> {
        self.inclusive_states.iter().find(|s| s.owns_path(path_id))
    }

    pub fn insert_inclusive_state(&mut self, state: InclusiveGatewayState) {
        self.inclusive_states.push(state);
    }

    pub fn remove_inclusive_state(&mut self, id: &str) -> Option<InclusiveGatewayState> {
        let idx = self.inclusive_states.iter().position(|s| s.id == id)?;
        Some(self.inclusive_states.remove(idx))
    }

    // ------------------------------------------------------------------------
    // Path ledger
    // ------------------------------------------------------------------------

    pub fn path_ledger(&self) -> &PathLedger {
        &self.path_ledger
    }

    pub fn path_ledger_mut(&mut self) -> &mut PathLedger {
        &mut self.path_ledger
    }

    pub fn completed_paths(&self, join_gateway: &str) -> Option<&BTreeSet<PathId>> {
        self.path_ledger.completed(join_gateway)
    }

    // ------------------------------------------------------------------------
    // Parallel gateways
    // ------------------------------------------------------------------------

    /// Count one arrival at a parallel join and return the running total.
    pub fn record_parallel_arrival(&mut self, gateway_id: &str) -> usize {
        let count = self
            .parallel_arrivals
            .entry(gateway_id.to_string())
            .or_insert(0);
        *count += 1;
        *count
    }

    pub fn reset_parallel_arrivals(&mut self, gateway_id: &str) {
        self.parallel_arrivals.remove(gateway_id);
    }

    pub fn parallel_arrivals(&self, gateway_id: &str) -> usize {
        self.parallel_arrivals.get(gateway_id).copied().unwrap_or(0)
    }

    pub fn has_pending_parallel_joins(&self) -> bool {
        !self.parallel_arrivals.is_empty()
    }

    /// Parallel joins with at least one arrival still waiting for siblings.
    pub fn pending_parallel_joins(&self) -> impl Iterator<Item = &str> {
        self.parallel_arrivals.keys().map(String::as_str)
    }

    pub fn register_branch(&mut self, branch_id: impl Into<String>, branch: ParallelBranch) {
        self.active_branches.insert(branch_id.into(), branch);
    }

    pub fn retire_branch(&mut self, branch_id: &str) -> Option<ParallelBranch> {
        self.active_branches.remove(branch_id)
    }

    pub fn active_branches(&self) -> &HashMap<String, ParallelBranch> {
        &self.active_branches
    }

    // ------------------------------------------------------------------------
    // Subprocesses
    // ------------------------------------------------------------------------

    pub fn enter_subprocess(&mut self, subprocess_id: &str, parent_location: AbstractLocation) {
        self.active_subprocesses.insert(
            subprocess_id.to_string(),
            SubprocessFrame {
                subprocess_id: subprocess_id.to_string(),
                entered_at: Utc::now(),
                parent_location,
            },
        );
    }

    pub fn exit_subprocess(&mut self, subprocess_id: &str) -> Option<SubprocessFrame> {
        self.active_subprocesses.remove(subprocess_id)
    }

    pub fn active_subprocesses(&self) -> &HashMap<String, SubprocessFrame> {
        &self.active_subprocesses
    }

    // ------------------------------------------------------------------------
    // Loop and multi-instance counters
    // ------------------------------------------------------------------------

    pub fn increment_visit(&mut self, node_id: &str) -> u32 {
        let count = self.loop_counters.entry(node_id.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    pub fn visits(&self, node_id: &str) -> u32 {
        self.loop_counters.get(node_id).copied().unwrap_or(0)
    }

    /// Record one finished instance; returns true once all `total` instances are done.
    pub fn complete_instance(&mut self, node_id: &str, total: u32) -> bool {
        let counter = self
            .multi_instance
            .entry(node_id.to_string())
            .or_insert(MultiInstanceCounter {
                total,
                completed: 0,
            });
        counter.completed += 1;
        if counter.completed >= counter.total {
            self.multi_instance.remove(node_id);
            true
        } else {
            false
        }
    }

    pub fn multi_instance(&self, node_id: &str) -> Option<&MultiInstanceCounter> {
        self.multi_instance.get(node_id)
    }
}
