// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Aggregate
//!
//! Defines the state owned by a single swarm coordinator:
//!
//! - [`SwarmState`] - aggregate root, mutated only by its coordinator.
//! - [`SwarmPhase`] - lifecycle phase with the legal transition table.
//! - [`Blackboard`] - append-only record of plans, results and control items.
//! - [`ResourcePool`] - available capacity, live allocations and usage counters.
//! - [`PerformanceMetrics`] - task and error counters reported by routines.

use chrono::{DateTime, Utc};
use meridian_core::domain::engine_config::SwarmRuntimeConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwarmId(pub Uuid);

impl SwarmId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SwarmId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SwarmId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TeamId(pub Uuid);

impl TeamId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TeamId {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub Uuid);

impl AgentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// Phase
// ============================================================================

/// Lifecycle phase of a swarm.
///
/// ```text
/// Forming ─start─▶ Planning ⇄ Executing ─▶ Dissolving | Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwarmPhase {
    Forming,
    Planning,
    Executing,
    Dissolving,
    Failed,
}

impl SwarmPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, SwarmPhase::Dissolving | SwarmPhase::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SwarmPhase::Forming => "forming",
            SwarmPhase::Planning => "planning",
            SwarmPhase::Executing => "executing",
            SwarmPhase::Dissolving => "dissolving",
            SwarmPhase::Failed => "failed",
        }
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: SwarmPhase) -> bool {
        use SwarmPhase::*;
        match (self, next) {
            (Dissolving | Failed, _) => false,
            (_, Dissolving | Failed) => true,
            (Forming, Planning) => true,
            (Planning, Executing) | (Executing, Planning) => true,
            _ => false,
        }
    }
}

impl fmt::Display for SwarmPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Roster
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id: TeamId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objective: Option<String>,
    #[serde(default)]
    pub members: Vec<AgentId>,
}

impl Team {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: TeamId::new(),
            name: name.into(),
            objective: None,
            members: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<TeamId>,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

impl Agent {
    pub fn new(name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            role: role.into(),
            team_id: None,
            capabilities: Vec::new(),
        }
    }
}

// ============================================================================
// Blackboard
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlackboardItemType {
    Plan,
    Result,
    Control,
}

/// Who may read a blackboard item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "id", rename_all = "snake_case")]
pub enum Visibility {
    Swarm,
    Team(TeamId),
    Agent(AgentId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlackboardItem {
    pub id: Uuid,
    pub item_type: BlackboardItemType,
    pub content: Value,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub visibility: Visibility,
}

impl BlackboardItem {
    pub fn new(item_type: BlackboardItemType, content: Value, author: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_type,
            content,
            author: author.into(),
            timestamp: Utc::now(),
            visibility: Visibility::Swarm,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }
}

/// Append-only shared memory of a swarm.
///
/// Items keep the order in which the coordinator processed them. There is no
/// way to edit or remove an item once appended.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blackboard {
    items: Vec<BlackboardItem>,
}

impl Blackboard {
    pub fn append(&mut self, item: BlackboardItem) -> &BlackboardItem {
        self.items.push(item);
        &self.items[self.items.len() - 1]
    }

    pub fn items(&self) -> &[BlackboardItem] {
        &self.items
    }

    pub fn of_type(&self, item_type: BlackboardItemType) -> impl Iterator<Item = &BlackboardItem> {
        self.items.iter().filter(move |i| i.item_type == item_type)
    }

    pub fn latest(&self, item_type: BlackboardItemType) -> Option<&BlackboardItem> {
        self.items.iter().rev().find(|i| i.item_type == item_type)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// ============================================================================
// Resources
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceAllocation {
    pub id: Uuid,
    pub agent_id: AgentId,
    pub resource: String,
    pub amount: f64,
    pub allocated_at: DateTime<Utc>,
}

impl ResourceAllocation {
    pub fn new(agent_id: AgentId, resource: impl Into<String>, amount: f64) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id,
            resource: resource.into(),
            amount,
            allocated_at: Utc::now(),
        }
    }
}

/// Capacity owned by one swarm.
///
/// `available` always reflects capacity minus live allocations; `usage`
/// counts allocations granted per resource over the swarm's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcePool {
    pub available: HashMap<String, f64>,
    pub allocated: Vec<ResourceAllocation>,
    pub usage: HashMap<String, u64>,
}

impl ResourcePool {
    pub fn with_capacity(capacity: HashMap<String, f64>) -> Self {
        Self {
            available: capacity,
            ..Default::default()
        }
    }

    pub fn available(&self, resource: &str) -> f64 {
        self.available.get(resource).copied().unwrap_or(0.0)
    }

    pub fn record(&mut self, allocation: ResourceAllocation) {
        *self.available.entry(allocation.resource.clone()).or_insert(0.0) -= allocation.amount;
        *self.usage.entry(allocation.resource.clone()).or_insert(0) += 1;
        self.allocated.push(allocation);
    }

    /// Return every live allocation to `available`.
    pub fn release_all(&mut self) -> Vec<ResourceAllocation> {
        let released: Vec<_> = self.allocated.drain(..).collect();
        for allocation in &released {
            *self.available.entry(allocation.resource.clone()).or_insert(0.0) += allocation.amount;
        }
        released
    }

    /// Swap the live allocation set, keeping `available` consistent.
    /// Usage counters only grow for allocations that were not live before.
    pub fn replace_allocations(&mut self, allocations: Vec<ResourceAllocation>) {
        let previous: Vec<Uuid> = self.release_all().into_iter().map(|a| a.id).collect();
        for allocation in allocations {
            if previous.contains(&allocation.id) {
                *self.available.entry(allocation.resource.clone()).or_insert(0.0) -= allocation.amount;
                self.allocated.push(allocation);
            } else {
                self.record(allocation);
            }
        }
    }
}

// ============================================================================
// Metrics
// ============================================================================

/// Task counts reported by one routine so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutineTally {
    pub completed: u64,
    pub total: u64,
}

/// Swarm-wide task and error counters.
///
/// Routines report cumulative counts that restart at zero for every routine,
/// so counts are tallied per routine and folded into the settled totals once
/// the routine finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub tasks_completed: u64,
    pub tasks_total: u64,
    pub error_count: u64,
    pub error_rate: f64,
    #[serde(default)]
    settled: RoutineTally,
    /// Running routines keyed by routine id (empty key when unidentified)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    running: HashMap<String, RoutineTally>,
}

fn tally_key(routine_id: Option<Uuid>) -> String {
    routine_id.map(|id| id.to_string()).unwrap_or_default()
}

impl PerformanceMetrics {
    /// Fold a progress report in. A routine's counts never move backwards.
    pub fn record_progress(
        &mut self,
        routine_id: Option<Uuid>,
        tasks_completed: u64,
        tasks_total: Option<u64>,
    ) {
        let tally = self.running.entry(tally_key(routine_id)).or_default();
        tally.completed = tally.completed.max(tasks_completed);
        tally.total = tally
            .total
            .max(tasks_total.unwrap_or(0))
            .max(tally.completed);
        self.recompute();
    }

    /// Settle a finished routine; later reports under the same id start afresh.
    pub fn finish_routine(&mut self, routine_id: Option<Uuid>) {
        if let Some(tally) = self.running.remove(&tally_key(routine_id)) {
            self.settled.completed += tally.completed;
            self.settled.total += tally.total;
            self.recompute();
        }
    }

    pub fn record_error(&mut self) {
        self.error_count += 1;
        self.recompute();
    }

    fn recompute(&mut self) {
        self.tasks_completed = self.settled.completed
            + self.running.values().map(|t| t.completed).sum::<u64>();
        self.tasks_total =
            self.settled.total + self.running.values().map(|t| t.total).sum::<u64>();

        let attempts = self.tasks_completed + self.error_count;
        self.error_rate = if attempts == 0 {
            0.0
        } else {
            self.error_count as f64 / attempts as f64
        };
    }
}

// ============================================================================
// Configuration & aggregate root
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmConfig {
    pub max_agents: usize,
    pub max_recovery_attempts: u32,
    #[serde(default)]
    pub initial_resources: HashMap<String, f64>,
}

impl Default for SwarmConfig {
    fn default() -> Self {
        Self {
            max_agents: 10,
            max_recovery_attempts: SwarmRuntimeConfig::default().max_recovery_attempts,
            initial_resources: HashMap::new(),
        }
    }
}

impl From<&SwarmRuntimeConfig> for SwarmConfig {
    fn from(runtime: &SwarmRuntimeConfig) -> Self {
        Self {
            max_recovery_attempts: runtime.max_recovery_attempts,
            ..Default::default()
        }
    }
}

/// Aggregate root for one goal-directed swarm.
///
/// # Invariants
///
/// - Only the owning coordinator mutates it.
/// - The blackboard is append-only.
/// - Once the phase is terminal it never changes again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwarmState {
    pub id: SwarmId,
    pub phase: SwarmPhase,
    pub goal: String,
    pub user_id: String,
    pub config: SwarmConfig,
    pub teams: Vec<Team>,
    pub agents: Vec<Agent>,
    pub blackboard: Blackboard,
    pub resources: ResourcePool,
    pub metrics: PerformanceMetrics,
    pub paused: bool,
    pub recovery_attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_routine: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitoring_started_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SwarmState {
    pub fn new(id: SwarmId, config: SwarmConfig) -> Self {
        let now = Utc::now();
        Self {
            id,
            phase: SwarmPhase::Forming,
            goal: String::new(),
            user_id: String::new(),
            resources: ResourcePool::with_capacity(config.initial_resources.clone()),
            config,
            teams: Vec::new(),
            agents: Vec::new(),
            blackboard: Blackboard::default(),
            metrics: PerformanceMetrics::default(),
            paused: false,
            recovery_attempts: 0,
            active_routine: None,
            monitoring_started_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn has_agent(&self, agent_id: AgentId) -> bool {
        self.agents.iter().any(|a| a.id == agent_id)
    }
}
