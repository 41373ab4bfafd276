// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Collaborator Ports
//!
//! Interfaces the coordinator depends on. Everything behind them (durable
//! storage, LLM-backed reasoning, agent provisioning, messaging transports) is
//! outside this crate; plans and judgments are opaque JSON values whose
//! internals the coordinator never inspects beyond the documented shapes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Dependency inversion for the coordination tier

use crate::domain::events::{AgentMessage, ResourceRequest};
use crate::domain::swarm::{
    Agent, BlackboardItem, ResourceAllocation, ResourcePool, SwarmConfig, SwarmId, SwarmState, Team,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque plan produced by the reasoning engine and handed to the routine runner.
pub type ExecutionPlan = Value;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StoreError {
    #[error("Swarm {0} not found")]
    NotFound(SwarmId),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("{collaborator} failed: {message}")]
    Failed {
        collaborator: String,
        message: String,
    },

    #[error("Request rejected: {0}")]
    Rejected(String),
}

impl CollaboratorError {
    pub fn failed(collaborator: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            collaborator: collaborator.into(),
            message: message.into(),
        }
    }
}

/// Verdict on a completed routine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultEvaluation {
    pub goal_achieved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: Value,
}

/// Verdict on a failed routine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysis {
    pub recoverable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    #[serde(default)]
    pub details: Value,
}

/// Strategy change recommended while a routine is running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Adaptation {
    ReorganizeTeams,
    ReallocateResources,
    ChangeApproach { plan: ExecutionPlan },
}

#[async_trait]
pub trait SwarmStateStore: Send + Sync {
    async fn save_swarm_state(&self, state: &SwarmState) -> Result<(), StoreError>;
    async fn save_blackboard_item(&self, swarm_id: SwarmId, item: &BlackboardItem) -> Result<(), StoreError>;
    /// Move a finished swarm to the archive. Archived swarms are never deleted.
    async fn archive_swarm(&self, swarm_id: SwarmId) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn create_execution_plan(&self, goal: &str, state: &SwarmState) -> Result<ExecutionPlan, CollaboratorError>;

    /// Whether the running strategy should adapt given the latest progress.
    async fn evaluate_progress(&self, state: &SwarmState, progress: &Value) -> Result<bool, CollaboratorError>;

    async fn evaluate_results(&self, state: &SwarmState, results: &Value) -> Result<ResultEvaluation, CollaboratorError>;

    async fn analyze_failure(&self, state: &SwarmState, error: &Value) -> Result<FailureAnalysis, CollaboratorError>;

    async fn recommend_adaptations(&self, state: &SwarmState, progress: &Value) -> Result<Vec<Adaptation>, CollaboratorError>;

    async fn plan_next_steps(
        &self,
        state: &SwarmState,
        evaluation: &ResultEvaluation,
    ) -> Result<ExecutionPlan, CollaboratorError>;

    async fn create_recovery_plan(
        &self,
        state: &SwarmState,
        analysis: &FailureAnalysis,
    ) -> Result<ExecutionPlan, CollaboratorError>;
}

#[async_trait]
pub trait TeamFormation: Send + Sync {
    async fn form_teams_for_goal(&self, goal: &str, config: &SwarmConfig) -> Result<Vec<Team>, CollaboratorError>;
    async fn create_agents_for_team(&self, team: &Team) -> Result<Vec<Agent>, CollaboratorError>;
    /// Produce a new team layout for the current roster.
    async fn reorganize_teams(&self, state: &SwarmState) -> Result<Vec<Team>, CollaboratorError>;
}

/// Resource allocation for one swarm.
///
/// Called only from the owning coordinator's event loop, so implementations
/// see a single writer per swarm.
#[async_trait]
pub trait ResourceManager: Send + Sync {
    async fn allocate_resources(
        &self,
        swarm_id: SwarmId,
        pool: &ResourcePool,
        request: &ResourceRequest,
    ) -> Result<ResourceAllocation, CollaboratorError>;

    /// Return the allocation set that should replace the live one.
    async fn reallocate_resources(&self, state: &SwarmState) -> Result<Vec<ResourceAllocation>, CollaboratorError>;

    async fn release_all_resources(&self, swarm_id: SwarmId, pool: &ResourcePool) -> Result<(), CollaboratorError>;
}

#[async_trait]
pub trait CoordinationProtocol: Send + Sync {
    async fn route_message(&self, swarm_id: SwarmId, message: &AgentMessage) -> Result<(), CollaboratorError>;
    async fn broadcast_to_swarm(&self, swarm_id: SwarmId, payload: &Value) -> Result<(), CollaboratorError>;
}
