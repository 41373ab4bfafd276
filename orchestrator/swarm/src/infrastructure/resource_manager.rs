// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Pool-backed resource manager.
//!
//! Grants a request when the swarm's pool still holds enough of the resource.
//! Keeps a ledger of outstanding allocations per swarm so releases can be
//! audited.

use crate::domain::events::ResourceRequest;
use crate::domain::ports::{CollaboratorError, ResourceManager};
use crate::domain::swarm::{ResourceAllocation, ResourcePool, SwarmId, SwarmState};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct PoolResourceManager {
    ledger: Arc<Mutex<HashMap<SwarmId, Vec<ResourceAllocation>>>>,
}

impl PoolResourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocations granted to a swarm and not yet released.
    pub fn outstanding(&self, swarm_id: SwarmId) -> Vec<ResourceAllocation> {
        self.ledger.lock().get(&swarm_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ResourceManager for PoolResourceManager {
    async fn allocate_resources(
        &self,
        swarm_id: SwarmId,
        pool: &ResourcePool,
        request: &ResourceRequest,
    ) -> Result<ResourceAllocation, CollaboratorError> {
        if !(request.amount.is_finite() && request.amount > 0.0) {
            return Err(CollaboratorError::Rejected(format!(
                "invalid amount {} for '{}'",
                request.amount, request.resource
            )));
        }
        let available = pool.available(&request.resource);
        if available < request.amount {
            return Err(CollaboratorError::Rejected(format!(
                "insufficient '{}': requested {}, available {}",
                request.resource, request.amount, available
            )));
        }

        let allocation = ResourceAllocation::new(request.agent_id, &request.resource, request.amount);
        self.ledger
            .lock()
            .entry(swarm_id)
            .or_default()
            .push(allocation.clone());
        Ok(allocation)
    }

    /// Drop allocations held by agents that left the roster.
    async fn reallocate_resources(&self, state: &SwarmState) -> Result<Vec<ResourceAllocation>, CollaboratorError> {
        let retained: Vec<ResourceAllocation> = state
            .resources
            .allocated
            .iter()
            .filter(|a| state.has_agent(a.agent_id))
            .cloned()
            .collect();
        self.ledger.lock().insert(state.id, retained.clone());
        Ok(retained)
    }

    async fn release_all_resources(&self, swarm_id: SwarmId, pool: &ResourcePool) -> Result<(), CollaboratorError> {
        let released = self.ledger.lock().remove(&swarm_id).map(|v| v.len()).unwrap_or(0);
        debug!(swarm_id = %swarm_id, released, live = pool.allocated.len(), "Released swarm resources");
        Ok(())
    }
}
