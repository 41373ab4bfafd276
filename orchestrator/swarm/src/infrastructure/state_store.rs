// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! In-memory swarm state store.
//!
//! Keeps the latest state per swarm, every persisted blackboard item and the
//! archive of finished swarms. Suitable for tests and single-process runs.

use crate::domain::ports::{StoreError, SwarmStateStore};
use crate::domain::swarm::{BlackboardItem, SwarmId, SwarmState};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct InMemorySwarmStateStore {
    states: Arc<RwLock<HashMap<SwarmId, SwarmState>>>,
    blackboards: Arc<RwLock<HashMap<SwarmId, Vec<BlackboardItem>>>>,
    archive: Arc<RwLock<HashMap<SwarmId, SwarmState>>>,
}

impl InMemorySwarmStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest saved state of an active swarm.
    pub fn get(&self, swarm_id: SwarmId) -> Option<SwarmState> {
        self.states.read().get(&swarm_id).cloned()
    }

    pub fn archived(&self, swarm_id: SwarmId) -> Option<SwarmState> {
        self.archive.read().get(&swarm_id).cloned()
    }

    /// Latest state, active or archived.
    pub fn find(&self, swarm_id: SwarmId) -> Option<SwarmState> {
        self.get(swarm_id).or_else(|| self.archived(swarm_id))
    }

    pub fn blackboard(&self, swarm_id: SwarmId) -> Vec<BlackboardItem> {
        self.blackboards
            .read()
            .get(&swarm_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn active_count(&self) -> usize {
        self.states.read().len()
    }
}

#[async_trait]
impl SwarmStateStore for InMemorySwarmStateStore {
    async fn save_swarm_state(&self, state: &SwarmState) -> Result<(), StoreError> {
        // Saves after archival update the archived copy
        let mut archive = self.archive.write();
        if let Some(archived) = archive.get_mut(&state.id) {
            *archived = state.clone();
            return Ok(());
        }
        drop(archive);

        self.states.write().insert(state.id, state.clone());
        Ok(())
    }

    async fn save_blackboard_item(&self, swarm_id: SwarmId, item: &BlackboardItem) -> Result<(), StoreError> {
        self.blackboards
            .write()
            .entry(swarm_id)
            .or_default()
            .push(item.clone());
        Ok(())
    }

    async fn archive_swarm(&self, swarm_id: SwarmId) -> Result<(), StoreError> {
        let state = self
            .states
            .write()
            .remove(&swarm_id)
            .ok_or(StoreError::NotFound(swarm_id))?;
        self.archive.write().insert(swarm_id, state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::swarm::{BlackboardItemType, SwarmConfig, SwarmPhase};
    use serde_json::json;

    #[tokio::test]
    async fn test_save_and_archive() {
        let store = InMemorySwarmStateStore::new();
        let mut state = SwarmState::new(SwarmId::new(), SwarmConfig::default());
        store.save_swarm_state(&state).await.unwrap();
        assert_eq!(store.active_count(), 1);

        store.archive_swarm(state.id).await.unwrap();
        assert!(store.get(state.id).is_none());
        assert!(store.archived(state.id).is_some());

        state.phase = SwarmPhase::Dissolving;
        store.save_swarm_state(&state).await.unwrap();
        assert_eq!(store.active_count(), 0);
        assert_eq!(store.find(state.id).map(|s| s.phase), Some(SwarmPhase::Dissolving));
    }

    #[tokio::test]
    async fn test_archive_unknown_swarm() {
        let store = InMemorySwarmStateStore::new();
        let id = SwarmId::new();
        assert_eq!(store.archive_swarm(id).await, Err(StoreError::NotFound(id)));
    }

    #[tokio::test]
    async fn test_blackboard_items_in_order() {
        let store = InMemorySwarmStateStore::new();
        let id = SwarmId::new();
        for n in 0..3 {
            let item = BlackboardItem::new(BlackboardItemType::Result, json!(n), "test");
            store.save_blackboard_item(id, &item).await.unwrap();
        }
        let contents: Vec<_> = store.blackboard(id).into_iter().map(|i| i.content).collect();
        assert_eq!(contents, vec![json!(0), json!(1), json!(2)]);
    }
}
