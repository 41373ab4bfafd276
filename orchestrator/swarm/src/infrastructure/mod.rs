// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Infrastructure Layer
//!
//! Default adapters for the collaborator ports plus the bus bridge.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`state_store`] | `InMemorySwarmStateStore` |
//! | [`resource_manager`] | `PoolResourceManager` |
//! | [`event_bridge`] | `SwarmEventBridge` |

pub mod event_bridge;
pub mod resource_manager;
pub mod state_store;

pub use event_bridge::SwarmEventBridge;
pub use resource_manager::PoolResourceManager;
pub use state_store::InMemorySwarmStateStore;
