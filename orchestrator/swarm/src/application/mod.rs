// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Application Layer
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`coordinator`] | `SwarmCoordinator` handle, `SwarmCollaborators`, `SwarmError` |

pub mod coordinator;

pub use coordinator::{SwarmCollaborators, SwarmCoordinator, SwarmError};
