// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Swarm Domain Layer
//!
//! Pure domain types for the coordination tier. No I/O dependencies.
//!
//! | Module | Key Types |
//! |--------|-----------|
//! | [`swarm`] | `SwarmState`, `SwarmPhase`, `Blackboard`, `ResourcePool` |
//! | [`events`] | `SwarmEvent` (typed inbound bus events) |
//! | [`ports`] | collaborator traits: store, reasoning, teams, resources, coordination |

pub mod events;
pub mod ports;
pub mod swarm;

pub use events::*;
pub use ports::*;
pub use swarm::*;
