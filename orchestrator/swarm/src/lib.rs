// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # `meridian-swarm` - Coordination Tier
//!
//! Goal-directed swarms that form teams, request routines from the process
//! tier and decide, from the events those routines publish, whether to adapt,
//! replan, recover or dissolve.
//!
//! ## Crate Layout
//!
//! | Module | Layer | Contents |
//! |--------|-------|----------|
//! | [`domain`] | Domain | `SwarmState`, `SwarmPhase`, `Blackboard`, `SwarmEvent`, collaborator ports |
//! | [`application`] | Application | `SwarmCoordinator` actor and handle |
//! | [`infrastructure`] | Infrastructure | in-memory store, pool resource manager, event bridge |
//!
//! ## Key Concepts
//!
//! - **Swarm**: one goal, one phase machine, one append-only blackboard.
//! - **Serialized processing**: each swarm is a single tokio task draining a
//!   command channel, so its state is never mutated concurrently.
//! - **Event boundary**: the coordinator never looks inside a process model;
//!   it only sees `routine.*` events routed to it by the
//!   [`infrastructure::SwarmEventBridge`].

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
