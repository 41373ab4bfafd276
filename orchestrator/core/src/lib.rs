// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Meridian Core
//!
//! Process tier of the Meridian engine: the structural process model, the
//! condition language, gateway synchronization, navigation and the routine
//! runner that reports back to the coordination tier over the event bus.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Modules:** `domain` (pure model), `application` (engine services),
//!   `infrastructure` (parser, event bus)

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
