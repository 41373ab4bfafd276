// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain Layer
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Process model, conditions, execution context, events and
//!   engine configuration. No I/O beyond reading config files.

pub mod condition;
pub mod context;
pub mod engine_config;
pub mod events;
pub mod process;
