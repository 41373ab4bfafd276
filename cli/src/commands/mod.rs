// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Meridian CLI

pub mod config;
pub mod process;

pub use self::config::ConfigCommand;
pub use self::process::ProcessCommand;
