// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod process_parser;

pub use event_bus::{EventBus, EventBusError, EventReceiver, TargetEventReceiver};
pub use process_parser::ProcessParser;
