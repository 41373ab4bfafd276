// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod gateway_engine;
pub mod navigator;
pub mod routine_runner;

// Re-export services for convenience
pub use gateway_engine::{GatewayEngine, GatewayError, GatewayOutcome, PathUpdate, PathUpdateKind};
pub use navigator::{NavigationError, NavigationStep, ProcessNavigator};
pub use routine_runner::{
    NavigatorRoutineRunner, NoopTaskExecutor, RoutineError, RoutineHandle, RoutineRequest,
    RoutineRunner, RoutineSummary, TaskError, TaskExecutor,
};
