// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process definition commands
//!
//! # Commands
//!
//! - `meridian process validate <file>` - Parse and validate a process definition
//! - `meridian process simulate <file>` - Run a definition locally, printing every step

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use clap::Subcommand;
use colored::Colorize;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use meridian_core::application::routine_runner::{
    NavigatorRoutineRunner, RoutineRequest, TaskError, TaskExecutor,
};
use meridian_core::domain::condition::Variables;
use meridian_core::domain::engine_config::EngineConfig;
use meridian_core::domain::events::event_types;
use meridian_core::domain::process::{Node, NodeKind, ProcessModel};
use meridian_core::infrastructure::event_bus::EventBus;
use meridian_core::infrastructure::process_parser::ProcessParser;

const SIMULATION: &str = "simulation";

/// Completes every task without output, except the ones named to fail.
struct FailingExecutor {
    failing: Vec<String>,
}

#[async_trait]
impl TaskExecutor for FailingExecutor {
    async fn execute(&self, task: &Node, _variables: &Variables) -> Result<Variables, TaskError> {
        if self.failing.contains(&task.id) {
            debug!(task = %task.id, "Simulated task failure");
            return Err(TaskError::new(format!("simulated failure of {}", task.id)));
        }
        Ok(Variables::new())
    }
}

#[derive(Subcommand)]
pub enum ProcessCommand {
    /// Validate a process definition file
    Validate {
        /// Path to process definition (YAML or JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Run a process definition locally with no-op tasks
    Simulate {
        /// Path to process definition (YAML or JSON)
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Process to run (default: first declared)
        #[arg(long, value_name = "ID")]
        process: Option<String>,

        /// Initial variables (JSON object, or @file)
        #[arg(long, short = 'i', value_name = "JSON")]
        input: Option<String>,

        /// Individual variables (key=value, value parsed as JSON when possible)
        #[arg(long = "var", short = 'v', value_name = "KEY=VALUE")]
        vars: Vec<String>,

        /// Make a task fail, to exercise boundary events
        #[arg(long = "fail", value_name = "TASK")]
        failing: Vec<String>,
    },
}

pub async fn handle_command(command: ProcessCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        ProcessCommand::Validate { file } => validate_process(file).await,
        ProcessCommand::Simulate {
            file,
            process,
            input,
            vars,
            failing,
        } => simulate_process(file, process, input, vars, failing, config_path).await,
    }
}

// ============================================================================
// Command Implementations
// ============================================================================

async fn validate_process(file: PathBuf) -> Result<()> {
    println!("{}", "Validating process definition...".cyan());
    println!("   File: {}", file.display());
    println!();

    let model = ProcessParser::parse_file(&file)
        .with_context(|| format!("Invalid process definition: {}", file.display()))?;

    println!("{}", "✓ Process definition is valid!".green().bold());
    println!();
    print_summary(&model);
    Ok(())
}

async fn simulate_process(
    file: PathBuf,
    process: Option<String>,
    input: Option<String>,
    vars: Vec<String>,
    failing: Vec<String>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => EngineConfig::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => EngineConfig::default(),
    };
    let model = ProcessParser::parse_file(&file)
        .with_context(|| format!("Invalid process definition: {}", file.display()))?;

    let process_id = match process {
        Some(id) => id,
        None => model
            .process_ids()
            .next()
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Definition declares no process"))?,
    };
    let mut variables = parse_input(input)?;
    for var in &vars {
        let (key, value) = parse_var(var)?;
        variables.insert(key, value);
    }

    println!("{}", "Simulating process...".cyan());
    println!("   Process: {}", process_id);
    if !variables.is_empty() {
        println!("   Variables:");
        for (key, value) in &variables {
            println!("     {}: {}", key, value);
        }
    }
    println!();

    let bus = EventBus::new(config.swarm.event_bus_capacity);
    let mut events = bus.subscribe();
    let runner = NavigatorRoutineRunner::new(bus, Arc::new(FailingExecutor { failing }), config)
        .register(SIMULATION, model);

    let request = RoutineRequest {
        swarm_id: "cli".to_string(),
        plan: json!({
            "process": SIMULATION,
            "process_id": process_id,
            "variables": Value::Object(variables),
        }),
        user_id: "cli".to_string(),
        correlation_id: Uuid::new_v4(),
    };
    let outcome = runner.run(Uuid::new_v4(), &request).await;

    while let Ok(event) = events.try_recv() {
        if event.is(event_types::ROUTINE_PROGRESS) {
            println!(
                "  {} {}",
                "▸".dimmed(),
                event.data_str("node_id").unwrap_or("?")
            );
        }
    }
    println!();

    let summary = outcome.context("Simulation failed")?;
    println!("{}", "✓ Process reached its end".green().bold());
    println!("  Tasks executed: {}", summary.tasks_completed);
    println!("  Steps:          {}", summary.steps);
    println!("  Variables:");
    let mut keys: Vec<_> = summary.variables.keys().collect();
    keys.sort();
    for key in keys {
        println!("    {}: {}", key, summary.variables[key]);
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn print_summary(model: &ProcessModel) {
    println!("Definition Details:");
    println!("  Name:        {}", model.metadata.name);
    if let Some(version) = &model.metadata.version {
        println!("  Version:     {}", version);
    }
    if let Some(description) = &model.metadata.description {
        println!("  Description: {}", description);
    }
    println!("  Processes:   {}", model.process_ids().collect::<Vec<_>>().join(", "));
    println!("  Elements:    {}", model.node_count());
    println!("  Flows:       {}", model.flow_count());

    let gateways: Vec<String> = [
        NodeKind::ExclusiveGateway,
        NodeKind::ParallelGateway,
        NodeKind::InclusiveGateway,
    ]
    .into_iter()
    .map(|kind| (kind, model.elements_of_kind(kind).len()))
    .filter(|(_, count)| *count > 0)
    .map(|(kind, count)| format!("{} {}", count, kind))
    .collect();
    if !gateways.is_empty() {
        println!("  Gateways:    {}", gateways.join(", "));
    }
    let boundaries = model.elements_of_kind(NodeKind::BoundaryEvent).len();
    if boundaries > 0 {
        println!("  Boundaries:  {}", boundaries);
    }
}

fn parse_input(input: Option<String>) -> Result<Map<String, Value>> {
    let value: Value = match input {
        None => return Ok(Map::new()),
        Some(s) if s.starts_with('@') => {
            let path = &s[1..];
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read input file: {}", path))?;
            serde_json::from_str(&content).context("Failed to parse input JSON")?
        }
        Some(s) => serde_json::from_str(&s).context("Failed to parse input JSON")?,
    };
    match value {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("Input must be a JSON object, got {}", other)),
    }
}

fn parse_var(var: &str) -> Result<(String, Value)> {
    let (key, raw) = var
        .split_once('=')
        .ok_or_else(|| anyhow!("Variable must be KEY=VALUE, got '{}'", var))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(anyhow!("Variable name is empty in '{}'", var));
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_var_prefers_json() {
        assert_eq!(parse_var("approved=true").unwrap(), ("approved".into(), json!(true)));
        assert_eq!(parse_var("count=3").unwrap(), ("count".into(), json!(3)));
        assert_eq!(parse_var("name=alice").unwrap(), ("name".into(), json!("alice")));
        assert_eq!(parse_var("expr=a=b").unwrap(), ("expr".into(), json!("a=b")));
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=1").is_err());
    }

    #[test]
    fn test_parse_input_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"conditionA": true}}"#).unwrap();
        let input = format!("@{}", file.path().display());

        let map = parse_input(Some(input)).unwrap();
        assert_eq!(map.get("conditionA"), Some(&json!(true)));
        assert!(parse_input(Some("[1, 2]".into())).is_err());
        assert!(parse_input(None).unwrap().is_empty());
    }
}
