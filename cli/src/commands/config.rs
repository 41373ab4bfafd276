// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use meridian_core::domain::engine_config::EngineConfig;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Validate a configuration file
    Validate {
        /// Path to config file (default: --config)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file with the defaults
    Generate {
        /// Output path (default: ./meridian-config.yaml)
        #[arg(short, long, default_value = "./meridian-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show => show(config_override).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

fn load(config_path: Option<&PathBuf>) -> Result<EngineConfig> {
    match config_path {
        Some(path) => EngineConfig::from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(EngineConfig::default()),
    }
}

async fn show(config_override: Option<PathBuf>) -> Result<()> {
    let config = load(config_override.as_ref())?;

    match &config_override {
        Some(path) => println!("{} {}", "Configuration:".bold(), path.display()),
        None => println!("{} {}", "Configuration:".bold(), "(defaults)".dimmed()),
    }
    println!();

    println!("{}", "Navigator:".bold());
    println!("  Max node visits:    {}", config.navigator.max_node_visits);
    println!();

    println!("{}", "Gateways:".bold());
    println!(
        "  Deadlock timeout:   {}s",
        config.gateway.deadlock_timeout.as_secs()
    );
    println!();

    println!("{}", "Swarm:".bold());
    println!("  Event bus capacity: {}", config.swarm.event_bus_capacity);
    println!("  Recovery attempts:  {}", config.swarm.max_recovery_attempts);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    let path = config_path.context("No configuration file given (pass FILE or --config)")?;
    println!("Validating configuration...");

    load(Some(&path))?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    let sample = EngineConfig::default()
        .to_yaml()
        .context("Failed to render default configuration")?;

    std::fs::write(&output, sample)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generated_config_validates() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("meridian-config.yaml");

        generate(output.clone()).await.unwrap();
        validate(Some(output.clone())).await.unwrap();
        assert_eq!(load(Some(&output)).unwrap(), EngineConfig::default());
    }

    #[tokio::test]
    async fn test_validate_requires_a_file() {
        assert!(validate(None).await.is_err());
    }
}
