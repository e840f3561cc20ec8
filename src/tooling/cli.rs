//! CLI Tooling

use crate::broker::{agent_command_channel, project_command_channel};
use crate::command::EventType;
use crate::config::{ConfigLoader, HubConfig};
use crate::error::ApiError;
use crate::logging::{LogFormat, LogOutput, LoggingConfig};
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing::debug;

/// Spellhub CLI - agent command routing diagnostics
#[derive(Parser)]
#[command(name = "spellhub")]
#[command(about = "Inspect agent command routing and event store configuration")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory searched for spellhub.toml
    #[arg(long, default_value = ".")]
    pub config_dir: PathBuf,

    /// Configuration file path (overrides --config-dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<LogOutput>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check that a command string is a valid domain:subdomain:action event type
    Validate {
        command: String,
    },
    /// Print the command channels an agent subscribes to
    Channels {
        #[arg(long)]
        agent_id: String,
        #[arg(long)]
        project_id: String,
        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Print the resolved configuration
    Config {
        /// Output format (toml, json)
        #[arg(long, default_value = "toml")]
        format: String,
    },
}

impl Cli {
    /// Logging config with command-line overrides applied
    pub fn logging_config(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = self.log_format {
            config.format = format;
        }
        if let Some(output) = self.log_output {
            config.output = output;
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

/// Resolved configuration the commands run against
pub struct CliContext {
    config: HubConfig,
}

impl CliContext {
    pub fn new(config_dir: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ApiError> {
        let config = match &config_path {
            Some(path) => ConfigLoader::load_from_file(path)?,
            None => ConfigLoader::load(&config_dir)?,
        };
        Ok(Self { config })
    }

    pub fn from_config(config: HubConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        debug!(command = command_name(command), "Executing CLI command");
        match command {
            Commands::Validate { command } => {
                let event_type = EventType::parse(command)?;
                Ok(format!(
                    "valid: domain={} subdomain={} action={}",
                    event_type.domain(),
                    event_type.subdomain(),
                    event_type.action()
                ))
            }
            Commands::Channels {
                agent_id,
                project_id,
                format,
            } => {
                let agent = agent_command_channel(&self.config.channels, agent_id);
                let project = project_command_channel(&self.config.channels, project_id);
                match format.as_str() {
                    "json" => Ok(serde_json::to_string_pretty(
                        &json!({"agent": agent, "project": project}),
                    )?),
                    "text" => Ok(format!("agent:   {}\nproject: {}", agent, project)),
                    other => Err(unknown_format(other)),
                }
            }
            Commands::Config { format } => match format.as_str() {
                "toml" => toml::to_string_pretty(&self.config)
                    .map_err(|e| ApiError::ConfigError(format!("Failed to render config: {}", e))),
                "json" => Ok(serde_json::to_string_pretty(&self.config)?),
                other => Err(unknown_format(other)),
            },
        }
    }
}

fn command_name(command: &Commands) -> &'static str {
    match command {
        Commands::Validate { .. } => "validate",
        Commands::Channels { .. } => "channels",
        Commands::Config { .. } => "config",
    }
}

fn unknown_format(format: &str) -> ApiError {
    ApiError::ConfigError(format!("Unknown output format: {}", format))
}
