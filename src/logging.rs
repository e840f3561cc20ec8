//! Logging System
//!
//! Structured logging implementation using the `tracing` crate. Provides configurable
//! log levels, output formats, and destinations. Hub and event store records
//! carry the owning agent's `agent_id`, either as a field or through its span.

use crate::error::ApiError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::fmt::time::ChronoUtc;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer, Registry};

/// Resolve the log file path with precedence: explicit, SPELLHUB_LOG_FILE env, default.
pub fn resolve_log_file_path(explicit: Option<PathBuf>) -> Result<PathBuf, ApiError> {
    if let Some(p) = explicit {
        if !p.as_os_str().is_empty() {
            return Ok(p);
        }
    }
    if let Ok(env_path) = std::env::var("SPELLHUB_LOG_FILE") {
        if !env_path.is_empty() {
            return Ok(PathBuf::from(env_path));
        }
    }
    default_log_file_path()
}

fn default_log_file_path() -> Result<PathBuf, ApiError> {
    let project_dirs = directories::ProjectDirs::from("", "spellhub", "spellhub").ok_or_else(|| {
        ApiError::ConfigError(
            "Could not determine platform state directory for log file".to_string(),
        )
    })?;
    let dir = project_dirs
        .state_dir()
        .unwrap_or_else(|| project_dirs.data_local_dir())
        .to_path_buf();
    Ok(dir.join("spellhub.log"))
}

/// Log record encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(ApiError::ConfigError(format!(
                "Invalid log format: {} (must be 'text' or 'json')",
                other
            ))),
        }
    }
}

/// Where log records are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    Stdout,
    #[default]
    Stderr,
    File,
}

impl FromStr for LogOutput {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stdout" => Ok(LogOutput::Stdout),
            "stderr" => Ok(LogOutput::Stderr),
            "file" => Ok(LogOutput::File),
            other => Err(ApiError::ConfigError(format!(
                "Invalid log output: {} (must be 'stdout', 'stderr' or 'file')",
                other
            ))),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Whether logging is enabled (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Base filter level: trace, debug, info, warn, error, off
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file path when output is `file`; None means the platform state dir
    #[serde(default)]
    pub file: Option<PathBuf>,

    /// ANSI colors for text records on a terminal stream
    #[serde(default = "default_true")]
    pub color: bool,

    /// Per-target levels, e.g. `spellhub::command = "debug"`
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            file: None,
            color: true,
            modules: HashMap::new(),
        }
    }
}

/// Initialize the global subscriber
///
/// Environment variables win over `config`, which wins over defaults:
/// `SPELLHUB_LOG` replaces the whole filter, `SPELLHUB_LOG_MODULES` adds
/// `target=level` directives, `SPELLHUB_LOG_FORMAT` and `SPELLHUB_LOG_OUTPUT`
/// pick the encoding and destination.
pub fn init_logging(config: Option<&LoggingConfig>) -> Result<(), ApiError> {
    let defaults = LoggingConfig::default();
    let config = config.unwrap_or(&defaults);

    if !config.enabled {
        return Registry::default()
            .with(EnvFilter::new("off"))
            .try_init()
            .map_err(|e| ApiError::ConfigError(format!("Failed to init logging: {}", e)));
    }

    let filter = build_env_filter(config)?;
    let format = env_override("SPELLHUB_LOG_FORMAT")?.unwrap_or(config.format);
    let output = env_override("SPELLHUB_LOG_OUTPUT")?.unwrap_or(config.output);
    let writer = build_writer(output, config.file.clone())?;

    let layer: Box<dyn Layer<Registry> + Send + Sync> = match format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            .with_writer(writer)
            .boxed(),
        LogFormat::Text => fmt::layer()
            .with_target(true)
            .with_timer(ChronoUtc::rfc_3339())
            // no escape codes in log files
            .with_ansi(config.color && output != LogOutput::File)
            .with_writer(writer)
            .boxed(),
    };

    Registry::default()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| ApiError::ConfigError(format!("Failed to init logging: {}", e)))
}

/// Parse an environment override, if the variable is set and non-empty
fn env_override<T: FromStr<Err = ApiError>>(var: &str) -> Result<Option<T>, ApiError> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => value.parse().map(Some),
        _ => Ok(None),
    }
}

fn build_writer(output: LogOutput, file: Option<PathBuf>) -> Result<BoxMakeWriter, ApiError> {
    match output {
        LogOutput::Stdout => Ok(BoxMakeWriter::new(std::io::stdout)),
        LogOutput::Stderr => Ok(BoxMakeWriter::new(std::io::stderr)),
        LogOutput::File => {
            let log_file = resolve_log_file_path(file)?;
            if let Some(parent) = log_file.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ApiError::ConfigError(format!("Failed to create log directory: {}", e))
                })?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_file)
                .map_err(|e| {
                    ApiError::ConfigError(format!("Failed to open log file {:?}: {}", log_file, e))
                })?;
            Ok(BoxMakeWriter::new(Arc::new(file)))
        }
    }
}

/// Parse one `target=level` pair into a filter directive
fn module_directive(target: &str, level: &str) -> Result<Directive, ApiError> {
    format!("{}={}", target.trim(), level.trim())
        .parse()
        .map_err(|e| ApiError::ConfigError(format!("Invalid log directive '{}': {}", target, e)))
}

fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter, ApiError> {
    // a full filter from the environment replaces everything else
    if let Ok(filter) = EnvFilter::try_from_env("SPELLHUB_LOG") {
        return Ok(filter);
    }
    if config.level == "off" {
        return Ok(EnvFilter::new("off"));
    }

    let mut filter = EnvFilter::new(&config.level);
    for (target, level) in &config.modules {
        filter = filter.add_directive(module_directive(target, level)?);
    }

    if let Ok(modules) = std::env::var("SPELLHUB_LOG_MODULES") {
        for entry in modules.split(',').filter(|s| !s.trim().is_empty()) {
            let Some((target, level)) = entry.split_once('=') else {
                return Err(ApiError::ConfigError(format!(
                    "Invalid SPELLHUB_LOG_MODULES entry '{}': expected target=level",
                    entry
                )));
            };
            filter = filter.add_directive(module_directive(target, level)?);
        }
    }

    Ok(filter)
}
