//! MergeService: orchestrates sources, applies merge policy, deserializes to HubConfig.

use crate::config::sources::{environment, file};
use crate::config::HubConfig;
use config::ConfigError;
use std::path::Path;

use super::policy;

/// Merge service for config composition.
pub struct MergeService;

impl MergeService {
    /// Load config from a config directory and the environment.
    /// Precedence: defaults (lowest) -> directory file -> environment (highest).
    pub fn load(config_dir: &Path) -> Result<HubConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = file::add_dir_file_to_builder(builder, config_dir)?;
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Load config from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<HubConfig, ConfigError> {
        let builder = policy::builder_with_defaults()?;
        let builder = file::add_file_to_builder(builder, path)?;
        let builder = environment::add_to_builder(builder)?;

        let config = builder.build()?;
        config.try_deserialize()
    }
}
