//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::HubConfig;
use crate::error::ApiError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from `<config_dir>/spellhub.toml` (if present) and environment.
    pub fn load(config_dir: &Path) -> Result<HubConfig, ApiError> {
        let config = MergeService::load(config_dir)?;
        config.validate().map_err(ApiError::ConfigError)?;
        Ok(config)
    }

    /// Load configuration from a specific file with environment overlay.
    pub fn load_from_file(path: &Path) -> Result<HubConfig, ApiError> {
        let config = MergeService::load_from_file(path)?;
        config.validate().map_err(ApiError::ConfigError)?;
        Ok(config)
    }

    /// Create default configuration.
    pub fn default() -> HubConfig {
        HubConfig::default()
    }
}
