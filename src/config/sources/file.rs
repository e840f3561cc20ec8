//! TOML file sources.

use crate::config::CONFIG_FILE_NAME;
use config::builder::DefaultState;
use config::{ConfigBuilder, ConfigError, File, FileFormat};
use std::path::Path;

/// Add `<dir>/spellhub.toml` if it exists.
pub fn add_dir_file_to_builder(
    builder: ConfigBuilder<DefaultState>,
    dir: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(false)))
}

/// Add an explicit file; it must exist.
pub fn add_file_to_builder(
    builder: ConfigBuilder<DefaultState>,
    path: &Path,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.display().to_string()));
    }
    Ok(builder.add_source(File::from(path).format(FileFormat::Toml).required(true)))
}
