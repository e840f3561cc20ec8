//! Environment variable source: SPELLHUB prefix with __ separator

use crate::config::ENV_PREFIX;
use config::builder::DefaultState;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Add environment variable overlay to builder.
/// `SPELLHUB__EVENT_STORE__FINISH_POLICY=strict` sets `event_store.finish_policy`.
pub fn add_to_builder(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder)
}
