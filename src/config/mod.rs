mod settings;

use std::path::Path;

use config::{Config, Environment, File};

use crate::utils::Result;
use settings::PartialSettings;

pub use settings::{AmqpSettings, LogSettings, Settings};

/// Default location of the connection file, relative to the working directory.
/// The extension is resolved by the `config` crate (`amqp.yml`, `amqp.toml`, ...).
pub const DEFAULT_CONFIG_PATH: &str = "config/amqp";

/// Loads the configuration from `config/amqp` and `HARE_*` environment variables
/// Merges the configuration with default values
pub fn load_config() -> Result<Settings> {
    build(File::with_name(DEFAULT_CONFIG_PATH).required(false))
}

/// Same as [`load_config`] but reads an explicit file, which must exist.
pub fn load_config_from(path: impl AsRef<Path>) -> Result<Settings> {
    build(File::from(path.as_ref()).required(true))
}

fn build<S>(file: S) -> Result<Settings>
where
    S: config::Source + Send + Sync + 'static,
{
    let config = Config::builder()
        .add_source(file)
        .add_source(
            Environment::with_prefix("HARE")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(partial.merge_with_defaults())
}
