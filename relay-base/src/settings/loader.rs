use std::collections::HashMap;
use std::env;
use std::error::Error;
use std::path::PathBuf;

use config::{Config, Environment, File};
use eyre::{Context, Result};
use serde::de::DeserializeOwned;

/// Load a settings object from the config locations.
/// Further documentation can be found in the `settings` module.
pub(crate) fn load_settings_object<T>(env_prefix: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    load_settings_object_with_env(env_prefix, env::vars().collect())
}

pub(crate) fn load_settings_object_with_env<T>(
    env_prefix: &str,
    env_vars: HashMap<String, String>,
) -> Result<T>
where
    T: DeserializeOwned,
{
    let mut base_config_sources = vec![];
    let mut builder = Config::builder();

    // Default config files (`./config/*.json`), if the directory exists
    let config_dir = PathBuf::from("./config");
    if config_dir.is_dir() {
        let mut paths = vec![];
        for entry in config_dir
            .read_dir()
            .context("Failed to open config directory")?
        {
            let entry = entry.context("Failed to read config directory entry")?;
            let path = entry.path();
            if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        // load in a stable order so later files predictably override earlier ones
        paths.sort();
        for path in paths {
            base_config_sources.push(format!("{path:?}"));
            builder = builder.add_source(File::from(path));
        }
    }

    // Additional user specified config files
    let config_file_paths: Vec<String> = env::var("CONFIG_FILES")
        .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_default();

    let builder = config_file_paths.iter().fold(builder, |builder, path| {
        builder.add_source(File::with_name(path))
    });

    let config_deserializer = builder
        .add_source(
            Environment::with_prefix(env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(Some(env_vars)),
        )
        .build()?;

    match config_deserializer.try_deserialize::<T>() {
        Ok(cfg) => Ok(cfg),
        Err(err) => {
            let mut err = if let Some(source_err) = err.source() {
                let source = format!("Config error source: {source_err}");
                Err(err).context(source)
            } else {
                Err(err.into())
            };

            for cfg_path in base_config_sources.iter().chain(config_file_paths.iter()) {
                err = err.with_context(|| format!("Config loaded: {cfg_path}"));
            }

            err.context("Config deserialization error, please check the settings documentation")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{QueueBackend, Settings};

    fn env(vars: &[(&str, &str)]) -> HashMap<String, String> {
        vars.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn loads_nested_settings_from_env() {
        let settings: Settings = load_settings_object_with_env(
            "RELAY",
            env(&[
                ("RELAY_QUEUE__BACKEND", "memory"),
                ("RELAY_QUEUE__MAX_RECEIVE_COUNT", "5"),
                ("RELAY_EXECUTOR__URL", "http://localhost:8080"),
                ("RELAY_EXECUTOR__API_KEY", "secret"),
                ("RELAY_CHAIN__RPC_URL", "http://localhost:8545"),
                ("RELAY_CHAIN__CHAIN_ID", "31337"),
                (
                    "RELAY_CHAIN__FORWARDER_ADDRESS",
                    "0x5FbDB2315678afecb367f032d93F642f64180aa3",
                ),
                ("RELAY_CONSUMER__CYCLE_DELAY_MS", "250"),
                ("UNRELATED_VAR", "ignored"),
            ]),
        )
        .unwrap();

        assert_eq!(settings.queue.backend, QueueBackend::Memory);
        assert_eq!(settings.queue.max_receive_count, 5);
        assert_eq!(settings.queue.max_messages, 10);
        assert_eq!(settings.executor.api_key, "secret");
        assert_eq!(settings.chain.chain_id, 31337);
        assert_eq!(settings.consumer.cycle_delay_ms, 250);
        settings.validate().unwrap();
    }

    #[test]
    fn missing_required_section_is_an_error() {
        let res: Result<Settings> =
            load_settings_object_with_env("RELAY", env(&[("RELAY_QUEUE__BACKEND", "memory")]));
        assert!(res.is_err());
    }
}
