use std::path::{Path, PathBuf};
use std::{fmt, io};

use config::builder::{ConfigBuilder, DefaultState};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::environment::Environment;

/// Directory, relative to the working directory, holding configuration files.
const CONFIGURATION_DIR: &str = "configuration";

/// Extensions tried, in order, for every configuration file.
const CONFIG_FILE_EXTENSIONS: &[&str] = &["yaml", "yml", "json"];

/// Prefix of environment variables overriding file values, e.g. `RECON_SOURCE__INSTANCE_URL`.
const ENV_PREFIX: &str = "RECON";

const ENV_PREFIX_SEPARATOR: &str = "_";

/// Separator between nested keys in environment variable names.
const ENV_SEPARATOR: &str = "__";

const LIST_SEPARATOR: &str = ",";

/// Implemented by top-level configuration structures loadable through [`load_config`].
pub trait Config {
    /// Keys whose environment variable values are parsed as comma-separated lists.
    const LIST_PARSE_KEYS: &'static [&'static str];
}

/// Which of the layered files is being loaded.
#[derive(Debug, Clone, Copy)]
enum ConfigLayer {
    Base,
    Environment(Environment),
}

impl ConfigLayer {
    fn stem(&self) -> &'static str {
        match self {
            ConfigLayer::Base => "base",
            ConfigLayer::Environment(env) => env.as_str(),
        }
    }
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigLayer::Base => f.write_str("base configuration"),
            ConfigLayer::Environment(env) => write!(f, "{env} environment configuration"),
        }
    }
}

/// Errors raised while locating, parsing, or deserializing configuration.
#[derive(Debug, Error)]
pub enum LoadConfigError {
    #[error("failed to determine the current directory: {0}")]
    CurrentDir(#[source] io::Error),

    #[error("configuration directory `{0}` does not exist")]
    MissingConfigurationDirectory(PathBuf),

    #[error("could not locate {layer} in `{directory}`; attempted: {attempted}")]
    ConfigurationFileMissing {
        layer: String,
        directory: PathBuf,
        attempted: String,
    },

    #[error("failed to load {layer} from `{path}`: {source}")]
    ConfigurationFileLoad {
        layer: String,
        path: PathBuf,
        source: config::ConfigError,
    },

    #[error("failed to determine runtime environment: {0}")]
    Environment(#[source] io::Error),

    #[error("failed to build configuration: {0}")]
    Builder(#[source] config::ConfigError),

    #[error("failed to deserialize configuration: {0}")]
    Deserialization(#[source] config::ConfigError),
}

/// Loads configuration from `./configuration`.
///
/// Layers `base.(yaml|yml|json)`, then `{environment}.(yaml|yml|json)`, then
/// `RECON_`-prefixed environment variables. Nested keys are separated with a double
/// underscore, as in `RECON_COMPLETION__MAX_WAIT_MS`.
pub fn load_config<T>() -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    let base_path = std::env::current_dir().map_err(LoadConfigError::CurrentDir)?;
    let environment = Environment::load().map_err(LoadConfigError::Environment)?;

    load_config_from(&base_path.join(CONFIGURATION_DIR), environment)
}

/// Loads configuration from an explicit directory and environment.
pub fn load_config_from<T>(directory: &Path, environment: Environment) -> Result<T, LoadConfigError>
where
    T: Config + DeserializeOwned,
{
    if !directory.is_dir() {
        return Err(LoadConfigError::MissingConfigurationDirectory(
            directory.to_path_buf(),
        ));
    }

    let base_file = find_configuration_file(directory, ConfigLayer::Base)?;
    let environment_file =
        find_configuration_file(directory, ConfigLayer::Environment(environment))?;

    let builder = config::Config::builder().add_source(config::File::from(base_file.clone()));
    check_layer(&builder, ConfigLayer::Base, &base_file)?;

    let builder = builder.add_source(config::File::from(environment_file.clone()));
    check_layer(
        &builder,
        ConfigLayer::Environment(environment),
        &environment_file,
    )?;

    let settings = builder
        .add_source(environment_source::<T>())
        .build()
        .map_err(LoadConfigError::Builder)?;

    settings
        .try_deserialize::<T>()
        .map_err(LoadConfigError::Deserialization)
}

fn environment_source<T: Config>() -> config::Environment {
    let mut source = config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_PREFIX_SEPARATOR)
        .separator(ENV_SEPARATOR);

    if !T::LIST_PARSE_KEYS.is_empty() {
        source = source.try_parsing(true).list_separator(LIST_SEPARATOR);
        for key in T::LIST_PARSE_KEYS {
            source = source.with_list_parse_key(key);
        }
    }

    source
}

fn find_configuration_file(directory: &Path, layer: ConfigLayer) -> Result<PathBuf, LoadConfigError> {
    let candidates: Vec<PathBuf> = CONFIG_FILE_EXTENSIONS
        .iter()
        .map(|extension| directory.join(format!("{}.{extension}", layer.stem())))
        .collect();

    if let Some(found) = candidates.iter().find(|path| path.is_file()) {
        return Ok(found.clone());
    }

    let attempted = candidates
        .iter()
        .map(|path| format!("`{}`", path.display()))
        .collect::<Vec<_>>()
        .join(", ");

    Err(LoadConfigError::ConfigurationFileMissing {
        layer: layer.to_string(),
        directory: directory.to_path_buf(),
        attempted,
    })
}

/// Builds the configuration accumulated so far so a malformed file is reported by name.
fn check_layer(
    builder: &ConfigBuilder<DefaultState>,
    layer: ConfigLayer,
    path: &Path,
) -> Result<(), LoadConfigError> {
    builder
        .clone()
        .build()
        .map(|_| ())
        .map_err(|source| LoadConfigError::ConfigurationFileLoad {
            layer: layer.to_string(),
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::ReconcilerConfig;
    use secrecy::ExposeSecret;

    fn write(dir: &Path, name: &str, contents: &str) {
        std::fs::write(dir.join(name), contents).unwrap();
    }

    #[test]
    fn environment_file_overrides_base_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "base.yaml",
            "source:\n  instance_url: https://example.my.salesforce.com\n  access_token: token\ncompletion:\n  poll_interval_ms: 1000\n",
        );
        write(dir.path(), "dev.yml", "completion:\n  max_wait_ms: 60000\n");

        let config: ReconcilerConfig = load_config_from(dir.path(), Environment::Dev).unwrap();

        assert_eq!(config.source.instance_url, "https://example.my.salesforce.com");
        assert_eq!(config.source.access_token.expose_secret(), "token");
        assert_eq!(config.completion.poll_interval_ms, 1000);
        assert_eq!(config.completion.max_wait_ms, 60000);
        assert_eq!(config.output.missing_owner_placeholder, "undefined");
    }

    #[test]
    fn missing_environment_file_is_reported_with_attempted_paths() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "base.yaml", "source:\n  instance_url: x\n  access_token: y\n");

        let err = load_config_from::<ReconcilerConfig>(dir.path(), Environment::Prod).unwrap_err();

        match err {
            LoadConfigError::ConfigurationFileMissing { attempted, .. } => {
                assert!(attempted.contains("prod.yaml"));
                assert!(attempted.contains("prod.json"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");

        let err = load_config_from::<ReconcilerConfig>(&missing, Environment::Dev).unwrap_err();

        assert!(matches!(err, LoadConfigError::MissingConfigurationDirectory(_)));
    }
}
