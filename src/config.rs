//! Runtime settings: TOML config file merged with command-line overrides

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use url::Url;

use livetail_client::ClientConfig;
use livetail_logs::ExportFormat;

pub const DEFAULT_BUFFER_CAPACITY: usize = 500;
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 100;
pub const DEFAULT_FOLLOW_THRESHOLD: usize = 2;
const DEFAULT_CHANNELS: [&str; 4] = ["system", "api", "auth", "games"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Shape of `config.toml`; every key is optional
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    base_url: Option<String>,
    api_key: Option<String>,
    channels: Option<Vec<String>>,
    default_channel: Option<String>,
    buffer_capacity: Option<usize>,
    snapshot_limit: Option<usize>,
    follow_threshold: Option<usize>,
    request_timeout_secs: Option<u64>,
    export_format: Option<String>,
    endpoints: EndpointsConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct EndpointsConfig {
    token_path: Option<String>,
    snapshot_path: Option<String>,
    stream_path: Option<String>,
}

/// Values given on the command line; these win over the file
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub channel: Option<String>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    pub buffer_size: Option<usize>,
    pub snapshot_limit: Option<usize>,
}

/// Fully resolved settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub client: ClientConfig,
    pub channels: Vec<String>,
    pub initial_channel: String,
    pub buffer_capacity: usize,
    pub snapshot_limit: usize,
    pub follow_threshold: usize,
    pub export_format: ExportFormat,
}

/// `$XDG_CONFIG_HOME/livetail/config.toml` (or the platform equivalent)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("livetail").join("config.toml"))
}

impl Settings {
    /// Load settings from `path`, or from the default location when None
    ///
    /// An explicitly given file must exist; a missing default file just
    /// means built-in defaults.
    pub fn load(path: Option<&Path>, overrides: Overrides) -> Result<Self, ConfigError> {
        let file = match path {
            Some(path) => read_file(path)?,
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path)?,
                _ => FileConfig::default(),
            },
        };
        Self::resolve(file, overrides)
    }

    fn resolve(file: FileConfig, overrides: Overrides) -> Result<Self, ConfigError> {
        let defaults = ClientConfig::default();

        let base_url = overrides
            .base_url
            .or(file.base_url)
            .unwrap_or(defaults.base_url);
        validate_base_url(&base_url)?;

        let channels = file
            .channels
            .unwrap_or_else(|| DEFAULT_CHANNELS.iter().map(|c| c.to_string()).collect());
        if channels.is_empty() {
            return Err(ConfigError::Invalid("channels must not be empty".to_string()));
        }
        if let Some(blank) = channels.iter().find(|c| c.trim().is_empty()) {
            return Err(ConfigError::Invalid(format!("channel name '{}' is blank", blank)));
        }

        let initial_channel = overrides
            .channel
            .or(file.default_channel)
            .unwrap_or_else(|| channels[0].clone());
        if !channels.contains(&initial_channel) {
            return Err(ConfigError::Invalid(format!(
                "channel '{}' is not one of the configured channels ({})",
                initial_channel,
                channels.join(", ")
            )));
        }

        let timeout_secs = file
            .request_timeout_secs
            .unwrap_or(defaults.timeout.as_secs());
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be at least 1".to_string(),
            ));
        }

        let snapshot_limit = overrides
            .snapshot_limit
            .or(file.snapshot_limit)
            .unwrap_or(DEFAULT_SNAPSHOT_LIMIT);
        if snapshot_limit == 0 {
            return Err(ConfigError::Invalid("snapshot_limit must be at least 1".to_string()));
        }

        let export_format = match file.export_format {
            Some(format) => format.parse().map_err(ConfigError::Invalid)?,
            None => ExportFormat::default(),
        };

        let endpoints = file.endpoints;
        let client = ClientConfig {
            base_url,
            api_key: overrides.api_key.or(file.api_key).filter(|k| !k.is_empty()),
            token_path: endpoints.token_path.unwrap_or(defaults.token_path),
            snapshot_path: endpoints.snapshot_path.unwrap_or(defaults.snapshot_path),
            stream_path: endpoints.stream_path.unwrap_or(defaults.stream_path),
            timeout: Duration::from_secs(timeout_secs),
            user_agent: defaults.user_agent,
        };

        Ok(Self {
            client,
            channels,
            initial_channel,
            buffer_capacity: overrides
                .buffer_size
                .or(file.buffer_capacity)
                .unwrap_or(DEFAULT_BUFFER_CAPACITY),
            snapshot_limit,
            follow_threshold: file.follow_threshold.unwrap_or(DEFAULT_FOLLOW_THRESHOLD),
            export_format,
        })
    }
}

fn read_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    let url = Url::parse(base_url)
        .map_err(|e| ConfigError::Invalid(format!("base_url '{}': {}", base_url, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "base_url must be http or https, got '{}'",
            other
        ))),
    }
}
