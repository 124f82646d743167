use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::Deserialize;
use shared::protocol::ResponseKeys;
use thiserror::Error;
use tracing::warn;
use url::Url;

use crate::logo::DEFAULT_MAX_LOGO_BYTES;

pub const DEFAULT_CONFIG_FILE: &str = "questionnaire.toml";
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3333";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub api_base_url: Url,
    pub request_timeout: Duration,
    /// `None` disables the logo size ceiling.
    pub max_logo_bytes: Option<u64>,
    pub output_dir: PathBuf,
    pub response_keys: ResponseKeys,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: Url::parse(DEFAULT_API_BASE_URL).expect("default api url is valid"),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            max_logo_bytes: Some(DEFAULT_MAX_LOGO_BYTES),
            output_dir: default_output_dir(),
            response_keys: ResponseKeys::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid api base url '{value}': {source}")]
    InvalidUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("api base url must use http or https, got '{0}'")]
    UnsupportedScheme(String),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_seconds: Option<u64>,
    max_logo_bytes: Option<u64>,
    output_dir: Option<PathBuf>,
    response_keys: Option<ResponseKeys>,
}

pub fn default_output_dir() -> PathBuf {
    dirs::download_dir()
        .or_else(dirs::document_dir)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn parse_api_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = raw.trim();
    let url = Url::parse(raw).map_err(|source| ConfigError::InvalidUrl {
        value: raw.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme(other.to_string())),
    }
}

/// Loads settings from defaults, then the config file, then the process
/// environment.
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings, ConfigError> {
    load_settings_with(config_path, |key| std::env::var(key).ok())
}

/// Same as [`load_settings`] with an injectable environment lookup.
///
/// An explicit `config_path` must exist; the implicit `questionnaire.toml`
/// in the working directory is optional.
pub fn load_settings_with<F>(config_path: Option<&Path>, env: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = Settings::default();

    let file_cfg = match config_path {
        Some(path) => Some(read_file_settings(path)?),
        None => match read_file_settings(Path::new(DEFAULT_CONFIG_FILE)) {
            Ok(cfg) => Some(cfg),
            Err(ConfigError::Read { source, .. }) if source.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        },
    };

    if let Some(file_cfg) = file_cfg {
        if let Some(v) = file_cfg.api_base_url {
            settings.api_base_url = parse_api_base_url(&v)?;
        }
        if let Some(v) = file_cfg.request_timeout_seconds {
            settings.request_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file_cfg.max_logo_bytes {
            settings.max_logo_bytes = logo_limit(v);
        }
        if let Some(v) = file_cfg.output_dir {
            settings.output_dir = v;
        }
        if let Some(v) = file_cfg.response_keys {
            settings.response_keys = v;
        }
    }

    if let Some(v) = env("REPORT_API_URL") {
        settings.api_base_url = parse_api_base_url(&v)?;
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = parse_api_base_url(&v)?;
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECONDS") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.request_timeout = Duration::from_secs(parsed),
            Err(_) => warn!(value = %v, "ignoring invalid APP__REQUEST_TIMEOUT_SECONDS"),
        }
    }

    if let Some(v) = env("APP__MAX_LOGO_BYTES") {
        match v.trim().parse::<u64>() {
            Ok(parsed) => settings.max_logo_bytes = logo_limit(parsed),
            Err(_) => warn!(value = %v, "ignoring invalid APP__MAX_LOGO_BYTES"),
        }
    }

    if let Some(v) = env("APP__OUTPUT_DIR") {
        settings.output_dir = PathBuf::from(v);
    }

    if let Some(v) = env("APP__RESPONSE_KEYS") {
        match v.parse::<ResponseKeys>() {
            Ok(parsed) => settings.response_keys = parsed,
            Err(err) => warn!(value = %v, "ignoring APP__RESPONSE_KEYS: {err}"),
        }
    }

    Ok(settings)
}

fn read_file_settings(path: &Path) -> Result<FileSettings, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn logo_limit(bytes: u64) -> Option<u64> {
    (bytes > 0).then_some(bytes)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
