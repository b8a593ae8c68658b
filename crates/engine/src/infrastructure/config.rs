//! Engine configuration from the environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `CHARWRIGHT_API_URL` | `http://localhost:8000/api` |
//! | `CHARWRIGHT_TIMEOUT_SECS` | `30` |
//! | `CHARWRIGHT_MAX_RETRIES` | `2` |
//! | `CHARWRIGHT_RETRY_BASE_MS` | `250` |

use std::time::Duration;

use url::Url;

use super::retry::RetryConfig;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} is not a valid URL: {message}")]
    InvalidUrl { var: &'static str, message: String },
    #[error("{var} must use http or https, got {scheme}")]
    UnsupportedScheme { var: &'static str, scheme: String },
    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub api_url: Url,
    pub timeout: Duration,
    pub retry: RetryConfig,
}

impl EngineConfig {
    /// Load `.env` files (if any) and read the environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        load_dotenv();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw_url = lookup("CHARWRIGHT_API_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let api_url = parse_api_url(&raw_url)?;

        let timeout_secs = number(&lookup, "CHARWRIGHT_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let defaults = RetryConfig::default();
        let max_retries = number(
            &lookup,
            "CHARWRIGHT_MAX_RETRIES",
            u64::from(defaults.max_retries),
        )?;
        let base_delay_ms = number(&lookup, "CHARWRIGHT_RETRY_BASE_MS", defaults.base_delay_ms)?;

        Ok(Self {
            api_url,
            timeout: Duration::from_secs(timeout_secs),
            retry: RetryConfig {
                max_retries: u32::try_from(max_retries).unwrap_or(u32::MAX),
                base_delay_ms,
                ..defaults
            },
        })
    }
}

fn parse_api_url(raw: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(raw).map_err(|e| ConfigError::InvalidUrl {
        var: "CHARWRIGHT_API_URL",
        message: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ConfigError::UnsupportedScheme {
            var: "CHARWRIGHT_API_URL",
            scheme: other.to_string(),
        }),
    }
}

fn number<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var).map(|s| s.trim().to_string()) {
        None => Ok(default),
        Some(value) if value.is_empty() => Ok(default),
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

/// Load `.env.local` then `.env` from the working directory and the
/// workspace root. Missing files are fine.
fn load_dotenv() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    for dir in [std::path::PathBuf::from("."), repo_root] {
        for filename in [".env.local", ".env"] {
            let path = dir.join(filename);
            if path.exists() {
                let _ = dotenvy::from_path(path);
            }
        }
    }
}
