//! Configuration module for the document assistant client.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ClientError;

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the backend, without the `/api` prefix
    pub api_base_url: String,
    /// File holding the persisted bearer credential
    pub credential_path: PathBuf,
    /// Per-request timeout for backend calls
    pub request_timeout: Duration,
    /// Delay between storage-link status checks while linking
    pub poll_interval: Duration,
    /// Ceiling after which an unfinished link attempt is abandoned
    pub poll_timeout: Duration,
    /// Launch the authorization URL in the system browser
    pub open_browser: bool,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format (text or json)
    pub log_format: LogFormat,
}

/// Log output format for the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            credential_path: PathBuf::from("./data/credentials.json"),
            request_timeout: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(300),
            open_browser: true,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        let api_base_url = env::var("DOCASSIST_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base_url);

        let credential_path = env::var("DOCASSIST_CREDENTIAL_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.credential_path);

        let request_timeout =
            secs_var("DOCASSIST_REQUEST_TIMEOUT_SECS")?.unwrap_or(defaults.request_timeout);
        let poll_interval =
            secs_var("DOCASSIST_POLL_INTERVAL_SECS")?.unwrap_or(defaults.poll_interval);
        let poll_timeout =
            secs_var("DOCASSIST_POLL_TIMEOUT_SECS")?.unwrap_or(defaults.poll_timeout);

        let open_browser = match env::var("DOCASSIST_OPEN_BROWSER") {
            Ok(value) => parse_bool("DOCASSIST_OPEN_BROWSER", &value)?,
            Err(_) => defaults.open_browser,
        };

        let log_level = env::var("DOCASSIST_LOG_LEVEL").unwrap_or(defaults.log_level);

        let log_format = match env::var("DOCASSIST_LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("text") | Err(_) => LogFormat::Text,
            Ok(other) => {
                return Err(ClientError::Validation(format!(
                    "Invalid DOCASSIST_LOG_FORMAT '{}': expected text or json",
                    other
                )))
            }
        };

        if poll_interval.is_zero() {
            return Err(ClientError::Validation(
                "DOCASSIST_POLL_INTERVAL_SECS must be greater than zero".to_string(),
            ));
        }

        Ok(Self {
            api_base_url,
            credential_path,
            request_timeout,
            poll_interval,
            poll_timeout,
            open_browser,
            log_level,
            log_format,
        })
    }
}

fn secs_var(name: &str) -> Result<Option<Duration>, ClientError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|_| {
                ClientError::Validation(format!("Invalid {} '{}': expected seconds", name, value))
            }),
        Err(_) => Ok(None),
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool, ClientError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ClientError::Validation(format!(
            "Invalid {} '{}': expected true or false",
            name, value
        ))),
    }
}
