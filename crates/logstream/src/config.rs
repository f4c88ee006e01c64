// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use serde::Deserialize;
use std::env;
use std::fmt;
use std::time::Duration;

use crate::error::LogError;

pub const DEFAULT_ENDPOINT: &str = "localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// When the environment descriptor is attached to an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageInfo {
    #[default]
    Never,
    PerEntry,
    Once,
}

impl PageInfo {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "never" => Some(PageInfo::Never),
            "per-entry" => Some(PageInfo::PerEntry),
            "once" => Some(PageInfo::Once),
            _ => None,
        }
    }
}

impl fmt::Display for PageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PageInfo::Never => "never",
            PageInfo::PerEntry => "per-entry",
            PageInfo::Once => "once",
        })
    }
}

/// Session configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Intake token, used as the last path segment of the destination
    pub token: Option<String>,
    /// Use `https` instead of `http`
    pub ssl: bool,
    /// Ship uncaught errors (panics) as events
    pub catchall: bool,
    /// Attach the session trace code to every envelope
    pub trace: bool,
    pub page_info: PageInfo,
    /// Intake host and optional port (e.g., "localhost:8080")
    pub endpoint: String,
    /// Timeout of a single delivery request, in seconds
    pub timeout_secs: u64,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            ssl: true,
            catchall: false,
            trace: false,
            page_info: PageInfo::Never,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            https_proxy: None,
        }
    }
}

impl Config {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, LogError> {
        let defaults = Self::default();

        let token = env::var("LOGSTREAM_TOKEN").ok();
        let ssl = read_bool("LOGSTREAM_SSL").unwrap_or(defaults.ssl);
        let catchall = read_bool("LOGSTREAM_CATCHALL").unwrap_or(defaults.catchall);
        let trace = read_bool("LOGSTREAM_TRACE").unwrap_or(defaults.trace);
        let page_info = match env::var("LOGSTREAM_PAGE_INFO") {
            Ok(val) => PageInfo::parse(&val).ok_or_else(|| {
                LogError::Configuration(format!(
                    "Invalid page_info '{val}'. Must be one of: never, per-entry, once"
                ))
            })?,
            Err(_) => defaults.page_info,
        };
        let endpoint = env::var("LOGSTREAM_ENDPOINT").unwrap_or(defaults.endpoint);
        let timeout_secs = env::var("LOGSTREAM_TIMEOUT_SECS")
            .ok()
            .and_then(|secs| secs.parse::<u64>().ok())
            .unwrap_or(defaults.timeout_secs);
        let https_proxy = env::var("LOGSTREAM_PROXY_HTTPS")
            .or_else(|_| env::var("HTTPS_PROXY"))
            .ok();

        let config = Self {
            token,
            ssl,
            catchall,
            trace,
            page_info,
            endpoint,
            timeout_secs,
            https_proxy,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), LogError> {
        self.token()?;

        if self.endpoint.trim().is_empty() {
            return Err(LogError::Configuration(
                "endpoint cannot be empty".to_string(),
            ));
        }

        if self.timeout_secs == 0 {
            return Err(LogError::Configuration(
                "timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// The intake token, if one is present.
    pub fn token(&self) -> Result<&str, LogError> {
        match self.token.as_deref().map(str::trim) {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(LogError::Configuration("Token not present.".to_string())),
        }
    }

    /// URL every envelope is posted to: `{scheme}://{endpoint}/logs/{token}`.
    pub fn destination(&self) -> Result<String, LogError> {
        let scheme = if self.ssl { "https" } else { "http" };
        Ok(format!(
            "{scheme}://{}/logs/{}",
            self.endpoint.trim().trim_end_matches('/'),
            self.token()?
        ))
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn read_bool(var: &str) -> Option<bool> {
    env::var(var).ok().map(|val| {
        let val = val.trim().to_lowercase();
        val == "true" || val == "1"
    })
}

/// What `init` accepts: a bare token or a full [`Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Options {
    Token(String),
    Config(Config),
}

impl Options {
    /// Parses options given as JSON: a string is a token, an object is a
    /// [`Config`] with defaults for every missing option.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, LogError> {
        match json {
            serde_json::Value::String(token) => Ok(Options::Token(token.clone())),
            serde_json::Value::Object(_) => serde_json::from_value(json.clone())
                .map(Options::Config)
                .map_err(|e| LogError::Configuration(format!("Invalid options: {e}"))),
            other => Err(LogError::Configuration(format!(
                "Options must be a token string or an object, got: {other}"
            ))),
        }
    }

    /// Resolves into a validated [`Config`].
    pub fn into_config(self) -> Result<Config, LogError> {
        let config = match self {
            Options::Token(token) => Config {
                token: Some(token),
                ..Default::default()
            },
            Options::Config(config) => config,
        };
        config.validate()?;
        Ok(config)
    }
}

impl From<&str> for Options {
    fn from(token: &str) -> Self {
        Options::Token(token.to_string())
    }
}

impl From<String> for Options {
    fn from(token: String) -> Self {
        Options::Token(token)
    }
}

impl From<Config> for Options {
    fn from(config: Config) -> Self {
        Options::Config(config)
    }
}
