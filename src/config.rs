use reqwest::Url;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_SESSION_FILE: &str = "cache/session.json";
pub const DEFAULT_WEB_ADDR: &str = "127.0.0.1:3000";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} is not a valid http(s) URL: {value}")]
    InvalidUrl { var: &'static str, value: String },

    #[error("{var} is not a valid socket address: {value}")]
    InvalidAddr {
        var: &'static str,
        value: String,
        #[source]
        source: std::net::AddrParseError,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_url: String,
    pub session_file: PathBuf,
    pub web_addr: SocketAddr,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source; unset or blank variables take their defaults
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str, default: &str| {
            lookup(var)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let api_url = get("PICKEM_API_URL", DEFAULT_API_URL);
        let api_url = validate_api_url("PICKEM_API_URL", &api_url)?;

        let session_file = PathBuf::from(get("PICKEM_SESSION_FILE", DEFAULT_SESSION_FILE));

        let web_addr = get("PICKEM_WEB_ADDR", DEFAULT_WEB_ADDR);
        let web_addr = web_addr
            .parse()
            .map_err(|source| ConfigError::InvalidAddr {
                var: "PICKEM_WEB_ADDR",
                value: web_addr.clone(),
                source,
            })?;

        Ok(Self {
            api_url,
            session_file,
            web_addr,
        })
    }

    /// Replace the backend URL, e.g. from a command-line flag
    pub fn with_api_url(mut self, api_url: &str) -> Result<Self, ConfigError> {
        self.api_url = validate_api_url("--api-url", api_url)?;
        Ok(self)
    }
}

fn validate_api_url(var: &'static str, value: &str) -> Result<String, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        var,
        value: value.to_string(),
    };
    let url = Url::parse(value).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid());
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Install the fmt subscriber, filtered by `RUST_LOG` (default `info`)
pub fn init_logging() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
}
