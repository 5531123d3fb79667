//! Environment-backed configuration
//!
//! All settings are read and validated once at startup. The process refuses
//! to start when either external credential is absent or malformed.

use crate::error::AgentError;
use crate::Result;
use std::env;
use std::time::Duration;

/// Required prefix for the chat oracle credential.
const OPENAI_KEY_PREFIX: &str = "sk-";

/// Minimum length for the rate provider credential.
const MIN_RATE_KEY_LEN: usize = 10;

const DEFAULT_CACHE_TTL_SECONDS: u64 = 3600;
const DEFAULT_CATALOG_PATH: &str = "data/products.csv";
const DEFAULT_PORT: u16 = 8080;

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub openai_api_key: String,
    pub exchange_rate_api_key: String,
    pub cache_ttl: Duration,
    pub catalog_path: String,
    pub port: u16,
}

impl Settings {
    /// Read settings from the environment, failing on any invalid credential.
    pub fn from_env() -> Result<Self> {
        let openai_api_key = env::var("OPENAI_API_KEY")
            .map_err(|_| AgentError::Config("OPENAI_API_KEY is not set".to_string()))?;

        if !openai_api_key.starts_with(OPENAI_KEY_PREFIX) {
            return Err(AgentError::Config(format!(
                "OPENAI_API_KEY must start with '{}'",
                OPENAI_KEY_PREFIX
            )));
        }

        let exchange_rate_api_key = env::var("EXCHANGE_RATE_API_KEY")
            .map_err(|_| AgentError::Config("EXCHANGE_RATE_API_KEY is not set".to_string()))?;

        if exchange_rate_api_key.len() < MIN_RATE_KEY_LEN {
            return Err(AgentError::Config(format!(
                "EXCHANGE_RATE_API_KEY must be at least {} characters",
                MIN_RATE_KEY_LEN
            )));
        }

        let cache_ttl_seconds = match env::var("CACHE_TTL_SECONDS") {
            Ok(raw) => raw.parse::<u64>().map_err(|_| {
                AgentError::Config(format!("CACHE_TTL_SECONDS is not a valid number: {}", raw))
            })?,
            Err(_) => DEFAULT_CACHE_TTL_SECONDS,
        };

        let catalog_path =
            env::var("CATALOG_CSV_PATH").unwrap_or_else(|_| DEFAULT_CATALOG_PATH.to_string());

        let port = match env::var("PORT") {
            Ok(raw) => raw
                .parse::<u16>()
                .map_err(|_| AgentError::Config(format!("PORT is not a valid port: {}", raw)))?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            openai_api_key,
            exchange_rate_api_key,
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            catalog_path,
            port,
        })
    }
}
