//! Client configuration.
//!
//! Production deployments serve the API under the relative `/api` prefix of
//! the origin the client talks to; development talks to a backend on
//! `http://localhost:5000/api`. Timeouts default to 10 s for requests, 3 s
//! for health probes, and probes are rate-limited to one per 2 s.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

pub const DEVELOPMENT_BASE_URL: &str = "http://localhost:5000/api";
pub const PRODUCTION_API_PREFIX: &str = "/api";

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_millis(3_000);
pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_millis(2_000);
/// Document listings and chat histories can outgrow ureq's 10 MiB default.
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 256 * 1024 * 1024;

const ENV_ENVIRONMENT: &str = "DOCINTEL_ENV";
const ENV_ORIGIN: &str = "DOCINTEL_ORIGIN";
const ENV_API_URL: &str = "DOCINTEL_API_URL";
const ENV_STORAGE_PATH: &str = "DOCINTEL_STORAGE_PATH";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

impl std::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(ConfigError::UnknownEnvironment(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub environment: Environment,
    /// Absolute API root without a trailing slash, e.g. `http://localhost:5000/api`.
    pub base_url: String,
    pub request_timeout: Duration,
    pub health_timeout: Duration,
    pub probe_interval: Duration,
    /// Largest response body read into memory.
    pub max_response_bytes: u64,
    /// Location of the durable store. `None` keeps everything in memory.
    pub storage_path: Option<PathBuf>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::development()
    }
}

impl ClientConfig {
    pub fn development() -> Self {
        Self::with_base_url(Environment::Development, DEVELOPMENT_BASE_URL)
    }

    /// Production config: the `/api` prefix resolved against `origin`.
    pub fn production(origin: &str) -> Self {
        let base = format!("{}{PRODUCTION_API_PREFIX}", origin.trim_end_matches('/'));
        Self::with_base_url(Environment::Production, &base)
    }

    /// Config pointing at an arbitrary API root (tests, custom deployments).
    pub fn for_base_url(base_url: &str) -> Self {
        Self::with_base_url(Environment::Development, base_url)
    }

    fn with_base_url(environment: Environment, base_url: &str) -> Self {
        Self {
            environment,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            probe_interval: DEFAULT_PROBE_INTERVAL,
            max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
            storage_path: None,
        }
    }

    /// Build a config from `DOCINTEL_*` environment variables.
    ///
    /// `DOCINTEL_API_URL` wins over the environment-derived base URL. When
    /// `DOCINTEL_STORAGE_PATH` is unset the store lives in the platform data
    /// directory.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = match lookup(ENV_ENVIRONMENT) {
            Some(value) => value.parse()?,
            None => Environment::Development,
        };

        let mut config = match (lookup(ENV_API_URL), environment) {
            (Some(url), env) => Self::with_base_url(env, &url),
            (None, Environment::Development) => Self::development(),
            (None, Environment::Production) => {
                let origin = lookup(ENV_ORIGIN).ok_or(ConfigError::MissingOrigin(ENV_ORIGIN))?;
                Self::production(&origin)
            }
        };

        config.storage_path = lookup(ENV_STORAGE_PATH)
            .map(PathBuf::from)
            .or_else(default_storage_path);
        Ok(config)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_health_timeout(mut self, timeout: Duration) -> Self {
        self.health_timeout = timeout;
        self
    }

    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    pub fn with_max_response_bytes(mut self, limit: u64) -> Self {
        self.max_response_bytes = limit;
        self
    }

    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = Some(path.into());
        self
    }
}

fn default_storage_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("docintel").join("storage.json"))
}
