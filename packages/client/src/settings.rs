// ABOUTME: Client settings assembled from the environment
// ABOUTME: Data dir, endpoint environment tier, fallback URL and HTTP timeouts

use calvision_config::constants::{
    CALVISION_BACKEND_URL, CALVISION_DATA_DIR, CALVISION_HTTP_CONNECT_TIMEOUT_SECS,
    CALVISION_HTTP_TIMEOUT_SECS, DATA_DIR_NAME, DEFAULT_BACKEND_URL,
    DEFAULT_HTTP_CONNECT_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS, HISTORY_PAGE_SIZE,
};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ClientError, ClientResult};

/// Timeouts applied to every backend request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSettings {
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_HTTP_CONNECT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClientSettings {
    /// Root directory of the persisted store
    pub data_dir: PathBuf,
    /// Environment tier of the endpoint precedence chain
    pub environment_url: Option<String>,
    /// Compiled-in last resort
    pub fallback_url: String,
    pub http: HttpSettings,
    /// Number of meals requested per refresh
    pub history_limit: usize,
}

impl ClientSettings {
    /// Load settings from process environment, falling back to the backend
    /// URL captured at build time.
    pub fn from_env() -> ClientResult<Self> {
        let mut settings = Self::from_lookup(calvision_config::env_value)?;
        if settings.environment_url.is_none() {
            settings.environment_url =
                calvision_config::build_time_backend_url().map(str::to_string);
        }
        Ok(settings)
    }

    /// Load settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> ClientResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let data_dir = match lookup(CALVISION_DATA_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_data_dir(),
        };

        let request_timeout =
            parse_secs(&lookup, CALVISION_HTTP_TIMEOUT_SECS, DEFAULT_HTTP_TIMEOUT_SECS)?;
        let connect_timeout = parse_secs(
            &lookup,
            CALVISION_HTTP_CONNECT_TIMEOUT_SECS,
            DEFAULT_HTTP_CONNECT_TIMEOUT_SECS,
        )?;

        Ok(Self {
            data_dir,
            environment_url: lookup(CALVISION_BACKEND_URL)
                .map(|url| url.trim().to_string())
                .filter(|url| !url.is_empty()),
            fallback_url: DEFAULT_BACKEND_URL.to_string(),
            http: HttpSettings {
                request_timeout,
                connect_timeout,
            },
            history_limit: HISTORY_PAGE_SIZE,
        })
    }

    /// Settings rooted at an explicit data dir with defaults elsewhere
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            environment_url: None,
            fallback_url: DEFAULT_BACKEND_URL.to_string(),
            http: HttpSettings::default(),
            history_limit: HISTORY_PAGE_SIZE,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

fn parse_secs<F>(lookup: &F, name: &str, default: u64) -> ClientResult<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match lookup(name) {
        Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
            ClientError::config(format!("Invalid value for {}: {} ({})", name, raw, e))
        })?,
        None => default,
    };

    if secs == 0 {
        return Err(ClientError::config(format!("{} must be greater than 0", name)));
    }
    Ok(Duration::from_secs(secs))
}
