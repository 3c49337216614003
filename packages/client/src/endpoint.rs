// ABOUTME: Backend endpoint resolution: saved override, then environment, then fallback
// ABOUTME: Persists user overrides and flags plaintext endpoints for error annotation

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ClientError, ClientResult};
use crate::settings::ClientSettings;
use crate::store::{read_json, write_json, KeyValueStore, StoreKey};

const SECURE_SCHEME: &str = "https://";

/// Which tier of the precedence chain produced the endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointSource {
    Override,
    Environment,
    Default,
}

/// Resolved backend base address
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointConfig {
    pub resolved_url: String,
    pub source: EndpointSource,
}

impl EndpointConfig {
    /// True when the endpoint does not use a secure transport scheme.
    /// Only used to annotate error messages.
    pub fn insecure(&self) -> bool {
        !self
            .resolved_url
            .to_ascii_lowercase()
            .starts_with(SECURE_SCHEME)
    }

    /// Absolute URL for a backend route
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.resolved_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Resolve the endpoint from its three inputs; the first non-empty value wins.
pub fn resolve(
    override_url: Option<&str>,
    environment_url: Option<&str>,
    fallback_url: &str,
) -> EndpointConfig {
    if let Some(url) = non_empty(override_url) {
        return EndpointConfig {
            resolved_url: url.to_string(),
            source: EndpointSource::Override,
        };
    }
    if let Some(url) = non_empty(environment_url) {
        return EndpointConfig {
            resolved_url: url.to_string(),
            source: EndpointSource::Environment,
        };
    }
    EndpointConfig {
        resolved_url: fallback_url.trim().to_string(),
        source: EndpointSource::Default,
    }
}

/// Outcome of changing the saved override.
///
/// Active connections and connectivity state belong to `previous`; the caller
/// must rebuild its backend and re-probe against `current`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct EndpointChange {
    pub previous: EndpointConfig,
    pub current: EndpointConfig,
}

pub struct EndpointResolver {
    store: Arc<dyn KeyValueStore>,
    environment_url: Option<String>,
    fallback_url: String,
}

impl EndpointResolver {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        environment_url: Option<String>,
        fallback_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            environment_url,
            fallback_url: fallback_url.into(),
        }
    }

    pub fn from_settings(store: Arc<dyn KeyValueStore>, settings: &ClientSettings) -> Self {
        Self::new(
            store,
            settings.environment_url.clone(),
            settings.fallback_url.clone(),
        )
    }

    /// Persisted override, if any. A corrupt value counts as absent.
    pub fn saved_override(&self) -> Option<String> {
        match read_json::<String>(self.store.as_ref(), &StoreKey::EndpointOverride) {
            Ok(value) => value,
            Err(e) => {
                warn!("Ignoring unreadable endpoint override: {}", e);
                None
            }
        }
    }

    pub fn resolve(&self) -> EndpointConfig {
        let saved = self.saved_override();
        self.resolve_with_override(saved.as_deref())
    }

    /// What `resolve` would return with `override_url` saved. Persists nothing.
    pub fn resolve_with_override(&self, override_url: Option<&str>) -> EndpointConfig {
        resolve(
            override_url,
            self.environment_url.as_deref(),
            &self.fallback_url,
        )
    }

    /// Save a new override. Blank input is rejected.
    pub fn save(&self, url: &str) -> ClientResult<EndpointChange> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(ClientError::config("Backend URL cannot be empty"));
        }

        let previous = self.resolve();
        write_json(self.store.as_ref(), &StoreKey::EndpointOverride, &trimmed)?;
        let current = self.resolve();

        info!(
            "Backend endpoint changed from {} to {}",
            previous.resolved_url, current.resolved_url
        );
        Ok(EndpointChange { previous, current })
    }

    /// Drop the override so the environment or fallback applies again
    pub fn reset(&self) -> ClientResult<EndpointChange> {
        let previous = self.resolve();
        self.store.remove(&StoreKey::EndpointOverride)?;
        let current = self.resolve();

        info!("Backend endpoint override cleared, now {}", current.resolved_url);
        Ok(EndpointChange { previous, current })
    }
}
