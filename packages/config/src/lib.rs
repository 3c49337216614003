// ABOUTME: Configuration constants and environment lookup for Calorie Vision
// ABOUTME: Shared by calvision-client and calvision-cli

pub mod constants;

use tracing::debug;

/// Read an environment variable, treating unset and blank values alike.
pub fn env_value(name: &str) -> Option<String> {
    let value = std::env::var(name).ok()?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        debug!("Ignoring blank environment variable {}", name);
        return None;
    }
    Some(trimmed.to_string())
}

/// Backend URL captured when the crate was compiled, if any.
pub fn build_time_backend_url() -> Option<&'static str> {
    option_env!("CALVISION_BACKEND_URL")
        .map(str::trim)
        .filter(|url| !url.is_empty())
}
