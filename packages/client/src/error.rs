// ABOUTME: Error taxonomy for the Calorie Vision client
// ABOUTME: Maps transport, storage and server failures onto short user-facing messages

use thiserror::Error;

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;

/// Client error types
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Please log in first")]
    Unauthenticated,

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("An analysis is already in progress")]
    AnalysisInFlight,

    #[error("Backend unreachable: {0}")]
    Unreachable(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Corrupt persisted state: {0}")]
    CorruptPersistedState(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl ClientError {
    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::AuthFailed(msg.into())
    }

    /// Create an analysis error
    pub fn analysis(msg: impl Into<String>) -> Self {
        Self::AnalysisFailed(msg.into())
    }

    /// Create a network error
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    /// Create an API error
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Check if this is a network-related error
    pub fn is_network_error(&self) -> bool {
        matches!(self, ClientError::Unreachable(_))
    }

    /// Check if this is an authentication error
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ClientError::AuthFailed(_) | ClientError::Unauthenticated)
    }

    /// Short diagnostic without the variant prefix
    pub fn detail(&self) -> String {
        match self {
            ClientError::AuthFailed(msg)
            | ClientError::AnalysisFailed(msg)
            | ClientError::Unreachable(msg)
            | ClientError::Api(msg)
            | ClientError::CorruptPersistedState(msg)
            | ClientError::Storage(msg)
            | ClientError::Configuration(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// Message suitable for showing to the user.
    ///
    /// Server-provided auth and analysis errors are shown verbatim. Network
    /// failures against a plaintext endpoint carry a transport hint.
    pub fn user_message(&self, insecure_endpoint: bool) -> String {
        match self {
            ClientError::AuthFailed(msg) | ClientError::AnalysisFailed(msg) => msg.clone(),
            ClientError::Unreachable(msg) if insecure_endpoint => {
                format!("Backend unreachable: {} (endpoint uses plaintext http)", msg)
            }
            other => other.to_string(),
        }
    }
}

/// Summarize a transport failure without leaking request internals.
pub fn describe_transport_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "request timed out".to_string()
    } else if err.is_connect() {
        "connection failed".to_string()
    } else if let Some(status) = err.status() {
        format!("HTTP {}", status.as_u16())
    } else if err.is_decode() || err.is_body() {
        "invalid response body".to_string()
    } else {
        "network error".to_string()
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unreachable(describe_transport_error(&err))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::CorruptPersistedState(err.to_string())
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}
