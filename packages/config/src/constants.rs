// ABOUTME: Environment variable names and compiled-in defaults
// ABOUTME: Centralized definitions shared by the client library and the CLI

// Backend Configuration
pub const CALVISION_BACKEND_URL: &str = "CALVISION_BACKEND_URL";

// HTTP Timeouts
pub const CALVISION_HTTP_TIMEOUT_SECS: &str = "CALVISION_HTTP_TIMEOUT_SECS";
pub const CALVISION_HTTP_CONNECT_TIMEOUT_SECS: &str = "CALVISION_HTTP_CONNECT_TIMEOUT_SECS";

// Local Storage
pub const CALVISION_DATA_DIR: &str = "CALVISION_DATA_DIR";

/// Backend used when neither an override nor the environment names one
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Number of meals requested from the history endpoint
pub const HISTORY_PAGE_SIZE: usize = 20;

/// Directory name appended to the platform data dir
pub const DATA_DIR_NAME: &str = "calorie-vision";

// Backend Routes
pub const SIGNUP_PATH: &str = "/auth/signup";
pub const LOGIN_PATH: &str = "/auth/login";
pub const ANALYZE_PATH: &str = "/analyze";
pub const MEALS_PATH: &str = "/meals";
pub const HEALTH_PATH: &str = "/test";
