//! Calorie Vision client core
//!
//! Session persistence, meal history caching, backend endpoint resolution,
//! connectivity probing and photo analysis for the Calorie Vision service.
//! Surfaces such as the CLI drive everything through [`AppController`].

pub mod analysis;
pub mod api;
pub mod app;
pub mod auth;
pub mod backend;
pub mod connectivity;
pub mod endpoint;
pub mod error;
pub mod history;
pub mod session;
pub mod settings;
pub mod store;
pub mod types;

#[cfg(test)]
mod testing;

// Re-export commonly used types and traits
pub use analysis::AnalysisOrchestrator;
pub use app::{AppController, AppState, AuthMode};
pub use auth::{AuthFlow, AuthOutcome, Credentials};
pub use backend::{Backend, BackendFactory, HttpBackend, HttpBackendFactory, ImageUpload};
pub use connectivity::{ConnectivityMonitor, ConnectivityState, ProbeReport};
pub use endpoint::{EndpointConfig, EndpointResolver, EndpointSource};
pub use error::{ClientError, ClientResult};
pub use history::{MealHistoryCache, RefreshOutcome};
pub use session::SessionStore;
pub use settings::{ClientSettings, HttpSettings};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreKey};
pub use types::*;
