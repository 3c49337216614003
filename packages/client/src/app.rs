// ABOUTME: Application state controller owning session, meals and status for one surface
// ABOUTME: Discrete transitions for restore, auth, analysis, refresh, probing and logout

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::analysis::AnalysisOrchestrator;
use crate::auth::{AuthFlow, AuthOutcome, Credentials};
use crate::backend::{Backend, BackendFactory, HttpBackendFactory, ImageUpload};
use crate::connectivity::{ConnectivityMonitor, ConnectivityState, ProbeReport};
use crate::endpoint::{EndpointConfig, EndpointResolver};
use crate::error::{ClientError, ClientResult};
use crate::history::{MealHistoryCache, RefreshOutcome};
use crate::session::SessionStore;
use crate::settings::ClientSettings;
use crate::store::{FileStore, KeyValueStore};
use crate::types::{MealHistory, MealRecord, User};

const ANALYSIS_COMPLETE: &str = "Analysis complete";

/// Which part of the app the user is in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Login,
    Signup,
    App,
}

/// Snapshot of everything a surface renders
#[derive(Debug, Clone)]
pub struct AppState {
    pub mode: AuthMode,
    pub session: Option<User>,
    pub meals: MealHistory,
    /// True while an analysis is outstanding; the trigger must be disabled
    pub uploading: bool,
    /// Single user-facing status line
    pub message: Option<String>,
    pub connectivity: ConnectivityState,
    pub endpoint: EndpointConfig,
    /// Bumped whenever the session changes; work started under an older
    /// epoch must not write into the current one
    session_epoch: u64,
}

impl AppState {
    fn new(endpoint: EndpointConfig) -> Self {
        Self {
            mode: AuthMode::Login,
            session: None,
            meals: Vec::new(),
            uploading: false,
            message: None,
            connectivity: ConnectivityState::Unknown,
            endpoint,
            session_epoch: 0,
        }
    }
}

/// Owns the application state and every component behind it.
///
/// State is only mutated inside short critical sections that never span an
/// await, so transitions started from different tasks cannot tear it.
pub struct AppController {
    resolver: EndpointResolver,
    factory: Arc<dyn BackendFactory>,
    backend: RwLock<Arc<dyn Backend>>,
    history: Arc<MealHistoryCache>,
    monitor: ConnectivityMonitor,
    orchestrator: AnalysisOrchestrator,
    auth: AuthFlow,
    state: Mutex<AppState>,
}

impl AppController {
    /// Controller backed by the on-disk store and real HTTP transport
    pub fn open(settings: &ClientSettings) -> ClientResult<Self> {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::open(&settings.data_dir)?);
        let factory: Arc<dyn BackendFactory> =
            Arc::new(HttpBackendFactory::new(settings.http.clone()));
        Self::new(store, factory, settings)
    }

    pub fn new(
        store: Arc<dyn KeyValueStore>,
        factory: Arc<dyn BackendFactory>,
        settings: &ClientSettings,
    ) -> ClientResult<Self> {
        let resolver = EndpointResolver::from_settings(store.clone(), settings);
        let endpoint = resolver.resolve();
        let backend = factory.connect(&endpoint)?;

        let sessions = Arc::new(SessionStore::new(store.clone()));
        let history = Arc::new(MealHistoryCache::new(store.clone(), settings.history_limit));

        debug!(
            "Using backend {} ({:?})",
            endpoint.resolved_url, endpoint.source
        );

        Ok(Self {
            resolver,
            factory,
            backend: RwLock::new(backend),
            history: history.clone(),
            monitor: ConnectivityMonitor::new(),
            orchestrator: AnalysisOrchestrator::new(history.clone(), store),
            auth: AuthFlow::new(sessions, history),
            state: Mutex::new(AppState::new(endpoint)),
        })
    }

    fn lock_state(&self) -> MutexGuard<'_, AppState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn backend(&self) -> Arc<dyn Backend> {
        self.backend
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current state snapshot
    pub fn state(&self) -> AppState {
        self.lock_state().clone()
    }

    pub fn session(&self) -> Option<User> {
        self.lock_state().session.clone()
    }

    pub fn endpoint(&self) -> EndpointConfig {
        self.lock_state().endpoint.clone()
    }

    pub fn last_analysis(&self) -> Option<MealRecord> {
        self.orchestrator.last_analysis()
    }

    /// Connectivity updates as they are published
    pub fn subscribe_connectivity(&self) -> tokio::sync::watch::Receiver<ConnectivityState> {
        self.monitor.subscribe()
    }

    fn user_message(&self, error: &ClientError) -> String {
        error.user_message(self.lock_state().endpoint.insecure())
    }

    fn fail<T>(&self, error: ClientError) -> ClientResult<T> {
        let message = self.user_message(&error);
        self.lock_state().message = Some(message);
        Err(error)
    }

    /// Startup: restore the persisted session and show its cached meals.
    /// Returns true when a session was restored; the caller should then
    /// refresh, e.g. with [`AppController::spawn_refresh`].
    pub fn restore(&self) -> bool {
        let Some(user) = self.auth.restore() else {
            return false;
        };
        let meals = self.history.load_cached(&user.user_id);

        let mut state = self.lock_state();
        debug!("Restored {} with {} cached meals", user.user_id, meals.len());
        state.session = Some(user);
        state.meals = meals;
        state.mode = AuthMode::App;
        state.session_epoch += 1;
        true
    }

    /// Switch between the login and signup forms. Ignored once logged in.
    pub fn set_mode(&self, mode: AuthMode) {
        let mut state = self.lock_state();
        if state.mode != AuthMode::App && mode != AuthMode::App {
            state.mode = mode;
        }
    }

    fn apply_auth(&self, outcome: &AuthOutcome) {
        let mut state = self.lock_state();
        state.session = Some(outcome.user.clone());
        state.meals = outcome.meals.clone();
        state.mode = AuthMode::App;
        state.message = None;
        state.session_epoch += 1;
    }

    /// Sign up and log in. The password is dropped once the attempt ends.
    pub async fn signup(&self, name: &str, email: &str, password: String) -> ClientResult<User> {
        self.lock_state().message = None;
        let backend = self.backend();
        match self
            .auth
            .signup(backend.as_ref(), name, Credentials::new(email, password))
            .await
        {
            Ok(outcome) => {
                self.apply_auth(&outcome);
                Ok(outcome.user)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Log in. The password is dropped once the attempt ends.
    pub async fn login(&self, email: &str, password: String) -> ClientResult<User> {
        self.lock_state().message = None;
        let backend = self.backend();
        match self
            .auth
            .login(backend.as_ref(), Credentials::new(email, password))
            .await
        {
            Ok(outcome) => {
                self.apply_auth(&outcome);
                Ok(outcome.user)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Whether the photo trigger should be enabled
    pub fn can_submit(&self) -> bool {
        let state = self.lock_state();
        state.session.is_some() && !state.uploading
    }

    /// Submit a photo for analysis.
    ///
    /// Refuses with `AnalysisInFlight` while a previous submission from this
    /// controller is outstanding; the orchestrator itself does not serialize.
    /// `uploading` belongs to the submission that set it and is only cleared
    /// by that submission. A result that arrives after the session changed is
    /// returned to the caller but not written into history or state.
    pub async fn submit_photo(&self, image: ImageUpload) -> ClientResult<MealRecord> {
        let (user, epoch) = {
            let mut state = self.lock_state();
            if state.uploading {
                return Err(ClientError::AnalysisInFlight);
            }
            let Some(user) = state.session.clone() else {
                state.message = Some(ClientError::Unauthenticated.to_string());
                return Err(ClientError::Unauthenticated);
            };
            state.uploading = true;
            state.message = None;
            (user, state.session_epoch)
        };

        let backend = self.backend();
        let result = self.orchestrator.request(backend.as_ref(), &user, image).await;
        let insecure = self.endpoint().insecure();

        let mut state = self.lock_state();
        state.uploading = false;
        if state.session_epoch != epoch {
            warn!("Discarding analysis result for {}: session changed", user.user_id);
            return result;
        }

        match &result {
            Ok(record) => {
                self.orchestrator.commit(&user, record);
                state.meals = self.history.load_cached(&user.user_id);
                state.message = Some(ANALYSIS_COMPLETE.to_string());
            }
            Err(e) => state.message = Some(e.user_message(insecure)),
        }
        result
    }

    /// Refresh the session's meals from the server. Failures keep the cached
    /// list on screen and are only reported through the outcome.
    pub async fn refresh_meals(&self) -> RefreshOutcome {
        let Some(user) = self.session() else {
            return RefreshOutcome::Failed(ClientError::Unauthenticated);
        };

        let backend = self.backend();
        let outcome = self.history.refresh(backend.as_ref(), &user.user_id).await;
        self.reload_meals();
        outcome
    }

    /// Start a refresh on the runtime without waiting for it. Call
    /// [`AppController::reload_meals`] once the handle resolves.
    pub fn spawn_refresh(&self) -> Option<JoinHandle<RefreshOutcome>> {
        let user = self.session()?;
        let backend = self.backend();
        let history = self.history.clone();

        Some(tokio::spawn(async move {
            history.refresh(backend.as_ref(), &user.user_id).await
        }))
    }

    /// Pull the current session's meals from the cache into the state
    pub fn reload_meals(&self) {
        let mut state = self.lock_state();
        if let Some(user) = state.session.clone() {
            state.meals = self.history.load_cached(&user.user_id);
        }
    }

    /// Probe the backend and publish the result if it is still the latest
    pub async fn probe(&self) -> ProbeReport {
        let backend = self.backend();
        let report = self.monitor.probe(backend.as_ref()).await;
        self.lock_state().connectivity = self.monitor.current();
        report
    }

    fn install_endpoint(&self, backend: Arc<dyn Backend>, endpoint: EndpointConfig) -> EndpointConfig {
        *self.backend.write().unwrap_or_else(PoisonError::into_inner) = backend;
        self.monitor.reset();

        let mut state = self.lock_state();
        state.endpoint = endpoint.clone();
        state.connectivity = ConnectivityState::Unknown;
        info!("Now talking to {}", endpoint.resolved_url);
        endpoint
    }

    /// Save a backend override and re-resolve as if the process restarted.
    /// Nothing is persisted unless a backend for the new address can be built.
    pub fn change_endpoint(&self, url: &str) -> ClientResult<EndpointConfig> {
        if url.trim().is_empty() {
            return self.fail(ClientError::config("Backend URL cannot be empty"));
        }
        let candidate = self.resolver.resolve_with_override(Some(url));
        let backend = match self.factory.connect(&candidate) {
            Ok(backend) => backend,
            Err(e) => return self.fail(e),
        };
        match self.resolver.save(url) {
            Ok(change) => Ok(self.install_endpoint(backend, change.current)),
            Err(e) => self.fail(e),
        }
    }

    /// Remove the backend override and re-resolve
    pub fn reset_endpoint(&self) -> ClientResult<EndpointConfig> {
        let candidate = self.resolver.resolve_with_override(None);
        let backend = match self.factory.connect(&candidate) {
            Ok(backend) => backend,
            Err(e) => return self.fail(e),
        };
        match self.resolver.reset() {
            Ok(change) => Ok(self.install_endpoint(backend, change.current)),
            Err(e) => self.fail(e),
        }
    }

    /// Forget the session and its cached meals
    pub fn logout(&self) -> ClientResult<()> {
        let user = {
            let mut state = self.lock_state();
            let user = state.session.take();
            state.meals.clear();
            state.mode = AuthMode::Login;
            state.message = None;
            state.session_epoch += 1;
            user
        };

        match user {
            Some(user) => self.auth.logout(&user),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointSource;
    use crate::store::{MemoryStore, StoreKey};
    use crate::testing::{ann, meal, salad_response, MockBackend};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Hands out one shared mock for every endpoint except `rejected`
    struct SharedFactory {
        backend: Arc<MockBackend>,
        connects: AtomicUsize,
        rejected: Option<String>,
    }

    impl BackendFactory for SharedFactory {
        fn connect(&self, endpoint: &EndpointConfig) -> ClientResult<Arc<dyn Backend>> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            if self.rejected.as_deref() == Some(endpoint.resolved_url.as_str()) {
                return Err(ClientError::config("Failed to build HTTP client"));
            }
            Ok(self.backend.clone())
        }
    }

    fn controller_with(
        store: Arc<dyn KeyValueStore>,
        backend: MockBackend,
    ) -> (Arc<SharedFactory>, AppController) {
        let factory = Arc::new(SharedFactory {
            backend: Arc::new(backend),
            connects: AtomicUsize::new(0),
            rejected: Some("https://broken.example.com".to_string()),
        });
        let settings = ClientSettings::with_data_dir("unused");
        let controller = AppController::new(store, factory.clone(), &settings).unwrap();
        (factory, controller)
    }

    fn controller(backend: MockBackend) -> (Arc<SharedFactory>, AppController) {
        controller_with(Arc::new(MemoryStore::new()), backend)
    }

    fn photo() -> ImageUpload {
        ImageUpload::new(vec![1u8, 2, 3], "dinner.png")
    }

    #[test]
    fn test_initial_state() {
        let (_factory, controller) = controller(MockBackend::new());
        let state = controller.state();
        assert_eq!(state.mode, AuthMode::Login);
        assert!(state.session.is_none());
        assert!(state.meals.is_empty());
        assert_eq!(state.connectivity, ConnectivityState::Unknown);
        assert_eq!(state.endpoint.source, EndpointSource::Default);
        assert!(!controller.can_submit());
        assert!(!controller.restore());
    }

    #[test]
    fn test_set_mode_toggles_forms_only() {
        let (_factory, controller) = controller(MockBackend::new());
        controller.set_mode(AuthMode::Signup);
        assert_eq!(controller.state().mode, AuthMode::Signup);
        controller.set_mode(AuthMode::App);
        assert_eq!(controller.state().mode, AuthMode::Signup);
    }

    #[tokio::test]
    async fn test_login_then_restore_after_restart() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let backend = MockBackend::new()
            .with_login(ann())
            .with_meals(vec![meal("s1", "Rice")]);
        let (_factory, controller) = controller_with(store.clone(), backend);

        controller.login("a@x.com", "p".to_string()).await.unwrap();
        let state = controller.state();
        assert_eq!(state.mode, AuthMode::App);
        assert_eq!(state.meals, vec![meal("s1", "Rice")]);

        // Same store, new controller: cache-first restore without network
        let offline = MockBackend::new().failing_meals();
        let (factory, restarted) = controller_with(store, offline);
        assert!(restarted.restore());
        let state = restarted.state();
        assert_eq!(state.session, Some(ann()));
        assert_eq!(state.meals, vec![meal("s1", "Rice")]);
        assert_eq!(factory.backend.total_calls(), 0);

        // Background refresh failure keeps the cached view
        let outcome = restarted.spawn_refresh().unwrap().await.unwrap();
        assert!(outcome.error().is_some());
        restarted.reload_meals();
        assert_eq!(restarted.state().meals, vec![meal("s1", "Rice")]);
    }

    #[tokio::test]
    async fn test_failed_login_sets_message() {
        let backend = MockBackend::new().failing_login("Invalid email or password");
        let (_factory, controller) = controller(backend);

        let result = controller.login("a@x.com", "bad".to_string()).await;
        assert!(result.is_err());

        let state = controller.state();
        assert_eq!(state.mode, AuthMode::Login);
        assert_eq!(state.message.as_deref(), Some("Invalid email or password"));
    }

    #[tokio::test]
    async fn test_submit_without_session() {
        let (factory, controller) =
            controller(MockBackend::new().with_analysis(salad_response()));

        let result = controller.submit_photo(photo()).await;

        assert!(matches!(result, Err(ClientError::Unauthenticated)));
        assert_eq!(factory.backend.total_calls(), 0);
        assert_eq!(
            controller.state().message.as_deref(),
            Some("Please log in first")
        );
    }

    #[tokio::test]
    async fn test_submit_updates_meals_and_message() {
        let backend = MockBackend::new()
            .with_login(ann())
            .with_analysis(salad_response());
        let (_factory, controller) = controller(backend);
        controller.login("a@x.com", "p".to_string()).await.unwrap();

        let record = controller.submit_photo(photo()).await.unwrap();

        let state = controller.state();
        assert_eq!(state.meals[0], record);
        assert_eq!(state.message.as_deref(), Some("Analysis complete"));
        assert!(!state.uploading);
        assert_eq!(controller.last_analysis(), Some(record));
    }

    #[tokio::test]
    async fn test_second_submission_is_refused_while_uploading() {
        let backend = MockBackend::new()
            .with_login(ann())
            .with_analysis(salad_response())
            .with_analysis_delay(Duration::from_millis(50));
        let (factory, controller) = controller(backend);
        controller.login("a@x.com", "p".to_string()).await.unwrap();

        let (first, second) = tokio::join!(controller.submit_photo(photo()), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            assert!(!controller.can_submit());
            controller.submit_photo(photo()).await
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(ClientError::AnalysisInFlight)));
        assert_eq!(factory.backend.analyze_calls(), 1);
        assert!(controller.can_submit());
    }

    #[tokio::test]
    async fn test_failed_analysis_reports_server_text() {
        let backend = MockBackend::new()
            .with_login(ann())
            .failing_analysis("Image too dark");
        let (_factory, controller) = controller(backend);
        controller.login("a@x.com", "p".to_string()).await.unwrap();

        assert!(controller.submit_photo(photo()).await.is_err());
        let state = controller.state();
        assert_eq!(state.message.as_deref(), Some("Image too dark"));
        assert!(!state.uploading);
        assert!(state.meals.is_empty());
    }

    #[tokio::test]
    async fn test_refresh_requires_session() {
        let (_factory, controller) = controller(MockBackend::new());
        let outcome = controller.refresh_meals().await;
        assert!(matches!(
            outcome.error(),
            Some(ClientError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_logout_resets_state() {
        let backend = MockBackend::new()
            .with_login(ann())
            .with_meals(vec![meal("s1", "Rice")]);
        let (_factory, controller) = controller(backend);
        controller.login("a@x.com", "p".to_string()).await.unwrap();

        controller.logout().unwrap();

        let state = controller.state();
        assert_eq!(state.mode, AuthMode::Login);
        assert!(state.session.is_none());
        assert!(state.meals.is_empty());
        assert!(!controller.restore());
    }

    #[tokio::test]
    async fn test_probe_updates_connectivity() {
        let (_factory, controller) = controller(MockBackend::new().failing_health());
        let report = controller.probe().await;
        assert!(report.is_latest);
        assert_eq!(controller.state().connectivity.label(), "unreachable");
    }

    #[tokio::test]
    async fn test_change_endpoint_reconnects_and_resets_connectivity() {
        let (factory, controller) = controller(MockBackend::new());
        controller.probe().await;
        assert!(controller.state().connectivity.is_reachable());

        let endpoint = controller
            .change_endpoint("https://api.example.com")
            .unwrap();

        assert_eq!(endpoint.source, EndpointSource::Override);
        assert!(!endpoint.insecure());
        assert_eq!(factory.connects.load(Ordering::SeqCst), 2);
        let state = controller.state();
        assert_eq!(state.endpoint, endpoint);
        assert_eq!(state.connectivity, ConnectivityState::Unknown);

        let endpoint = controller.reset_endpoint().unwrap();
        assert_eq!(endpoint.source, EndpointSource::Default);
    }

    #[test]
    fn test_blank_endpoint_is_rejected() {
        let (factory, controller) = controller(MockBackend::new());
        assert!(controller.change_endpoint("  ").is_err());
        assert_eq!(factory.connects.load(Ordering::SeqCst), 1);
        assert!(controller.state().message.is_some());
    }

    #[tokio::test]
    async fn test_relogin_during_upload_keeps_single_flight() {
        let backend = MockBackend::new()
            .with_login(ann())
            .with_analysis(salad_response())
            .with_analysis_delay(Duration::from_millis(50));
        let (factory, controller) = controller(backend);
        controller.login("a@x.com", "p".to_string()).await.unwrap();

        let (first, second) = tokio::join!(controller.submit_photo(photo()), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            controller.logout().unwrap();
            controller.login("a@x.com", "p".to_string()).await.unwrap();
            assert!(!controller.can_submit());
            controller.submit_photo(photo()).await
        });

        assert!(first.is_ok());
        assert!(matches!(second, Err(ClientError::AnalysisInFlight)));
        assert_eq!(factory.backend.analyze_calls(), 1);
        assert!(controller.can_submit());
    }

    #[tokio::test]
    async fn test_analysis_finishing_after_logout_is_not_recorded() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let backend = MockBackend::new()
            .with_login(ann())
            .with_analysis(salad_response())
            .with_analysis_delay(Duration::from_millis(50));
        let (_factory, controller) = controller_with(store.clone(), backend);
        controller.login("a@x.com", "p".to_string()).await.unwrap();

        let (result, _) = tokio::join!(controller.submit_photo(photo()), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            controller.logout().unwrap();
        });

        assert!(result.is_ok());
        let state = controller.state();
        assert!(state.session.is_none());
        assert!(state.meals.is_empty());
        assert!(state.message.is_none());
        assert!(!state.uploading);
        assert_eq!(
            store.read(&StoreKey::MealHistory(ann().user_id)).unwrap(),
            None
        );
        assert!(controller.last_analysis().is_none());
    }

    #[test]
    fn test_failed_connect_keeps_previous_endpoint() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let (_factory, controller) = controller_with(store.clone(), MockBackend::new());
        let before = controller.endpoint();

        let result = controller.change_endpoint("https://broken.example.com");

        assert!(result.is_err());
        assert_eq!(controller.endpoint(), before);
        assert!(controller.state().message.is_some());
        assert_eq!(store.read(&StoreKey::EndpointOverride).unwrap(), None);
    }
}
