// ABOUTME: Signup and login sequence producing a persisted session
// ABOUTME: Signup always chains into a login; login primes the meal history cache

use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::api::{LoginRequest, SignupRequest};
use crate::backend::Backend;
use crate::error::{ClientError, ClientResult};
use crate::history::{MealHistoryCache, RefreshOutcome};
use crate::session::SessionStore;
use crate::types::{MealHistory, User};

/// Email and password for a login attempt
#[derive(Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Session produced by a successful login
#[derive(Debug)]
pub struct AuthOutcome {
    pub user: User,
    /// History after priming: cached snapshot, replaced by server truth when
    /// the refresh succeeded
    pub meals: MealHistory,
    pub refresh: RefreshOutcome,
}

pub struct AuthFlow {
    sessions: Arc<SessionStore>,
    history: Arc<MealHistoryCache>,
}

impl AuthFlow {
    pub fn new(sessions: Arc<SessionStore>, history: Arc<MealHistoryCache>) -> Self {
        Self { sessions, history }
    }

    /// Register, then log in with the same credentials
    pub async fn signup(
        &self,
        backend: &dyn Backend,
        name: &str,
        credentials: Credentials,
    ) -> ClientResult<AuthOutcome> {
        let request = SignupRequest {
            name: name.to_string(),
            email: credentials.email.clone(),
            password: credentials.password.clone(),
        };
        backend.signup(&request).await?;
        info!("Signed up {}", credentials.email);

        self.login(backend, credentials).await
    }

    /// Log in, persist the session and prime the history cache
    pub async fn login(
        &self,
        backend: &dyn Backend,
        credentials: Credentials,
    ) -> ClientResult<AuthOutcome> {
        let request = LoginRequest {
            email: credentials.email,
            password: credentials.password,
        };
        let user = backend.login(&request).await?;
        if user.user_id.is_empty() {
            return Err(ClientError::auth("Login response did not include a user id"));
        }

        if let Err(e) = self.sessions.save(&user) {
            warn!("Session for {} will not survive a restart: {}", user.user_id, e);
        }
        info!("Logged in as {}", user.user_id);

        let cached = self.history.load_cached(&user.user_id);
        debug!("Showing {} cached meals while refreshing", cached.len());
        let refresh = self.history.refresh(backend, &user.user_id).await;
        let meals = self.history.load_cached(&user.user_id);

        Ok(AuthOutcome {
            user,
            meals,
            refresh,
        })
    }

    /// Previously persisted session, if any
    pub fn restore(&self) -> Option<User> {
        self.sessions.load()
    }

    /// Drop the session and the user's cached history
    pub fn logout(&self, user: &User) -> ClientResult<()> {
        self.history.clear(&user.user_id);
        self.sessions.clear()?;
        info!("Logged out {}", user.user_id);
        Ok(())
    }
}
