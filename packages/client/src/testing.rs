// ABOUTME: In-crate test doubles for the backend trait
// ABOUTME: Records call counts so tests can assert on network traffic

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::api::{AnalysisResponse, LoginRequest, SignupRequest};
use crate::backend::{Backend, ImageUpload};
use crate::error::{ClientError, ClientResult};
use crate::types::{Macros, MealRecord, User, UserId};

pub fn ann() -> User {
    User {
        user_id: UserId::new("u-ann"),
        name: "Ann".to_string(),
        email: "a@x.com".to_string(),
    }
}

pub fn meal(id: &str, dish_name: &str) -> MealRecord {
    MealRecord {
        id: id.to_string(),
        dish_name: dish_name.to_string(),
        calories: Some(100.0),
        macros: None,
        ingredients: None,
    }
}

pub fn salad_response() -> AnalysisResponse {
    AnalysisResponse {
        meal_id: "m1".to_string(),
        dish_name: "Salad".to_string(),
        calories: Some(250.0),
        macros: Some(Macros {
            carbs_g: Some(20.0),
            protein_g: Some(5.0),
            fat_g: Some(10.0),
        }),
        ingredients: Some(vec!["lettuce".to_string(), "tomato".to_string()]),
    }
}

#[derive(Default)]
struct Calls {
    signup: AtomicUsize,
    login: AtomicUsize,
    analyze: AtomicUsize,
    meals: AtomicUsize,
    health: AtomicUsize,
}

pub struct MockBackend {
    login: Result<User, String>,
    signup_error: Option<String>,
    analysis: Result<AnalysisResponse, String>,
    analysis_delay: Option<Duration>,
    meals: Option<Vec<MealRecord>>,
    meals_delay: Option<Duration>,
    health_ok: bool,
    health_delay: Option<Duration>,
    calls: Calls,
    last_meals_limit: Mutex<Option<usize>>,
    last_analyzed_user: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            login: Err("Login failed".to_string()),
            signup_error: None,
            analysis: Err("Failed to analyze image".to_string()),
            analysis_delay: None,
            meals: Some(Vec::new()),
            meals_delay: None,
            health_ok: true,
            health_delay: None,
            calls: Calls::default(),
            last_meals_limit: Mutex::new(None),
            last_analyzed_user: Mutex::new(None),
        }
    }

    pub fn with_login(mut self, user: User) -> Self {
        self.login = Ok(user);
        self
    }

    pub fn failing_login(mut self, detail: &str) -> Self {
        self.login = Err(detail.to_string());
        self
    }

    pub fn failing_signup(mut self, detail: &str) -> Self {
        self.signup_error = Some(detail.to_string());
        self
    }

    pub fn with_analysis(mut self, response: AnalysisResponse) -> Self {
        self.analysis = Ok(response);
        self
    }

    pub fn failing_analysis(mut self, detail: &str) -> Self {
        self.analysis = Err(detail.to_string());
        self
    }

    pub fn with_analysis_delay(mut self, delay: Duration) -> Self {
        self.analysis_delay = Some(delay);
        self
    }

    pub fn with_meals(mut self, meals: Vec<MealRecord>) -> Self {
        self.meals = Some(meals);
        self
    }

    pub fn with_meals_delay(mut self, delay: Duration) -> Self {
        self.meals_delay = Some(delay);
        self
    }

    pub fn failing_meals(mut self) -> Self {
        self.meals = None;
        self
    }

    pub fn failing_health(mut self) -> Self {
        self.health_ok = false;
        self
    }

    pub fn with_health_delay(mut self, delay: Duration) -> Self {
        self.health_delay = Some(delay);
        self
    }

    pub fn signup_calls(&self) -> usize {
        self.calls.signup.load(Ordering::SeqCst)
    }

    pub fn login_calls(&self) -> usize {
        self.calls.login.load(Ordering::SeqCst)
    }

    pub fn analyze_calls(&self) -> usize {
        self.calls.analyze.load(Ordering::SeqCst)
    }

    pub fn meals_calls(&self) -> usize {
        self.calls.meals.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        self.signup_calls()
            + self.login_calls()
            + self.analyze_calls()
            + self.meals_calls()
            + self.calls.health.load(Ordering::SeqCst)
    }

    pub fn last_meals_limit(&self) -> Option<usize> {
        *self.last_meals_limit.lock().unwrap()
    }

    pub fn last_analyzed_user(&self) -> Option<String> {
        self.last_analyzed_user.lock().unwrap().clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn signup(&self, _request: &SignupRequest) -> ClientResult<()> {
        self.calls.signup.fetch_add(1, Ordering::SeqCst);
        match &self.signup_error {
            Some(detail) => Err(ClientError::auth(detail.clone())),
            None => Ok(()),
        }
    }

    async fn login(&self, _request: &LoginRequest) -> ClientResult<User> {
        self.calls.login.fetch_add(1, Ordering::SeqCst);
        self.login.clone().map_err(ClientError::auth)
    }

    async fn analyze(&self, user_id: &UserId, _image: ImageUpload) -> ClientResult<AnalysisResponse> {
        self.calls.analyze.fetch_add(1, Ordering::SeqCst);
        *self.last_analyzed_user.lock().unwrap() = Some(user_id.to_string());
        if let Some(delay) = self.analysis_delay {
            tokio::time::sleep(delay).await;
        }
        self.analysis.clone().map_err(ClientError::analysis)
    }

    async fn fetch_meals(&self, _user_id: &UserId, limit: usize) -> ClientResult<Vec<MealRecord>> {
        self.calls.meals.fetch_add(1, Ordering::SeqCst);
        *self.last_meals_limit.lock().unwrap() = Some(limit);
        if let Some(delay) = self.meals_delay {
            tokio::time::sleep(delay).await;
        }
        self.meals
            .clone()
            .ok_or_else(|| ClientError::unreachable("connection failed"))
    }

    async fn health(&self) -> ClientResult<serde_json::Value> {
        self.calls.health.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.health_delay {
            tokio::time::sleep(delay).await;
        }
        if self.health_ok {
            Ok(serde_json::json!({ "status": "ok" }))
        } else {
            Err(ClientError::unreachable("connection failed"))
        }
    }
}
