// ABOUTME: Transport to the Calorie Vision backend behind an async trait
// ABOUTME: Reqwest implementation maps HTTP outcomes onto the client error taxonomy

use async_trait::async_trait;
use bytes::Bytes;
use calvision_config::constants::{ANALYZE_PATH, HEALTH_PATH, LOGIN_PATH, MEALS_PATH, SIGNUP_PATH};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::api::{AnalysisResponse, ErrorBody, LoginRequest, MealsQuery, SignupRequest};
use crate::endpoint::EndpointConfig;
use crate::error::{ClientError, ClientResult};
use crate::settings::HttpSettings;
use crate::types::{MealRecord, User, UserId};

/// Photo submitted for analysis
#[derive(Clone)]
pub struct ImageUpload {
    pub bytes: Bytes,
    pub file_name: String,
    pub content_type: mime::Mime,
}

impl ImageUpload {
    /// Build an upload, guessing the content type from the file extension
    pub fn new(bytes: impl Into<Bytes>, file_name: impl Into<String>) -> Self {
        let file_name = file_name.into();
        let content_type = guess_image_mime(&file_name);
        Self {
            bytes: bytes.into(),
            file_name,
            content_type,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for ImageUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageUpload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

fn guess_image_mime(file_name: &str) -> mime::Mime {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension.as_deref() {
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("png") => mime::IMAGE_PNG,
        Some("gif") => mime::IMAGE_GIF,
        Some("webp") => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        Some("heic") => "image/heic".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Backend operations the client depends on
#[async_trait]
pub trait Backend: Send + Sync {
    /// Register an account. Never establishes a session by itself.
    async fn signup(&self, request: &SignupRequest) -> ClientResult<()>;

    /// Exchange credentials for the user identity
    async fn login(&self, request: &LoginRequest) -> ClientResult<User>;

    /// Upload a photo and receive its analysis
    async fn analyze(&self, user_id: &UserId, image: ImageUpload) -> ClientResult<AnalysisResponse>;

    /// Fetch the most recent meals, newest first
    async fn fetch_meals(&self, user_id: &UserId, limit: usize) -> ClientResult<Vec<MealRecord>>;

    /// Health probe; succeeds only on a 2xx response with a JSON body
    async fn health(&self) -> ClientResult<serde_json::Value>;
}

/// Builds a backend for a resolved endpoint
pub trait BackendFactory: Send + Sync {
    fn connect(&self, endpoint: &EndpointConfig) -> ClientResult<Arc<dyn Backend>>;
}

/// Reqwest-backed backend
#[derive(Clone)]
pub struct HttpBackend {
    http_client: Client,
    endpoint: EndpointConfig,
}

impl HttpBackend {
    pub fn new(endpoint: EndpointConfig, settings: &HttpSettings) -> ClientResult<Self> {
        let http_client = Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(settings.connect_timeout)
            .build()
            .map_err(|e| ClientError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &EndpointConfig {
        &self.endpoint
    }
}

/// Error detail from a failed auth response, or `fallback`
async fn auth_error_detail(response: Response, fallback: &str) -> String {
    let body = response.text().await.unwrap_or_default();
    ErrorBody::parse(&body)
        .detail_text()
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait]
impl Backend for HttpBackend {
    async fn signup(&self, request: &SignupRequest) -> ClientResult<()> {
        let response = self
            .http_client
            .post(self.endpoint.url(SIGNUP_PATH))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = auth_error_detail(response, "Failed to sign up").await;
            debug!("Signup rejected with {}: {}", status, detail);
            return Err(ClientError::auth(detail));
        }
        Ok(())
    }

    async fn login(&self, request: &LoginRequest) -> ClientResult<User> {
        let response = self
            .http_client
            .post(self.endpoint.url(LOGIN_PATH))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = auth_error_detail(response, "Login failed").await;
            debug!("Login rejected with {}: {}", status, detail);
            return Err(ClientError::auth(detail));
        }

        let body = response.text().await?;
        serde_json::from_str::<User>(&body)
            .map_err(|e| ClientError::auth(format!("Invalid login response: {}", e)))
    }

    async fn analyze(&self, user_id: &UserId, image: ImageUpload) -> ClientResult<AnalysisResponse> {
        let part = Part::stream(image.bytes)
            .file_name(image.file_name)
            .mime_str(image.content_type.as_ref())
            .map_err(|e| ClientError::analysis(format!("Invalid image type: {}", e)))?;
        let form = Form::new()
            .part("file", part)
            .text("user_id", user_id.as_str().to_string());

        let response = self
            .http_client
            .post(self.endpoint.url(ANALYZE_PATH))
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            debug!("Analysis rejected with {}", status);
            let detail = if body.trim().is_empty() {
                "Failed to analyze image".to_string()
            } else {
                body
            };
            return Err(ClientError::analysis(detail));
        }

        serde_json::from_str::<AnalysisResponse>(&body)
            .map_err(|e| ClientError::analysis(format!("Malformed analysis response: {}", e)))
    }

    async fn fetch_meals(&self, user_id: &UserId, limit: usize) -> ClientResult<Vec<MealRecord>> {
        let response = self
            .http_client
            .get(self.endpoint.url(MEALS_PATH))
            .query(&MealsQuery {
                user_id: user_id.as_str(),
                limit,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::api(format!(
                "History request failed: HTTP {}",
                status.as_u16()
            )));
        }

        let body = response.text().await?;
        serde_json::from_str::<Vec<MealRecord>>(&body)
            .map_err(|e| ClientError::api(format!("Malformed history response: {}", e)))
    }

    async fn health(&self) -> ClientResult<serde_json::Value> {
        let response = self
            .http_client
            .get(self.endpoint.url(HEALTH_PATH))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::unreachable(format!("HTTP {}", status.as_u16())));
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|_| ClientError::unreachable(format!("HTTP {} with invalid body", status.as_u16())))
    }
}

/// Factory producing `HttpBackend`s with shared timeouts
#[derive(Debug, Clone, Default)]
pub struct HttpBackendFactory {
    settings: HttpSettings,
}

impl HttpBackendFactory {
    pub fn new(settings: HttpSettings) -> Self {
        Self { settings }
    }
}

impl BackendFactory for HttpBackendFactory {
    fn connect(&self, endpoint: &EndpointConfig) -> ClientResult<Arc<dyn Backend>> {
        Ok(Arc::new(HttpBackend::new(endpoint.clone(), &self.settings)?))
    }
}
