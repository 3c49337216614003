//! API request and response models for the Calorie Vision backend

use serde::{Deserialize, Serialize};

use crate::types::{null_as_default, Macros, MealRecord};

/// Signup request
#[derive(Debug, Serialize)]
pub struct SignupRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Login request
#[derive(Debug, Serialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Analysis response
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisResponse {
    pub meal_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub dish_name: String,
    #[serde(default)]
    pub calories: Option<f64>,
    #[serde(default)]
    pub macros: Option<Macros>,
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
}

impl From<AnalysisResponse> for MealRecord {
    fn from(response: AnalysisResponse) -> Self {
        Self {
            id: response.meal_id,
            dish_name: response.dish_name,
            calories: response.calories,
            macros: response.macros,
            ingredients: response.ingredients,
        }
    }
}

/// History query parameters
#[derive(Debug, Serialize)]
pub struct MealsQuery<'a> {
    pub user_id: &'a str,
    pub limit: usize,
}

/// Error body returned by the auth endpoints
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
}

impl ErrorBody {
    /// Parse an error body, tolerating non-JSON payloads
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    /// Server-provided detail, stringified when it is not plain text
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) if text.trim().is_empty() => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}
