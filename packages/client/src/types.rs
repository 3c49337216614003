// ABOUTME: Domain model shared by the session store, history cache and orchestrator
// ABOUTME: User identity and immutable meal records in their persisted shape

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque backend-issued user identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Authenticated user as returned by the login endpoint.
///
/// Only `user_id` is required; extra fields in the login response are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: UserId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Treat an explicit JSON `null` like a missing key
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Macronutrient breakdown in grams. The backend may leave any value out.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Macros {
    #[serde(default)]
    pub carbs_g: Option<f64>,
    #[serde(default)]
    pub protein_g: Option<f64>,
    #[serde(default)]
    pub fat_g: Option<f64>,
}

/// A single analyzed meal. Records are never mutated once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "MealRecordWire")]
pub struct MealRecord {
    pub id: String,
    pub dish_name: String,
    pub calories: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macros: Option<Macros>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>,
}

/// Incoming shape of a meal. History rows carry `_id`, analysis results carry
/// `meal_id`, persisted snapshots carry `id`; the first non-empty one wins.
#[derive(Deserialize)]
struct MealRecordWire {
    #[serde(default)]
    id: Option<String>,
    #[serde(default, rename = "_id")]
    server_id: Option<String>,
    #[serde(default)]
    meal_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    dish_name: String,
    #[serde(default)]
    calories: Option<f64>,
    #[serde(default)]
    macros: Option<Macros>,
    #[serde(default)]
    ingredients: Option<Vec<String>>,
}

impl From<MealRecordWire> for MealRecord {
    fn from(wire: MealRecordWire) -> Self {
        let id = [wire.id, wire.server_id, wire.meal_id]
            .into_iter()
            .flatten()
            .find(|id| !id.trim().is_empty())
            .unwrap_or_default();

        Self {
            id,
            dish_name: wire.dish_name,
            calories: wire.calories,
            macros: wire.macros,
            ingredients: wire.ingredients,
        }
    }
}

impl MealRecord {
    /// Dish name, or "Meal" when the backend left it blank
    pub fn display_name(&self) -> &str {
        if self.dish_name.trim().is_empty() {
            "Meal"
        } else {
            &self.dish_name
        }
    }

    pub fn rounded_calories(&self) -> Option<i64> {
        self.calories.map(|kcal| kcal.round() as i64)
    }

    /// Rounded calories, or "—" when unknown
    pub fn calories_label(&self) -> String {
        self.rounded_calories()
            .map(|kcal| kcal.to_string())
            .unwrap_or_else(|| "—".to_string())
    }

    /// Comma-separated ingredient list, empty when absent
    pub fn ingredient_summary(&self) -> String {
        self.ingredients
            .as_ref()
            .map(|items| items.join(", "))
            .unwrap_or_default()
    }
}

/// Most-recent-first list of a user's meals
pub type MealHistory = Vec<MealRecord>;
