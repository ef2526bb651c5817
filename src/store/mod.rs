pub mod data_loader;
pub mod memory;

pub use data_loader::{load_food_catalog, load_food_nutrition, load_recommended_nutrition, load_user_allergies};
pub use memory::InMemoryStore;

use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt;

use crate::catalog::{AllergyId, Food, FoodId, FoodNutrition, FoodRole, Meal, MealId, MealNutrition, UserId};
use crate::nutrition::Nutrition;

#[derive(Debug)]
pub enum StoreError {
    Io(std::io::Error),
    Json(serde_json::Error),
    Binary(bincode::Error),
    /// An update named a meal id the store does not hold.
    UnknownMeal(MealId),
    /// Any other backend failure (connectivity, rejected query, ...).
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(err) => write!(f, "Storage I/O error: {}", err),
            StoreError::Json(err) => write!(f, "Snapshot JSON error: {}", err),
            StoreError::Binary(err) => write!(f, "Snapshot binary error: {}", err),
            StoreError::UnknownMeal(meal_id) => write!(f, "No meal with id {}", meal_id),
            StoreError::Backend(message) => write!(f, "Storage backend error: {}", message),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Io(err) => Some(err),
            StoreError::Json(err) => Some(err),
            StoreError::Binary(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Json(err)
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Binary(err)
    }
}

/// Food, nutrition, meal and user-allergy records as the planner sees them.
///
/// Reads take `&self`, writes take `&mut self`. Implementations are not
/// required to enforce user+date uniqueness of meals.
pub trait MealStore {
    fn all_foods(&self) -> Result<Vec<Food>, StoreError>;

    fn foods_matching(&self, keep: &dyn Fn(&Food) -> bool) -> Result<Vec<Food>, StoreError> {
        Ok(self.all_foods()?.into_iter().filter(|food| keep(food)).collect())
    }

    fn foods_by_role(&self, role: FoodRole) -> Result<Vec<Food>, StoreError> {
        self.foods_matching(&|food: &Food| food.role == role)
    }

    /// Non-empty embeddings for the requested ids; foods without a usable
    /// vector are simply absent from the map.
    fn embeddings_for(&self, food_ids: &HashSet<FoodId>) -> Result<HashMap<FoodId, Vec<f32>>, StoreError>;

    fn nutrition_for(&self, food_id: FoodId) -> Result<Option<Nutrition>, StoreError>;

    fn upsert_food_nutrition(&mut self, row: FoodNutrition) -> Result<(), StoreError>;

    /// Inserts when `meal.id` is `None`, otherwise updates in place.
    fn upsert_meal(&mut self, meal: &Meal) -> Result<MealId, StoreError>;

    fn meal_by_user_and_date(&self, user_id: UserId, date: NaiveDate) -> Result<Option<Meal>, StoreError>;

    /// Meals dated within `start..=end`, ordered by date.
    fn meals_between(&self, user_id: UserId, start: NaiveDate, end: NaiveDate) -> Result<Vec<Meal>, StoreError>;

    /// Removes every meal (and its nutrition row) for the pair.
    fn delete_meal_by_user_and_date(&mut self, user_id: UserId, date: NaiveDate) -> Result<bool, StoreError>;

    fn upsert_meal_nutrition(&mut self, row: &MealNutrition) -> Result<(), StoreError>;

    fn meal_nutrition(&self, meal_id: MealId) -> Result<Option<MealNutrition>, StoreError>;

    fn user_allergy_ids(&self, user_id: UserId) -> Result<Vec<AllergyId>, StoreError>;

    fn recommended_nutrition(&self, age: u32) -> Result<Option<Nutrition>, StoreError>;
}

/// Serde adapter storing an `f32` vector as base64 of its little-endian bytes.
pub mod base64_f32 {
    use base64::{engine::general_purpose, Engine as _};
    use bytemuck::cast_slice;
    use log::warn;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vec: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: &[u8] = cast_slice(vec);
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    /// An undecodable string yields an empty vector, which callers treat as a missing embedding.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = match general_purpose::STANDARD.decode(&s) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Ignoring undecodable embedding: {}", e);
                return Ok(Vec::new());
            }
        };
        if bytes.len() % 4 != 0 {
            warn!("Ignoring embedding of {} bytes, not a multiple of 4", bytes.len());
            return Ok(Vec::new());
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}
