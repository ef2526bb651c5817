use log::warn;
use std::collections::HashMap;

use crate::nutrition::Nutrition;
use crate::store::{MealStore, StoreError};

/// Explicit per-nutrient target values. Unset fields fall back to the
/// recommended intake, or zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TargetOverrides {
    pub calories: Option<f64>,
    pub carbohydrate: Option<f64>,
    pub protein: Option<f64>,
    pub fat: Option<f64>,
    pub sodium: Option<f64>,
}

impl TargetOverrides {
    pub fn is_empty(&self) -> bool {
        *self == TargetOverrides::default()
    }

    fn apply(&self, base: Nutrition) -> Nutrition {
        Nutrition {
            calories: self.calories.unwrap_or(base.calories),
            carbohydrate: self.carbohydrate.unwrap_or(base.carbohydrate),
            protein: self.protein.unwrap_or(base.protein),
            fat: self.fat.unwrap_or(base.fat),
            sodium: self.sodium.unwrap_or(base.sodium),
        }
    }
}

/// Builds a target from a loose name → value map, as a request body would
/// carry it. Missing or unrecognised keys are ignored; missing fields are 0.
pub fn target_from_map(values: &HashMap<String, f64>) -> Nutrition {
    let get = |key: &str| values.get(key).copied().unwrap_or(0.0);
    Nutrition::new(get("calories"), get("carbohydrate"), get("protein"), get("fat"), get("sodium"))
}

/// Resolves the refresh target: the recommended intake for `age` when one
/// is given and known, with explicit overrides winning field by field.
pub fn resolve_target<S: MealStore + ?Sized>(
    store: &S,
    age: Option<u32>,
    overrides: &TargetOverrides,
) -> Result<Nutrition, StoreError> {
    let base = match age {
        Some(age) => store.recommended_nutrition(age)?.unwrap_or_else(|| {
            warn!("No recommended intake for age {}; unset target fields are 0", age);
            Nutrition::default()
        }),
        None => Nutrition::default(),
    };
    Ok(overrides.apply(base))
}
