use std::collections::hash_map::Entry;
use std::collections::HashMap;

use crate::catalog::FoodId;
use crate::nutrition::{get_nutrition, Nutrition};
use crate::search::EmbeddingLookup;
use crate::store::{MealStore, StoreError};

/// Calculates how far a combination's summed nutrition lies from a target.
///
/// The distance is the sum of absolute differences over the five tracked
/// nutrients. No field is weighted, so calories and sodium dominate the
/// smaller macronutrient terms.
///
/// # Arguments
/// * `total`: The undivided nutrition sum of the foods in a combination.
/// * `target`: The caller's target nutrition.
///
/// # Returns
/// The distance as an f64; 0.0 for a perfect match.
pub fn nutrition_distance(total: &Nutrition, target: &Nutrition) -> f64 {
    total
        .fields()
        .iter()
        .zip(target.fields().iter())
        .map(|(t, g)| (t - g).abs())
        .sum()
}

/// Per-food nutrition loaded once for every food a search may combine.
#[derive(Debug, Default, Clone)]
pub struct NutritionTable {
    rows: HashMap<FoodId, Nutrition>,
}

impl NutritionTable {
    pub fn load<S, I>(store: &S, food_ids: I) -> Result<Self, StoreError>
    where
        S: MealStore + ?Sized,
        I: IntoIterator<Item = FoodId>,
    {
        let mut rows = HashMap::new();
        for food_id in food_ids {
            if let Entry::Vacant(entry) = rows.entry(food_id) {
                entry.insert(get_nutrition(store, food_id)?);
            }
        }
        Ok(NutritionTable { rows })
    }

    pub fn get(&self, food_id: FoodId) -> Nutrition {
        self.rows.get(&food_id).copied().unwrap_or_default()
    }

    pub fn total(&self, food_ids: &[FoodId]) -> Nutrition {
        food_ids.iter().map(|&id| self.get(id)).sum()
    }
}

/// Score of a full-day combination: novelty penalty of each food against
/// the previous meal plus the nutrition distance. Lower is better.
pub fn combo_score(
    food_ids: &[FoodId],
    nutrition: &NutritionTable,
    embeddings: &EmbeddingLookup,
    previous: &[&[f32]],
    target: &Nutrition,
) -> f64 {
    let similarity: f64 = food_ids
        .iter()
        .map(|&id| embeddings.novelty_penalty(id, previous))
        .sum();
    similarity + nutrition_distance(&nutrition.total(food_ids), target)
}
