use chrono::NaiveDate;
use log::{debug, error, info, warn};
use rand::Rng;
use serde::Serialize;

use super::composer::{draw_combo, RoleBuckets};
use super::nutri_eval::{combo_score, nutrition_distance, NutritionTable};
use super::MealPlanner;
use crate::catalog::{FoodId, Meal, MealId, MealNutrition, MealSlot, SlotIds, UserId};
use crate::nutrition::{save_meal_total_nutrition, Nutrition};
use crate::search::EmbeddingLookup;
use crate::store::{MealStore, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshedMeal {
    pub meal_id: MealId,
    pub nutrition: MealNutrition,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshedItem {
    pub meal_id: MealId,
    pub food_id: FoodId,
    pub nutrition: MealNutrition,
}

struct Best<T> {
    score: f64,
    choice: T,
}

impl<T> Best<T> {
    // Ties keep the earlier choice.
    fn offer(best: &mut Option<Best<T>>, score: f64, choice: T) {
        if best.as_ref().map_or(true, |b| score < b.score) {
            *best = Some(Best { score, choice });
        }
    }
}

impl<S: MealStore, R: Rng> MealPlanner<S, R> {
    /// Searches `refresh_trials` random combinations for the one closest to
    /// `target` and least similar to the previous meal, then stores it as a
    /// new meal.
    ///
    /// Without `prev_food_ids`, the meal already stored for the day (if any)
    /// is the one to move away from. `Ok(None)` means no trial produced a
    /// single food.
    pub fn try_refresh_daily_meal(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
        target: &Nutrition,
        prev_food_ids: Option<&[FoodId]>,
    ) -> Result<Option<RefreshedMeal>, StoreError> {
        let foods = self.filter_foods_by_allergy(Some(user_id))?;
        let buckets = RoleBuckets::from_foods(&foods);

        let previous: Vec<FoodId> = match prev_food_ids {
            Some(ids) => ids.to_vec(),
            None => self
                .store
                .meal_by_user_and_date(user_id, date)?
                .map(|meal| meal.food_ids())
                .unwrap_or_default(),
        };
        debug!("Refreshing day {} for user {} away from {:?}", date, user_id, previous);

        let embeddings = EmbeddingLookup::fetch(&self.store, previous.iter().copied().chain(buckets.candidate_ids()))?;
        let previous_vectors = embeddings.vectors_for(&previous);
        let nutrition = NutritionTable::load(&self.store, buckets.candidate_ids())?;

        let mut best: Option<Best<SlotIds>> = None;
        for _ in 0..self.config.refresh_trials {
            let slots = draw_combo(&buckets, &mut self.rng);
            let food_ids: Vec<FoodId> = slots.iter().flatten().copied().collect();
            if food_ids.is_empty() {
                continue;
            }
            let score = combo_score(&food_ids, &nutrition, &embeddings, &previous_vectors, target);
            Best::offer(&mut best, score, slots);
        }

        let best = match best {
            Some(best) => best,
            None => {
                info!("No candidate combination for user {} on {}", user_id, date);
                return Ok(None);
            }
        };
        debug!("Best combination {:?} scored {:.4}", best.choice, best.score);

        let meal = Meal::from_slots(user_id, date, best.choice);
        let meal_id = self.store.upsert_meal(&meal)?;
        let saved = save_meal_total_nutrition(&mut self.store, meal_id, &meal.food_ids(), &self.config)?;
        info!("Refreshed meal {} for user {} on {}", meal_id, user_id, date);
        Ok(Some(RefreshedMeal { meal_id, nutrition: saved }))
    }

    pub fn refresh_daily_meal(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
        target: &Nutrition,
        prev_food_ids: Option<&[FoodId]>,
    ) -> Option<RefreshedMeal> {
        self.try_refresh_daily_meal(user_id, date, target, prev_food_ids)
            .unwrap_or_else(|e| {
                error!("Failed to refresh meal for user {} on {}: {}", user_id, date, e);
                None
            })
    }

    /// Swaps the food in one slot of the stored meal for the candidate that
    /// best fits `target`, scoring every allergy-safe food of the slot's role
    /// other than the current one. The meal keeps its id.
    pub fn try_refresh_meal_item(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
        item_type: &str,
        target: &Nutrition,
    ) -> Result<Option<RefreshedItem>, StoreError> {
        let mut meal = match self.store.meal_by_user_and_date(user_id, date)? {
            Some(meal) => meal,
            None => {
                info!("No meal for user {} on {}; nothing to refresh", user_id, date);
                return Ok(None);
            }
        };
        let meal_id = match meal.id {
            Some(id) => id,
            None => return Err(StoreError::Backend(format!("stored meal for {} has no id", date))),
        };
        let slot = match MealSlot::from_item_type(item_type) {
            Some(slot) => slot,
            None => {
                warn!("Unknown item type '{}'", item_type);
                return Ok(None);
            }
        };

        let current = meal.slot(slot);
        let candidates: Vec<FoodId> = self
            .filter_foods_by_allergy(Some(user_id))?
            .into_iter()
            .filter(|food| food.role == slot.role() && Some(food.id) != current)
            .map(|food| food.id)
            .collect();
        if candidates.is_empty() {
            info!("No alternative {} for meal {}", slot.item_type(), meal_id);
            return Ok(None);
        }

        let embeddings = EmbeddingLookup::fetch(&self.store, candidates.iter().copied().chain(current))?;
        let nutrition = NutritionTable::load(&self.store, meal.food_ids().into_iter().chain(candidates.iter().copied()))?;

        let mut best: Option<Best<FoodId>> = None;
        for &candidate in &candidates {
            let mut trial = meal.clone();
            trial.set_slot(slot, Some(candidate));
            let diff = nutrition_distance(&nutrition.total(&trial.food_ids()), target);
            let score = diff + embeddings.similarity(Some(candidate), current);
            Best::offer(&mut best, score, candidate);
        }
        let food_id = match best {
            Some(best) => best.choice,
            None => return Ok(None),
        };

        meal.set_slot(slot, Some(food_id));
        self.store.upsert_meal(&meal)?;
        let saved = save_meal_total_nutrition(&mut self.store, meal_id, &meal.food_ids(), &self.config)?;
        info!(
            "Meal {}: {} changed from {:?} to {}",
            meal_id,
            slot.item_type(),
            current,
            food_id
        );
        Ok(Some(RefreshedItem { meal_id, food_id, nutrition: saved }))
    }

    pub fn refresh_meal_item(
        &mut self,
        user_id: UserId,
        date: NaiveDate,
        item_type: &str,
        target: &Nutrition,
    ) -> Option<RefreshedItem> {
        self.try_refresh_meal_item(user_id, date, item_type, target)
            .unwrap_or_else(|e| {
                error!("Failed to refresh {} for user {} on {}: {}", item_type, user_id, date, e);
                None
            })
    }
}
