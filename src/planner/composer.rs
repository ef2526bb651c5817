use chrono::{Duration, NaiveDate};
use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use super::MealPlanner;
use crate::catalog::{Food, FoodId, FoodRole, Meal, MealId, MealSlot, SlotIds, UserId};
use crate::nutrition::save_meal_total_nutrition;
use crate::store::{MealStore, StoreError};

const DAYS_PER_WEEK: u32 = 7;
const DAYS_PER_MONTH: u32 = 30;

/// Candidate food ids partitioned by role. Both side-dish slots draw from
/// the one `SideDish` bucket.
#[derive(Debug, Default, Clone)]
pub struct RoleBuckets {
    buckets: BTreeMap<FoodRole, Vec<FoodId>>,
}

impl RoleBuckets {
    pub fn from_foods(foods: &[Food]) -> Self {
        let mut buckets: BTreeMap<FoodRole, Vec<FoodId>> = BTreeMap::new();
        for food in foods {
            buckets.entry(food.role).or_default().push(food.id);
        }
        RoleBuckets { buckets }
    }

    pub fn get(&self, role: FoodRole) -> &[FoodId] {
        self.buckets.get(&role).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn candidate_ids(&self) -> impl Iterator<Item = FoodId> + '_ {
        self.buckets.values().flatten().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.values().all(Vec::is_empty)
    }
}

/// Draws one random combination: a food per role, and up to two distinct
/// side dishes. An empty bucket leaves its slot(s) unfilled.
pub fn draw_combo<R: Rng + ?Sized>(buckets: &RoleBuckets, rng: &mut R) -> SlotIds {
    let rice = buckets.get(FoodRole::Rice).choose(rng).copied();
    let soup = buckets.get(FoodRole::Soup).choose(rng).copied();
    let sides: Vec<FoodId> = buckets.get(FoodRole::SideDish).choose_multiple(rng, 2).copied().collect();
    let main_dish = buckets.get(FoodRole::MainDish).choose(rng).copied();
    let dessert = buckets.get(FoodRole::Dessert).choose(rng).copied();
    [rice, soup, sides.first().copied(), sides.get(1).copied(), main_dish, dessert]
}

impl<S: MealStore, R: Rng> MealPlanner<S, R> {
    /// Composes and stores a random allergy-safe meal for the day.
    pub fn try_generate_daily_meal(&mut self, user_id: UserId, date: NaiveDate) -> Result<MealId, StoreError> {
        let foods = self.filter_foods_by_allergy(Some(user_id))?;
        let buckets = RoleBuckets::from_foods(&foods);
        let slots = draw_combo(&buckets, &mut self.rng);
        for (slot, food_id) in MealSlot::ALL.iter().zip(slots.iter()) {
            debug!("  {} -> {:?}", slot.item_type(), food_id);
        }

        let meal = Meal::from_slots(user_id, date, slots);
        let meal_id = self.store.upsert_meal(&meal)?;
        save_meal_total_nutrition(&mut self.store, meal_id, &meal.food_ids(), &self.config)?;
        info!("Created meal {} for user {} on {}", meal_id, user_id, date);
        Ok(meal_id)
    }

    pub fn generate_daily_meal(&mut self, user_id: UserId, date: NaiveDate) -> Option<MealId> {
        match self.try_generate_daily_meal(user_id, date) {
            Ok(meal_id) => Some(meal_id),
            Err(e) => {
                error!("Failed to generate meal for user {} on {}: {}", user_id, date, e);
                None
            }
        }
    }

    /// Replaces whatever is stored for the day with a freshly drawn meal.
    pub fn try_regenerate_daily_meal(&mut self, user_id: UserId, date: NaiveDate) -> Result<MealId, StoreError> {
        if self.store.delete_meal_by_user_and_date(user_id, date)? {
            debug!("Removed existing meal(s) for user {} on {}", user_id, date);
        }
        self.try_generate_daily_meal(user_id, date)
    }

    pub fn regenerate_daily_meal(&mut self, user_id: UserId, date: NaiveDate) -> Option<MealId> {
        match self.try_regenerate_daily_meal(user_id, date) {
            Ok(meal_id) => Some(meal_id),
            Err(e) => {
                error!("Failed to regenerate meal for user {} on {}: {}", user_id, date, e);
                None
            }
        }
    }

    /// Generates meals for the 7 days starting at `start`; returns how many succeeded.
    pub fn generate_weekly_meal(&mut self, user_id: UserId, start: NaiveDate) -> usize {
        self.generate_days(user_id, start, DAYS_PER_WEEK)
    }

    /// Generates meals for the 30 days starting at `start`; returns how many succeeded.
    pub fn generate_monthly_meal(&mut self, user_id: UserId, start: NaiveDate) -> usize {
        self.generate_days(user_id, start, DAYS_PER_MONTH)
    }

    // A failed day is logged and skipped; the remaining days still run.
    fn generate_days(&mut self, user_id: UserId, start: NaiveDate, days: u32) -> usize {
        let mut created = 0;
        for offset in 0..days {
            let date = start + Duration::days(i64::from(offset));
            match self.generate_daily_meal(user_id, date) {
                Some(meal_id) => {
                    created += 1;
                    info!("Day {}/{} ({}): meal {} created", offset + 1, days, date, meal_id);
                }
                None => warn!("Day {}/{} ({}): meal generation failed", offset + 1, days, date),
            }
        }
        info!("Generated {}/{} meals for user {} from {}", created, days, user_id, start);
        created
    }
}
