use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

use crate::catalog::{FoodId, MealId, MealNutrition};
use crate::config::PlannerConfig;
use crate::store::{MealStore, StoreError};

/// The five tracked nutrients of a food, a combo, or a target.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct Nutrition {
    pub calories: f64,
    pub carbohydrate: f64,
    pub protein: f64,
    pub fat: f64,
    pub sodium: f64,
}

impl Nutrition {
    pub fn new(calories: f64, carbohydrate: f64, protein: f64, fat: f64, sodium: f64) -> Self {
        Nutrition { calories, carbohydrate, protein, fat, sodium }
    }

    pub fn fields(&self) -> [f64; 5] {
        [self.calories, self.carbohydrate, self.protein, self.fat, self.sodium]
    }

    pub fn divided_by(&self, divisor: f64) -> Nutrition {
        let mut out = *self;
        macro_rules! divide {
            ($($field:ident),*) => { $( out.$field /= divisor; )* };
        }
        divide!(calories, carbohydrate, protein, fat, sodium);
        out
    }

    pub fn rounded(&self, decimals: u32) -> Nutrition {
        let mut out = *self;
        macro_rules! round {
            ($($field:ident),*) => { $( out.$field = round_to(out.$field, decimals); )* };
        }
        round!(calories, carbohydrate, protein, fat, sodium);
        out
    }
}

impl AddAssign for Nutrition {
    fn add_assign(&mut self, other: Nutrition) {
        macro_rules! add_field {
            ($($field:ident),*) => { $( self.$field += other.$field; )* };
        }
        add_field!(calories, carbohydrate, protein, fat, sodium);
    }
}

impl Add for Nutrition {
    type Output = Nutrition;

    fn add(mut self, other: Nutrition) -> Nutrition {
        self += other;
        self
    }
}

impl std::iter::Sum for Nutrition {
    fn sum<I: Iterator<Item = Nutrition>>(iter: I) -> Nutrition {
        iter.fold(Nutrition::default(), Add::add)
    }
}

pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

/// Nutrition of one food; a food with no recorded row contributes zero.
pub fn get_nutrition<S: MealStore + ?Sized>(store: &S, food_id: FoodId) -> Result<Nutrition, StoreError> {
    Ok(store.nutrition_for(food_id)?.unwrap_or_default())
}

pub fn sum_nutrition<S: MealStore + ?Sized>(store: &S, food_ids: &[FoodId]) -> Result<Nutrition, StoreError> {
    let mut total = Nutrition::default();
    for &food_id in food_ids {
        let n = get_nutrition(store, food_id)?;
        debug!(
            "  - food_id={} | calories={} carbohydrate={} protein={} fat={} sodium={}",
            food_id, n.calories, n.carbohydrate, n.protein, n.fat, n.sodium
        );
        total += n;
    }
    Ok(total)
}

/// Sums the foods' nutrition, takes one meal's share of it and upserts the
/// result as the meal's `MealNutrition` row.
pub fn save_meal_total_nutrition<S: MealStore + ?Sized>(
    store: &mut S,
    meal_id: MealId,
    food_ids: &[FoodId],
    config: &PlannerConfig,
) -> Result<MealNutrition, StoreError> {
    let totals = sum_nutrition(&*store, food_ids)?
        .divided_by(config.meals_per_day)
        .rounded(config.nutrition_decimals);
    let meal_nutrition = MealNutrition { meal_id, totals };
    store.upsert_meal_nutrition(&meal_nutrition)?;

    info!(
        "Saved nutrition for meal_id={}: calories={} carbohydrate={} protein={} fat={} sodium={}",
        meal_id, totals.calories, totals.carbohydrate, totals.protein, totals.fat, totals.sodium
    );
    Ok(meal_nutrition)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FoodNutrition;
    use crate::store::memory::InMemoryStore;

    fn store_with_nutrition() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store
            .upsert_food_nutrition(FoodNutrition { food_id: 1, nutrition: Nutrition::new(300.0, 60.0, 6.0, 1.0, 10.0) })
            .unwrap();
        store
            .upsert_food_nutrition(FoodNutrition { food_id: 2, nutrition: Nutrition::new(100.0, 10.0, 5.0, 4.0, 500.0) })
            .unwrap();
        store
    }

    #[test]
    fn test_missing_nutrition_defaults_to_zero() {
        let store = store_with_nutrition();
        assert_eq!(get_nutrition(&store, 99).unwrap(), Nutrition::default());
    }

    #[test]
    fn test_sum_nutrition_counts_repeats_and_missing_as_zero() {
        let store = store_with_nutrition();
        let total = sum_nutrition(&store, &[1, 1, 2, 99]).unwrap();
        assert_eq!(total, Nutrition::new(700.0, 130.0, 17.0, 6.0, 520.0));
        assert_eq!(sum_nutrition(&store, &[]).unwrap(), Nutrition::default());
    }

    #[test]
    fn test_save_meal_total_nutrition_divides_and_rounds() {
        let mut store = store_with_nutrition();
        let config = PlannerConfig::default();
        let saved = save_meal_total_nutrition(&mut store, 7, &[1, 2, 99], &config).unwrap();

        assert_eq!(saved.meal_id, 7);
        // (300 + 100) / 3 = 133.333...
        assert_eq!(saved.totals.calories, 133.33);
        assert_eq!(saved.totals.carbohydrate, 23.33);
        assert_eq!(saved.totals.protein, 3.67);
        assert_eq!(saved.totals.fat, 1.67);
        assert_eq!(saved.totals.sodium, 170.0);
        assert_eq!(store.meal_nutrition(7).unwrap(), Some(saved));
    }

    #[test]
    fn test_save_meal_total_nutrition_is_repeatable() {
        let mut store = store_with_nutrition();
        let config = PlannerConfig::default();
        let first = save_meal_total_nutrition(&mut store, 3, &[1, 2], &config).unwrap();
        let second = save_meal_total_nutrition(&mut store, 3, &[1, 2], &config).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.meal_nutrition(3).unwrap(), Some(second));
    }

    #[test]
    fn test_meals_per_day_is_configurable() {
        let mut store = store_with_nutrition();
        let config = PlannerConfig { meals_per_day: 1.0, ..PlannerConfig::default() };
        let saved = save_meal_total_nutrition(&mut store, 1, &[1, 2], &config).unwrap();
        assert_eq!(saved.totals.calories, 400.0);
        assert_eq!(saved.totals.sodium, 510.0);
    }

    #[test]
    fn test_nutrition_sum_and_rounding() {
        let parts = vec![Nutrition::new(1.0, 2.0, 3.0, 4.0, 5.0), Nutrition::new(0.5, 0.5, 0.5, 0.5, 0.5)];
        let total: Nutrition = parts.into_iter().sum();
        assert_eq!(total, Nutrition::new(1.5, 2.5, 3.5, 4.5, 5.5));
        assert_eq!(round_to(2.0 / 3.0, 2), 0.67);
    }
}
