//! Meal composition: random daily plans and the scored refresh searches.

pub mod composer;
pub mod nutri_eval;
pub mod refresher;
pub mod targets;

pub use composer::{draw_combo, RoleBuckets};
pub use refresher::{RefreshedItem, RefreshedMeal};
pub use targets::{resolve_target, target_from_map, TargetOverrides};

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rand::Rng;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::allergy::{self, AllergenTable};
use crate::catalog::{Food, Meal, UserId};
use crate::config::PlannerConfig;
use crate::nutrition::Nutrition;
use crate::store::{MealStore, StoreError};

/// A stored meal together with its per-meal nutrition totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MealView {
    pub meal: Meal,
    pub nutrition: Nutrition,
}

/// Owns the store and the random source used by the composer and the refresher.
///
/// Entry points without a `try_` prefix log storage failures and report them
/// as `None` (or a zero success count); the `try_` variants return the error.
pub struct MealPlanner<S, R> {
    store: S,
    rng: R,
    allergens: AllergenTable,
    config: PlannerConfig,
}

impl<S: MealStore, R: Rng> MealPlanner<S, R> {
    pub fn new(store: S, rng: R, config: PlannerConfig) -> Self {
        MealPlanner { store, rng, allergens: AllergenTable::builtin(), config }
    }

    pub fn with_allergens(mut self, allergens: AllergenTable) -> Self {
        self.allergens = allergens;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn filter_foods_by_allergy(&self, user_id: Option<UserId>) -> Result<Vec<Food>, StoreError> {
        allergy::filter_foods_by_allergy(&self.store, &self.allergens, user_id)
    }

    /// The user's meal for `date`, with zero totals when no nutrition row exists.
    pub fn meal_for_date(&self, user_id: UserId, date: NaiveDate) -> Result<Option<MealView>, StoreError> {
        let meal = match self.store.meal_by_user_and_date(user_id, date)? {
            Some(meal) => meal,
            None => return Ok(None),
        };
        let nutrition = match meal.id {
            Some(meal_id) => self.store.meal_nutrition(meal_id)?.map(|row| row.totals).unwrap_or_default(),
            None => Nutrition::default(),
        };
        Ok(Some(MealView { meal, nutrition }))
    }

    /// Every meal of the calendar month, keyed by date.
    pub fn monthly_meals(&self, user_id: UserId, year: i32, month: u32) -> Result<BTreeMap<NaiveDate, Meal>> {
        let (start, end) = month_bounds(year, month)?;
        let meals = self.store.meals_between(user_id, start, end)?;
        // Ordered by (date, id), so the newest duplicate of a day is inserted last.
        Ok(meals.into_iter().map(|meal| (meal.date, meal)).collect())
    }
}

fn month_bounds(year: i32, month: u32) -> Result<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| anyhow!("Invalid month {}-{:02}", year, month))?;
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .ok_or_else(|| anyhow!("Month {}-{:02} is out of range", year, month))?;
    Ok((start, end))
}
