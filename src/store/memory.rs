//! In-process `MealStore` with whole-file snapshots.
#![forbid(unsafe_code)]

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fs;
use std::path::Path;

use super::{MealStore, StoreError};
use crate::catalog::{
    AllergyId, Food, FoodId, FoodNutrition, Meal, MealId, MealNutrition, RecommendedNutrition, UserAllergy, UserId,
};
use crate::nutrition::Nutrition;

/// On-disk layout. Rows are kept as plain vectors so the same struct works
/// for both the JSON and the bincode encodings.
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    next_meal_id: MealId,
    foods: Vec<Food>,
    food_nutrition: Vec<FoodNutrition>,
    meals: Vec<Meal>,
    meal_nutrition: Vec<MealNutrition>,
    user_allergies: Vec<UserAllergy>,
    recommended: Vec<RecommendedNutrition>,
}

#[derive(Debug, Default)]
pub struct InMemoryStore {
    foods: BTreeMap<FoodId, Food>,
    food_nutrition: HashMap<FoodId, Nutrition>,
    meals: BTreeMap<MealId, Meal>,
    meal_nutrition: HashMap<MealId, MealNutrition>,
    user_allergies: HashMap<UserId, BTreeSet<AllergyId>>,
    recommended: BTreeMap<u32, Nutrition>,
    next_meal_id: MealId,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore { next_meal_id: 1, ..Default::default() }
    }

    /// Loads a snapshot if the file exists and is non-empty, otherwise starts empty.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if !path.exists() || path.metadata()?.len() == 0 {
            return Ok(InMemoryStore::new());
        }
        let snapshot: Snapshot = if is_binary(path) {
            bincode::deserialize(&fs::read(path)?)?
        } else {
            serde_json::from_str(&fs::read_to_string(path)?)?
        };
        Ok(InMemoryStore::from_snapshot(snapshot))
    }

    /// Writes the whole store; `.bin` paths use bincode, anything else pretty JSON.
    pub fn save(&self, path: &Path) -> Result<(), StoreError> {
        let snapshot = self.to_snapshot();
        if is_binary(path) {
            fs::write(path, bincode::serialize(&snapshot)?)?;
        } else {
            fs::write(path, serde_json::to_string_pretty(&snapshot)?)?;
        }
        Ok(())
    }

    /// Inserts or replaces catalog foods by id.
    pub fn upsert_foods(&mut self, foods: Vec<Food>) -> (Vec<FoodId>, Vec<FoodId>) {
        let mut updates = Vec::new();
        let mut inserts = Vec::new();
        for food in foods {
            let id = food.id;
            if self.foods.insert(id, food).is_some() {
                updates.push(id);
            } else {
                inserts.push(id);
            }
        }
        (updates, inserts)
    }

    pub fn add_user_allergy(&mut self, user_id: UserId, allergy_id: AllergyId) {
        self.user_allergies.entry(user_id).or_default().insert(allergy_id);
    }

    pub fn set_recommended_nutrition(&mut self, age: u32, nutrition: Nutrition) {
        self.recommended.insert(age, nutrition);
    }

    pub fn food(&self, food_id: FoodId) -> Option<&Food> {
        self.foods.get(&food_id)
    }

    pub fn food_count(&self) -> usize {
        self.foods.len()
    }

    pub fn meal_count(&self) -> usize {
        self.meals.len()
    }

    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut store = InMemoryStore::new();
        store.upsert_foods(snapshot.foods);
        for row in snapshot.food_nutrition {
            store.food_nutrition.insert(row.food_id, row.nutrition);
        }
        for meal in snapshot.meals {
            if let Some(id) = meal.id {
                store.meals.insert(id, meal);
            }
        }
        for row in snapshot.meal_nutrition {
            store.meal_nutrition.insert(row.meal_id, row);
        }
        for row in snapshot.user_allergies {
            store.add_user_allergy(row.user_id, row.allergy_id);
        }
        for row in snapshot.recommended {
            store.recommended.insert(row.age, row.nutrition);
        }
        let after_last = store.meals.keys().next_back().map_or(1, |id| id + 1);
        store.next_meal_id = snapshot.next_meal_id.max(after_last);
        store
    }

    fn to_snapshot(&self) -> Snapshot {
        let mut food_nutrition: Vec<FoodNutrition> = self
            .food_nutrition
            .iter()
            .map(|(&food_id, &nutrition)| FoodNutrition { food_id, nutrition })
            .collect();
        food_nutrition.sort_by_key(|row| row.food_id);

        let mut meal_nutrition: Vec<MealNutrition> = self.meal_nutrition.values().copied().collect();
        meal_nutrition.sort_by_key(|row| row.meal_id);

        let mut user_allergies: Vec<UserAllergy> = self
            .user_allergies
            .iter()
            .flat_map(|(&user_id, ids)| ids.iter().map(move |&allergy_id| UserAllergy { user_id, allergy_id }))
            .collect();
        user_allergies.sort_by_key(|row| (row.user_id, row.allergy_id));

        Snapshot {
            next_meal_id: self.next_meal_id,
            foods: self.foods.values().cloned().collect(),
            food_nutrition,
            meals: self.meals.values().cloned().collect(),
            meal_nutrition,
            user_allergies,
            recommended: self
                .recommended
                .iter()
                .map(|(&age, &nutrition)| RecommendedNutrition { age, nutrition })
                .collect(),
        }
    }
}

fn is_binary(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "bin")
}

impl MealStore for InMemoryStore {
    fn all_foods(&self) -> Result<Vec<Food>, StoreError> {
        Ok(self.foods.values().cloned().collect())
    }

    fn foods_matching(&self, keep: &dyn Fn(&Food) -> bool) -> Result<Vec<Food>, StoreError> {
        Ok(self.foods.values().filter(|food| keep(food)).cloned().collect())
    }

    fn embeddings_for(&self, food_ids: &HashSet<FoodId>) -> Result<HashMap<FoodId, Vec<f32>>, StoreError> {
        Ok(food_ids
            .iter()
            .filter_map(|id| self.foods.get(id))
            .filter(|food| !food.embedding.is_empty())
            .map(|food| (food.id, food.embedding.clone()))
            .collect())
    }

    fn nutrition_for(&self, food_id: FoodId) -> Result<Option<Nutrition>, StoreError> {
        Ok(self.food_nutrition.get(&food_id).copied())
    }

    fn upsert_food_nutrition(&mut self, row: FoodNutrition) -> Result<(), StoreError> {
        self.food_nutrition.insert(row.food_id, row.nutrition);
        Ok(())
    }

    fn upsert_meal(&mut self, meal: &Meal) -> Result<MealId, StoreError> {
        match meal.id {
            Some(id) => {
                let existing = self.meals.get_mut(&id).ok_or(StoreError::UnknownMeal(id))?;
                *existing = meal.clone();
                Ok(id)
            }
            None => {
                let id = self.next_meal_id;
                self.next_meal_id += 1;
                let mut stored = meal.clone();
                stored.id = Some(id);
                self.meals.insert(id, stored);
                Ok(id)
            }
        }
    }

    // Duplicates for a user+date can exist; the newest one wins.
    fn meal_by_user_and_date(&self, user_id: UserId, date: NaiveDate) -> Result<Option<Meal>, StoreError> {
        Ok(self
            .meals
            .values()
            .rev()
            .find(|meal| meal.user_id == user_id && meal.date == date)
            .cloned())
    }

    fn meals_between(&self, user_id: UserId, start: NaiveDate, end: NaiveDate) -> Result<Vec<Meal>, StoreError> {
        let mut meals: Vec<Meal> = self
            .meals
            .values()
            .filter(|meal| meal.user_id == user_id && meal.date >= start && meal.date <= end)
            .cloned()
            .collect();
        meals.sort_by_key(|meal| (meal.date, meal.id));
        Ok(meals)
    }

    fn delete_meal_by_user_and_date(&mut self, user_id: UserId, date: NaiveDate) -> Result<bool, StoreError> {
        let doomed: Vec<MealId> = self
            .meals
            .iter()
            .filter(|(_, meal)| meal.user_id == user_id && meal.date == date)
            .map(|(&id, _)| id)
            .collect();
        for id in &doomed {
            self.meals.remove(id);
            self.meal_nutrition.remove(id);
        }
        Ok(!doomed.is_empty())
    }

    fn upsert_meal_nutrition(&mut self, row: &MealNutrition) -> Result<(), StoreError> {
        self.meal_nutrition.insert(row.meal_id, *row);
        Ok(())
    }

    fn meal_nutrition(&self, meal_id: MealId) -> Result<Option<MealNutrition>, StoreError> {
        Ok(self.meal_nutrition.get(&meal_id).copied())
    }

    fn user_allergy_ids(&self, user_id: UserId) -> Result<Vec<AllergyId>, StoreError> {
        Ok(self
            .user_allergies
            .get(&user_id)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default())
    }

    fn recommended_nutrition(&self, age: u32) -> Result<Option<Nutrition>, StoreError> {
        Ok(self.recommended.get(&age).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::FoodRole;
    use tempfile::NamedTempFile;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn populated_store() -> InMemoryStore {
        let mut store = InMemoryStore::new();
        store.upsert_foods(vec![
            Food::new(1, "White rice", FoodRole::Rice, "rice").with_embedding(vec![1.0, 0.0]),
            Food::new(2, "Seaweed soup", FoodRole::Soup, "seaweed, beef"),
        ]);
        store
            .upsert_food_nutrition(FoodNutrition { food_id: 1, nutrition: Nutrition::new(300.0, 65.0, 5.0, 0.5, 2.0) })
            .unwrap();
        store.add_user_allergy(4, 1);
        store.add_user_allergy(4, 10);
        store.set_recommended_nutrition(7, Nutrition::new(500.0, 80.0, 20.0, 15.0, 600.0));
        store
    }

    #[test]
    fn test_upsert_meal_inserts_then_updates() -> Result<(), StoreError> {
        let mut store = InMemoryStore::new();
        let mut meal = Meal::from_slots(1, day(1), [Some(1), None, None, None, None, None]);
        let id = store.upsert_meal(&meal)?;
        assert_eq!(store.meal_count(), 1);

        meal.id = Some(id);
        meal.soup_id = Some(2);
        assert_eq!(store.upsert_meal(&meal)?, id);
        assert_eq!(store.meal_count(), 1);
        assert_eq!(store.meal_by_user_and_date(1, day(1))?.unwrap().soup_id, Some(2));
        Ok(())
    }

    #[test]
    fn test_update_of_unknown_meal_fails() {
        let mut store = InMemoryStore::new();
        let mut meal = Meal::from_slots(1, day(1), [None; 6]);
        meal.id = Some(42);
        assert!(matches!(store.upsert_meal(&meal), Err(StoreError::UnknownMeal(42))));
    }

    #[test]
    fn test_newest_duplicate_wins_and_delete_removes_all() -> Result<(), StoreError> {
        let mut store = InMemoryStore::new();
        store.upsert_meal(&Meal::from_slots(1, day(2), [Some(1), None, None, None, None, None]))?;
        let newer = store.upsert_meal(&Meal::from_slots(1, day(2), [Some(9), None, None, None, None, None]))?;
        store.upsert_meal_nutrition(&MealNutrition { meal_id: newer, totals: Nutrition::default() })?;

        assert_eq!(store.meal_by_user_and_date(1, day(2))?.unwrap().id, Some(newer));
        assert!(store.delete_meal_by_user_and_date(1, day(2))?);
        assert_eq!(store.meal_count(), 0);
        assert_eq!(store.meal_nutrition(newer)?, None);
        assert!(!store.delete_meal_by_user_and_date(1, day(2))?);
        Ok(())
    }

    #[test]
    fn test_meals_between_is_inclusive_and_per_user() -> Result<(), StoreError> {
        let mut store = InMemoryStore::new();
        for d in [3, 1, 2, 5] {
            store.upsert_meal(&Meal::from_slots(1, day(d), [None; 6]))?;
        }
        store.upsert_meal(&Meal::from_slots(2, day(2), [None; 6]))?;
        let dates: Vec<NaiveDate> = store.meals_between(1, day(1), day(3))?.into_iter().map(|m| m.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(3)]);
        Ok(())
    }

    #[test]
    fn test_foods_by_role_scans_catalog() -> Result<(), StoreError> {
        let store = populated_store();
        let soups: Vec<FoodId> = store.foods_by_role(FoodRole::Soup)?.iter().map(|f| f.id).collect();
        assert_eq!(soups, vec![2]);
        assert!(store.foods_by_role(FoodRole::Dessert)?.is_empty());
        Ok(())
    }

    #[test]
    fn test_embeddings_for_skips_missing_vectors() -> Result<(), StoreError> {
        let store = populated_store();
        let ids: HashSet<FoodId> = [1, 2, 3].into_iter().collect();
        let embeddings = store.embeddings_for(&ids)?;
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[&1], vec![1.0, 0.0]);
        Ok(())
    }

    #[test]
    fn test_snapshot_roundtrip_json_and_bincode() -> Result<(), StoreError> {
        let mut store = populated_store();
        let meal_id = store.upsert_meal(&Meal::from_slots(4, day(9), [Some(1), Some(2), None, None, None, None]))?;

        for suffix in [".json", ".bin"] {
            let file = tempfile::Builder::new().suffix(suffix).tempfile()?;
            store.save(file.path())?;
            let mut loaded = InMemoryStore::open(file.path())?;

            assert_eq!(loaded.food_count(), 2);
            assert_eq!(loaded.food(1).map(|f| f.embedding.clone()), Some(vec![1.0, 0.0]));
            assert_eq!(loaded.nutrition_for(1)?, store.nutrition_for(1)?);
            assert_eq!(loaded.user_allergy_ids(4)?, vec![1, 10]);
            assert_eq!(loaded.recommended_nutrition(7)?, store.recommended_nutrition(7)?);
            assert_eq!(loaded.meal_by_user_and_date(4, day(9))?.and_then(|m| m.id), Some(meal_id));

            // Fresh ids continue after the loaded ones.
            let next = loaded.upsert_meal(&Meal::from_slots(4, day(10), [None; 6]))?;
            assert!(next > meal_id);
        }
        Ok(())
    }

    #[test]
    fn test_open_empty_file_starts_empty() -> Result<(), StoreError> {
        let file = NamedTempFile::new()?;
        let store = InMemoryStore::open(file.path())?;
        assert_eq!(store.food_count(), 0);
        Ok(())
    }

    #[test]
    fn test_open_snapshot_with_malformed_embedding_keeps_food() -> Result<(), StoreError> {
        let store = populated_store();
        let file = tempfile::Builder::new().suffix(".json").tempfile()?;
        store.save(file.path())?;

        let encoded = serde_json::to_value(store.food(1))?["embedding"]
            .as_str()
            .map(str::to_owned)
            .unwrap();
        let text = fs::read_to_string(file.path())?.replace(&encoded, "not base64!");
        fs::write(file.path(), text)?;

        let loaded = InMemoryStore::open(file.path())?;
        assert_eq!(loaded.food_count(), 2);
        assert_eq!(loaded.food(1).map(|f| f.embedding.is_empty()), Some(true));
        assert!(loaded.embeddings_for(&HashSet::from([1]))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_open_corrupt_snapshot_fails() -> Result<(), StoreError> {
        let file = NamedTempFile::new()?;
        fs::write(file.path(), "{ not json")?;
        assert!(matches!(InMemoryStore::open(file.path()), Err(StoreError::Json(_))));
        Ok(())
    }
}
