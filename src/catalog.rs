use anyhow::anyhow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::nutrition::Nutrition;

pub type FoodId = i64;
pub type MealId = i64;
pub type UserId = i64;
pub type AllergyId = i32;

/// The food category a meal slot requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FoodRole {
    Rice,
    Soup,
    SideDish,
    MainDish,
    Dessert,
}

impl FoodRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            FoodRole::Rice => "rice",
            FoodRole::Soup => "soup",
            FoodRole::SideDish => "side_dish",
            FoodRole::MainDish => "main_dish",
            FoodRole::Dessert => "dessert",
        }
    }
}

impl fmt::Display for FoodRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FoodRole {
    type Err = anyhow::Error;

    // Catalog exports carry either the English labels or the Korean ones.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "rice" | "밥" => Ok(FoodRole::Rice),
            "soup" | "국&찌개" => Ok(FoodRole::Soup),
            "side_dish" | "sidedish" | "side dish" | "반찬" => Ok(FoodRole::SideDish),
            "main_dish" | "maindish" | "main dish" | "일품" => Ok(FoodRole::MainDish),
            "dessert" | "후식" => Ok(FoodRole::Dessert),
            other => Err(anyhow!("Unknown food role '{}'", other)),
        }
    }
}

/// One catalog entry. An empty `embedding` means the food has no usable vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Food {
    pub id: FoodId,
    pub name: String,
    pub role: FoodRole,
    pub classification: String,
    pub image: Option<String>,
    pub materials: String,
    #[serde(with = "crate::store::base64_f32", default)]
    pub embedding: Vec<f32>,
}

impl Food {
    pub fn new(id: FoodId, name: &str, role: FoodRole, materials: &str) -> Self {
        Food {
            id,
            name: name.to_string(),
            role,
            classification: String::new(),
            image: None,
            materials: materials.to_string(),
            embedding: Vec::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = embedding;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FoodNutrition {
    pub food_id: FoodId,
    pub nutrition: Nutrition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAllergy {
    pub user_id: UserId,
    pub allergy_id: AllergyId,
}

/// Recommended per-meal intake for children of a given age.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendedNutrition {
    pub age: u32,
    pub nutrition: Nutrition,
}

/// The six fixed positions of a day's meal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    Rice,
    Soup,
    SideDish1,
    SideDish2,
    MainDish,
    Dessert,
}

impl MealSlot {
    pub const ALL: [MealSlot; 6] = [
        MealSlot::Rice,
        MealSlot::Soup,
        MealSlot::SideDish1,
        MealSlot::SideDish2,
        MealSlot::MainDish,
        MealSlot::Dessert,
    ];

    pub fn role(&self) -> FoodRole {
        match self {
            MealSlot::Rice => FoodRole::Rice,
            MealSlot::Soup => FoodRole::Soup,
            MealSlot::SideDish1 | MealSlot::SideDish2 => FoodRole::SideDish,
            MealSlot::MainDish => FoodRole::MainDish,
            MealSlot::Dessert => FoodRole::Dessert,
        }
    }

    pub fn item_type(&self) -> &'static str {
        match self {
            MealSlot::Rice => "rice",
            MealSlot::Soup => "soup",
            MealSlot::SideDish1 => "side_dish1",
            MealSlot::SideDish2 => "side_dish2",
            MealSlot::MainDish => "main_dish",
            MealSlot::Dessert => "dessert",
        }
    }

    /// Maps a refresh `item_type` to its slot. Unknown names yield `None`.
    pub fn from_item_type(item_type: &str) -> Option<MealSlot> {
        let wanted = item_type.trim().to_lowercase();
        MealSlot::ALL.into_iter().find(|slot| slot.item_type() == wanted)
    }

    fn index(&self) -> usize {
        match self {
            MealSlot::Rice => 0,
            MealSlot::Soup => 1,
            MealSlot::SideDish1 => 2,
            MealSlot::SideDish2 => 3,
            MealSlot::MainDish => 4,
            MealSlot::Dessert => 5,
        }
    }
}

/// Slot contents in `MealSlot::ALL` order.
pub type SlotIds = [Option<FoodId>; 6];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meal {
    pub id: Option<MealId>,
    pub user_id: UserId,
    pub date: NaiveDate,
    pub rice_id: Option<FoodId>,
    pub soup_id: Option<FoodId>,
    pub side_dish1_id: Option<FoodId>,
    pub side_dish2_id: Option<FoodId>,
    pub main_dish_id: Option<FoodId>,
    pub dessert_id: Option<FoodId>,
}

impl Meal {
    pub fn from_slots(user_id: UserId, date: NaiveDate, slots: SlotIds) -> Self {
        let [rice_id, soup_id, side_dish1_id, side_dish2_id, main_dish_id, dessert_id] = slots;
        Meal {
            id: None,
            user_id,
            date,
            rice_id,
            soup_id,
            side_dish1_id,
            side_dish2_id,
            main_dish_id,
            dessert_id,
        }
    }

    pub fn slot_ids(&self) -> SlotIds {
        [
            self.rice_id,
            self.soup_id,
            self.side_dish1_id,
            self.side_dish2_id,
            self.main_dish_id,
            self.dessert_id,
        ]
    }

    pub fn slot(&self, slot: MealSlot) -> Option<FoodId> {
        self.slot_ids()[slot.index()]
    }

    pub fn set_slot(&mut self, slot: MealSlot, food_id: Option<FoodId>) {
        let target = match slot {
            MealSlot::Rice => &mut self.rice_id,
            MealSlot::Soup => &mut self.soup_id,
            MealSlot::SideDish1 => &mut self.side_dish1_id,
            MealSlot::SideDish2 => &mut self.side_dish2_id,
            MealSlot::MainDish => &mut self.main_dish_id,
            MealSlot::Dessert => &mut self.dessert_id,
        };
        *target = food_id;
    }

    /// Filled slots only, in slot order.
    pub fn food_ids(&self) -> Vec<FoodId> {
        self.slot_ids().into_iter().flatten().collect()
    }
}

/// Stored per-meal totals: one meal's share of a day's slot-set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MealNutrition {
    pub meal_id: MealId,
    pub totals: Nutrition,
}
