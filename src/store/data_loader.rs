use anyhow::{anyhow, Context, Result};
use csv::{ReaderBuilder, StringRecord};
use rayon::prelude::*;
use std::path::Path;

use crate::catalog::{Food, FoodNutrition, FoodRole, RecommendedNutrition, UserAllergy};
use crate::nutrition::Nutrition;
use crate::search::embeddings::parse_embedding;

// Food catalog columns
const ID_COL: &str = "id";
const NAME_COL: &str = "name";
const ROLE_COL: &str = "role";
const CLASSIFICATION_COL: &str = "classification";
const IMAGE_COL: &str = "image";
const MATERIALS_COL: &str = "materials";
const EMBEDDING_COL: &str = "embedding";

// Nutrition columns, shared by food nutrition and recommended intake
const FOOD_ID_COL: &str = "food_id";
const AGE_COL: &str = "age";
const CALORIES_COL: &str = "calories";
const CARB_COL: &str = "carbohydrate";
const PROTEIN_COL: &str = "protein";
const FAT_COL: &str = "fat";
const SODIUM_COL: &str = "sodium";

// User allergy columns
const USER_ID_COL: &str = "user_id";
const ALLERGY_ID_COL: &str = "allergy_id";

fn open_reader(csv_path: &Path, what: &str) -> Result<csv::Reader<std::fs::File>> {
    if !csv_path.exists() {
        return Err(anyhow!("{} CSV file not found at: {:?}", what, csv_path));
    }
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("Failed to open {} CSV file at {:?}", what, csv_path))?;
    Ok(ReaderBuilder::new().has_headers(true).flexible(true).from_reader(file))
}

fn column(headers: &StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h.trim() == name)
        .ok_or_else(|| anyhow!("Column '{}' not found", name))
}

fn optional_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn field<'r>(record: &'r StringRecord, idx: usize) -> &'r str {
    record.get(idx).map(str::trim).unwrap_or("")
}

fn parse_number<T: std::str::FromStr>(record: &StringRecord, idx: usize, col: &str, row_index: usize) -> Result<T> {
    let raw = field(record, idx);
    raw.parse::<T>()
        .map_err(|_| anyhow!("Invalid {} '{}' at row {}", col, raw, row_index))
}

// Blank or non-numeric nutrient cells count as zero.
fn parse_nutrient(record: &StringRecord, idx: usize) -> f64 {
    field(record, idx).parse::<f64>().unwrap_or(0.0)
}

struct NutritionColumns {
    calories: usize,
    carbohydrate: usize,
    protein: usize,
    fat: usize,
    sodium: usize,
}

impl NutritionColumns {
    fn locate(headers: &StringRecord) -> Result<Self> {
        Ok(NutritionColumns {
            calories: column(headers, CALORIES_COL)?,
            carbohydrate: column(headers, CARB_COL)?,
            protein: column(headers, PROTEIN_COL)?,
            fat: column(headers, FAT_COL)?,
            sodium: column(headers, SODIUM_COL)?,
        })
    }

    fn read(&self, record: &StringRecord) -> Nutrition {
        Nutrition::new(
            parse_nutrient(record, self.calories),
            parse_nutrient(record, self.carbohydrate),
            parse_nutrient(record, self.protein),
            parse_nutrient(record, self.fat),
            parse_nutrient(record, self.sodium),
        )
    }
}

/// Loads the food catalog. Embedding cells are parsed in parallel; a cell
/// that does not parse leaves the food without an embedding.
pub fn load_food_catalog(csv_path: &Path) -> Result<Vec<Food>> {
    let mut rdr = open_reader(csv_path, "Food catalog")?;
    let headers = rdr.headers()?.clone();

    let id_idx = column(&headers, ID_COL)?;
    let name_idx = column(&headers, NAME_COL)?;
    let role_idx = column(&headers, ROLE_COL)?;
    let materials_idx = column(&headers, MATERIALS_COL)?;
    let classification_idx = optional_column(&headers, CLASSIFICATION_COL);
    let image_idx = optional_column(&headers, IMAGE_COL);
    let embedding_idx = optional_column(&headers, EMBEDDING_COL);

    let mut foods = Vec::new();
    let mut raw_embeddings = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record at row index {}", row_index))?;

        let name = field(&record, name_idx).to_string();
        if name.is_empty() {
            continue;
        }
        let role: FoodRole = field(&record, role_idx)
            .parse()
            .with_context(|| format!("Invalid role for '{}' at row {}", name, row_index))?;

        let mut food = Food::new(parse_number(&record, id_idx, ID_COL, row_index)?, &name, role, field(&record, materials_idx));
        if let Some(idx) = classification_idx {
            food.classification = field(&record, idx).to_string();
        }
        food.image = image_idx.map(|idx| field(&record, idx)).filter(|s| !s.is_empty()).map(String::from);

        raw_embeddings.push(embedding_idx.map(|idx| field(&record, idx).to_string()).unwrap_or_default());
        foods.push(food);
    }

    if foods.is_empty() {
        return Err(anyhow!("No valid foods loaded from {:?}", csv_path));
    }

    let embeddings: Vec<Vec<f32>> = raw_embeddings.par_iter().map(|raw| parse_embedding(raw)).collect();
    for (food, embedding) in foods.iter_mut().zip(embeddings) {
        food.embedding = embedding;
    }
    Ok(foods)
}

/// Loads per-food nutrition rows. Repeated food ids are kept in file order;
/// upserting them leaves the last one in place.
pub fn load_food_nutrition(csv_path: &Path) -> Result<Vec<FoodNutrition>> {
    let mut rdr = open_reader(csv_path, "Food nutrition")?;
    let headers = rdr.headers()?.clone();
    let food_id_idx = column(&headers, FOOD_ID_COL)?;
    let columns = NutritionColumns::locate(&headers)?;

    let mut rows = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record at row index {}", row_index))?;
        rows.push(FoodNutrition {
            food_id: parse_number(&record, food_id_idx, FOOD_ID_COL, row_index)?,
            nutrition: columns.read(&record),
        });
    }
    Ok(rows)
}

pub fn load_user_allergies(csv_path: &Path) -> Result<Vec<UserAllergy>> {
    let mut rdr = open_reader(csv_path, "User allergy")?;
    let headers = rdr.headers()?.clone();
    let user_idx = column(&headers, USER_ID_COL)?;
    let allergy_idx = column(&headers, ALLERGY_ID_COL)?;

    let mut rows = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record at row index {}", row_index))?;
        rows.push(UserAllergy {
            user_id: parse_number(&record, user_idx, USER_ID_COL, row_index)?,
            allergy_id: parse_number(&record, allergy_idx, ALLERGY_ID_COL, row_index)?,
        });
    }
    Ok(rows)
}

pub fn load_recommended_nutrition(csv_path: &Path) -> Result<Vec<RecommendedNutrition>> {
    let mut rdr = open_reader(csv_path, "Recommended nutrition")?;
    let headers = rdr.headers()?.clone();
    let age_idx = column(&headers, AGE_COL)?;
    let columns = NutritionColumns::locate(&headers)?;

    let mut rows = Vec::new();
    for (row_index, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read record at row index {}", row_index))?;
        rows.push(RecommendedNutrition {
            age: parse_number(&record, age_idx, AGE_COL, row_index)?,
            nutrition: columns.read(&record),
        });
    }
    Ok(rows)
}
