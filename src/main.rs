use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::{json, Value};
use std::path::Path;
use tokio::fs;

use meal_planner::cli::{parse_args, Command};
use meal_planner::config::PlannerConfig;
use meal_planner::planner::{resolve_target, MealPlanner};
use meal_planner::store::{
    load_food_catalog, load_food_nutrition, load_recommended_nutrition, load_user_allergies, InMemoryStore, MealStore,
};

type Planner = MealPlanner<InMemoryStore, StdRng>;

async fn ensure_readable(path: &Path) -> Result<()> {
    let metadata = fs::metadata(path)
        .await
        .with_context(|| format!("Cannot read input file '{}'", path.display()))?;
    if !metadata.is_file() {
        anyhow::bail!("'{}' is not a file", path.display());
    }
    Ok(())
}

async fn import_catalog(
    store: &mut InMemoryStore,
    foods: &Path,
    nutrition: Option<&Path>,
    allergies: Option<&Path>,
    recommended: Option<&Path>,
) -> Result<Value> {
    ensure_readable(foods).await?;
    let (updated, inserted) = store.upsert_foods(load_food_catalog(foods)?);
    info!("Foods: {} inserted, {} updated", inserted.len(), updated.len());

    let mut nutrition_rows = 0;
    if let Some(path) = nutrition {
        ensure_readable(path).await?;
        for row in load_food_nutrition(path)? {
            store.upsert_food_nutrition(row)?;
            nutrition_rows += 1;
        }
        info!("Food nutrition: {} rows", nutrition_rows);
    }

    let mut allergy_rows = 0;
    if let Some(path) = allergies {
        ensure_readable(path).await?;
        for row in load_user_allergies(path)? {
            store.add_user_allergy(row.user_id, row.allergy_id);
            allergy_rows += 1;
        }
        info!("User allergies: {} rows", allergy_rows);
    }

    let mut recommended_rows = 0;
    if let Some(path) = recommended {
        ensure_readable(path).await?;
        for row in load_recommended_nutrition(path)? {
            store.set_recommended_nutrition(row.age, row.nutrition);
            recommended_rows += 1;
        }
        info!("Recommended intake: {} rows", recommended_rows);
    }

    Ok(json!({
        "foods_inserted": inserted.len(),
        "foods_updated": updated.len(),
        "nutrition_rows": nutrition_rows,
        "allergy_rows": allergy_rows,
        "recommended_rows": recommended_rows,
    }))
}

/// Runs a planning command. The flag is true when the store changed.
fn run_planner_command(planner: &mut Planner, command: Command) -> Result<(Value, bool)> {
    let today = || Local::now().date_naive();
    let output = match command {
        Command::Import { .. } => anyhow::bail!("import does not run through the planner"),
        Command::Daily { user, date } => {
            let meal_id = planner.generate_daily_meal(user, date.unwrap_or_else(today));
            (json!({ "meal_id": meal_id }), meal_id.is_some())
        }
        Command::Weekly { user, start } => {
            let created = planner.generate_weekly_meal(user, start.unwrap_or_else(today));
            (json!({ "created": created, "days": 7 }), created > 0)
        }
        Command::Monthly { user, start } => {
            let created = planner.generate_monthly_meal(user, start.unwrap_or_else(today));
            (json!({ "created": created, "days": 30 }), created > 0)
        }
        Command::Regenerate { user, date } => {
            let meal_id = planner.regenerate_daily_meal(user, date);
            // The delete may have landed even if generation failed.
            (json!({ "meal_id": meal_id }), true)
        }
        Command::Refresh { user, date, target, prev } => {
            let target = resolve_target(planner.store(), target.age, &target.overrides())?;
            let refreshed = planner.refresh_daily_meal(user, date, &target, prev.as_deref());
            let changed = refreshed.is_some();
            (serde_json::to_value(refreshed)?, changed)
        }
        Command::RefreshItem { user, date, item, target } => {
            let target = resolve_target(planner.store(), target.age, &target.overrides())?;
            let refreshed = planner.refresh_meal_item(user, date, &item, &target);
            let changed = refreshed.is_some();
            (serde_json::to_value(refreshed)?, changed)
        }
        Command::Show { user, date } => (serde_json::to_value(planner.meal_for_date(user, date)?)?, false),
        Command::Month { user, year, month } => {
            (serde_json::to_value(planner.monthly_meals(user, year, month)?)?, false)
        }
    };
    Ok(output)
}

async fn prepare_store_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create store directory '{}'", parent.display()))?;
    }
    Ok(())
}

fn save_store(store: &InMemoryStore, path: &Path) -> Result<()> {
    store
        .save(path)
        .with_context(|| format!("Failed to save store to '{}'", path.display()))?;
    info!("Store saved to {}", path.display());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let cli = parse_args();
    let mut config = PlannerConfig::from_env().context("Invalid planner configuration")?;
    if let Some(path) = cli.store.clone() {
        config.store_path = path;
    }
    let store_path = config.store_path.clone();
    prepare_store_dir(&store_path).await?;

    let mut store = InMemoryStore::open(&store_path)
        .with_context(|| format!("Failed to open store '{}'", store_path.display()))?;

    let (output, changed) = match cli.command {
        Command::Import { foods, nutrition, allergies, recommended } => {
            let summary = import_catalog(
                &mut store,
                &foods,
                nutrition.as_deref(),
                allergies.as_deref(),
                recommended.as_deref(),
            )
            .await?;
            (summary, true)
        }
        command => {
            let rng = match cli.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            let mut planner = MealPlanner::new(store, rng, config);
            let result = run_planner_command(&mut planner, command)?;
            store = planner.into_store();
            result
        }
    };

    if changed {
        save_store(&store, &store_path)?;
    }
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

