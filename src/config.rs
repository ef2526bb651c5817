use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

pub const STORE_ENV_VAR: &str = "MEAL_PLANNER_STORE";
pub const REFRESH_TRIALS_ENV_VAR: &str = "MEAL_PLANNER_REFRESH_TRIALS";
pub const MEALS_PER_DAY_ENV_VAR: &str = "MEAL_PLANNER_MEALS_PER_DAY";
pub const DECIMALS_ENV_VAR: &str = "MEAL_PLANNER_DECIMALS";

const DEFAULT_STORE_PATH: &str = "meal_store.json";
const DEFAULT_REFRESH_TRIALS: usize = 50;
// A stored meal row carries one of the day's three meals.
const DEFAULT_MEALS_PER_DAY: f64 = 3.0;
const DEFAULT_NUTRITION_DECIMALS: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct PlannerConfig {
    /// Random combinations scored per full-day refresh.
    pub refresh_trials: usize,
    /// Divisor applied to a slot-set's summed nutrition before it is stored.
    pub meals_per_day: f64,
    pub nutrition_decimals: u32,
    pub store_path: PathBuf,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            refresh_trials: DEFAULT_REFRESH_TRIALS,
            meals_per_day: DEFAULT_MEALS_PER_DAY,
            nutrition_decimals: DEFAULT_NUTRITION_DECIMALS,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
        }
    }
}

impl PlannerConfig {
    /// Reads overrides from the environment. Call `dotenv::dotenv()` first
    /// to pick up a `.env` file.
    pub fn from_env() -> Result<Self> {
        let mut config = PlannerConfig::default();
        if let Some(path) = read_var::<String>(STORE_ENV_VAR)? {
            config.store_path = PathBuf::from(path);
        }
        if let Some(trials) = read_var(REFRESH_TRIALS_ENV_VAR)? {
            config.refresh_trials = trials;
        }
        if let Some(meals) = read_var(MEALS_PER_DAY_ENV_VAR)? {
            config.meals_per_day = meals;
        }
        if let Some(decimals) = read_var(DECIMALS_ENV_VAR)? {
            config.nutrition_decimals = decimals;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.meals_per_day > 0.0) {
            return Err(anyhow!("meals_per_day must be positive, got {}", self.meals_per_day));
        }
        if self.refresh_trials == 0 {
            return Err(anyhow!("refresh_trials must be at least 1"));
        }
        Ok(())
    }
}

fn read_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value '{}' for {}", raw, name)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(anyhow!("Failed to read {}: {}", name, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlannerConfig::default();
        assert_eq!(config.refresh_trials, 50);
        assert_eq!(config.meals_per_day, 3.0);
        assert_eq!(config.nutrition_decimals, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero_meals = PlannerConfig { meals_per_day: 0.0, ..PlannerConfig::default() };
        assert!(zero_meals.validate().is_err());
        let no_trials = PlannerConfig { refresh_trials: 0, ..PlannerConfig::default() };
        assert!(no_trials.validate().is_err());
    }

    // Only this test touches these variables.
    #[test]
    fn test_from_env_overrides_and_rejects_garbage() -> Result<()> {
        env::set_var(REFRESH_TRIALS_ENV_VAR, "12");
        env::set_var(MEALS_PER_DAY_ENV_VAR, "1");
        let config = PlannerConfig::from_env()?;
        assert_eq!(config.refresh_trials, 12);
        assert_eq!(config.meals_per_day, 1.0);

        env::set_var(REFRESH_TRIALS_ENV_VAR, "many");
        assert!(PlannerConfig::from_env().is_err());

        env::remove_var(REFRESH_TRIALS_ENV_VAR);
        env::remove_var(MEALS_PER_DAY_ENV_VAR);
        Ok(())
    }
}
