use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::catalog::{FoodId, UserId};
use crate::planner::TargetOverrides;

#[derive(Parser, Debug)]
#[command(author, version, about = "Allergy-aware meal plans for children", long_about = None)]
pub struct Cli {
    /// Store snapshot file (`.bin` for bincode, anything else JSON)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Seed for the random draws; omit for a fresh seed each run
    #[arg(long, global = true)]
    pub seed: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load catalog CSV files into the store
    Import {
        #[arg(long)]
        foods: PathBuf,
        #[arg(long)]
        nutrition: Option<PathBuf>,
        #[arg(long)]
        allergies: Option<PathBuf>,
        #[arg(long)]
        recommended: Option<PathBuf>,
    },
    /// Generate one day's meal
    Daily {
        #[arg(long)]
        user: UserId,
        /// Defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Generate meals for 7 consecutive days
    Weekly {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        start: Option<NaiveDate>,
    },
    /// Generate meals for 30 consecutive days
    Monthly {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        start: Option<NaiveDate>,
    },
    /// Delete the day's meal and generate a new one
    Regenerate {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Search for a new full day close to a nutrition target
    Refresh {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        date: NaiveDate,
        #[command(flatten)]
        target: TargetArgs,
        /// Previous meal's food ids, comma separated
        #[arg(long, value_delimiter = ',')]
        prev: Option<Vec<FoodId>>,
    },
    /// Replace one slot of the stored meal
    RefreshItem {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        date: NaiveDate,
        /// rice, soup, side_dish1, side_dish2, main_dish or dessert
        #[arg(long)]
        item: String,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Print the stored meal and its nutrition
    Show {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        date: NaiveDate,
    },
    /// Print every meal of a calendar month
    Month {
        #[arg(long)]
        user: UserId,
        #[arg(long)]
        year: i32,
        #[arg(long)]
        month: u32,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Start from the recommended intake for this age
    #[arg(long)]
    pub age: Option<u32>,
    #[arg(long)]
    pub calories: Option<f64>,
    #[arg(long)]
    pub carbohydrate: Option<f64>,
    #[arg(long)]
    pub protein: Option<f64>,
    #[arg(long)]
    pub fat: Option<f64>,
    #[arg(long)]
    pub sodium: Option<f64>,
}

impl TargetArgs {
    pub fn overrides(&self) -> TargetOverrides {
        TargetOverrides {
            calories: self.calories,
            carbohydrate: self.carbohydrate,
            protein: self.protein,
            fat: self.fat,
            sodium: self.sodium,
        }
    }
}

pub fn parse_args() -> Cli {
    Cli::parse()
}
