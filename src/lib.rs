pub mod allergy;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod nutrition;
pub mod planner;
pub mod search;
pub mod store;
