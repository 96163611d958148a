//! Recipe building and execution.
//!
//! This module provides:
//! - Chains: reusable, ordered stage lists
//! - The recipe builder with validation
//! - The depth-first run loop
//! - Failure modes, error records and run reports

mod chain;
mod config;
mod failure_tolerance;
mod recipe;
mod report;


pub use chain::{Chain, StageInfo};
pub use config::RecipeConfig;
pub use failure_tolerance::{
    decide, EmitterFailurePolicy, ErrorCollector, ErrorRecord, FailureAction, FailureMode,
};
pub use recipe::{run_recipe, ErrorCallback, Recipe, RecipeBuilder};
pub use report::{AbortInfo, AbortReason, RunReport};
