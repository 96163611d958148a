//! Core types for sluice.
//!
//! This module contains the fundamental data types:
//! - `Record` and `Value` - the data flowing through a recipe
//! - `Outcome` - what a filter produced for one record
//! - `RecipeState` / `StageKind` - lifecycle and stage enums

mod outcome;
mod record;
mod status;
mod value;

pub use outcome::{Outcome, OutcomeIter};
pub use record::Record;
pub use status::{RecipeState, StageKind};
pub use value::Value;
