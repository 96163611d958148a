//! # Sluice
//!
//! An embeddable, pull-driven record pipeline runner.
//!
//! A [`Recipe`](pipeline::Recipe) wires one source through an ordered list of
//! filters and emitters:
//!
//! - **Sources** produce records lazily, one at a time
//! - **Filters** turn one record into zero, one or many records
//! - **Emitters** perform a side effect and pass records through unchanged;
//!   several emitters may share an attachment point
//!
//! Each record is driven depth-first through every stage before the next one
//! is pulled. A record that fails is set aside as an error record and the run
//! moves on, unless the recipe is configured to fail fast.
//!
//! ## Quick Start
//!
//! ```rust
//! use sluice::prelude::*;
//! use sluice::stages::filters::FieldRenamer;
//!
//! let out = CollectingEmitter::new("out");
//! let collected = out.handle();
//!
//! let mut recipe = Recipe::builder("rename")
//!     .filter(FieldRenamer::new([("name", "title")]))
//!     .emitter(out)
//!     .build()?;
//!
//! let report = recipe.run(IterSource::new(vec![
//!     Record::new().with("title", "first"),
//!     Record::new().with("title", "second"),
//! ]));
//!
//! assert!(report.is_completed());
//! assert_eq!(collected.records()[1].get_str("name"), Some("second"));
//! # Ok::<(), sluice::errors::RecipeValidationError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod sources;
pub mod stages;
pub mod testing;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::core::{Outcome, RecipeState, Record, StageKind, Value};
    pub use crate::errors::{
        ContractErrorInfo, RecipeValidationError, SluiceError, SourceError, StageError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::pipeline::{
        run_recipe, AbortInfo, AbortReason, Chain, EmitterFailurePolicy, ErrorRecord,
        FailureMode, Recipe, RecipeBuilder, RecipeConfig, RunReport,
    };
    pub use crate::sources::{IterSource, JsonLinesSource, Source};
    pub use crate::stages::emitters::{
        CollectingEmitter, CountEmitter, DebugEmitter, JsonLinesEmitter, LoggingEmitter,
    };
    pub use crate::stages::{Emitter, Filter, FnEmitter, FnFilter, NoOpFilter};
    pub use crate::utils::{generate_run_id, iso_timestamp, Timestamp};
}
