//! Observability utilities.
//!
//! Recipes log through `tracing`; each run executes inside a `recipe.run`
//! span carrying the recipe name and run id. The helpers here install a
//! subscriber for applications that do not bring their own.

mod logging;

pub use logging::{init_json_logging, init_logging};
