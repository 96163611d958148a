//! Cooperative cancellation for recipe runs.
//!
//! A recipe checks its token before pulling each record from the source, so
//! cancellation takes effect at the next record boundary.

mod token;

pub use token::{CancelCallback, CancellationToken};
