//! Utility functions for run ids and timestamp handling.

pub mod timestamps;

pub use timestamps::{elapsed_ms, iso_timestamp, now_utc, Timestamp};

use uuid::Uuid;

/// Generates a new random (v4) run id.
#[must_use]
pub fn generate_run_id() -> Uuid {
    Uuid::new_v4()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_run_id_is_v4() {
        let id = generate_run_id();
        assert_eq!(id.get_version_num(), 4);
        assert_ne!(id, generate_run_id());
    }
}
