//! Subscriber installation.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Installs a human-readable fmt subscriber.
///
/// Uses the `RUST_LOG` env var if set, otherwise falls back to the provided
/// level.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_logging(default_level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install subscriber: {e}"))
}

/// Installs a JSON fmt subscriber with span context on every line.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init_json_logging(default_level: &str) -> Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_current_span(true)
        .with_env_filter(env_filter(default_level))
        .try_init()
        .map_err(|e| anyhow!("failed to install subscriber: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_install_fails() {
        // Whichever test installs first wins; the other call must report it.
        let first = init_logging("debug");
        let second = init_json_logging("debug");
        assert!(first.is_err() || second.is_err());
    }
}
