//! Shared tracing/logging initialization.
//!
//! The `teleport` binary and any embedding front-end set up
//! `tracing_subscriber` the same way: an env-filter plus optional JSON output.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialise the global tracing subscriber.
///
/// * `default_filter` -- filter used when `RUST_LOG` is not set
///   (e.g. `"teleport=info,teleport_core=info"`).
/// * `log_json` -- when `true`, emit structured JSON log lines instead of the
///   human-readable format.
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_tracing(default_filter: &str, log_json: bool) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };
    result.is_ok()
}

/// Build the default filter string for a binary crate at `level`.
pub fn default_filter(binary_crate: &str, level: &str) -> String {
    format!("{binary_crate}={level},teleport_core={level}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_core_crate() {
        assert_eq!(
            default_filter("teleport", "debug"),
            "teleport=debug,teleport_core=debug"
        );
    }
}
