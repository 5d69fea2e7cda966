//! Tracing subscriber setup

use crate::config::LogConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable read when no filter is configured
pub const LOG_ENV: &str = "QUILL_LOG";

/// Install a `fmt` subscriber filtered by the configured directive or `QUILL_LOG`
///
/// Returns `false` when there is no filter to apply, the directive does not
/// parse, or a global subscriber is already installed. Safe to call more
/// than once.
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = match &config.filter {
        Some(directive) => EnvFilter::try_new(directive).ok(),
        None => EnvFilter::try_from_env(LOG_ENV).ok(),
    };
    let Some(filter) = filter else {
        return false;
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_directive_installs_nothing() {
        let config = LogConfig {
            filter: Some("ql_ty=[".to_string()),
        };
        assert!(!init_logging(&config));
    }

    #[test]
    fn test_second_install_is_refused() {
        let config = LogConfig {
            filter: Some("warn".to_string()),
        };
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
