//! Tracing subscriber setup

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Modules whose output the Duitku logging toggle controls.
const PAYMENT_TARGETS: [&str; 4] = [
    "duitku_gateway::payments",
    "duitku_gateway::services",
    "duitku_gateway::api",
    "duitku_gateway::workers",
];

/// Filter directives: an explicit `RUST_LOG` wins, otherwise `LOG_LEVEL`.
/// With payment logging disabled the payment targets are switched off.
pub fn filter_directives(
    rust_log: Option<String>,
    config: &LoggingConfig,
    payment_logging: bool,
) -> String {
    let mut directives = rust_log
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| format!("{},tower_http=info,sqlx=warn", config.level.to_lowercase()));

    if !payment_logging {
        for target in PAYMENT_TARGETS {
            directives.push_str(&format!(",{}=off", target));
        }
    }
    directives
}

pub fn build_filter(config: &LoggingConfig, payment_logging: bool) -> EnvFilter {
    let directives = filter_directives(std::env::var("RUST_LOG").ok(), config, payment_logging);
    EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize the global subscriber. Safe to call more than once.
pub fn init_tracing(config: &LoggingConfig, payment_logging: bool) {
    let filter = build_filter(config, payment_logging);

    let result = match config.format {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Plain => tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> LoggingConfig {
        LoggingConfig {
            level: "INFO".to_string(),
            format: LogFormat::Plain,
        }
    }

    #[test]
    fn disabled_payment_logging_silences_payment_targets() {
        let filter = filter_directives(None, &config(), false);
        assert!(filter.contains("duitku_gateway::payments=off"));
        assert!(filter.contains("duitku_gateway::services=off"));
    }

    #[test]
    fn enabled_payment_logging_keeps_defaults() {
        let filter = filter_directives(None, &config(), true);
        assert!(!filter.contains("=off"));
        assert!(filter.starts_with("info,"));
    }

    #[test]
    fn rust_log_overrides_level() {
        let filter = filter_directives(Some("debug".to_string()), &config(), false);
        assert!(filter.starts_with("debug,"));
    }
}
