//! Subscriber setup.
//!
//! Builds a `tracing-subscriber` registry with an `EnvFilter` and either a
//! pretty console layer or a JSON layer.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Guard returned by [`init_tracing`]. Logs shutdown when dropped.
#[must_use = "dropping the guard logs shutdown immediately"]
pub struct TracingGuard {
    service_name: String,
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        tracing::info!(service = %self.service_name, "Shutting down tracing");
    }
}

/// Install the global tracing subscriber.
///
/// Returns [`TelemetryError::AlreadyInitialized`] when a global subscriber
/// already exists.
pub fn init_tracing(config: &TelemetryConfig) -> Result<TracingGuard, TelemetryError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Filter(e.to_string()))?;

    let result = if !config.console_output {
        tracing_subscriber::registry().with(env_filter).try_init()
    } else if config.json_logs {
        // JSON output for containers/production
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(json_layer)
            .try_init()
    } else {
        // Pretty output for development
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
    };
    result.map_err(|_| TelemetryError::AlreadyInitialized)?;

    tracing::info!(
        service = %config.service_name,
        json = config.json_logs,
        "Tracing initialized"
    );

    Ok(TracingGuard {
        service_name: config.service_name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Global subscriber state: everything lives in one test to keep ordering fixed.
    #[test]
    fn test_second_init_reports_already_initialized() {
        let config = TelemetryConfig {
            console_output: false,
            ..TelemetryConfig::default()
        };

        let first = init_tracing(&config);
        assert!(first.is_ok());

        let second = init_tracing(&config);
        assert!(matches!(second, Err(TelemetryError::AlreadyInitialized)));
    }

    #[test]
    fn test_invalid_filter_is_rejected() {
        // Only reachable when RUST_LOG is not set to a valid directive.
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "ua_transport=loud".to_string(),
            ..TelemetryConfig::default()
        };
        assert!(matches!(init_tracing(&config), Err(TelemetryError::Filter(_))));
    }
}
