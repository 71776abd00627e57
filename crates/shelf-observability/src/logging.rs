//! Global tracing subscriber setup.

use shelf_core::LogFormat;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "shelf=info,tower_http=info";

/// Errors from subscriber setup.
#[derive(Debug, thiserror::Error)]
pub enum ObservabilityError {
    #[error("invalid log filter `{directives}`: {message}")]
    InvalidFilter { directives: String, message: String },

    #[error("tracing subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_filter`. JSON output carries the current
/// span's fields (request id, method, path) on every event.
pub fn init_tracing(format: LogFormat, default_filter: &str) -> Result<(), ObservabilityError> {
    let filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), default_filter)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
        LogFormat::Human => registry.with(fmt::layer().with_target(true)).try_init(),
    };
    installed.map_err(|e| ObservabilityError::AlreadyInitialized(e.to_string()))
}

/// Pick the env directives if present and non-blank, else the default.
pub fn build_filter(env: Option<&str>, default_filter: &str) -> Result<EnvFilter, ObservabilityError> {
    let directives = env
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(default_filter);
    EnvFilter::try_new(directives).map_err(|e| ObservabilityError::InvalidFilter {
        directives: directives.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_used_when_env_blank() {
        let filter = build_filter(Some("  "), DEFAULT_FILTER).unwrap();
        assert!(filter.to_string().contains("shelf=info"));
    }

    #[test]
    fn test_env_filter_wins() {
        let filter = build_filter(Some("shelf_api=debug"), DEFAULT_FILTER).unwrap();
        let rendered = filter.to_string();
        assert!(rendered.contains("shelf_api=debug"));
        assert!(!rendered.contains("tower_http"));
    }
}
