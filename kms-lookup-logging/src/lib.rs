//! Structured logging setup for the KMS lookup tools

use tracing_subscriber::{
    fmt,
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output format of the log layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line (for production)
    Json,
    /// Human-readable lines (for development)
    #[default]
    Console,
}

/// `RUST_LOG` wins; otherwise the given default level
fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize JSON logging
///
/// Lines carry target, file and line number. Safe to call twice; the
/// second call is ignored.
pub fn init_logging(service_name: &str, default_level: &str) {
    let installed = tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .json()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_current_span(true)
                .with_span_list(false),
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = service_name, "Logging initialized");
    }
}

/// Initialize human-readable console logging on stderr
pub fn init_console_logging(service_name: &str, default_level: &str) {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = service_name, "Console logging initialized");
    }
}

/// Initialize logging in the requested format
pub fn init(format: LogFormat, service_name: &str, default_level: &str) {
    match format {
        LogFormat::Json => init_logging(service_name, default_level),
        LogFormat::Console => init_console_logging(service_name, default_level),
    }
}
