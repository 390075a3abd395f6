//! Logging system setup and configuration.
//!
//! Initializes the tracing-based logging system with support for both
//! human-readable and JSON output formats.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initializes the logging system with the specified configuration.
///
/// Sets up tracing-subscriber with appropriate formatting and filtering based
/// on the provided logging settings and CLI overrides. Respects `RUST_LOG`
/// when set.
pub fn setup_logging(
    config: &LoggingSettings,
    json_format: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if json_format || config.json_format {
        // JSON formatting for structured logging
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();
    } else {
        // Human-readable formatting for development
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .init();
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Displays the startup banner using proper logging.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("╔══════════════════════════════════════════╗");
    info!("║            🦾 SCENE HOST v{}          ║", version);
    info!("║                                          ║");
    info!("║  Motion-Planning Scene Host              ║");
    info!("║  with Pluggable Collision Detection      ║");
    info!("║                                          ║");
    info!("║  🧩 Named Detector Plugins               ║");
    info!("║  🛡️  Panic-Isolated Plugin ABI            ║");
    info!("║  📦 Cached Detector Instances            ║");
    info!("╚══════════════════════════════════════════╝");
}
