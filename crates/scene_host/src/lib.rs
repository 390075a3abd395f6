//! # Scene Host - Main Entry Point
//!
//! Host application that builds a planning scene and binds the configured
//! collision detector plugin to it. This entry point handles CLI parsing,
//! configuration loading, and application lifecycle management.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! scene_host
//!
//! # Specify custom configuration
//! scene_host --config production.toml
//!
//! # Override specific settings
//! scene_host --plugins /opt/detectors --detector AllValid --log-level debug
//!
//! # JSON logging for production
//! scene_host --json-logs
//! ```
//!
//! ## Configuration
//!
//! The host loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created. The
//! collision detector is chosen by the `scene.collision_detector` parameter,
//! falling back to `move_group.collision_detector` so visualization tooling
//! shares the same detector.

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Main entry point for the scene host.
///
/// Handles the complete application lifecycle:
/// 1. Command-line argument parsing
/// 2. Configuration loading and validation
/// 3. Logging system initialization
/// 4. Application creation and execution
/// 5. Error handling and cleanup
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments first
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();

    // Setup logging before anything else
    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    // Create and run application
    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export main types for potential library usage
pub use config::{AppConfig as HostConfig, LoggingSettings, PluginSettings, SceneSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector_selection().resolved(), Some("AllValid"));
    }

    #[test]
    fn test_cli_argument_structure() {
        let args = CliArgs {
            config_path: PathBuf::from("test.toml"),
            plugin_dir: Some(PathBuf::from("test_plugins")),
            detector: Some("AllValid".to_string()),
            log_level: Some("debug".to_string()),
            json_logs: true,
            danger_allow_unsafe_plugins: false,
            danger_allow_abi_mismatch: true,
            strict_versioning: false,
        };

        assert_eq!(args.config_path, PathBuf::from("test.toml"));
        assert_eq!(args.plugin_dir, Some(PathBuf::from("test_plugins")));
        assert_eq!(args.detector, Some("AllValid".to_string()));
        assert!(args.json_logs);

        let safety = args.to_plugin_safety_config();
        assert!(!safety.allow_unsafe_plugins);
        assert!(safety.allow_abi_mismatch);
        assert!(!safety.strict_versioning);
    }

    #[tokio::test]
    async fn test_config_file_round_trip() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        // First load creates the default file
        let created = AppConfig::load_from_file(&config_path).await.unwrap();
        assert!(config_path.exists());

        // Second load reads it back
        let loaded = AppConfig::load_from_file(&config_path).await.unwrap();
        assert_eq!(loaded.scene.name, created.scene.name);
        assert_eq!(
            loaded.detector_selection().resolved(),
            created.detector_selection().resolved()
        );
    }
}
