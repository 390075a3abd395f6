//! Main application logic and lifecycle management.
//!
//! Contains the core `Application` struct that orchestrates scene creation,
//! collision plugin loading, detector activation, and shutdown.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner};
use collision_interface::PlanningScene;
use collision_plugin_loader::CollisionPluginLoader;
use std::sync::Arc;
use tracing::{info, warn};

/// Main application struct for the scene host.
///
/// Manages the complete lifecycle: configuration loading, scene construction,
/// plugin loader setup, detector activation, and graceful cleanup.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Collision plugin loader instance
    loader: CollisionPluginLoader,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, and
    /// builds the collision plugin loader.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Build the plugin loader from configuration
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Extract plugin safety config before consuming args
        let plugin_safety_config = args.to_plugin_safety_config();

        // Apply CLI overrides
        if let Some(plugin_dir) = args.plugin_dir {
            config.plugins.directories = vec![plugin_dir.to_string_lossy().to_string()];
        }

        if let Some(detector) = args.detector {
            config.scene.collision_detector = Some(detector);
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        // Validate configuration
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        display_banner();

        let loader =
            CollisionPluginLoader::new(config.plugin_directories(), plugin_safety_config);

        info!(
            "📂 Config: {} | Plugin directories: {:?}",
            args.config_path.display(),
            config.plugins.directories
        );

        Ok(Self { config, loader })
    }

    /// Runs the application.
    ///
    /// Builds the planning scene, activates the configured collision
    /// detector against it, reports the outcome, and shuts the loader down.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting scene host");

        let available = self.loader.available_plugin_libraries();
        info!("🔍 Found {} collision plugin library file(s)", available.len());

        let scene = Arc::new(PlanningScene::new(self.config.scene.name.clone()));
        info!("🗺️ Planning scene created: {}", scene.name());

        let selection = self.config.detector_selection();
        self.loader.setup_scene(&selection, &scene).await;

        match scene.collision_detector_name() {
            Some(detector) => {
                info!("✅ Scene '{}' is using collision detector: {}", scene.name(), detector);
            }
            None => {
                warn!(
                    "⚠️ Scene '{}' has no active collision detector",
                    scene.name()
                );
            }
        }

        self.loader.shutdown().await?;
        info!("👋 Scene host finished");

        Ok(())
    }
}
