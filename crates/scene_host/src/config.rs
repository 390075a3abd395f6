//! Configuration management for the scene host.
//!
//! This module handles loading, validation, and conversion of host
//! configuration from TOML files and command-line arguments.

use collision_plugin_loader::DetectorSelection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Application configuration loaded from TOML file.
///
/// Encompasses all host settings: the planning scene, the collision detector
/// choice, plugin search paths, and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Planning scene settings
    pub scene: SceneSettings,
    /// Move-group-scoped settings, shared with visualization tooling
    #[serde(default)]
    pub move_group: MoveGroupSettings,
    /// Plugin configuration settings
    pub plugins: PluginSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Planning-scene configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSettings {
    /// Name of the planning scene the host builds
    pub name: String,
    /// Collision detector to activate on the scene.
    /// When absent, the move-group-scoped parameter is consulted instead.
    #[serde(default)]
    pub collision_detector: Option<String>,
}

/// Settings scoped to the move-group namespace.
///
/// Tools that render or replay planning scenes read the detector name from
/// here when the host itself does not set one, so both ends use the same
/// detector.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoveGroupSettings {
    /// Fallback collision detector name
    #[serde(default)]
    pub collision_detector: Option<String>,
}

/// Plugin-loading configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSettings {
    /// Directories searched for detector plugin libraries
    pub directories: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config file
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Validates the configuration.
    ///
    /// Checks that the scene name is set and the log level is one the
    /// tracing filter understands.
    pub fn validate(&self) -> Result<(), String> {
        if self.scene.name.trim().is_empty() {
            return Err("scene.name must not be empty".to_string());
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(format!(
                    "invalid logging.level '{}' (expected trace, debug, info, warn, or error)",
                    other
                ));
            }
        }

        Ok(())
    }

    /// The configured collision detector choice, in the loader's terms.
    pub fn detector_selection(&self) -> DetectorSelection {
        DetectorSelection {
            collision_detector: self.scene.collision_detector.clone(),
            move_group_collision_detector: self.move_group.collision_detector.clone(),
        }
    }

    /// Plugin search directories as paths.
    pub fn plugin_directories(&self) -> Vec<PathBuf> {
        self.plugins.directories.iter().map(PathBuf::from).collect()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            scene: SceneSettings {
                name: "planning_scene".to_string(),
                collision_detector: Some("AllValid".to_string()),
            },
            move_group: MoveGroupSettings::default(),
            plugins: PluginSettings {
                directories: vec!["plugins".to_string()],
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(
            config.detector_selection().resolved(),
            Some("AllValid")
        );
        assert_eq!(config.plugin_directories(), vec![PathBuf::from("plugins")]);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();

        config.scene.name = "  ".to_string();
        assert!(config.validate().is_err());

        config.scene.name = "workcell".to_string();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_move_group_fallback_round_trips_through_toml() {
        let toml_content = r#"
            [scene]
            name = "workcell"

            [move_group]
            collision_detector = "Bullet"

            [plugins]
            directories = ["plugins", "/opt/detectors"]

            [logging]
            level = "info"
            json_format = false
        "#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.scene.collision_detector, None);
        assert_eq!(config.detector_selection().resolved(), Some("Bullet"));
        assert_eq!(config.plugins.directories.len(), 2);
    }
}
