//! # Collision Plugin Interface
//!
//! This module defines the collision detector plugin interfaces and error
//! types for the scene host. It provides both a high-level and a low-level
//! plugin development interface to support different use cases.
//!
//! ## Plugin Development Approaches
//!
//! ### High-Level: SimpleCollisionPlugin Trait
//! - Safe, easy-to-use interface for most detector plugins
//! - Automatic panic handling and FFI safety
//! - Focus on detector wiring rather than systems programming
//! - Use with the `export_collision_plugin!` macro
//!
//! ### Low-Level: CollisionPlugin Trait
//! - Direct FFI interface for maximum control
//! - Manual panic handling and safety management
//! - Direct dynamic library interface
//!
//! ## Plugin Lifecycle
//!
//! 1. **Creation** - Plugin instance created via `new()`
//! 2. **Activation** - `initialize()` binds the plugin to a planning scene
//! 3. **Operation** - The detector serves the scene until replaced
//! 4. **Shutdown** - Cleanup and resource deallocation
//!
//! ## Error Handling
//!
//! All lifecycle phases report failures through [`PluginError`], with
//! automatic panic isolation so a misbehaving detector cannot crash the
//! host process.

use crate::scene::PlanningScene;
use async_trait::async_trait;
use std::sync::Arc;

// ============================================================================
// Plugin Development Interfaces
// ============================================================================

/// Simplified collision plugin trait that doesn't require unsafe code.
///
/// This trait provides a safe, high-level interface for detector plugin
/// development. The FFI and lifecycle plumbing is handled by the
/// `export_collision_plugin!` macro, so implementors only describe how their
/// detector attaches to a scene.
///
/// # Lifecycle
///
/// 1. **Creation**: Plugin instance is created via `new()`
/// 2. **Activation**: `on_initialize()` is called with the target scene
/// 3. **Shutdown**: `on_shutdown()` is called for cleanup
#[async_trait]
pub trait SimpleCollisionPlugin: Send + Sync + 'static {
    /// Returns the detector name this plugin provides.
    ///
    /// The name must be unique and stable across versions; it is the cache
    /// key the plugin loader uses and the value bound to the scene.
    fn name(&self) -> &str;

    /// Returns the version string of this plugin.
    ///
    /// Should follow semantic versioning (e.g., "1.2.3").
    fn version(&self) -> &str;

    /// Binds this detector to the given planning scene.
    ///
    /// Implementations should perform whatever setup their detector needs and
    /// finish by calling [`PlanningScene::set_active_collision_detector`] with
    /// their own name. Failed initialization leaves the scene's previous
    /// binding untouched.
    async fn on_initialize(&mut self, scene: Arc<PlanningScene>) -> Result<(), PluginError>;

    /// Shutdown the plugin gracefully.
    ///
    /// Called when the plugin is being unloaded or the host is shutting
    /// down. Shutdown errors are logged but don't prevent unloading.
    async fn on_shutdown(&mut self) -> Result<(), PluginError> {
        Ok(()) // Default implementation does nothing
    }
}

/// Low-level collision plugin trait for FFI compatibility.
///
/// This trait defines the interface that plugin dynamic libraries must
/// implement for compatibility with the plugin loader. Most plugin
/// developers should use the [`SimpleCollisionPlugin`] trait instead, which
/// provides a higher-level interface.
///
/// # FFI Safety
///
/// This trait is designed to be safe across FFI boundaries when used with
/// the `export_collision_plugin!` macro, which handles all the necessary
/// panic catching and error conversion.
#[async_trait]
pub trait CollisionPlugin: Send + Sync {
    /// Returns the detector name.
    ///
    /// Must be stable across plugin versions and unique among all detectors.
    fn name(&self) -> &str;

    /// Returns the plugin version string.
    fn version(&self) -> &str;

    /// Binds the detector to the given planning scene.
    ///
    /// Returns `Ok(())` if the detector is now serving the scene, or
    /// `Err(PluginError)` if activation failed. Failure leaves the scene
    /// unchanged.
    async fn initialize(&mut self, scene: Arc<PlanningScene>) -> Result<(), PluginError>;

    /// Shutdown phase for cleanup and resource deallocation.
    async fn shutdown(&mut self) -> Result<(), PluginError>;
}

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during collision plugin operations.
///
/// Covers all error conditions that can arise during plugin lifecycle
/// management, from initialization failures to runtime panics.
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    /// Plugin failed to bind to the planning scene
    #[error("Plugin initialization failed: {0}")]
    InitializationFailed(String),
    /// Error occurred during plugin execution
    #[error("Plugin execution error: {0}")]
    ExecutionError(String),
    /// Requested plugin was not found
    #[error("Plugin not found: {0}")]
    NotFound(String),
    /// Runtime error such as panic or system failure
    #[error("Plugin runtime error: {0}")]
    Runtime(String),
}
