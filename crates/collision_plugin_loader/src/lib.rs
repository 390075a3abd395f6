//! Plugin loader for collision detector plugins.
//!
//! This crate provides the adapter that discovers, instantiates, and
//! activates a named collision detector plugin and binds it to a shared
//! planning scene. Loaded instances are cached by detector name; the
//! collision detection algorithms, the scene representation, and the plugin
//! ABI itself live in collaborator crates.

mod error;
mod loader;

pub use error::CollisionLoaderError;
pub use loader::{
    CollisionPluginFactory, CollisionPluginLoader, DetectorSelection, LoadedCollisionPlugin,
    PluginSafetyConfig,
};

/// Re-export commonly used types for detector development
pub use collision_interface::{CollisionPlugin, PlanningScene, PluginError};
pub use libloading::Library;
