//! # Collision Interface
//!
//! Plugin interface crate for collision detector plugins in the scene host
//! motion-planning runtime. Detector plugins (FCL, Bullet, voxel grids, or
//! an all-valid stand-in) implement the traits defined here, and the
//! `collision_plugin_loader` crate instantiates and activates them against a
//! shared [`PlanningScene`].
//!
//! ## What lives here
//!
//! - [`SimpleCollisionPlugin`] / [`CollisionPlugin`] - the plugin traits
//! - [`export_collision_plugin!`] - FFI export macro for `cdylib` plugins
//! - [`PlanningScene`] - the shared scene handle plugins bind to
//! - [`PluginError`] - lifecycle error type
//! - [`ABI_VERSION`] - compatibility handshake for dynamically loaded plugins
//!
//! ## What deliberately does not live here
//!
//! Collision checking itself. This crate defines how a detector attaches to a
//! scene, not what the detector computes; the checking APIs belong to the
//! detector libraries this interface fronts.

mod macros;
mod plugin;
mod scene;

pub use plugin::{CollisionPlugin, PluginError, SimpleCollisionPlugin};
pub use scene::PlanningScene;

// External dependencies that plugins commonly need
pub use async_trait::async_trait;
pub use futures;
pub use std::sync::Arc;

/// ABI version for plugin compatibility validation.
/// This is derived from the crate version and Rust compiler version to ensure plugins are compatible.
/// Format: "major.minor.patch:rust_version"
/// Example: "0.3.0:1.75.0" or "0.3.0:unknown"
pub const ABI_VERSION: &str = {
    const CRATE_VERSION: &str = env!("CARGO_PKG_VERSION");

    // Set by build.rs after attempting to detect the actual Rust version
    const RUST_VERSION: &str = env!("SCENE_HOST_RUSTC_VERSION");

    const_format::concatcp!(CRATE_VERSION, ":", RUST_VERSION)
};

/// Returns build info string with version and Rust compiler version (if available)
pub fn collision_interface_build_info() -> String {
    format!(
        "Collision Interface v{} with Rust compiler v{}",
        env!("CARGO_PKG_VERSION"),
        env!("SCENE_HOST_RUSTC_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_version_format() {
        // The ABI version should be in "crate_version:rust_version" format;
        // the loader splits on ':' when validating plugins.
        assert!(ABI_VERSION.contains(':'), "ABI version should contain ':' separator");

        let parts: Vec<&str> = ABI_VERSION.split(':').collect();
        assert_eq!(parts.len(), 2, "ABI version should have exactly 2 parts separated by ':'");

        let crate_version = parts[0];
        let rust_version = parts[1];

        assert!(!crate_version.is_empty(), "Crate version should not be empty");
        assert!(crate_version.contains('.'), "Crate version should contain '.' separators");
        assert!(!rust_version.is_empty(), "Rust version should not be empty");
    }

    #[test]
    fn test_build_info_mentions_crate_version() {
        let info = collision_interface_build_info();
        assert!(info.contains(env!("CARGO_PKG_VERSION")));
    }
}
