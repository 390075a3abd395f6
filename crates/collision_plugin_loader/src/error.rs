//! Error types for the collision plugin loader.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollisionLoaderError {
    #[error("Plugin loading error: {0}")]
    LoadingError(String),

    #[error("Plugin initialization error: {0}")]
    InitializationError(String),

    #[error("Collision detector not found: {0}")]
    PluginNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Library loading error: {0}")]
    LibraryError(String),

    #[error("Collision detector already loaded: {0}")]
    PluginAlreadyExists(String),

    #[error("Plugin version mismatch: {0}")]
    VersionMismatch(String),
}
