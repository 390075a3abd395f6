//! Collision plugin loader implementation.
//!
//! Discovers, instantiates, and activates named collision detector plugins
//! and binds them to a shared planning scene. Loaded instances are cached by
//! detector name, so repeated activations of the same detector reuse the
//! existing instance.

use crate::error::CollisionLoaderError;
use collision_interface::{CollisionPlugin, PlanningScene};
use dashmap::DashMap;
use libloading::{Library, Symbol};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Configuration for plugin loading safety checks.
///
/// These flags allow users to override safety validations when they understand the risks.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PluginSafetyConfig {
    /// Ignore Rust compiler version differences between plugin and host.
    /// WARNING: This may cause crashes due to ABI incompatibilities.
    pub allow_unsafe_plugins: bool,

    /// Ignore crate version differences between plugin and host.
    /// WARNING: This may cause crashes or undefined behavior.
    pub allow_abi_mismatch: bool,

    /// Require exact version matching including patch digits.
    /// When false, only major.minor must match (ignoring patch).
    pub strict_versioning: bool,
}

/// The configured collision detector choice for a scene.
///
/// Mirrors the two places the detector name may be configured: the host's own
/// `collision_detector` parameter, and a move-group-scoped fallback so
/// visualization tooling ends up with the same detector as the planner.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct DetectorSelection {
    /// Primary detector name parameter
    pub collision_detector: Option<String>,
    /// Fallback consulted only when the primary parameter is absent
    pub move_group_collision_detector: Option<String>,
}

impl DetectorSelection {
    /// Resolves the configured detector name.
    ///
    /// The primary parameter wins when present, even when empty: an empty
    /// primary name means "explicitly no detector" and the fallback is not
    /// consulted. An empty resolved name yields `None`.
    pub fn resolved(&self) -> Option<&str> {
        let name = match &self.collision_detector {
            Some(name) => name.as_str(),
            None => match &self.move_group_collision_detector {
                Some(name) => name.as_str(),
                None => return None,
            },
        };

        if name.is_empty() {
            // Not a valid name for a collision detector plugin
            return None;
        }
        Some(name)
    }
}

/// Factory for collision detectors that are linked into the host itself.
///
/// The in-process counterpart of a dynamic plugin library: the loader treats
/// a registered factory as an already-resolved detector and prefers it over
/// a filesystem search.
pub trait CollisionPluginFactory: Send + Sync {
    /// Create a new detector plugin instance
    fn create(&self) -> Result<Box<dyn CollisionPlugin>, CollisionLoaderError>;

    /// Name of the detector this factory produces
    fn detector_name(&self) -> &str;

    /// Version of the detector this factory produces
    fn detector_version(&self) -> &str;
}

/// Information about a loaded collision detector plugin
pub struct LoadedCollisionPlugin {
    /// The detector name this instance was loaded under
    pub name: String,
    /// The loaded library (None for factory-created detectors)
    pub library: Option<Library>,
    /// The plugin instance. Shared behind an async mutex so callers never
    /// hold a cache shard lock across the plugin's own await points.
    pub plugin: Arc<Mutex<Box<dyn CollisionPlugin>>>,
}

/// Loader that instantiates and activates named collision detector plugins.
///
/// The `CollisionPluginLoader` handles:
/// - Resolution of detector names to plugin libraries or registered factories
/// - Dynamic loading of plugin libraries with ABI validation
/// - Caching of loaded instances by detector name
/// - Activation: binding a detector to a shared planning scene
/// - Plugin cleanup and shutdown
///
/// It deliberately does not define collision detection semantics, the scene
/// representation, or the plugin ABI itself; those belong to the detector
/// libraries and the dynamic loading machinery.
pub struct CollisionPluginLoader {
    /// Map of loaded detector instances by name
    plugins: DashMap<String, LoadedCollisionPlugin>,
    /// Registered in-process detector factories by name
    factories: DashMap<String, Box<dyn CollisionPluginFactory>>,
    /// Directories searched for detector plugin libraries
    search_directories: Vec<PathBuf>,
    /// Safety configuration for plugin loading
    safety_config: PluginSafetyConfig,
}

impl CollisionPluginLoader {
    /// Creates a new loader with the given library search directories and
    /// safety configuration.
    pub fn new(search_directories: Vec<PathBuf>, safety_config: PluginSafetyConfig) -> Self {
        Self {
            plugins: DashMap::new(),
            factories: DashMap::new(),
            search_directories,
            safety_config,
        }
    }

    /// Registers an in-process detector factory.
    ///
    /// Registered factories take priority over library files when a detector
    /// name is loaded.
    pub fn register_factory(
        &self,
        factory: Box<dyn CollisionPluginFactory>,
    ) -> Result<(), CollisionLoaderError> {
        let name = factory.detector_name().to_string();
        if self.factories.contains_key(&name) {
            return Err(CollisionLoaderError::PluginAlreadyExists(name));
        }
        info!(
            "🔌 Registered collision detector factory: {} v{}",
            name,
            factory.detector_version()
        );
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Loads the named collision detector and inserts it into the cache.
    ///
    /// Resolution order: a registered factory first, then a plugin library
    /// found under the configured search directories. The instance is cached
    /// only when instantiation succeeds.
    pub async fn load(&self, name: &str) -> Result<(), CollisionLoaderError> {
        if self.plugins.contains_key(name) {
            return Err(CollisionLoaderError::PluginAlreadyExists(name.to_string()));
        }

        if self.factories.contains_key(name) {
            return self.load_from_factory(name);
        }

        let library_path = self.resolve_plugin_library(name)?;
        self.load_from_library(name, &library_path)
    }

    /// Instantiates a detector from a registered factory.
    fn load_from_factory(&self, name: &str) -> Result<(), CollisionLoaderError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| CollisionLoaderError::PluginNotFound(name.to_string()))?;

        info!("🔄 Creating collision detector from factory: {}", name);
        let plugin = factory.create()?;

        self.plugins.insert(
            name.to_string(),
            LoadedCollisionPlugin {
                name: name.to_string(),
                library: None,
                plugin: Arc::new(Mutex::new(plugin)),
            },
        );

        info!("✅ Successfully loaded collision detector: {}", name);
        Ok(())
    }

    /// Resolves a detector name to a plugin library file.
    ///
    /// A detector named `AllValid` is looked up as `libplugin_allvalid.so`
    /// (or `plugin_allvalid.dll` / `libplugin_allvalid.dylib`) across the
    /// configured search directories.
    fn resolve_plugin_library(&self, name: &str) -> Result<PathBuf, CollisionLoaderError> {
        let stem = format!("plugin_{}", name.to_lowercase());

        #[cfg(target_os = "windows")]
        let candidates = vec![format!("{stem}.dll")];

        #[cfg(target_os = "macos")]
        let candidates = vec![format!("lib{stem}.dylib"), format!("{stem}.dylib")];

        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let candidates = vec![format!("lib{stem}.so"), format!("{stem}.so")];

        for directory in &self.search_directories {
            for candidate in &candidates {
                let path = directory.join(candidate);
                if path.is_file() {
                    return Ok(path);
                }
            }
        }

        Err(CollisionLoaderError::PluginNotFound(format!(
            "no plugin library for detector '{}' under {:?}",
            name, self.search_directories
        )))
    }

    /// Discovers plugin library files in the given directory.
    ///
    /// Looks for files with platform-specific dynamic library extensions
    /// (.dll on Windows, .so on Unix-like systems, .dylib on macOS).
    fn discover_plugin_files<P: AsRef<Path>>(
        &self,
        directory: P,
    ) -> Result<Vec<PathBuf>, CollisionLoaderError> {
        let mut plugin_files = Vec::new();

        for entry in std::fs::read_dir(directory)? {
            let entry = entry?;
            let path = entry.path();

            if path.is_file() {
                if let Some(extension) = path.extension() {
                    let ext_str = extension.to_string_lossy().to_lowercase();

                    #[cfg(target_os = "windows")]
                    let is_plugin = ext_str == "dll";

                    #[cfg(target_os = "macos")]
                    let is_plugin = ext_str == "dylib";

                    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
                    let is_plugin = ext_str == "so";

                    if is_plugin {
                        plugin_files.push(path);
                    }
                }
            }
        }

        Ok(plugin_files)
    }

    /// Lists all plugin library files found under the search directories.
    ///
    /// Missing directories are skipped with a warning rather than failing,
    /// since an empty plugin setup is a valid configuration.
    pub fn available_plugin_libraries(&self) -> Vec<PathBuf> {
        let mut libraries = Vec::new();
        for directory in &self.search_directories {
            if !directory.is_dir() {
                warn!("Plugin directory does not exist: {}", directory.display());
                continue;
            }
            match self.discover_plugin_files(directory) {
                Ok(mut files) => libraries.append(&mut files),
                Err(e) => warn!(
                    "Failed to scan plugin directory {}: {}",
                    directory.display(),
                    e
                ),
            }
        }
        libraries
    }

    /// Loads a detector plugin from the specified library file.
    fn load_from_library(&self, name: &str, path: &Path) -> Result<(), CollisionLoaderError> {
        info!("🔄 Loading collision detector from: {}", path.display());

        // Load the dynamic library
        let library = unsafe {
            Library::new(path).map_err(|e| {
                CollisionLoaderError::LibraryError(format!("Failed to load library: {}", e))
            })?
        };

        // Look for the plugin version function
        let get_plugin_version: Symbol<unsafe extern "C" fn() -> *const std::os::raw::c_char> = unsafe {
            library.get(b"get_plugin_version").map_err(|e| {
                CollisionLoaderError::LoadingError(format!(
                    "Plugin does not export 'get_plugin_version' function: {}",
                    e
                ))
            })?
        };

        // Get plugin version string
        let plugin_version_ptr = unsafe { get_plugin_version() };
        if plugin_version_ptr.is_null() {
            return Err(CollisionLoaderError::LoadingError(
                "Plugin returned null version string".to_string(),
            ));
        }
        let plugin_version = unsafe {
            std::ffi::CStr::from_ptr(plugin_version_ptr)
                .to_string_lossy()
                .to_string()
        };

        // Parse versions and validate compatibility
        let expected_version = collision_interface::ABI_VERSION;
        self.validate_plugin_compatibility(&plugin_version, expected_version)?;

        // Look for the plugin creation function
        let create_plugin: Symbol<unsafe extern "C" fn() -> *mut dyn CollisionPlugin> = unsafe {
            library.get(b"create_plugin").map_err(|e| {
                CollisionLoaderError::LoadingError(format!(
                    "Plugin does not export 'create_plugin' function: {}",
                    e
                ))
            })?
        };

        // Create the plugin instance
        let plugin_ptr = unsafe { create_plugin() };
        if plugin_ptr.is_null() {
            return Err(CollisionLoaderError::LoadingError(
                "Plugin creation function returned null".to_string(),
            ));
        }

        let plugin = unsafe { Box::from_raw(plugin_ptr) };

        let reported_name = plugin.name().to_string();
        if reported_name != name {
            warn!(
                "Detector '{}' loaded from {} reports name '{}'; caching under the requested name",
                name,
                path.display(),
                reported_name
            );
        }

        self.plugins.insert(
            name.to_string(),
            LoadedCollisionPlugin {
                name: name.to_string(),
                library: Some(library),
                plugin: Arc::new(Mutex::new(plugin)),
            },
        );

        info!("✅ Successfully loaded collision detector: {}", name);
        Ok(())
    }

    /// Activates the named collision detector against the given scene.
    ///
    /// Performs-or-reuses a [`load`](Self::load) of the named detector, then
    /// delegates to the plugin's own `initialize` contract. Failures are
    /// logged and reported as `false`; activation never aborts the host.
    pub async fn activate(&self, name: &str, scene: &Arc<PlanningScene>) -> bool {
        if !self.plugins.contains_key(name) {
            if let Err(e) = self.load(name).await {
                error!("❌ Exception while loading {}: {}", name, e);
                return false;
            }
        }

        // Clone the instance handle out of the cache so no shard guard is
        // held across the plugin's await points; a guard held there can
        // wedge every other task touching the same entry.
        let Some(plugin) = self.plugins.get(name).map(|entry| entry.plugin.clone()) else {
            return false;
        };

        let activated = match plugin.lock().await.initialize(scene.clone()).await {
            Ok(()) => {
                info!("✅ Collision detector activated: {}", name);
                true
            }
            Err(e) => {
                error!("❌ Collision detector initialization failed for {}: {}", name, e);
                false
            }
        };
        activated
    }

    /// Binds the configured collision detector to the scene, if one is set.
    ///
    /// Reads the detector name from `selection` (primary parameter first,
    /// move-group fallback second). Does nothing when no detector is
    /// configured or the configured name is empty.
    pub async fn setup_scene(&self, selection: &DetectorSelection, scene: &Arc<PlanningScene>) {
        let Some(detector_name) = selection.resolved() else {
            return;
        };

        self.activate(detector_name, scene).await;
        info!(
            "Using collision detector: {}",
            scene
                .collision_detector_name()
                .unwrap_or_else(|| "none".to_string())
        );
    }

    /// Gets the number of currently loaded detector instances.
    pub fn plugin_count(&self) -> usize {
        self.plugins.len()
    }

    /// Gets a list of loaded detector names.
    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Checks if a detector with the given name is loaded.
    pub fn is_plugin_loaded(&self, name: &str) -> bool {
        self.plugins.contains_key(name)
    }

    /// Unloads a specific detector plugin.
    pub async fn unload(&self, name: &str) -> Result<(), CollisionLoaderError> {
        info!("🛑 Unloading collision detector: {}", name);

        // Shutdown the plugin first, without a cache guard held across the await
        let plugin = self.plugins.get(name).map(|entry| entry.plugin.clone());
        if let Some(plugin) = plugin {
            if let Err(e) = plugin.lock().await.shutdown().await {
                error!("❌ Detector shutdown failed for {}: {}", name, e);
                // Continue with unloading even if shutdown failed
            }
        }

        if let Some((_, loaded_plugin)) = self.plugins.remove(name) {
            // Drop the plugin instance before its library
            drop(loaded_plugin.plugin);
            if let Some(library) = loaded_plugin.library {
                info!("📚 Unloading library for detector: {}", name);
                drop(library);
            }
            Ok(())
        } else {
            Err(CollisionLoaderError::PluginNotFound(name.to_string()))
        }
    }

    /// Shuts down all loaded detector plugins and cleans up resources.
    ///
    /// Should be called when the host is shutting down so detectors have a
    /// chance to release their resources in a controlled order.
    pub async fn shutdown(&self) -> Result<(), CollisionLoaderError> {
        info!("🛑 Shutting down {} collision detector(s)", self.plugins.len());

        let detector_names: Vec<String> =
            self.plugins.iter().map(|entry| entry.key().clone()).collect();
        let mut libraries_to_unload = Vec::new();

        for name in &detector_names {
            let plugin = self.plugins.get(name).map(|entry| entry.plugin.clone());
            if let Some(plugin) = plugin {
                match plugin.lock().await.shutdown().await {
                    Ok(()) => {
                        info!("✅ Detector shutdown completed: {}", name);
                    }
                    Err(e) => {
                        error!("❌ Detector shutdown failed for {}: {}", name, e);
                        // Continue shutting down other detectors
                    }
                }
            }
        }

        // Remove detectors from the map; plugin instances must drop before
        // their libraries
        for name in &detector_names {
            if let Some((_, loaded_plugin)) = self.plugins.remove(name) {
                drop(loaded_plugin.plugin);
                if let Some(library) = loaded_plugin.library {
                    libraries_to_unload.push((name.clone(), library));
                }
            }
        }

        // Give any remaining references time to be cleaned up
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        // Unload libraries in reverse order (LIFO)
        libraries_to_unload.reverse();

        // On Windows, aggressive library unloading can cause access violations
        // if there are still references in the system
        #[cfg(windows)]
        let should_unload_libraries = std::env::var("SCENE_HOST_UNLOAD_PLUGIN_LIBRARIES")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        #[cfg(not(windows))]
        let should_unload_libraries = true;

        if should_unload_libraries {
            for (name, library) in libraries_to_unload {
                info!("📚 Unloading library for detector: {}", name);
                drop(library);
            }
        } else {
            info!("📚 Skipping library unloading for safety (set SCENE_HOST_UNLOAD_PLUGIN_LIBRARIES=true to enable)");
            // Let the libraries leak; the OS cleans them up on process exit
            std::mem::forget(libraries_to_unload);
        }

        info!("🧹 Collision plugin cleanup completed");

        Ok(())
    }

    /// Validates plugin compatibility using ABI version strings.
    ///
    /// ABI version format: "crate_version:rust_version" (e.g., "0.3.0:1.75.0").
    /// Checks both crate version and Rust compiler version; either check can
    /// be overridden through [`PluginSafetyConfig`].
    fn validate_plugin_compatibility(
        &self,
        plugin_version: &str,
        expected_version: &str,
    ) -> Result<(), CollisionLoaderError> {
        let plugin_parts: Vec<&str> = plugin_version.split(':').collect();
        let expected_parts: Vec<&str> = expected_version.split(':').collect();

        if plugin_parts.len() != 2 || expected_parts.len() != 2 {
            return Err(CollisionLoaderError::VersionMismatch(format!(
                "Invalid version format. Expected 'crate:rust', got plugin='{}', expected='{}'",
                plugin_version, expected_version
            )));
        }

        let plugin_crate_version = plugin_parts[0];
        let plugin_rust_version = plugin_parts[1];
        let expected_crate_version = expected_parts[0];
        let expected_rust_version = expected_parts[1];

        let versions_compatible = if self.safety_config.strict_versioning {
            // Strict: exact version match required
            plugin_crate_version == expected_crate_version
        } else {
            // Relaxed: only major.minor must match (ignore patch)
            self.versions_major_minor_compatible(plugin_crate_version, expected_crate_version)
        };

        if !versions_compatible && !self.safety_config.allow_abi_mismatch {
            let comparison_type = if self.safety_config.strict_versioning {
                "exact"
            } else {
                "major.minor"
            };
            return Err(CollisionLoaderError::VersionMismatch(format!(
                "ABI version mismatch: plugin compiled against collision_interface v{}, but host uses v{} ({} matching required). \
                This plugin is incompatible and may cause crashes or undefined behavior. \
                Recompile the plugin against the correct version, or use --danger-allow-abi-mismatch to override (NOT RECOMMENDED).",
                plugin_crate_version, expected_crate_version, comparison_type
            )));
        }

        if plugin_rust_version != expected_rust_version
            && plugin_rust_version != "unknown"
            && expected_rust_version != "unknown"
            && !self.safety_config.allow_unsafe_plugins
        {
            return Err(CollisionLoaderError::VersionMismatch(format!(
                "Rust compiler version mismatch: plugin compiled with Rust {}, but host compiled with Rust {}. \
                This may cause ABI incompatibilities due to different trait object layouts or calling conventions. \
                Recompile with the same Rust version, or use --danger-allow-unsafe-plugins to override (MAY CAUSE CRASHES).",
                plugin_rust_version, expected_rust_version
            )));
        }

        // Log warnings if safety overrides are in use
        if self.safety_config.allow_abi_mismatch && plugin_crate_version != expected_crate_version {
            warn!(
                "Loading plugin with ABI version mismatch (override enabled): plugin v{} != host v{}",
                plugin_crate_version, expected_crate_version
            );
        }

        if self.safety_config.allow_unsafe_plugins
            && plugin_rust_version != expected_rust_version
            && plugin_rust_version != "unknown"
            && expected_rust_version != "unknown"
        {
            warn!(
                "Loading plugin with Rust compiler version mismatch (override enabled): plugin {} != host {}",
                plugin_rust_version, expected_rust_version
            );
        }

        Ok(())
    }

    /// Checks if two version strings are compatible using major.minor comparison.
    /// Ignores patch versions (e.g., "0.3.2" is compatible with "0.3.0").
    fn versions_major_minor_compatible(&self, plugin_version: &str, expected_version: &str) -> bool {
        let parse_major_minor = |version: &str| -> Option<(u32, u32)> {
            let parts: Vec<&str> = version.split('.').collect();
            if parts.len() >= 2 {
                if let (Ok(major), Ok(minor)) = (parts[0].parse::<u32>(), parts[1].parse::<u32>()) {
                    return Some((major, minor));
                }
            }
            None
        };

        match (
            parse_major_minor(plugin_version),
            parse_major_minor(expected_version),
        ) {
            (Some((plugin_major, plugin_minor)), Some((expected_major, expected_minor))) => {
                plugin_major == expected_major && plugin_minor == expected_minor
            }
            _ => {
                // If we can't parse the versions, fall back to exact comparison
                plugin_version == expected_version
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use collision_interface::PluginError;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    /// Test detector that records how often it was created and initialized.
    struct CountingDetector {
        name: String,
        init_count: Arc<AtomicUsize>,
        fail_initialize: bool,
    }

    #[async_trait]
    impl CollisionPlugin for CountingDetector {
        fn name(&self) -> &str {
            &self.name
        }

        fn version(&self) -> &str {
            "1.0.0"
        }

        async fn initialize(&mut self, scene: Arc<PlanningScene>) -> Result<(), PluginError> {
            if self.fail_initialize {
                return Err(PluginError::InitializationFailed(
                    "configured to fail".to_string(),
                ));
            }
            // Real detectors suspend here (loading meshes, warming caches)
            tokio::task::yield_now().await;
            self.init_count.fetch_add(1, Ordering::SeqCst);
            scene.set_active_collision_detector(self.name.clone());
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), PluginError> {
            Ok(())
        }
    }

    struct CountingFactory {
        name: String,
        create_count: Arc<AtomicUsize>,
        init_count: Arc<AtomicUsize>,
        fail_initialize: bool,
    }

    impl CollisionPluginFactory for CountingFactory {
        fn create(&self) -> Result<Box<dyn CollisionPlugin>, CollisionLoaderError> {
            self.create_count.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(CountingDetector {
                name: self.name.clone(),
                init_count: self.init_count.clone(),
                fail_initialize: self.fail_initialize,
            }))
        }

        fn detector_name(&self) -> &str {
            &self.name
        }

        fn detector_version(&self) -> &str {
            "1.0.0"
        }
    }

    fn counting_loader(
        name: &str,
        fail_initialize: bool,
    ) -> (CollisionPluginLoader, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let create_count = Arc::new(AtomicUsize::new(0));
        let init_count = Arc::new(AtomicUsize::new(0));
        let loader = CollisionPluginLoader::new(vec![], PluginSafetyConfig::default());
        loader
            .register_factory(Box::new(CountingFactory {
                name: name.to_string(),
                create_count: create_count.clone(),
                init_count: init_count.clone(),
                fail_initialize,
            }))
            .unwrap();
        (loader, create_count, init_count)
    }

    #[tokio::test]
    async fn test_activate_loads_and_binds_scene() {
        let (loader, create_count, init_count) = counting_loader("TestDetector", false);
        let scene = Arc::new(PlanningScene::new("test-scene"));

        assert!(loader.activate("TestDetector", &scene).await);
        assert_eq!(scene.collision_detector_name().as_deref(), Some("TestDetector"));
        assert_eq!(create_count.load(Ordering::SeqCst), 1);
        assert_eq!(init_count.load(Ordering::SeqCst), 1);
        assert!(loader.is_plugin_loaded("TestDetector"));
        assert_eq!(loader.plugin_count(), 1);
    }

    #[tokio::test]
    async fn test_activate_reuses_cached_instance() {
        let (loader, create_count, init_count) = counting_loader("TestDetector", false);
        let scene = Arc::new(PlanningScene::new("test-scene"));

        assert!(loader.activate("TestDetector", &scene).await);
        assert!(loader.activate("TestDetector", &scene).await);

        // One instance, initialized once per activation
        assert_eq!(create_count.load(Ordering::SeqCst), 1);
        assert_eq!(init_count.load(Ordering::SeqCst), 2);
        assert_eq!(loader.plugin_names(), vec!["TestDetector".to_string()]);
    }

    #[tokio::test]
    async fn test_concurrent_activation_of_same_detector_completes() {
        let (loader, create_count, init_count) = counting_loader("TestDetector", false);
        let loader = Arc::new(loader);
        loader.load("TestDetector").await.unwrap();
        let scene = Arc::new(PlanningScene::new("test-scene"));

        // Two tasks activating the same cached detector must both finish
        // even on a single-threaded runtime; the cache must not be locked
        // across the detector's own suspension points.
        let first = tokio::spawn({
            let loader = loader.clone();
            let scene = scene.clone();
            async move { loader.activate("TestDetector", &scene).await }
        });
        let second = tokio::spawn({
            let loader = loader.clone();
            let scene = scene.clone();
            async move { loader.activate("TestDetector", &scene).await }
        });

        let (first, second) = tokio::time::timeout(std::time::Duration::from_secs(2), async {
            (first.await.unwrap(), second.await.unwrap())
        })
        .await
        .expect("concurrent activations stalled the runtime");

        assert!(first);
        assert!(second);
        assert_eq!(create_count.load(Ordering::SeqCst), 1);
        assert_eq!(init_count.load(Ordering::SeqCst), 2);
        assert_eq!(scene.collision_detector_name().as_deref(), Some("TestDetector"));
    }

    #[tokio::test]
    async fn test_activate_unknown_detector_returns_false() {
        let loader = CollisionPluginLoader::new(vec![], PluginSafetyConfig::default());
        let scene = Arc::new(PlanningScene::new("test-scene"));

        assert!(!loader.activate("NoSuchDetector", &scene).await);
        assert!(!scene.has_collision_detector());
        assert_eq!(loader.plugin_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_initialize_reports_false_and_keeps_scene_unbound() {
        let (loader, _, _) = counting_loader("Broken", true);
        let scene = Arc::new(PlanningScene::new("test-scene"));

        assert!(!loader.activate("Broken", &scene).await);
        assert!(!scene.has_collision_detector());
        // The instance itself stays cached; only initialization failed
        assert!(loader.is_plugin_loaded("Broken"));
    }

    #[tokio::test]
    async fn test_duplicate_load_is_rejected() {
        let (loader, _, _) = counting_loader("TestDetector", false);

        loader.load("TestDetector").await.unwrap();
        let result = loader.load("TestDetector").await;
        assert!(matches!(
            result,
            Err(CollisionLoaderError::PluginAlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_unload_removes_instance() {
        let (loader, _, _) = counting_loader("TestDetector", false);
        let scene = Arc::new(PlanningScene::new("test-scene"));

        assert!(loader.activate("TestDetector", &scene).await);
        loader.unload("TestDetector").await.unwrap();
        assert!(!loader.is_plugin_loaded("TestDetector"));

        let result = loader.unload("TestDetector").await;
        assert!(matches!(result, Err(CollisionLoaderError::PluginNotFound(_))));
    }

    #[tokio::test]
    async fn test_shutdown_clears_all_plugins() {
        let (loader, _, _) = counting_loader("TestDetector", false);
        let scene = Arc::new(PlanningScene::new("test-scene"));

        assert!(loader.activate("TestDetector", &scene).await);
        loader.shutdown().await.unwrap();
        assert_eq!(loader.plugin_count(), 0);
    }

    #[tokio::test]
    async fn test_setup_scene_with_primary_parameter() {
        let (loader, _, _) = counting_loader("TestDetector", false);
        let scene = Arc::new(PlanningScene::new("test-scene"));

        let selection = DetectorSelection {
            collision_detector: Some("TestDetector".to_string()),
            move_group_collision_detector: None,
        };
        loader.setup_scene(&selection, &scene).await;
        assert_eq!(scene.collision_detector_name().as_deref(), Some("TestDetector"));
    }

    #[tokio::test]
    async fn test_setup_scene_falls_back_to_move_group_parameter() {
        let (loader, _, _) = counting_loader("TestDetector", false);
        let scene = Arc::new(PlanningScene::new("test-scene"));

        let selection = DetectorSelection {
            collision_detector: None,
            move_group_collision_detector: Some("TestDetector".to_string()),
        };
        loader.setup_scene(&selection, &scene).await;
        assert_eq!(scene.collision_detector_name().as_deref(), Some("TestDetector"));
    }

    #[tokio::test]
    async fn test_setup_scene_without_selection_is_a_noop() {
        let (loader, create_count, _) = counting_loader("TestDetector", false);
        let scene = Arc::new(PlanningScene::new("test-scene"));

        loader.setup_scene(&DetectorSelection::default(), &scene).await;
        assert!(!scene.has_collision_detector());
        assert_eq!(create_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_setup_scene_empty_primary_suppresses_fallback() {
        let (loader, create_count, _) = counting_loader("TestDetector", false);
        let scene = Arc::new(PlanningScene::new("test-scene"));

        // An empty primary name means "explicitly no detector"
        let selection = DetectorSelection {
            collision_detector: Some(String::new()),
            move_group_collision_detector: Some("TestDetector".to_string()),
        };
        loader.setup_scene(&selection, &scene).await;
        assert!(!scene.has_collision_detector());
        assert_eq!(create_count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_detector_selection_resolution() {
        let both = DetectorSelection {
            collision_detector: Some("FCL".to_string()),
            move_group_collision_detector: Some("Bullet".to_string()),
        };
        assert_eq!(both.resolved(), Some("FCL"));

        let fallback_only = DetectorSelection {
            collision_detector: None,
            move_group_collision_detector: Some("Bullet".to_string()),
        };
        assert_eq!(fallback_only.resolved(), Some("Bullet"));

        let empty_fallback = DetectorSelection {
            collision_detector: None,
            move_group_collision_detector: Some(String::new()),
        };
        assert_eq!(empty_fallback.resolved(), None);

        assert_eq!(DetectorSelection::default().resolved(), None);
    }

    #[test]
    fn test_version_mismatch_error() {
        let error = CollisionLoaderError::VersionMismatch("expected 1, got 2".to_string());
        let error_message = format!("{}", error);
        assert!(error_message.contains("Plugin version mismatch"));
        assert!(error_message.contains("expected 1, got 2"));
    }

    #[test]
    fn test_plugin_discovery() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path();

        #[cfg(target_os = "windows")]
        let plugin_extension = "dll";
        #[cfg(target_os = "macos")]
        let plugin_extension = "dylib";
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let plugin_extension = "so";

        let plugin_file = temp_path.join(format!("libplugin_fcl.{}", plugin_extension));
        fs::write(&plugin_file, "dummy content").unwrap();

        let non_plugin_file = temp_path.join("not_a_plugin.txt");
        fs::write(&non_plugin_file, "dummy content").unwrap();

        let loader = CollisionPluginLoader::new(
            vec![temp_path.to_path_buf()],
            PluginSafetyConfig::default(),
        );

        let discovered = loader.available_plugin_libraries();
        assert_eq!(discovered.len(), 1);
        assert_eq!(discovered[0], plugin_file);
    }

    #[test]
    fn test_resolve_plugin_library_by_detector_name() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path();

        #[cfg(target_os = "windows")]
        let library_name = "plugin_allvalid.dll";
        #[cfg(target_os = "macos")]
        let library_name = "libplugin_allvalid.dylib";
        #[cfg(not(any(target_os = "windows", target_os = "macos")))]
        let library_name = "libplugin_allvalid.so";

        let library_file = temp_path.join(library_name);
        fs::write(&library_file, "dummy content").unwrap();

        let loader = CollisionPluginLoader::new(
            vec![temp_path.to_path_buf()],
            PluginSafetyConfig::default(),
        );

        let resolved = loader.resolve_plugin_library("AllValid").unwrap();
        assert_eq!(resolved, library_file);

        let missing = loader.resolve_plugin_library("Bullet");
        assert!(matches!(missing, Err(CollisionLoaderError::PluginNotFound(_))));
    }

    #[test]
    fn test_plugin_compatibility_validation() {
        let loader =
            CollisionPluginLoader::new(vec![], PluginSafetyConfig::default());

        // Exact match - should pass
        assert!(loader
            .validate_plugin_compatibility("0.3.0:1.75.0", "0.3.0:1.75.0")
            .is_ok());

        // Crate version mismatch - should fail
        let result = loader.validate_plugin_compatibility("0.2.0:1.75.0", "0.3.0:1.75.0");
        assert!(matches!(result, Err(CollisionLoaderError::VersionMismatch(_))));

        // Rust version mismatch - should fail
        let result = loader.validate_plugin_compatibility("0.3.0:1.74.0", "0.3.0:1.75.0");
        assert!(matches!(result, Err(CollisionLoaderError::VersionMismatch(_))));

        // Unknown Rust version on either side - should pass
        assert!(loader
            .validate_plugin_compatibility("0.3.0:unknown", "0.3.0:1.75.0")
            .is_ok());
        assert!(loader
            .validate_plugin_compatibility("0.3.0:1.75.0", "0.3.0:unknown")
            .is_ok());

        // Invalid format - should fail
        let result = loader.validate_plugin_compatibility("invalid", "0.3.0:1.75.0");
        assert!(matches!(result, Err(CollisionLoaderError::VersionMismatch(_))));

        // Safety overrides enabled - should pass despite both mismatches
        let loader_unsafe = CollisionPluginLoader::new(
            vec![],
            PluginSafetyConfig {
                allow_unsafe_plugins: true,
                allow_abi_mismatch: true,
                strict_versioning: false,
            },
        );
        assert!(loader_unsafe
            .validate_plugin_compatibility("0.2.0:1.74.0", "0.3.0:1.75.0")
            .is_ok());
    }

    #[test]
    fn test_relaxed_versioning() {
        let loader_relaxed = CollisionPluginLoader::new(
            vec![],
            PluginSafetyConfig {
                allow_unsafe_plugins: false,
                allow_abi_mismatch: false,
                strict_versioning: false,
            },
        );

        // Same major.minor, different patch - should pass with relaxed versioning
        assert!(loader_relaxed
            .validate_plugin_compatibility("0.3.2:1.75.0", "0.3.0:1.75.0")
            .is_ok());
        assert!(loader_relaxed
            .validate_plugin_compatibility("0.3.0:1.75.0", "0.3.5:1.75.0")
            .is_ok());

        // Different major or minor version - should fail even with relaxed versioning
        assert!(loader_relaxed
            .validate_plugin_compatibility("1.3.0:1.75.0", "0.3.0:1.75.0")
            .is_err());
        assert!(loader_relaxed
            .validate_plugin_compatibility("0.2.0:1.75.0", "0.3.0:1.75.0")
            .is_err());

        let loader_strict = CollisionPluginLoader::new(
            vec![],
            PluginSafetyConfig {
                allow_unsafe_plugins: false,
                allow_abi_mismatch: false,
                strict_versioning: true,
            },
        );

        // Same major.minor, different patch - should fail with strict versioning
        assert!(loader_strict
            .validate_plugin_compatibility("0.3.2:1.75.0", "0.3.0:1.75.0")
            .is_err());
        assert!(loader_strict
            .validate_plugin_compatibility("0.3.0:1.75.0", "0.3.0:1.75.0")
            .is_ok());
    }

    #[test]
    fn test_major_minor_version_parsing() {
        let loader = CollisionPluginLoader::new(vec![], PluginSafetyConfig::default());

        assert!(loader.versions_major_minor_compatible("1.2.3", "1.2.0"));
        assert!(loader.versions_major_minor_compatible("1.2.0", "1.2.999"));
        assert!(!loader.versions_major_minor_compatible("1.2.0", "1.3.0"));
        assert!(!loader.versions_major_minor_compatible("1.2.0", "2.2.0"));

        // Invalid versions fall back to exact comparison
        assert!(loader.versions_major_minor_compatible("invalid", "invalid"));
        assert!(!loader.versions_major_minor_compatible("invalid", "1.2.0"));
        assert!(!loader.versions_major_minor_compatible("1.2.0", "invalid"));
    }
}
