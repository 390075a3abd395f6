//! # Plugin Export Macros
//!
//! Macros that remove boilerplate from collision detector plugin development:
//! - [`export_collision_plugin!`] - Generates the FFI-safe plugin exports with
//!   panic handling for a [`SimpleCollisionPlugin`](crate::SimpleCollisionPlugin)
//!   implementation.
//!
//! A detector plugin crate built as a `cdylib` only needs to implement
//! `SimpleCollisionPlugin` and invoke the macro once; the loader finds the
//! generated `get_plugin_version` and `create_plugin` symbols at load time.

/// Generates the FFI exports for a collision detector plugin.
///
/// # Usage
///
/// ```rust,ignore
/// use collision_interface::{export_collision_plugin, SimpleCollisionPlugin};
///
/// struct MyDetectorPlugin { /* ... */ }
///
/// impl MyDetectorPlugin {
///     fn new() -> Self { Self { /* initialization */ } }
/// }
///
/// #[async_trait::async_trait]
/// impl SimpleCollisionPlugin for MyDetectorPlugin {
///     fn name(&self) -> &str { "MyDetector" }
///     fn version(&self) -> &str { "1.0.0" }
///
///     async fn on_initialize(&mut self, scene: std::sync::Arc<collision_interface::PlanningScene>) -> Result<(), collision_interface::PluginError> {
///         scene.set_active_collision_detector(self.name());
///         Ok(())
///     }
/// }
///
/// export_collision_plugin!(MyDetectorPlugin);
/// ```
///
/// This generates:
/// - `get_plugin_version()` - C-compatible ABI version export
/// - `create_plugin()` - C-compatible plugin creation function
/// - `destroy_plugin()` - C-compatible plugin destruction function
/// - `PluginWrapper` - Internal wrapper with panic handling
#[macro_export]
macro_rules! export_collision_plugin {
    ($plugin_type:ty) => {
        use $crate::CollisionPlugin;

        use std::panic::{catch_unwind, AssertUnwindSafe};

        /// Wrapper bridging SimpleCollisionPlugin and CollisionPlugin with
        /// panic protection.
        struct PluginWrapper {
            inner: $plugin_type,
        }

        impl PluginWrapper {
            /// Helper to convert panics to PluginError.
            fn panic_to_error(panic_info: Box<dyn std::any::Any + Send>) -> $crate::PluginError {
                let message = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    format!("Plugin panicked: {}", s)
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    format!("Plugin panicked: {}", s)
                } else {
                    "Plugin panicked with unknown error".to_string()
                };

                $crate::PluginError::Runtime(message)
            }
        }

        #[$crate::async_trait]
        impl CollisionPlugin for PluginWrapper {
            fn name(&self) -> &str {
                // For synchronous methods, we can use catch_unwind directly
                match catch_unwind(AssertUnwindSafe(|| self.inner.name())) {
                    Ok(name) => name,
                    Err(_) => "unknown-detector", // Fallback name if panic occurs
                }
            }

            fn version(&self) -> &str {
                match catch_unwind(AssertUnwindSafe(|| self.inner.version())) {
                    Ok(version) => version,
                    Err(_) => "unknown-version", // Fallback version if panic occurs
                }
            }

            async fn initialize(
                &mut self,
                scene: std::sync::Arc<$crate::PlanningScene>,
            ) -> Result<(), $crate::PluginError> {
                // Run directly on the current thread using the current runtime handle
                catch_unwind(AssertUnwindSafe(|| {
                    $crate::futures::executor::block_on(self.inner.on_initialize(scene))
                }))
                .map_err(Self::panic_to_error)?
            }

            async fn shutdown(&mut self) -> Result<(), $crate::PluginError> {
                catch_unwind(AssertUnwindSafe(|| {
                    $crate::futures::executor::block_on(self.inner.on_shutdown())
                }))
                .map_err(Self::panic_to_error)?
            }
        }

        /// Plugin version function - required export for ABI compatibility.
        ///
        /// Returns the ABI version this plugin was compiled against, in
        /// "crate_version:rust_version" format. The loader validates this
        /// before attempting to create the plugin instance.
        #[no_mangle]
        pub unsafe extern "C" fn get_plugin_version() -> *const std::os::raw::c_char {
            let version_cstring = std::ffi::CString::new($crate::ABI_VERSION).unwrap_or_else(|_| {
                std::ffi::CString::new("invalid_version").unwrap()
            });

            // Leak the CString to ensure it remains valid for the caller.
            // Plugin loading is a one-time operation per plugin.
            version_cstring.into_raw()
        }

        /// Plugin creation function with panic protection - required export.
        ///
        /// # Safety
        ///
        /// Crosses FFI boundaries, but all operations are protected against
        /// panics and memory safety violations.
        #[no_mangle]
        pub unsafe extern "C" fn create_plugin() -> *mut dyn CollisionPlugin {
            // Critical: catch panics at FFI boundary to prevent UB
            match catch_unwind(AssertUnwindSafe(|| {
                let plugin = Box::new(PluginWrapper {
                    inner: <$plugin_type>::new(),
                });
                Box::into_raw(plugin) as *mut dyn CollisionPlugin
            })) {
                Ok(plugin_ptr) => plugin_ptr,
                Err(panic_info) => {
                    eprintln!("Plugin creation panicked: {:?}", panic_info);
                    std::ptr::null_mut::<PluginWrapper>() as *mut dyn CollisionPlugin
                }
            }
        }

        /// Plugin destruction function with panic protection - required export.
        ///
        /// # Safety
        ///
        /// Operates on raw pointers from FFI, but all operations are protected
        /// against panics.
        #[no_mangle]
        pub unsafe extern "C" fn destroy_plugin(plugin: *mut dyn CollisionPlugin) {
            if plugin.is_null() {
                return;
            }

            // Critical: catch panics at FFI boundary to prevent UB
            let _ = catch_unwind(AssertUnwindSafe(|| {
                let _ = Box::from_raw(plugin);
            }));
            // If destruction panics we just ignore it - a leak is better than
            // crashing the host process
        }
    };
}
