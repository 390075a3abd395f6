//! # Planning Scene Handle
//!
//! The shared handle that collision detector plugins are bound to. The scene
//! representation itself (world geometry, robot state, allowed collision
//! matrices) lives in collaborator libraries; this handle only carries the
//! scene's identity and which collision detector is currently active on it.
//!
//! ## Thread Safety
//!
//! A `PlanningScene` is shared between the host, the plugin loader, and the
//! plugins themselves via `Arc`. The active-detector slot is guarded by a
//! `RwLock` so concurrent readers (logging, status queries) never block each
//! other.

use std::sync::RwLock;

/// Shared planning-scene handle that a collision detector plugin binds to.
///
/// Plugins mark the scene during [`initialize`](crate::CollisionPlugin::initialize)
/// by calling [`set_active_collision_detector`](Self::set_active_collision_detector)
/// with their own name. The host queries the binding afterwards via
/// [`collision_detector_name`](Self::collision_detector_name).
#[derive(Debug)]
pub struct PlanningScene {
    /// Human-readable scene name, used for logging only
    name: String,
    /// Name of the collision detector currently bound to this scene
    active_collision_detector: RwLock<Option<String>>,
}

impl PlanningScene {
    /// Creates a new scene handle with the given name and no active detector.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active_collision_detector: RwLock::new(None),
        }
    }

    /// Returns the scene name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records the named detector as the scene's active collision detector.
    ///
    /// Called by a plugin from its `initialize` implementation. Replaces any
    /// previously active detector; the loader is responsible for deciding
    /// which plugin gets activated, this handle just records the outcome.
    pub fn set_active_collision_detector(&self, detector_name: impl Into<String>) {
        let mut slot = self
            .active_collision_detector
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *slot = Some(detector_name.into());
    }

    /// Returns the name of the currently active collision detector, if any.
    pub fn collision_detector_name(&self) -> Option<String> {
        self.active_collision_detector
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Whether any collision detector has been bound to this scene.
    pub fn has_collision_detector(&self) -> bool {
        self.active_collision_detector
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_scene_has_no_detector() {
        let scene = PlanningScene::new("workcell");
        assert_eq!(scene.name(), "workcell");
        assert!(!scene.has_collision_detector());
        assert_eq!(scene.collision_detector_name(), None);
    }

    #[test]
    fn test_set_and_replace_detector() {
        let scene = PlanningScene::new("workcell");
        scene.set_active_collision_detector("AllValid");
        assert!(scene.has_collision_detector());
        assert_eq!(scene.collision_detector_name().as_deref(), Some("AllValid"));

        // A later activation replaces the binding
        scene.set_active_collision_detector("Bullet");
        assert_eq!(scene.collision_detector_name().as_deref(), Some("Bullet"));
    }

    #[test]
    fn test_shared_handle_sees_binding() {
        use std::sync::Arc;

        let scene = Arc::new(PlanningScene::new("shared"));
        let clone = scene.clone();
        clone.set_active_collision_detector("FCL");
        assert_eq!(scene.collision_detector_name().as_deref(), Some("FCL"));
    }
}
