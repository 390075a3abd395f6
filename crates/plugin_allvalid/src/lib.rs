use async_trait::async_trait;
use collision_interface::{
    export_collision_plugin, PlanningScene, PluginError, SimpleCollisionPlugin,
};
use std::sync::Arc;
use tracing::info;

// ============================================================================
// AllValid Collision Detector Plugin
// ============================================================================

/// Stand-in collision detector that accepts every scene it is bound to.
///
/// Useful for benchmarking planners without collision checking overhead and
/// for exercising the plugin loading pipeline. It performs no collision
/// mathematics; binding it to a scene simply marks the scene as served by
/// "AllValid".
pub struct AllValidPlugin {
    name: String,
    activation_count: u32,
}

impl AllValidPlugin {
    pub fn new() -> Self {
        info!("🧩 AllValidPlugin: Creating new instance");
        Self {
            name: "AllValid".to_string(),
            activation_count: 0,
        }
    }
}

impl Default for AllValidPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SimpleCollisionPlugin for AllValidPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    async fn on_initialize(&mut self, scene: Arc<PlanningScene>) -> Result<(), PluginError> {
        self.activation_count += 1;
        info!(
            "🧩 AllValidPlugin: Binding to scene '{}' (activation #{})",
            scene.name(),
            self.activation_count
        );
        scene.set_active_collision_detector(self.name());
        Ok(())
    }

    async fn on_shutdown(&mut self) -> Result<(), PluginError> {
        info!("🧩 AllValidPlugin: Shutting down");
        Ok(())
    }
}

export_collision_plugin!(AllValidPlugin);

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_initialize_marks_scene() {
        let mut plugin = AllValidPlugin::new();
        let scene = Arc::new(PlanningScene::new("bench"));

        plugin.on_initialize(scene.clone()).await.unwrap();
        assert_eq!(scene.collision_detector_name().as_deref(), Some("AllValid"));
        assert_eq!(plugin.activation_count, 1);
    }
}
