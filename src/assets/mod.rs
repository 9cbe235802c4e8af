use crate::config::{GameConfig, ModelAssetConfig};
use bevy::asset::LoadState;
use bevy::prelude::*;
use std::collections::HashMap;
use std::path::Path;

const ASSET_ROOT_DIR: &str = "assets";

pub struct AssetRegistryPlugin;

impl Plugin for AssetRegistryPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            Update,
            sync_asset_registry.run_if(resource_exists::<GameConfig>),
        );
    }
}

fn sync_asset_registry(
    mut commands: Commands,
    config: Res<GameConfig>,
    asset_server: Res<AssetServer>,
    registry: Option<ResMut<AssetRegistry>>,
) {
    if registry.is_some() && !config.is_changed() {
        return;
    }

    let new_registry =
        AssetRegistry::from_config(&config, &asset_server, Path::new(ASSET_ROOT_DIR));

    match registry {
        Some(mut existing_registry) => {
            *existing_registry = new_registry;
            log_asset_registry_summary("Updated", &existing_registry);
        }
        None => {
            log_asset_registry_summary("Initialized", &new_registry);
            commands.insert_resource(new_registry);
        }
    }
}

fn log_asset_registry_summary(prefix: &str, registry: &AssetRegistry) {
    info!(
        "{prefix} asset registry: models {}/{} on disk.",
        registry.available_model_count(),
        registry.models.len(),
    );
    for (id, entry) in &registry.models {
        if !entry.exists_on_disk {
            warn!("Model `{id}` not found at `{}`.", entry.scene_path);
        }
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub struct AssetRegistry {
    pub models: HashMap<String, ModelAssetEntry>,
}

impl AssetRegistry {
    pub fn from_config(config: &GameConfig, asset_server: &AssetServer, asset_root: &Path) -> Self {
        let models = config
            .assets
            .models
            .iter()
            .map(|entry| {
                let model = ModelAssetEntry::from_config(entry, asset_server, asset_root);
                (entry.id.clone(), model)
            })
            .collect();

        Self { models }
    }

    fn available_model_count(&self) -> usize {
        self.models
            .values()
            .filter(|entry| entry.exists_on_disk)
            .count()
    }

    /// True once every model that has a handle is either loaded or failed.
    /// Models missing on disk never block.
    pub fn models_settled(&self, asset_server: &AssetServer) -> bool {
        self.models.values().all(|entry| entry.is_settled(asset_server))
    }
}

#[derive(Debug, Clone)]
pub struct ModelAssetEntry {
    pub scene_path: String,
    pub exists_on_disk: bool,
    pub handle: Option<Handle<Scene>>,
}

impl ModelAssetEntry {
    fn from_config(
        config: &ModelAssetConfig,
        asset_server: &AssetServer,
        asset_root: &Path,
    ) -> Self {
        let exists_on_disk = asset_exists(asset_root, &config.scene_path);
        let handle = exists_on_disk.then(|| asset_server.load(config.scene_path.clone()));

        Self {
            scene_path: config.scene_path.clone(),
            exists_on_disk,
            handle,
        }
    }

    fn is_settled(&self, asset_server: &AssetServer) -> bool {
        let Some(handle) = &self.handle else {
            return true;
        };
        asset_server.is_loaded_with_dependencies(handle.id())
            || matches!(asset_server.load_state(handle.id()), LoadState::Failed(_))
    }
}

fn asset_exists(asset_root: &Path, path: &str) -> bool {
    let file_path = path.split('#').next().unwrap_or(path);
    asset_root.join(file_path).exists()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn asset_exists_ignores_label_suffix() {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        assert!(asset_exists(root, "Cargo.toml#Scene0"));
        assert!(asset_exists(root, "Cargo.toml"));
        assert!(!asset_exists(root, "missing_model.glb#Scene0"));
    }
}
