use bevy::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_DIR: &str = "config";
const MIN_TRACK_ANCHORS: usize = 3;
const MIN_ARC_LENGTH_DIVISIONS: usize = 8;

pub struct ConfigPlugin;

impl Plugin for ConfigPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, load_game_config)
            .add_systems(Update, reload_game_config_hotkey);
    }
}

fn load_game_config(mut commands: Commands) {
    let config = GameConfig::load_from_dir(Path::new(CONFIG_DIR)).unwrap_or_else(|error| {
        panic!("failed to load configuration from `{CONFIG_DIR}`: {error}");
    });

    log_config_summary("Loaded", &config);
    info!("Press F5 to hot-reload config files from `{CONFIG_DIR}`.");

    commands.insert_resource(config);
}

fn reload_game_config_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    game_config: Option<ResMut<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::F5) {
        return;
    }

    let Some(mut current_config) = game_config else {
        warn!("Config hot-reload requested, but `GameConfig` resource is not initialized yet.");
        return;
    };

    match GameConfig::load_from_dir(Path::new(CONFIG_DIR)) {
        Ok(new_config) => {
            *current_config = new_config;
            log_config_summary("Hot-reloaded", &current_config);
        }
        Err(error) => {
            error!("Config hot-reload failed; keeping previous config: {error}");
        }
    }
}

fn log_config_summary(prefix: &str, config: &GameConfig) {
    info!(
        "{prefix} config: track radius {:.1} with {} anchors, {} vehicles, {} models, default vehicle `{}`.",
        config.game.track.curve_radius,
        config.game.track.anchor_count,
        config.vehicles_by_id.len(),
        config.model_assets_by_id.len(),
        config.game.app.default_vehicle
    );
}

#[derive(Resource, Debug, Clone)]
pub struct GameConfig {
    pub game: GameFile,
    pub assets: AssetsFile,
    pub vehicles: VehiclesFile,
    pub vehicles_by_id: HashMap<String, VehicleConfig>,
    pub model_assets_by_id: HashMap<String, ModelAssetConfig>,
}

impl GameConfig {
    pub fn load_from_dir(config_dir: &Path) -> Result<Self, ConfigError> {
        let game: GameFile = read_toml(&config_dir.join("game.toml"))?;
        let assets: AssetsFile = read_toml(&config_dir.join("assets.toml"))?;
        let vehicles: VehiclesFile = read_toml(&config_dir.join("vehicles.toml"))?;

        let config = Self {
            model_assets_by_id: to_index("assets.toml::models", &assets.models)?,
            vehicles_by_id: to_index("vehicles.toml::vehicles", &vehicles.vehicles)?,
            game,
            assets,
            vehicles,
        };

        config.validate_references()?;
        Ok(config)
    }

    pub fn default_vehicle(&self) -> Option<&VehicleConfig> {
        self.vehicles_by_id.get(&self.game.app.default_vehicle)
    }

    fn validate_references(&self) -> Result<(), ConfigError> {
        if !self
            .vehicles_by_id
            .contains_key(&self.game.app.default_vehicle)
        {
            return Err(ConfigError::Validation(format!(
                "game.toml::app.default_vehicle references unknown vehicle id `{}`",
                self.game.app.default_vehicle
            )));
        }

        let track = &self.game.track;
        if !(track.curve_radius.is_finite() && track.curve_radius > 0.0) {
            return Err(ConfigError::Validation(
                "game.toml::track.curve_radius must be > 0".to_string(),
            ));
        }
        if track.anchor_count < MIN_TRACK_ANCHORS {
            return Err(ConfigError::Validation(format!(
                "game.toml::track.anchor_count must be >= {MIN_TRACK_ANCHORS}"
            )));
        }
        if !(track.fallback_radius.is_finite() && track.fallback_radius > 0.0) {
            return Err(ConfigError::Validation(
                "game.toml::track.fallback_radius must be > 0".to_string(),
            ));
        }
        if track.fallback_anchor_count < MIN_TRACK_ANCHORS {
            return Err(ConfigError::Validation(format!(
                "game.toml::track.fallback_anchor_count must be >= {MIN_TRACK_ANCHORS}"
            )));
        }
        if track.arc_length_divisions < MIN_ARC_LENGTH_DIVISIONS {
            return Err(ConfigError::Validation(format!(
                "game.toml::track.arc_length_divisions must be >= {MIN_ARC_LENGTH_DIVISIONS}"
            )));
        }
        if !(track.surface_inner_radius.is_finite() && track.surface_inner_radius > 0.0) {
            return Err(ConfigError::Validation(
                "game.toml::track.surface_inner_radius must be > 0".to_string(),
            ));
        }
        if !(track.surface_inner_radius < track.surface_outer_radius
            && track.surface_outer_radius.is_finite())
        {
            return Err(ConfigError::Validation(format!(
                "game.toml::track.surface_inner_radius ({}) must be smaller than surface_outer_radius ({})",
                track.surface_inner_radius, track.surface_outer_radius
            )));
        }
        if !(track.sign_offset.is_finite() && track.sign_offset >= 0.0) {
            return Err(ConfigError::Validation(
                "game.toml::track.sign_offset must be >= 0".to_string(),
            ));
        }

        let camera = &self.game.camera;
        if Vec3::from_array(camera.position).distance(Vec3::from_array(camera.look_at))
            <= f32::EPSILON
        {
            return Err(ConfigError::Validation(
                "game.toml::camera.position must differ from camera.look_at".to_string(),
            ));
        }

        for (index, vehicle) in self.vehicles.vehicles.iter().enumerate() {
            if let Some(model_id) = vehicle.model.as_deref() {
                if !self.model_assets_by_id.contains_key(model_id) {
                    return Err(ConfigError::Validation(format!(
                        "vehicles.toml::vehicles[{index}].model references unknown model id `{model_id}`"
                    )));
                }
            }
            if !(vehicle.auto_speed.is_finite() && vehicle.auto_speed > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].auto_speed must be finite and > 0"
                )));
            }
            if !(vehicle.manual_speed.is_finite() && vehicle.manual_speed > 0.0) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].manual_speed must be finite and > 0"
                )));
            }
            if !(vehicle.steer_nudge_speed.is_finite() && vehicle.steer_nudge_speed >= 0.0) {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].steer_nudge_speed must be finite and >= 0"
                )));
            }
            if !vehicle.steer_angle_rad.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].steer_angle_rad must be finite"
                )));
            }
            let adjustments = &vehicle.adjustments;
            if !adjustments.is_finite() {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].adjustments must all be finite"
                )));
            }
            if adjustments.scale <= 0.0 {
                return Err(ConfigError::Validation(format!(
                    "vehicles.toml::vehicles[{index}].adjustments.scale must be > 0"
                )));
            }
        }

        for (index, model) in self.assets.models.iter().enumerate() {
            if model.scene_path.trim().is_empty() {
                return Err(ConfigError::Validation(format!(
                    "assets.toml::models[{index}].scene_path must not be empty"
                )));
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: Box<toml::de::Error>,
    },
    Validation(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse `{}`: {source}", path.display())
            }
            Self::Validation(message) => write!(f, "{message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source: Box::new(source),
    })
}

fn to_index<T>(label: &str, rows: &[T]) -> Result<HashMap<String, T>, ConfigError>
where
    T: HasId + Clone,
{
    let mut map = HashMap::new();

    for row in rows {
        let id = row.id();
        if id.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{label} contains an empty id"
            )));
        }

        if map.insert(id.to_string(), row.clone()).is_some() {
            return Err(ConfigError::Validation(format!(
                "{label} contains duplicate id `{id}`"
            )));
        }
    }

    Ok(map)
}

trait HasId {
    fn id(&self) -> &str;
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameFile {
    pub app: AppConfig,
    pub track: TrackConfig,
    pub camera: CameraConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub default_vehicle: String,
    pub debug_overlay: bool,
    #[serde(default = "default_adjustment_panel")]
    pub adjustment_panel: bool,
}

fn default_adjustment_panel() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackConfig {
    pub curve_radius: f32,
    pub anchor_count: usize,
    pub surface_inner_radius: f32,
    pub surface_outer_radius: f32,
    pub fallback_radius: f32,
    pub fallback_anchor_count: usize,
    #[serde(default = "default_arc_length_divisions")]
    pub arc_length_divisions: usize,
    #[serde(default)]
    pub sign_count: usize,
    #[serde(default)]
    pub sign_offset: f32,
}

fn default_arc_length_divisions() -> usize {
    200
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub look_at: [f32; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehiclesFile {
    pub vehicles: Vec<VehicleConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    #[serde(default)]
    pub model: Option<String>,
    pub auto_speed: f32,
    pub manual_speed: f32,
    pub steer_angle_rad: f32,
    pub steer_nudge_speed: f32,
    pub adjustments: ModelAdjustments,
}

impl HasId for VehicleConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Manual fit of a vehicle model onto the track: height offset plus the
/// model node's local rotation and uniform scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelAdjustments {
    pub height: f32,
    pub tilt: f32,
    pub yaw: f32,
    pub roll: f32,
    pub scale: f32,
}

impl ModelAdjustments {
    pub fn is_finite(&self) -> bool {
        [self.height, self.tilt, self.yaw, self.roll, self.scale]
            .iter()
            .all(|value| value.is_finite())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AssetsFile {
    #[serde(default)]
    pub models: Vec<ModelAssetConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelAssetConfig {
    pub id: String,
    pub scene_path: String,
}

impl HasId for ModelAssetConfig {
    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vehicle() -> VehicleConfig {
        VehicleConfig {
            id: "rc_car".to_string(),
            model: Some("vehicle_rc_car".to_string()),
            auto_speed: 0.05,
            manual_speed: 0.05,
            steer_angle_rad: std::f32::consts::PI * 0.05,
            steer_nudge_speed: 0.1,
            adjustments: ModelAdjustments {
                height: 0.23,
                tilt: -1.0,
                yaw: 1.5,
                roll: 0.0,
                scale: 1.8,
            },
        }
    }

    fn sample_model() -> ModelAssetConfig {
        ModelAssetConfig {
            id: "vehicle_rc_car".to_string(),
            scene_path: "models/f1_car.glb#Scene0".to_string(),
        }
    }

    fn sample_config() -> GameConfig {
        let vehicle = sample_vehicle();
        let model = sample_model();
        GameConfig {
            game: GameFile {
                app: AppConfig {
                    default_vehicle: "rc_car".to_string(),
                    debug_overlay: true,
                    adjustment_panel: true,
                },
                track: TrackConfig {
                    curve_radius: 27.5,
                    anchor_count: 64,
                    surface_inner_radius: 25.0,
                    surface_outer_radius: 30.0,
                    fallback_radius: 20.0,
                    fallback_anchor_count: 100,
                    arc_length_divisions: 200,
                    sign_count: 8,
                    sign_offset: 5.0,
                },
                camera: CameraConfig {
                    position: [0.0, 30.0, 45.0],
                    look_at: [0.0, 0.0, 0.0],
                },
            },
            assets: AssetsFile {
                models: vec![model.clone()],
            },
            vehicles: VehiclesFile {
                vehicles: vec![vehicle.clone()],
            },
            vehicles_by_id: HashMap::from([(vehicle.id.clone(), vehicle)]),
            model_assets_by_id: HashMap::from([(model.id.clone(), model)]),
        }
    }

    fn rebuild_vehicle_index(config: &mut GameConfig) {
        config.vehicles_by_id = config
            .vehicles
            .vehicles
            .iter()
            .map(|vehicle| (vehicle.id.clone(), vehicle.clone()))
            .collect();
    }

    #[test]
    fn sample_config_is_valid() {
        sample_config()
            .validate_references()
            .expect("sample config should validate");
    }

    #[test]
    fn validation_fails_for_missing_default_vehicle() {
        let mut config = sample_config();
        config.game.app.default_vehicle = "missing_car".to_string();

        let message = config
            .validate_references()
            .expect_err("validation should fail")
            .to_string();
        assert!(message.contains("default_vehicle"));
        assert!(message.contains("missing_car"));
    }

    #[test]
    fn validation_fails_for_unknown_model_reference() {
        let mut config = sample_config();
        config.vehicles.vehicles[0].model = Some("no_such_model".to_string());
        rebuild_vehicle_index(&mut config);

        let message = config
            .validate_references()
            .expect_err("validation should fail")
            .to_string();
        assert!(message.contains("no_such_model"));
    }

    #[test]
    fn vehicle_without_model_is_valid() {
        let mut config = sample_config();
        config.vehicles.vehicles[0].model = None;
        rebuild_vehicle_index(&mut config);
        config
            .validate_references()
            .expect("fallback car needs no model");
    }

    #[test]
    fn validation_fails_for_too_few_track_anchors() {
        let mut config = sample_config();
        config.game.track.anchor_count = 2;

        let message = config
            .validate_references()
            .expect_err("validation should fail")
            .to_string();
        assert!(message.contains("anchor_count"));
    }

    #[test]
    fn validation_fails_for_inverted_surface_radii() {
        let mut config = sample_config();
        config.game.track.surface_inner_radius = 31.0;

        let message = config
            .validate_references()
            .expect_err("validation should fail")
            .to_string();
        assert!(message.contains("surface_inner_radius"));
    }

    #[test]
    fn validation_fails_for_non_positive_speed() {
        let mut config = sample_config();
        config.vehicles.vehicles[0].auto_speed = 0.0;

        let message = config
            .validate_references()
            .expect_err("validation should fail")
            .to_string();
        assert!(message.contains("auto_speed"));
    }

    #[test]
    fn validation_fails_for_nan_speeds() {
        for field in ["auto_speed", "manual_speed", "steer_nudge_speed"] {
            let mut config = sample_config();
            let vehicle = &mut config.vehicles.vehicles[0];
            match field {
                "auto_speed" => vehicle.auto_speed = f32::NAN,
                "manual_speed" => vehicle.manual_speed = f32::NAN,
                _ => vehicle.steer_nudge_speed = f32::NAN,
            }

            let message = config
                .validate_references()
                .expect_err("validation should fail")
                .to_string();
            assert!(message.contains(field), "{message}");
        }
    }

    #[test]
    fn nan_speed_in_toml_is_rejected() {
        let vehicles: VehiclesFile = toml::from_str(
            r#"
            [[vehicles]]
            id = "rc_car"
            model = "vehicle_rc_car"
            auto_speed = nan
            manual_speed = 0.05
            steer_angle_rad = 0.15
            steer_nudge_speed = 0.1

            [vehicles.adjustments]
            height = 0.23
            tilt = -1.0
            yaw = 1.5
            roll = 0.0
            scale = 1.8
            "#,
        )
        .expect("toml accepts nan");
        let mut config = sample_config();
        config.vehicles = vehicles;
        rebuild_vehicle_index(&mut config);

        let message = config
            .validate_references()
            .expect_err("validation should fail")
            .to_string();
        assert!(message.contains("auto_speed"));
    }

    #[test]
    fn validation_fails_for_non_positive_scale() {
        let mut config = sample_config();
        config.vehicles.vehicles[0].adjustments.scale = 0.0;

        let message = config
            .validate_references()
            .expect_err("validation should fail")
            .to_string();
        assert!(message.contains("adjustments.scale"));
    }

    #[test]
    fn index_rejects_duplicate_and_empty_ids() {
        let duplicate = to_index("models", &[sample_model(), sample_model()])
            .expect_err("duplicate ids should fail")
            .to_string();
        assert!(duplicate.contains("duplicate id `vehicle_rc_car`"));

        let mut empty = sample_model();
        empty.id = "  ".to_string();
        let message = to_index("models", &[empty])
            .expect_err("empty id should fail")
            .to_string();
        assert!(message.contains("empty id"));
    }

    #[test]
    fn shipped_config_files_load() {
        let config_dir = Path::new(env!("CARGO_MANIFEST_DIR")).join(CONFIG_DIR);
        let config = GameConfig::load_from_dir(&config_dir).expect("shipped config loads");

        let vehicle = config.default_vehicle().expect("default vehicle exists");
        assert!(vehicle.auto_speed > 0.0);
        assert!(config.game.track.anchor_count >= MIN_TRACK_ANCHORS);
    }

    #[test]
    fn missing_config_dir_reports_io_error() {
        let error = GameConfig::load_from_dir(Path::new("definitely/not/a/config/dir"))
            .expect_err("missing dir should fail");
        assert!(matches!(error, ConfigError::Io { .. }));
        assert!(error.to_string().contains("game.toml"));
    }
}
