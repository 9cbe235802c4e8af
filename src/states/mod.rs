use crate::assets::AssetRegistry;
use crate::config::{CameraConfig, GameConfig};
use bevy::prelude::*;

const MIN_LOADING_SCREEN_SECONDS: f64 = 0.5;
const SKY_COLOR: Color = Color::srgb(0.53, 0.81, 0.92);
const SUN_ILLUMINANCE: f32 = 8_000.0;
const FILL_ILLUMINANCE: f32 = 2_500.0;

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    Loading,
    Running,
    Paused,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(ClearColor(SKY_COLOR))
            .add_systems(Startup, (setup_camera, setup_lights))
            .add_systems(
                Update,
                sync_camera_from_config.run_if(resource_exists_and_changed::<GameConfig>),
            )
            .add_systems(OnEnter(GameState::Boot), enter_boot)
            .add_systems(Update, boot_to_loading.run_if(in_state(GameState::Boot)))
            .add_systems(OnEnter(GameState::Loading), enter_loading)
            .add_systems(OnExit(GameState::Loading), cleanup_loading_state)
            .add_systems(
                Update,
                loading_to_running.run_if(in_state(GameState::Loading)),
            )
            .add_systems(OnEnter(GameState::Running), enter_running)
            .add_systems(
                Update,
                running_controls.run_if(in_state(GameState::Running)),
            )
            .add_systems(OnEnter(GameState::Paused), enter_paused)
            .add_systems(Update, pause_controls.run_if(in_state(GameState::Paused)));
    }
}

#[derive(Component)]
struct SceneCamera;

#[derive(Resource, Debug, Clone)]
struct LoadingState {
    entered_at_s: f64,
}

fn camera_transform(camera: &CameraConfig) -> Transform {
    Transform::from_translation(Vec3::from_array(camera.position))
        .looking_at(Vec3::from_array(camera.look_at), Vec3::Y)
}

fn setup_camera(mut commands: Commands, config: Option<Res<GameConfig>>) {
    let transform = config
        .map(|config| camera_transform(&config.game.camera))
        .unwrap_or_else(|| Transform::from_xyz(0.0, 32.0, 48.0).looking_at(Vec3::ZERO, Vec3::Y));

    commands.spawn((
        Name::new("SceneCamera"),
        SceneCamera,
        Camera3d::default(),
        transform,
    ));
}

fn setup_lights(mut commands: Commands) {
    commands.spawn((
        Name::new("SunLight"),
        DirectionalLight {
            illuminance: SUN_ILLUMINANCE,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(10.0, 20.0, 10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
    // Stands in for ambient light so shadowed faces are not black.
    commands.spawn((
        Name::new("FillLight"),
        DirectionalLight {
            illuminance: FILL_ILLUMINANCE,
            shadows_enabled: false,
            ..default()
        },
        Transform::from_xyz(-10.0, 15.0, -10.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

fn sync_camera_from_config(
    config: Res<GameConfig>,
    mut camera_query: Query<&mut Transform, With<SceneCamera>>,
) {
    let transform = camera_transform(&config.game.camera);
    for mut camera_transform in &mut camera_query {
        *camera_transform = transform;
    }
}

fn enter_boot() {
    info!("Entered state: Boot");
}

fn boot_to_loading(
    config: Option<Res<GameConfig>>,
    registry: Option<Res<AssetRegistry>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if config.is_some() && registry.is_some() {
        next_state.set(GameState::Loading);
    }
}

fn enter_loading(mut commands: Commands, time: Res<Time>) {
    info!("Entered state: Loading");
    commands.insert_resource(LoadingState {
        entered_at_s: time.elapsed_secs_f64(),
    });
}

fn cleanup_loading_state(mut commands: Commands) {
    commands.remove_resource::<LoadingState>();
}

fn loading_to_running(
    time: Res<Time>,
    asset_server: Res<AssetServer>,
    loading_state: Option<Res<LoadingState>>,
    registry: Option<Res<AssetRegistry>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(loading_state) = loading_state else {
        return;
    };

    let has_min_time =
        time.elapsed_secs_f64() - loading_state.entered_at_s >= MIN_LOADING_SCREEN_SECONDS;
    if !has_min_time {
        return;
    }

    if let Some(registry) = registry {
        if !registry.models_settled(&asset_server) {
            return;
        }
    }

    next_state.set(GameState::Running);
}

fn enter_running() {
    info!("Entered state: Running");
}

fn running_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::Paused);
    }
}

fn enter_paused() {
    info!("Entered state: Paused");
}

fn pause_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    if keyboard.just_pressed(KeyCode::Escape) {
        next_state.set(GameState::Running);
    }

    if keyboard.just_pressed(KeyCode::Enter) {
        next_state.set(GameState::Boot);
    }
}
