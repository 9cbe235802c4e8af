pub mod calibration;
pub mod control;
pub mod kinematics;
mod model;
mod runtime;
mod scene;

use crate::assets::{AssetRegistry, ModelAssetEntry};
use crate::config::{GameConfig, ModelAdjustments};
use crate::gameplay::track::curve::TrackCurve;
use crate::states::GameState;
use bevy::prelude::*;
use calibration::{calibrate, mesh_local_bounds, VisualBounds};
use control::{held_key_events, ControlEvent, ControlKey, ControlMode, HeldKeys};
use kinematics::{
    model_local_transform, step, FrameUpdateError, KinematicsParams, VehicleAdjustment,
    VehicleState,
};
use model::{
    calibrate_vehicle_ground, detect_vehicle_visual_ready, dump_vehicle_model_structure,
    request_vehicle_model_dump_hotkey, VehicleModelDebugState,
};
use runtime::{
    apply_control_events, apply_vehicle_adjustments, apply_vehicle_kinematics,
    read_control_input, update_vehicle_telemetry,
};
use scene::{cleanup_vehicle_scene, spawn_vehicle_scene};

const FALLBACK_BODY_SIZE: Vec3 = Vec3::new(1.0, 0.5, 2.0);
const FALLBACK_WHEEL_RADIUS: f32 = 0.3;
const FALLBACK_WHEEL_WIDTH: f32 = 0.2;
const FALLBACK_WHEEL_OFFSETS: [Vec3; 4] = [
    Vec3::new(-0.6, -0.25, 0.7),
    Vec3::new(0.6, -0.25, 0.7),
    Vec3::new(-0.6, -0.25, -0.7),
    Vec3::new(0.6, -0.25, -0.7),
];

pub struct VehicleGameplayPlugin;

impl Plugin for VehicleGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<ControlBindings>()
            .init_resource::<ControlInput>()
            .init_resource::<VehicleTelemetry>()
            .init_resource::<VehicleModelDebugState>()
            .add_message::<VehicleAdjustment>()
            .add_message::<VehicleVisualReady>()
            .add_systems(
                OnEnter(GameState::Loading),
                spawn_vehicle_scene.run_if(resource_exists::<GameConfig>),
            )
            .add_systems(OnEnter(GameState::Boot), cleanup_vehicle_scene)
            .add_systems(
                Update,
                (detect_vehicle_visual_ready, calibrate_vehicle_ground).chain(),
            )
            .add_systems(
                Update,
                (
                    request_vehicle_model_dump_hotkey,
                    dump_vehicle_model_structure,
                )
                    .chain(),
            )
            .add_systems(
                Update,
                (
                    read_control_input.run_if(in_state(GameState::Running)),
                    apply_control_events.run_if(in_state(GameState::Running)),
                    apply_vehicle_adjustments,
                    apply_vehicle_kinematics.run_if(in_state(GameState::Running)),
                    update_vehicle_telemetry,
                )
                    .chain()
                    .after(calibrate_vehicle_ground),
            );
    }
}

#[derive(Component)]
pub struct PlayerVehicle;

/// Child of [`PlayerVehicle`] carrying the adjustable local rotation and
/// scale of the visual model.
#[derive(Component)]
pub struct VehicleModel;

#[derive(Component, Debug, Clone, Default)]
struct VehicleModelRuntime {
    model_id: Option<String>,
    visual_ready: bool,
    waiting_logged: bool,
}

/// Sent once per spawned model when all of its meshes are loaded.
#[derive(Message, Debug, Clone, Copy)]
pub struct VehicleVisualReady {
    pub model_root: Entity,
}

#[derive(Resource, Debug, Clone)]
pub struct ControlBindings {
    pub forward: Vec<KeyCode>,
    pub backward: Vec<KeyCode>,
    pub left: Vec<KeyCode>,
    pub right: Vec<KeyCode>,
    pub toggle: Vec<KeyCode>,
}

impl Default for ControlBindings {
    fn default() -> Self {
        Self {
            forward: vec![KeyCode::ArrowUp, KeyCode::KeyW],
            backward: vec![KeyCode::ArrowDown, KeyCode::KeyS],
            left: vec![KeyCode::ArrowLeft, KeyCode::KeyA],
            right: vec![KeyCode::ArrowRight, KeyCode::KeyD],
            toggle: vec![KeyCode::Space],
        }
    }
}

impl ControlBindings {
    fn keys_for(&self, key: ControlKey) -> &[KeyCode] {
        match key {
            ControlKey::Forward => &self.forward,
            ControlKey::Backward => &self.backward,
            ControlKey::Left => &self.left,
            ControlKey::Right => &self.right,
        }
    }
}

/// Control events gathered this frame, drained by the vehicle each update.
#[derive(Resource, Debug, Clone, Default)]
pub struct ControlInput {
    pub events: Vec<ControlEvent>,
}

#[derive(Resource, Debug, Clone, Default)]
pub struct VehicleTelemetry {
    pub mode: ControlMode,
    pub progress: f32,
    pub position: Vec3,
    pub rendered_height: f32,
    pub ground_offset: Option<f32>,
    pub held: HeldKeys,
    pub skipped_frames: u32,
    pub last_error: Option<String>,
    pub adjustments: Option<ModelAdjustments>,
}

/// Local transform of `node` relative to `ancestor`, or `None` if `ancestor`
/// is not on the node's parent chain.
fn transform_relative_to(
    node: Entity,
    ancestor: Entity,
    nodes: &Query<(&Transform, Option<&ChildOf>)>,
) -> Option<Transform> {
    let mut relative = Transform::IDENTITY;
    let mut current = node;
    while current != ancestor {
        let (local, parent) = nodes.get(current).ok()?;
        relative = *local * relative;
        current = parent?.parent();
    }
    Some(relative)
}

fn collect_descendants(root: Entity, children_query: &Query<&Children>, out: &mut Vec<Entity>) {
    let mut stack = vec![root];
    while let Some(entity) = stack.pop() {
        let Ok(children) = children_query.get(entity) else {
            continue;
        };
        for child in children.iter() {
            out.push(child);
            stack.push(child);
        }
    }
}
