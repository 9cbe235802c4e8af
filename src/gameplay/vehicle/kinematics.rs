use super::calibration::rendered_height;
use super::control::{ControlMode, ControlState};
use crate::config::{ModelAdjustments, VehicleConfig};
use crate::gameplay::track::curve::{wrap_unit, TrackCurve};
use bevy::prelude::*;
use std::error::Error;
use std::f32::consts::PI;
use std::fmt::{Display, Formatter};

pub const DEFAULT_AUTO_SPEED: f32 = 0.05;
pub const DEFAULT_MANUAL_SPEED: f32 = 0.05;
pub const DEFAULT_STEER_ANGLE_RAD: f32 = PI * 0.05;
pub const DEFAULT_STEER_NUDGE_SPEED: f32 = 0.1;

/// Per-second rates in curve-parameter units (one unit is a full lap).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KinematicsParams {
    pub auto_speed: f32,
    pub manual_speed: f32,
    pub steer_angle_rad: f32,
    pub steer_nudge_speed: f32,
}

impl Default for KinematicsParams {
    fn default() -> Self {
        Self {
            auto_speed: DEFAULT_AUTO_SPEED,
            manual_speed: DEFAULT_MANUAL_SPEED,
            steer_angle_rad: DEFAULT_STEER_ANGLE_RAD,
            steer_nudge_speed: DEFAULT_STEER_NUDGE_SPEED,
        }
    }
}

impl KinematicsParams {
    pub fn from_config(vehicle: &VehicleConfig) -> Self {
        Self {
            auto_speed: vehicle.auto_speed,
            manual_speed: vehicle.manual_speed,
            steer_angle_rad: vehicle.steer_angle_rad,
            steer_nudge_speed: vehicle.steer_nudge_speed,
        }
    }
}

/// Output of one integration step: the root transform on the track and the
/// local transform of the model node underneath it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehiclePose {
    pub root: Transform,
    pub model_rotation: Quat,
    pub model_scale: Vec3,
}

impl VehiclePose {
    pub fn model_transform(&self) -> Transform {
        Transform {
            translation: Vec3::ZERO,
            rotation: self.model_rotation,
            scale: self.model_scale,
        }
    }
}

#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub enum VehicleAdjustment {
    SetHeight(f32),
    ResetHeight,
    SetTilt(f32),
    ResetTilt,
    SetYaw(f32),
    SetRoll(f32),
    SetScale(f32),
    RestoreDefaults,
    FixTilt,
    FixRotation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FrameUpdateError {
    InvalidDelta(f32),
    NonFiniteProgress(f32),
    NonFinitePose,
    MissingCurve,
    MissingVehicle,
    InvalidAdjustment(VehicleAdjustment),
}

impl Display for FrameUpdateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDelta(dt) => write!(f, "frame delta {dt} is negative or not finite"),
            Self::NonFiniteProgress(progress) => {
                write!(f, "vehicle progress would become {progress}")
            }
            Self::NonFinitePose => write!(f, "computed vehicle pose is not finite"),
            Self::MissingCurve => write!(f, "track curve is not built yet"),
            Self::MissingVehicle => write!(f, "no player vehicle is spawned"),
            Self::InvalidAdjustment(command) => {
                write!(f, "adjustment {command:?} has an out-of-range value")
            }
        }
    }
}

impl Error for FrameUpdateError {}

#[derive(Component, Debug, Clone)]
pub struct VehicleState {
    pub progress: f32,
    pub control: ControlState,
    pub adjustments: ModelAdjustments,
    pub default_adjustments: ModelAdjustments,
    pub ground_offset: Option<f32>,
    pub last_pose: Option<VehiclePose>,
}

impl VehicleState {
    pub fn new(default_adjustments: ModelAdjustments) -> Self {
        Self {
            progress: 0.0,
            control: ControlState::default(),
            adjustments: default_adjustments,
            default_adjustments,
            ground_offset: None,
            last_pose: None,
        }
    }

    pub fn mode(&self) -> ControlMode {
        self.control.mode
    }

    pub fn rendered_height(&self) -> f32 {
        rendered_height(self.ground_offset, self.adjustments.height)
    }

    pub fn apply_adjustment(&mut self, command: VehicleAdjustment) -> Result<(), FrameUpdateError> {
        let value_ok = match command {
            VehicleAdjustment::SetHeight(value)
            | VehicleAdjustment::SetTilt(value)
            | VehicleAdjustment::SetYaw(value)
            | VehicleAdjustment::SetRoll(value) => value.is_finite(),
            VehicleAdjustment::SetScale(value) => value.is_finite() && value > 0.0,
            _ => true,
        };
        if !value_ok {
            return Err(FrameUpdateError::InvalidAdjustment(command));
        }

        let adjustments = &mut self.adjustments;
        match command {
            VehicleAdjustment::SetHeight(value) => adjustments.height = value,
            VehicleAdjustment::ResetHeight => adjustments.height = 0.0,
            VehicleAdjustment::SetTilt(value) => adjustments.tilt = value,
            VehicleAdjustment::ResetTilt | VehicleAdjustment::FixTilt => adjustments.tilt = 0.0,
            VehicleAdjustment::SetYaw(value) => adjustments.yaw = value,
            VehicleAdjustment::SetRoll(value) => adjustments.roll = value,
            VehicleAdjustment::SetScale(value) => adjustments.scale = value,
            VehicleAdjustment::RestoreDefaults => *adjustments = self.default_adjustments,
            VehicleAdjustment::FixRotation => {
                adjustments.yaw = PI;
                adjustments.roll = 0.0;
            }
        }
        Ok(())
    }
}

/// Advances `state` by `dt` seconds and returns the resulting pose.
///
/// On error the state is left untouched so the caller can skip the frame.
pub fn step(
    state: &mut VehicleState,
    curve: &TrackCurve,
    params: &KinematicsParams,
    dt: f32,
) -> Result<VehiclePose, FrameUpdateError> {
    if !dt.is_finite() || dt < 0.0 {
        return Err(FrameUpdateError::InvalidDelta(dt));
    }

    let held = state.control.held;
    let (progress_change, steer_angle) = match state.control.mode {
        ControlMode::Auto => (params.auto_speed * dt, 0.0),
        ControlMode::Manual => (
            params.manual_speed * dt * held.throttle(),
            params.steer_angle_rad * held.steer_sign(),
        ),
    };

    let raw_progress = state.progress + progress_change;
    if !raw_progress.is_finite() {
        return Err(FrameUpdateError::NonFiniteProgress(raw_progress));
    }
    // Steering bends the path by sliding further along the curve. The nudge
    // lands before sampling so the stored progress always matches the pose.
    let mut nudge = 0.0;
    if steer_angle != 0.0 && progress_change != 0.0 {
        if held.left {
            nudge += params.steer_nudge_speed * dt;
        }
        if held.right {
            nudge -= params.steer_nudge_speed * dt;
        }
    }
    let progress = wrap_unit(wrap_unit(raw_progress) + nudge);

    let pose = pose_at(
        curve,
        progress,
        steer_angle,
        &state.adjustments,
        state.rendered_height(),
    )?;

    state.progress = progress;
    state.last_pose = Some(pose);

    Ok(pose)
}

pub fn pose_at(
    curve: &TrackCurve,
    progress: f32,
    steer_angle: f32,
    adjustments: &ModelAdjustments,
    height: f32,
) -> Result<VehiclePose, FrameUpdateError> {
    let sample = curve.sample(progress);
    let position = Vec3::new(sample.position.x, height, sample.position.z);

    let mut forward = sample.tangent;
    if steer_angle != 0.0 {
        forward = Quat::from_rotation_y(steer_angle) * forward;
    }

    // Vehicle models face +Z, Bevy's look rotation points -Z at the target.
    let root = Transform::from_translation(position).looking_to(-forward, Vec3::Y);
    let model = model_local_transform(adjustments);

    if !(root.translation.is_finite() && root.rotation.is_finite() && model.rotation.is_finite()) {
        return Err(FrameUpdateError::NonFinitePose);
    }

    Ok(VehiclePose {
        root,
        model_rotation: model.rotation,
        model_scale: model.scale,
    })
}

/// Tilt, yaw and roll applied in that order, then uniform scale.
pub fn model_local_transform(adjustments: &ModelAdjustments) -> Transform {
    Transform::from_rotation(Quat::from_euler(
        EulerRot::XYZ,
        adjustments.tilt,
        adjustments.yaw,
        adjustments.roll,
    ))
    .with_scale(Vec3::splat(adjustments.scale))
}
