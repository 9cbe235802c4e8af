use bevy::mesh::VertexAttributeValues;
use bevy::prelude::*;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Empirical tuning values that keep the car at its established visual
/// height. Not physically derived.
pub const GROUND_OFFSET_SCALE: f32 = 0.5;
pub const GROUND_BUFFER: f32 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualBounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl VisualBounds {
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self {
            min: min.min(max),
            max: max.max(min),
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for point in points {
            min = min.min(point);
            max = max.max(point);
        }

        if min.is_finite() && max.is_finite() {
            Some(Self { min, max })
        } else {
            None
        }
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Axis-aligned bounds of these bounds after `transform`.
    pub fn transformed(&self, transform: &Transform) -> Self {
        let corners = self.corners().map(|corner| transform.transform_point(corner));
        let mut bounds = Self {
            min: corners[0],
            max: corners[0],
        };
        for corner in &corners[1..] {
            bounds.min = bounds.min.min(*corner);
            bounds.max = bounds.max.max(*corner);
        }
        bounds
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    NoGeometry,
    NonFiniteBounds(VisualBounds),
}

impl Display for CalibrationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoGeometry => write!(f, "vehicle visual has no measurable mesh geometry"),
            Self::NonFiniteBounds(bounds) => write!(
                f,
                "vehicle visual bounds are not finite (min {:?}, max {:?})",
                bounds.min, bounds.max
            ),
        }
    }
}

impl Error for CalibrationError {}

/// Distance from the model's local origin down to its lowest visual point,
/// signed the way the bounds report it.
pub fn calibrate(bounds: Option<VisualBounds>) -> Result<f32, CalibrationError> {
    let bounds = bounds.ok_or(CalibrationError::NoGeometry)?;
    if !(bounds.min.is_finite() && bounds.max.is_finite()) {
        return Err(CalibrationError::NonFiniteBounds(bounds));
    }
    Ok(bounds.min.y)
}

pub fn rendered_height(ground_offset: Option<f32>, height_adjustment: f32) -> f32 {
    match ground_offset {
        Some(offset) => offset.abs() * GROUND_OFFSET_SCALE + GROUND_BUFFER + height_adjustment,
        None => GROUND_BUFFER + height_adjustment,
    }
}

pub fn mesh_local_bounds(mesh: &Mesh) -> Option<VisualBounds> {
    let positions = mesh.attribute(Mesh::ATTRIBUTE_POSITION)?;
    match positions {
        VertexAttributeValues::Float32x3(values) => {
            VisualBounds::from_points(values.iter().map(|[x, y, z]| Vec3::new(*x, *y, *z)))
        }
        VertexAttributeValues::Float32x4(values) => {
            VisualBounds::from_points(values.iter().map(|[x, y, z, _w]| Vec3::new(*x, *y, *z)))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn calibration_reports_lowest_point() {
        let bounds = VisualBounds::new(Vec3::new(-1.0, -0.4, -2.0), Vec3::new(1.0, 0.6, 2.0));
        let offset = calibrate(Some(bounds)).expect("finite bounds calibrate");
        assert!((offset + 0.4).abs() < 1e-6);

        let height = rendered_height(Some(offset), 0.0);
        assert!((height - (0.2 + GROUND_BUFFER)).abs() < 1e-6);
    }

    #[test]
    fn uncalibrated_height_uses_buffer_only() {
        assert!((rendered_height(None, 0.0) - GROUND_BUFFER).abs() < 1e-6);
        assert!((rendered_height(None, 0.23) - (GROUND_BUFFER + 0.23)).abs() < 1e-6);
    }

    #[test]
    fn positive_offsets_are_treated_by_magnitude() {
        assert_eq!(rendered_height(Some(0.4), 0.1), rendered_height(Some(-0.4), 0.1));
    }

    #[test]
    fn calibration_without_geometry_fails() {
        assert_eq!(calibrate(None), Err(CalibrationError::NoGeometry));
    }

    #[test]
    fn calibration_rejects_non_finite_bounds() {
        let bounds = VisualBounds {
            min: Vec3::new(0.0, f32::NAN, 0.0),
            max: Vec3::ONE,
        };
        assert!(matches!(
            calibrate(Some(bounds)),
            Err(CalibrationError::NonFiniteBounds(_))
        ));
    }

    #[test]
    fn bounds_from_points_and_union() {
        let a = VisualBounds::from_points([Vec3::new(0.0, 1.0, 0.0), Vec3::new(2.0, -1.0, 3.0)])
            .expect("points");
        assert_eq!(a.min, Vec3::new(0.0, -1.0, 0.0));
        assert_eq!(a.max, Vec3::new(2.0, 1.0, 3.0));

        let b = VisualBounds::new(Vec3::splat(-5.0), Vec3::splat(-4.0));
        let merged = a.union(b);
        assert_eq!(merged.min, Vec3::splat(-5.0));
        assert_eq!(merged.max, Vec3::new(2.0, 1.0, 3.0));

        assert!(VisualBounds::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn transformed_bounds_follow_rotation_and_scale() {
        // A long, flat box pitched up 90 degrees becomes tall.
        let bounds = VisualBounds::new(Vec3::new(-0.5, -0.25, -1.0), Vec3::new(0.5, 0.25, 1.0));
        let transform = Transform::from_rotation(Quat::from_rotation_x(FRAC_PI_2))
            .with_scale(Vec3::splat(2.0));
        let rotated = bounds.transformed(&transform);
        assert!((rotated.min.y + 2.0).abs() < 1e-4);
        assert!((rotated.max.y - 2.0).abs() < 1e-4);
        assert!((rotated.size().x - 2.0).abs() < 1e-4);
    }

    #[test]
    fn mesh_bounds_cover_cuboid_vertices() {
        let mesh = Mesh::from(Cuboid::new(1.0, 0.5, 2.0));
        let bounds = mesh_local_bounds(&mesh).expect("cuboid has positions");
        assert!((bounds.min.y + 0.25).abs() < 1e-6);
        assert!((bounds.max.z - 1.0).abs() < 1e-6);
    }
}
