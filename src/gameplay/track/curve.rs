use bevy::prelude::*;
use std::error::Error;
use std::f32::consts::TAU;
use std::fmt::{Display, Formatter};

pub const MIN_ANCHOR_COUNT: usize = 3;
pub const DEFAULT_ARC_LENGTH_DIVISIONS: usize = 200;
const MIN_ARC_LENGTH_DIVISIONS: usize = 8;
const CLOSING_ANCHOR_EPSILON: f32 = 1e-6;
const CENTRIPETAL_MIN_KNOT_SPACING: f32 = 1e-4;
const DEGENERATE_TANGENT_EPSILON: f32 = 1e-10;
const MIN_FALLBACK_RADIUS: f32 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum GeometryError {
    TooFewAnchors { count: usize },
    NonFiniteAnchor { index: usize },
    ZeroLength,
}

impl Display for GeometryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TooFewAnchors { count } => write!(
                f,
                "closed track needs at least {MIN_ANCHOR_COUNT} distinct anchor points, got {count}"
            ),
            Self::NonFiniteAnchor { index } => {
                write!(f, "anchor point {index} has a non-finite coordinate")
            }
            Self::ZeroLength => write!(f, "anchor points enclose a track of zero length"),
        }
    }
}

impl Error for GeometryError {}

/// Recovered inside the curve; callers of `point_at`/`tangent_at` only see the
/// default value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingError {
    NonFiniteParameter,
    NonFiniteResult,
    DegenerateTangent,
}

impl Display for SamplingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonFiniteParameter => write!(f, "curve parameter is not finite"),
            Self::NonFiniteResult => write!(f, "curve evaluation produced a non-finite value"),
            Self::DegenerateTangent => write!(f, "curve tangent has zero length"),
        }
    }
}

impl Error for SamplingError {}

/// Closed centripetal Catmull-Rom loop through a ring of anchors, sampled by
/// arc length so equal parameter steps cover equal distances.
#[derive(Resource, Debug, Clone)]
pub struct TrackCurve {
    anchors: Vec<Vec3>,
    /// Cumulative length at `i / divisions` of the raw spline parameter.
    arc_lengths: Vec<f32>,
    is_fallback: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurveSample {
    pub position: Vec3,
    pub tangent: Vec3,
}

impl TrackCurve {
    pub fn build_closed_loop(anchors: &[Vec3]) -> Result<Self, GeometryError> {
        Self::build_closed_loop_with_divisions(anchors, DEFAULT_ARC_LENGTH_DIVISIONS)
    }

    pub fn build_closed_loop_with_divisions(
        anchors: &[Vec3],
        divisions: usize,
    ) -> Result<Self, GeometryError> {
        if let Some(index) = anchors.iter().position(|anchor| !anchor.is_finite()) {
            return Err(GeometryError::NonFiniteAnchor { index });
        }

        // Rings are often authored with the first point repeated at the end.
        let mut ring = anchors.to_vec();
        while ring.len() > 1
            && ring[ring.len() - 1].distance_squared(ring[0]) <= CLOSING_ANCHOR_EPSILON
        {
            ring.pop();
        }

        if ring.len() < MIN_ANCHOR_COUNT {
            return Err(GeometryError::TooFewAnchors { count: ring.len() });
        }

        let curve = Self::from_ring(ring, divisions, false);
        if curve.total_length() <= f32::EPSILON {
            return Err(GeometryError::ZeroLength);
        }
        Ok(curve)
    }

    /// Circle substitute used when the configured track cannot be built.
    pub fn fallback_circle(radius: f32, anchor_count: usize) -> Self {
        let radius = if radius.is_finite() {
            radius.abs().max(MIN_FALLBACK_RADIUS)
        } else {
            MIN_FALLBACK_RADIUS
        };
        let ring = ring_anchor_points(radius, anchor_count.max(MIN_ANCHOR_COUNT), 0.0);
        Self::from_ring(ring, DEFAULT_ARC_LENGTH_DIVISIONS, true)
    }

    fn from_ring(anchors: Vec<Vec3>, divisions: usize, is_fallback: bool) -> Self {
        let mut curve = Self {
            anchors,
            arc_lengths: Vec::new(),
            is_fallback,
        };
        curve.arc_lengths = curve.build_arc_length_table(divisions.max(MIN_ARC_LENGTH_DIVISIONS));
        curve
    }

    fn build_arc_length_table(&self, divisions: usize) -> Vec<f32> {
        let mut lengths = Vec::with_capacity(divisions + 1);
        let mut previous = self.raw_point(0.0);
        let mut total = 0.0_f32;
        lengths.push(0.0);
        for index in 1..=divisions {
            let point = self.raw_point(index as f32 / divisions as f32);
            total += point.distance(previous);
            lengths.push(total);
            previous = point;
        }
        lengths
    }

    pub fn anchors(&self) -> &[Vec3] {
        &self.anchors
    }

    pub fn is_fallback(&self) -> bool {
        self.is_fallback
    }

    pub fn total_length(&self) -> f32 {
        self.arc_lengths.last().copied().unwrap_or(0.0)
    }

    pub fn point_at(&self, t: f32) -> Vec3 {
        self.try_point_at(t).unwrap_or_else(|error| {
            debug!("Track point sample at t={t} fell back to origin: {error}");
            Vec3::ZERO
        })
    }

    pub fn tangent_at(&self, t: f32) -> Vec3 {
        self.try_tangent_at(t).unwrap_or_else(|error| {
            debug!("Track tangent sample at t={t} fell back to +X: {error}");
            Vec3::X
        })
    }

    pub fn sample(&self, t: f32) -> CurveSample {
        CurveSample {
            position: self.point_at(t),
            tangent: self.tangent_at(t),
        }
    }

    pub fn try_point_at(&self, t: f32) -> Result<Vec3, SamplingError> {
        if !t.is_finite() {
            return Err(SamplingError::NonFiniteParameter);
        }
        let point = self.raw_point(self.spline_parameter(wrap_unit(t)));
        if point.is_finite() {
            Ok(point)
        } else {
            Err(SamplingError::NonFiniteResult)
        }
    }

    pub fn try_tangent_at(&self, t: f32) -> Result<Vec3, SamplingError> {
        if !t.is_finite() {
            return Err(SamplingError::NonFiniteParameter);
        }
        let u = self.spline_parameter(wrap_unit(t));

        let derivative = self.raw_derivative(u);
        if derivative.is_finite() && derivative.length_squared() > DEGENERATE_TANGENT_EPSILON {
            return Ok(derivative.normalize());
        }

        // Stationary point of the spline: use the chord between the neighbouring
        // arc-length samples instead.
        let step = 1.0 / self.divisions() as f32;
        let chord = self.raw_point(wrap_unit(u + step)) - self.raw_point(wrap_unit(u - step));
        if chord.is_finite() && chord.length_squared() > DEGENERATE_TANGENT_EPSILON {
            Ok(chord.normalize())
        } else {
            Err(SamplingError::DegenerateTangent)
        }
    }

    fn divisions(&self) -> usize {
        self.arc_lengths.len().saturating_sub(1).max(1)
    }

    /// Maps an arc-length fraction in `[0, 1)` to the raw spline parameter.
    fn spline_parameter(&self, t: f32) -> f32 {
        let total = self.total_length();
        if self.arc_lengths.len() < 2 || total <= f32::EPSILON {
            return t;
        }

        let target = t * total;
        let upper = self
            .arc_lengths
            .partition_point(|length| *length <= target)
            .clamp(1, self.arc_lengths.len() - 1);
        let lower = upper - 1;
        let span = self.arc_lengths[upper] - self.arc_lengths[lower];
        let fraction = if span > f32::EPSILON {
            ((target - self.arc_lengths[lower]) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };

        (lower as f32 + fraction) / self.divisions() as f32
    }

    fn segment_at(&self, u: f32) -> (HermiteSegment, f32) {
        let count = self.anchors.len();
        let scaled = wrap_unit(u) * count as f32;
        let index = (scaled.floor() as usize).min(count - 1);
        let local = (scaled - index as f32).clamp(0.0, 1.0);

        let segment = HermiteSegment::centripetal(
            self.anchors[(index + count - 1) % count],
            self.anchors[index],
            self.anchors[(index + 1) % count],
            self.anchors[(index + 2) % count],
        );
        (segment, local)
    }

    fn raw_point(&self, u: f32) -> Vec3 {
        let (segment, local) = self.segment_at(u);
        segment.point(local)
    }

    fn raw_derivative(&self, u: f32) -> Vec3 {
        let (segment, local) = self.segment_at(u);
        segment.derivative(local)
    }
}

/// Cubic Hermite form of one Catmull-Rom span between `p1` and `p2`.
#[derive(Debug, Clone, Copy)]
struct HermiteSegment {
    p1: Vec3,
    p2: Vec3,
    m1: Vec3,
    m2: Vec3,
}

impl HermiteSegment {
    fn centripetal(p0: Vec3, p1: Vec3, p2: Vec3, p3: Vec3) -> Self {
        let mut dt0 = p0.distance(p1).sqrt();
        let mut dt1 = p1.distance(p2).sqrt();
        let mut dt2 = p2.distance(p3).sqrt();

        if dt1 < CENTRIPETAL_MIN_KNOT_SPACING {
            dt1 = 1.0;
        }
        if dt0 < CENTRIPETAL_MIN_KNOT_SPACING {
            dt0 = dt1;
        }
        if dt2 < CENTRIPETAL_MIN_KNOT_SPACING {
            dt2 = dt1;
        }

        let m1 = ((p1 - p0) / dt0 - (p2 - p0) / (dt0 + dt1) + (p2 - p1) / dt1) * dt1;
        let m2 = ((p2 - p1) / dt1 - (p3 - p1) / (dt1 + dt2) + (p3 - p2) / dt2) * dt1;

        Self { p1, p2, m1, m2 }
    }

    fn point(&self, t: f32) -> Vec3 {
        let t2 = t * t;
        let t3 = t2 * t;

        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;

        self.p1 * h00 + self.m1 * h10 + self.p2 * h01 + self.m2 * h11
    }

    fn derivative(&self, t: f32) -> Vec3 {
        let t2 = t * t;

        let h00 = 6.0 * t2 - 6.0 * t;
        let h10 = 3.0 * t2 - 4.0 * t + 1.0;
        let h01 = -6.0 * t2 + 6.0 * t;
        let h11 = 3.0 * t2 - 2.0 * t;

        self.p1 * h00 + self.m1 * h10 + self.p2 * h01 + self.m2 * h11
    }
}

/// Reduces any finite value into `[0, 1)`.
pub fn wrap_unit(value: f32) -> f32 {
    let wrapped = value.rem_euclid(1.0);
    // rem_euclid rounds tiny negatives up to exactly 1.0 in f32.
    if wrapped >= 1.0 {
        0.0
    } else {
        // Whole negative inputs come back as -0.0.
        wrapped + 0.0
    }
}

/// Anchors at uniform angular steps on a horizontal circle, first point at +X.
pub fn ring_anchor_points(radius: f32, count: usize, height: f32) -> Vec<Vec3> {
    (0..count)
        .map(|index| {
            let angle = (index as f32 / count as f32) * TAU;
            Vec3::new(angle.cos() * radius, height, angle.sin() * radius)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;

    fn unit_square() -> Vec<Vec3> {
        vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(0.0, 0.0, 1.0),
        ]
    }

    #[test]
    fn square_loop_starts_at_first_anchor() {
        let curve = TrackCurve::build_closed_loop(&unit_square()).expect("square builds");
        assert!(curve.point_at(0.0).distance(Vec3::ZERO) < EPSILON);
        assert!(!curve.is_fallback());
    }

    #[test]
    fn square_loop_passes_through_every_anchor_in_order() {
        let anchors = unit_square();
        let curve = TrackCurve::build_closed_loop(&anchors).expect("square builds");
        for (index, anchor) in anchors.iter().enumerate() {
            let t = index as f32 / anchors.len() as f32;
            let point = curve.point_at(t);
            assert!(
                point.distance(*anchor) < 1e-2,
                "anchor {index}: expected {anchor:?}, got {point:?}"
            );
        }
    }

    #[test]
    fn sampling_wraps_for_values_outside_unit_range() {
        let curve =
            TrackCurve::build_closed_loop(&ring_anchor_points(27.5, 64, 0.0)).expect("ring");
        for t in [-2.3_f32, -0.75, -0.1, 0.0, 0.2, 0.5, 0.99, 1.0, 3.4] {
            let base = curve.point_at(t);
            assert!(base.distance(curve.point_at(t + 1.0)) < 0.05, "t + 1 at {t}");
            assert!(base.distance(curve.point_at(t - 1.0)) < 0.05, "t - 1 at {t}");
        }
        assert!(curve.point_at(0.0).distance(curve.point_at(1.0)) < EPSILON);
    }

    #[test]
    fn tangents_are_unit_length_and_continuous_across_the_seam() {
        let curve = TrackCurve::build_closed_loop(&unit_square()).expect("square builds");
        for step in 0..100 {
            let tangent = curve.tangent_at(step as f32 / 100.0);
            assert!((tangent.length() - 1.0).abs() < EPSILON);
        }

        let before_seam = curve.tangent_at(1.0 - 1e-4);
        let after_seam = curve.tangent_at(1e-4);
        assert!(before_seam.dot(after_seam) > 0.99);
    }

    #[test]
    fn ring_tangent_follows_direction_of_travel() {
        let curve =
            TrackCurve::build_closed_loop(&ring_anchor_points(10.0, 32, 0.0)).expect("ring");
        // Anchors wind from +X toward +Z.
        let tangent = curve.tangent_at(0.0);
        assert!(tangent.z > 0.99, "unexpected tangent {tangent:?}");
    }

    #[test]
    fn arc_length_sampling_keeps_spacing_uniform_on_unevenly_spaced_anchors() {
        // Uniform angles on an ellipse space anchors 2.5x further apart along the long sides.
        let anchors: Vec<Vec3> = (0..12)
            .map(|index| {
                let angle = index as f32 / 12.0 * TAU;
                Vec3::new(angle.cos() * 10.0, 0.0, angle.sin() * 4.0)
            })
            .collect();
        let curve = TrackCurve::build_closed_loop(&anchors).expect("loop builds");
        let steps = 50;
        let expected = curve.total_length() / steps as f32;
        for step in 0..steps {
            let a = curve.point_at(step as f32 / steps as f32);
            let b = curve.point_at((step + 1) as f32 / steps as f32);
            let spacing = a.distance(b);
            assert!(
                (spacing - expected).abs() < expected * 0.1,
                "step {step}: spacing {spacing}, expected {expected}"
            );
        }
    }

    #[test]
    fn rejects_too_few_anchors() {
        let error = TrackCurve::build_closed_loop(&[Vec3::ZERO, Vec3::X]).expect_err("too few");
        assert_eq!(error, GeometryError::TooFewAnchors { count: 2 });
    }

    #[test]
    fn repeated_closing_anchor_is_not_counted() {
        let mut anchors = ring_anchor_points(5.0, 8, 0.0);
        anchors.push(anchors[0]);
        let curve = TrackCurve::build_closed_loop(&anchors).expect("ring");
        assert_eq!(curve.anchors().len(), 8);

        let error = TrackCurve::build_closed_loop(&[Vec3::ZERO, Vec3::X, Vec3::ZERO])
            .expect_err("only two distinct anchors");
        assert_eq!(error, GeometryError::TooFewAnchors { count: 2 });
    }

    #[test]
    fn rejects_non_finite_anchor() {
        let mut anchors = unit_square();
        anchors[2].y = f32::NAN;
        let error = TrackCurve::build_closed_loop(&anchors).expect_err("nan anchor");
        assert_eq!(error, GeometryError::NonFiniteAnchor { index: 2 });
    }

    #[test]
    fn non_finite_parameter_resolves_to_defaults() {
        let curve = TrackCurve::build_closed_loop(&unit_square()).expect("square builds");
        assert_eq!(
            curve.try_point_at(f32::NAN),
            Err(SamplingError::NonFiniteParameter)
        );
        assert_eq!(curve.point_at(f32::NAN), Vec3::ZERO);
        assert_eq!(curve.tangent_at(f32::INFINITY), Vec3::X);
    }

    #[test]
    fn fallback_circle_has_requested_radius() {
        let curve = TrackCurve::fallback_circle(20.0, 100);
        assert!(curve.is_fallback());
        for step in 0..16 {
            let point = curve.point_at(step as f32 / 16.0);
            assert!((point.length() - 20.0).abs() < 0.05);
            assert!(point.y.abs() < EPSILON);
        }
        let circumference = TAU * 20.0;
        assert!((curve.total_length() - circumference).abs() < circumference * 0.01);
    }

    #[test]
    fn fallback_circle_survives_bad_inputs() {
        let curve = TrackCurve::fallback_circle(f32::NAN, 0);
        assert_eq!(curve.anchors().len(), MIN_ANCHOR_COUNT);
        assert!(curve.total_length() > 0.0);
    }

    #[test]
    fn wrap_unit_stays_in_half_open_range() {
        for value in [-1e-9_f32, -1.0, 0.0, 0.999_999_9, 1.0, 1.05, 17.25, -3.5] {
            let wrapped = wrap_unit(value);
            assert!((0.0..1.0).contains(&wrapped), "{value} -> {wrapped}");
        }
        assert!((wrap_unit(1.05) - 0.05).abs() < 1e-5);
        assert!((wrap_unit(-0.25) - 0.75).abs() < 1e-6);
    }

    #[test]
    fn wrap_unit_never_returns_negative_zero() {
        for value in [-1.0_f32, -2.0, -50.0, -0.0, 0.0, 3.0] {
            let wrapped = wrap_unit(value);
            assert_eq!(wrapped, 0.0);
            assert!(wrapped.is_sign_positive(), "{value} -> {wrapped}");
        }
    }
}
