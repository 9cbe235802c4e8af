pub mod curve;

use crate::config::{GameConfig, TrackConfig};
use crate::states::GameState;
use bevy::asset::RenderAssetUsages;
use bevy::mesh::{Indices, PrimitiveTopology};
use bevy::prelude::*;
use curve::{ring_anchor_points, TrackCurve};
use std::f32::consts::TAU;

const GROUND_SIZE: f32 = 400.0;
const GROUND_Y: f32 = -0.02;
const SURFACE_Y: f32 = 0.0;
const LINE_Y: f32 = 0.02;
const RING_SEGMENTS: usize = 128;
const EDGE_LINE_INSET: f32 = 0.1;
const EDGE_LINE_WIDTH: f32 = 0.16;
const DASH_WIDTH: f32 = 0.1;
const DASH_LENGTH: f32 = 1.0;
const DASH_GAP: f32 = 1.0;
const DASH_SEGMENTS: usize = 10;
const SIGN_PANEL_SIZE: Vec2 = Vec2::new(5.0, 3.0);
const SIGN_PANEL_HEIGHT: f32 = 2.0;
const SIGN_POST_SIZE: Vec3 = Vec3::new(0.3, 4.0, 0.3);
const SIGN_COLORS: [Color; 8] = [
    Color::srgb(0.0, 0.0, 1.0),
    Color::srgb(0.0, 1.0, 0.0),
    Color::srgb(0.5, 0.0, 0.5),
    Color::srgb(1.0, 0.65, 0.0),
    Color::srgb(1.0, 0.0, 0.0),
    Color::srgb(1.0, 0.41, 0.71),
    Color::srgb(0.0, 1.0, 0.0),
    Color::srgb(1.0, 1.0, 0.0),
];

pub struct TrackGameplayPlugin;

impl Plugin for TrackGameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(
            OnEnter(GameState::Loading),
            (build_track_curve, spawn_track_visuals).chain(),
        )
        .add_systems(OnEnter(GameState::Boot), cleanup_track_scene);
    }
}

/// Root of every entity the track plugin spawns.
#[derive(Component)]
pub struct TrackVisual;

fn build_track_curve(mut commands: Commands, config: Res<GameConfig>) {
    let track = &config.game.track;
    let anchors = ring_anchor_points(track.curve_radius, track.anchor_count, 0.0);

    let curve =
        match TrackCurve::build_closed_loop_with_divisions(&anchors, track.arc_length_divisions) {
            Ok(curve) => {
                info!(
                    "Built track curve: {} anchors, length {:.1} m.",
                    curve.anchors().len(),
                    curve.total_length()
                );
                curve
            }
            Err(error) => {
                error!(
                    "Track curve construction failed, using fallback circle of radius {}: {error}",
                    track.fallback_radius
                );
                TrackCurve::fallback_circle(track.fallback_radius, track.fallback_anchor_count)
            }
        };

    commands.insert_resource(curve);
}

fn spawn_track_visuals(
    mut commands: Commands,
    config: Res<GameConfig>,
    curve: Res<TrackCurve>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    existing: Query<Entity, With<TrackVisual>>,
) {
    if !existing.is_empty() {
        return;
    }

    let track = &config.game.track;
    let (inner_radius, outer_radius) = surface_radii(track, &curve);

    commands.spawn((
        Name::new("TrackGround"),
        TrackVisual,
        Mesh3d(meshes.add(Plane3d::default().mesh().size(GROUND_SIZE, GROUND_SIZE))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.87, 0.76, 0.55),
            perceptual_roughness: 1.0,
            ..default()
        })),
        Transform::from_xyz(0.0, GROUND_Y, 0.0),
    ));

    commands.spawn((
        Name::new("TrackSurface"),
        TrackVisual,
        Mesh3d(meshes.add(build_arc_strip_mesh(
            inner_radius,
            outer_radius,
            0.0,
            TAU,
            RING_SEGMENTS,
        ))),
        MeshMaterial3d(materials.add(StandardMaterial {
            base_color: Color::srgb(0.2, 0.2, 0.22),
            perceptual_roughness: 0.9,
            ..default()
        })),
        Transform::from_xyz(0.0, SURFACE_Y, 0.0),
    ));

    let line_material = materials.add(StandardMaterial {
        base_color: Color::WHITE,
        unlit: true,
        ..default()
    });

    for (name, radius) in [
        ("TrackInnerEdge", inner_radius + EDGE_LINE_INSET),
        ("TrackOuterEdge", outer_radius - EDGE_LINE_INSET),
    ] {
        commands.spawn((
            Name::new(name),
            TrackVisual,
            Mesh3d(meshes.add(build_arc_strip_mesh(
                radius - EDGE_LINE_WIDTH * 0.5,
                radius + EDGE_LINE_WIDTH * 0.5,
                0.0,
                TAU,
                RING_SEGMENTS,
            ))),
            MeshMaterial3d(line_material.clone()),
            Transform::from_xyz(0.0, LINE_Y, 0.0),
        ));
    }

    let centre_radius = (inner_radius + outer_radius) * 0.5;
    commands
        .spawn((
            Name::new("TrackCentreLine"),
            TrackVisual,
            Transform::from_xyz(0.0, LINE_Y, 0.0),
            Visibility::default(),
        ))
        .with_children(|parent| {
            for (start, end) in dash_arcs(centre_radius) {
                parent.spawn((
                    Mesh3d(meshes.add(build_arc_strip_mesh(
                        centre_radius - DASH_WIDTH * 0.5,
                        centre_radius + DASH_WIDTH * 0.5,
                        start,
                        end,
                        DASH_SEGMENTS,
                    ))),
                    MeshMaterial3d(line_material.clone()),
                    Transform::default(),
                ));
            }
        });

    let panel_mesh = meshes.add(Rectangle::new(SIGN_PANEL_SIZE.x, SIGN_PANEL_SIZE.y));
    let post_mesh = meshes.add(Cuboid::from_size(SIGN_POST_SIZE));
    let post_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.2, 0.2, 0.2),
        metallic: 0.5,
        perceptual_roughness: 0.7,
        ..default()
    });

    for (index, transform) in sign_placements(&curve, track.sign_count, track.sign_offset)
        .into_iter()
        .enumerate()
    {
        let panel_material = materials.add(StandardMaterial {
            base_color: SIGN_COLORS[index % SIGN_COLORS.len()],
            metallic: 0.3,
            perceptual_roughness: 0.4,
            double_sided: true,
            cull_mode: None,
            ..default()
        });

        commands
            .spawn((
                Name::new(format!("TrackSign{index}")),
                TrackVisual,
                transform,
                Visibility::default(),
            ))
            .with_children(|parent| {
                parent.spawn((
                    Mesh3d(panel_mesh.clone()),
                    MeshMaterial3d(panel_material),
                    Transform::from_xyz(0.0, SIGN_PANEL_HEIGHT, 0.0),
                ));
                parent.spawn((
                    Mesh3d(post_mesh.clone()),
                    MeshMaterial3d(post_material.clone()),
                    Transform::default(),
                ));
            });
    }

    debug!(
        "Spawned track visuals: surface {inner_radius:.1}..{outer_radius:.1} m, {} signs.",
        track.sign_count
    );
}

fn cleanup_track_scene(mut commands: Commands, visuals: Query<Entity, With<TrackVisual>>) {
    for entity in &visuals {
        commands.entity(entity).try_despawn();
    }
    commands.remove_resource::<TrackCurve>();
}

/// Asphalt band radii. A fallback circle gets a band of the configured width
/// centred on its own radius.
fn surface_radii(track: &TrackConfig, curve: &TrackCurve) -> (f32, f32) {
    if !curve.is_fallback() {
        return (track.surface_inner_radius, track.surface_outer_radius);
    }

    let half_width = (track.surface_outer_radius - track.surface_inner_radius) * 0.5;
    let radius = curve
        .anchors()
        .first()
        .map(|anchor| Vec2::new(anchor.x, anchor.z).length())
        .unwrap_or(track.fallback_radius);
    ((radius - half_width).max(0.1), radius + half_width)
}

/// Start and end angles of the centre-line dashes, equal dash and gap lengths.
fn dash_arcs(radius: f32) -> Vec<(f32, f32)> {
    let circumference = TAU * radius;
    let dash_count = (circumference / (DASH_LENGTH + DASH_GAP)).floor() as usize;
    if dash_count == 0 {
        return Vec::new();
    }

    let dash_fraction = DASH_LENGTH / (DASH_LENGTH + DASH_GAP);
    (0..dash_count)
        .map(|index| {
            let start = index as f32 / dash_count as f32;
            let end = (index as f32 + dash_fraction) / dash_count as f32;
            (start * TAU, end * TAU)
        })
        .collect()
}

/// Sign transforms at even curve parameters, pushed outward from the track
/// centre and turned to face it.
fn sign_placements(curve: &TrackCurve, count: usize, offset: f32) -> Vec<Transform> {
    (0..count)
        .map(|index| {
            let on_track = curve.point_at(index as f32 / count as f32);
            let outward = Vec3::new(on_track.x, 0.0, on_track.z)
                .try_normalize()
                .unwrap_or(Vec3::X);
            let position = Vec3::new(on_track.x, 0.0, on_track.z) + outward * offset;
            Transform::from_translation(position).looking_to(outward, Vec3::Y)
        })
        .collect()
}

/// Flat annular strip on the XZ plane between `inner` and `outer`, facing +Y.
fn build_arc_strip_mesh(
    inner: f32,
    outer: f32,
    start_angle: f32,
    end_angle: f32,
    segments: usize,
) -> Mesh {
    let segments = segments.max(1);
    let node_count = segments + 1;
    let mut positions = Vec::with_capacity(node_count * 2);
    let mut normals = Vec::with_capacity(node_count * 2);
    let mut uvs = Vec::with_capacity(node_count * 2);
    let mut indices = Vec::with_capacity(segments * 6);

    for index in 0..node_count {
        let u = index as f32 / segments as f32;
        let angle = start_angle + (end_angle - start_angle) * u;
        let (sin, cos) = angle.sin_cos();
        positions.push([cos * inner, 0.0, sin * inner]);
        positions.push([cos * outer, 0.0, sin * outer]);
        normals.push([0.0, 1.0, 0.0]);
        normals.push([0.0, 1.0, 0.0]);
        uvs.push([u, 0.0]);
        uvs.push([u, 1.0]);
    }

    for index in 0..segments {
        let base = (index * 2) as u32;
        indices.extend_from_slice(&[base, base + 2, base + 1, base + 1, base + 2, base + 3]);
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}
