use crate::config::{GameConfig, ModelAdjustments};
use crate::gameplay::track::curve::TrackCurve;
use crate::gameplay::vehicle::kinematics::VehicleAdjustment;
use crate::gameplay::vehicle::VehicleTelemetry;
use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin};
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use std::f32::consts::TAU;

pub struct DebugOverlayPlugin;

impl Plugin for DebugOverlayPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<KeybindOverlayState>()
            .init_resource::<AdjustmentPanelState>()
            .add_systems(Update, spawn_debug_overlay)
            .add_systems(Update, toggle_keybind_overlay)
            .add_systems(Update, toggle_adjustment_panel)
            .add_systems(Update, sync_keybind_overlay_visibility)
            .add_systems(
                Update,
                update_debug_overlay_text.run_if(resource_exists::<GameConfig>),
            )
            .add_systems(
                EguiPrimaryContextPass,
                adjustment_panel_ui.run_if(resource_exists::<GameConfig>),
            );
    }
}

#[derive(Component)]
struct DebugOverlayText;

#[derive(Component)]
struct KeybindOverlayText;

#[derive(Resource, Debug, Clone, Default)]
struct KeybindOverlayState {
    visible: bool,
}

#[derive(Resource, Debug, Default)]
struct AdjustmentPanelState {
    visible: bool,
    status: String,
}

fn spawn_debug_overlay(
    mut commands: Commands,
    keybind_overlay: Res<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
    existing_overlay: Query<Entity, With<DebugOverlayText>>,
) {
    if !existing_overlay.is_empty() {
        return;
    }

    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    commands.spawn((
        DebugOverlayText,
        Text::new("debug overlay initializing..."),
        TextFont {
            font_size: 16.0,
            ..default()
        },
        TextColor(Color::srgb(0.92, 0.95, 0.97)),
        Node {
            position_type: PositionType::Absolute,
            left: Val::Px(12.0),
            top: Val::Px(12.0),
            ..default()
        },
        ZIndex(100),
    ));

    commands.spawn((
        KeybindOverlayText,
        Text::new(keybind_overlay_text()),
        TextFont {
            font_size: 15.0,
            ..default()
        },
        TextColor(Color::srgb(0.90, 0.94, 0.97)),
        BackgroundColor(Color::srgba(0.06, 0.08, 0.10, 0.82)),
        BorderColor::all(Color::srgba(0.60, 0.68, 0.74, 0.9)),
        Node {
            position_type: PositionType::Absolute,
            right: Val::Px(12.0),
            top: Val::Px(12.0),
            padding: UiRect::axes(Val::Px(10.0), Val::Px(8.0)),
            border: UiRect::all(Val::Px(1.0)),
            ..default()
        },
        if keybind_overlay.visible {
            Visibility::Inherited
        } else {
            Visibility::Hidden
        },
        ZIndex(100),
    ));
}

fn update_debug_overlay_text(
    diagnostics: Res<DiagnosticsStore>,
    telemetry: Res<VehicleTelemetry>,
    curve: Option<Res<TrackCurve>>,
    mut overlay_query: Query<&mut Text, With<DebugOverlayText>>,
) {
    let Ok(mut text) = overlay_query.single_mut() else {
        return;
    };

    let fps = diagnostics
        .get(&FrameTimeDiagnosticsPlugin::FPS)
        .and_then(|value| value.smoothed())
        .unwrap_or(0.0);

    let track = match curve {
        Some(curve) if curve.is_fallback() => format!("fallback ({:.1})", curve.total_length()),
        Some(curve) => format!("{:.1}", curve.total_length()),
        None => "not built".to_string(),
    };
    let calibration = telemetry
        .ground_offset
        .map(|offset| format!("{offset:.3}"))
        .unwrap_or_else(|| "pending".to_string());
    let error = telemetry.last_error.as_deref().unwrap_or("none");

    *text = Text::new(format!(
        "FPS: {fps:>5.1}\nMode: {mode}\nProgress: {progress:.3}\nPosition: ({x:.2}, {y:.2}, {z:.2})\nHeight: {height:.3} | Ground offset: {calibration}\nTrack length: {track}\nHeld: {held}\nSkipped frames: {skipped} | Last error: {error}\nHotkeys: H help | V adjustments | N dump model | F5 reload config",
        mode = telemetry.mode.label(),
        progress = telemetry.progress,
        x = telemetry.position.x,
        y = telemetry.position.y,
        z = telemetry.position.z,
        height = telemetry.rendered_height,
        held = telemetry.held.describe(),
        skipped = telemetry.skipped_frames,
    ));
}

fn toggle_keybind_overlay(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<KeybindOverlayState>,
    config: Option<Res<GameConfig>>,
) {
    let Some(config) = config else {
        return;
    };

    if !config.game.app.debug_overlay {
        return;
    }

    if keyboard.just_pressed(KeyCode::KeyH) {
        state.visible = !state.visible;
        info!(
            "Debug keybind panel {}.",
            if state.visible { "shown" } else { "hidden" }
        );
    }
}

fn sync_keybind_overlay_visibility(
    state: Res<KeybindOverlayState>,
    mut query: Query<&mut Visibility, With<KeybindOverlayText>>,
) {
    if !state.is_changed() {
        return;
    }

    let next_visibility = if state.visible {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };

    for mut visibility in &mut query {
        *visibility = next_visibility;
    }
}

fn toggle_adjustment_panel(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut panel_state: ResMut<AdjustmentPanelState>,
    config: Option<Res<GameConfig>>,
) {
    if !keyboard.just_pressed(KeyCode::KeyV) {
        return;
    }
    let Some(config) = config else {
        return;
    };
    if !config.game.app.adjustment_panel {
        return;
    }

    panel_state.visible = !panel_state.visible;
    panel_state.status.clear();
    info!(
        "Car adjustment panel {}.",
        if panel_state.visible { "shown" } else { "hidden" }
    );
}

fn adjustment_panel_ui(
    mut egui_contexts: EguiContexts,
    mut panel_state: ResMut<AdjustmentPanelState>,
    telemetry: Res<VehicleTelemetry>,
    mut adjustment_events: MessageWriter<VehicleAdjustment>,
) {
    if !panel_state.visible {
        return;
    }

    let Some(current) = telemetry.adjustments else {
        return;
    };
    let mut edited = current;
    let mut window_open = panel_state.visible;
    let mut preset = None;
    let mut copy_clicked = false;
    let status = panel_state.status.clone();

    let Ok(ctx) = egui_contexts.ctx_mut() else {
        return;
    };
    egui::Window::new("Car Adjustments")
        .open(&mut window_open)
        .resizable(false)
        .default_width(360.0)
        .show(ctx, |ui| {
            adjustment_slider_row(ui, "Height", &mut edited.height, -1.0..=2.0, 0.01);
            adjustment_slider_row(ui, "Tilt", &mut edited.tilt, -1.5..=1.5, 0.01);
            adjustment_slider_row(ui, "Yaw", &mut edited.yaw, 0.0..=TAU, 0.01);
            adjustment_slider_row(ui, "Roll", &mut edited.roll, -1.0..=1.0, 0.01);
            adjustment_slider_row(ui, "Scale", &mut edited.scale, 0.5..=5.0, 0.01);
            ui.separator();

            ui.horizontal(|ui| {
                if ui.button("Default").clicked() {
                    preset = Some(VehicleAdjustment::RestoreDefaults);
                }
                if ui.button("Fix Tilt").clicked() {
                    preset = Some(VehicleAdjustment::FixTilt);
                }
                if ui.button("Fix Rotation").clicked() {
                    preset = Some(VehicleAdjustment::FixRotation);
                }
            });
            copy_clicked = ui.button("Copy Configuration").clicked();

            if !status.is_empty() {
                ui.separator();
                ui.label(status.as_str());
            }
        });

    for command in adjustment_commands(&current, &edited) {
        adjustment_events.write(command);
    }
    if let Some(command) = preset {
        adjustment_events.write(command);
    }

    if copy_clicked {
        match serde_json::to_string_pretty(&edited) {
            Ok(json) => {
                info!("Car adjustments:\n{json}");
                ctx.copy_text(json);
                panel_state.status = "Copied adjustments to clipboard.".to_string();
            }
            Err(error) => {
                panel_state.status = format!("Failed to serialize adjustments: {error}");
            }
        }
    }

    panel_state.visible = window_open;
}

fn adjustment_slider_row(
    ui: &mut egui::Ui,
    label: &str,
    value: &mut f32,
    slider_range: std::ops::RangeInclusive<f32>,
    drag_speed: f32,
) {
    ui.horizontal(|ui| {
        ui.label(label);
        ui.add(egui::Slider::new(&mut *value, slider_range).show_value(false));
        ui.add(egui::DragValue::new(value).speed(drag_speed as f64));
    });
}

/// One command per field the panel edited this frame.
fn adjustment_commands(
    before: &ModelAdjustments,
    after: &ModelAdjustments,
) -> Vec<VehicleAdjustment> {
    let mut commands = Vec::new();
    if after.height != before.height {
        commands.push(VehicleAdjustment::SetHeight(after.height));
    }
    if after.tilt != before.tilt {
        commands.push(VehicleAdjustment::SetTilt(after.tilt));
    }
    if after.yaw != before.yaw {
        commands.push(VehicleAdjustment::SetYaw(after.yaw));
    }
    if after.roll != before.roll {
        commands.push(VehicleAdjustment::SetRoll(after.roll));
    }
    if after.scale != before.scale {
        commands.push(VehicleAdjustment::SetScale(after.scale));
    }
    commands
}

fn keybind_overlay_text() -> &'static str {
    "Keybinds\n\
H - Toggle this panel\n\
V - Toggle car adjustments\n\
N - Dump vehicle model structure\n\
F5 - Hot-reload config\n\
Up / W - Forward\n\
Down / S - Backward\n\
Left / A - Steer left\n\
Right / D - Steer right\n\
Space - Toggle auto / manual\n\
Esc - Pause / resume\n\
Enter - Restart from pause"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adjustments() -> ModelAdjustments {
        ModelAdjustments {
            height: 0.0,
            tilt: 0.0,
            yaw: std::f32::consts::PI,
            roll: 0.0,
            scale: 1.0,
        }
    }

    #[test]
    fn unchanged_panel_sends_nothing() {
        assert!(adjustment_commands(&adjustments(), &adjustments()).is_empty());
    }

    #[test]
    fn edited_fields_become_set_commands() {
        let before = adjustments();
        let after = ModelAdjustments {
            height: 0.4,
            scale: 2.5,
            ..before
        };

        assert_eq!(
            adjustment_commands(&before, &after),
            vec![
                VehicleAdjustment::SetHeight(0.4),
                VehicleAdjustment::SetScale(2.5)
            ]
        );
    }

    #[test]
    fn copied_configuration_is_plain_json() {
        let json = serde_json::to_string_pretty(&adjustments()).expect("serialize adjustments");
        let parsed: ModelAdjustments = serde_json::from_str(&json).expect("parse adjustments");
        assert_eq!(parsed, adjustments());
        assert!(json.contains("\"scale\""));
    }
}
