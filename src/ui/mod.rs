use crate::gameplay::vehicle::control::ControlMode;
use crate::gameplay::vehicle::VehicleTelemetry;
use crate::states::GameState;
use bevy::prelude::*;

const HUD_PANEL_Z_INDEX: i32 = 190;
const HUD_PANEL_BG: Color = Color::srgba(0.0, 0.0, 0.0, 0.5);
const HUD_PANEL_BORDER: Color = Color::srgba(0.58, 0.68, 0.76, 0.92);
const HUD_TEXT_PRIMARY: Color = Color::srgb(1.0, 1.0, 1.0);
const HUD_TEXT_MUTED: Color = Color::srgb(0.76, 0.83, 0.9);

pub struct ControlsHudPlugin;

impl Plugin for ControlsHudPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(OnEnter(GameState::Running), spawn_controls_hud)
            .add_systems(OnEnter(GameState::Boot), cleanup_controls_hud)
            .add_systems(
                Update,
                (update_controls_hud, sync_pause_banner).run_if(resource_exists::<VehicleTelemetry>),
            );
    }
}

#[derive(Component)]
struct ControlsHudRoot;

#[derive(Component)]
struct HudModeText;

#[derive(Component)]
struct HudPauseText;

fn spawn_controls_hud(mut commands: Commands, existing_hud: Query<Entity, With<ControlsHudRoot>>) {
    if !existing_hud.is_empty() {
        return;
    }

    commands
        .spawn((
            Name::new("ControlsHudRoot"),
            ControlsHudRoot,
            Node {
                position_type: PositionType::Absolute,
                left: Val::Px(12.0),
                bottom: Val::Px(12.0),
                flex_direction: FlexDirection::Column,
                row_gap: Val::Px(4.0),
                padding: UiRect::all(Val::Px(10.0)),
                border: UiRect::all(Val::Px(1.0)),
                ..default()
            },
            BackgroundColor(HUD_PANEL_BG),
            BorderColor::all(HUD_PANEL_BORDER),
            ZIndex(HUD_PANEL_Z_INDEX),
        ))
        .with_children(|panel| {
            panel.spawn((
                Text::new("Arrow Keys: Control Car"),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(HUD_TEXT_MUTED),
            ));
            panel.spawn((
                Text::new("Space: Toggle Auto/Manual"),
                TextFont {
                    font_size: 16.0,
                    ..default()
                },
                TextColor(HUD_TEXT_MUTED),
            ));
            panel.spawn((
                HudModeText,
                Text::new(mode_line(ControlMode::default())),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(HUD_TEXT_PRIMARY),
            ));
            panel.spawn((
                HudPauseText,
                Text::new("PAUSED - Esc: Resume | Enter: Restart"),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(HUD_TEXT_PRIMARY),
                Visibility::Hidden,
            ));
        });
}

fn cleanup_controls_hud(mut commands: Commands, hud_query: Query<Entity, With<ControlsHudRoot>>) {
    for entity in &hud_query {
        commands.entity(entity).try_despawn();
    }
}

fn update_controls_hud(
    telemetry: Res<VehicleTelemetry>,
    mut text_query: Query<&mut Text, With<HudModeText>>,
) {
    if !telemetry.is_changed() {
        return;
    }

    for mut text in &mut text_query {
        let line = mode_line(telemetry.mode);
        if text.0 != line {
            text.0 = line;
        }
    }
}

fn sync_pause_banner(
    state: Res<State<GameState>>,
    mut banner_query: Query<&mut Visibility, With<HudPauseText>>,
) {
    let next_visibility = if *state.get() == GameState::Paused {
        Visibility::Inherited
    } else {
        Visibility::Hidden
    };

    for mut visibility in &mut banner_query {
        if *visibility != next_visibility {
            *visibility = next_visibility;
        }
    }
}

fn mode_line(mode: ControlMode) -> String {
    format!("Mode: {}", mode.label())
}
