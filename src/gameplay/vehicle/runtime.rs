use super::*;

pub(super) fn read_control_input(
    keyboard: Res<ButtonInput<KeyCode>>,
    bindings: Res<ControlBindings>,
    mut input: ResMut<ControlInput>,
    vehicle_query: Query<&VehicleState, With<PlayerVehicle>>,
) {
    let held = vehicle_query
        .single()
        .map(|state| state.control.held)
        .unwrap_or_default();

    input.events.extend(held_key_events(
        &held,
        |key| {
            bindings
                .keys_for(key)
                .iter()
                .any(|code| keyboard.just_pressed(*code))
        },
        |key| {
            bindings
                .keys_for(key)
                .iter()
                .any(|code| keyboard.pressed(*code))
        },
    ));

    if bindings
        .toggle
        .iter()
        .any(|code| keyboard.just_pressed(*code))
    {
        input.events.push(ControlEvent::Toggle);
    }
}

pub(super) fn apply_control_events(
    mut input: ResMut<ControlInput>,
    mut vehicle_query: Query<&mut VehicleState, With<PlayerVehicle>>,
) {
    let Ok(mut state) = vehicle_query.single_mut() else {
        input.events.clear();
        return;
    };

    for event in input.events.drain(..) {
        if let Some(mode) = state.control.apply(event) {
            info!("Control mode set to: {}", mode.label());
        }
    }
}

pub(super) fn apply_vehicle_adjustments(
    mut adjustments: MessageReader<VehicleAdjustment>,
    mut vehicle_query: Query<&mut VehicleState, With<PlayerVehicle>>,
) {
    let Ok(mut state) = vehicle_query.single_mut() else {
        adjustments.clear();
        return;
    };

    for command in adjustments.read() {
        match state.apply_adjustment(*command) {
            Ok(()) => debug!("Applied vehicle adjustment {command:?}."),
            Err(error) => warn!("Ignored vehicle adjustment: {error}"),
        }
    }
}

#[allow(clippy::type_complexity)]
pub(super) fn apply_vehicle_kinematics(
    time: Res<Time>,
    config: Res<GameConfig>,
    curve: Option<Res<TrackCurve>>,
    mut telemetry: ResMut<VehicleTelemetry>,
    mut vehicle_query: Query<(&mut Transform, &mut VehicleState, &Children), With<PlayerVehicle>>,
    mut model_query: Query<&mut Transform, (With<VehicleModel>, Without<PlayerVehicle>)>,
) {
    let params = config
        .default_vehicle()
        .map(KinematicsParams::from_config)
        .unwrap_or_default();

    let result = match (curve, vehicle_query.single_mut()) {
        (None, _) => Err(FrameUpdateError::MissingCurve),
        (_, Err(_)) => Err(FrameUpdateError::MissingVehicle),
        (Some(curve), Ok((mut root_transform, mut state, children))) => {
            step(&mut state, &curve, &params, time.delta_secs()).map(|pose| {
                *root_transform = pose.root;
                for child in children.iter() {
                    if let Ok(mut model_transform) = model_query.get_mut(child) {
                        *model_transform = pose.model_transform();
                    }
                }
            })
        }
    };

    match result {
        Ok(()) => telemetry.last_error = None,
        Err(error) => {
            telemetry.skipped_frames = telemetry.skipped_frames.saturating_add(1);
            let message = error.to_string();
            // Repeated identical failures are logged once.
            if telemetry.last_error.as_deref() != Some(message.as_str()) {
                error!("Skipped vehicle update: {message}");
                telemetry.last_error = Some(message);
            }
        }
    }
}

pub(super) fn update_vehicle_telemetry(
    mut telemetry: ResMut<VehicleTelemetry>,
    vehicle_query: Query<(&Transform, &VehicleState), With<PlayerVehicle>>,
) {
    let Ok((transform, state)) = vehicle_query.single() else {
        telemetry.adjustments = None;
        return;
    };

    telemetry.mode = state.mode();
    telemetry.progress = state.progress;
    telemetry.position = transform.translation;
    telemetry.rendered_height = state.rendered_height();
    telemetry.ground_offset = state.ground_offset;
    telemetry.held = state.control.held;
    telemetry.adjustments = Some(state.adjustments);
}
