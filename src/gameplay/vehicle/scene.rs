use super::*;

pub(super) fn spawn_vehicle_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    config: Res<GameConfig>,
    asset_registry: Option<Res<AssetRegistry>>,
    mut telemetry: ResMut<VehicleTelemetry>,
    existing_player: Query<Entity, With<PlayerVehicle>>,
) {
    if !existing_player.is_empty() {
        return;
    }

    let Some(vehicle) = config.default_vehicle() else {
        error!(
            "Default vehicle `{}` is missing; no vehicle spawned.",
            config.game.app.default_vehicle
        );
        return;
    };

    let model_scene = vehicle.model.as_deref().and_then(|model_id| {
        let entry = asset_registry
            .as_ref()
            .and_then(|registry| registry.models.get(model_id));
        match entry.and_then(|entry: &ModelAssetEntry| entry.handle.clone()) {
            Some(handle) => Some((model_id.to_string(), handle)),
            None => {
                warn!("Vehicle model `{model_id}` is not available on disk; using fallback car.");
                None
            }
        }
    });

    let state = VehicleState::new(vehicle.adjustments);
    *telemetry = VehicleTelemetry::default();

    let vehicle_entity = commands
        .spawn((
            Name::new("PlayerVehicle"),
            PlayerVehicle,
            state,
            Transform::default(),
            Visibility::default(),
        ))
        .id();

    let mut model = commands.spawn((
        Name::new("PlayerVehicleModel"),
        VehicleModel,
        model_local_transform(&vehicle.adjustments),
        Visibility::default(),
        ChildOf(vehicle_entity),
    ));

    match model_scene {
        Some((model_id, handle)) => {
            info!("Spawning vehicle `{}` with model `{model_id}`.", vehicle.id);
            model.insert((
                SceneRoot(handle),
                VehicleModelRuntime {
                    model_id: Some(model_id),
                    ..default()
                },
            ));
        }
        None => {
            info!("Spawning vehicle `{}` with the fallback car.", vehicle.id);
            model.insert(VehicleModelRuntime::default());
            let model_entity = model.id();
            spawn_fallback_car(&mut commands, &mut meshes, &mut materials, model_entity);
        }
    }
}

fn spawn_fallback_car(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    model_entity: Entity,
) {
    let body_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.0, 0.0, 1.0),
        ..default()
    });
    let wheel_material = materials.add(StandardMaterial {
        base_color: Color::srgb(0.2, 0.2, 0.2),
        ..default()
    });
    let wheel_mesh = meshes.add(Cylinder::new(FALLBACK_WHEEL_RADIUS, FALLBACK_WHEEL_WIDTH));

    commands.spawn((
        Name::new("FallbackCarBody"),
        Mesh3d(meshes.add(Cuboid::from_size(FALLBACK_BODY_SIZE))),
        MeshMaterial3d(body_material),
        Transform::default(),
        ChildOf(model_entity),
    ));

    // Cylinders stand on +Y; roll them onto their side to act as wheels.
    let wheel_rotation = Quat::from_rotation_z(std::f32::consts::FRAC_PI_2);
    for (index, offset) in FALLBACK_WHEEL_OFFSETS.iter().enumerate() {
        commands.spawn((
            Name::new(format!("FallbackCarWheel{index}")),
            Mesh3d(wheel_mesh.clone()),
            MeshMaterial3d(wheel_material.clone()),
            Transform::from_translation(*offset).with_rotation(wheel_rotation),
            ChildOf(model_entity),
        ));
    }
}

pub(super) fn cleanup_vehicle_scene(
    mut commands: Commands,
    vehicle_query: Query<Entity, With<PlayerVehicle>>,
    mut input: ResMut<ControlInput>,
) {
    for entity in &vehicle_query {
        commands.entity(entity).try_despawn();
    }
    input.events.clear();
}
