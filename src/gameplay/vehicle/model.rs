use super::*;

/// Polls spawned vehicle models until every mesh underneath them is loaded,
/// then announces them once.
pub(super) fn detect_vehicle_visual_ready(
    meshes: Res<Assets<Mesh>>,
    mut model_query: Query<(Entity, &mut VehicleModelRuntime), With<VehicleModel>>,
    children_query: Query<&Children>,
    mesh_query: Query<&Mesh3d>,
    mut ready_events: MessageWriter<VehicleVisualReady>,
) {
    for (model_entity, mut runtime) in &mut model_query {
        if runtime.visual_ready {
            continue;
        }

        let mut descendants = Vec::new();
        collect_descendants(model_entity, &children_query, &mut descendants);
        let mesh_handles: Vec<&Mesh3d> = descendants
            .iter()
            .filter_map(|entity| mesh_query.get(*entity).ok())
            .collect();

        if mesh_handles.is_empty() {
            if !runtime.waiting_logged {
                debug!(
                    "Waiting for vehicle model `{}` to spawn its meshes.",
                    runtime.model_id.as_deref().unwrap_or("fallback")
                );
                runtime.waiting_logged = true;
            }
            continue;
        }
        if mesh_handles.iter().any(|mesh| meshes.get(&mesh.0).is_none()) {
            continue;
        }

        runtime.visual_ready = true;
        info!(
            "Vehicle model `{}` ready with {} meshes.",
            runtime.model_id.as_deref().unwrap_or("fallback"),
            mesh_handles.len()
        );
        ready_events.write(VehicleVisualReady {
            model_root: model_entity,
        });
    }
}

/// Measures the rest-pose bounds of a ready model and stores the ground
/// offset on the owning vehicle. Runs once per readiness message.
pub(super) fn calibrate_vehicle_ground(
    mut ready_events: MessageReader<VehicleVisualReady>,
    meshes: Res<Assets<Mesh>>,
    children_query: Query<&Children>,
    mesh_query: Query<&Mesh3d>,
    node_query: Query<(&Transform, Option<&ChildOf>)>,
    model_parent_query: Query<&ChildOf, With<VehicleModel>>,
    mut vehicle_query: Query<&mut VehicleState, With<PlayerVehicle>>,
) {
    for event in ready_events.read() {
        let model_root = event.model_root;
        let Ok((model_transform, _)) = node_query.get(model_root) else {
            warn!("Vehicle visual ready for {model_root:?}, but the model node is gone.");
            continue;
        };
        let model_transform = *model_transform;

        let mut descendants = Vec::new();
        collect_descendants(model_root, &children_query, &mut descendants);

        let bounds = descendants
            .iter()
            .filter_map(|entity| {
                let mesh = meshes.get(&mesh_query.get(*entity).ok()?.0)?;
                let local = mesh_local_bounds(mesh)?;
                let relative = transform_relative_to(*entity, model_root, &node_query)?;
                Some(local.transformed(&(model_transform * relative)))
            })
            .reduce(VisualBounds::union);

        let Ok(vehicle_entity) = model_parent_query.get(model_root).map(ChildOf::parent) else {
            warn!("Vehicle model {model_root:?} has no parent vehicle to calibrate.");
            continue;
        };
        let Ok(mut state) = vehicle_query.get_mut(vehicle_entity) else {
            warn!("Vehicle model {model_root:?} is not attached to the player vehicle.");
            continue;
        };

        match calibrate(bounds) {
            Ok(ground_offset) => {
                state.ground_offset = Some(ground_offset);
                if let Some(bounds) = bounds {
                    let size = bounds.size();
                    info!(
                        "Calibrated vehicle ground offset {ground_offset:.3} (model {:.2} x {:.2} x {:.2}); rest height {:.3}.",
                        size.x,
                        size.y,
                        size.z,
                        state.rendered_height()
                    );
                }
            }
            Err(error) => {
                warn!("Vehicle ground calibration failed, model stays at its configured height: {error}");
            }
        }
    }
}

pub(super) fn request_vehicle_model_dump_hotkey(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut state: ResMut<VehicleModelDebugState>,
) {
    if keyboard.just_pressed(KeyCode::KeyN) {
        state.dump_requested = true;
    }
}

/// Logs the spawned model hierarchy with per-mesh bounds.
pub(super) fn dump_vehicle_model_structure(
    mut state: ResMut<VehicleModelDebugState>,
    meshes: Res<Assets<Mesh>>,
    model_query: Query<(Entity, &VehicleModelRuntime), With<VehicleModel>>,
    children_query: Query<&Children>,
    node_query: Query<(Option<&Name>, Option<&Mesh3d>)>,
) {
    if !state.dump_requested {
        return;
    }
    state.dump_requested = false;

    let Some((model_entity, runtime)) = model_query.iter().next() else {
        info!("No vehicle model to dump.");
        return;
    };

    let mut descendants = Vec::new();
    collect_descendants(model_entity, &children_query, &mut descendants);
    info!(
        "Vehicle model `{}`: {} nodes, ready: {}.",
        runtime.model_id.as_deref().unwrap_or("fallback"),
        descendants.len(),
        runtime.visual_ready
    );

    for entity in descendants {
        let Ok((name, mesh)) = node_query.get(entity) else {
            continue;
        };
        let name = name.map(Name::as_str).unwrap_or("<unnamed>");
        match mesh.and_then(|mesh| meshes.get(&mesh.0)).and_then(mesh_local_bounds) {
            Some(bounds) => info!(
                "  {name} {entity:?}: mesh bounds min {:?} max {:?}",
                bounds.min, bounds.max
            ),
            None => info!("  {name} {entity:?}"),
        }
    }
}

#[derive(Resource, Debug, Clone, Default)]
pub(super) struct VehicleModelDebugState {
    dump_requested: bool,
}
