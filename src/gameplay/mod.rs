pub mod track;
pub mod vehicle;

use bevy::prelude::*;
use track::TrackGameplayPlugin;
use vehicle::VehicleGameplayPlugin;

pub struct GameplayPlugin;

impl Plugin for GameplayPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(TrackGameplayPlugin)
            .add_plugins(VehicleGameplayPlugin);
    }
}
