// src/rearrange/plugin.rs
//! Rearrangement plugin wiring (glue).
//! - Settings (scenario) + placement rng + active workspace resources
//! - Request events (generate / reload / teardown) and outcome events
//! - One exclusive system that runs requests against the app `World`,
//!   which is itself the scene service

use bevy::prelude::*;
use rand_chacha::ChaCha8Rng;

use super::config::ScenarioConfig;
use super::error::PlacementError;
use super::instance::{InstanceState, RearrangementWorkspace};
use super::io::InstanceFile;
use super::sampler::placement_rng;

/// Scenario the workspace is built from at startup.
#[derive(Resource, Clone, Default)]
pub struct RearrangeSettings {
    pub scenario: ScenarioConfig,
}

/// Random stream shared by every generation request.
#[derive(Resource)]
pub struct PlacementRng(pub ChaCha8Rng);

#[derive(Resource)]
pub struct ActiveWorkspace(pub RearrangementWorkspace);

/// Generate a fresh instance. A live instance is torn down first.
#[derive(Event, Clone, Copy, Debug)]
pub struct GenerateInstance {
    pub num_objects: usize,
}

/// Rebuild a stored instance in place of the live one.
#[derive(Event, Clone, Debug)]
pub struct ReloadInstance(pub InstanceFile);

#[derive(Event, Clone, Copy, Debug)]
pub struct TeardownInstance;

#[derive(Event, Clone, Copy, Debug)]
pub struct InstanceReady {
    pub num_objects: usize,
}

#[derive(Event, Clone, Debug)]
pub struct InstanceFailed {
    pub reason: String,
}

pub struct RearrangementPlugin;
impl Plugin for RearrangementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<RearrangeSettings>()
            .add_event::<GenerateInstance>()
            .add_event::<ReloadInstance>()
            .add_event::<TeardownInstance>()
            .add_event::<InstanceReady>()
            .add_event::<InstanceFailed>()
            .add_systems(Startup, init_workspace_from_settings)
            .add_systems(Update, process_instance_requests);
    }
}

/// Startup: build the workspace + rng from `RearrangeSettings`.
fn init_workspace_from_settings(world: &mut World) {
    let scenario = world.resource::<RearrangeSettings>().scenario.clone();
    if !world.contains_resource::<PlacementRng>() {
        world.insert_resource(PlacementRng(placement_rng(scenario.seed)));
    }
    match scenario.build_workspace() {
        Ok(ws) => {
            let (n_x, n_y) = ws.lattice().dims();
            info!("Rearrange: workspace ready, lattice {}x{}, stride {:?}", n_x, n_y, ws.stride());
            world.insert_resource(ActiveWorkspace(ws));
        }
        Err(e) => {
            error!("Rearrange: cannot build workspace: {}", e);
        }
    }
}

/// Update: drain requests and run them in arrival order per kind
/// (teardown, reload, generate).
fn process_instance_requests(world: &mut World) {
    let teardowns = world.resource_mut::<Events<TeardownInstance>>().drain().count();
    let reloads: Vec<ReloadInstance> = world.resource_mut::<Events<ReloadInstance>>().drain().collect();
    let generates: Vec<GenerateInstance> = world.resource_mut::<Events<GenerateInstance>>().drain().collect();
    if teardowns == 0 && reloads.is_empty() && generates.is_empty() {
        return;
    }

    let Some(ActiveWorkspace(mut ws)) = world.remove_resource::<ActiveWorkspace>() else {
        warn!("Rearrange: requests received but no workspace is configured");
        world.send_event(InstanceFailed { reason: "no workspace configured".into() });
        return;
    };

    for _ in 0..teardowns {
        if let Err(e) = ws.teardown(world) {
            report(world, Err(e));
        }
    }

    for ReloadInstance(file) in reloads {
        let outcome = ws.reload(world, &file.lattice, &file.objects).map(|o| o.len());
        report(world, outcome);
    }

    if !generates.is_empty() {
        let mut rng = world
            .remove_resource::<PlacementRng>()
            .unwrap_or_else(|| PlacementRng(placement_rng(None)));
        for req in generates {
            if ws.state() == InstanceState::Ready {
                if let Err(e) = ws.teardown(world) {
                    report(world, Err(e));
                    continue;
                }
            }
            let outcome = ws.generate(world, req.num_objects, &mut rng.0).map(|o| o.len());
            report(world, outcome);
        }
        world.insert_resource(rng);
    }

    world.insert_resource(ActiveWorkspace(ws));
}

fn report(world: &mut World, outcome: Result<usize, PlacementError>) {
    match outcome {
        Ok(num_objects) => {
            world.send_event(InstanceReady { num_objects });
        }
        Err(e) => {
            warn!("Rearrange: request failed: {}", e);
            world.send_event(InstanceFailed { reason: e.to_string() });
        }
    }
}
