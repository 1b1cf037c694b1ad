use std::process::ExitCode;

use bevy::log::LogPlugin;
use bevy::prelude::*;

use tabletop_rearrange::rearrange::plugin::{
    ActiveWorkspace, GenerateInstance, InstanceFailed, RearrangeSettings, ReloadInstance,
};
use tabletop_rearrange::{load_scenario, InstanceFile, RearrangementPlugin};

const DEFAULT_SCENARIO: &str = "assets/scenario.ron";

/// `tabletop_rearrange [scenario.ron] [--reload instance.ron]`
fn main() -> ExitCode {
    let mut scenario_path = DEFAULT_SCENARIO.to_string();
    let mut reload_path: Option<String> = None;
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--reload" => reload_path = args.next(),
            _ => scenario_path = arg,
        }
    }

    // Logging first so loader errors are reported through it.
    let mut app = App::new();
    app.add_plugins(LogPlugin::default());

    let scenario = match load_scenario(&scenario_path) {
        Ok(s) => s,
        Err(e) => {
            error!("failed to load scenario '{}': {}", scenario_path, e);
            return ExitCode::FAILURE;
        }
    };
    let output = scenario.output.clone();
    let num_objects = scenario.num_objects;

    app.insert_resource(RearrangeSettings { scenario })
        .add_plugins(RearrangementPlugin);

    match reload_path {
        Some(path) => match InstanceFile::load(&path) {
            Ok(file) => {
                info!("reloading instance from '{}'", path);
                app.world_mut().send_event(ReloadInstance(file));
            }
            Err(e) => {
                error!("failed to read instance file '{}': {}", path, e);
                return ExitCode::FAILURE;
            }
        },
        None => {
            app.world_mut().send_event(GenerateInstance { num_objects });
        }
    }

    app.update();

    let world = app.world();
    let failures = world.resource::<Events<InstanceFailed>>();
    let mut cursor = failures.get_cursor();
    let mut failed = false;
    for ev in cursor.read(failures) {
        error!("instance request failed: {}", ev.reason);
        failed = true;
    }
    let Some(active) = world.get_resource::<ActiveWorkspace>() else {
        return ExitCode::FAILURE;
    };
    if failed {
        return ExitCode::FAILURE;
    }

    for o in active.0.objects() {
        info!(
            "object {}: start {:?} (slot {:?}) -> goal slot {} at {:?}",
            o.index, o.current_position, o.current_slot_index, o.goal_slot_index, o.goal_position
        );
    }

    if let Some(path) = output {
        if let Err(e) = InstanceFile::from_workspace(&active.0).save(&path) {
            error!("failed to write instance file '{}': {}", path, e);
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
