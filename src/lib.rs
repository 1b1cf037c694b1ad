//! Tabletop rearrangement instances: collision-free cylinder starts, a
//! candidate slot lattice and evenly spaced goal slots.

pub mod rearrange;

pub use rearrange::{
    load_scenario, InstanceFile, InstanceState, ObjectRecord, PlacementError, RearrangementPlugin,
    RearrangementWorkspace, ScenarioConfig, SceneError, StoredObject, WorkspaceSource,
};
