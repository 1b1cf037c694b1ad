pub mod core;
pub mod error;
pub mod lattice;
pub mod sampler;
pub mod goals;
pub mod scene;
pub mod instance;
pub mod io;
pub mod config;
pub mod plugin;

pub use config::{load_scenario, ScenarioConfig, WorkspaceSource};
pub use error::{PlacementError, SceneError};
pub use instance::{InstanceState, ObjectRecord, RearrangementWorkspace};
pub use io::{InstanceFile, StoredObject};
pub use plugin::RearrangementPlugin;
