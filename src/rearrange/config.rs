// src/rearrange/config.rs
//! Scenario files (`*.ron`): where the workspace is, how to place, how many objects.

use std::path::Path;

use bevy::log::info;
use serde::{Deserialize, Serialize};

use super::core::{PlacementConfig, TableGeometry, WorkspaceBounds};
use super::error::PlacementError;
use super::instance::RearrangementWorkspace;

/// Either explicit limits or the table the limits are cut from.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum WorkspaceSource {
    Bounds(WorkspaceBounds),
    Table(TableGeometry),
}

impl WorkspaceSource {
    pub fn resolve(&self) -> Result<WorkspaceBounds, PlacementError> {
        match self {
            WorkspaceSource::Bounds(b) => {
                b.validate()?;
                Ok(*b)
            }
            WorkspaceSource::Table(t) => t.constrained_area(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub workspace: WorkspaceSource,
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default = "default_num_objects")]
    pub num_objects: usize,
    /// Absent means a fresh random stream every run.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Where the binary writes the generated instance.
    #[serde(default)]
    pub output: Option<String>,
}

fn default_num_objects() -> usize {
    3
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            workspace: WorkspaceSource::Bounds(WorkspaceBounds {
                x_limit: (0.8, 1.3),
                y_limit: (-0.6, 0.6),
                z_level: 0.73,
            }),
            placement: PlacementConfig::default(),
            num_objects: default_num_objects(),
            seed: None,
            output: None,
        }
    }
}

impl ScenarioConfig {
    pub fn from_ron_str(s: &str) -> Result<Self, ConfigLoadError> {
        let scenario: ScenarioConfig = ron::de::from_str(s).map_err(|e| ConfigLoadError::Ron(e.to_string()))?;
        scenario.validate()?;
        Ok(scenario)
    }

    /// Fresh workspace (lattice built, no instance) for this scenario.
    pub fn build_workspace(&self) -> Result<RearrangementWorkspace, PlacementError> {
        RearrangementWorkspace::new(self.workspace.resolve()?, self.placement)
    }

    /// Everything that can be checked without touching a scene, including
    /// goal capacity for `num_objects`.
    pub fn validate(&self) -> Result<(), PlacementError> {
        let ws = self.build_workspace()?;
        let capacity = ws.goal_assigner().capacity();
        if self.num_objects > capacity {
            return Err(PlacementError::InsufficientCapacity { requested: self.num_objects, capacity });
        }
        Ok(())
    }
}

pub fn load_scenario(path: impl AsRef<Path>) -> Result<ScenarioConfig, ConfigLoadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    let scenario = ScenarioConfig::from_ron_str(&text)?;
    info!("scenario loaded from {} ({} objects)", path.display(), scenario.num_objects);
    Ok(scenario)
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigLoadError {
    #[error("I/O while reading scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON parse error: {0}")]
    Ron(String),
    #[error("invalid scenario: {0}")]
    Invalid(#[from] PlacementError),
}
