// src/rearrange/error.rs
//! Error taxonomy for instance generation and the scene boundary.

use super::core::BodyHandle;
use super::instance::InstanceState;

/// Failures of the placement engine. Every variant leaves the scene without
/// bodies created by the failed call.
#[derive(thiserror::Error, Debug)]
pub enum PlacementError {
    #[error("invalid placement configuration: {reason}")]
    InvalidConfig { reason: String },
    #[error("object {object} found no collision-free position in {attempts} attempts")]
    SamplingExhausted { object: usize, attempts: u32 },
    #[error("{requested} objects requested but the goal lattice only holds {capacity} at this stride")]
    InsufficientCapacity { requested: usize, capacity: usize },
    #[error("cannot {operation} while the instance is {state:?}")]
    InvalidState { operation: &'static str, state: InstanceState },
    #[error("no object with index {0}")]
    UnknownObject(usize),
    #[error("stored instance does not match the lattice in effect: {reason}")]
    LatticeMismatch { reason: String },
    #[error("invalid stored object record: {reason}")]
    InvalidRecord { reason: String },
    #[error("scene service failure: {0}")]
    Scene(#[from] SceneError),
}

impl PlacementError {
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig { reason: reason.into() }
    }
}

/// Failures reported by a scene/geometry service implementation.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("unknown body {0:?}")]
    UnknownBody(BodyHandle),
    #[error("scene rejected the request: {0}")]
    Rejected(String),
}
