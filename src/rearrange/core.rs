// src/rearrange/core.rs
//! Core types for tabletop instance generation.
//! Keep this file dependency-light; everything else in `rearrange` builds on it.

use bevy::math::{DVec2, DVec3};
use bevy::prelude::*; // Entity
use serde::{Deserialize, Serialize};

use super::error::PlacementError;

// ---------- Workspace ----------

/// Axis-aligned constrained area on the table plus the table-top height.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceBounds {
    pub x_limit: (f64, f64),
    pub y_limit: (f64, f64),
    /// Height of the table surface the objects stand on.
    pub z_level: f64,
}

impl WorkspaceBounds {
    pub fn new(x_limit: (f64, f64), y_limit: (f64, f64), z_level: f64) -> Result<Self, PlacementError> {
        let bounds = Self { x_limit, y_limit, z_level };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<(), PlacementError> {
        if !(self.x_limit.0 < self.x_limit.1) {
            return Err(PlacementError::invalid_config(format!(
                "x limit {:?} is empty or reversed",
                self.x_limit
            )));
        }
        if !(self.y_limit.0 < self.y_limit.1) {
            return Err(PlacementError::invalid_config(format!(
                "y limit {:?} is empty or reversed",
                self.y_limit
            )));
        }
        Ok(())
    }

    #[inline]
    pub fn span_x(&self) -> f64 { self.x_limit.1 - self.x_limit.0 }
    #[inline]
    pub fn span_y(&self) -> f64 { self.y_limit.1 - self.y_limit.0 }

    pub fn contains_xy(&self, p: DVec2) -> bool {
        p.x >= self.x_limit.0 && p.x <= self.x_limit.1 &&
        p.y >= self.y_limit.0 && p.y <= self.y_limit.1
    }
}

/// Table + flank walls the constrained area is cut from.
///
/// Side flanks stand on both y edges and the back flank on the far x edge,
/// so the near (robot-side) x edge keeps the full table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableGeometry {
    pub center_x: f64,
    pub center_y: f64,
    pub top_z: f64,
    pub length_x: f64,
    pub width_y: f64,
    pub flank_thickness: f64,
}

impl TableGeometry {
    pub fn constrained_area(&self) -> Result<WorkspaceBounds, PlacementError> {
        let hx = self.length_x / 2.0;
        let hy = self.width_y / 2.0;
        let t = self.flank_thickness;
        WorkspaceBounds::new(
            (self.center_x - hx, self.center_x + hx - t),
            (self.center_y - hy + t, self.center_y + hy - t),
            self.top_z,
        )
    }
}

// ---------- Placement parameters ----------

/// Immutable per run. Changing any field means rebuilding the lattice.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlacementConfig {
    pub cylinder_radius: f64,
    pub cylinder_height: f64,
    /// Lattice pitch (meters).
    pub discretization_x: f64,
    pub discretization_y: f64,
    /// Minimum goal-to-goal spacing; whole multiple of the pitch.
    pub object_interval_x: f64,
    pub object_interval_y: f64,
    pub side_clearance_x: f64,
    pub side_clearance_y: f64,
    /// Margin kept on the near x edge, which has no flank wall.
    #[serde(default = "default_near_edge_margin_x")]
    pub near_edge_margin_x: f64,
    /// Rejection-sampling retry budget per object.
    #[serde(default = "default_max_sample_attempts")]
    pub max_sample_attempts: u32,
}

fn default_near_edge_margin_x() -> f64 {
    0.05
}
fn default_max_sample_attempts() -> u32 {
    20
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            cylinder_radius: 0.03,
            cylinder_height: 0.1,
            discretization_x: 0.08,
            discretization_y: 0.08,
            object_interval_x: 0.16,
            object_interval_y: 0.16,
            side_clearance_x: 0.02,
            side_clearance_y: 0.02,
            near_edge_margin_x: default_near_edge_margin_x(),
            max_sample_attempts: default_max_sample_attempts(),
        }
    }
}

/// Tolerance when checking that an interval is a whole number of lattice cells.
const STRIDE_TOLERANCE: f64 = 1e-6;

impl PlacementConfig {
    /// Goal stride in lattice cells, `(stride_x, stride_y)`.
    pub fn stride(&self) -> Result<(usize, usize), PlacementError> {
        Ok((
            cell_stride("x", self.object_interval_x, self.discretization_x)?,
            cell_stride("y", self.object_interval_y, self.discretization_y)?,
        ))
    }

    /// Rejects non-physical values. Lattice dimensions are checked by the lattice builder.
    pub fn validate(&self) -> Result<(), PlacementError> {
        let positive = [
            ("cylinder_radius", self.cylinder_radius),
            ("cylinder_height", self.cylinder_height),
            ("discretization_x", self.discretization_x),
            ("discretization_y", self.discretization_y),
        ];
        for (name, v) in positive {
            if !(v > 0.0) || !v.is_finite() {
                return Err(PlacementError::invalid_config(format!("{name} must be > 0, got {v}")));
            }
        }
        let non_negative = [
            ("side_clearance_x", self.side_clearance_x),
            ("side_clearance_y", self.side_clearance_y),
            ("near_edge_margin_x", self.near_edge_margin_x),
        ];
        for (name, v) in non_negative {
            if !(v >= 0.0) || !v.is_finite() {
                return Err(PlacementError::invalid_config(format!("{name} must be >= 0, got {v}")));
            }
        }
        if self.max_sample_attempts == 0 {
            return Err(PlacementError::invalid_config("max_sample_attempts must be at least 1"));
        }
        self.stride().map(|_| ())
    }

    pub fn shape(&self, color: Rgba) -> ShapeDescriptor {
        ShapeDescriptor {
            kind: ShapeKind::Cylinder { radius: self.cylinder_radius, height: self.cylinder_height },
            color,
        }
    }
}

fn cell_stride(axis: &str, interval: f64, pitch: f64) -> Result<usize, PlacementError> {
    let ratio = interval / pitch;
    let whole = ratio.round();
    if !ratio.is_finite() || whole < 1.0 || (ratio - whole).abs() > STRIDE_TOLERANCE {
        return Err(PlacementError::invalid_config(format!(
            "object_interval_{axis} ({interval}) is not a positive whole multiple of discretization_{axis} ({pitch})"
        )));
    }
    Ok(whole as usize)
}

// ---------- Shapes, colours, handles ----------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Rgba {
    pub const fn new(r: f64, g: f64, b: f64, a: f64) -> Self { Self { r, g, b, a } }
}

/// Only vertical cylinders are generated today.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ShapeKind {
    Cylinder { radius: f64, height: f64 },
}

impl ShapeKind {
    /// Radius of the planar footprint.
    pub fn footprint_radius(&self) -> f64 {
        match *self {
            ShapeKind::Cylinder { radius, .. } => radius,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeDescriptor {
    pub kind: ShapeKind,
    pub color: Rgba,
}

/// Opaque reference to a body owned by the scene service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle(pub Entity);

/// Planar distance between two poses; z is ignored.
#[inline]
pub fn planar_distance(a: DVec3, b: DVec3) -> f64 {
    a.truncate().distance(b.truncate())
}
