// src/rearrange/lattice.rs
//! Candidate slot lattice over the constrained area, and nearest-slot lookup.
//!
//! Slots are stored column-major: `index = x_i * n_y + y_j`.

use bevy::log::debug;
use bevy::math::{DVec2, DVec3};
use serde::{Deserialize, Serialize};

use super::core::{PlacementConfig, WorkspaceBounds};
use super::error::PlacementError;

/// Absorbs float noise when the usable span is an exact multiple of the pitch.
const LATTICE_EPSILON: f64 = 1e-9;

/// Coordinate tolerance when comparing stored lattice data with a live lattice.
pub const COORD_TOLERANCE: f64 = 1e-9;

#[derive(Clone, Debug)]
pub struct CandidateLattice {
    slots: Vec<DVec3>,
    n_x: usize,
    n_y: usize,
    pitch: DVec2,
    /// XY of slot 0.
    origin: DVec2,
}

impl CandidateLattice {
    /// Discretize `bounds` minus clearances into a regular lattice of slots.
    pub fn build(bounds: &WorkspaceBounds, config: &PlacementConfig) -> Result<Self, PlacementError> {
        bounds.validate()?;
        config.validate()?;

        let r = config.cylinder_radius;
        let usable_x = bounds.span_x() - config.near_edge_margin_x - config.side_clearance_x - 2.0 * r;
        let usable_y = bounds.span_y() - 2.0 * config.side_clearance_y - 2.0 * r;

        let n_x = slot_count(usable_x, config.discretization_x);
        let n_y = slot_count(usable_y, config.discretization_y);
        if n_x < 1 || n_y < 1 {
            return Err(PlacementError::invalid_config(format!(
                "workspace leaves no room for a single slot (usable span {usable_x:.4} x {usable_y:.4}, radius {r})"
            )));
        }
        let (n_x, n_y) = (n_x as usize, n_y as usize);

        let origin = DVec2::new(
            bounds.x_limit.0 + config.near_edge_margin_x + r,
            bounds.y_limit.0 + config.side_clearance_y + r,
        );
        let pitch = DVec2::new(config.discretization_x, config.discretization_y);
        let z = bounds.z_level + config.cylinder_height / 2.0;

        let mut slots = Vec::with_capacity(n_x * n_y);
        for x_i in 0..n_x {
            for y_j in 0..n_y {
                slots.push(DVec3::new(
                    origin.x + pitch.x * x_i as f64,
                    origin.y + pitch.y * y_j as f64,
                    z,
                ));
            }
        }

        debug!("lattice: {} x {} slots, pitch {:?}, origin {:?}", n_x, n_y, pitch, origin);
        Ok(Self { slots, n_x, n_y, pitch, origin })
    }

    #[inline]
    pub fn dims(&self) -> (usize, usize) { (self.n_x, self.n_y) }
    #[inline]
    pub fn len(&self) -> usize { self.slots.len() }
    #[inline]
    pub fn is_empty(&self) -> bool { self.slots.is_empty() }
    #[inline]
    pub fn pitch(&self) -> DVec2 { self.pitch }
    #[inline]
    pub fn origin(&self) -> DVec2 { self.origin }

    /// Every candidate position, in index order.
    pub fn slots(&self) -> &[DVec3] { &self.slots }

    pub fn slot(&self, index: usize) -> Option<DVec3> { self.slots.get(index).copied() }

    #[inline]
    pub fn index_of(&self, x_i: usize, y_j: usize) -> usize { x_i * self.n_y + y_j }

    /// `(x_i, y_j)` of a slot index.
    #[inline]
    pub fn cell_of(&self, index: usize) -> (usize, usize) { (index / self.n_y, index % self.n_y) }

    /// Index of the slot closest to `pos`.
    ///
    /// Only the containing cell and its +1 neighbours are considered, so this is
    /// O(1). Equal distances resolve to the lowest index.
    pub fn nearest_slot(&self, pos: DVec2) -> usize {
        let xb = bucket(pos.x, self.origin.x, self.pitch.x, self.n_x);
        let yb = bucket(pos.y, self.origin.y, self.pitch.y, self.n_y);
        let xs = neighbours(xb, self.n_x);
        let ys = neighbours(yb, self.n_y);

        let mut best = self.index_of(xb, yb);
        let mut best_d = f64::INFINITY;
        for &x_i in xs.iter().flatten() {
            for &y_j in ys.iter().flatten() {
                let idx = self.index_of(x_i, y_j);
                let d = self.slots[idx].truncate().distance(pos);
                if d < best_d {
                    best_d = d;
                    best = idx;
                }
            }
        }
        best
    }

    pub fn fingerprint(&self) -> LatticeFingerprint {
        LatticeFingerprint {
            n_x: self.n_x,
            n_y: self.n_y,
            discretization: (self.pitch.x, self.pitch.y),
            origin: (self.origin.x, self.origin.y),
        }
    }
}

fn slot_count(usable: f64, pitch: f64) -> i64 {
    (usable / pitch + LATTICE_EPSILON).floor() as i64 + 1
}

#[inline]
fn bucket(p: f64, origin: f64, pitch: f64, n: usize) -> usize {
    let raw = ((p - origin) / pitch).floor();
    (raw.max(0.0) as usize).min(n - 1)
}

/// `{b, b+1}` without stepping past the last cell.
#[inline]
fn neighbours(b: usize, n: usize) -> [Option<usize>; 2] {
    [Some(b), (b + 1 < n).then_some(b + 1)]
}

/// Parameters that must match for stored slot indices to stay meaningful.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatticeFingerprint {
    pub n_x: usize,
    pub n_y: usize,
    pub discretization: (f64, f64),
    pub origin: (f64, f64),
}

impl LatticeFingerprint {
    /// Describe the first difference, if any. Float fields compare with a small tolerance.
    pub fn mismatch(&self, other: &LatticeFingerprint) -> Option<String> {
        if (self.n_x, self.n_y) != (other.n_x, other.n_y) {
            return Some(format!(
                "lattice is {}x{}, stored instance expects {}x{}",
                self.n_x, self.n_y, other.n_x, other.n_y
            ));
        }
        let close = |a: (f64, f64), b: (f64, f64)| {
            (a.0 - b.0).abs() <= COORD_TOLERANCE && (a.1 - b.1).abs() <= COORD_TOLERANCE
        };
        if !close(self.discretization, other.discretization) {
            return Some(format!(
                "discretization {:?} differs from stored {:?}",
                self.discretization, other.discretization
            ));
        }
        if !close(self.origin, other.origin) {
            return Some(format!("origin {:?} differs from stored {:?}", self.origin, other.origin));
        }
        None
    }
}
