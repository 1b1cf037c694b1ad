// src/rearrange/instance.rs
//! Instance assembly: object records and the generate / reload / teardown lifecycle.
//!
//! Generation is all-or-nothing. Either every object gets a start, a start slot
//! and a goal, or the call fails, every body it created is removed and the
//! workspace is back to `Empty`.

use std::collections::HashMap;

use bevy::log::{debug, info, warn};
use bevy::math::DVec3;
use rand::Rng;

use super::core::{BodyHandle, PlacementConfig, Rgba, ShapeDescriptor, ShapeKind, WorkspaceBounds};
use super::error::PlacementError;
use super::goals::GoalSlotAssigner;
use super::io::StoredObject;
use super::lattice::{CandidateLattice, LatticeFingerprint, COORD_TOLERANCE};
use super::sampler::{random_color, AcceptedSample, CollisionFreeSampler};
use super::scene::SceneService;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceState {
    Empty,
    Generating,
    Ready,
    Reloading,
    TornDown,
}

/// One rearrangement object. Owns the association with exactly one scene body.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectRecord {
    pub index: usize,
    pub current_position: DVec3,
    /// `None` while the object sits outside the workspace.
    pub current_slot_index: Option<usize>,
    pub goal_position: DVec3,
    pub goal_slot_index: usize,
    pub is_at_goal: bool,
    pub radius: f64,
    pub height: f64,
    pub color: Rgba,
    pub body: BodyHandle,
}

impl ObjectRecord {
    pub fn shape(&self) -> ShapeDescriptor {
        ShapeDescriptor {
            kind: ShapeKind::Cylinder { radius: self.radius, height: self.height },
            color: self.color,
        }
    }
}

/// The constrained area, its candidate lattice and the live instance (if any).
///
/// The workspace holds no reference to the scene, so dropping it while an
/// instance is live cannot remove the bodies. Call [`Self::teardown`] first;
/// a drop with live objects is logged.
pub struct RearrangementWorkspace {
    bounds: WorkspaceBounds,
    config: PlacementConfig,
    lattice: CandidateLattice,
    stride: (usize, usize),
    state: InstanceState,
    objects: Vec<ObjectRecord>,
}

impl RearrangementWorkspace {
    /// Validates the configuration and builds the lattice. No scene access.
    pub fn new(bounds: WorkspaceBounds, config: PlacementConfig) -> Result<Self, PlacementError> {
        let lattice = CandidateLattice::build(&bounds, &config)?;
        let stride = config.stride()?;
        Ok(Self { bounds, config, lattice, stride, state: InstanceState::Empty, objects: Vec::new() })
    }

    pub fn bounds(&self) -> &WorkspaceBounds { &self.bounds }
    pub fn config(&self) -> &PlacementConfig { &self.config }
    pub fn lattice(&self) -> &CandidateLattice { &self.lattice }
    pub fn stride(&self) -> (usize, usize) { self.stride }
    pub fn state(&self) -> InstanceState { self.state }
    pub fn objects(&self) -> &[ObjectRecord] { &self.objects }
    pub fn object(&self, index: usize) -> Option<&ObjectRecord> { self.objects.get(index) }

    pub fn goal_assigner(&self) -> GoalSlotAssigner {
        GoalSlotAssigner::for_lattice(&self.lattice, self.stride)
    }

    pub fn fingerprint(&self) -> LatticeFingerprint {
        self.lattice.fingerprint()
    }

    /// Swap geometry/parameters and rebuild the lattice from scratch.
    /// Only allowed while no instance is live; on error nothing changes.
    pub fn reconfigure(&mut self, bounds: WorkspaceBounds, config: PlacementConfig) -> Result<(), PlacementError> {
        self.require_idle("reconfigure")?;
        let lattice = CandidateLattice::build(&bounds, &config)?;
        let stride = config.stride()?;
        self.bounds = bounds;
        self.config = config;
        self.lattice = lattice;
        self.stride = stride;
        Ok(())
    }

    /// Generate `num_objects` collision-free starts and their goals.
    pub fn generate<S, R>(
        &mut self,
        scene: &mut S,
        num_objects: usize,
        rng: &mut R,
    ) -> Result<&[ObjectRecord], PlacementError>
    where
        S: SceneService + ?Sized,
        R: Rng,
    {
        self.require_idle("generate")?;

        // Pure arithmetic, so capacity fails before any body exists.
        let goals = self.goal_assigner().assign(num_objects)?;

        self.state = InstanceState::Generating;
        info!("instance: generating {} objects", num_objects);

        let mut bodies = Vec::with_capacity(num_objects);
        let starts = match sample_starts(&self.bounds, &self.config, scene, num_objects, rng, &mut bodies) {
            Ok(s) => s,
            Err(e) => {
                warn!("instance: generation failed ({}), removing {} bodies", e, bodies.len());
                rollback(scene, &bodies);
                self.state = InstanceState::Empty;
                return Err(e);
            }
        };

        let slots = self.lattice.slots();
        self.objects = starts
            .into_iter()
            .zip(goals)
            .enumerate()
            .map(|(index, ((sample, color), goal))| ObjectRecord {
                index,
                current_position: sample.position,
                current_slot_index: Some(self.lattice.nearest_slot(sample.position.truncate())),
                goal_position: slots[goal],
                goal_slot_index: goal,
                is_at_goal: false,
                radius: self.config.cylinder_radius,
                height: self.config.cylinder_height,
                color,
                body: sample.body,
            })
            .collect();

        self.state = InstanceState::Ready;
        info!("instance: ready with {} objects", self.objects.len());
        Ok(&self.objects)
    }

    /// Rebuild an instance from stored records, skipping sampling.
    ///
    /// Records are checked against the lattice in effect before the first
    /// body is created. A live instance is replaced only once every new body
    /// exists; on failure the previous instance is left as it was.
    pub fn reload<S>(
        &mut self,
        scene: &mut S,
        stored_lattice: &LatticeFingerprint,
        stored: &[StoredObject],
    ) -> Result<&[ObjectRecord], PlacementError>
    where
        S: SceneService + ?Sized,
    {
        let previous = self.state;
        if matches!(previous, InstanceState::Generating | InstanceState::Reloading) {
            return Err(PlacementError::InvalidState { operation: "reload", state: previous });
        }
        if let Some(reason) = self.lattice.fingerprint().mismatch(stored_lattice) {
            return Err(PlacementError::LatticeMismatch { reason });
        }
        self.validate_stored(stored)?;

        self.state = InstanceState::Reloading;
        info!("instance: reloading {} objects", stored.len());

        let mut created: Vec<ObjectRecord> = Vec::with_capacity(stored.len());
        for s in stored {
            let shape = ShapeDescriptor {
                kind: ShapeKind::Cylinder { radius: s.radius, height: s.height },
                color: s.color,
            };
            match scene.create_body(&shape, s.current_position()) {
                Ok(body) => created.push(s.to_record(body)),
                Err(e) => {
                    warn!("instance: reload failed at object {} ({})", s.index, e);
                    let bodies: Vec<BodyHandle> = created.iter().map(|o| o.body).collect();
                    rollback(scene, &bodies);
                    self.state = previous;
                    return Err(e.into());
                }
            }
        }

        let old = std::mem::replace(&mut self.objects, created);
        if !old.is_empty() {
            let bodies: Vec<BodyHandle> = old.iter().map(|o| o.body).collect();
            rollback(scene, &bodies);
        }
        self.state = InstanceState::Ready;
        info!("instance: reloaded {} objects", self.objects.len());
        Ok(&self.objects)
    }

    /// Move one object and refresh its slot and at-goal flag.
    pub fn move_object<S>(
        &mut self,
        scene: &mut S,
        index: usize,
        position: DVec3,
    ) -> Result<&ObjectRecord, PlacementError>
    where
        S: SceneService + ?Sized,
    {
        if self.state != InstanceState::Ready {
            return Err(PlacementError::InvalidState { operation: "move an object", state: self.state });
        }
        let slot = self
            .bounds
            .contains_xy(position.truncate())
            .then(|| self.lattice.nearest_slot(position.truncate()));
        let record = self.objects.get_mut(index).ok_or(PlacementError::UnknownObject(index))?;

        scene.move_body(record.body, position)?;
        record.current_position = position;
        record.current_slot_index = slot;
        record.is_at_goal = slot == Some(record.goal_slot_index);
        debug!("object {} moved to {:?} (slot {:?}, at goal: {})", index, position, slot, record.is_at_goal);
        Ok(record)
    }

    /// Remove every body of the live instance.
    ///
    /// All removals are attempted; the first failure is returned after the
    /// records are dropped.
    pub fn teardown<S>(&mut self, scene: &mut S) -> Result<(), PlacementError>
    where
        S: SceneService + ?Sized,
    {
        let mut first_err = None;
        for o in self.objects.drain(..) {
            if let Err(e) = scene.remove_body(o.body) {
                warn!("instance: could not remove body of object {}: {}", o.index, e);
                first_err.get_or_insert(e);
            }
        }
        self.state = InstanceState::TornDown;
        info!("instance: torn down");
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn require_idle(&self, operation: &'static str) -> Result<(), PlacementError> {
        match self.state {
            InstanceState::Empty | InstanceState::TornDown => Ok(()),
            state => Err(PlacementError::InvalidState { operation, state }),
        }
    }

    fn validate_stored(&self, stored: &[StoredObject]) -> Result<(), PlacementError> {
        let n_slots = self.lattice.len();
        let invalid = |reason: String| PlacementError::InvalidRecord { reason };
        // Goal slot -> object holding it.
        let mut goal_owner: HashMap<usize, usize> = HashMap::with_capacity(stored.len());
        for (i, s) in stored.iter().enumerate() {
            if s.index != i {
                return Err(invalid(format!("record {i} carries index {}, indices must be dense from 0", s.index)));
            }
            let Some(slot) = self.lattice.slot(s.goal_slot_index) else {
                return Err(invalid(format!("object {i}: goal slot {} out of {n_slots}", s.goal_slot_index)));
            };
            if let Some(first) = goal_owner.insert(s.goal_slot_index, i) {
                return Err(invalid(format!(
                    "objects {first} and {i} share goal slot {}",
                    s.goal_slot_index
                )));
            }
            let goal = s.goal_position();
            if (goal - slot).abs().max_element() > COORD_TOLERANCE {
                return Err(invalid(format!(
                    "object {i}: goal position {goal:?} is not slot {} at {slot:?}",
                    s.goal_slot_index
                )));
            }
            if let Some(slot) = s.current_slot_index.filter(|&slot| slot >= n_slots) {
                return Err(invalid(format!("object {i}: current slot {slot} out of {n_slots}")));
            }
            if !(s.radius > 0.0) || !(s.height > 0.0) {
                return Err(invalid(format!("object {i}: non-positive radius/height")));
            }
        }
        Ok(())
    }
}

impl Drop for RearrangementWorkspace {
    fn drop(&mut self) {
        if !self.objects.is_empty() {
            warn!(
                "instance: workspace dropped with {} live objects; their bodies stay in the scene",
                self.objects.len()
            );
        }
    }
}

fn sample_starts<S, R>(
    bounds: &WorkspaceBounds,
    config: &PlacementConfig,
    scene: &mut S,
    num_objects: usize,
    rng: &mut R,
    bodies: &mut Vec<BodyHandle>,
) -> Result<Vec<(AcceptedSample, Rgba)>, PlacementError>
where
    S: SceneService + ?Sized,
    R: Rng,
{
    let sampler = CollisionFreeSampler::new(bounds, config);
    let mut starts = Vec::with_capacity(num_objects);
    for object in 0..num_objects {
        let color = random_color(rng);
        let sample = sampler.sample(scene, bodies, color, rng, object)?;
        bodies.push(sample.body);
        starts.push((sample, color));
    }
    Ok(starts)
}

/// Remove bodies newest first. Failures are logged, not returned.
fn rollback<S: SceneService + ?Sized>(scene: &mut S, bodies: &[BodyHandle]) {
    for &body in bodies.iter().rev() {
        if let Err(e) = scene.remove_body(body) {
            warn!("rollback: could not remove {:?}: {}", body, e);
        }
    }
}
