// src/rearrange/scene.rs
//! Scene/geometry service boundary.
//!
//! The engine only creates, moves and removes bodies and asks the proximity
//! oracle whether a candidate is too close to a set of existing bodies. The
//! bevy `World` implements the service directly: a body is an entity carrying
//! [`SceneBody`], [`BodyPosition`] and [`BodyColor`].

use bevy::math::DVec3;
use bevy::prelude::*;

use super::core::{planar_distance, BodyHandle, Rgba, ShapeDescriptor, ShapeKind};
use super::error::SceneError;

pub trait SceneService {
    fn create_body(&mut self, shape: &ShapeDescriptor, position: DVec3) -> Result<BodyHandle, SceneError>;

    fn remove_body(&mut self, body: BodyHandle) -> Result<(), SceneError>;

    /// True when `candidate` is closer than `clearance` (surface to surface)
    /// to any body in `existing`. The candidate itself is ignored if listed.
    fn is_colliding(
        &self,
        candidate: BodyHandle,
        existing: &[BodyHandle],
        clearance: f64,
    ) -> Result<bool, SceneError>;

    fn move_body(&mut self, body: BodyHandle, position: DVec3) -> Result<(), SceneError>;
}

/// Collidable shape of a scene body.
#[derive(Component, Clone, Copy, Debug)]
pub struct SceneBody {
    pub kind: ShapeKind,
}

/// Centre of a scene body (world space).
#[derive(Component, Clone, Copy, Debug, Deref, DerefMut)]
pub struct BodyPosition(pub DVec3);

#[derive(Component, Clone, Copy, Debug)]
pub struct BodyColor(pub Rgba);

impl SceneService for World {
    fn create_body(&mut self, shape: &ShapeDescriptor, position: DVec3) -> Result<BodyHandle, SceneError> {
        let id = self
            .spawn((SceneBody { kind: shape.kind }, BodyPosition(position), BodyColor(shape.color)))
            .id();
        Ok(BodyHandle(id))
    }

    fn remove_body(&mut self, body: BodyHandle) -> Result<(), SceneError> {
        if self.get::<SceneBody>(body.0).is_none() {
            return Err(SceneError::UnknownBody(body));
        }
        self.despawn(body.0);
        Ok(())
    }

    fn is_colliding(
        &self,
        candidate: BodyHandle,
        existing: &[BodyHandle],
        clearance: f64,
    ) -> Result<bool, SceneError> {
        let (kind, pos) = body_footprint(self, candidate)?;
        for &other in existing {
            if other == candidate {
                continue;
            }
            let (other_kind, other_pos) = body_footprint(self, other)?;
            let gap = planar_distance(pos, other_pos) - kind.footprint_radius() - other_kind.footprint_radius();
            if gap < clearance {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn move_body(&mut self, body: BodyHandle, position: DVec3) -> Result<(), SceneError> {
        let mut pos = self
            .get_mut::<BodyPosition>(body.0)
            .ok_or(SceneError::UnknownBody(body))?;
        **pos = position;
        Ok(())
    }
}

fn body_footprint(world: &World, body: BodyHandle) -> Result<(ShapeKind, DVec3), SceneError> {
    let shape = world.get::<SceneBody>(body.0).ok_or(SceneError::UnknownBody(body))?;
    let pos = world.get::<BodyPosition>(body.0).ok_or(SceneError::UnknownBody(body))?;
    Ok((shape.kind, pos.0))
}

/// Number of scene bodies currently alive in `world`.
pub fn count_bodies(world: &mut World) -> usize {
    let mut q = world.query::<&SceneBody>();
    q.iter(world).count()
}


#[cfg(test)]
mod tests {
    use super::*;

    fn cylinder(radius: f64) -> ShapeDescriptor {
        ShapeDescriptor {
            kind: ShapeKind::Cylinder { radius, height: 0.1 },
            color: Rgba::new(0.5, 0.5, 0.5, 1.0),
        }
    }

    #[test]
    fn oracle_uses_surface_gap() {
        let mut world = World::new();
        let a = world.create_body(&cylinder(0.03), DVec3::new(0.0, 0.0, 0.0)).expect("a");
        // Surface gap 0.1 - 0.06 = 0.04.
        let b = world.create_body(&cylinder(0.03), DVec3::new(0.1, 0.0, 0.0)).expect("b");
        assert!(!world.is_colliding(b, &[a], 0.03).expect("query"));
        assert!(world.is_colliding(b, &[a], 0.05).expect("query"));
        // The candidate never collides with itself.
        assert!(!world.is_colliding(a, &[a], 1.0).expect("query"));
    }

    #[test]
    fn remove_and_move_reject_unknown_bodies() {
        let mut world = World::new();
        let a = world.create_body(&cylinder(0.03), DVec3::ZERO).expect("a");
        world.move_body(a, DVec3::new(1.0, 2.0, 3.0)).expect("move");
        assert_eq!(world.get::<BodyPosition>(a.0).expect("pos").0, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(count_bodies(&mut world), 1);

        world.remove_body(a).expect("remove");
        assert_eq!(count_bodies(&mut world), 0);
        assert_eq!(world.remove_body(a), Err(SceneError::UnknownBody(a)));
        assert_eq!(world.move_body(a, DVec3::ZERO), Err(SceneError::UnknownBody(a)));
    }
}
