// src/rearrange/io.rs
//! Instance files: one fixed record per object plus the lattice fingerprint,
//! stored as RON.

use std::path::Path;

use bevy::log::info;
use bevy::math::DVec3;
use serde::{Deserialize, Serialize};

use super::core::{BodyHandle, Rgba};
use super::instance::{ObjectRecord, RearrangementWorkspace};
use super::lattice::LatticeFingerprint;

/// Object record as written to disk. Positions are `(x, y, z)` in meters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredObject {
    pub index: usize,
    pub current_position: (f64, f64, f64),
    #[serde(default)]
    pub current_slot_index: Option<usize>,
    pub goal_position: (f64, f64, f64),
    pub goal_slot_index: usize,
    pub is_at_goal: bool,
    pub radius: f64,
    pub height: f64,
    pub color: Rgba,
}

impl StoredObject {
    pub fn from_record(o: &ObjectRecord) -> Self {
        Self {
            index: o.index,
            current_position: o.current_position.into(),
            current_slot_index: o.current_slot_index,
            goal_position: o.goal_position.into(),
            goal_slot_index: o.goal_slot_index,
            is_at_goal: o.is_at_goal,
            radius: o.radius,
            height: o.height,
            color: o.color,
        }
    }

    pub fn current_position(&self) -> DVec3 {
        self.current_position.into()
    }

    pub fn goal_position(&self) -> DVec3 {
        self.goal_position.into()
    }

    /// Live record for this object, bound to a freshly created `body`.
    pub fn to_record(&self, body: BodyHandle) -> ObjectRecord {
        ObjectRecord {
            index: self.index,
            current_position: self.current_position(),
            current_slot_index: self.current_slot_index,
            goal_position: self.goal_position(),
            goal_slot_index: self.goal_slot_index,
            is_at_goal: self.is_at_goal,
            radius: self.radius,
            height: self.height,
            color: self.color,
            body,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InstanceFile {
    pub lattice: LatticeFingerprint,
    pub objects: Vec<StoredObject>,
}

impl InstanceFile {
    /// Snapshot of the workspace's current instance (empty when none is live).
    pub fn from_workspace(ws: &RearrangementWorkspace) -> Self {
        Self {
            lattice: ws.fingerprint(),
            objects: ws.objects().iter().map(StoredObject::from_record).collect(),
        }
    }

    pub fn to_ron_string(&self) -> Result<String, InstanceIoError> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| InstanceIoError::Ron(e.to_string()))
    }

    pub fn from_ron_str(s: &str) -> Result<Self, InstanceIoError> {
        ron::de::from_str(s).map_err(|e| InstanceIoError::Ron(e.to_string()))
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), InstanceIoError> {
        let path = path.as_ref();
        std::fs::write(path, self.to_ron_string()?)?;
        info!("instance file: wrote {} objects to {}", self.objects.len(), path.display());
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, InstanceIoError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_ron_str(&text)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InstanceIoError {
    #[error("I/O while accessing instance file: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error in instance file: {0}")]
    Ron(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rearrange::core::{PlacementConfig, WorkspaceBounds};
    use crate::rearrange::error::PlacementError;
    use crate::rearrange::instance::InstanceState;
    use crate::rearrange::sampler::placement_rng;
    use crate::rearrange::scene::testing::ScriptedScene;

    fn scenario() -> RearrangementWorkspace {
        let bounds = WorkspaceBounds::new((0.8, 1.3), (-0.6, 0.6), 0.73).expect("bounds");
        RearrangementWorkspace::new(bounds, PlacementConfig::default()).expect("workspace")
    }

    fn generated(seed: u64, n: usize) -> (RearrangementWorkspace, ScriptedScene) {
        let mut ws = scenario();
        let mut scene = ScriptedScene::default();
        let mut rng = placement_rng(Some(seed));
        ws.generate(&mut scene, n, &mut rng).expect("generate");
        (ws, scene)
    }

    fn without_bodies(objects: &[ObjectRecord]) -> Vec<StoredObject> {
        objects.iter().map(StoredObject::from_record).collect()
    }

    #[test]
    fn reload_reproduces_the_instance() {
        let (ws, _scene) = generated(17, 5);
        let text = InstanceFile::from_workspace(&ws).to_ron_string().expect("serialize");
        let file = InstanceFile::from_ron_str(&text).expect("parse");

        let mut copy = scenario();
        let mut scene = ScriptedScene::default();
        copy.reload(&mut scene, &file.lattice, &file.objects).expect("reload");

        assert_eq!(copy.state(), InstanceState::Ready);
        assert_eq!(scene.live_bodies(), 5);
        assert_eq!(without_bodies(copy.objects()), without_bodies(ws.objects()));
    }

    #[test]
    fn reload_replaces_a_live_instance() {
        let (source, _) = generated(1, 2);
        let file = InstanceFile::from_workspace(&source);

        let (mut ws, mut scene) = generated(2, 4);
        ws.reload(&mut scene, &file.lattice, &file.objects).expect("reload");
        assert_eq!(scene.live_bodies(), 2);
        assert_eq!(ws.objects().len(), 2);
    }

    #[test]
    fn reload_rejects_a_different_lattice() {
        let (source, _) = generated(3, 2);
        let mut file = InstanceFile::from_workspace(&source);
        file.lattice.n_y = 7;

        let mut ws = scenario();
        let mut scene = ScriptedScene::default();
        let err = ws.reload(&mut scene, &file.lattice, &file.objects).unwrap_err();
        assert!(matches!(err, PlacementError::LatticeMismatch { .. }));
        assert_eq!(scene.created, 0);
        assert_eq!(ws.state(), InstanceState::Empty);
    }

    #[test]
    fn reload_rejects_bad_records_before_creating_bodies() {
        let (source, _) = generated(4, 3);
        let file = InstanceFile::from_workspace(&source);
        let mut ws = scenario();
        let mut scene = ScriptedScene::default();

        let mut gap = file.objects.clone();
        gap.remove(1);
        let err = ws.reload(&mut scene, &file.lattice, &gap).unwrap_err();
        assert!(matches!(err, PlacementError::InvalidRecord { .. }));

        let mut out_of_range = file.objects.clone();
        out_of_range[2].goal_slot_index = 70;
        let err = ws.reload(&mut scene, &file.lattice, &out_of_range).unwrap_err();
        assert!(matches!(err, PlacementError::InvalidRecord { .. }));

        assert_eq!(scene.created, 0);
    }

    #[test]
    fn reload_rejects_a_shared_goal_slot() {
        let (source, _) = generated(12, 3);
        let mut file = InstanceFile::from_workspace(&source);
        file.objects[1].goal_slot_index = file.objects[0].goal_slot_index;
        file.objects[1].goal_position = file.objects[0].goal_position;

        let mut ws = scenario();
        let mut scene = ScriptedScene::default();
        let err = ws.reload(&mut scene, &file.lattice, &file.objects).unwrap_err();
        assert!(matches!(err, PlacementError::InvalidRecord { .. }));
        assert_eq!(scene.created, 0);
        assert_eq!(ws.state(), InstanceState::Empty);
    }

    #[test]
    fn reload_rejects_a_goal_off_its_slot() {
        let (source, _) = generated(13, 3);
        let mut file = InstanceFile::from_workspace(&source);
        file.objects[2].goal_position = (9.0, 9.0, 9.0);

        let mut ws = scenario();
        let mut scene = ScriptedScene::default();
        let err = ws.reload(&mut scene, &file.lattice, &file.objects).unwrap_err();
        assert!(matches!(err, PlacementError::InvalidRecord { .. }));
        assert_eq!(scene.created, 0);

        // Float noise well inside the tolerance is accepted.
        let mut nudged = InstanceFile::from_workspace(&source);
        nudged.objects[2].goal_position.0 += 1e-12;
        ws.reload(&mut scene, &nudged.lattice, &nudged.objects).expect("reload");
        assert_eq!(scene.live_bodies(), 3);
    }

    #[test]
    fn failed_reload_keeps_previous_instance() {
        let (source, _) = generated(5, 3);
        let file = InstanceFile::from_workspace(&source);

        let (mut ws, mut scene) = generated(6, 2);
        let before = ws.objects().to_vec();
        scene.fail_create_at = Some(scene.created + 1);

        let err = ws.reload(&mut scene, &file.lattice, &file.objects).unwrap_err();
        assert!(matches!(err, PlacementError::Scene(_)));
        assert_eq!(ws.state(), InstanceState::Ready);
        assert_eq!(ws.objects(), &before[..]);
        assert_eq!(scene.live_bodies(), 2);
    }

    #[test]
    fn missing_current_slot_defaults_to_none() {
        let text = r#"(
            lattice: (n_x: 1, n_y: 1, discretization: (0.08, 0.08), origin: (0.0, 0.0)),
            objects: [(
                index: 0,
                current_position: (0.5, 0.5, 0.05),
                goal_position: (0.0, 0.0, 0.05),
                goal_slot_index: 0,
                is_at_goal: false,
                radius: 0.03,
                height: 0.1,
                color: (r: 0.1, g: 0.2, b: 0.3, a: 1.0),
            )],
        )"#;
        let file = InstanceFile::from_ron_str(text).expect("parse");
        assert_eq!(file.objects[0].current_slot_index, None);
        assert_eq!(file.objects[0].current_position(), DVec3::new(0.5, 0.5, 0.05));
    }

    #[test]
    fn save_and_load_through_a_file() {
        let (ws, _) = generated(11, 3);
        let file = InstanceFile::from_workspace(&ws);
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("instance.ron");

        file.save(&path).expect("save");
        assert_eq!(InstanceFile::load(&path).expect("load"), file);

        let err = InstanceFile::load(dir.path().join("missing.ron")).unwrap_err();
        assert!(matches!(err, InstanceIoError::Io(_)));
    }

    #[test]
    fn garbage_is_a_ron_error() {
        let err = InstanceFile::from_ron_str("(lattice: 3)").unwrap_err();
        assert!(matches!(err, InstanceIoError::Ron(_)));
    }
}
