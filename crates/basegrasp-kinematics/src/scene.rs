//! Reference tabletop scene: one mobile arm, some column obstacles and
//! upright objects to pick.

use basegrasp_core::error::ConfigError;
use basegrasp_core::types::{ManipulatorId, PlanarPose, RobotId};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

use crate::chain::KinematicChain;
use crate::grasps::{GraspCatalog, GraspScreen};
use crate::reachability::{RingParams, RingReachabilityModel};
use crate::robot::{ArmGeometry, ArmManipulator, MobileArm};
use crate::solver::{DlsConfig, DlsSolver};
use crate::world::{Disc, PlanarWorld};

pub const SCENE_ROBOT: RobotId = RobotId(0);
pub const SCENE_MANIPULATOR: ManipulatorId = ManipulatorId(0);

/// Placement of an object to grasp.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub yaw: f64,
}

/// Scene description, loadable from TOML.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub objects: Vec<ObjectSpec>,
    pub obstacles: Vec<Disc>,
    pub grasps_per_object: usize,
    /// Height of the shoulder and of every object's grasp point.
    pub mount_height: f64,
    pub links: Vec<f64>,
    pub base_radius: f64,
    pub link_radius: f64,
    pub ring: RingParams,
    pub solver: DlsConfig,
    /// Seed of the reachability model's random placements.
    pub seed: u64,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            objects: vec![
                ObjectSpec { x: 2.0, y: 0.0, yaw: 0.0 },
                ObjectSpec { x: 2.0, y: 1.5, yaw: 0.0 },
            ],
            obstacles: vec![Disc::new(2.65, 0.0, 0.2), Disc::new(2.0, 0.75, 0.15), Disc::new(1.3, 1.5, 0.1)],
            grasps_per_object: 8,
            mount_height: 0.8,
            links: vec![0.5, 0.4],
            base_radius: 0.3,
            link_radius: 0.04,
            ring: RingParams::default(),
            solver: DlsConfig::default(),
            seed: 0,
        }
    }
}

impl SceneConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.objects.is_empty() {
            return Err(invalid("objects", "at least one object is required"));
        }
        if self.grasps_per_object == 0 {
            return Err(invalid("grasps_per_object", "must be >= 1"));
        }
        if self.links.is_empty() || self.links.iter().any(|l| !l.is_finite() || *l <= 0.0) {
            return Err(invalid("links", "need at least one positive link length"));
        }
        if self.obstacles.iter().any(|o| o.radius < 0.0) {
            return Err(invalid("obstacles", "radius must be >= 0"));
        }
        if !(0.0 <= self.ring.inner && self.ring.inner < self.ring.outer) {
            return Err(invalid("ring", "need 0 <= inner < outer"));
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.into(),
        message: message.into(),
    }
}

/// Every collaborator of the reference scene.
///
/// The robot's DOFs are the arm joints followed by one gripper joint.
#[derive(Debug, Clone)]
pub struct TabletopScene {
    pub robot: MobileArm,
    pub manipulator: ArmManipulator,
    pub reachability: RingReachabilityModel,
    /// One catalog per object, in configuration order.
    pub catalogs: Vec<GraspCatalog>,
}

impl TabletopScene {
    pub fn build(config: &SceneConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let dof = config.links.len();
        let limits = vec![(-2.6, 2.6); dof];
        let chain = KinematicChain::planar(config.mount_height, &config.links, &limits);

        let manipulator = ArmManipulator::new(
            SCENE_MANIPULATOR,
            SCENE_ROBOT,
            chain,
            (0..dof).collect(),
            vec![dof],
            PlanarWorld::new(config.obstacles.clone()),
        )
        .with_solver(DlsSolver::new(config.solver))
        .with_geometry(ArmGeometry {
            base_radius: config.base_radius,
            link_radius: config.link_radius,
        });

        // The robot starts at the origin; the reach pre-check is relative to that.
        let screen = GraspScreen {
            world: manipulator.world().clone(),
            gripper_radius: config.link_radius,
            shoulder: Point3::new(0.0, 0.0, config.mount_height),
            reach: config.links.iter().sum(),
        };
        let catalogs = config
            .objects
            .iter()
            .map(|o| {
                let pose = PlanarPose::new(o.x, o.y, o.yaw).to_transform(config.mount_height);
                GraspCatalog::around(SCENE_ROBOT, SCENE_MANIPULATOR, pose, config.grasps_per_object)
                    .with_screen(screen.clone())
            })
            .collect();

        Ok(Self {
            robot: MobileArm::new(SCENE_ROBOT, dof + 1),
            manipulator,
            reachability: RingReachabilityModel::new(SCENE_ROBOT, SCENE_MANIPULATOR, config.ring)
                .with_seed(config.seed),
            catalogs,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use basegrasp_core::config::GraspFilter;
    use basegrasp_core::traits::{GraspModel, Manipulator, ReachabilityModel, Robot};

    #[test]
    fn default_scene_is_consistent() {
        let scene = TabletopScene::build(&SceneConfig::default()).unwrap();
        assert_eq!(scene.robot.joint_values().len(), 3);
        assert_eq!(Manipulator::<MobileArm>::arm_joints(&scene.manipulator), &[0, 1]);
        assert_eq!(Manipulator::<MobileArm>::gripper_joints(&scene.manipulator), &[2]);
        assert_eq!(scene.catalogs.len(), 2);
        for catalog in &scene.catalogs {
            assert_eq!(catalog.grasp_count(), 8);
            assert_eq!(catalog.robot_id(), scene.reachability.robot_id());
            assert_eq!(catalog.manipulator_id(), scene.reachability.manipulator_id());
        }
    }

    #[test]
    fn catalogs_screen_against_scene() {
        let scene = TabletopScene::build(&SceneConfig::default()).unwrap();
        let catalog = &scene.catalogs[0];
        let all = GraspFilter::default();
        assert_eq!(catalog.valid_grasp_indices(&all).count(), 8);

        // Both objects stand 2 m out, beyond the 0.9 m arm at the origin.
        let reachable = GraspFilter { check_ik: true, ..all };
        assert_eq!(catalog.valid_grasp_indices(&reachable).count(), 0);

        // Backing off 0.5 m from the +x side runs into the post at x = 2.65.
        let long_backup = GraspFilter { backup_dist: 0.5, ..all };
        assert!(catalog.valid_grasp_indices(&long_backup).count() < 8);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = SceneConfig::from_toml_str(
            r"
            grasps_per_object = 4
            links = [0.6, 0.5]

            [[objects]]
            x = 1.0
            y = -1.0

            [[obstacles]]
            x = 0.0
            y = 0.0
            radius = 0.1
            ",
        )
        .unwrap();
        assert_eq!(config.objects, vec![ObjectSpec { x: 1.0, y: -1.0, yaw: 0.0 }]);
        assert_eq!(config.obstacles.len(), 1);
        assert_eq!(config.grasps_per_object, 4);
        assert!((config.mount_height - 0.8).abs() < 1e-12);
    }

    #[test]
    fn invalid_scenes_are_rejected() {
        let no_objects = SceneConfig {
            objects: Vec::new(),
            ..SceneConfig::default()
        };
        assert!(matches!(no_objects.validate(), Err(ConfigError::InvalidValue { .. })));

        assert!(matches!(
            SceneConfig::from_toml_str("links = []"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(SceneConfig::from_toml_str("links = 3"), Err(ConfigError::Toml(_))));
    }
}
