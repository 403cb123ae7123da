//! Collaborator interfaces consumed by the placement search.
//!
//! The collision engine, IK solver, grasp catalog and learned reachability
//! model all live outside this workspace. The search only talks to them
//! through the traits below, which are object-safe so a planner can mix
//! model pairs backed by different implementations.

use std::fmt::Debug;

use crate::config::{DistributionOptions, GraspFilter};
use crate::error::{CollaboratorError, JointError};
use crate::types::{
    BaseSample, Bounds, GraspTarget, JointState, JointValues, ManipulatorId, RobotId, Transform,
};

// ---------------------------------------------------------------------------
// Robot
// ---------------------------------------------------------------------------

/// Saved robot pose and joint values.
#[derive(Debug, Clone, PartialEq)]
pub struct RobotSnapshot {
    pub transform: Transform,
    pub values: JointValues,
}

/// The robot's live kinematic state.
///
/// Mutating methods take `&mut self`: whoever holds the mutable borrow has
/// exclusive state-mutation rights.
pub trait Robot {
    fn id(&self) -> RobotId;

    /// Current base transform in the world frame.
    fn transform(&self) -> Transform;

    fn set_transform(&mut self, pose: &Transform);

    /// Joint values for every DOF.
    fn joint_values(&self) -> JointValues;

    fn set_joint_values(&mut self, state: &JointState) -> Result<(), JointError>;

    /// Capture the observable state.
    fn save_state(&self) -> RobotSnapshot {
        RobotSnapshot {
            transform: self.transform(),
            values: self.joint_values(),
        }
    }

    /// Put the robot back into a previously captured state.
    fn restore_state(&mut self, snapshot: &RobotSnapshot) -> Result<(), JointError> {
        self.set_transform(&snapshot.transform);
        self.set_joint_values(&JointState::full(snapshot.values.as_slice().to_vec()))
    }
}

// ---------------------------------------------------------------------------
// Manipulator
// ---------------------------------------------------------------------------

/// Arm + end-effector of a robot, with collision and IK capabilities.
pub trait Manipulator<R: ?Sized> {
    fn id(&self) -> ManipulatorId;

    fn robot_id(&self) -> RobotId;

    /// DOF indices of the arm joints solved by IK.
    fn arm_joints(&self) -> &[usize];

    /// DOF indices of the gripper joints set by a grasp preshape.
    fn gripper_joints(&self) -> &[usize];

    /// Whether the links that move independently of the arm (base, torso,
    /// anything not carried by the arm) collide with the environment,
    /// ignoring grasped objects.
    fn check_independent_collision(&self, robot: &R) -> Result<bool, CollaboratorError>;

    /// Solve for arm joint values placing the end-effector at `target`.
    ///
    /// With `check_environment` the solution must also be free of
    /// environment collisions; without it only self-collision and joint
    /// limits apply. `Ok(None)` means no solution exists.
    fn find_ik_solution(
        &self,
        robot: &R,
        target: &Transform,
        check_environment: bool,
    ) -> Result<Option<Vec<f64>>, CollaboratorError>;
}

// ---------------------------------------------------------------------------
// GraspModel
// ---------------------------------------------------------------------------

/// Catalog of grasps for one target object and one manipulator.
pub trait GraspModel {
    /// Opaque grasp descriptor (preshape + approach parameters).
    type Grasp: Clone + Debug;

    fn robot_id(&self) -> RobotId;

    fn manipulator_id(&self) -> ManipulatorId;

    fn grasp_count(&self) -> usize;

    fn grasp(&self, index: usize) -> Option<&Self::Grasp>;

    /// Lazily enumerate indices of grasps passing `filter`, in catalog order.
    fn valid_grasp_indices<'a>(
        &'a self,
        _filter: &GraspFilter,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(0..self.grasp_count())
    }

    /// World-frame end-effector transform realising `grasp`.
    ///
    /// With `collision_free` the transform is backed off from the object
    /// so the approach pose does not touch it.
    fn global_grasp_transform(&self, grasp: &Self::Grasp, collision_free: bool) -> Transform;

    /// Gripper joint values to apply before solving IK for `grasp`.
    fn preshape(&self, grasp: &Self::Grasp) -> Vec<f64>;
}

// ---------------------------------------------------------------------------
// Reachability
// ---------------------------------------------------------------------------

/// Lazy stream of grasp end-effector targets.
pub type GraspTargets<'a> = Box<dyn Iterator<Item = GraspTarget> + 'a>;

/// Lazy stream of base placements. `None` means the source is exhausted.
pub type BaseIter<'a> = Box<dyn Iterator<Item = BaseSample> + 'a>;

/// Probability density over base placements.
pub trait PlacementDensity {
    fn density(&self, pose: &Transform) -> f64;
}

impl<F> PlacementDensity for F
where
    F: Fn(&Transform) -> f64,
{
    fn density(&self, pose: &Transform) -> f64 {
        self(pose)
    }
}

/// Draws batches of base placement candidates.
pub trait PlacementSampler {
    /// Draw up to `count` candidates. An empty batch means nothing is left.
    fn sample(&mut self, count: usize) -> Result<Vec<BaseSample>, CollaboratorError>;
}

/// Density, sampler and placement-space bounds computed for a set of grasps.
pub struct BaseDistribution<'a> {
    pub density: Box<dyn PlacementDensity + 'a>,
    pub sampler: Box<dyn PlacementSampler + 'a>,
    pub bounds: Bounds,
}

impl Debug for BaseDistribution<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaseDistribution")
            .field("bounds", &self.bounds)
            .finish_non_exhaustive()
    }
}

/// Learned inverse reachability model: where should the base stand so the
/// end-effector can reach a given target.
pub trait ReachabilityModel {
    fn robot_id(&self) -> RobotId;

    fn manipulator_id(&self) -> ManipulatorId;

    /// Aggregate the base distributions of every target into one density
    /// and sampler.
    fn base_distribution<'a>(
        &'a self,
        targets: GraspTargets<'a>,
        options: &DistributionOptions,
    ) -> Result<BaseDistribution<'a>, CollaboratorError>;

    /// Enumerate placements in order of decreasing likelihood.
    fn sample_base_iter<'a>(
        &'a self,
        targets: GraspTargets<'a>,
        options: &DistributionOptions,
    ) -> BaseIter<'a>;

    /// Enumerate placements by random draws from the distribution.
    fn random_base_iter<'a>(
        &'a self,
        targets: GraspTargets<'a>,
        options: &DistributionOptions,
    ) -> BaseIter<'a>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Isometry3;

    struct Stub {
        pose: Transform,
        values: JointValues,
    }

    impl Robot for Stub {
        fn id(&self) -> RobotId {
            RobotId(0)
        }

        fn transform(&self) -> Transform {
            self.pose
        }

        fn set_transform(&mut self, pose: &Transform) {
            self.pose = *pose;
        }

        fn joint_values(&self) -> JointValues {
            self.values.clone()
        }

        fn set_joint_values(&mut self, state: &JointState) -> Result<(), JointError> {
            state.apply_to(&mut self.values)
        }
    }

    #[test]
    fn default_snapshot_roundtrip() {
        let mut robot = Stub {
            pose: Isometry3::translation(1.0, 2.0, 0.0),
            values: JointValues::new(vec![0.1, 0.2]),
        };
        let snapshot = robot.save_state();

        robot.set_transform(&Isometry3::translation(5.0, 5.0, 0.0));
        robot
            .set_joint_values(&JointState::full(vec![1.0, 1.0]))
            .unwrap();
        robot.restore_state(&snapshot).unwrap();

        assert_eq!(robot.save_state(), snapshot);
    }

    #[test]
    fn closures_are_densities() {
        let density = |pose: &Transform| pose.translation.x * 2.0;
        let pose = Isometry3::translation(1.5, 0.0, 0.0);
        assert!((PlacementDensity::density(&density, &pose) - 3.0).abs() < f64::EPSILON);
    }
}
