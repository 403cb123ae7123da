//! Reference mobile manipulator: a holonomic base carrying a planar arm
//! with a one-joint gripper.

use basegrasp_core::error::{CollaboratorError, JointError};
use basegrasp_core::traits::{Manipulator, Robot};
use basegrasp_core::types::{JointState, JointValues, ManipulatorId, RobotId, Transform};
use nalgebra::{Isometry3, Point3, Vector2};
use tracing::debug;

use crate::chain::KinematicChain;
use crate::solver::{DlsSolver, IkTarget};
use crate::world::PlanarWorld;

// ---------------------------------------------------------------------------
// MobileArm
// ---------------------------------------------------------------------------

/// Kinematic state of a mobile manipulator: base pose and joint vector.
#[derive(Debug, Clone, PartialEq)]
pub struct MobileArm {
    id: RobotId,
    pose: Transform,
    values: JointValues,
}

impl MobileArm {
    /// Robot at the world origin with `dof` zeroed joints.
    pub fn new(id: RobotId, dof: usize) -> Self {
        Self {
            id,
            pose: Isometry3::identity(),
            values: JointValues::zeros(dof),
        }
    }

    #[must_use]
    pub const fn with_pose(mut self, pose: Transform) -> Self {
        self.pose = pose;
        self
    }

    pub const fn pose(&self) -> &Transform {
        &self.pose
    }

    pub const fn values(&self) -> &JointValues {
        &self.values
    }
}

impl Robot for MobileArm {
    fn id(&self) -> RobotId {
        self.id
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

// ---------------------------------------------------------------------------
// ArmManipulator
// ---------------------------------------------------------------------------

/// Collision footprint of the reference robot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmGeometry {
    /// Radius of the circular base footprint.
    pub base_radius: f64,
    /// Half-thickness of every arm link.
    pub link_radius: f64,
}

impl Default for ArmGeometry {
    fn default() -> Self {
        Self {
            base_radius: 0.3,
            link_radius: 0.04,
        }
    }
}

/// A planar arm on a mobile base, checked against a [`PlanarWorld`].
///
/// The base footprint is the manipulator-independent geometry; arm links
/// are only checked when IK runs with environment checking.
#[derive(Debug, Clone)]
pub struct ArmManipulator {
    id: ManipulatorId,
    robot_id: RobotId,
    chain: KinematicChain,
    solver: DlsSolver,
    arm: Vec<usize>,
    gripper: Vec<usize>,
    world: PlanarWorld,
    geometry: ArmGeometry,
    seeds: Vec<Vec<f64>>,
}

impl ArmManipulator {
    /// `arm[i]` is the robot DOF driving chain joint `i`.
    pub fn new(
        id: ManipulatorId,
        robot_id: RobotId,
        chain: KinematicChain,
        arm: Vec<usize>,
        gripper: Vec<usize>,
        world: PlanarWorld,
    ) -> Self {
        let seeds = elbow_seeds(chain.dof());
        Self {
            id,
            robot_id,
            chain,
            solver: DlsSolver::default(),
            arm,
            gripper,
            world,
            geometry: ArmGeometry::default(),
            seeds,
        }
    }

    #[must_use]
    pub const fn with_solver(mut self, solver: DlsSolver) -> Self {
        self.solver = solver;
        self
    }

    #[must_use]
    pub const fn with_geometry(mut self, geometry: ArmGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub const fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    pub const fn world(&self) -> &PlanarWorld {
        &self.world
    }

    pub const fn geometry(&self) -> &ArmGeometry {
        &self.geometry
    }

    /// Whether the base footprint at `base` hits an obstacle.
    pub fn base_collides(&self, base: &Transform) -> bool {
        let center = Vector2::new(base.translation.x, base.translation.y);
        self.world.disc_collides(&center, self.geometry.base_radius)
    }

    /// Whether the arm links at `q`, with the base at `base`, hit an obstacle.
    pub fn arm_collides(&self, base: &Transform, q: &[f64]) -> Result<bool, JointError> {
        let points: Vec<Vector2<f64>> = self
            .chain
            .link_points(q)?
            .into_iter()
            .map(|p| {
                let world = base * Point3::from(p);
                Vector2::new(world.x, world.y)
            })
            .collect();
        Ok(self.world.polyline_collides(&points, self.geometry.link_radius))
    }

    /// Full collision predicate for the robot's current state.
    pub fn in_collision<R: Robot + ?Sized>(&self, robot: &R) -> Result<bool, CollaboratorError> {
        let base = robot.transform();
        if self.base_collides(&base) {
            return Ok(true);
        }
        let q = robot.joint_values().select(&self.arm).map_err(collision_error)?;
        self.arm_collides(&base, &q).map_err(collision_error)
    }
}

impl<R: Robot + ?Sized> Manipulator<R> for ArmManipulator {
    fn id(&self) -> ManipulatorId {
        self.id
    }

    fn robot_id(&self) -> RobotId {
        self.robot_id
    }

    fn arm_joints(&self) -> &[usize] {
        &self.arm
    }

    fn gripper_joints(&self) -> &[usize] {
        &self.gripper
    }

    fn check_independent_collision(&self, robot: &R) -> Result<bool, CollaboratorError> {
        Ok(self.base_collides(&robot.transform()))
    }

    fn find_ik_solution(
        &self,
        robot: &R,
        target: &Transform,
        check_environment: bool,
    ) -> Result<Option<Vec<f64>>, CollaboratorError> {
        let base = robot.transform();
        let local = base.inverse_transform_point(&Point3::from(target.translation.vector));
        let ik_target = IkTarget::Position(local.coords);
        let current = robot.joint_values().select(&self.arm).map_err(ik_error)?;

        for seed in std::iter::once(&current).chain(&self.seeds) {
            let result = self.solver.solve(&self.chain, &ik_target, seed).map_err(ik_error)?;
            if !result.converged {
                continue;
            }
            if check_environment && self.arm_collides(&base, &result.joint_positions).map_err(ik_error)? {
                debug!(?seed, "IK solution collides with the environment");
                continue;
            }
            return Ok(Some(result.joint_positions));
        }
        Ok(None)
    }
}

/// Elbow-up and elbow-down starting configurations.
fn elbow_seeds(dof: usize) -> Vec<Vec<f64>> {
    [1.2, -1.2]
        .into_iter()
        .map(|bend| (0..dof).map(|i| if i == 0 { 0.0 } else { bend }).collect())
        .collect()
}

fn ik_error(err: JointError) -> CollaboratorError {
    CollaboratorError::InverseKinematics(err.to_string())
}

fn collision_error(err: JointError) -> CollaboratorError {
    CollaboratorError::Collision(err.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::Disc;
    use basegrasp_core::types::PlanarPose;

    const ROBOT: RobotId = RobotId(0);
    const MANIP: ManipulatorId = ManipulatorId(0);

    fn manipulator(world: PlanarWorld) -> ArmManipulator {
        let chain = KinematicChain::planar(0.8, &[0.5, 0.4], &[(-2.0, 2.0), (-2.6, 2.6)]);
        ArmManipulator::new(MANIP, ROBOT, chain, vec![0, 1], vec![2], world)
    }

    fn robot_at(x: f64, y: f64, heading: f64) -> MobileArm {
        MobileArm::new(ROBOT, 3).with_pose(PlanarPose::new(x, y, heading).to_transform(0.0))
    }

    #[test]
    fn robot_applies_partial_state() {
        let mut robot = MobileArm::new(ROBOT, 3);
        robot.set_joint_values(&JointState::partial(vec![0.7], vec![2])).unwrap();
        assert_eq!(robot.values().as_slice(), &[0.0, 0.0, 0.7]);
        assert!(robot.set_joint_values(&JointState::full(vec![1.0])).is_err());
    }

    #[test]
    fn base_collision_uses_footprint() {
        let manip = manipulator(PlanarWorld::new(vec![Disc::new(1.0, 0.0, 0.2)]));
        assert!(Manipulator::<MobileArm>::check_independent_collision(&manip, &robot_at(0.6, 0.0, 0.0)).unwrap());
        assert!(!Manipulator::<MobileArm>::check_independent_collision(&manip, &robot_at(0.0, 0.0, 0.0)).unwrap());
    }

    #[test]
    fn ik_reaches_target_in_world_frame() {
        let manip = manipulator(PlanarWorld::default());
        let robot = robot_at(1.0, 1.0, std::f64::consts::FRAC_PI_2);
        let target = Isometry3::translation(1.0, 1.6, 0.8);

        let q = manip.find_ik_solution(&robot, &target, true).unwrap().unwrap();
        let local = manip.chain().forward_kinematics(&q).unwrap();
        let reached = robot.transform() * local;
        assert!((reached.translation.vector - target.translation.vector).norm() < 1e-3);
    }

    #[test]
    fn out_of_reach_target_has_no_solution() {
        let manip = manipulator(PlanarWorld::default());
        let target = Isometry3::translation(2.0, 0.0, 0.8);
        assert_eq!(manip.find_ik_solution(&robot_at(0.0, 0.0, 0.0), &target, false).unwrap(), None);
    }

    #[test]
    fn obstacle_on_the_arm_path_is_obstructed() {
        // A post between the shoulder and the target.
        let manip = manipulator(PlanarWorld::new(vec![Disc::new(0.35, 0.0, 0.2)]));
        let robot = robot_at(0.0, 0.0, 0.0);
        let target = Isometry3::translation(0.7, 0.0, 0.8);

        assert!(manip.find_ik_solution(&robot, &target, false).unwrap().is_some());
        assert_eq!(manip.find_ik_solution(&robot, &target, true).unwrap(), None);
    }

    #[test]
    fn full_collision_predicate_checks_links() {
        let manip = manipulator(PlanarWorld::new(vec![Disc::new(0.0, 0.7, 0.1)]));
        let mut robot = robot_at(0.0, 0.0, 0.0);
        assert!(!manip.in_collision(&robot).unwrap());
        robot
            .set_joint_values(&JointState::partial(vec![std::f64::consts::FRAC_PI_2], vec![0]))
            .unwrap();
        assert!(manip.in_collision(&robot).unwrap());
    }
}
