//! Mock implementations of the collaborator traits for testing.
//!
//! Each mock is scripted up front and counts how it was called, so tests
//! can assert both on search results and on the calls that produced them.

use std::cell::Cell;
use std::time::Duration;

use basegrasp_core::clock::ManualClock;
use basegrasp_core::config::{DistributionOptions, GraspFilter};
use basegrasp_core::error::{CollaboratorError, JointError};
use basegrasp_core::traits::{
    BaseDistribution, BaseIter, GraspModel, GraspTargets, Manipulator, PlacementSampler,
    ReachabilityModel, Robot,
};
use basegrasp_core::types::{
    BaseSample, Bounds, GraspTarget, JointState, JointValues, ManipulatorId, RobotId, Transform,
};
use nalgebra::Isometry3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Robot id shared by all mocks unless overridden.
pub const MOCK_ROBOT: RobotId = RobotId(1);
/// Manipulator id shared by all mocks unless overridden.
pub const MOCK_MANIPULATOR: ManipulatorId = ManipulatorId(1);

type PoseFn<T> = Box<dyn Fn(&Transform) -> T>;

// ---------------------------------------------------------------------------
// MockRobot
// ---------------------------------------------------------------------------

/// A robot that is nothing but a pose and a joint vector.
#[derive(Debug, Clone, PartialEq)]
pub struct MockRobot {
    pub id: RobotId,
    pub pose: Transform,
    pub values: JointValues,
}

impl MockRobot {
    /// Robot at the origin with `dof` zeroed joints.
    pub fn new(dof: usize) -> Self {
        Self {
            id: MOCK_ROBOT,
            pose: Isometry3::identity(),
            values: JointValues::zeros(dof),
        }
    }

    #[must_use]
    pub fn with_pose(mut self, pose: Transform) -> Self {
        self.pose = pose;
        self
    }

    #[must_use]
    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = JointValues::new(values);
        self
    }
}

impl Robot for MockRobot {
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
// ScriptedManipulator
// ---------------------------------------------------------------------------

/// What a scripted IK query answers.
#[derive(Debug, Clone, PartialEq)]
pub enum IkScript {
    /// Solvable with and without environment checking.
    Solve(Vec<f64>),
    /// Fails with environment checking, solvable without it.
    Obstructed(Vec<f64>),
    /// Never solvable.
    Unreachable,
    /// The solver reports an error.
    Fail(String),
}

/// A manipulator whose collision and IK answers are scripted as functions
/// of the robot's base pose.
pub struct ScriptedManipulator {
    id: ManipulatorId,
    robot_id: RobotId,
    arm: Vec<usize>,
    gripper: Vec<usize>,
    collision: PoseFn<Result<bool, CollaboratorError>>,
    ik: PoseFn<IkScript>,
    clock: Option<(ManualClock, Duration)>,
    collision_checks: Cell<usize>,
    ik_calls: Cell<usize>,
    env_ik_calls: Cell<usize>,
}

impl ScriptedManipulator {
    /// Never in collision; IK always solves with zeros for every arm joint.
    pub fn new(arm: Vec<usize>, gripper: Vec<usize>) -> Self {
        let solution = vec![0.0; arm.len()];
        Self {
            id: MOCK_MANIPULATOR,
            robot_id: MOCK_ROBOT,
            arm,
            gripper,
            collision: Box::new(|_| Ok(false)),
            ik: Box::new(move |_| IkScript::Solve(solution.clone())),
            clock: None,
            collision_checks: Cell::new(0),
            ik_calls: Cell::new(0),
            env_ik_calls: Cell::new(0),
        }
    }

    #[must_use]
    pub fn with_ids(mut self, robot_id: RobotId, id: ManipulatorId) -> Self {
        self.robot_id = robot_id;
        self.id = id;
        self
    }

    /// Answer every IK query with `script`.
    #[must_use]
    pub fn with_ik(mut self, script: IkScript) -> Self {
        self.ik = Box::new(move |_| script.clone());
        self
    }

    /// Answer IK queries based on the base pose.
    #[must_use]
    pub fn with_ik_fn(mut self, f: impl Fn(&Transform) -> IkScript + 'static) -> Self {
        self.ik = Box::new(f);
        self
    }

    /// Report a collision whenever `f` returns true for the base pose.
    #[must_use]
    pub fn with_collision_fn(mut self, f: impl Fn(&Transform) -> bool + 'static) -> Self {
        self.collision = Box::new(move |pose| Ok(f(pose)));
        self
    }

    /// Make every collision check fail with a collaborator error.
    #[must_use]
    pub fn with_broken_collision_checker(mut self) -> Self {
        self.collision = Box::new(|_| Err(CollaboratorError::Collision("checker offline".into())));
        self
    }

    /// Advance `clock` by `per_call` on every IK query.
    #[must_use]
    pub fn with_clock(mut self, clock: ManualClock, per_call: Duration) -> Self {
        self.clock = Some((clock, per_call));
        self
    }

    pub fn collision_checks(&self) -> usize {
        self.collision_checks.get()
    }

    /// Total IK queries, with and without environment checking.
    pub fn ik_calls(&self) -> usize {
        self.ik_calls.get()
    }

    /// IK queries made with environment checking.
    pub fn env_ik_calls(&self) -> usize {
        self.env_ik_calls.get()
    }
}

impl<R: Robot> Manipulator<R> for ScriptedManipulator {
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
        self.collision_checks.set(self.collision_checks.get() + 1);
        (self.collision)(&robot.transform())
    }

    fn find_ik_solution(
        &self,
        robot: &R,
        _target: &Transform,
        check_environment: bool,
    ) -> Result<Option<Vec<f64>>, CollaboratorError> {
        self.ik_calls.set(self.ik_calls.get() + 1);
        if check_environment {
            self.env_ik_calls.set(self.env_ik_calls.get() + 1);
        }
        if let Some((clock, per_call)) = &self.clock {
            clock.advance(*per_call);
        }
        match (self.ik)(&robot.transform()) {
            IkScript::Solve(q) => Ok(Some(q)),
            IkScript::Obstructed(q) => Ok((!check_environment).then_some(q)),
            IkScript::Unreachable => Ok(None),
            IkScript::Fail(message) => Err(CollaboratorError::InverseKinematics(message)),
        }
    }
}

// ---------------------------------------------------------------------------
// MockGraspModel
// ---------------------------------------------------------------------------

/// Grasp descriptor used by [`MockGraspModel`].
#[derive(Debug, Clone, PartialEq)]
pub struct MockGrasp {
    pub index: usize,
    pub target: Transform,
    pub preshape: Vec<f64>,
}

/// A fixed grasp catalog with targets spaced along world x.
pub struct MockGraspModel {
    robot_id: RobotId,
    manipulator_id: ManipulatorId,
    grasps: Vec<MockGrasp>,
    valid: Option<Vec<usize>>,
    unreachable: Vec<usize>,
}

impl MockGraspModel {
    /// `count` grasps; grasp `i` targets `(1 + 0.1 i, 0, 0.8)` with a
    /// one-joint preshape of `0.5`.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(count: usize) -> Self {
        let grasps = (0..count)
            .map(|index| MockGrasp {
                index,
                target: Isometry3::translation(1.0 + 0.1 * index as f64, 0.0, 0.8),
                preshape: vec![0.5],
            })
            .collect();
        Self {
            robot_id: MOCK_ROBOT,
            manipulator_id: MOCK_MANIPULATOR,
            grasps,
            valid: None,
            unreachable: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_ids(mut self, robot_id: RobotId, manipulator_id: ManipulatorId) -> Self {
        self.robot_id = robot_id;
        self.manipulator_id = manipulator_id;
        self
    }

    /// Only enumerate these indices, in this order.
    #[must_use]
    pub fn with_valid(mut self, indices: Vec<usize>) -> Self {
        self.valid = Some(indices);
        self
    }

    /// Grasps dropped when the filter asks for an IK check.
    #[must_use]
    pub fn with_unreachable(mut self, indices: Vec<usize>) -> Self {
        self.unreachable = indices;
        self
    }

    pub fn grasps(&self) -> &[MockGrasp] {
        &self.grasps
    }
}

impl GraspModel for MockGraspModel {
    type Grasp = MockGrasp;

    fn robot_id(&self) -> RobotId {
        self.robot_id
    }

    fn manipulator_id(&self) -> ManipulatorId {
        self.manipulator_id
    }

    fn grasp_count(&self) -> usize {
        self.grasps.len()
    }

    fn grasp(&self, index: usize) -> Option<&MockGrasp> {
        self.grasps.get(index)
    }

    fn valid_grasp_indices<'a>(
        &'a self,
        filter: &GraspFilter,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        let indices: Box<dyn Iterator<Item = usize> + 'a> = match &self.valid {
            Some(valid) => Box::new(valid.iter().copied()),
            None => Box::new(0..self.grasps.len()),
        };
        if filter.check_ik {
            Box::new(indices.filter(move |i| !self.unreachable.contains(i)))
        } else {
            indices
        }
    }

    fn global_grasp_transform(&self, grasp: &MockGrasp, _collision_free: bool) -> Transform {
        grasp.target
    }

    fn preshape(&self, grasp: &MockGrasp) -> Vec<f64> {
        grasp.preshape.clone()
    }
}

// ---------------------------------------------------------------------------
// ListSampler
// ---------------------------------------------------------------------------

/// Sampler replaying a fixed list of candidates.
#[derive(Debug, Clone)]
pub struct ListSampler {
    samples: Vec<BaseSample>,
    cursor: usize,
    cycle: bool,
    batches: usize,
}

impl ListSampler {
    /// Replay `samples` once, then return empty batches.
    pub const fn finite(samples: Vec<BaseSample>) -> Self {
        Self {
            samples,
            cursor: 0,
            cycle: false,
            batches: 0,
        }
    }

    /// Replay `samples` forever.
    pub const fn cycling(samples: Vec<BaseSample>) -> Self {
        Self {
            samples,
            cursor: 0,
            cycle: true,
            batches: 0,
        }
    }

    /// Number of `sample` calls so far.
    pub const fn batches(&self) -> usize {
        self.batches
    }
}

impl PlacementSampler for ListSampler {
    fn sample(&mut self, count: usize) -> Result<Vec<BaseSample>, CollaboratorError> {
        self.batches += 1;
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            if self.cursor >= self.samples.len() {
                if self.cycle && !self.samples.is_empty() {
                    self.cursor = 0;
                } else {
                    break;
                }
            }
            out.push(self.samples[self.cursor].clone());
            self.cursor += 1;
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// MockReachability
// ---------------------------------------------------------------------------

/// Reachability model with a constant density and fixed bounds.
///
/// Every grasp target yields `placements_per_target` base poses standing
/// behind the target along world -x.
pub struct MockReachability {
    robot_id: RobotId,
    manipulator_id: ManipulatorId,
    density: f64,
    bounds: Bounds,
    placements_per_target: usize,
    joint_state: JointState,
    seed: u64,
    distribution_calls: Cell<usize>,
}

impl MockReachability {
    pub fn new(density: f64, bounds: Bounds) -> Self {
        Self {
            robot_id: MOCK_ROBOT,
            manipulator_id: MOCK_MANIPULATOR,
            density,
            bounds,
            placements_per_target: 2,
            joint_state: JointState::partial(Vec::new(), Vec::new()),
            seed: 0,
            distribution_calls: Cell::new(0),
        }
    }

    /// Unit density over the unit square.
    pub fn unit() -> Self {
        Self::new(1.0, unit_bounds())
    }

    #[must_use]
    pub fn with_ids(mut self, robot_id: RobotId, manipulator_id: ManipulatorId) -> Self {
        self.robot_id = robot_id;
        self.manipulator_id = manipulator_id;
        self
    }

    #[must_use]
    pub const fn with_placements_per_target(mut self, count: usize) -> Self {
        self.placements_per_target = count;
        self
    }

    /// Joint state attached to every generated candidate.
    #[must_use]
    pub fn with_joint_state(mut self, state: JointState) -> Self {
        self.joint_state = state;
        self
    }

    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn distribution_calls(&self) -> usize {
        self.distribution_calls.get()
    }

    fn sample_at(&self, target: &GraspTarget, standoff: f64) -> BaseSample {
        let t = target.transform.translation;
        BaseSample {
            pose: Isometry3::translation(t.x - standoff, t.y, 0.0),
            grasp: target.grasp,
            joint_state: self.joint_state.clone(),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn ordered_standoff(k: usize) -> f64 {
    0.5 + 0.1 * k as f64
}

/// `[(0, 0), (1, 1)]`.
pub fn unit_bounds() -> Bounds {
    Bounds::new(vec![0.0, 0.0], vec![1.0, 1.0]).expect("unit bounds are well formed")
}

impl ReachabilityModel for MockReachability {
    fn robot_id(&self) -> RobotId {
        self.robot_id
    }

    fn manipulator_id(&self) -> ManipulatorId {
        self.manipulator_id
    }

    fn base_distribution<'a>(
        &'a self,
        targets: GraspTargets<'a>,
        _options: &DistributionOptions,
    ) -> Result<BaseDistribution<'a>, CollaboratorError> {
        self.distribution_calls.set(self.distribution_calls.get() + 1);
        let samples = targets
            .flat_map(|target| {
                (0..self.placements_per_target)
                    .map(move |k| self.sample_at(&target, ordered_standoff(k)))
            })
            .collect();
        let density = self.density;
        Ok(BaseDistribution {
            density: Box::new(move |_: &Transform| density),
            sampler: Box::new(ListSampler::cycling(samples)),
            bounds: self.bounds.clone(),
        })
    }

    fn sample_base_iter<'a>(
        &'a self,
        targets: GraspTargets<'a>,
        _options: &DistributionOptions,
    ) -> BaseIter<'a> {
        Box::new(targets.flat_map(move |target| {
            (0..self.placements_per_target)
                .map(move |k| self.sample_at(&target, ordered_standoff(k)))
        }))
    }

    fn random_base_iter<'a>(
        &'a self,
        targets: GraspTargets<'a>,
        _options: &DistributionOptions,
    ) -> BaseIter<'a> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        Box::new(targets.flat_map(move |target| {
            let standoffs: Vec<f64> = (0..self.placements_per_target)
                .map(|_| rng.gen_range(0.3..0.7))
                .collect();
            standoffs
                .into_iter()
                .map(move |d| self.sample_at(&target, d))
        }))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
