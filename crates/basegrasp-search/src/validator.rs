//! Collision pre-check and IK validation of a single candidate.

use std::fmt::Debug;

use basegrasp_core::error::CollaboratorError;
use basegrasp_core::traits::Robot;
use basegrasp_core::types::{BaseSample, JointState, SolutionRecord};

use crate::model_pair::ModelPair;

/// Why a kinematically plausible candidate produced no solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoftReason {
    /// No IK solution even without environment checking. Counted as a
    /// numeric failure.
    Unreachable,
    /// Reachable, but every solution collides with the environment.
    Obstructed,
    /// IK with environment checking failed and no backup attempt was made.
    Unclassified,
}

/// Why a candidate was discarded outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardReason {
    /// The base pose puts independent links in collision.
    Collision,
    /// The candidate refers to an unknown pair or grasp, or its joint
    /// state does not fit the robot.
    InvalidCandidate,
    /// A collaborator reported an error while checking this candidate.
    Collaborator(CollaboratorError),
}

/// Result of validating one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<G> {
    Accepted(SolutionRecord<G>),
    SoftReject(SoftReason),
    HardReject(HardReason),
}

impl<G> Outcome<G> {
    pub const fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// Whether this outcome counts toward the numeric failure total.
    pub const fn counts_as_failure(&self) -> bool {
        matches!(self, Self::SoftReject(SoftReason::Unreachable))
    }
}

/// Checks candidates against the collision and IK collaborators of the
/// model pair each candidate belongs to.
pub struct CandidateValidator<'p, 'a, R, G> {
    pairs: &'p [ModelPair<'a, R, G>],
}

impl<'p, 'a, R: Robot, G: Clone + Debug> CandidateValidator<'p, 'a, R, G> {
    pub const fn new(pairs: &'p [ModelPair<'a, R, G>]) -> Self {
        Self { pairs }
    }

    /// Validate `candidate` on `robot`.
    ///
    /// Leaves the robot in the candidate's state; the caller owns restoring
    /// it. With `classify_failures`, a failed IK solve is retried without
    /// environment checking to separate unreachable from obstructed poses.
    pub fn validate(
        &self,
        robot: &mut R,
        candidate: &BaseSample,
        classify_failures: bool,
    ) -> Outcome<G> {
        let Some(pair) = self.pairs.get(candidate.grasp.pair.0) else {
            return Outcome::HardReject(HardReason::InvalidCandidate);
        };
        let Some(grasp) = pair.grasps.grasp(candidate.grasp.index) else {
            return Outcome::HardReject(HardReason::InvalidCandidate);
        };
        let manip = pair.manipulator;

        robot.set_transform(&candidate.pose);
        if robot.set_joint_values(&candidate.joint_state).is_err() {
            return Outcome::HardReject(HardReason::InvalidCandidate);
        }

        match manip.check_independent_collision(robot) {
            Ok(false) => {}
            Ok(true) => return Outcome::HardReject(HardReason::Collision),
            Err(err) => return Outcome::HardReject(HardReason::Collaborator(err)),
        }

        let preshape = JointState::partial(
            pair.grasps.preshape(grasp),
            manip.gripper_joints().to_vec(),
        );
        if robot.set_joint_values(&preshape).is_err() {
            return Outcome::HardReject(HardReason::InvalidCandidate);
        }

        let target = pair.grasps.global_grasp_transform(grasp, true);
        match manip.find_ik_solution(robot, &target, true) {
            Ok(Some(q)) => {
                let mut values = robot.joint_values();
                if values.overlay(manip.arm_joints(), &q).is_err() {
                    return Outcome::HardReject(HardReason::InvalidCandidate);
                }
                Outcome::Accepted(SolutionRecord {
                    pose: candidate.pose,
                    values,
                    grasp: grasp.clone(),
                    grasp_id: candidate.grasp,
                })
            }
            Ok(None) if !classify_failures => Outcome::SoftReject(SoftReason::Unclassified),
            Ok(None) => match manip.find_ik_solution(robot, &target, false) {
                Ok(Some(_)) => Outcome::SoftReject(SoftReason::Obstructed),
                Ok(None) => Outcome::SoftReject(SoftReason::Unreachable),
                Err(err) => Outcome::HardReject(HardReason::Collaborator(err)),
            },
            Err(err) => Outcome::HardReject(HardReason::Collaborator(err)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
