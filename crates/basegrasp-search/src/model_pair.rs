//! Pairing of a reachability model with the grasp model it was built for.

use std::fmt::Debug;

use basegrasp_core::error::PlacementError;
use basegrasp_core::traits::{GraspModel, Manipulator, ReachabilityModel};
use basegrasp_core::types::{PairId, RobotId};

/// A reachability model, a grasp model and the manipulator both refer to.
///
/// All three must belong to the same robot and the same manipulator; see
/// [`ModelPair::check_consistency`].
pub struct ModelPair<'a, R, G> {
    pub reachability: &'a dyn ReachabilityModel,
    pub grasps: &'a dyn GraspModel<Grasp = G>,
    pub manipulator: &'a dyn Manipulator<R>,
}

impl<'a, R, G: Clone + Debug> ModelPair<'a, R, G> {
    pub fn new(
        reachability: &'a dyn ReachabilityModel,
        grasps: &'a dyn GraspModel<Grasp = G>,
        manipulator: &'a dyn Manipulator<R>,
    ) -> Self {
        Self {
            reachability,
            grasps,
            manipulator,
        }
    }

    /// Verify every member refers to `robot` and to the same manipulator.
    pub fn check_consistency(&self, robot: RobotId, id: PairId) -> Result<(), PlacementError> {
        let inconsistent = |reason: String| PlacementError::InconsistentModelPair { pair: id, reason };

        let members = [
            ("reachability model", self.reachability.robot_id()),
            ("grasp model", self.grasps.robot_id()),
            ("manipulator", self.manipulator.robot_id()),
        ];
        for (member, member_robot) in members {
            if member_robot != robot {
                return Err(inconsistent(format!(
                    "{member} belongs to robot {} but the planner drives robot {}",
                    member_robot.0, robot.0
                )));
            }
        }

        let manip = self.manipulator.id();
        if self.reachability.manipulator_id() != manip {
            return Err(inconsistent(format!(
                "reachability model was built for manipulator {} but the pair uses {}",
                self.reachability.manipulator_id().0,
                manip.0
            )));
        }
        if self.grasps.manipulator_id() != manip {
            return Err(inconsistent(format!(
                "grasp model was built for manipulator {} but the pair uses {}",
                self.grasps.manipulator_id().0,
                manip.0
            )));
        }
        Ok(())
    }
}

impl<R, G> Clone for ModelPair<'_, R, G> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R, G> Copy for ModelPair<'_, R, G> {}

/// Check every pair against `robot`. An empty list is an error.
pub fn check_pairs<R, G: Clone + Debug>(robot: RobotId, pairs: &[ModelPair<'_, R, G>]) -> Result<(), PlacementError> {
    if pairs.is_empty() {
        return Err(PlacementError::EmptyModelSet);
    }
    pairs
        .iter()
        .enumerate()
        .try_for_each(|(i, pair)| pair.check_consistency(robot, PairId(i)))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use basegrasp_core::types::ManipulatorId;
    use basegrasp_test_utils::{
        MOCK_MANIPULATOR, MOCK_ROBOT, MockGrasp, MockGraspModel, MockReachability, MockRobot,
        ScriptedManipulator,
    };

    #[test]
    fn consistent_pair_passes() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(2);
        let manip = ScriptedManipulator::new(vec![0], vec![1]);
        let pair: ModelPair<'_, MockRobot, MockGrasp> = ModelPair::new(&reach, &grasps, &manip);
        pair.check_consistency(MOCK_ROBOT, PairId(0)).unwrap();
    }

    #[test]
    fn robot_mismatch_is_reported() {
        let reach = MockReachability::unit().with_ids(RobotId(9), MOCK_MANIPULATOR);
        let grasps = MockGraspModel::new(2);
        let manip = ScriptedManipulator::new(vec![0], vec![1]);
        let pair: ModelPair<'_, MockRobot, MockGrasp> = ModelPair::new(&reach, &grasps, &manip);
        let err = pair.check_consistency(MOCK_ROBOT, PairId(3)).unwrap_err();
        assert!(matches!(
            err,
            PlacementError::InconsistentModelPair { pair: PairId(3), ref reason }
                if reason.contains("reachability model")
        ));
    }

    #[test]
    fn manipulator_mismatch_is_reported() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(2).with_ids(MOCK_ROBOT, ManipulatorId(7));
        let manip = ScriptedManipulator::new(vec![0], vec![1]);
        let pair: ModelPair<'_, MockRobot, MockGrasp> = ModelPair::new(&reach, &grasps, &manip);
        let err = pair.check_consistency(MOCK_ROBOT, PairId(0)).unwrap_err();
        assert!(err.to_string().contains("grasp model was built for manipulator 7"));
    }

    #[test]
    fn empty_pair_list_is_rejected() {
        let pairs: Vec<ModelPair<'_, MockRobot, MockGrasp>> = Vec::new();
        assert!(matches!(
            check_pairs(MOCK_ROBOT, &pairs),
            Err(PlacementError::EmptyModelSet)
        ));
    }
}
