//! Top-level placement search.
//!
//! [`PlacementPlanner`] owns the model pairs and configuration and exposes
//! the two search modes: a batch search collecting `N` goals under a global
//! timeout ([`PlacementPlanner::sample_goals`]) and a lazy stream of
//! validated placements under a give-up window
//! ([`PlacementPlanner::valid_placements`]).

use std::cell::Cell;
use std::fmt::Debug;
use std::time::Duration;

use basegrasp_core::clock::{Clock, MonotonicClock, Stopwatch};
use basegrasp_core::config::SearchConfig;
use basegrasp_core::error::PlacementError;
use basegrasp_core::seed::SeedHierarchy;
use basegrasp_core::traits::{PlacementSampler, Robot};
use basegrasp_core::types::{JointState, PairId, RobotId, SolutionRecord};
use tracing::{info, warn};

use crate::aggregate::{AggregateDistribution, CombineOptions, combine};
use crate::grasp_source::{GraspCandidateSource, GraspSourceOptions};
use crate::guard::StateGuard;
use crate::model_pair::{ModelPair, check_pairs};
use crate::stats::SearchStats;
use crate::stream::{LiveSource, SearchStream};
use crate::validator::{CandidateValidator, Outcome};

/// Goals collected by a batch search.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalBatch<G> {
    pub goals: Vec<SolutionRecord<G>>,
    /// Numeric failures: candidates that were unreachable even without
    /// environment checking.
    pub failures: u64,
    /// The sampler ran dry before `goals` reached the requested count.
    pub exhausted: bool,
    pub stats: SearchStats,
}

/// Searches for (base pose, configuration, grasp) combinations of one robot.
pub struct PlacementPlanner<'a, R, G> {
    robot: RobotId,
    pairs: Vec<ModelPair<'a, R, G>>,
    config: SearchConfig,
    seeds: SeedHierarchy,
    clock: Box<dyn Clock + 'a>,
    sessions: Cell<u64>,
}

impl<'a, R: Robot, G: Clone + Debug + 'a> PlacementPlanner<'a, R, G> {
    /// Validate `config` and every pair's consistency with `robot`.
    pub fn new(
        robot: RobotId,
        pairs: Vec<ModelPair<'a, R, G>>,
        config: SearchConfig,
    ) -> Result<Self, PlacementError> {
        config.validate()?;
        check_pairs(robot, &pairs)?;
        Ok(Self {
            robot,
            seeds: SeedHierarchy::new(config.seed),
            pairs,
            config,
            clock: Box::new(MonotonicClock::new()),
            sessions: Cell::new(0),
        })
    }

    /// Measure budgets with `clock` instead of the wall clock.
    #[must_use]
    pub fn with_clock(mut self, clock: impl Clock + 'a) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub const fn robot_id(&self) -> RobotId {
        self.robot
    }

    pub fn pairs(&self) -> &[ModelPair<'a, R, G>] {
        &self.pairs
    }

    pub const fn config(&self) -> &SearchConfig {
        &self.config
    }

    fn next_session(&self) -> u64 {
        let session = self.sessions.get();
        self.sessions.set(session + 1);
        session
    }

    /// Joint density, sampler and bounds over every pair's grasps.
    pub fn compute_grasp_distribution(&self) -> Result<AggregateDistribution<'a>, PlacementError> {
        combine(
            self.robot,
            &self.pairs,
            CombineOptions {
                config: &self.config,
                session: self.next_session(),
            },
        )
    }

    /// Draw candidates from `sampler` until `count` are accepted or
    /// `timeout` elapses.
    ///
    /// Batches request only the still-missing number of goals. When the
    /// timeout elapses mid-batch, or the sampler runs dry, the goals found
    /// so far are returned at once; a dry sampler with no goals found is
    /// `Err(Exhausted)`. The robot is restored before returning on every
    /// path.
    pub fn sample_goals(
        &self,
        robot: &mut R,
        sampler: &mut dyn PlacementSampler,
        count: usize,
        timeout: Option<Duration>,
    ) -> Result<GoalBatch<G>, PlacementError> {
        let clock: &dyn Clock = self.clock.as_ref();
        let watch = Stopwatch::start(clock, timeout);
        let mut guard = StateGuard::new(robot);
        let validator = CandidateValidator::new(&self.pairs);
        let mut goals = Vec::with_capacity(count);
        let mut stats = SearchStats::new();
        let mut exhausted = false;
        info!(count, ?timeout, "sampling goals");

        'search: while goals.len() < count {
            if watch.expired(clock) {
                break;
            }
            let batch = sampler.sample(count - goals.len())?;
            if batch.is_empty() {
                warn!(found = goals.len(), count, "placement sampler exhausted");
                stats.exhausted_sources += 1;
                if goals.is_empty() {
                    return Err(PlacementError::Exhausted);
                }
                exhausted = true;
                break;
            }
            for candidate in batch {
                let outcome = validator.validate(&mut guard, &candidate, self.config.classify_failures);
                stats.record(&outcome);
                if let Outcome::Accepted(record) = outcome {
                    goals.push(record);
                }
                if goals.len() >= count || watch.expired(clock) {
                    break 'search;
                }
            }
        }

        info!(
            found = goals.len(),
            failures = stats.failure_count(),
            candidates = stats.candidates,
            "goal sampling finished"
        );
        Ok(GoalBatch {
            goals,
            failures: stats.failure_count(),
            exhausted,
            stats,
        })
    }

    /// Build the joint distribution and collect `config.goal_count` goals
    /// within `config.collect_timeout_secs`.
    pub fn collect_goals(&self, robot: &mut R) -> Result<GoalBatch<G>, PlacementError> {
        let mut distribution = self.compute_grasp_distribution()?;
        self.sample_goals(
            robot,
            &mut distribution.sampler,
            self.config.goal_count,
            self.config.collect_timeout(),
        )
    }

    /// Lazy stream of validated placements across all pairs.
    ///
    /// Each pair contributes one live source: its grasp targets fed through
    /// the reachability model's random or likelihood-ordered placement
    /// iterator, per `config.random_placement`.
    pub fn valid_placements<'r>(&'r self, robot: &'r mut R) -> SearchStream<'r, 'a, R, G> {
        let session = self.next_session();
        let sources = self
            .pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| {
                let targets = GraspCandidateSource::new(
                    pair.grasps,
                    PairId(i),
                    GraspSourceOptions {
                        filter: self.config.grasp_filter,
                        random_order: self.config.random_grasps,
                        seed: self.seeds.source_seed(i),
                    },
                )
                .targets();
                let placements = if self.config.random_placement {
                    pair.reachability
                        .random_base_iter(targets, &self.config.distribution)
                } else {
                    pair.reachability
                        .sample_base_iter(targets, &self.config.distribution)
                };
                LiveSource {
                    pair: PairId(i),
                    placements,
                }
            })
            .collect();

        SearchStream::new(
            CandidateValidator::new(&self.pairs),
            robot,
            sources,
            self.seeds.selection_rng(session),
            self.clock.as_ref(),
            self.config.giveup_time(),
            self.config.classify_failures,
        )
    }

    /// First solution of a fresh stream.
    pub fn first_placement(&self, robot: &mut R) -> Result<SolutionRecord<G>, PlacementError> {
        self.valid_placements(robot)
            .next()
            .unwrap_or(Err(PlacementError::Exhausted))
    }
}

/// Commit `robot` to an accepted solution: base pose, joint values and the
/// grasp preshape on the gripper joints.
pub fn apply_solution<R: Robot, G: Clone + Debug>(
    robot: &mut R,
    pair: &ModelPair<'_, R, G>,
    record: &SolutionRecord<G>,
) -> Result<(), PlacementError> {
    robot.set_transform(&record.pose);
    robot.set_joint_values(&JointState::full(record.values.as_slice().to_vec()))?;
    let preshape = JointState::partial(
        pair.grasps.preshape(&record.grasp),
        pair.manipulator.gripper_joints().to_vec(),
    );
    robot.set_joint_values(&preshape)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use basegrasp_core::clock::ManualClock;
    use basegrasp_core::traits::PlacementDensity;
    use basegrasp_core::types::{BaseSample, GraspId};
    use basegrasp_test_utils::{
        IkScript, ListSampler, MOCK_MANIPULATOR, MOCK_ROBOT, MockGrasp, MockGraspModel, MockReachability,
        MockRobot, ScriptedManipulator, scattered_samples,
    };
    use nalgebra::Isometry3;

    // DOFs: 0-1 arm, 2 gripper.
    const DOF: usize = 3;

    type Planner<'a> = PlacementPlanner<'a, MockRobot, MockGrasp>;

    fn candidate(x: f64, index: usize) -> BaseSample {
        BaseSample {
            pose: Isometry3::translation(x, 0.0, 0.0),
            grasp: GraspId::new(PairId(0), index),
            joint_state: JointState::partial(Vec::new(), Vec::new()),
        }
    }

    fn start_robot() -> MockRobot {
        MockRobot::new(DOF)
            .with_pose(Isometry3::translation(-3.0, 2.0, 0.0))
            .with_values(vec![0.1, 0.2, 0.3])
    }

    #[test]
    fn new_rejects_bad_setup() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(2);
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]);

        let err = Planner::new(MOCK_ROBOT, Vec::new(), SearchConfig::default()).err();
        assert!(matches!(err, Some(PlacementError::EmptyModelSet)));

        let config = SearchConfig {
            goal_count: 0,
            ..SearchConfig::default()
        };
        let err = Planner::new(MOCK_ROBOT, vec![ModelPair::new(&reach, &grasps, &manip)], config).err();
        assert!(matches!(err, Some(PlacementError::Config(_))));

        let config = SearchConfig {
            giveup_time_secs: Some(1e20),
            ..SearchConfig::default()
        };
        let err = Planner::new(MOCK_ROBOT, vec![ModelPair::new(&reach, &grasps, &manip)], config).err();
        assert!(matches!(err, Some(PlacementError::Config(_))));

        let stray = MockGraspModel::new(2).with_ids(RobotId(9), MOCK_MANIPULATOR);
        let err = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &stray, &manip)],
            SearchConfig::default(),
        )
        .err();
        assert!(matches!(
            err,
            Some(PlacementError::InconsistentModelPair { pair: PairId(0), .. })
        ));
    }

    #[test]
    fn sample_goals_stops_at_count_and_restores_robot() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(3);
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]).with_ik(IkScript::Solve(vec![0.4, 0.5]));
        let planner = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &grasps, &manip)],
            SearchConfig::default(),
        )
        .unwrap();

        let mut robot = start_robot();
        let before = robot.clone();
        let mut sampler = ListSampler::cycling(vec![candidate(0.2, 0), candidate(0.3, 1), candidate(0.4, 2)]);
        let batch = planner.sample_goals(&mut robot, &mut sampler, 2, None).unwrap();

        assert_eq!(batch.goals.len(), 2);
        assert_eq!(batch.failures, 0);
        assert_eq!(sampler.batches(), 1);
        assert_eq!(batch.goals[0].values.as_slice(), &[0.4, 0.5, 0.5]);
        assert_eq!(batch.goals[1].grasp.index, 1);
        assert_eq!(robot, before);
    }

    #[test]
    fn sample_goals_requests_only_missing_goals() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(2);
        // Only candidates standing at x >= 0.5 are reachable.
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]).with_ik_fn(|pose| {
            if pose.translation.x >= 0.5 {
                IkScript::Solve(vec![0.0, 0.0])
            } else {
                IkScript::Unreachable
            }
        });
        let planner = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &grasps, &manip)],
            SearchConfig::default(),
        )
        .unwrap();

        let mut robot = start_robot();
        let mut sampler = ListSampler::finite(vec![
            candidate(0.1, 0),
            candidate(0.6, 0),
            candidate(0.2, 1),
            candidate(0.7, 1),
            candidate(0.15, 0),
            candidate(0.8, 0),
        ]);
        let batch = planner.sample_goals(&mut robot, &mut sampler, 3, None).unwrap();

        // 3 drawn, 1 accepted; 2 drawn, 1 accepted; 1 drawn, 1 accepted.
        assert_eq!(sampler.batches(), 3);
        assert_eq!(batch.goals.len(), 3);
        assert_eq!(batch.failures, 3);
        assert_eq!(batch.stats.unreachable, 3);
        assert_eq!(batch.stats.candidates, 6);
    }

    #[test]
    fn sample_goals_returns_partial_batch_on_timeout() {
        let clock = ManualClock::new();
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(1);
        // Every IK call takes 400ms; only the first candidate is valid.
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2])
            .with_ik_fn(|pose| {
                if pose.translation.x < 0.15 {
                    IkScript::Solve(vec![0.0, 0.0])
                } else {
                    IkScript::Unreachable
                }
            })
            .with_clock(clock.clone(), Duration::from_millis(400));
        let planner = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &grasps, &manip)],
            SearchConfig::default(),
        )
        .unwrap()
        .with_clock(clock.clone());

        let mut robot = start_robot();
        let before = robot.clone();
        let mut sampler = ListSampler::cycling(vec![candidate(0.1, 0), candidate(0.2, 0), candidate(0.3, 0)]);
        let batch = planner
            .sample_goals(&mut robot, &mut sampler, 3, Some(Duration::from_secs(1)))
            .unwrap();

        assert_eq!(batch.goals.len(), 1);
        assert!(batch.goals.len() < 3);
        assert!(clock.now() > Duration::from_secs(1));
        assert_eq!(robot, before);
    }

    #[test]
    fn sample_goals_reports_exhausted_sampler() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(1);
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]);
        let planner = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &grasps, &manip)],
            SearchConfig::default(),
        )
        .unwrap();

        let mut robot = start_robot();
        let before = robot.clone();
        let mut sampler = ListSampler::finite(Vec::new());
        let err = planner.sample_goals(&mut robot, &mut sampler, 2, None).unwrap_err();
        assert!(matches!(err, PlacementError::Exhausted));
        assert_eq!(robot, before);
    }

    #[test]
    fn dry_sampler_keeps_goals_already_found() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(2);
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]);
        let planner = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &grasps, &manip)],
            SearchConfig::default(),
        )
        .unwrap();

        let mut robot = start_robot();
        let before = robot.clone();
        let mut sampler = ListSampler::finite(vec![candidate(0.1, 0), candidate(0.2, 1)]);
        let batch = planner.sample_goals(&mut robot, &mut sampler, 3, None).unwrap();

        assert_eq!(batch.goals.len(), 2);
        assert!(batch.exhausted);
        assert_eq!(batch.stats.exhausted_sources, 1);
        assert_eq!(batch.stats.accepted, 2);
        assert_eq!(sampler.batches(), 2);
        assert_eq!(robot, before);
    }

    #[test]
    fn collect_goals_uses_configured_count() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(4);
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]);
        let config = SearchConfig {
            goal_count: 3,
            ..SearchConfig::default()
        };
        let planner = Planner::new(MOCK_ROBOT, vec![ModelPair::new(&reach, &grasps, &manip)], config).unwrap();

        let mut robot = start_robot();
        let batch = planner.collect_goals(&mut robot).unwrap();
        assert_eq!(batch.goals.len(), 3);
        assert_eq!(reach.distribution_calls(), 1);
    }

    #[test]
    fn goals_keep_sampler_order_and_poses() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(2);
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]);
        let planner = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &grasps, &manip)],
            SearchConfig::default(),
        )
        .unwrap();

        let samples = scattered_samples(6, GraspId::new(PairId(0), 1), 2.0, 5);
        let mut sampler = ListSampler::finite(samples.clone());
        let mut robot = start_robot();
        let batch = planner.sample_goals(&mut robot, &mut sampler, 6, None).unwrap();

        assert_eq!(batch.goals.len(), 6);
        for (goal, sample) in batch.goals.iter().zip(&samples) {
            assert_eq!(goal.pose, sample.pose);
            assert_eq!(goal.grasp_id, sample.grasp);
        }
    }

    #[test]
    fn grasp_distribution_single_pair_identity() {
        let reach = MockReachability::new(0.25, basegrasp_test_utils::unit_bounds());
        let grasps = MockGraspModel::new(2);
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]);
        let planner = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &grasps, &manip)],
            SearchConfig::default(),
        )
        .unwrap();

        let distribution = planner.compute_grasp_distribution().unwrap();
        let probe = Isometry3::translation(7.0, -2.0, 0.0);
        assert!((distribution.density.density(&probe) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn first_placement_takes_stream_head() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(3);
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]);
        let planner = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &grasps, &manip)],
            SearchConfig::default(),
        )
        .unwrap();

        let mut robot = start_robot();
        let before = robot.clone();
        let record = planner.first_placement(&mut robot).unwrap();
        // Likelihood order: grasp 0 at the nearest standoff.
        assert_eq!(record.grasp_id, GraspId::new(PairId(0), 0));
        assert!((record.pose.translation.x - 0.5).abs() < 1e-12);
        assert_eq!(robot, before);
    }

    #[test]
    fn first_placement_on_empty_catalog_is_exhausted() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(3).with_valid(Vec::new());
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]);
        let planner = Planner::new(
            MOCK_ROBOT,
            vec![ModelPair::new(&reach, &grasps, &manip)],
            SearchConfig::default(),
        )
        .unwrap();

        let err = planner.first_placement(&mut start_robot()).unwrap_err();
        assert!(matches!(err, PlacementError::Exhausted));
    }

    #[test]
    fn apply_solution_commits_pose_values_and_preshape() {
        let reach = MockReachability::unit();
        let grasps = MockGraspModel::new(2);
        let manip = ScriptedManipulator::new(vec![0, 1], vec![2]).with_ik(IkScript::Solve(vec![0.9, -0.9]));
        let pair = ModelPair::new(&reach, &grasps, &manip);
        let planner = Planner::new(MOCK_ROBOT, vec![pair], SearchConfig::default()).unwrap();

        let mut robot = start_robot();
        let record = planner.first_placement(&mut robot).unwrap();
        apply_solution(&mut robot, &pair, &record).unwrap();

        assert_eq!(robot.pose, record.pose);
        assert_eq!(robot.values.as_slice(), &[0.9, -0.9, 0.5]);
    }
}
