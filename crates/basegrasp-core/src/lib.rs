// basegrasp-core: types, collaborator traits, config, seeding, clocks and
// errors for mobile-manipulator grasp placement search.

pub mod clock;
pub mod config;
pub mod error;
pub mod seed;
pub mod traits;
pub mod types;

pub mod prelude {
    pub use crate::clock::{Clock, ManualClock, MonotonicClock, Stopwatch};
    pub use crate::config::{DistributionOptions, GraspFilter, SearchConfig};
    pub use crate::error::{BoundsError, CollaboratorError, ConfigError, JointError, PlacementError};
    pub use crate::seed::SeedHierarchy;
    pub use crate::traits::{
        BaseDistribution, BaseIter, GraspModel, GraspTargets, Manipulator, PlacementDensity,
        PlacementSampler, ReachabilityModel, Robot, RobotSnapshot,
    };
    pub use crate::types::{
        BaseSample, Bounds, GraspId, GraspTarget, JointState, JointValues, ManipulatorId, PairId,
        PlanarPose, RobotId, SolutionRecord, Transform,
    };
}
