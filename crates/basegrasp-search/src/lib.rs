//! Sampling-and-validation engine for mobile-manipulator grasp placement.
//!
//! Given model pairs (an inverse reachability model plus a grasp model for
//! one manipulator), the engine draws candidate base placements, validates
//! them against collision and inverse kinematics, and returns accepted
//! (base pose, configuration, grasp) combinations.
//!
//! # Architecture
//!
//! ```text
//! GraspModel ──► GraspCandidateSource ──► ReachabilityModel ──► candidates
//!                                                                    │
//!                     combine() ──► AggregateDistribution            ▼
//!                                        │                 CandidateValidator
//!                                        ▼                           │
//!                             PlacementPlanner::sample_goals ◄───────┤
//!                             PlacementPlanner::valid_placements ◄───┘
//! ```
//!
//! All robot mutation happens under a [`StateGuard`](guard::StateGuard),
//! which restores the pre-search snapshot on every exit path.

pub mod aggregate;
pub mod grasp_source;
pub mod guard;
pub mod model_pair;
pub mod planner;
pub mod stats;
pub mod stream;
pub mod validator;

pub use aggregate::{AggregateDistribution, CombineOptions, MixtureDensity, MixtureSampler, combine};
pub use grasp_source::{GraspCandidateSource, GraspSourceOptions};
pub use guard::StateGuard;
pub use model_pair::{ModelPair, check_pairs};
pub use planner::{GoalBatch, PlacementPlanner, apply_solution};
pub use stats::SearchStats;
pub use stream::{SearchStream, StreamState};
pub use validator::{CandidateValidator, HardReason, Outcome, SoftReason};

pub mod prelude {
    pub use crate::{
        AggregateDistribution, CandidateValidator, GoalBatch, ModelPair, Outcome, PlacementPlanner, SearchStats,
        SearchStream, StreamState, apply_solution,
    };
    pub use basegrasp_core::prelude::*;
}
