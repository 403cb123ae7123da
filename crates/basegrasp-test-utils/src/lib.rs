//! Shared test fixtures and utilities for basegrasp crates.
//!
//! Provides deterministic RNG setup and scripted stand-ins for the external
//! collaborators (robot, manipulator, grasp model, reachability model).

pub mod mocks;
pub mod rng;

// ---------------------------------------------------------------------------
// Re-exports for convenience
// ---------------------------------------------------------------------------

pub use mocks::{
    IkScript, ListSampler, MockGrasp, MockGraspModel, MockReachability, MockRobot,
    ScriptedManipulator, MOCK_MANIPULATOR, MOCK_ROBOT, unit_bounds,
};
pub use rng::{random_base_pose, scattered_samples, seeded_rng};
