//! Kinematics and a reference world for grasp placement search.
//!
//! Provides forward kinematics, geometric Jacobians and Damped Least
//! Squares (Levenberg-Marquardt) IK for serial chains, plus a planar mobile
//! manipulator world implementing the collaborator traits of
//! `basegrasp-core`:
//!
//! ```text
//! SceneConfig ──► TabletopScene ─┬─► MobileArm              (Robot)
//!                                ├─► ArmManipulator         (Manipulator: collision + IK)
//!                                ├─► RingReachabilityModel  (ReachabilityModel)
//!                                └─► GraspCatalog per object (GraspModel)
//! ```

pub mod chain;
pub mod grasps;
pub mod reachability;
pub mod robot;
pub mod scene;
pub mod solver;
pub mod world;

pub use chain::{ChainJoint, KinematicChain};
pub use grasps::{GraspCatalog, GraspScreen, SideGrasp};
pub use reachability::{RingParams, RingReachabilityModel, RingSampler};
pub use robot::{ArmGeometry, ArmManipulator, MobileArm};
pub use scene::{ObjectSpec, SCENE_MANIPULATOR, SCENE_ROBOT, SceneConfig, TabletopScene};
pub use solver::{DlsConfig, DlsSolver, IkResult, IkTarget};
pub use world::{Disc, PlanarWorld};
