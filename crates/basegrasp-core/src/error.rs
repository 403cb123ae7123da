use std::time::Duration;

use thiserror::Error;

use crate::types::PairId;

/// Top-level error type for placement search.
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("Inconsistent model pair {pair}: {reason}")]
    InconsistentModelPair { pair: PairId, reason: String },

    #[error("No model pairs supplied")]
    EmptyModelSet,

    #[error("Search timed out: no solution for {elapsed:?} (give-up time {giveup:?})")]
    SearchTimedOut { elapsed: Duration, giveup: Duration },

    #[error("All placement sources are exhausted")]
    Exhausted,

    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bounds error: {0}")]
    Bounds(#[from] BoundsError),

    #[error("Joint error: {0}")]
    Joint(#[from] JointError),
}

impl PlacementError {
    /// Whether the caller may retry the search, e.g. with a larger budget.
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::SearchTimedOut { .. } | Self::Exhausted)
    }
}

/// Errors reported by external collaborators (collision engine, IK solver,
/// reachability model).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("collision check failed: {0}")]
    Collision(String),

    #[error("inverse kinematics failed: {0}")]
    InverseKinematics(String),

    #[error("base distribution failed: {0}")]
    Distribution(String),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

/// Placement-space bounding box errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BoundsError {
    #[error("Mismatched bounds dimensions: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Lower bound exceeds upper bound at dimension {dim}")]
    Inverted { dim: usize },
}

/// Joint vector errors.
///
/// Copy so it can be returned from hot paths without allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum JointError {
    #[error("Joint length mismatch: expected {expected}, got {got}")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Joint index {index} out of range for {dof} DOF")]
    IndexOutOfRange { index: usize, dof: usize },
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_error_from_collaborator_error() {
        let err = CollaboratorError::Collision("engine offline".into());
        let placement: PlacementError = err.into();
        assert!(matches!(placement, PlacementError::Collaborator(_)));
        assert!(placement.to_string().contains("engine offline"));
    }

    #[test]
    fn placement_error_from_bounds_error() {
        let err = BoundsError::DimensionMismatch { left: 3, right: 2 };
        let placement: PlacementError = err.into();
        assert!(matches!(placement, PlacementError::Bounds(_)));
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::Io(_)));
    }

    #[test]
    fn recoverable_errors() {
        assert!(PlacementError::Exhausted.is_recoverable());
        assert!(
            PlacementError::SearchTimedOut {
                elapsed: Duration::from_secs(2),
                giveup: Duration::from_secs(1),
            }
            .is_recoverable()
        );
        assert!(!PlacementError::EmptyModelSet.is_recoverable());
        assert!(
            !PlacementError::InconsistentModelPair {
                pair: PairId(0),
                reason: "robot mismatch".into(),
            }
            .is_recoverable()
        );
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            PlacementError::InconsistentModelPair {
                pair: PairId(2),
                reason: "manipulator mismatch".into(),
            }
            .to_string(),
            "Inconsistent model pair 2: manipulator mismatch"
        );
        assert_eq!(
            PlacementError::Exhausted.to_string(),
            "All placement sources are exhausted"
        );
        assert_eq!(
            BoundsError::Inverted { dim: 1 }.to_string(),
            "Lower bound exceeds upper bound at dimension 1"
        );
        assert_eq!(
            JointError::IndexOutOfRange { index: 9, dof: 7 }.to_string(),
            "Joint index 9 out of range for 7 DOF"
        );
        assert_eq!(
            ConfigError::InvalidValue {
                field: "goal_count".into(),
                message: "must be >= 1".into()
            }
            .to_string(),
            "Invalid value for goal_count: must be >= 1"
        );
    }
}
