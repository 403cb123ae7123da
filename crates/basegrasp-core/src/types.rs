use std::fmt;

use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{BoundsError, JointError};

/// Rigid 6-DOF transform used for base poses and end-effector targets.
pub type Transform = Isometry3<f64>;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Identifies a robot instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RobotId(pub u32);

/// Identifies a manipulator (arm + end-effector) on a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManipulatorId(pub u32);

/// Index of a model pair within a planner's pair list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PairId(pub usize);

impl fmt::Display for PairId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A grasp inside one model pair's grasp catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraspId {
    pub pair: PairId,
    pub index: usize,
}

impl GraspId {
    pub const fn new(pair: PairId, index: usize) -> Self {
        Self { pair, index }
    }
}

impl fmt::Display for GraspId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.pair, self.index)
    }
}

// ---------------------------------------------------------------------------
// PlanarPose
// ---------------------------------------------------------------------------

/// 2D + heading projection of a base transform.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarPose {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
}

impl PlanarPose {
    pub const fn new(x: f64, y: f64, heading: f64) -> Self {
        Self { x, y, heading }
    }

    /// Project a transform onto the ground plane. The heading is the angle
    /// of the transform's x-axis in the world xy-plane.
    pub fn from_transform(transform: &Transform) -> Self {
        let x_axis = transform.rotation * Vector3::x();
        Self {
            x: transform.translation.x,
            y: transform.translation.y,
            heading: x_axis.y.atan2(x_axis.x),
        }
    }

    /// Lift back to a transform at height `z`, rotated about world z.
    pub fn to_transform(&self, z: f64) -> Transform {
        Isometry3::from_parts(
            Translation3::new(self.x, self.y, z),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), self.heading),
        )
    }
}

// ---------------------------------------------------------------------------
// JointValues
// ---------------------------------------------------------------------------

/// Dense joint position vector covering every DOF of a robot.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointValues {
    data: Vec<f64>,
}

impl JointValues {
    pub const fn new(data: Vec<f64>) -> Self {
        Self { data }
    }

    pub fn zeros(dof: usize) -> Self {
        Self {
            data: vec![0.0; dof],
        }
    }

    pub const fn len(&self) -> usize {
        self.data.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    /// Write `values` at the given DOF `indices`, leaving other entries untouched.
    pub fn overlay(&mut self, indices: &[usize], values: &[f64]) -> Result<(), JointError> {
        if indices.len() != values.len() {
            return Err(JointError::LengthMismatch {
                expected: indices.len(),
                got: values.len(),
            });
        }
        let dof = self.data.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= dof) {
            return Err(JointError::IndexOutOfRange { index, dof });
        }
        for (&i, &v) in indices.iter().zip(values) {
            self.data[i] = v;
        }
        Ok(())
    }

    /// Gather the values at `indices`.
    pub fn select(&self, indices: &[usize]) -> Result<Vec<f64>, JointError> {
        let dof = self.data.len();
        indices
            .iter()
            .map(|&i| {
                self.data
                    .get(i)
                    .copied()
                    .ok_or(JointError::IndexOutOfRange { index: i, dof })
            })
            .collect()
    }
}

impl std::ops::Index<usize> for JointValues {
    type Output = f64;
    fn index(&self, i: usize) -> &f64 {
        &self.data[i]
    }
}

impl From<Vec<f64>> for JointValues {
    fn from(data: Vec<f64>) -> Self {
        Self::new(data)
    }
}

// ---------------------------------------------------------------------------
// JointState
// ---------------------------------------------------------------------------

/// Joint values to apply to a robot, optionally restricted to a subset of DOFs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct JointState {
    pub values: Vec<f64>,
    /// DOF indices `values` refers to. `None` means all DOFs in order.
    pub indices: Option<Vec<usize>>,
}

impl JointState {
    /// State covering every DOF.
    pub const fn full(values: Vec<f64>) -> Self {
        Self {
            values,
            indices: None,
        }
    }

    /// State covering only `indices`.
    pub const fn partial(values: Vec<f64>, indices: Vec<usize>) -> Self {
        Self {
            values,
            indices: Some(indices),
        }
    }

    /// Apply this state on top of `current`.
    pub fn apply_to(&self, current: &mut JointValues) -> Result<(), JointError> {
        match &self.indices {
            Some(indices) => current.overlay(indices, &self.values),
            None => {
                if self.values.len() != current.len() {
                    return Err(JointError::LengthMismatch {
                        expected: current.len(),
                        got: self.values.len(),
                    });
                }
                *current = JointValues::new(self.values.clone());
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Bounds
// ---------------------------------------------------------------------------

/// Axis-aligned bounding box over placement space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self, BoundsError> {
        if lower.len() != upper.len() {
            return Err(BoundsError::DimensionMismatch {
                left: lower.len(),
                right: upper.len(),
            });
        }
        if let Some(dim) = lower.iter().zip(&upper).position(|(l, u)| l > u) {
            return Err(BoundsError::Inverted { dim });
        }
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    pub const fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Element-wise min of lowers and max of uppers.
    pub fn union(&self, other: &Self) -> Result<Self, BoundsError> {
        if self.dim() != other.dim() {
            return Err(BoundsError::DimensionMismatch {
                left: self.dim(),
                right: other.dim(),
            });
        }
        let lower = self
            .lower
            .iter()
            .zip(&other.lower)
            .map(|(a, b)| a.min(*b))
            .collect();
        let upper = self
            .upper
            .iter()
            .zip(&other.upper)
            .map(|(a, b)| a.max(*b))
            .collect();
        Ok(Self { lower, upper })
    }

    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dim()
            && point
                .iter()
                .zip(self.lower.iter().zip(&self.upper))
                .all(|(p, (l, u))| l <= p && p <= u)
    }
}

// ---------------------------------------------------------------------------
// Grasp targets, candidates and solutions
// ---------------------------------------------------------------------------

/// A global end-effector target for one grasp.
#[derive(Debug, Clone, PartialEq)]
pub struct GraspTarget {
    pub transform: Transform,
    pub grasp: GraspId,
}

/// A candidate base placement drawn from a reachability distribution.
///
/// Consumed once by the validator, then discarded.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseSample {
    pub pose: Transform,
    pub grasp: GraspId,
    pub joint_state: JointState,
}

/// An accepted (base pose, configuration, grasp) combination.
#[derive(Debug, Clone, PartialEq)]
pub struct SolutionRecord<G> {
    pub pose: Transform,
    pub values: JointValues,
    pub grasp: G,
    pub grasp_id: GraspId,
}

impl<G> SolutionRecord<G> {
    pub fn planar(&self) -> PlanarPose {
        PlanarPose::from_transform(&self.pose)
    }

    pub const fn pair(&self) -> PairId {
        self.grasp_id.pair
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn planar_pose_projection() {
        let pose = PlanarPose::new(1.0, -2.0, 0.75);
        let transform = pose.to_transform(0.1);
        assert_relative_eq!(transform.translation.z, 0.1);

        let back = PlanarPose::from_transform(&transform);
        assert_relative_eq!(back.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(back.y, -2.0, epsilon = 1e-12);
        assert_relative_eq!(back.heading, 0.75, epsilon = 1e-12);
    }

    #[test]
    fn overlay_writes_selected_dofs() {
        let mut values = JointValues::zeros(5);
        values.overlay(&[1, 3], &[0.5, -0.5]).unwrap();
        assert_eq!(values.as_slice(), &[0.0, 0.5, 0.0, -0.5, 0.0]);
        assert_eq!(values.select(&[3, 1]).unwrap(), vec![-0.5, 0.5]);
    }

    #[test]
    fn overlay_rejects_bad_input() {
        let mut values = JointValues::zeros(3);
        assert_eq!(
            values.overlay(&[0, 1], &[1.0]),
            Err(JointError::LengthMismatch {
                expected: 2,
                got: 1
            })
        );
        assert_eq!(
            values.overlay(&[4], &[1.0]),
            Err(JointError::IndexOutOfRange { index: 4, dof: 3 })
        );
        assert_eq!(values.as_slice(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn joint_state_full_and_partial() {
        let mut current = JointValues::new(vec![1.0, 2.0, 3.0]);
        JointState::partial(vec![9.0], vec![2]).apply_to(&mut current).unwrap();
        assert_eq!(current.as_slice(), &[1.0, 2.0, 9.0]);

        JointState::full(vec![0.0, 0.0, 0.0]).apply_to(&mut current).unwrap();
        assert_eq!(current.as_slice(), &[0.0, 0.0, 0.0]);

        assert!(JointState::full(vec![0.0]).apply_to(&mut current).is_err());
    }

    #[test]
    fn bounds_union_is_elementwise() {
        let a = Bounds::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        let b = Bounds::new(vec![0.5, 0.5], vec![2.0, 2.0]).unwrap();
        let u = a.union(&b).unwrap();
        assert_eq!(u.lower(), &[0.0, 0.0]);
        assert_eq!(u.upper(), &[2.0, 2.0]);
    }

    #[test]
    fn bounds_validation() {
        assert_eq!(
            Bounds::new(vec![0.0], vec![1.0, 2.0]),
            Err(BoundsError::DimensionMismatch { left: 1, right: 2 })
        );
        assert_eq!(
            Bounds::new(vec![0.0, 3.0], vec![1.0, 2.0]),
            Err(BoundsError::Inverted { dim: 1 })
        );
        let a = Bounds::new(vec![0.0], vec![1.0]).unwrap();
        let b = Bounds::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        assert!(a.union(&b).is_err());
    }

    #[test]
    fn bounds_contains() {
        let b = Bounds::new(vec![-1.0, -1.0], vec![1.0, 1.0]).unwrap();
        assert!(b.contains(&[0.0, 1.0]));
        assert!(!b.contains(&[0.0, 1.5]));
        assert!(!b.contains(&[0.0]));
    }

    #[test]
    fn grasp_id_display() {
        assert_eq!(GraspId::new(PairId(1), 7).to_string(), "1:7");
    }
}
