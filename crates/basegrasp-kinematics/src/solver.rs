//! Damped Least Squares (Levenberg-Marquardt) IK solver.
//!
//! Iteratively solves for joint positions that place the end-effector
//! at a target pose, using the geometric Jacobian and DLS pseudoinverse.

use basegrasp_core::error::JointError;
use basegrasp_core::types::Transform;
use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

use crate::chain::KinematicChain;

/// What the solver should target.
#[derive(Debug, Clone)]
pub enum IkTarget {
    /// Position only (3 constraints).
    Position(Vector3<f64>),
    /// Position and orientation (6 constraints).
    Pose(Transform),
}

/// Configuration for the DLS solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DlsConfig {
    pub max_iterations: u32,
    /// Position error tolerance (meters).
    pub position_tolerance: f64,
    /// Orientation error tolerance (radians).
    pub angle_tolerance: f64,
    /// Damping factor (lambda). Higher = more robust near singularities,
    /// but slower convergence.
    pub damping: f64,
}

impl Default for DlsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            position_tolerance: 1e-4,
            angle_tolerance: 1e-3,
            damping: 0.05,
        }
    }
}

/// Result of an IK solve.
#[derive(Debug, Clone)]
pub struct IkResult {
    pub joint_positions: Vec<f64>,
    /// Whether the solver converged within tolerance.
    pub converged: bool,
    pub iterations: u32,
    /// Final position error (meters).
    pub position_error: f64,
    /// Final orientation error (radians). Zero for position-only targets.
    pub orientation_error: f64,
}

/// Damped Least Squares IK solver.
#[derive(Debug, Clone, Default)]
pub struct DlsSolver {
    config: DlsConfig,
}

impl DlsSolver {
    pub const fn new(config: DlsConfig) -> Self {
        Self { config }
    }

    pub const fn config(&self) -> &DlsConfig {
        &self.config
    }

    /// Solve IK for `chain` towards `target`, warm-started at `q_init`.
    pub fn solve(&self, chain: &KinematicChain, target: &IkTarget, q_init: &[f64]) -> Result<IkResult, JointError> {
        let mut q = q_init.to_vec();
        chain.clamp_joints(&mut q);

        for iteration in 0..self.config.max_iterations {
            let ee_pose = chain.forward_kinematics(&q)?;
            let (pos_err, ori_err, error) = compute_error(&ee_pose, target);

            let converged = match target {
                IkTarget::Position(_) => pos_err < self.config.position_tolerance,
                IkTarget::Pose(_) => {
                    pos_err < self.config.position_tolerance && ori_err < self.config.angle_tolerance
                }
            };
            if converged {
                return Ok(IkResult {
                    joint_positions: q,
                    converged: true,
                    iterations: iteration,
                    position_error: pos_err,
                    orientation_error: ori_err,
                });
            }

            let jacobian = compute_jacobian(chain, &q, target)?;
            let m = jacobian.nrows();

            // dq = J^T (J J^T + lambda^2 I)^-1 e
            let damped = &jacobian * jacobian.transpose()
                + DMatrix::identity(m, m) * (self.config.damping * self.config.damping);
            let Some(damped_inv) = damped.try_inverse() else {
                return Ok(IkResult {
                    joint_positions: q,
                    converged: false,
                    iterations: iteration,
                    position_error: pos_err,
                    orientation_error: ori_err,
                });
            };
            let dq = jacobian.transpose() * damped_inv * error;

            for (value, step) in q.iter_mut().zip(dq.iter()) {
                *value += step;
            }
            chain.clamp_joints(&mut q);
        }

        let ee_pose = chain.forward_kinematics(&q)?;
        let (pos_err, ori_err, _) = compute_error(&ee_pose, target);
        Ok(IkResult {
            joint_positions: q,
            converged: false,
            iterations: self.config.max_iterations,
            position_error: pos_err,
            orientation_error: ori_err,
        })
    }
}

/// Returns (position error norm, orientation error norm, error vector).
fn compute_error(ee_pose: &Transform, target: &IkTarget) -> (f64, f64, DVector<f64>) {
    match target {
        IkTarget::Position(target_pos) => {
            let pos_err = target_pos - ee_pose.translation.vector;
            (pos_err.norm(), 0.0, DVector::from_column_slice(pos_err.as_slice()))
        }
        IkTarget::Pose(target_pose) => {
            let pos_err = target_pose.translation.vector - ee_pose.translation.vector;
            let ori_err = orientation_error(&(target_pose.rotation * ee_pose.rotation.inverse()));
            let error = DVector::from_column_slice(&[pos_err.x, pos_err.y, pos_err.z, ori_err.x, ori_err.y, ori_err.z]);
            (pos_err.norm(), ori_err.norm(), error)
        }
    }
}

/// Orientation error as axis * angle.
fn orientation_error(q: &UnitQuaternion<f64>) -> Vector3<f64> {
    q.axis().map_or_else(Vector3::zeros, |axis| axis.into_inner() * q.angle())
}

/// Geometric Jacobian: 3xN for position targets, 6xN for full poses.
fn compute_jacobian(chain: &KinematicChain, q: &[f64], target: &IkTarget) -> Result<DMatrix<f64>, JointError> {
    let (origins, axes, ee_pos) = chain.joint_frames(q)?;
    let rows = match target {
        IkTarget::Position(_) => 3,
        IkTarget::Pose(_) => 6,
    };
    let mut jacobian = DMatrix::zeros(rows, chain.dof());

    for (i, joint) in chain.joints().iter().enumerate() {
        let z = &axes[i];
        if joint.is_prismatic {
            jacobian[(0, i)] = z.x;
            jacobian[(1, i)] = z.y;
            jacobian[(2, i)] = z.z;
        } else {
            let linear = z.cross(&(ee_pos - origins[i]));
            jacobian[(0, i)] = linear.x;
            jacobian[(1, i)] = linear.y;
            jacobian[(2, i)] = linear.z;
            if rows == 6 {
                jacobian[(3, i)] = z.x;
                jacobian[(4, i)] = z.y;
                jacobian[(5, i)] = z.z;
            }
        }
    }
    Ok(jacobian)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
