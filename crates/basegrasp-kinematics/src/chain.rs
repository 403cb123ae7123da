//! Serial kinematic chains.
//!
//! A [`KinematicChain`] is an ordered list of actuated joints from the robot
//! base frame to the end-effector. It stores the static transforms (origins)
//! and joint axes needed for forward kinematics and Jacobian computation.

use basegrasp_core::error::JointError;
use basegrasp_core::types::Transform;
use nalgebra::{Isometry3, Translation3, UnitQuaternion, UnitVector3, Vector3};

/// A single joint in the kinematic chain.
#[derive(Debug, Clone)]
pub struct ChainJoint {
    pub name: String,
    /// Static transform from the previous joint frame to this joint frame.
    pub origin: Transform,
    /// Joint axis in the joint's local frame.
    pub axis: UnitVector3<f64>,
    /// Whether this is a prismatic joint (false = revolute).
    pub is_prismatic: bool,
    /// Lower position limit (rad or m).
    pub lower_limit: f64,
    /// Upper position limit (rad or m).
    pub upper_limit: f64,
}

impl ChainJoint {
    /// Revolute joint about `axis` located at `origin`.
    pub fn revolute(name: impl Into<String>, origin: Transform, axis: Vector3<f64>, limits: (f64, f64)) -> Self {
        Self {
            name: name.into(),
            origin,
            axis: UnitVector3::new_normalize(axis),
            is_prismatic: false,
            lower_limit: limits.0,
            upper_limit: limits.1,
        }
    }

    /// Prismatic joint sliding along `axis` located at `origin`.
    pub fn prismatic(name: impl Into<String>, origin: Transform, axis: Vector3<f64>, limits: (f64, f64)) -> Self {
        Self {
            is_prismatic: true,
            ..Self::revolute(name, origin, axis, limits)
        }
    }
}

/// An ordered kinematic chain from base to end-effector.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    joints: Vec<ChainJoint>,
    /// Transform from the last joint frame to the end-effector frame.
    ee_offset: Transform,
}

impl KinematicChain {
    pub const fn new(joints: Vec<ChainJoint>, ee_offset: Transform) -> Self {
        Self { joints, ee_offset }
    }

    /// Horizontal arm of revolute Z joints mounted `mount_height` above the
    /// base origin. Link `i` has length `links[i]` along its local x-axis.
    pub fn planar(mount_height: f64, links: &[f64], limits: &[(f64, f64)]) -> Self {
        let mut joints = Vec::with_capacity(links.len());
        let mut origin = Isometry3::translation(0.0, 0.0, mount_height);
        for (i, (&length, &limit)) in links.iter().zip(limits).enumerate() {
            joints.push(ChainJoint::revolute(format!("joint_{i}"), origin, Vector3::z(), limit));
            origin = Isometry3::translation(length, 0.0, 0.0);
        }
        Self::new(joints, origin)
    }

    /// Number of actuated degrees of freedom.
    pub fn dof(&self) -> usize {
        self.joints.len()
    }

    pub fn joint_names(&self) -> Vec<&str> {
        self.joints.iter().map(|j| j.name.as_str()).collect()
    }

    pub fn joints(&self) -> &[ChainJoint] {
        &self.joints
    }

    pub const fn ee_offset(&self) -> &Transform {
        &self.ee_offset
    }

    fn check_len(&self, q: &[f64]) -> Result<(), JointError> {
        if q.len() == self.dof() {
            Ok(())
        } else {
            Err(JointError::LengthMismatch {
                expected: self.dof(),
                got: q.len(),
            })
        }
    }

    /// End-effector pose in the base frame for joint positions `q`.
    pub fn forward_kinematics(&self, q: &[f64]) -> Result<Transform, JointError> {
        self.check_len(q)?;
        let mut transform = Isometry3::identity();
        for (joint, &position) in self.joints.iter().zip(q) {
            transform *= joint.origin;
            transform *= joint_transform(&joint.axis, joint.is_prismatic, position);
        }
        Ok(transform * self.ee_offset)
    }

    /// Joint origins and axes in the base frame, plus the end-effector
    /// position, for Jacobian computation.
    pub fn joint_frames(&self, q: &[f64]) -> Result<(Vec<Vector3<f64>>, Vec<Vector3<f64>>, Vector3<f64>), JointError> {
        self.check_len(q)?;
        let mut transform = Isometry3::identity();
        let mut origins = Vec::with_capacity(self.dof());
        let mut axes = Vec::with_capacity(self.dof());

        for (joint, &position) in self.joints.iter().zip(q) {
            transform *= joint.origin;
            // Recorded before the joint's own motion.
            origins.push(transform.translation.vector);
            axes.push(transform.rotation * joint.axis.into_inner());
            transform *= joint_transform(&joint.axis, joint.is_prismatic, position);
        }

        let ee = transform * self.ee_offset;
        Ok((origins, axes, ee.translation.vector))
    }

    /// Polyline through every joint origin and the end-effector, in the base
    /// frame. Used for link collision checks.
    pub fn link_points(&self, q: &[f64]) -> Result<Vec<Vector3<f64>>, JointError> {
        let (mut points, _, ee) = self.joint_frames(q)?;
        points.push(ee);
        Ok(points)
    }

    /// Clamp joint positions to their limits.
    pub fn clamp_joints(&self, q: &mut [f64]) {
        for (value, joint) in q.iter_mut().zip(&self.joints) {
            *value = value.clamp(joint.lower_limit, joint.upper_limit);
        }
    }

    pub fn within_limits(&self, q: &[f64]) -> bool {
        q.len() == self.dof()
            && q
                .iter()
                .zip(&self.joints)
                .all(|(&v, j)| j.lower_limit <= v && v <= j.upper_limit)
    }
}

/// Transform for a single joint at a given position.
fn joint_transform(axis: &UnitVector3<f64>, is_prismatic: bool, position: f64) -> Transform {
    if is_prismatic {
        Isometry3::from_parts(Translation3::from(axis.into_inner() * position), UnitQuaternion::identity())
    } else {
        Isometry3::from_parts(Translation3::identity(), UnitQuaternion::from_axis_angle(axis, position))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
