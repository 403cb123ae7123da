//! Scoped robot state snapshot.

use std::ops::{Deref, DerefMut};

use basegrasp_core::traits::{Robot, RobotSnapshot};
use tracing::error;

/// Holds exclusive access to a robot and restores its saved state on drop.
///
/// The snapshot is taken on construction. Every exit path (normal return,
/// `?` propagation, a consumer dropping a stream early, unwinding) runs
/// `Drop` and puts the robot back.
pub struct StateGuard<'r, R: Robot> {
    robot: &'r mut R,
    snapshot: RobotSnapshot,
}

impl<'r, R: Robot> StateGuard<'r, R> {
    pub fn new(robot: &'r mut R) -> Self {
        let snapshot = robot.save_state();
        Self { robot, snapshot }
    }

    pub const fn snapshot(&self) -> &RobotSnapshot {
        &self.snapshot
    }

    /// Restore the snapshot now, keeping the guard.
    pub fn restore(&mut self) {
        if let Err(err) = self.robot.restore_state(&self.snapshot) {
            error!(%err, "failed to restore robot state");
        }
    }

    /// Replace the snapshot with the robot's current state.
    pub fn recapture(&mut self) {
        self.snapshot = self.robot.save_state();
    }
}

impl<R: Robot> Deref for StateGuard<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        &*self.robot
    }
}

impl<R: Robot> DerefMut for StateGuard<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        &mut *self.robot
    }
}

impl<R: Robot> Drop for StateGuard<'_, R> {
    fn drop(&mut self) {
        self.restore();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use basegrasp_core::types::JointState;
    use basegrasp_test_utils::MockRobot;
    use nalgebra::Isometry3;

    fn mutate(robot: &mut MockRobot) {
        robot.set_transform(&Isometry3::translation(3.0, 3.0, 0.0));
        robot
            .set_joint_values(&JointState::full(vec![1.0, 1.0]))
            .unwrap();
    }

    #[test]
    fn restores_on_drop() {
        let mut robot = MockRobot::new(2).with_values(vec![0.1, 0.2]);
        let before = robot.clone();
        {
            let mut guard = StateGuard::new(&mut robot);
            mutate(&mut guard);
            assert_eq!(guard.values.as_slice(), &[1.0, 1.0]);
        }
        assert_eq!(robot, before);
    }

    #[test]
    fn restores_on_early_error_return() {
        fn fallible(robot: &mut MockRobot) -> Result<(), &'static str> {
            let mut guard = StateGuard::new(robot);
            mutate(&mut guard);
            Err("bail")
        }

        let mut robot = MockRobot::new(2);
        let before = robot.clone();
        assert!(fallible(&mut robot).is_err());
        assert_eq!(robot, before);
    }

    #[test]
    fn recapture_moves_the_restore_point() {
        let mut robot = MockRobot::new(2);
        {
            let mut guard = StateGuard::new(&mut robot);
            mutate(&mut guard);
            guard.recapture();
            guard.set_transform(&Isometry3::identity());
            guard.restore();
            assert_eq!(guard.pose, Isometry3::translation(3.0, 3.0, 0.0));
        }
        assert_eq!(robot.values.as_slice(), &[1.0, 1.0]);
    }
}
