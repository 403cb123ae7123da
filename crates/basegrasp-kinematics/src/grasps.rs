//! Grasp catalog for upright cylindrical objects.

use std::f64::consts::TAU;

use basegrasp_core::config::GraspFilter;
use basegrasp_core::traits::GraspModel;
use basegrasp_core::types::{ManipulatorId, RobotId, Transform};
use nalgebra::{Isometry3, Point3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

use crate::world::PlanarWorld;

/// A side grasp: the gripper approaches the object's axis horizontally.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SideGrasp {
    /// Approach direction in the object frame (rad about z).
    pub approach: f64,
    /// Finger opening applied as the gripper preshape.
    pub opening: f64,
}

/// What a [`GraspCatalog`] screens its grasps against.
#[derive(Debug, Clone, PartialEq)]
pub struct GraspScreen {
    pub world: PlanarWorld,
    /// Footprint radius of the gripper.
    pub gripper_radius: f64,
    /// World position of the arm's shoulder, for the reach pre-check.
    pub shoulder: Point3<f64>,
    /// Longest shoulder-to-gripper distance the arm can span.
    pub reach: f64,
}

/// Side grasps spread evenly around one object.
#[derive(Debug, Clone)]
pub struct GraspCatalog {
    robot_id: RobotId,
    manipulator_id: ManipulatorId,
    object: Transform,
    /// Distance from the object axis to the grasp point.
    contact_radius: f64,
    /// Extra standoff of the collision-free (pre-grasp) transform.
    backoff: f64,
    grasps: Vec<SideGrasp>,
    screen: Option<GraspScreen>,
}

impl GraspCatalog {
    /// `count` grasps approaching from evenly spaced directions.
    #[allow(clippy::cast_precision_loss)]
    pub fn around(robot_id: RobotId, manipulator_id: ManipulatorId, object: Transform, count: usize) -> Self {
        let grasps = (0..count)
            .map(|k| SideGrasp {
                approach: TAU * k as f64 / count as f64,
                opening: 0.08,
            })
            .collect();
        Self {
            robot_id,
            manipulator_id,
            object,
            contact_radius: 0.04,
            backoff: 0.02,
            grasps,
            screen: None,
        }
    }

    #[must_use]
    pub const fn with_contact(mut self, contact_radius: f64, backoff: f64) -> Self {
        self.contact_radius = contact_radius;
        self.backoff = backoff;
        self
    }

    /// Screen grasps against `screen` when enumerating valid ones.
    #[must_use]
    pub fn with_screen(mut self, screen: GraspScreen) -> Self {
        self.screen = Some(screen);
        self
    }

    pub const fn screen(&self) -> Option<&GraspScreen> {
        self.screen.as_ref()
    }

    /// Whether the gripper can slide the last `backup_dist` of its approach
    /// onto the contact point without touching an obstacle.
    pub fn approach_is_clear(&self, grasp: &SideGrasp, backup_dist: f64) -> bool {
        let Some(screen) = &self.screen else {
            return true;
        };
        let contact = self.global_grasp_transform(grasp, false);
        let backed = contact * Isometry3::translation(-backup_dist, 0.0, 0.0);
        let path = [planar(&backed), planar(&contact)];
        !screen.world.polyline_collides(&path, screen.gripper_radius)
    }

    /// Whether the contact point lies within the arm's reach of the shoulder.
    pub fn within_reach(&self, grasp: &SideGrasp) -> bool {
        let Some(screen) = &self.screen else {
            return true;
        };
        let contact = self.global_grasp_transform(grasp, false);
        (contact.translation.vector - screen.shoulder.coords).norm() <= screen.reach
    }

    pub const fn object(&self) -> &Transform {
        &self.object
    }

    pub fn grasps(&self) -> &[SideGrasp] {
        &self.grasps
    }
}

impl GraspModel for GraspCatalog {
    type Grasp = SideGrasp;

    fn robot_id(&self) -> RobotId {
        self.robot_id
    }

    fn manipulator_id(&self) -> ManipulatorId {
        self.manipulator_id
    }

    fn grasp_count(&self) -> usize {
        self.grasps.len()
    }

    fn grasp(&self, index: usize) -> Option<&SideGrasp> {
        self.grasps.get(index)
    }

    fn valid_grasp_indices<'a>(&'a self, filter: &GraspFilter) -> Box<dyn Iterator<Item = usize> + 'a> {
        let filter = *filter;
        Box::new(self.grasps.iter().enumerate().filter_map(move |(i, grasp)| {
            let valid = self.approach_is_clear(grasp, filter.backup_dist)
                && (!filter.check_ik || self.within_reach(grasp));
            valid.then_some(i)
        }))
    }

    fn global_grasp_transform(&self, grasp: &SideGrasp, collision_free: bool) -> Transform {
        let standoff = if collision_free {
            self.contact_radius + self.backoff
        } else {
            self.contact_radius
        };
        // The gripper x-axis points along the approach, towards the object.
        self.object
            * Isometry3::rotation(Vector3::z() * grasp.approach)
            * Isometry3::translation(-standoff, 0.0, 0.0)
    }

    fn preshape(&self, grasp: &SideGrasp) -> Vec<f64> {
        vec![grasp.opening]
    }
}

fn planar(transform: &Transform) -> Vector2<f64> {
    Vector2::new(transform.translation.x, transform.translation.y)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
