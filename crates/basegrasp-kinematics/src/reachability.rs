//! Ring-shaped inverse reachability.
//!
//! For a planar arm mounted at the base origin, a grasp target is reachable
//! from base positions on an annulus around it. [`RingReachabilityModel`]
//! scores a base pose by how close its distance to the target is to the
//! middle of the annulus and by how directly the base faces the target:
//!
//! ```text
//! log l = -weight/2 * z^2 - e^2 / (2 s^2)
//! z = (r - mid) / half_width,  e = heading error,  s = heading_spread
//! ```
//!
//! Placements whose radial term falls below `-log_likelihood_threshold`
//! are never proposed.

use std::f64::consts::{PI, TAU};

use basegrasp_core::config::DistributionOptions;
use basegrasp_core::error::CollaboratorError;
use basegrasp_core::traits::{BaseDistribution, BaseIter, GraspTargets, PlacementSampler, ReachabilityModel};
use basegrasp_core::types::{BaseSample, Bounds, GraspTarget, JointState, ManipulatorId, PlanarPose, RobotId, Transform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Shape of the reachable annulus and its discretization.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingParams {
    /// Inner radius of the annulus (m).
    pub inner: f64,
    /// Outer radius of the annulus (m).
    pub outer: f64,
    /// Standard deviation of the heading error (rad).
    pub heading_spread: f64,
    /// Radii per target in ordered enumeration.
    pub radial_steps: usize,
    /// Directions per radius in ordered enumeration.
    pub angle_steps: usize,
}

impl Default for RingParams {
    fn default() -> Self {
        Self {
            inner: 0.35,
            outer: 0.85,
            heading_spread: 0.25,
            radial_steps: 3,
            angle_steps: 12,
        }
    }
}

impl RingParams {
    fn mid(&self) -> f64 {
        0.5 * (self.inner + self.outer)
    }

    fn half_width(&self) -> f64 {
        0.5 * (self.outer - self.inner)
    }

    /// Largest |z| whose radial term passes the threshold.
    fn max_offset(&self, options: &DistributionOptions) -> f64 {
        (2.0 * options.log_likelihood_threshold / options.weight)
            .sqrt()
            .min(1.0)
    }

    /// Candidates proposed per target.
    pub const fn per_target(&self) -> usize {
        self.radial_steps * self.angle_steps
    }
}

/// Wrap an angle into `[-pi, pi)`.
pub fn wrap_angle(angle: f64) -> f64 {
    (angle + PI).rem_euclid(TAU) - PI
}

/// Base pose at polar offset (`radius`, `direction`) from `target`,
/// turned towards it and then by `heading_error`.
fn facing_pose(target: &GraspTarget, radius: f64, direction: f64, heading_error: f64) -> Transform {
    let t = target.transform.translation;
    let x = t.x + radius * direction.cos();
    let y = t.y + radius * direction.sin();
    PlanarPose::new(x, y, wrap_angle(direction + PI + heading_error)).to_transform(0.0)
}

/// Log-likelihood of `pose` for one target, `None` outside the annulus or
/// below the threshold.
fn log_likelihood(params: &RingParams, options: &DistributionOptions, target: &GraspTarget, pose: &Transform) -> Option<f64> {
    let base = PlanarPose::from_transform(pose);
    let t = target.transform.translation;
    let (dx, dy) = (t.x - base.x, t.y - base.y);
    let r = dx.hypot(dy);
    if r < params.inner || r > params.outer {
        return None;
    }
    let z = (r - params.mid()) / params.half_width();
    let radial = -0.5 * options.weight * z * z;
    if radial < -options.log_likelihood_threshold {
        return None;
    }
    let e = wrap_angle(dy.atan2(dx) - base.heading);
    Some(radial - e * e / (2.0 * params.heading_spread * params.heading_spread))
}

// ---------------------------------------------------------------------------
// RingReachabilityModel
// ---------------------------------------------------------------------------

/// Inverse reachability model of a planar arm on a mobile base.
#[derive(Debug, Clone)]
pub struct RingReachabilityModel {
    robot_id: RobotId,
    manipulator_id: ManipulatorId,
    params: RingParams,
    joint_state: JointState,
    seed: u64,
}

impl RingReachabilityModel {
    pub fn new(robot_id: RobotId, manipulator_id: ManipulatorId, params: RingParams) -> Self {
        Self {
            robot_id,
            manipulator_id,
            params,
            joint_state: JointState::partial(Vec::new(), Vec::new()),
            seed: 0,
        }
    }

    /// Joint state proposed with every placement.
    #[must_use]
    pub fn with_joint_state(mut self, state: JointState) -> Self {
        self.joint_state = state;
        self
    }

    /// Seed of the random placement iterators.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub const fn params(&self) -> &RingParams {
        &self.params
    }

    fn candidate(&self, target: &GraspTarget, pose: Transform) -> BaseSample {
        BaseSample {
            pose,
            grasp: target.grasp,
            joint_state: self.joint_state.clone(),
        }
    }

    /// Ordered radial offsets: the ring middle first, then alternating
    /// outwards and inwards, strictly inside the admissible band.
    #[allow(clippy::cast_precision_loss)]
    fn radial_offsets(&self, options: &DistributionOptions) -> Vec<f64> {
        let steps = self.params.radial_steps;
        if steps <= 1 {
            return vec![0.0; steps];
        }
        let max = self.params.max_offset(options);
        let pairs = steps / 2;
        let step = max / (pairs as f64 + 1.0);
        let mut offsets = vec![0.0];
        for k in 1..=pairs {
            offsets.push(k as f64 * step);
            offsets.push(-(k as f64) * step);
        }
        offsets.truncate(steps);
        offsets
    }
}

impl ReachabilityModel for RingReachabilityModel {
    fn robot_id(&self) -> RobotId {
        self.robot_id
    }

    fn manipulator_id(&self) -> ManipulatorId {
        self.manipulator_id
    }

    fn base_distribution<'a>(
        &'a self,
        targets: GraspTargets<'a>,
        options: &DistributionOptions,
    ) -> Result<BaseDistribution<'a>, CollaboratorError> {
        let targets: Vec<GraspTarget> = targets.collect();
        if targets.is_empty() {
            return Err(CollaboratorError::Distribution("no grasp targets".into()));
        }

        let outer = self.params.outer;
        let mut lower = vec![f64::INFINITY, f64::INFINITY, -PI];
        let mut upper = vec![f64::NEG_INFINITY, f64::NEG_INFINITY, PI];
        for target in &targets {
            let t = target.transform.translation;
            lower[0] = lower[0].min(t.x - outer);
            lower[1] = lower[1].min(t.y - outer);
            upper[0] = upper[0].max(t.x + outer);
            upper[1] = upper[1].max(t.y + outer);
        }
        let bounds = Bounds::new(lower, upper).map_err(|e| CollaboratorError::Distribution(e.to_string()))?;
        debug!(targets = targets.len(), ?bounds, "ring base distribution");

        let density_targets = targets.clone();
        let params = self.params;
        let density_options = *options;
        let density = move |pose: &Transform| -> f64 {
            density_targets
                .iter()
                .filter_map(|t| log_likelihood(&params, &density_options, t, pose))
                .map(f64::exp)
                .sum()
        };

        Ok(BaseDistribution {
            density: Box::new(density),
            sampler: Box::new(RingSampler {
                model: self,
                targets,
                options: *options,
                rng: ChaCha8Rng::seed_from_u64(self.seed),
            }),
            bounds,
        })
    }

    fn sample_base_iter<'a>(&'a self, targets: GraspTargets<'a>, options: &DistributionOptions) -> BaseIter<'a> {
        let params = self.params;
        let offsets = self.radial_offsets(options);
        Box::new(targets.flat_map(move |target| {
            let radii: Vec<f64> = offsets
                .iter()
                .map(|z| params.mid() + z * params.half_width())
                .collect();
            radii.into_iter().flat_map(move |radius| {
                let target = target.clone();
                (0..params.angle_steps).map(move |k| {
                    #[allow(clippy::cast_precision_loss)]
                    let direction = TAU * k as f64 / params.angle_steps as f64;
                    self.candidate(&target, facing_pose(&target, radius, direction, 0.0))
                })
            })
        }))
    }

    fn random_base_iter<'a>(&'a self, targets: GraspTargets<'a>, options: &DistributionOptions) -> BaseIter<'a> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let options = *options;
        Box::new(targets.flat_map(move |target| {
            let draws: Vec<BaseSample> = (0..self.params.per_target())
                .map(|_| self.draw(&target, &options, &mut rng))
                .collect();
            draws
        }))
    }
}

impl RingReachabilityModel {
    /// One random placement for `target`.
    fn draw(&self, target: &GraspTarget, options: &DistributionOptions, rng: &mut ChaCha8Rng) -> BaseSample {
        let max = self.params.max_offset(options);
        let z: f64 = rng.sample::<f64, _>(StandardNormal) / options.weight.sqrt();
        let radius = self.params.mid() + z.clamp(-max, max) * self.params.half_width();
        let direction = rng.gen_range(0.0..TAU);
        let heading_error = rng.sample::<f64, _>(StandardNormal) * self.params.heading_spread;
        self.candidate(target, facing_pose(target, radius, direction, heading_error))
    }
}

// ---------------------------------------------------------------------------
// RingSampler
// ---------------------------------------------------------------------------

/// Endless sampler over the annuli of a fixed set of targets.
pub struct RingSampler<'a> {
    model: &'a RingReachabilityModel,
    targets: Vec<GraspTarget>,
    options: DistributionOptions,
    rng: ChaCha8Rng,
}

impl PlacementSampler for RingSampler<'_> {
    fn sample(&mut self, count: usize) -> Result<Vec<BaseSample>, CollaboratorError> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            let target = &self.targets[self.rng.gen_range(0..self.targets.len())];
            out.push(self.model.draw(target, &self.options, &mut self.rng));
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
