//! Seeded randomness for reproducible tests.

use std::f64::consts::PI;

use basegrasp_core::types::{BaseSample, GraspId, JointState, PlanarPose, Transform};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// `ChaCha8Rng` seeded from `seed`. Route test randomness through here.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Ground-plane pose with `x`, `y` in `[-half_extent, half_extent)` and a
/// heading in `[-pi, pi)`.
pub fn random_base_pose(rng: &mut impl Rng, half_extent: f64) -> Transform {
    PlanarPose::new(
        rng.gen_range(-half_extent..half_extent),
        rng.gen_range(-half_extent..half_extent),
        rng.gen_range(-PI..PI),
    )
    .to_transform(0.0)
}

/// `count` candidates for `grasp` scattered over a square of side
/// `2 * half_extent`, each carrying an empty partial joint state.
pub fn scattered_samples(count: usize, grasp: GraspId, half_extent: f64, seed: u64) -> Vec<BaseSample> {
    let mut rng = seeded_rng(seed);
    (0..count)
        .map(|_| BaseSample {
            pose: random_base_pose(&mut rng, half_extent),
            grasp,
            joint_state: JointState::partial(Vec::new(), Vec::new()),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
