//! Combining several model pairs into one placement distribution.
//!
//! Each pair contributes a density and a sampler built by its reachability
//! model over that pair's grasp targets. The joint density is the sum of
//! the per-pair densities; the joint sampler picks one pair's sampler
//! uniformly at random per batch.

use std::fmt::Debug;

use basegrasp_core::config::SearchConfig;
use basegrasp_core::error::{CollaboratorError, PlacementError};
use basegrasp_core::seed::SeedHierarchy;
use basegrasp_core::traits::{PlacementDensity, PlacementSampler};
use basegrasp_core::types::{BaseSample, Bounds, PairId, RobotId, Transform};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::grasp_source::{GraspCandidateSource, GraspSourceOptions};
use crate::model_pair::{ModelPair, check_pairs};

// ---------------------------------------------------------------------------
// MixtureDensity
// ---------------------------------------------------------------------------

/// Additive mixture of per-pair densities. Evaluated on every call.
pub struct MixtureDensity<'a> {
    components: Vec<Box<dyn PlacementDensity + 'a>>,
}

impl<'a> MixtureDensity<'a> {
    pub const fn new(components: Vec<Box<dyn PlacementDensity + 'a>>) -> Self {
        Self { components }
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl PlacementDensity for MixtureDensity<'_> {
    fn density(&self, pose: &Transform) -> f64 {
        self.components.iter().map(|c| c.density(pose)).sum()
    }
}

// ---------------------------------------------------------------------------
// MixtureSampler
// ---------------------------------------------------------------------------

/// Delegates each batch to one component sampler chosen uniformly at random.
///
/// A component that returns an empty batch is dropped and another one is
/// tried, so an empty batch from the mixture means every component is spent.
pub struct MixtureSampler<'a> {
    components: Vec<Box<dyn PlacementSampler + 'a>>,
    rng: ChaCha8Rng,
}

impl<'a> MixtureSampler<'a> {
    pub const fn new(components: Vec<Box<dyn PlacementSampler + 'a>>, rng: ChaCha8Rng) -> Self {
        Self { components, rng }
    }

    /// Components that have not run dry yet.
    pub fn live_components(&self) -> usize {
        self.components.len()
    }
}

impl PlacementSampler for MixtureSampler<'_> {
    fn sample(&mut self, count: usize) -> Result<Vec<BaseSample>, CollaboratorError> {
        while !self.components.is_empty() {
            let slot = self.rng.gen_range(0..self.components.len());
            let batch = self.components[slot].sample(count)?;
            if !batch.is_empty() || count == 0 {
                return Ok(batch);
            }
            self.components.swap_remove(slot);
            debug!(remaining = self.components.len(), "mixture component exhausted");
        }
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// AggregateDistribution
// ---------------------------------------------------------------------------

/// Joint density, joint sampler and the union of all pairs' bounds.
pub struct AggregateDistribution<'a> {
    pub density: MixtureDensity<'a>,
    pub sampler: MixtureSampler<'a>,
    pub bounds: Bounds,
}

/// Options for [`combine`].
#[derive(Debug, Clone, Copy)]
pub struct CombineOptions<'c> {
    pub config: &'c SearchConfig,
    /// Session number used to derive the mixture RNG seed.
    pub session: u64,
}

impl<'c> CombineOptions<'c> {
    pub const fn new(config: &'c SearchConfig) -> Self {
        Self { config, session: 0 }
    }
}

/// Build the joint distribution over all `pairs`.
///
/// Every pair is checked against `robot` before any model is queried.
pub fn combine<'a, R, G: Clone + Debug + 'a>(
    robot: RobotId,
    pairs: &[ModelPair<'a, R, G>],
    options: CombineOptions<'_>,
) -> Result<AggregateDistribution<'a>, PlacementError> {
    check_pairs(robot, pairs)?;

    let config = options.config;
    let seeds = SeedHierarchy::new(config.seed);
    let mut densities: Vec<Box<dyn PlacementDensity + 'a>> = Vec::with_capacity(pairs.len());
    let mut samplers: Vec<Box<dyn PlacementSampler + 'a>> = Vec::with_capacity(pairs.len());
    let mut bounds: Option<Bounds> = None;

    for (i, pair) in pairs.iter().enumerate() {
        let source = GraspCandidateSource::new(
            pair.grasps,
            PairId(i),
            GraspSourceOptions {
                filter: config.grasp_filter,
                random_order: config.random_grasps,
                seed: seeds.source_seed(i),
            },
        );
        let distribution = pair
            .reachability
            .base_distribution(source.targets(), &config.distribution)?;
        debug!(pair = i, bounds = ?distribution.bounds, "built base distribution");

        bounds = Some(match bounds {
            Some(total) => total.union(&distribution.bounds)?,
            None => distribution.bounds,
        });
        densities.push(distribution.density);
        samplers.push(distribution.sampler);
    }

    let bounds = bounds.ok_or(PlacementError::EmptyModelSet)?;
    Ok(AggregateDistribution {
        density: MixtureDensity::new(densities),
        sampler: MixtureSampler::new(samplers, seeds.selection_rng(options.session)),
        bounds,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
