//! Lazy enumeration of grasp end-effector targets for one model pair.

use std::fmt::Debug;

use basegrasp_core::config::GraspFilter;
use basegrasp_core::traits::{GraspModel, GraspTargets};
use basegrasp_core::types::{GraspId, GraspTarget, PairId};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// How a [`GraspCandidateSource`] enumerates grasps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraspSourceOptions {
    pub filter: GraspFilter,
    /// Shuffle the valid grasps instead of using catalog order.
    pub random_order: bool,
    /// Seed for the shuffle. Ignored in catalog order.
    pub seed: u64,
}

impl Default for GraspSourceOptions {
    fn default() -> Self {
        Self {
            filter: GraspFilter::default(),
            random_order: false,
            seed: 0,
        }
    }
}

/// Produces `(global grasp transform, grasp id)` pairs from a grasp model.
///
/// Targets use the collision-free (backed off) grasp transform. Transforms
/// are computed on demand; in random order only the index list is
/// materialized so it can be shuffled.
pub struct GraspCandidateSource<'a, G> {
    model: &'a dyn GraspModel<Grasp = G>,
    pair: PairId,
    options: GraspSourceOptions,
}

impl<'a, G: Clone + Debug + 'a> GraspCandidateSource<'a, G> {
    pub fn new(
        model: &'a dyn GraspModel<Grasp = G>,
        pair: PairId,
        options: GraspSourceOptions,
    ) -> Self {
        Self {
            model,
            pair,
            options,
        }
    }

    pub const fn pair(&self) -> PairId {
        self.pair
    }

    /// Start a fresh enumeration.
    pub fn targets(&self) -> GraspTargets<'a> {
        let model = self.model;
        let pair = self.pair;
        let indices = model.valid_grasp_indices(&self.options.filter);
        let indices: Box<dyn Iterator<Item = usize> + 'a> = if self.options.random_order {
            let mut shuffled: Vec<usize> = indices.collect();
            shuffled.shuffle(&mut ChaCha8Rng::seed_from_u64(self.options.seed));
            Box::new(shuffled.into_iter())
        } else {
            indices
        };
        Box::new(indices.filter_map(move |index| {
            let grasp = model.grasp(index)?;
            Some(GraspTarget {
                transform: model.global_grasp_transform(grasp, true),
                grasp: GraspId::new(pair, index),
            })
        }))
    }
}

impl<'a, G: Clone + Debug + 'a> IntoIterator for &GraspCandidateSource<'a, G> {
    type Item = GraspTarget;
    type IntoIter = GraspTargets<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.targets()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use basegrasp_test_utils::{MockGrasp, MockGraspModel};

    fn source(model: &MockGraspModel, options: GraspSourceOptions) -> GraspCandidateSource<'_, MockGrasp> {
        GraspCandidateSource::new(model, PairId(4), options)
    }

    #[test]
    fn catalog_order_is_deterministic() {
        let model = MockGraspModel::new(3);
        let targets: Vec<GraspTarget> = source(&model, GraspSourceOptions::default())
            .targets()
            .collect();
        let indices: Vec<usize> = targets.iter().map(|t| t.grasp.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(targets.iter().all(|t| t.grasp.pair == PairId(4)));
        assert_relative_eq!(targets[2].transform.translation.x, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn random_order_is_a_seeded_permutation() {
        let model = MockGraspModel::new(20);
        let options = GraspSourceOptions {
            random_order: true,
            seed: 5,
            ..GraspSourceOptions::default()
        };
        let a: Vec<usize> = source(&model, options).targets().map(|t| t.grasp.index).collect();
        let b: Vec<usize> = source(&model, options).targets().map(|t| t.grasp.index).collect();
        assert_eq!(a, b);
        assert_ne!(a, (0..20).collect::<Vec<_>>());

        let mut sorted = a;
        sorted.sort_unstable();
        assert_eq!(sorted, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn respects_valid_subset_and_skips_unknown_indices() {
        let model = MockGraspModel::new(3).with_valid(vec![2, 7, 0]);
        let src = source(&model, GraspSourceOptions::default());
        let indices: Vec<usize> = (&src).into_iter().map(|t| t.grasp.index).collect();
        assert_eq!(indices, vec![2, 0]);
    }

    #[test]
    fn ik_check_filter_drops_unreachable_grasps() {
        let model = MockGraspModel::new(4).with_unreachable(vec![1, 3]);
        let indices = |check_ik: bool| -> Vec<usize> {
            let options = GraspSourceOptions {
                filter: GraspFilter {
                    check_ik,
                    ..GraspFilter::default()
                },
                ..GraspSourceOptions::default()
            };
            source(&model, options).targets().map(|t| t.grasp.index).collect()
        };
        assert_eq!(indices(false), vec![0, 1, 2, 3]);
        assert_eq!(indices(true), vec![0, 2]);
    }

    #[test]
    fn empty_model_yields_nothing() {
        let model = MockGraspModel::new(0);
        assert_eq!(source(&model, GraspSourceOptions::default()).targets().count(), 0);
    }
}
