//! Deterministic seed hierarchy for reproducible searches.
//!
//! [`SeedHierarchy`] derives every random stream of a search from one root
//! seed:
//!
//! ```text
//! Root seed
//! ├── Source seed (per model pair: grasp shuffling)
//! └── Session seed (per search call)
//!     └── Selection seed (live-source / mixture component choice)
//! ```
//!
//! Child seeds are derived by hashing, so the same configuration and the
//! same collaborators always produce the same candidate sequence.

use std::hash::{DefaultHasher, Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derive a child seed from a parent seed and a string key.
///
/// # Example
///
/// ```
/// use basegrasp_core::seed::derive_seed;
///
/// let child = derive_seed(42, "selection");
/// assert_ne!(child, 42);
/// assert_eq!(child, derive_seed(42, "selection"));
/// ```
#[must_use]
pub fn derive_seed(parent: u64, key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    parent.hash(&mut hasher);
    key.hash(&mut hasher);
    hasher.finish()
}

/// Derive a child seed from a parent seed and a numeric index.
#[must_use]
pub fn derive_seed_indexed(parent: u64, index: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    parent.hash(&mut hasher);
    index.hash(&mut hasher);
    hasher.finish()
}

/// Hierarchical seed manager for placement searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedHierarchy {
    root: u64,
}

impl SeedHierarchy {
    #[must_use]
    pub const fn new(root: u64) -> Self {
        Self { root }
    }

    #[must_use]
    pub const fn root(&self) -> u64 {
        self.root
    }

    /// Seed for the grasp ordering of one model pair.
    #[must_use]
    pub fn source_seed(&self, pair_index: usize) -> u64 {
        derive_seed_indexed(derive_seed(self.root, "source"), pair_index as u64)
    }

    /// Seed for one search call.
    #[must_use]
    pub fn session_seed(&self, session: u64) -> u64 {
        derive_seed_indexed(derive_seed(self.root, "session"), session)
    }

    /// Seed for choosing among live sources or mixture components.
    #[must_use]
    pub fn selection_seed(&self, session: u64) -> u64 {
        derive_seed(self.session_seed(session), "selection")
    }

    #[must_use]
    pub fn selection_rng(&self, session: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.selection_seed(session))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
