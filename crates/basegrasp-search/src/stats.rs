//! Search statistics.
//!
//! [`SearchStats`] tallies validation outcomes over one search call.

use crate::validator::{HardReason, Outcome, SoftReason};

/// Counters over every candidate a search validated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    /// Candidates validated.
    pub candidates: u64,
    /// Candidates accepted as solutions.
    pub accepted: u64,
    /// Base poses in collision.
    pub collisions: u64,
    /// Candidates referring to unknown grasps or ill-fitting joint states.
    pub invalid: u64,
    /// Candidates dropped because a collaborator errored.
    pub collaborator_errors: u64,
    /// IK failed with and without environment checking.
    pub unreachable: u64,
    /// IK only failed because of the environment.
    pub obstructed: u64,
    /// IK failed and was not classified further.
    pub unclassified: u64,
    /// Placement sources that ran dry.
    pub exhausted_sources: u64,
}

impl SearchStats {
    pub const fn new() -> Self {
        Self {
            candidates: 0,
            accepted: 0,
            collisions: 0,
            invalid: 0,
            collaborator_errors: 0,
            unreachable: 0,
            obstructed: 0,
            unclassified: 0,
            exhausted_sources: 0,
        }
    }

    pub fn record<G>(&mut self, outcome: &Outcome<G>) {
        self.candidates += 1;
        match outcome {
            Outcome::Accepted(_) => self.accepted += 1,
            Outcome::SoftReject(SoftReason::Unreachable) => self.unreachable += 1,
            Outcome::SoftReject(SoftReason::Obstructed) => self.obstructed += 1,
            Outcome::SoftReject(SoftReason::Unclassified) => self.unclassified += 1,
            Outcome::HardReject(HardReason::Collision) => self.collisions += 1,
            Outcome::HardReject(HardReason::InvalidCandidate) => self.invalid += 1,
            Outcome::HardReject(HardReason::Collaborator(_)) => self.collaborator_errors += 1,
        }
    }

    /// Numeric failures: candidates whose base pose could not reach the
    /// grasp at all.
    pub const fn failure_count(&self) -> u64 {
        self.unreachable
    }

    /// Fraction of validated candidates that were accepted.
    pub fn acceptance_rate(&self) -> Option<f64> {
        if self.candidates == 0 {
            return None;
        }
        #[allow(clippy::cast_precision_loss)]
        Some(self.accepted as f64 / self.candidates as f64)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
