//! Lazy stream of validated placements.
//!
//! [`SearchStream`] is a pull-driven state machine: nothing is sampled or
//! validated until the consumer asks for the next element, and the robot
//! state mutated while searching is restored before every yielded element
//! and again when the stream is dropped.
//!
//! ```text
//!             ┌──────────── rejected ────────────┐
//!             ▼                                  │
//! ──► Sampling ──candidate──► Validating ──accepted──► Yielded ──next()──► Sampling
//!        │                       │
//!        │ no live sources       │ give-up time exceeded
//!        ▼                       ▼
//!    Exhausted               TimedOut
//! ```

use std::fmt::Debug;
use std::time::Duration;

use basegrasp_core::clock::{Clock, Stopwatch};
use basegrasp_core::error::PlacementError;
use basegrasp_core::traits::{BaseIter, Robot};
use basegrasp_core::types::{BaseSample, PairId, SolutionRecord};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::guard::StateGuard;
use crate::stats::SearchStats;
use crate::validator::{CandidateValidator, Outcome};

/// Observable phase of a [`SearchStream`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// Drawing the next candidate from a live source.
    Sampling,
    /// A candidate has been drawn and awaits validation.
    Validating,
    /// A solution was handed to the consumer.
    Yielded,
    /// Every source ran dry. Terminal.
    Exhausted,
    /// The give-up time elapsed without a solution. Terminal.
    TimedOut,
}

impl StreamState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Exhausted | Self::TimedOut)
    }
}

enum Step {
    Sampling,
    Validating(BaseSample),
    Yielded,
    Exhausted,
    TimedOut,
}

/// One pair's placement iterator.
pub(crate) struct LiveSource<'a> {
    pub(crate) pair: PairId,
    pub(crate) placements: BaseIter<'a>,
}

/// Infinite, validated stream of placement solutions.
///
/// Yields `Ok(record)` for every accepted candidate. Ends with exactly one
/// `Err(PlacementError::Exhausted)` once every source is spent, or one
/// `Err(PlacementError::SearchTimedOut)` when no candidate is accepted
/// within the give-up time; after either it returns `None`.
pub struct SearchStream<'r, 'a, R: Robot, G> {
    validator: CandidateValidator<'r, 'a, R, G>,
    guard: StateGuard<'r, R>,
    sources: Vec<LiveSource<'a>>,
    rng: ChaCha8Rng,
    clock: &'r dyn Clock,
    giveup: Stopwatch,
    classify_failures: bool,
    step: Step,
    stats: SearchStats,
}

impl<'r, 'a, R: Robot, G: Clone + Debug> SearchStream<'r, 'a, R, G> {
    pub(crate) fn new(
        validator: CandidateValidator<'r, 'a, R, G>,
        robot: &'r mut R,
        sources: Vec<LiveSource<'a>>,
        rng: ChaCha8Rng,
        clock: &'r dyn Clock,
        giveup: Option<Duration>,
        classify_failures: bool,
    ) -> Self {
        info!(sources = sources.len(), ?giveup, "starting placement stream");
        Self {
            validator,
            guard: StateGuard::new(robot),
            sources,
            rng,
            giveup: Stopwatch::start(clock, giveup),
            clock,
            classify_failures,
            step: Step::Sampling,
            stats: SearchStats::new(),
        }
    }

    pub const fn state(&self) -> StreamState {
        match self.step {
            Step::Sampling => StreamState::Sampling,
            Step::Validating(_) => StreamState::Validating,
            Step::Yielded => StreamState::Yielded,
            Step::Exhausted => StreamState::Exhausted,
            Step::TimedOut => StreamState::TimedOut,
        }
    }

    pub const fn stats(&self) -> &SearchStats {
        &self.stats
    }

    /// Sources that have not run dry yet.
    pub fn live_sources(&self) -> usize {
        self.sources.len()
    }

    /// Read-only view of the robot; between elements it is in its
    /// pre-search state.
    pub fn robot(&self) -> &R {
        &self.guard
    }

    fn timed_out(&mut self) -> PlacementError {
        let elapsed = self.giveup.elapsed(self.clock);
        let giveup = self.giveup.limit().unwrap_or(elapsed);
        warn!(?elapsed, ?giveup, candidates = self.stats.candidates, "placement stream timed out");
        self.guard.restore();
        self.step = Step::TimedOut;
        PlacementError::SearchTimedOut { elapsed, giveup }
    }
}

impl<R: Robot, G: Clone + Debug> Iterator for SearchStream<'_, '_, R, G> {
    type Item = Result<SolutionRecord<G>, PlacementError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.step, Step::Sampling) {
                Step::Exhausted => {
                    self.step = Step::Exhausted;
                    return None;
                }
                Step::TimedOut => {
                    self.step = Step::TimedOut;
                    return None;
                }
                Step::Yielded => {
                    // The consumer's time between pulls does not count.
                    self.guard.recapture();
                    self.giveup.reset(self.clock);
                }
                Step::Sampling => {
                    if self.sources.is_empty() {
                        warn!(candidates = self.stats.candidates, "all placement sources exhausted");
                        self.guard.restore();
                        self.step = Step::Exhausted;
                        return Some(Err(PlacementError::Exhausted));
                    }
                    let slot = self.rng.gen_range(0..self.sources.len());
                    match self.sources[slot].placements.next() {
                        Some(candidate) => self.step = Step::Validating(candidate),
                        None => {
                            let spent = self.sources.swap_remove(slot);
                            self.stats.exhausted_sources += 1;
                            debug!(pair = %spent.pair, remaining = self.sources.len(), "placement source exhausted");
                        }
                    }
                }
                Step::Validating(candidate) => {
                    let outcome =
                        self.validator
                            .validate(&mut self.guard, &candidate, self.classify_failures);
                    self.stats.record(&outcome);
                    if self.giveup.expired(self.clock) {
                        return Some(Err(self.timed_out()));
                    }
                    match outcome {
                        Outcome::Accepted(record) => {
                            self.guard.restore();
                            self.step = Step::Yielded;
                            info!(grasp = %record.grasp_id, candidates = self.stats.candidates, "found placement");
                            return Some(Ok(record));
                        }
                        rejected => {
                            debug!(grasp = %candidate.grasp, outcome = ?OutcomeKind::from(&rejected), "candidate rejected");
                        }
                    }
                }
            }
        }
    }
}

impl<R: Robot, G> Drop for SearchStream<'_, '_, R, G> {
    fn drop(&mut self) {
        debug!(
            candidates = self.stats.candidates,
            accepted = self.stats.accepted,
            "placement stream closed"
        );
    }
}

/// Outcome without the payload, for logging.
#[derive(Debug)]
enum OutcomeKind {
    Accepted,
    Soft(crate::validator::SoftReason),
    Hard(crate::validator::HardReason),
}

impl<G> From<&Outcome<G>> for OutcomeKind {
    fn from(outcome: &Outcome<G>) -> Self {
        match outcome {
            Outcome::Accepted(_) => Self::Accepted,
            Outcome::SoftReject(reason) => Self::Soft(*reason),
            Outcome::HardReject(reason) => Self::Hard(reason.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
