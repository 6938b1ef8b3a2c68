//! Random-start, linear-probe label allocator.
//!
//! A heuristic, not an optimal allocator: each round picks a uniformly random
//! candidate in `[0, MAX]` and probes forward up to `window` labels (stopping
//! at `MAX`) for a free one. After `rounds` unsuccessful rounds the
//! allocation fails even if free labels exist elsewhere in the space.

use super::{LabelAllocError, LabelAllocator};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use sdwan_types::MplsLabel;
use std::collections::HashSet;
use tracing::debug;

struct ProbeState {
    in_use: HashSet<MplsLabel>,
    rng: Box<dyn RngCore + Send>,
}

/// Random-probe allocator guarded by a single mutex.
pub struct RandomProbeAllocator {
    state: Mutex<ProbeState>,
    rounds: u32,
    window: u32,
}

impl RandomProbeAllocator {
    /// Default number of random restarts.
    pub const DEFAULT_ROUNDS: u32 = 3;

    /// Default number of labels probed past each random candidate.
    pub const DEFAULT_WINDOW: u32 = 10;

    /// Creates an allocator seeded from OS entropy.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates an allocator drawing candidates from `rng`.
    pub fn with_rng(rng: impl RngCore + Send + 'static) -> Self {
        Self {
            state: Mutex::new(ProbeState {
                in_use: HashSet::new(),
                rng: Box::new(rng),
            }),
            rounds: Self::DEFAULT_ROUNDS,
            window: Self::DEFAULT_WINDOW,
        }
    }

    /// Overrides the restart and probe limits.
    pub fn with_limits(mut self, rounds: u32, window: u32) -> Self {
        self.rounds = rounds;
        self.window = window;
        self
    }

    pub fn rounds(&self) -> u32 {
        self.rounds
    }

    pub fn window(&self) -> u32 {
        self.window
    }
}

impl Default for RandomProbeAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for RandomProbeAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomProbeAllocator")
            .field("in_use", &self.allocated_count())
            .field("rounds", &self.rounds)
            .field("window", &self.window)
            .finish()
    }
}

/// Returns the first label in `candidate..=candidate + window` (clamped to
/// `MplsLabel::MAX`) that is not in use.
fn probe(in_use: &HashSet<MplsLabel>, candidate: u32, window: u32) -> Option<MplsLabel> {
    let last = candidate.saturating_add(window).min(MplsLabel::MAX);
    (candidate..=last)
        .filter_map(|raw| MplsLabel::new(raw).ok())
        .find(|label| !in_use.contains(label))
}

impl LabelAllocator for RandomProbeAllocator {
    fn allocate(&self) -> Result<MplsLabel, LabelAllocError> {
        let mut state = self.state.lock();

        for round in 0..self.rounds {
            let candidate = state.rng.gen_range(MplsLabel::MIN..=MplsLabel::MAX);
            if let Some(label) = probe(&state.in_use, candidate, self.window) {
                state.in_use.insert(label);
                debug!(%label, candidate, round, "Allocated transport label");
                return Ok(label);
            }
            debug!(candidate, round, "Probe window fully in use, restarting");
        }

        Err(LabelAllocError::Exhausted {
            rounds: self.rounds,
        })
    }

    fn release(&self, label: MplsLabel) -> bool {
        let released = self.state.lock().in_use.remove(&label);
        if released {
            debug!(%label, "Released transport label");
        }
        released
    }

    fn is_allocated(&self, label: MplsLabel) -> bool {
        self.state.lock().in_use.contains(&label)
    }

    fn allocated_count(&self) -> usize {
        self.state.lock().in_use.len()
    }

    fn clear(&self) {
        self.state.lock().in_use.clear();
    }
}
