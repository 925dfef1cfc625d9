//! Reviewer selection.
//!
//! Selection is a uniform random pick without replacement. The random source
//! is injected so callers can seed it for reproducible assignments.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Shuffle `candidates` and keep the first `min(count, len)` of them.
pub fn pick_random<T: Clone, R: Rng + ?Sized>(rng: &mut R, candidates: &[T], count: usize) -> Vec<T> {
    if candidates.is_empty() || count == 0 {
        return Vec::new();
    }
    let mut shuffled = candidates.to_vec();
    shuffled.shuffle(rng);
    shuffled.truncate(count);
    shuffled
}

/// Owns the random source shared by concurrent service calls.
pub struct AssignmentEngine<R = StdRng> {
    rng: Mutex<R>,
}

impl AssignmentEngine<StdRng> {
    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> AssignmentEngine<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn pick_random<T: Clone>(&self, candidates: &[T], count: usize) -> Vec<T> {
        // A panic while holding the lock cannot leave the RNG in a broken state.
        let mut rng = self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        pick_random(&mut *rng, candidates, count)
    }
}
