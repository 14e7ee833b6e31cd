//! Chunked random-trial search shared by the optimizer and the frontier sampler.
//!
//! Trials are split into fixed-size chunks. Each chunk owns an RNG seeded from
//! `(seed, stream, chunk index)`, so a run is reproducible for a given seed no
//! matter how rayon schedules the chunks. Chunks fold to their best trial and
//! the per-chunk winners are reduced by score, ties going to the lower trial
//! index.

use crate::error::PortfolioError;
use crate::metrics::WeightVector;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::time::{Duration, Instant};

/// Trials drawn from one RNG before the stop conditions are re-checked.
pub const TRIALS_PER_CHUNK: usize = 256;

/// Cooperative cancellation flag shared between a caller and running searches.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

/// Stop conditions for one search call.
#[derive(Clone, Debug, Default)]
pub struct SearchControl {
    deadline: Option<Instant>,
    cancel: Option<CancellationToken>,
}

impl SearchControl {
    pub fn new(budget: Option<Duration>, cancel: Option<CancellationToken>) -> Self {
        Self {
            deadline: budget.map(|d| Instant::now() + d),
            cancel,
        }
    }

    pub fn should_stop(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
            || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }

    /// The error for a search that stopped before yielding a candidate.
    /// Cancellation wins over an expired deadline.
    pub fn stop_error(&self) -> PortfolioError {
        if self.is_cancelled() {
            PortfolioError::Cancelled
        } else {
            PortfolioError::DeadlineExceeded
        }
    }
}

/// A candidate that won a search, tagged with the trial that produced it.
#[derive(Clone, Debug)]
pub struct Trial<T> {
    pub index: usize,
    pub value: T,
}

#[derive(Clone, Debug)]
pub struct SearchOutcome<T> {
    pub best: Option<Trial<T>>,
    /// Trials actually drawn; below the budget when stopped early.
    pub evaluated: usize,
}

/// Draws a weight vector from independent uniform [0, 1) entries normalized
/// by their sum: non-negative and summing to one.
pub fn sample_weights<R: Rng + ?Sized>(num_assets: usize, rng: &mut R) -> WeightVector {
    let raw: Vec<f64> = (0..num_assets).map(|_| rng.gen_range(0.0..1.0)).collect();
    let sum: f64 = raw.iter().sum();
    if sum > 0.0 {
        raw.iter().map(|v| v / sum).collect()
    } else {
        vec![1.0 / num_assets as f64; num_assets]
    }
}

/// Mixes a base seed with a stream id and chunk index (splitmix64 finalizer).
pub fn derive_seed(seed: u64, stream: u64, chunk: u64) -> u64 {
    let mut z = seed
        ^ stream.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ chunk.wrapping_mul(0xD1B5_4A32_D192_ED03);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Runs `iterations` trials and keeps the one with the highest `score`.
///
/// `trial` returns `None` for rejected candidates. NaN scores rank below every
/// number.
pub fn run<T, F, S>(
    iterations: usize,
    seed: u64,
    stream: u64,
    control: &SearchControl,
    trial: F,
    score: S,
) -> SearchOutcome<T>
where
    T: Send,
    F: Fn(&mut StdRng) -> Option<T> + Sync,
    S: Fn(&T) -> f64 + Sync,
{
    let num_chunks = iterations.div_ceil(TRIALS_PER_CHUNK);

    let rank = |a: &Trial<T>, b: &Trial<T>| -> Ordering {
        let sa = nan_to_floor(score(&a.value));
        let sb = nan_to_floor(score(&b.value));
        sa.total_cmp(&sb).then_with(|| b.index.cmp(&a.index))
    };

    let (best, evaluated) = (0..num_chunks)
        .into_par_iter()
        .map(|chunk| {
            if control.should_stop() {
                return (None, 0);
            }
            let mut rng = StdRng::seed_from_u64(derive_seed(seed, stream, chunk as u64));
            let start = chunk * TRIALS_PER_CHUNK;
            let end = (start + TRIALS_PER_CHUNK).min(iterations);

            let mut best: Option<Trial<T>> = None;
            for index in start..end {
                let Some(value) = trial(&mut rng) else {
                    continue;
                };
                let candidate = Trial { index, value };
                best = match best {
                    Some(current) if rank(&candidate, &current) != Ordering::Greater => Some(current),
                    _ => Some(candidate),
                };
            }
            (best, end - start)
        })
        .reduce(
            || (None, 0),
            |(a, na), (b, nb)| {
                let best = match (a, b) {
                    (Some(a), Some(b)) => {
                        if rank(&b, &a) == Ordering::Greater {
                            Some(b)
                        } else {
                            Some(a)
                        }
                    }
                    (a, None) => a,
                    (None, b) => b,
                };
                (best, na + nb)
            },
        );

    SearchOutcome { best, evaluated }
}

fn nan_to_floor(v: f64) -> f64 {
    if v.is_nan() { f64::NEG_INFINITY } else { v }
}
