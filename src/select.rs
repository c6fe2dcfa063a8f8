//! Choosing which elements survive subsampling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{Error, Result};

/// Decides which of `count` elements to keep.
pub trait Selector {
    /// One entry per element, `true` to keep it.
    fn select(&mut self, count: usize) -> Vec<bool>;

    /// Element to keep when `select` kept nothing. `count` is never zero.
    fn fallback(&mut self, _count: usize) -> usize {
        0
    }
}

impl<F: FnMut(usize) -> Vec<bool>> Selector for F {
    fn select(&mut self, count: usize) -> Vec<bool> {
        self(count)
    }
}

/// Keeps each element independently with probability `rate`.
#[derive(Debug, Clone)]
pub struct RateSelector {
    rate: f32,
    rng: StdRng,
}

impl RateSelector {
    /// Seeded runs are reproducible; `None` draws a seed from the OS.
    pub fn new(rate: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self { rate, rng }
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }
}

impl Selector for RateSelector {
    fn select(&mut self, count: usize) -> Vec<bool> {
        (0..count)
            .map(|_| self.rng.random::<f32>() < self.rate)
            .collect()
    }

    fn fallback(&mut self, count: usize) -> usize {
        self.rng.random_range(0..count)
    }
}

/// Runs `selector` and guarantees at least one kept element.
pub fn retained_mask<S: Selector + ?Sized>(selector: &mut S, count: usize) -> Result<Vec<bool>> {
    if count == 0 {
        return Err(Error::EmptyResultSet);
    }
    let mut mask = selector.select(count);
    if mask.len() != count {
        return Err(Error::SelectionLength {
            expected: count,
            actual: mask.len(),
        });
    }
    if !mask.contains(&true) {
        let forced = selector.fallback(count).min(count - 1);
        tracing::warn!(count, forced, "selection kept nothing, forcing one element");
        mask[forced] = true;
    }
    Ok(mask)
}
