//! Cached kernel evaluation over one training set
//!
//! A `KernelEvaluator` is what a binary solver talks to while it trains: it
//! owns the LRU cache of off-diagonal entries, a lazily filled diagonal and the
//! evaluation counters reported once training has finished.

use crate::cache::KernelCache;
use crate::core::SparseVector;
use crate::kernel::Kernel;

/// Counters collected while a solver was training
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct KernelStats {
    /// Kernel function invocations
    pub evaluations: u64,
    /// Lookups answered from the cache or the diagonal
    pub cache_hits: u64,
}

pub struct KernelEvaluator<'a, K: Kernel> {
    kernel: &'a K,
    points: &'a [SparseVector],
    cache: Option<KernelCache>,
    diagonal: Vec<Option<f64>>,
    evaluations: u64,
    diagonal_hits: u64,
}

impl<'a, K: Kernel> KernelEvaluator<'a, K> {
    /// Bind the kernel to a training set; `cache_size == 0` disables the LRU cache
    pub fn build(kernel: &'a K, points: &'a [SparseVector], cache_size: usize) -> Self {
        Self {
            kernel,
            points,
            cache: (cache_size > 0).then(|| KernelCache::new(cache_size)),
            diagonal: vec![None; points.len()],
            evaluations: 0,
            diagonal_hits: 0,
        }
    }

    /// K(points[i], points[j])
    pub fn eval(&mut self, i: usize, j: usize) -> f64 {
        if i == j {
            if let Some(Some(value)) = self.diagonal.get(i) {
                self.diagonal_hits += 1;
                return *value;
            }
            let value = self.kernel.compute(&self.points[i], &self.points[i]);
            self.evaluations += 1;
            if let Some(slot) = self.diagonal.get_mut(i) {
                *slot = Some(value);
            }
            return value;
        }

        let kernel = self.kernel;
        let points = self.points;
        let evaluations = &mut self.evaluations;
        match self.cache.as_mut() {
            Some(cache) => cache.get_or_compute(i, j, || {
                *evaluations += 1;
                kernel.compute(&points[i], &points[j])
            }),
            None => {
                *evaluations += 1;
                kernel.compute(&points[i], &points[j])
            }
        }
    }

    /// K(x, points[j]) for an input that is not part of the training set; never cached
    pub fn eval_external(&mut self, x: &SparseVector, j: usize) -> f64 {
        self.evaluations += 1;
        self.kernel.compute(x, &self.points[j])
    }

    pub fn num_evals(&self) -> u64 {
        self.evaluations
    }

    pub fn num_cache_hits(&self) -> u64 {
        self.diagonal_hits + self.cache.as_ref().map_or(0, |c| c.stats().hits)
    }

    pub fn stats(&self) -> KernelStats {
        KernelStats {
            evaluations: self.num_evals(),
            cache_hits: self.num_cache_hits(),
        }
    }

    /// Release cached entries; counters survive so they can still be reported
    pub fn clean(&mut self) {
        let hits = self.num_cache_hits();
        if let Some(cache) = self.cache.as_mut() {
            cache.clear();
        }
        self.diagonal = Vec::new();
        self.diagonal_hits = hits;
    }
}
