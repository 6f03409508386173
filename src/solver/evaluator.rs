//! Kernel evaluation between exemplars, backed by the kernel cache

use crate::cache::{CacheQuery, CacheStats, KernelCache};
use crate::core::Dataset;
use crate::kernel::Kernel;

/// Evaluates K(x_i, x_j) for exemplar indices, serving diagonal values
/// from a precomputed table and off-diagonal values through `KernelCache`.
pub struct CachedKernel<'a, D: Dataset + ?Sized> {
    data: &'a D,
    kernel: Kernel,
    aux: f64,
    kii: Vec<f64>,
    cache: KernelCache,
    evaluations: u64,
}

impl<'a, D: Dataset + ?Sized> CachedKernel<'a, D> {
    pub fn new(data: &'a D, kernel: Kernel, aux: f64, cache_size: usize) -> Self {
        let n = data.len();
        let kii = (0..n)
            .map(|i| kernel.compute(data.x(i), data.x(i), aux))
            .collect();
        Self {
            data,
            kernel,
            aux,
            kii,
            cache: KernelCache::new(n, cache_size),
            evaluations: n as u64,
        }
    }

    /// K(i, j)
    pub fn eval(&mut self, i: usize, j: usize) -> f64 {
        if i == j {
            return self.kii[i];
        }
        match self.cache.query(i, j) {
            CacheQuery::Hit => match self.cache.access(i, j) {
                Some(value) => value,
                None => self.compute(i, j),
            },
            CacheQuery::Miss => {
                let value = self.compute(i, j);
                self.cache.insert(i, j, value);
                value
            }
            CacheQuery::NotCacheable => self.compute(i, j),
        }
    }

    /// K(i, i)
    pub fn diag(&self, i: usize) -> f64 {
        self.kii[i]
    }

    /// Direct evaluation, bypassing the cache
    pub fn compute(&mut self, i: usize, j: usize) -> f64 {
        self.evaluations += 1;
        self.kernel
            .compute(self.data.x(i), self.data.x(j), self.aux)
    }

    pub fn cache(&self) -> &KernelCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut KernelCache {
        &mut self.cache
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Kernel function evaluations performed so far, diagonal included
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }
}
