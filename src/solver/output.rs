//! Decision-value bookkeeping for every exemplar
//!
//! Outputs are tracked without the bias term, `u_i = Σ_j β_j K(i, j)`,
//! so a bias change never stales them. Each value carries the logical time
//! of its last refresh. A stale value is brought up to date either by
//! replaying the multiplier changes recorded since then, or by summing over
//! the whole non-zero set, whichever needs fewer kernel evaluations.

use crate::solver::membership::MembershipList;
use std::collections::VecDeque;

/// One accepted pairwise step: coefficient changes of both exemplars
#[derive(Debug, Clone, Copy)]
struct StepEvent {
    i1: usize,
    d1: f64,
    i2: usize,
    d2: f64,
}

/// Counters describing how outputs were served
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputStats {
    /// Served from an up-to-date value
    pub memoized: u64,
    /// Rebuilt by replaying recent steps
    pub incremental: u64,
    /// Rebuilt by a full resummation
    pub full: u64,
}

#[derive(Debug, Clone)]
pub struct OutputTracker {
    out: Vec<f64>,
    update_time: Vec<u64>,
    time: u64,
    history: Option<VecDeque<StepEvent>>,
    history_len: usize,
    stats: OutputStats,
}

impl OutputTracker {
    /// Tracker for `n` exemplars whose multipliers all start at zero.
    /// With `replay` set, the last `n` steps are kept for incremental
    /// reconstruction.
    pub fn new(n: usize, replay: bool) -> Self {
        Self {
            out: vec![0.0; n],
            update_time: vec![0; n],
            time: 0,
            history: replay.then(|| VecDeque::with_capacity(n.max(1))),
            history_len: n.max(1),
            stats: OutputStats::default(),
        }
    }

    /// Logical time: number of recorded steps
    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn is_fresh(&self, i: usize) -> bool {
        self.update_time[i] == self.time
    }

    pub fn stats(&self) -> OutputStats {
        self.stats
    }

    /// Record an accepted step. Every output becomes stale until refreshed
    /// by `propagate` or `output`.
    pub fn record_step(&mut self, i1: usize, d1: f64, i2: usize, d2: f64) {
        self.time += 1;
        if let Some(history) = self.history.as_mut() {
            if history.len() == self.history_len {
                history.pop_front();
            }
            history.push_back(StepEvent { i1, d1, i2, d2 });
        }
    }

    /// Apply the change caused by the latest step to an output that was up
    /// to date before it. Returns false (leaving the value stale) otherwise.
    pub fn propagate(&mut self, i: usize, delta: f64) -> bool {
        if self.time == 0 || self.update_time[i] != self.time - 1 {
            return false;
        }
        self.out[i] += delta;
        self.update_time[i] = self.time;
        true
    }

    /// Current bias-free output of exemplar `i`.
    ///
    /// `coef` holds the signed coefficients β, `nonzero` the exemplars with
    /// β ≠ 0 and `kernel(i, j)` evaluates K between two exemplars.
    pub fn output<F>(
        &mut self,
        i: usize,
        nonzero: &MembershipList,
        coef: &[f64],
        kernel: &mut F,
    ) -> f64
    where
        F: FnMut(usize, usize) -> f64,
    {
        if self.update_time[i] == self.time {
            self.stats.memoized += 1;
            return self.out[i];
        }

        let age = (self.time - self.update_time[i]) as usize;
        let replayable = self
            .history
            .as_ref()
            .map_or(false, |h| age <= h.len() && 2 * age < nonzero.len());

        let value = match self.history.as_ref() {
            Some(history) if replayable => {
                self.stats.incremental += 1;
                let start = history.len() - age;
                history.range(start..).fold(self.out[i], |acc, e| {
                    acc + e.d1 * kernel(i, e.i1) + e.d2 * kernel(i, e.i2)
                })
            }
            _ => {
                self.stats.full += 1;
                nonzero.iter().map(|j| coef[j] * kernel(i, j)).sum()
            }
        };

        self.out[i] = value;
        self.update_time[i] = self.time;
        value
    }

    /// Full resummation without touching the memoized state
    pub fn recompute<F>(i: usize, nonzero: &MembershipList, coef: &[f64], kernel: &mut F) -> f64
    where
        F: FnMut(usize, usize) -> f64,
    {
        nonzero.iter().map(|j| coef[j] * kernel(i, j)).sum()
    }
}
