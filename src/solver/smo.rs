//! Sequential Minimal Optimization (SMO) training session
//!
//! Classification and regression share one dual problem over signed
//! coefficients β:
//!
//! ```text
//! minimize   ½ βᵀKβ − yᵀβ + ε‖β‖₁
//! subject to Σ β_i = 0,  lo_i ≤ β_i ≤ hi_i
//! ```
//!
//! For classification β_i = y_i·α_i with 0 ≤ α_i ≤ C and ε = 0; for
//! regression β_i = α_i with −C ≤ α_i ≤ C and ε the tube width. The
//! decision value is f(x) = Σ β_j K(x_j, x) + b.

use crate::cache::CacheStats;
use crate::core::{
    CancelToken, Dataset, Mode, Result, SmoConfig, SmoError, SweepReport, TrainingStatus,
    TrainingSummary,
};
use crate::solver::evaluator::CachedKernel;
use crate::solver::membership::MembershipList;
use crate::solver::output::{OutputStats, OutputTracker};
use log::{debug, info, trace, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Lower bound on the default iteration cap
const MIN_ITERATIONS: usize = 10_000;

pub type ProgressHook<'a> = Box<dyn FnMut(&SweepReport) + 'a>;
pub type FinalHook<'a> = Box<dyn FnMut(&TrainingSummary) + 'a>;

/// A candidate pairwise update, computed without mutating any state
#[derive(Debug, Clone, Copy)]
pub struct StepPlan {
    pub i1: usize,
    pub i2: usize,
    /// New coefficient of `i1`
    pub coef1: f64,
    /// New coefficient of `i2`
    pub coef2: f64,
    /// Change of the dual objective; always negative for a returned plan
    pub delta_objective: f64,
    f1: f64,
    f2: f64,
    k11: f64,
    k12: f64,
    k22: f64,
}

/// All mutable state of one training run
pub struct TrainingSession<'a, D: Dataset + ?Sized> {
    data: &'a D,
    config: SmoConfig,
    mode: Mode,
    n: usize,
    tube: f64,
    y: Vec<f64>,
    coef: Vec<f64>,
    bias: f64,
    kernels: CachedKernel<'a, D>,
    nonzero: MembershipList,
    nonbound: MembershipList,
    outputs: OutputTracker,
    active: Vec<bool>,
    rng: StdRng,
    max_iterations: usize,
    iterations: usize,
    steps: usize,
    epochs: usize,
    rounds: usize,
    examining_all: bool,
    status: TrainingStatus,
    progress_hook: Option<ProgressHook<'a>>,
    final_hook: Option<FinalHook<'a>>,
    cancel: Option<CancelToken>,
}

impl<'a, D: Dataset + ?Sized> TrainingSession<'a, D> {
    /// Validate the configuration against the dataset and set up a session
    /// with every multiplier at zero.
    pub fn new(data: &'a D, config: SmoConfig) -> Result<Self> {
        let n = data.len();
        if n == 0 {
            return Err(SmoError::EmptyDataset);
        }
        validate_config(&config, n)?;

        let x_dim = data.x_dim();
        if let Some(expected) = config.kernel.required_dim() {
            if expected != x_dim {
                return Err(SmoError::DimensionMismatch {
                    expected,
                    actual: x_dim,
                });
            }
        }
        for i in 0..n {
            let actual = data.x(i).len();
            if actual != x_dim {
                return Err(SmoError::DimensionMismatch {
                    expected: x_dim,
                    actual,
                });
            }
        }
        if config.target_index >= data.y_dim() {
            return Err(SmoError::InvalidParameter(format!(
                "target index {} out of range for {} target columns",
                config.target_index,
                data.y_dim()
            )));
        }

        let mode = config.mode();
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let target = data.y(i)[config.target_index];
            match mode {
                Mode::Classification if target != 1.0 && target != -1.0 => {
                    return Err(SmoError::InvalidLabel(target));
                }
                Mode::Regression if !target.is_finite() => {
                    return Err(SmoError::InvalidDataset(format!(
                        "non-finite target {} at exemplar {}",
                        target, i
                    )));
                }
                _ => y.push(target),
            }
        }

        let subset = config.subset_size.unwrap_or(config.cache_size).min(n);
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut kernels = CachedKernel::new(data, config.kernel.clone(), config.aux, config.cache_size);

        let mut active = vec![true; n];
        if subset < n {
            let mut order: Vec<usize> = (0..n).collect();
            for k in (1..n).rev() {
                order.swap(k, rng.gen_range(0..=k));
            }
            active.iter_mut().for_each(|a| *a = false);
            for &i in &order[..subset] {
                active[i] = true;
            }
            for (i, &is_active) in active.iter().enumerate() {
                kernels.cache_mut().set_cacheable(i, is_active);
            }
            info!(
                "Problem of {} exemplars exceeds subset size {}, decomposing",
                n, subset
            );
        }

        let max_iterations = config
            .max_iterations
            .unwrap_or_else(|| n.saturating_mul(n).max(MIN_ITERATIONS));

        Ok(Self {
            data,
            tube: if config.regression { config.regeps } else { 0.0 },
            outputs: OutputTracker::new(n, config.heuristics.ultra_clever),
            config,
            mode,
            n,
            y,
            coef: vec![0.0; n],
            bias: 0.0,
            kernels,
            nonzero: MembershipList::new(n),
            nonbound: MembershipList::new(n),
            active,
            rng,
            max_iterations,
            iterations: 0,
            steps: 0,
            epochs: 0,
            rounds: 0,
            examining_all: true,
            status: TrainingStatus::Initialized,
            progress_hook: None,
            final_hook: None,
            cancel: None,
        })
    }

    /// Invoke `hook` after every sweep
    pub fn set_progress_hook(&mut self, hook: ProgressHook<'a>) {
        self.progress_hook = Some(hook);
    }

    /// Invoke `hook` once when `train` finishes
    pub fn set_final_hook(&mut self, hook: FinalHook<'a>) {
        self.final_hook = Some(hook);
    }

    pub fn set_cancel_token(&mut self, token: CancelToken) {
        self.cancel = Some(token);
    }

    /// Run the optimizer until convergence, the iteration cap, or
    /// cancellation.
    pub fn train(&mut self) -> TrainingStatus {
        let status = if self.is_decomposed() {
            self.run_decomposition()
        } else {
            self.optimize_active()
        };
        self.status = status;

        match status {
            TrainingStatus::Converged => info!(
                "Converged after {} epochs, {} steps, {} support vectors",
                self.epochs,
                self.steps,
                self.nonzero.len()
            ),
            TrainingStatus::MaxIterations => {
                let worst = self.max_violation();
                warn!(
                    "Iteration cap {} reached before convergence (max KKT violation {:.3e})",
                    self.max_iterations, worst
                );
            }
            TrainingStatus::Stalled => {
                let worst = self.max_violation();
                warn!(
                    "No acceptable step left after {} epochs (max KKT violation {:.3e})",
                    self.epochs, worst
                );
            }
            TrainingStatus::Cancelled => warn!("Training cancelled after {} epochs", self.epochs),
            TrainingStatus::Initialized => {}
        }

        if let Some(mut hook) = self.final_hook.take() {
            let summary = self.summary();
            hook(&summary);
            self.final_hook = Some(hook);
        }
        status
    }

    /// Sweep the active exemplars, alternating between whole-set and
    /// non-bound sweeps, until a whole-set sweep changes nothing.
    ///
    /// The bias is then re-centred over the active members. The run counts
    /// as converged only if that leaves every active exemplar within `tol`;
    /// otherwise it is `Stalled`.
    pub(crate) fn optimize_active(&mut self) -> TrainingStatus {
        let mut examine_all = true;
        loop {
            if self.cancel.as_ref().map_or(false, |c| c.is_cancelled()) {
                return TrainingStatus::Cancelled;
            }
            if self.iterations >= self.max_iterations {
                return TrainingStatus::MaxIterations;
            }

            let (num_changed, truncated) = self.sweep(examine_all);
            self.epochs += 1;
            debug!(
                "epoch {}: {} sweep, {} steps accepted, cache hit rate {:.3}",
                self.epochs,
                if examine_all { "full" } else { "non-bound" },
                num_changed,
                self.kernels.cache().hit_rate()
            );
            self.report(examine_all, num_changed);

            if truncated {
                return TrainingStatus::MaxIterations;
            }
            if examine_all {
                if num_changed == 0 {
                    let members: Vec<usize> = (0..self.n).filter(|&i| self.active[i]).collect();
                    let gap = self.refresh_bias(&members);
                    if gap > 2.0 * self.config.tol {
                        debug!("active subset stuck with bias gap {:.3e}", gap);
                        return TrainingStatus::Stalled;
                    }
                    return TrainingStatus::Converged;
                }
                examine_all = false;
            } else if num_changed == 0 {
                examine_all = true;
            }
        }
    }

    /// One pass over the candidate exemplars. Returns the number of
    /// accepted steps and whether the iteration cap cut the pass short.
    fn sweep(&mut self, examine_all: bool) -> (usize, bool) {
        self.examining_all = examine_all;
        let mut candidates: Vec<usize> = if examine_all {
            (0..self.n).filter(|&i| self.active[i]).collect()
        } else {
            self.active_nonbound()
        };

        let worst_first = self.config.heuristics.worst_first;
        if worst_first {
            self.rank_by_violation(&mut candidates);
        }

        let mut num_changed = 0;
        let mut next = 0;
        while next < candidates.len() {
            let i2 = candidates[next];
            next += 1;
            if self.iterations >= self.max_iterations {
                return (num_changed, true);
            }
            if !examine_all && !self.nonbound.contains(i2) {
                continue;
            }
            if self.examine_example(i2) {
                num_changed += 1;
                // every step moves the outputs, so the old order is stale
                if worst_first {
                    self.rank_by_violation(&mut candidates[next..]);
                }
            }
        }
        (num_changed, false)
    }

    /// Reorder `items` by decreasing KKT violation
    fn rank_by_violation(&mut self, items: &mut [usize]) {
        let mut ranked: Vec<(usize, f64)> = items
            .iter()
            .map(|&i| {
                let f = self.output(i);
                (i, self.violation(i, f))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        for (slot, (i, _)) in items.iter_mut().zip(ranked) {
            *slot = i;
        }
    }

    /// Try to make progress with `i2` as one member of the working pair
    pub fn examine_example(&mut self, i2: usize) -> bool {
        self.iterations += 1;
        let f2 = self.output(i2);
        if self.violation(i2, f2) <= self.config.tol {
            return false;
        }

        let pool: Vec<usize> = self
            .active_nonbound()
            .into_iter()
            .filter(|&i| i != i2)
            .collect();

        if !pool.is_empty() {
            let plan = if self.config.heuristics.best_step {
                self.best_step_partner(i2, &pool)
            } else {
                let e2 = f2 - self.y[i2];
                self.extremal_error_partner(e2, &pool)
                    .and_then(|i1| self.plan_step(i1, i2))
            };
            if let Some(plan) = plan {
                self.apply_step(&plan);
                return true;
            }
        }

        for i1 in self.rotated(pool) {
            if let Some(plan) = self.plan_step(i1, i2) {
                self.apply_step(&plan);
                return true;
            }
        }

        // lazy mode leaves the whole-set scan to examine-all sweeps
        if self.examining_all || !self.config.heuristics.lazy_loop {
            let rest: Vec<usize> = (0..self.n)
                .filter(|&i| self.active[i] && i != i2 && !self.nonbound.contains(i))
                .collect();
            for i1 in self.rotated(rest) {
                if let Some(plan) = self.plan_step(i1, i2) {
                    self.apply_step(&plan);
                    return true;
                }
            }
        }

        false
    }

    /// Partner whose step decreases the objective the most
    fn best_step_partner(&mut self, i2: usize, pool: &[usize]) -> Option<StepPlan> {
        let mut best: Option<StepPlan> = None;
        for &i1 in pool {
            if let Some(plan) = self.plan_step(i1, i2) {
                if best.map_or(true, |b| plan.delta_objective < b.delta_objective) {
                    best = Some(plan);
                }
            }
        }
        best
    }

    /// Partner whose error is furthest from `e2`
    fn extremal_error_partner(&mut self, e2: f64, pool: &[usize]) -> Option<usize> {
        let mut best = None;
        let mut max_gap = 0.0;
        for &i1 in pool {
            let e1 = self.output(i1) - self.y[i1];
            let gap = (e1 - e2).abs();
            if gap > max_gap {
                max_gap = gap;
                best = Some(i1);
            }
        }
        best
    }

    /// Compute the optimal bound-constrained update of the pair.
    ///
    /// Moving `t` units of coefficient from `i1` to `i2` keeps Σβ fixed and
    /// changes the objective by
    /// `(E2 − E1)·t + ½·η·t² + ε·(|β1 − t| − |β1| + |β2 + t| − |β2|)`.
    /// The function is piecewise quadratic with kinks where either
    /// coefficient crosses zero; every piece is minimized separately.
    /// Returns `None` if the best move is negligible or does not decrease
    /// the objective.
    pub fn plan_step(&mut self, i1: usize, i2: usize) -> Option<StepPlan> {
        if i1 == i2 {
            return None;
        }
        let f1 = self.output(i1);
        let f2 = self.output(i2);
        let (e1, e2) = (f1 - self.y[i1], f2 - self.y[i2]);

        let k11 = self.kernels.diag(i1);
        let k22 = self.kernels.diag(i2);
        let k12 = self.kernels.eval(i1, i2);
        let eta = k11 + k22 - 2.0 * k12;

        let (b1, b2) = (self.coef[i1], self.coef[i2]);
        let (lo1, hi1) = self.bounds(i1);
        let (lo2, hi2) = self.bounds(i2);
        let t_lo = (lo2 - b2).max(b1 - hi1);
        let t_hi = (hi2 - b2).min(b1 - lo1);
        if t_hi <= t_lo {
            return None;
        }

        let tube = self.tube;
        let grad = e2 - e1;
        let delta = |t: f64| {
            grad * t
                + 0.5 * eta * t * t
                + tube * ((b1 - t).abs() - b1.abs() + (b2 + t).abs() - b2.abs())
        };

        let mut knots = vec![t_lo, t_hi];
        if tube > 0.0 {
            knots.extend([b1, -b2].into_iter().filter(|&k| k > t_lo && k < t_hi));
        }
        knots.sort_by(f64::total_cmp);
        knots.dedup();

        let mut candidates = knots.clone();
        if eta > 0.0 {
            for w in knots.windows(2) {
                let mid = 0.5 * (w[0] + w[1]);
                let slope = grad + tube * (signum(b2 + mid) - signum(b1 - mid));
                candidates.push((-slope / eta).clamp(w[0], w[1]));
            }
        }

        let (mut best_t, mut best_delta) = (0.0, 0.0);
        for t in candidates {
            let d = delta(t);
            if d < best_delta {
                best_t = t;
                best_delta = d;
            }
        }

        if best_delta >= 0.0 {
            return None;
        }

        // Snap t itself onto the nearest bound or zero crossing within
        // noise, so both coefficients move by the same amount.
        let noise = self.config.eps * self.config.c;
        let targets = [
            (lo2 - b2, None, Some(lo2)),
            (hi2 - b2, None, Some(hi2)),
            (-b2, None, Some(0.0)),
            (b1 - lo1, Some(lo1), None),
            (b1 - hi1, Some(hi1), None),
            (b1, Some(0.0), None),
        ];
        let (mut t, mut exact1, mut exact2) = (best_t, None, None);
        let mut nearest = noise;
        for (target, c1, c2) in targets {
            let gap = (target - best_t).abs();
            if target >= t_lo && target <= t_hi && gap <= nearest {
                (t, exact1, exact2) = (target, c1, c2);
                nearest = gap;
            }
        }

        let delta_objective = delta(t);
        let eps = self.config.eps;
        if t == 0.0
            || delta_objective >= 0.0
            || t.abs() < eps * (b2.abs() + (b2 + t).abs() + eps)
        {
            return None;
        }

        let coef1 = exact1.unwrap_or(b1 - t).clamp(lo1, hi1);
        let coef2 = exact2.unwrap_or(b2 + t).clamp(lo2, hi2);
        Some(StepPlan {
            i1,
            i2,
            coef1,
            coef2,
            delta_objective,
            f1,
            f2,
            k11,
            k12,
            k22,
        })
    }

    /// Commit a planned step: multipliers, outputs, bias and membership.
    ///
    /// If exactly one of the pair ends up non-bound, the bias is taken from
    /// that exemplar alone, since its margin pins b exactly. Otherwise it is
    /// the midpoint of the two estimates. This departs from always taking
    /// the midpoint whenever exactly one exemplar is non-bound.
    pub fn apply_step(&mut self, plan: &StepPlan) {
        let StepPlan { i1, i2, .. } = *plan;
        let d1 = plan.coef1 - self.coef[i1];
        let d2 = plan.coef2 - self.coef[i2];

        self.coef[i1] = plan.coef1;
        self.coef[i2] = plan.coef2;
        self.update_membership(i1);
        self.update_membership(i2);

        self.outputs.record_step(i1, d1, i2, d2);
        let du1 = d1 * plan.k11 + d2 * plan.k12;
        let du2 = d1 * plan.k12 + d2 * plan.k22;
        self.outputs.propagate(i1, du1);
        self.outputs.propagate(i2, du2);

        let u1 = plan.f1 - self.bias + du1;
        let u2 = plan.f2 - self.bias + du2;
        let b1 = self.bias_estimate(i1, u1);
        let b2 = self.bias_estimate(i2, u2);
        self.bias = match (self.nonbound.contains(i1), self.nonbound.contains(i2)) {
            (true, false) => b1,
            (false, true) => b2,
            _ => 0.5 * (b1 + b2),
        };

        for j in self.active_nonbound() {
            if j == i1 || j == i2 {
                continue;
            }
            let delta = d1 * self.kernels.eval(j, i1) + d2 * self.kernels.eval(j, i2);
            self.outputs.propagate(j, delta);
        }

        self.steps += 1;
        trace!(
            "step {}: ({}, {}) Δβ = ({:.3e}, {:.3e}), ΔW = {:.3e}, b = {:.6}",
            self.steps,
            i1,
            i2,
            d1,
            d2,
            plan.delta_objective,
            self.bias
        );
    }

    /// Bias that would put exemplar `i` exactly on its margin, given its
    /// bias-free output `u`
    fn bias_estimate(&self, i: usize, u: f64) -> f64 {
        let side = if self.coef[i] != 0.0 {
            signum(self.coef[i])
        } else {
            signum(self.y[i] - u - self.bias)
        };
        self.y[i] - self.tube * side - u
    }

    /// Interval of bias values that would satisfy the KKT condition of
    /// exemplar `i` exactly, given its bias-free output `u`
    pub(crate) fn bias_interval(&self, i: usize, u: f64) -> (f64, f64) {
        let r = self.y[i] - u;
        let beta = self.coef[i];
        let (lo, hi) = self.bounds(i);
        match self.mode {
            Mode::Classification if beta <= lo => (r, f64::INFINITY),
            Mode::Classification if beta >= hi => (f64::NEG_INFINITY, r),
            Mode::Classification => (r, r),
            Mode::Regression => {
                let tube = self.tube;
                if beta == 0.0 {
                    (r - tube, r + tube)
                } else if beta >= hi {
                    (f64::NEG_INFINITY, r - tube)
                } else if beta <= lo {
                    (r + tube, f64::INFINITY)
                } else if beta > 0.0 {
                    (r - tube, r - tube)
                } else {
                    (r + tube, r + tube)
                }
            }
        }
    }

    /// Re-centre the bias over `members`: the highest lower end and the
    /// lowest upper end of their bias intervals bracket b, which moves to
    /// the middle. Returns how far the bracket is inverted, zero when some
    /// bias satisfies every member.
    pub(crate) fn refresh_bias(&mut self, members: &[usize]) -> f64 {
        let (lower, upper) = self.audit(|s| {
            let mut lower = f64::NEG_INFINITY;
            let mut upper = f64::INFINITY;
            for &i in members {
                let u = s.output(i) - s.bias;
                let (l, h) = s.bias_interval(i, u);
                lower = lower.max(l);
                upper = upper.min(h);
            }
            (lower, upper)
        });

        let previous = self.bias;
        self.bias = match (lower.is_finite(), upper.is_finite()) {
            (true, true) => 0.5 * (lower + upper),
            (true, false) => lower,
            (false, true) => upper,
            (false, false) => previous,
        };
        // the tracker stores bias-free outputs, so nothing else moves
        trace!(
            "bias {:.6} -> {:.6} over bracket [{:.6}, {:.6}]",
            previous,
            self.bias,
            lower,
            upper
        );
        if lower.is_finite() && upper.is_finite() {
            (lower - upper).max(0.0)
        } else {
            0.0
        }
    }

    fn update_membership(&mut self, i: usize) {
        let c = self.coef[i];
        let (lo, hi) = self.bounds(i);
        self.nonzero.set(i, c != 0.0);
        self.nonbound.set(i, c != 0.0 && c > lo && c < hi);
    }

    /// Box on the signed coefficient of exemplar `i`
    fn bounds(&self, i: usize) -> (f64, f64) {
        let c = self.config.c;
        match self.mode {
            Mode::Classification if self.y[i] > 0.0 => (0.0, c),
            Mode::Classification => (-c, 0.0),
            Mode::Regression => (-c, c),
        }
    }

    /// Decision value f(x_i), including the bias
    pub fn output(&mut self, i: usize) -> f64 {
        let kernels = &mut self.kernels;
        let u = self
            .outputs
            .output(i, &self.nonzero, &self.coef, &mut |a, b| kernels.eval(a, b));
        u + self.bias
    }

    /// Magnitude by which exemplar `i` with decision value `f` violates its
    /// KKT condition; zero when satisfied
    pub fn violation(&self, i: usize, f: f64) -> f64 {
        let c = self.config.c;
        let e = f - self.y[i];
        match self.mode {
            Mode::Classification => {
                let r = self.y[i] * e;
                let alpha = self.y[i] * self.coef[i];
                if r < 0.0 && alpha < c {
                    -r
                } else if r > 0.0 && alpha > 0.0 {
                    r
                } else {
                    0.0
                }
            }
            Mode::Regression => {
                let beta = self.coef[i];
                let tube = self.tube;
                if beta == 0.0 {
                    (e.abs() - tube).max(0.0)
                } else if beta >= c {
                    (e + tube).max(0.0)
                } else if beta <= -c {
                    (tube - e).max(0.0)
                } else if beta > 0.0 {
                    (e + tube).abs()
                } else {
                    (e - tube).abs()
                }
            }
        }
    }

    /// Whether exemplar `i` satisfies its KKT condition within `tol`
    pub fn is_kkt_satisfied(&mut self, i: usize) -> bool {
        let f = self.audit(|s| s.output(i));
        self.violation(i, f) <= self.config.tol
    }

    /// Largest KKT violation over all exemplars
    pub fn max_violation(&mut self) -> f64 {
        self.audit(|s| {
            (0..s.n)
                .map(|i| {
                    let f = s.output(i);
                    s.violation(i, f)
                })
                .fold(0.0, f64::max)
        })
    }

    /// Dual objective in minimization form
    pub fn objective(&mut self) -> f64 {
        self.audit(|s| {
            s.nonzero
                .to_vec()
                .into_iter()
                .map(|i| {
                    let u = s.output(i) - s.bias;
                    let b = s.coef[i];
                    b * (0.5 * u - s.y[i]) + s.tube * b.abs()
                })
                .sum()
        })
    }

    /// Σ β_i, which is Σ y_i·α_i for classification and Σ α_i for regression
    pub fn constraint_residual(&self) -> f64 {
        self.coef.iter().sum()
    }

    /// Run a read-only computation with the kernel cache frozen
    fn audit<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let was_frozen = self.kernels.cache().is_frozen();
        self.kernels.cache_mut().set_frozen(true);
        let result = f(self);
        self.kernels.cache_mut().set_frozen(was_frozen);
        result
    }

    fn report(&mut self, examine_all: bool, num_changed: usize) {
        if let Some(mut hook) = self.progress_hook.take() {
            let report = SweepReport {
                epoch: self.epochs,
                examine_all,
                num_changed,
                steps: self.steps,
                iterations: self.iterations,
                objective: self.objective(),
                n_nonzero: self.nonzero.len(),
                n_nonbound: self.nonbound.len(),
                cache: self.kernels.stats(),
            };
            hook(&report);
            self.progress_hook = Some(hook);
        }
    }

    /// Counters and objective of the run so far
    pub fn summary(&mut self) -> TrainingSummary {
        TrainingSummary {
            status: self.status,
            epochs: self.epochs,
            steps: self.steps,
            iterations: self.iterations,
            objective: self.objective(),
            bias: self.bias,
            n_support_vectors: self.nonzero.len(),
            rounds: self.rounds,
            cache: self.kernels.stats(),
        }
    }

    pub(crate) fn active_nonbound(&self) -> Vec<usize> {
        self.nonbound.iter().filter(|&i| self.active[i]).collect()
    }

    /// Same members, starting at a random position
    pub(crate) fn rotated(&mut self, mut items: Vec<usize>) -> Vec<usize> {
        if items.len() > 1 {
            let start = self.rng.gen_range(0..items.len());
            items.rotate_left(start);
        }
        items
    }

    // Accessors used by the decomposition driver and model extraction

    pub(crate) fn is_decomposed(&self) -> bool {
        self.active.iter().any(|&a| !a)
    }

    pub(crate) fn set_active(&mut self, i: usize, active: bool) {
        self.active[i] = active;
        self.kernels.cache_mut().set_cacheable(i, active);
    }

    pub(crate) fn is_active(&self, i: usize) -> bool {
        self.active[i]
    }

    pub(crate) fn is_nonbound(&self, i: usize) -> bool {
        self.nonbound.contains(i)
    }

    pub(crate) fn note_round(&mut self) {
        self.rounds += 1;
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn data(&self) -> &'a D {
        self.data
    }

    pub fn config(&self) -> &SmoConfig {
        &self.config
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Target of exemplar `i` as seen by the trainer
    pub fn target(&self, i: usize) -> f64 {
        self.y[i]
    }

    /// Lagrange multiplier of exemplar `i`: in `[0, C]` for classification,
    /// in `[−C, C]` for regression
    pub fn alpha(&self, i: usize) -> f64 {
        match self.mode {
            Mode::Classification => self.y[i] * self.coef[i],
            Mode::Regression => self.coef[i],
        }
    }

    pub fn alphas(&self) -> Vec<f64> {
        (0..self.n).map(|i| self.alpha(i)).collect()
    }

    /// Signed coefficient β_i of exemplar `i` in the decision function
    pub fn coefficient(&self, i: usize) -> f64 {
        self.coef[i]
    }

    pub fn status(&self) -> TrainingStatus {
        self.status
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }

    pub fn rounds(&self) -> usize {
        self.rounds
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn n_nonzero(&self) -> usize {
        self.nonzero.len()
    }

    pub fn n_nonbound(&self) -> usize {
        self.nonbound.len()
    }

    /// Exemplars with a non-zero multiplier, in index order
    pub fn support_indices(&self) -> Vec<usize> {
        let mut indices = self.nonzero.to_vec();
        indices.sort_unstable();
        indices
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.kernels.stats()
    }

    pub fn output_stats(&self) -> OutputStats {
        self.outputs.stats()
    }

    /// Decision value of exemplar `i` by full resummation, bypassing the
    /// output tracker
    pub fn resummed_output(&mut self, i: usize) -> f64 {
        let bias = self.bias;
        self.audit(|s| {
            let kernels = &mut s.kernels;
            OutputTracker::recompute(i, &s.nonzero, &s.coef, &mut |a, b| kernels.eval(a, b))
                + bias
        })
    }
}

fn signum(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn validate_config(config: &SmoConfig, n: usize) -> Result<()> {
    if !(config.c.is_finite() && config.c > 0.0) {
        return Err(SmoError::InvalidParameter(format!(
            "box constraint C must be positive and finite, got {}",
            config.c
        )));
    }
    if !(config.tol.is_finite() && config.tol > 0.0) {
        return Err(SmoError::InvalidParameter(format!(
            "tolerance must be positive, got {}",
            config.tol
        )));
    }
    if !(config.eps.is_finite() && config.eps > 0.0) {
        return Err(SmoError::InvalidParameter(format!(
            "eps must be positive, got {}",
            config.eps
        )));
    }
    if !config.aux.is_finite() {
        return Err(SmoError::InvalidParameter(format!(
            "kernel parameter must be finite, got {}",
            config.aux
        )));
    }
    if config.regression && !(config.regeps.is_finite() && config.regeps >= 0.0) {
        return Err(SmoError::InvalidParameter(format!(
            "regression epsilon must be non-negative, got {}",
            config.regeps
        )));
    }
    if n >= 2 && config.cache_size < 2 {
        return Err(SmoError::InvalidParameter(format!(
            "cache must hold at least 2 exemplars, got {}",
            config.cache_size
        )));
    }
    if let Some(subset) = config.subset_size {
        if n >= 2 && subset < 2 {
            return Err(SmoError::InvalidParameter(format!(
                "active subset must hold at least 2 exemplars, got {}",
                subset
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Heuristics;
    use crate::data::DenseDataset;
    use crate::kernel::Kernel;
    use approx::assert_abs_diff_eq;

    fn separable() -> DenseDataset {
        DenseDataset::from_rows(
            vec![
                vec![2.0, 2.0],
                vec![3.0, 1.0],
                vec![-2.0, -2.0],
                vec![-1.0, -3.0],
            ],
            vec![1.0, 1.0, -1.0, -1.0],
        )
        .unwrap()
    }

    fn xor() -> DenseDataset {
        DenseDataset::from_rows(
            vec![
                vec![1.0, 1.0],
                vec![-1.0, -1.0],
                vec![1.0, -1.0],
                vec![-1.0, 1.0],
            ],
            vec![1.0, 1.0, -1.0, -1.0],
        )
        .unwrap()
    }

    fn noisy_line(n: usize) -> DenseDataset {
        let mut rng = StdRng::seed_from_u64(5);
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        for _ in 0..n {
            let a: f64 = rng.gen_range(-2.0..2.0);
            let b: f64 = rng.gen_range(-2.0..2.0);
            let label = if a + 0.5 * b + rng.gen_range(-0.4..0.4) > 0.0 {
                1.0
            } else {
                -1.0
            };
            xs.push(vec![a, b]);
            ys.push(label);
        }
        DenseDataset::from_rows(xs, ys).unwrap()
    }

    fn config(kernel: Kernel, aux: f64, c: f64) -> SmoConfig {
        SmoConfig {
            kernel,
            aux,
            c,
            ..SmoConfig::default()
        }
    }

    #[test]
    fn test_session_empty_dataset() {
        let data = DenseDataset::from_rows(vec![], vec![]).unwrap();
        let result = TrainingSession::new(&data, SmoConfig::default());
        assert!(matches!(result, Err(SmoError::EmptyDataset)));
    }

    #[test]
    fn test_session_invalid_labels() {
        let data = DenseDataset::from_rows(vec![vec![1.0], vec![2.0]], vec![1.0, 0.5]).unwrap();
        let result = TrainingSession::new(&data, SmoConfig::default());
        assert!(matches!(result, Err(SmoError::InvalidLabel(l)) if l == 0.5));
    }

    #[test]
    fn test_session_rejects_bad_box_constraint() {
        let data = separable();
        for c in [0.0, -1.0, f64::INFINITY, f64::NAN] {
            let result = TrainingSession::new(&data, config(Kernel::Linear, 0.0, c));
            assert!(matches!(result, Err(SmoError::InvalidParameter(_))));
        }
    }

    #[test]
    fn test_session_rejects_small_cache() {
        let data = separable();
        let cfg = SmoConfig {
            cache_size: 1,
            ..SmoConfig::default()
        };
        assert!(matches!(
            TrainingSession::new(&data, cfg),
            Err(SmoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_session_rejects_target_index() {
        let data = separable();
        let cfg = SmoConfig {
            target_index: 1,
            ..SmoConfig::default()
        };
        assert!(matches!(
            TrainingSession::new(&data, cfg),
            Err(SmoError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_linearly_separable_converges_to_kkt() {
        let data = separable();
        let mut session = TrainingSession::new(&data, config(Kernel::Linear, 0.0, 1000.0)).unwrap();
        assert_eq!(session.train(), TrainingStatus::Converged);

        for i in 0..data.len() {
            assert!(session.is_kkt_satisfied(i), "exemplar {} violates KKT", i);
            let f = session.output(i);
            assert!(f * session.target(i) >= 1.0 - 1e-2);
        }
        assert!(session.max_violation() <= session.config().tol);
        assert_abs_diff_eq!(session.constraint_residual(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_xor_gaussian_classifies_training_set() {
        let data = xor();
        let mut cfg = config(Kernel::Gaussian, 1.0, 10.0);
        cfg.tol = 1e-3;
        let mut session = TrainingSession::new(&data, cfg).unwrap();
        assert_eq!(session.train(), TrainingStatus::Converged);
        assert!(session.epochs() < 50);

        for i in 0..data.len() {
            let f = session.output(i);
            assert_eq!(f.signum(), session.target(i));
        }
        assert_eq!(session.n_nonzero(), 4);
    }

    #[test]
    fn test_box_and_equality_hold_after_every_step() {
        let data = noisy_line(40);
        let c = 0.5;
        let mut session = TrainingSession::new(&data, config(Kernel::Gaussian, 1.0, c)).unwrap();

        let mut previous = session.objective();
        for _ in 0..200 {
            let i2 = session.iterations() % data.len();
            if session.examine_example(i2) {
                for i in 0..data.len() {
                    let a = session.alpha(i);
                    assert!(a >= 0.0 && a <= c, "alpha {} out of box: {}", i, a);
                }
                assert_abs_diff_eq!(session.constraint_residual(), 0.0, epsilon = 1e-9);
                let current = session.objective();
                assert!(current <= previous + 1e-9, "{} > {}", current, previous);
                previous = current;
            }
        }
        assert!(session.steps() > 0);
    }

    #[test]
    fn test_tracked_outputs_match_resummation() {
        let data = noisy_line(30);
        for ultra_clever in [true, false] {
            let mut cfg = config(Kernel::Gaussian, 0.7, 2.0);
            cfg.heuristics.ultra_clever = ultra_clever;
            let mut session = TrainingSession::new(&data, cfg).unwrap();
            for k in 0..300 {
                session.examine_example(k % data.len());
                let sample = (k * 7) % data.len();
                let tracked = session.output(sample);
                let direct = session.resummed_output(sample);
                assert_abs_diff_eq!(tracked, direct, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn test_plan_step_rejects_same_index_and_flat_pair() {
        let data = DenseDataset::from_rows(
            vec![vec![1.0], vec![1.0], vec![2.0]],
            vec![1.0, 1.0, -1.0],
        )
        .unwrap();
        let mut session = TrainingSession::new(&data, config(Kernel::Linear, 0.0, 1.0)).unwrap();
        assert!(session.plan_step(0, 0).is_none());
        // same class, both at zero: the box collapses to a point
        assert!(session.plan_step(0, 1).is_none());
        assert!(session.plan_step(0, 2).is_some());
    }

    #[test]
    fn test_degenerate_eta_takes_endpoint() {
        // identical inputs with opposite labels give η = 0
        let data = DenseDataset::from_rows(vec![vec![1.0], vec![1.0]], vec![1.0, -1.0]).unwrap();
        let mut session = TrainingSession::new(&data, config(Kernel::Linear, 0.0, 3.0)).unwrap();
        let plan = session.plan_step(0, 1).expect("linear descent along flat direction");
        assert!(plan.delta_objective < 0.0);
        assert_abs_diff_eq!(plan.coef1.abs(), 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(plan.coef2.abs(), 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_regression_fits_line_within_tube() {
        let xs: Vec<Vec<f64>> = (0..9).map(|i| vec![i as f64 * 0.25]).collect();
        let ys: Vec<f64> = xs.iter().map(|x| 2.0 * x[0] - 1.0).collect();
        let data = DenseDataset::from_rows(xs, ys).unwrap();
        let mut cfg = config(Kernel::Linear, 0.0, 100.0);
        cfg.regression = true;
        cfg.regeps = 0.05;
        let mut session = TrainingSession::new(&data, cfg).unwrap();
        assert_eq!(session.train(), TrainingStatus::Converged);

        for i in 0..data.len() {
            let a = session.alpha(i);
            assert!(a >= -100.0 && a <= 100.0);
            let err = (session.output(i) - session.target(i)).abs();
            assert!(err <= 0.05 + 2e-3, "exemplar {} off by {}", i, err);
        }
        assert_abs_diff_eq!(session.constraint_residual(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_regression_steps_cross_zero() {
        let data = DenseDataset::from_rows(
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0]],
            vec![0.0, 2.0, 1.0, 3.0],
        )
        .unwrap();
        let mut cfg = config(Kernel::Gaussian, 0.8, 5.0);
        cfg.regression = true;
        cfg.regeps = 0.1;
        let mut session = TrainingSession::new(&data, cfg).unwrap();
        let mut previous = session.objective();
        for k in 0..100 {
            if session.examine_example(k % 4) {
                let current = session.objective();
                assert!(current <= previous + 1e-9);
                previous = current;
            }
        }
        assert_eq!(session.train(), TrainingStatus::Converged);
        assert!(session.max_violation() < 1e-2);
        assert_abs_diff_eq!(session.constraint_residual(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_heuristic_variants_reach_same_objective() {
        let data = noisy_line(30);
        let variants = [
            Heuristics::default(),
            Heuristics {
                best_step: true,
                ..Heuristics::default()
            },
            Heuristics {
                worst_first: true,
                ultra_clever: false,
                ..Heuristics::default()
            },
            Heuristics {
                lazy_loop: true,
                ..Heuristics::default()
            },
        ];
        let mut objectives = Vec::new();
        for heuristics in variants {
            let mut cfg = config(Kernel::Gaussian, 1.0, 1.0);
            cfg.heuristics = heuristics;
            let mut session = TrainingSession::new(&data, cfg).unwrap();
            assert_eq!(session.train(), TrainingStatus::Converged);
            objectives.push(session.objective());
        }
        let scale = objectives[0].abs().max(1.0);
        for w in &objectives {
            assert!((w - objectives[0]).abs() <= 2e-2 * scale, "{:?}", objectives);
        }
    }

    #[test]
    fn test_same_seed_is_reproducible() {
        let data = noisy_line(25);
        let run = || {
            let mut cfg = config(Kernel::Gaussian, 1.0, 1.0);
            cfg.seed = 42;
            let mut session = TrainingSession::new(&data, cfg).unwrap();
            session.train();
            (session.alphas(), session.bias(), session.steps())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_iteration_cap_reports_non_convergence() {
        let data = noisy_line(30);
        let mut cfg = config(Kernel::Gaussian, 1.0, 10.0);
        cfg.max_iterations = Some(5);
        let mut session = TrainingSession::new(&data, cfg).unwrap();
        assert_eq!(session.train(), TrainingStatus::MaxIterations);
        assert_eq!(session.iterations(), 5);
        assert_eq!(session.status(), TrainingStatus::MaxIterations);
    }

    #[test]
    fn test_cancel_token_stops_before_first_sweep() {
        let data = separable();
        let token = CancelToken::new();
        token.cancel();
        let mut session = TrainingSession::new(&data, SmoConfig::default()).unwrap();
        session.set_cancel_token(token);
        assert_eq!(session.train(), TrainingStatus::Cancelled);
        assert_eq!(session.steps(), 0);
    }

    #[test]
    fn test_hooks_are_invoked() {
        let data = xor();
        let mut epochs = Vec::new();
        let mut finished = None;
        {
            let mut session =
                TrainingSession::new(&data, config(Kernel::Gaussian, 1.0, 10.0)).unwrap();
            session.set_progress_hook(Box::new(|r: &SweepReport| epochs.push(r.epoch)));
            session.set_final_hook(Box::new(|s: &TrainingSummary| finished = Some(s.status)));
            session.train();
        }
        assert!(!epochs.is_empty());
        assert_eq!(epochs, (1..=epochs.len()).collect::<Vec<_>>());
        assert_eq!(finished, Some(TrainingStatus::Converged));
    }

    #[test]
    fn test_objective_never_increases_across_sweeps() {
        let data = noisy_line(30);
        let mut objectives = Vec::new();
        {
            let mut session =
                TrainingSession::new(&data, config(Kernel::Polynomial, 2.0, 1.0)).unwrap();
            session.set_progress_hook(Box::new(|r: &SweepReport| objectives.push(r.objective)));
            session.train();
        }
        assert!(objectives.len() >= 2);
        assert!(objectives[0] < 0.0);
        for w in objectives.windows(2) {
            assert!(w[1] <= w[0] + 1e-9, "{} > {}", w[1], w[0]);
        }
    }

    #[test]
    fn test_coarse_eps_keeps_equality_constraint() {
        for seed in [3, 11, 29] {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut xs = Vec::new();
            let mut ys = Vec::new();
            for k in 0..30 {
                let label = if k % 3 == 0 { 1.0 } else { -1.0 };
                xs.push(vec![
                    label * 0.5 + rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                ]);
                ys.push(label);
            }
            let data = DenseDataset::from_rows(xs, ys).unwrap();

            let mut cfg = config(Kernel::Gaussian, 0.7, 10.0);
            cfg.eps = 1e-3;
            cfg.seed = seed;
            let mut session = TrainingSession::new(&data, cfg).unwrap();
            for k in 0..200 {
                session.examine_example(k % 30);
                assert!(
                    session.constraint_residual().abs() < 1e-9,
                    "seed {}: residual {}",
                    seed,
                    session.constraint_residual()
                );
            }
            session.train();
            assert!(session.constraint_residual().abs() < 1e-9);
            for i in 0..data.len() {
                let alpha = session.alpha(i);
                assert!((0.0..=10.0).contains(&alpha), "alpha {} = {}", i, alpha);
            }
        }
    }

    #[test]
    fn test_snapped_step_lands_on_bound() {
        let data = DenseDataset::from_rows(vec![vec![0.0], vec![1.0]], vec![1.0, -1.0]).unwrap();
        let mut cfg = config(Kernel::Linear, 0.0, 0.5);
        cfg.eps = 1e-2;
        let mut session = TrainingSession::new(&data, cfg).unwrap();
        let plan = session.plan_step(0, 1).expect("pair violates its margin");
        // the unconstrained optimum lies beyond C, so both sit on the box
        assert_eq!(plan.coef1, 0.5);
        assert_eq!(plan.coef2, -0.5);
        assert_eq!(plan.coef1 + plan.coef2, 0.0);
    }

    #[test]
    fn test_converged_means_every_exemplar_within_tol() {
        let data = noisy_line(40);
        for (kernel, aux, c) in [
            (Kernel::Linear, 0.0, 1.0),
            (Kernel::Gaussian, 1.0, 1.0),
            (Kernel::Gaussian, 0.5, 20.0),
            (Kernel::Polynomial, 2.0, 0.5),
        ] {
            let mut session = TrainingSession::new(&data, config(kernel, aux, c)).unwrap();
            if session.train() == TrainingStatus::Converged {
                let worst = session.max_violation();
                assert!(worst <= session.config().tol + 1e-12, "violation {}", worst);
            }
        }
    }

    #[test]
    fn test_refresh_bias_centres_the_bracket() {
        let data = noisy_line(30);
        let mut session = TrainingSession::new(&data, config(Kernel::Gaussian, 1.0, 1.0)).unwrap();
        for k in 0..10 {
            session.examine_example(k);
        }
        let everyone: Vec<usize> = (0..30).collect();
        let gap = session.refresh_bias(&everyone);
        assert_abs_diff_eq!(session.max_violation(), 0.5 * gap, epsilon = 1e-9);

        // coefficients and bias-free outputs are untouched
        let objective = session.objective();
        let again = session.refresh_bias(&everyone);
        assert_abs_diff_eq!(again, gap, epsilon = 1e-12);
        assert_abs_diff_eq!(session.objective(), objective, epsilon = 1e-12);
    }

    #[test]
    fn test_worst_first_order_follows_current_outputs() {
        let data = noisy_line(30);
        let mut cfg = config(Kernel::Gaussian, 1.0, 1.0);
        cfg.heuristics.worst_first = true;
        let mut session = TrainingSession::new(&data, cfg).unwrap();
        for k in 0..6 {
            session.examine_example(k);
        }

        let mut order: Vec<usize> = (0..30).collect();
        session.rank_by_violation(&mut order);
        let violations: Vec<f64> = order
            .iter()
            .map(|&i| {
                let f = session.output(i);
                session.violation(i, f)
            })
            .collect();
        for w in violations.windows(2) {
            assert!(w[0] >= w[1], "{:?}", violations);
        }

        assert_eq!(session.train(), TrainingStatus::Converged);
        assert!(session.max_violation() <= session.config().tol + 1e-12);
    }
}
