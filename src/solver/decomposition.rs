//! Working-set decomposition for problems larger than the kernel cache
//!
//! Only an active subset of exemplars, sized to the cache, takes part in
//! optimization. After each round the bias is re-centred over every
//! exemplar; inactive KKT violators are then swapped in for active members
//! and the subset is optimized again. The run converges once no exemplar
//! violates its condition, and stalls after enough rounds without a step.

use crate::core::{Dataset, TrainingStatus};
use crate::solver::smo::TrainingSession;
use log::{debug, info, warn};

impl<'a, D: Dataset + ?Sized> TrainingSession<'a, D> {
    pub(crate) fn run_decomposition(&mut self) -> TrainingStatus {
        let everyone: Vec<usize> = (0..self.len()).collect();
        let patience = self.len() / self.active_len().max(1) + 1;
        let mut idle_rounds = 0;
        loop {
            let steps_before = self.steps();
            let status = self.optimize_active();
            if !matches!(status, TrainingStatus::Converged | TrainingStatus::Stalled) {
                return status;
            }
            self.note_round();

            let gap = self.refresh_bias(&everyone);
            if gap <= 2.0 * self.config().tol {
                info!("No violators left after {} rounds", self.rounds());
                return TrainingStatus::Converged;
            }

            if self.steps() == steps_before {
                idle_rounds += 1;
            } else {
                idle_rounds = 0;
            }
            let violators = self.violators();
            let incoming: Vec<usize> = violators
                .iter()
                .copied()
                .filter(|&i| !self.is_active(i))
                .collect();
            if incoming.is_empty() || idle_rounds >= patience {
                warn!(
                    "Round {} left {} violators with bias gap {:.3e}, stopping",
                    self.rounds(),
                    violators.len(),
                    gap
                );
                return TrainingStatus::Stalled;
            }

            let swapped = self.swap_in(&incoming, &violators);
            debug!(
                "round {}: {} violators, {} inactive, {} swapped in",
                self.rounds(),
                violators.len(),
                incoming.len(),
                swapped
            );
        }
    }

    fn active_len(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_active(i)).count()
    }

    /// Most swaps allowed per round
    pub(crate) fn swap_limit(&self) -> usize {
        (self.active_len() / 2).max(1)
    }

    /// Every exemplar violating its KKT condition under the current bias,
    /// worst first. Those asking for a larger bias alternate with those
    /// asking for a smaller one, so the two ends of the bias bracket lead
    /// the list.
    pub(crate) fn violators(&mut self) -> Vec<usize> {
        let tol = self.config().tol;
        let bias = self.bias();
        let everyone: Vec<usize> = (0..self.len()).collect();

        let mut raise = Vec::new();
        let mut lower = Vec::new();
        // random start breaks ties between equally bad exemplars
        for i in self.rotated(everyone) {
            let u = self.output(i) - bias;
            let (lo, hi) = self.bias_interval(i, u);
            if lo - bias > tol {
                raise.push((i, lo - bias));
            } else if bias - hi > tol {
                lower.push((i, bias - hi));
            }
        }
        raise.sort_by(|a, b| b.1.total_cmp(&a.1));
        lower.sort_by(|a, b| b.1.total_cmp(&a.1));

        let mut ordered = Vec::with_capacity(raise.len() + lower.len());
        let (mut raise, mut lower) = (raise.into_iter(), lower.into_iter());
        loop {
            match (raise.next(), lower.next()) {
                (None, None) => break,
                (a, b) => ordered.extend(a.into_iter().chain(b).map(|(i, _)| i)),
            }
        }
        ordered
    }

    /// Activate `incoming` exemplars in place of active members, at most
    /// `swap_limit` of them. Members satisfying their condition go first,
    /// bound before non-bound; violating members follow, least severe
    /// first, and the two leading entries of `violators` are never evicted.
    /// Returns the number of swaps made.
    fn swap_in(&mut self, incoming: &[usize], violators: &[usize]) -> usize {
        let mut rank = vec![None; self.len()];
        for (position, &i) in violators.iter().enumerate() {
            rank[i] = Some(position);
        }

        let mut victims: Vec<usize> = (0..self.len())
            .filter(|&i| self.is_active(i) && rank[i].map_or(true, |p| p >= 2))
            .collect();
        // stable sort keeps index order within each group
        victims.sort_by_key(|&i| match rank[i] {
            None => (0, usize::from(self.is_nonbound(i))),
            Some(position) => (1, usize::MAX - position),
        });
        let mut victims = victims.into_iter();

        let mut swapped = 0;
        for &i in incoming.iter().take(self.swap_limit()) {
            let Some(outgoing) = victims.next() else {
                break;
            };
            self.set_active(outgoing, false);
            self.set_active(i, true);
            swapped += 1;
        }
        swapped
    }
}
