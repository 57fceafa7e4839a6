//! Checkpoint gate: decides after each epoch whether to write a checkpoint
//! and whether to keep training.
//!
//! The gate tracks the best validation loss seen so far. A strictly lower
//! loss is an improvement and always saves; anything else is stale, and the
//! [`EarlyStopping`] policy decides whether a stale epoch ends the run:
//!
//! | policy              | tie            | regression       |
//! |---------------------|----------------|------------------|
//! | `BreakOnRegression` | hold           | stop             |
//! | `Patience(n)`       | stale, hold    | stale, hold      |
//! | `Never`             | hold           | hold             |
//!
//! Under `Patience(n)` the `n`-th consecutive stale epoch stops the run.
use serde::{Deserialize, Serialize};

use crate::mixing::core::options::EarlyStopping;

/// Outcome of observing one epoch's validation loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Strict improvement: write a checkpoint and continue.
    Save,
    /// No write; continue.
    Hold,
    /// No write; stop training.
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CheckpointGate {
    policy: EarlyStopping,
    best: f64,
    stale: usize,
}

impl CheckpointGate {
    pub fn new(policy: EarlyStopping) -> Self {
        Self::resume(policy, f64::INFINITY)
    }

    /// Gate continuing from a previously recorded best loss.
    pub fn resume(policy: EarlyStopping, best: f64) -> Self {
        Self { policy, best, stale: 0 }
    }

    /// Best validation loss observed so far (`+∞` before the first epoch).
    pub fn best(&self) -> f64 {
        self.best
    }

    /// Consecutive epochs without strict improvement.
    pub fn stale_epochs(&self) -> usize {
        self.stale
    }

    /// Observe a finite validation loss.
    pub fn observe(&mut self, val_loss: f64) -> GateDecision {
        if val_loss < self.best {
            self.best = val_loss;
            self.stale = 0;
            return GateDecision::Save;
        }
        self.stale += 1;
        match self.policy {
            EarlyStopping::BreakOnRegression if val_loss > self.best => GateDecision::Stop,
            EarlyStopping::Patience(n) if self.stale >= n => GateDecision::Stop,
            _ => GateDecision::Hold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(policy: EarlyStopping, losses: &[f64]) -> Vec<GateDecision> {
        let mut gate = CheckpointGate::new(policy);
        losses.iter().map(|&l| gate.observe(l)).collect()
    }

    #[test]
    // Purpose
    // -------
    // A tie neither saves nor stops; strict improvements always save.
    //
    // Given
    // -----
    // - Validation losses [5, 4, 4, 3] under BreakOnRegression.
    //
    // Expect
    // ------
    // - Save, Save, Hold, Save.
    fn tie_holds_without_writing() {
        use GateDecision::*;
        assert_eq!(run(EarlyStopping::BreakOnRegression, &[5.0, 4.0, 4.0, 3.0]), vec![
            Save, Save, Hold, Save
        ]);
    }

    #[test]
    fn break_on_regression_stops_at_first_worse_epoch() {
        use GateDecision::*;
        assert_eq!(run(EarlyStopping::BreakOnRegression, &[3.0, 3.5]), vec![Save, Stop]);
        assert_eq!(run(EarlyStopping::Never, &[3.0, 3.5, 2.0]), vec![Save, Hold, Save]);
    }

    #[test]
    fn patience_counts_ties_and_regressions() {
        use GateDecision::*;
        assert_eq!(run(EarlyStopping::Patience(2), &[2.0, 2.0, 1.0, 1.5, 1.0]), vec![
            Save, Hold, Save, Hold, Stop
        ]);
    }

    #[test]
    fn resumed_gate_compares_against_recorded_best() {
        let mut gate = CheckpointGate::resume(EarlyStopping::BreakOnRegression, 1.0);
        assert_eq!(gate.observe(1.5), GateDecision::Stop);
        assert_eq!(gate.best(), 1.0);
        assert_eq!(gate.stale_epochs(), 1);
    }
}
