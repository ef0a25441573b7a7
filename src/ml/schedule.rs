// ============================================================
// Layer 5 — Learning-Rate Schedule and Early Stopping
// ============================================================
// Two small epoch-level state machines driven by validation loss.
// Both treat only a STRICT decrease as an improvement.
//
//   PlateauScheduler — multiply lr by `factor` once `patience`
//                      non-improving epochs have accumulated,
//                      never going below `min_lr`
//   EarlyStopping    — count non-improving epochs; stop when the
//                      count reaches `patience`

use serde::{Deserialize, Serialize};

const LR_EPS: f64 = 1e-12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlateauScheduler {
    lr:         f64,
    factor:     f64,
    patience:   usize,
    min_lr:     f64,
    best:       f64,
    bad_epochs: usize,
}

impl PlateauScheduler {
    pub fn new(initial_lr: f64, factor: f64, patience: usize, min_lr: f64) -> Self {
        Self {
            lr: initial_lr,
            factor,
            patience,
            min_lr,
            best: f64::INFINITY,
            bad_epochs: 0,
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Feed one epoch's validation loss; returns the lr for the next epoch.
    pub fn step(&mut self, val_loss: f64) -> f64 {
        if val_loss < self.best {
            self.best = val_loss;
            self.bad_epochs = 0;
            return self.lr;
        }

        self.bad_epochs += 1;
        if self.bad_epochs >= self.patience {
            let reduced = (self.lr * self.factor).max(self.min_lr);
            // An lr already at (or under) the floor is left alone.
            if self.lr - reduced > LR_EPS {
                tracing::info!("Reducing learning rate: {:.2e} → {:.2e}", self.lr, reduced);
                self.lr = reduced;
            }
            self.bad_epochs = 0;
        }
        self.lr
    }
}

/// What the trainer should do after an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochVerdict {
    /// New best validation loss: persist a checkpoint now.
    Improved,
    /// No improvement, keep training.
    Continue,
    /// Patience exhausted.
    Stop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyStopping {
    patience:   usize,
    best_loss:  f64,
    best_epoch: usize,
    counter:    usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self { patience, best_loss: f64::INFINITY, best_epoch: 0, counter: 0 }
    }

    pub fn observe(&mut self, epoch: usize, val_loss: f64) -> EpochVerdict {
        if val_loss < self.best_loss {
            self.best_loss  = val_loss;
            self.best_epoch = epoch;
            self.counter    = 0;
            return EpochVerdict::Improved;
        }
        self.counter += 1;
        if self.counter >= self.patience {
            EpochVerdict::Stop
        } else {
            EpochVerdict::Continue
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    /// Epoch of the best validation loss, 0 before any improvement.
    pub fn best_epoch(&self) -> usize {
        self.best_epoch
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stops_at_epoch_six_when_never_improving_after_first() {
        let mut es = EarlyStopping::new(5);
        let losses = [1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0];
        let mut saved = Vec::new();
        let mut stopped_at = None;

        for (i, &loss) in losses.iter().enumerate() {
            let epoch = i + 1;
            match es.observe(epoch, loss) {
                EpochVerdict::Improved => saved.push(epoch),
                EpochVerdict::Continue => {}
                EpochVerdict::Stop => {
                    stopped_at = Some(epoch);
                    break;
                }
            }
        }

        assert_eq!(stopped_at, Some(6));
        assert_eq!(saved, vec![1]);
        assert_eq!(es.best_epoch(), 1);
    }

    #[test]
    fn test_equal_loss_is_not_an_improvement() {
        let mut es = EarlyStopping::new(2);
        assert_eq!(es.observe(1, 0.5), EpochVerdict::Improved);
        assert_eq!(es.observe(2, 0.5), EpochVerdict::Continue);
        assert_eq!(es.observe(3, 0.4), EpochVerdict::Improved);
        assert_eq!(es.observe(4, 0.4), EpochVerdict::Continue);
        assert_eq!(es.observe(5, 0.9), EpochVerdict::Stop);
        assert_eq!(es.best_epoch(), 3);
    }

    #[test]
    fn test_plateau_reduces_after_patience() {
        let mut s = PlateauScheduler::new(2e-4, 0.2, 2, 1e-6);
        assert_eq!(s.step(1.0), 2e-4);
        assert_eq!(s.step(1.1), 2e-4);
        let lr = s.step(1.2);
        assert!((lr - 4e-5).abs() < 1e-12);
        // improvement resets the count
        assert_eq!(s.step(0.9), lr);
        assert_eq!(s.step(0.95), lr);
    }

    #[test]
    fn test_plateau_floor() {
        let mut s = PlateauScheduler::new(2e-6, 0.2, 1, 1e-6);
        s.step(1.0);
        assert_eq!(s.step(2.0), 1e-6);
        assert_eq!(s.step(2.0), 1e-6);
    }

    #[test]
    fn test_zero_lr_never_raised_to_floor() {
        let mut s = PlateauScheduler::new(0.0, 0.2, 1, 1e-6);
        s.step(1.0);
        assert_eq!(s.step(1.0), 0.0);
    }
}
