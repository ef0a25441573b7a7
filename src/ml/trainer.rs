// ============================================================
// Layer 5 — Training Loop
// ============================================================
// Epoch-based optimisation of MedicalClassifier.
//
// Per epoch:
//   1. Cancellation check (only ever between epochs)
//   2. Training pass on the autodiff backend:
//        weighted CE → backward → global-norm clip → AdamW step
//   3. Validation pass on the inner backend via model.valid()
//        (dropout disabled)
//   4. EarlyStopping verdict; a strict improvement persists the
//      checkpoint immediately
//   5. PlateauScheduler picks the next learning rate
//
// Class weights: w_c = 1 / (count_c + 1) over the training split.
// A non-finite batch loss aborts the run with TrainError::Divergence
// before any optimiser step can write it into the weights.
//
// Reference: Burn Book §5, Loshchilov & Hutter (2019) AdamW

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use burn::{
    data::{dataloader::DataLoaderBuilder, dataset::Dataset},
    module::AutodiffModule,
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamWConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::backend::AutodiffBackend,
};
use serde::{Deserialize, Serialize};

use crate::data::{batcher::ClassificationBatcher, dataset::ClassificationDataset};
use crate::error::TrainError;
use crate::infra::checkpoint::{CheckpointManager, CheckpointMeta};
use crate::infra::metrics::{ClassificationReport, EpochMetrics, MetricsLogger, PhaseMetrics};
use crate::ml::clipping::clip_global_norm;
use crate::ml::model::{ClassifierConfig, MedicalClassifier};
use crate::ml::schedule::{EarlyStopping, EpochVerdict, PlateauScheduler};

// ─── TrainerConfig ────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub batch_size:              usize,
    pub epochs:                  usize,
    pub learning_rate:           f64,
    pub weight_decay:            f64,
    pub max_grad_norm:           f64,
    pub lr_factor:               f64,
    pub lr_patience:             usize,
    pub min_lr:                  f64,
    pub early_stopping_patience: usize,
    /// A classification report is logged every this many epochs
    pub report_every:            usize,
    pub seed:                    u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            batch_size:              32,
            epochs:                  20,
            learning_rate:           2e-4,
            weight_decay:            0.01,
            max_grad_norm:           1.0,
            lr_factor:               0.2,
            lr_patience:             2,
            min_lr:                  1e-6,
            early_stopping_patience: 5,
            report_every:            5,
            seed:                    42,
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        let invalid = |msg: &str| Err(TrainError::InvalidConfig(msg.to_string()));
        if self.batch_size == 0 {
            return invalid("batch_size must be > 0");
        }
        if self.epochs == 0 {
            return invalid("epochs must be > 0");
        }
        if !self.learning_rate.is_finite() || self.learning_rate < 0.0 {
            return invalid("learning_rate must be a finite, non-negative number");
        }
        if self.max_grad_norm.is_nan() || self.max_grad_norm <= 0.0 {
            return invalid("max_grad_norm must be > 0");
        }
        if !(self.lr_factor > 0.0 && self.lr_factor < 1.0) {
            return invalid("lr_factor must be in (0, 1)");
        }
        if self.lr_patience == 0 || self.early_stopping_patience == 0 {
            return invalid("patience values must be > 0");
        }
        if self.report_every == 0 {
            return invalid("report_every must be > 0");
        }
        Ok(())
    }
}

// ─── TrainingOutcome ──────────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub history:       Vec<EpochMetrics>,
    /// 0 when no epoch completed
    pub best_epoch:    usize,
    pub best_val_loss: f64,
    pub stopped_early: bool,
    pub cancelled:     bool,
}

// ─── Trainer ──────────────────────────────────────────────────────────────────
pub struct Trainer<B: AutodiffBackend> {
    config:      TrainerConfig,
    device:      B::Device,
    checkpoints: CheckpointManager,
    class_names: Vec<String>,
    cancel:      Arc<AtomicBool>,
}

impl<B: AutodiffBackend> Trainer<B> {
    pub fn new(config: TrainerConfig, device: B::Device, checkpoints: CheckpointManager) -> Self {
        Self {
            config,
            device,
            checkpoints,
            class_names: Vec::new(),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Names used in classification reports, indexed by class id.
    pub fn with_class_names(mut self, names: Vec<String>) -> Self {
        self.class_names = names;
        self
    }

    /// Share a stop flag; setting it ends training before the next epoch.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    pub fn fit(
        &self,
        model_config: &ClassifierConfig,
        train:        ClassificationDataset,
        val:          ClassificationDataset,
    ) -> Result<TrainingOutcome, TrainError> {
        let cfg = &self.config;
        cfg.validate()?;
        model_config.validate()?;
        if train.is_empty() {
            return Err(TrainError::EmptySplit("training"));
        }
        if val.is_empty() {
            return Err(TrainError::EmptySplit("validation"));
        }

        // ── Class-weighted loss ──────────────────────────────────────────────
        let weights = class_weights(&train.class_counts(model_config.num_classes));
        let train_loss_fn = CrossEntropyLossConfig::new()
            .with_weights(Some(weights.clone()))
            .init::<B>(&self.device);
        let val_loss_fn = CrossEntropyLossConfig::new()
            .with_weights(Some(weights))
            .init::<B::InnerBackend>(&self.device);

        // ── Model and AdamW ──────────────────────────────────────────────────
        let mut model: MedicalClassifier<B> = model_config.init(&self.device);
        let mut optim = AdamWConfig::new()
            .with_weight_decay(cfg.weight_decay as f32)
            .init::<B, MedicalClassifier<B>>();
        tracing::info!(
            "Model ready: {} classes, embed_dim={}, hidden_size={}",
            model_config.num_classes,
            model_config.embed_dim,
            model_config.hidden_size
        );

        // ── Data loaders ─────────────────────────────────────────────────────
        let train_samples = train.len();
        let train_loader = DataLoaderBuilder::new(ClassificationBatcher::<B>::new(self.device.clone()))
            .batch_size(cfg.batch_size)
            .shuffle(cfg.seed)
            .num_workers(1)
            .build(train);

        let val_loader =
            DataLoaderBuilder::new(ClassificationBatcher::<B::InnerBackend>::new(self.device.clone()))
                .batch_size(cfg.batch_size)
                .num_workers(1)
                .build(val);

        let logger = MetricsLogger::new(self.checkpoints.dir())?;
        let mut scheduler = PlateauScheduler::new(cfg.learning_rate, cfg.lr_factor, cfg.lr_patience, cfg.min_lr);
        let mut stopper   = EarlyStopping::new(cfg.early_stopping_patience);
        let mut history   = Vec::new();
        let mut stopped_early = false;
        let mut cancelled     = false;
        let mut reports   = ReportSchedule::new(cfg.report_every);

        // ── Epoch loop ───────────────────────────────────────────────────────
        for epoch in 1..=cfg.epochs {
            if self.cancel.load(Ordering::SeqCst) {
                tracing::warn!("Training cancelled before epoch {}", epoch);
                if let Some(pending) = reports.flush() {
                    self.log_report(&pending);
                }
                cancelled = true;
                break;
            }
            let lr = scheduler.lr();

            // ── Training phase ───────────────────────────────────────────────
            let mut loss_sum = 0.0f64;
            let mut batches  = 0usize;
            let mut correct  = 0usize;

            for (index, batch) in train_loader.iter().enumerate() {
                let (loss, logits) =
                    model.forward_loss(batch.token_ids, batch.labels.clone(), &train_loss_fn);

                let loss_val = finite_loss(loss.clone().into_scalar().elem::<f64>(), "training", epoch, index + 1)?;
                loss_sum += loss_val;
                batches  += 1;
                correct  += count_correct(logits, batch.labels);

                let mut grads = GradientsParams::from_grads(loss.backward(), &model);
                clip_global_norm::<B, _>(&model, &mut grads, cfg.max_grad_norm);
                model = optim.step(lr, model, grads);
            }

            let train_metrics = PhaseMetrics {
                loss:     loss_sum / batches.max(1) as f64,
                accuracy: correct as f64 / train_samples.max(1) as f64,
            };

            // ── Validation phase ─────────────────────────────────────────────
            let model_valid = model.valid();
            let mut val_loss_sum = 0.0f64;
            let mut val_batches  = 0usize;
            let mut truth        = Vec::new();
            let mut predicted    = Vec::new();

            for (index, batch) in val_loader.iter().enumerate() {
                let (loss, logits) =
                    model_valid.forward_loss(batch.token_ids, batch.labels.clone(), &val_loss_fn);
                val_loss_sum += finite_loss(loss.into_scalar().elem::<f64>(), "validation", epoch, index + 1)?;
                val_batches  += 1;

                truth.extend(int_values(batch.labels));
                predicted.extend(int_values(logits.argmax(1).flatten::<1>(0, 1)));
            }

            let val_correct = truth.iter().zip(&predicted).filter(|(t, p)| t == p).count();
            let val_metrics = PhaseMetrics {
                loss:     val_loss_sum / val_batches.max(1) as f64,
                accuracy: val_correct as f64 / truth.len().max(1) as f64,
            };

            let metrics = EpochMetrics::new(epoch, train_metrics, val_metrics, lr);
            tracing::info!(
                "Epoch {:>3}/{} | train_loss={:.4} | train_acc={:.1}% | val_loss={:.4} | val_acc={:.1}% | lr={:.2e}",
                epoch, cfg.epochs,
                metrics.train.loss, metrics.train.accuracy * 100.0,
                metrics.validation.loss, metrics.validation.accuracy * 100.0,
                lr,
            );
            logger.log(&metrics)?;
            history.push(metrics);

            // ── Early stopping / checkpoint ──────────────────────────────────
            let verdict = stopper.observe(epoch, val_metrics.loss);
            if verdict == EpochVerdict::Improved {
                let meta = CheckpointMeta::new(model_config, epoch, val_metrics.loss);
                self.checkpoints.save_best(&model_valid, &meta)?;
            }

            let is_last = epoch == cfg.epochs || verdict == EpochVerdict::Stop;
            if let Some(due) = reports.after_epoch(EpochPredictions { epoch, truth, predicted }, is_last) {
                self.log_report(&due);
            }

            if verdict == EpochVerdict::Stop {
                tracing::info!(
                    "Early stopping at epoch {} (best epoch {}, val_loss={:.4})",
                    epoch,
                    stopper.best_epoch(),
                    stopper.best_loss()
                );
                stopped_early = true;
                break;
            }

            scheduler.step(val_metrics.loss);
        }

        let history_path = logger.write_history(&history)?;
        tracing::info!("Training complete! History written to '{}'", history_path.display());

        Ok(TrainingOutcome {
            history,
            best_epoch: stopper.best_epoch(),
            best_val_loss: stopper.best_loss(),
            stopped_early,
            cancelled,
        })
    }

    fn log_report(&self, p: &EpochPredictions) {
        let report = ClassificationReport::from_predictions(&p.truth, &p.predicted, &self.class_names);
        tracing::info!("Classification report (epoch {}):\n{}", p.epoch, report);
    }
}

/// Per-class loss weight `1 / (count + 1)`; a class absent from the
/// training split gets weight 1.
fn class_weights(counts: &[usize]) -> Vec<f32> {
    counts.iter().map(|&c| 1.0 / (c as f32 + 1.0)).collect()
}

// ─── Report cadence ───────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
struct EpochPredictions {
    epoch:     usize,
    truth:     Vec<usize>,
    predicted: Vec<usize>,
}

/// Classification reports run on epoch 1, every `every` epochs and on
/// the final epoch (schedule end or early stop). An epoch that was not
/// reported is held so a cancelled run can still report it.
struct ReportSchedule {
    every:   usize,
    pending: Option<EpochPredictions>,
}

impl ReportSchedule {
    fn new(every: usize) -> Self {
        Self { every, pending: None }
    }

    fn is_due(&self, epoch: usize, is_last: bool) -> bool {
        epoch == 1 || epoch % self.every == 0 || is_last
    }

    /// The epoch's predictions if a report is due now.
    fn after_epoch(&mut self, p: EpochPredictions, is_last: bool) -> Option<EpochPredictions> {
        if self.is_due(p.epoch, is_last) {
            self.pending = None;
            Some(p)
        } else {
            self.pending = Some(p);
            None
        }
    }

    fn flush(&mut self) -> Option<EpochPredictions> {
        self.pending.take()
    }
}

fn finite_loss(value: f64, phase: &'static str, epoch: usize, batch: usize) -> Result<f64, TrainError> {
    if value.is_finite() {
        Ok(value)
    } else {
        tracing::error!("Non-finite {} loss at epoch {}, batch {}", phase, epoch, batch);
        Err(TrainError::Divergence { phase, epoch, batch })
    }
}

fn count_correct<B: Backend>(logits: Tensor<B, 2>, labels: Tensor<B, 1, Int>) -> usize {
    // argmax(1) returns [batch, 1]; flatten before comparing with [batch]
    let correct: i64 = logits
        .argmax(1)
        .flatten::<1>(0, 1)
        .equal(labels)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>();
    correct.max(0) as usize
}

fn int_values<B: Backend>(tensor: Tensor<B, 1, Int>) -> Vec<usize> {
    tensor
        .into_data()
        .iter::<i64>()
        .map(|v| v.max(0) as usize)
        .collect()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::ClassificationSample;
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray>;

    fn samples() -> Vec<ClassificationSample> {
        (0..18)
            .map(|i| {
                let label = i % 3;
                let base = 10 + 5 * label as u32;
                ClassificationSample {
                    token_ids: vec![4, base, base + 1, base + (i as u32 % 2), 0, 0],
                    label,
                }
            })
            .collect()
    }

    fn split() -> (ClassificationDataset, ClassificationDataset) {
        let all = samples();
        let (train, val): (Vec<_>, Vec<_>) = all.into_iter().enumerate().partition(|(i, _)| i % 4 != 0);
        let strip = |v: Vec<(usize, ClassificationSample)>| {
            ClassificationDataset::new(v.into_iter().map(|(_, s)| s).collect())
        };
        (strip(train), strip(val))
    }

    fn model_config() -> ClassifierConfig {
        ClassifierConfig::new(30, 3, 6).with_embed_dim(8).with_hidden_size(4)
    }

    fn trainer(dir: &std::path::Path, config: TrainerConfig) -> Trainer<TestBackend> {
        Trainer::new(config, Default::default(), CheckpointManager::new(dir))
            .with_class_names(vec!["a".into(), "b".into(), "c".into()])
    }

    #[test]
    fn test_short_run_records_history_and_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig { batch_size: 4, epochs: 2, ..TrainerConfig::default() };
        let (train, val) = split();

        let outcome = trainer(dir.path(), config).fit(&model_config(), train, val).unwrap();

        assert_eq!(outcome.history.len(), 2);
        assert!(outcome.best_epoch >= 1);
        for m in &outcome.history {
            assert!(m.train.loss.is_finite() && m.validation.loss.is_finite());
            assert!((0.0..=1.0).contains(&m.validation.accuracy));
        }
        let manager = CheckpointManager::new(dir.path());
        assert!(manager.meta_path().exists());
        assert!(manager.weights_path().exists());
        assert!(dir.path().join("history.json").exists());
        assert!(dir.path().join("metrics.csv").exists());
    }

    #[test]
    fn test_stops_six_epochs_after_last_improvement() {
        // lr = 0 freezes the weights, so validation loss never improves
        // after the first epoch.
        let dir = tempfile::tempdir().unwrap();
        let config = TrainerConfig {
            batch_size: 4,
            epochs: 20,
            learning_rate: 0.0,
            ..TrainerConfig::default()
        };
        let (train, val) = split();

        let outcome = trainer(dir.path(), config).fit(&model_config(), train, val).unwrap();

        assert!(outcome.stopped_early);
        assert_eq!(outcome.history.len(), 6);
        assert_eq!(outcome.best_epoch, 1);
        let meta = CheckpointManager::new(dir.path()).load_meta().unwrap();
        assert_eq!(meta.epoch, 1);
        assert_eq!(meta.num_classes, 3);
    }

    #[test]
    fn test_cancel_flag_checked_before_first_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let t = trainer(dir.path(), TrainerConfig { batch_size: 4, ..TrainerConfig::default() });
        t.cancel_flag().store(true, Ordering::SeqCst);
        let (train, val) = split();

        let outcome = t.fit(&model_config(), train, val).unwrap();
        assert!(outcome.cancelled);
        assert!(outcome.history.is_empty());
        assert_eq!(outcome.best_epoch, 0);
    }

    #[test]
    fn test_empty_validation_split_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (train, _) = split();
        let err = trainer(dir.path(), TrainerConfig::default())
            .fit(&model_config(), train, ClassificationDataset::new(Vec::new()))
            .unwrap_err();
        assert!(matches!(err, TrainError::EmptySplit("validation")));
    }

    #[test]
    fn test_non_finite_loss_is_divergence() {
        assert_eq!(finite_loss(0.5, "training", 1, 1).unwrap(), 0.5);
        let err = finite_loss(f64::NAN, "training", 3, 7).unwrap_err();
        assert!(matches!(err, TrainError::Divergence { phase: "training", epoch: 3, batch: 7 }));
        assert!(finite_loss(f64::INFINITY, "validation", 1, 1).is_err());
    }

    #[test]
    fn test_class_weights_inverse_count_plus_one() {
        let w = class_weights(&[3, 0, 9]);
        assert_eq!(w, vec![0.25, 1.0, 0.1]);

        let (train, _) = split();
        let counts = train.class_counts(4);
        assert_eq!(counts[3], 0);
        assert_eq!(class_weights(&counts)[3], 1.0);
    }

    fn predictions(epoch: usize) -> EpochPredictions {
        EpochPredictions { epoch, truth: vec![0, 1], predicted: vec![0, 0] }
    }

    #[test]
    fn test_report_cadence() {
        let mut schedule = ReportSchedule::new(5);
        let due: Vec<usize> = (1..=12)
            .filter_map(|e| schedule.after_epoch(predictions(e), e == 12))
            .map(|p| p.epoch)
            .collect();
        assert_eq!(due, vec![1, 5, 10, 12]);
        assert!(schedule.flush().is_none());

        // early stop at a non-multiple epoch still reports
        let mut schedule = ReportSchedule::new(5);
        assert_eq!(schedule.after_epoch(predictions(7), true).map(|p| p.epoch), Some(7));
    }

    #[test]
    fn test_cancel_reports_last_unreported_epoch() {
        let mut schedule = ReportSchedule::new(5);
        assert!(schedule.after_epoch(predictions(1), false).is_some());
        assert!(schedule.after_epoch(predictions(2), false).is_none());
        assert!(schedule.after_epoch(predictions(3), false).is_none());
        assert_eq!(schedule.flush(), Some(predictions(3)));
        assert!(schedule.flush().is_none());
    }

    #[test]
    fn test_divergence_aborts_and_keeps_best_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let (train, val) = split();
        let config = TrainerConfig { batch_size: 4, epochs: 1, ..TrainerConfig::default() };
        trainer(dir.path(), config).fit(&model_config(), train, val).unwrap();

        let manager = CheckpointManager::new(dir.path());
        let meta_before = manager.load_meta().unwrap();
        let weights_before = std::fs::read(manager.weights_path()).unwrap();

        // one training batch per epoch; an enormous step blows the weights up
        let (train, val) = split();
        let config = TrainerConfig {
            batch_size: 64,
            epochs: 3,
            learning_rate: 1e30,
            ..TrainerConfig::default()
        };
        let err = trainer(dir.path(), config).fit(&model_config(), train, val).unwrap_err();

        assert!(matches!(err, TrainError::Divergence { epoch: 1, .. }), "got {err:?}");
        assert_eq!(manager.load_meta().unwrap(), meta_before);
        assert_eq!(std::fs::read(manager.weights_path()).unwrap(), weights_before);
    }

    #[test]
    fn test_config_validation() {
        assert!(TrainerConfig::default().validate().is_ok());
        assert!(TrainerConfig { batch_size: 0, ..TrainerConfig::default() }.validate().is_err());
        assert!(TrainerConfig { lr_factor: 1.5, ..TrainerConfig::default() }.validate().is_err());
        assert!(TrainerConfig { learning_rate: f64::NAN, ..TrainerConfig::default() }.validate().is_err());
    }
}
