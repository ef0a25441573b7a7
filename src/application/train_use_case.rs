// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate the configuration
//   Step 2: Load, tag, filter and split the corpus  (Layer 4 - data)
//   Step 3: Persist tokenizer, answer mapping,
//           and the run configuration              (Layer 6 - infra)
//   Step 4: Build Burn datasets                     (Layer 4 - data)
//   Step 5: Run the training loop                   (Layer 5 - ml)
//
// Everything a later `ask` needs ends up in `artifact_dir`.
//
// Reference: Burn Book §5 (Training)

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{atomic::AtomicBool, Arc},
};

use anyhow::{Context, Result};
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use crate::data::{
    corpus::CorpusPreparer,
    dataset::ClassificationDataset,
    loader::JsonlCorpusSource,
};
use crate::domain::source::SourceRegistry;
use crate::error::TrainError;
use crate::infra::{
    checkpoint::CheckpointManager,
    tokenizer_store::TokenizerConfig,
};
use crate::ml::{
    inferencer::ArtifactPaths,
    model::ClassifierConfig,
    trainer::{Trainer, TrainerConfig, TrainingOutcome},
};

type TrainBackend = burn::backend::Autodiff<burn::backend::Wgpu>;

pub const RUN_CONFIG_FILE: &str = "train_config.json";

// ─── Training Configuration ──────────────────────────────────────────────────
// All settings for a training run, saved next to the artifacts so a
// run can be reproduced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    pub data_dir:     PathBuf,
    pub artifact_dir: PathBuf,
    /// Registry ids to train on; empty means the default mix
    pub sources:      Vec<String>,

    pub vocab_size:    usize,
    pub max_seq_len:   usize,
    pub min_frequency: u64,

    pub embed_dim:   usize,
    pub hidden_size: usize,

    pub batch_size:              usize,
    pub epochs:                  usize,
    pub learning_rate:           f64,
    pub weight_decay:            f64,
    pub max_grad_norm:           f64,
    pub lr_factor:               f64,
    pub lr_patience:             usize,
    pub min_lr:                  f64,
    pub early_stopping_patience: usize,
    pub report_every:            usize,
    pub val_fraction:            f64,
    pub seed:                    u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        let trainer = TrainerConfig::default();
        let tokenizer = TokenizerConfig::default();
        Self {
            data_dir:     PathBuf::from("data"),
            artifact_dir: PathBuf::from("artifacts"),
            sources:      Vec::new(),

            vocab_size:    tokenizer.vocab_size,
            max_seq_len:   tokenizer.max_seq_len,
            min_frequency: tokenizer.min_frequency,

            embed_dim:   256,
            hidden_size: 256,

            batch_size:              trainer.batch_size,
            epochs:                  trainer.epochs,
            learning_rate:           trainer.learning_rate,
            weight_decay:            trainer.weight_decay,
            max_grad_norm:           trainer.max_grad_norm,
            lr_factor:               trainer.lr_factor,
            lr_patience:             trainer.lr_patience,
            min_lr:                  trainer.min_lr,
            early_stopping_patience: trainer.early_stopping_patience,
            report_every:            trainer.report_every,
            val_fraction:            0.2,
            seed:                    trainer.seed,
        }
    }
}

impl TrainConfig {
    pub fn validate(&self) -> Result<(), TrainError> {
        if !(self.val_fraction > 0.0 && self.val_fraction < 1.0) {
            return Err(TrainError::InvalidConfig("val_fraction must be in (0, 1)".into()));
        }
        if self.max_seq_len == 0 {
            return Err(TrainError::InvalidConfig("max_seq_len must be > 0".into()));
        }
        if self.embed_dim == 0 || self.hidden_size < 2 {
            return Err(TrainError::InvalidConfig(
                "embed_dim must be > 0 and hidden_size >= 2".into(),
            ));
        }
        self.trainer_config().validate()
    }

    pub fn source_ids(&self) -> Vec<String> {
        if self.sources.is_empty() {
            SourceRegistry::default_ids()
        } else {
            self.sources.clone()
        }
    }

    pub fn tokenizer_config(&self) -> TokenizerConfig {
        TokenizerConfig {
            vocab_size:    self.vocab_size,
            max_seq_len:   self.max_seq_len,
            min_frequency: self.min_frequency,
        }
    }

    pub fn trainer_config(&self) -> TrainerConfig {
        TrainerConfig {
            batch_size:              self.batch_size,
            epochs:                  self.epochs,
            learning_rate:           self.learning_rate,
            weight_decay:            self.weight_decay,
            max_grad_norm:           self.max_grad_norm,
            lr_factor:               self.lr_factor,
            lr_patience:             self.lr_patience,
            min_lr:                  self.min_lr,
            early_stopping_patience: self.early_stopping_patience,
            report_every:            self.report_every,
            seed:                    self.seed,
        }
    }

    /// `vocab_size` is the trained tokenizer's actual size, which can
    /// be below the configured target on small corpora.
    pub fn classifier_config(&self, vocab_size: usize, num_classes: usize) -> ClassifierConfig {
        ClassifierConfig::new(vocab_size, num_classes, self.max_seq_len)
            .with_embed_dim(self.embed_dim)
            .with_hidden_size(self.hidden_size)
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct TrainSummary {
    pub outcome:     TrainingOutcome,
    pub num_classes: usize,
    pub train_size:  usize,
    pub val_size:    usize,
    pub artifacts:   ArtifactPaths,
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
pub struct TrainUseCase {
    config: TrainConfig,
    cancel: Arc<AtomicBool>,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config, cancel: Arc::new(AtomicBool::new(false)) }
    }

    /// Flag that stops training at the next epoch boundary when set.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Run on the default GPU backend.
    pub fn execute(&self) -> Result<TrainSummary> {
        let device = burn::backend::wgpu::WgpuDevice::default();
        tracing::info!("Using WGPU device: {:?}", device);
        self.execute_on::<TrainBackend>(device)
    }

    pub fn execute_on<B: AutodiffBackend>(&self, device: B::Device) -> Result<TrainSummary> {
        let cfg = &self.config;

        // ── Step 1: Validate ─────────────────────────────────────────────────
        cfg.validate().context("Invalid training configuration")?;

        // ── Step 2: Prepare the corpus ───────────────────────────────────────
        let source_ids = cfg.source_ids();
        tracing::info!(
            "Preparing corpus from {} sources under '{}'",
            source_ids.len(),
            cfg.data_dir.display()
        );
        let preparer = CorpusPreparer::new(
            SourceRegistry::with_defaults(),
            JsonlCorpusSource::new(&cfg.data_dir),
            cfg.tokenizer_config(),
        )
        .with_val_fraction(cfg.val_fraction)
        .with_seed(cfg.seed);
        let corpus = preparer.prepare(&source_ids).context("Corpus preparation failed")?;
        tracing::info!(
            "Split: {} train, {} validation, {} classes",
            corpus.train_labels.len(),
            corpus.val_labels.len(),
            corpus.num_classes
        );

        // ── Step 3: Persist inference artifacts ──────────────────────────────
        let checkpoints = CheckpointManager::new(&cfg.artifact_dir);
        corpus
            .tokenizer
            .save(checkpoints.tokenizer_path())
            .context("Failed to save tokenizer")?;
        checkpoints
            .save_answers(&corpus.answers)
            .context("Failed to save answer mapping")?;
        save_run_config(&cfg.artifact_dir, cfg)?;

        // ── Step 4: Build Burn datasets ──────────────────────────────────────
        let train = ClassificationDataset::from_parts(&corpus.train_sequences, &corpus.train_labels);
        let val   = ClassificationDataset::from_parts(&corpus.val_sequences, &corpus.val_labels);

        // ── Step 5: Train ────────────────────────────────────────────────────
        let model_config = cfg.classifier_config(corpus.tokenizer.vocab_size(), corpus.num_classes);
        let trainer = Trainer::<B>::new(cfg.trainer_config(), device, checkpoints)
            .with_class_names(corpus.answers.answers().to_vec())
            .with_cancel_flag(self.cancel_flag());
        let outcome = trainer
            .fit(&model_config, train, val)
            .context("Training failed")?;

        Ok(TrainSummary {
            outcome,
            num_classes: corpus.num_classes,
            train_size:  corpus.train_labels.len(),
            val_size:    corpus.val_labels.len(),
            artifacts:   ArtifactPaths::in_dir(&cfg.artifact_dir),
        })
    }
}

fn save_run_config(dir: &Path, cfg: &TrainConfig) -> Result<()> {
    let path = dir.join(RUN_CONFIG_FILE);
    let json = serde_json::to_string_pretty(cfg)?;
    fs::write(&path, json)
        .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
    tracing::debug!("Saved training config to '{}'", path.display());
    Ok(())
}
