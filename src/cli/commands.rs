// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the subcommands `train`, `ask` and `sources` and all
// their configurable flags.
//
// Reference: Rust Book §12 (Building a CLI Program)

use std::path::PathBuf;

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the classifier on local dataset mirrors
    Train(TrainArgs),

    /// Answer a medical question with a trained model
    Ask(AskArgs),

    /// List the registered dataset sources
    Sources,
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Root of the local mirror: <data-dir>/<source id>/<split>.jsonl
    #[arg(long, default_value = "data")]
    pub data_dir: PathBuf,

    /// Where the checkpoint, tokenizer and answer mapping are written
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    /// Source id to train on (repeatable); defaults to all registered sources
    #[arg(long = "source")]
    pub sources: Vec<String>,

    /// Target subword vocabulary size
    #[arg(long, default_value_t = 32_000)]
    pub vocab_size: usize,

    /// Every question is truncated or padded to this many tokens
    #[arg(long, default_value_t = 512)]
    pub max_seq_len: usize,

    #[arg(long, default_value_t = 256)]
    pub embed_dim: usize,

    /// LSTM hidden size per direction
    #[arg(long, default_value_t = 256)]
    pub hidden_size: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    /// Upper bound; early stopping usually ends the run sooner
    #[arg(long, default_value_t = 20)]
    pub epochs: usize,

    #[arg(long, default_value_t = 2e-4)]
    pub lr: f64,

    #[arg(long, default_value_t = 0.01)]
    pub weight_decay: f64,

    /// Global gradient-norm ceiling
    #[arg(long, default_value_t = 1.0)]
    pub max_grad_norm: f64,

    /// Validation epochs without improvement before stopping
    #[arg(long, default_value_t = 5)]
    pub patience: usize,

    /// Share of every class held out for validation
    #[arg(long, default_value_t = 0.2)]
    pub val_fraction: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_dir:                a.data_dir,
            artifact_dir:            a.artifact_dir,
            sources:                 a.sources,
            vocab_size:              a.vocab_size,
            max_seq_len:             a.max_seq_len,
            embed_dim:               a.embed_dim,
            hidden_size:             a.hidden_size,
            batch_size:              a.batch_size,
            epochs:                  a.epochs,
            learning_rate:           a.lr,
            weight_decay:            a.weight_decay,
            max_grad_norm:           a.max_grad_norm,
            early_stopping_patience: a.patience,
            val_fraction:            a.val_fraction,
            seed:                    a.seed,
            ..TrainConfig::default()
        }
    }
}

/// All arguments for the `ask` command
#[derive(Args, Debug)]
pub struct AskArgs {
    /// The medical question to answer
    #[arg(long)]
    pub question: String,

    /// Directory written by `train`
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    /// Number of ranked classes considered for the reply
    #[arg(long, default_value_t = 3)]
    pub top_k: usize,
}
