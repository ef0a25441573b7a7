// ============================================================
// Error Taxonomy
// ============================================================
// Typed errors for the library layers. The application and CLI
// layers wrap these in anyhow with extra context.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while fitting, encoding with, or persisting the
/// subword tokenizer.
#[derive(Debug, Error)]
pub enum TokenizerError {
    /// The corpus is empty or too small for the segmentation trainer.
    #[error("tokenizer training failed: {0}")]
    TrainingFailure(String),

    /// A tokenizer artifact is missing or cannot be parsed.
    #[error("cannot load tokenizer artifact '{path}': {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    #[error("cannot save tokenizer artifact '{path}': {reason}")]
    ArtifactSave { path: PathBuf, reason: String },

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("decoding failed: {0}")]
    Decode(String),
}

/// Errors raised by corpus preparation.
#[derive(Debug, Error)]
pub enum CorpusError {
    /// Fewer than two answer classes survived rare-class filtering.
    #[error("insufficient data: {classes} class(es) with at least 2 examples, need at least 2")]
    InsufficientData { classes: usize },

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

/// Errors raised while loading or writing persisted artifacts
/// (checkpoint, tokenizer, answer mapping).
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// An artifact is missing or corrupt.
    #[error("cannot load artifact '{path}': {reason}")]
    ArtifactLoad { path: PathBuf, reason: String },

    /// The loaded artifacts disagree on a dimension.
    #[error("schema mismatch on {field}: checkpoint has {checkpoint}, artifact has {artifact}")]
    SchemaMismatch {
        field: &'static str,
        checkpoint: usize,
        artifact: usize,
    },

    #[error("cannot write artifact '{path}': {reason}")]
    Write { path: PathBuf, reason: String },

    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
}

/// Errors raised by the training loop.
#[derive(Debug, Error)]
pub enum TrainError {
    /// A batch produced a non-finite loss. The run is aborted so the
    /// persisted best checkpoint is never overwritten with corrupt weights.
    #[error("training diverged: non-finite {phase} loss at epoch {epoch}, batch {batch}")]
    Divergence {
        phase: &'static str,
        epoch: usize,
        batch: usize,
    },

    #[error("invalid training configuration: {0}")]
    InvalidConfig(String),

    #[error("{0} split is empty")]
    EmptySplit(&'static str),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Errors raised by a single inference call.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),

    #[error("cannot read model output: {0}")]
    Readback(String),
}
