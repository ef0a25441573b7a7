// ============================================================
// Layer 5 — Inference Engine
// ============================================================
// Loads the three paired artifacts once and answers queries:
//
//   query → clean + [MED] prefix → encode (fixed length)
//         → forward pass (no autodiff, dropout off) → softmax
//         → rank top-k → compose_response
//
// Loading checks that the checkpoint, tokenizer and answer mapping
// agree on vocabulary size and class count.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use burn::{prelude::*, tensor::activation};

use crate::data::preprocessor::Preprocessor;
use crate::domain::answer_mapping::AnswerMapping;
use crate::domain::source::DomainTag;
use crate::error::{ArtifactError, InferenceError};
use crate::infra::checkpoint::{load_answers, CheckpointManager, ANSWERS_FILE, TOKENIZER_FILE};
use crate::infra::tokenizer_store::SubwordTokenizer;
use crate::ml::model::MedicalClassifier;
use crate::ml::response::{
    compose_response, rank_top_k, RankedClass, ResponsePolicy, PROCESSING_ERROR_MESSAGE,
};

/// Where the paired artifacts live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Holds `model.mpk` and `checkpoint.json`
    pub checkpoint_dir: PathBuf,
    pub tokenizer:      PathBuf,
    pub answers:        PathBuf,
}

impl ArtifactPaths {
    /// The layout written by a training run: everything in one directory.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            checkpoint_dir: dir.to_path_buf(),
            tokenizer:      dir.join(TOKENIZER_FILE),
            answers:        dir.join(ANSWERS_FILE),
        }
    }
}

/// Loaded, read-only classifier with its tokenizer and answer mapping.
///
/// Sharing: burn parameters cache lazily through a non-`Sync` cell, so
/// the engine is `Send` but not `Sync`. Give each thread its own
/// `clone()` instead of a shared reference. Clones share the weight
/// storage, tokenizer and mapping; no call mutates any of them, so all
/// clones answer identically without locking.
#[derive(Clone)]
pub struct InferenceEngine<B: Backend> {
    model:        MedicalClassifier<B>,
    tokenizer:    Arc<SubwordTokenizer>,
    answers:      Arc<AnswerMapping>,
    preprocessor: Preprocessor,
    policy:       ResponsePolicy,
    device:       B::Device,
}

impl<B: Backend> InferenceEngine<B> {
    pub fn load(paths: &ArtifactPaths, device: &B::Device) -> Result<Self, ArtifactError> {
        let manager = CheckpointManager::new(&paths.checkpoint_dir);
        let meta = manager.load_meta()?;

        let tokenizer = SubwordTokenizer::load(&paths.tokenizer, meta.max_seq_len)?;
        let answers = load_answers(&paths.answers)?;

        if tokenizer.vocab_size() != meta.vocab_size {
            return Err(ArtifactError::SchemaMismatch {
                field:      "vocab_size",
                checkpoint: meta.vocab_size,
                artifact:   tokenizer.vocab_size(),
            });
        }
        if answers.len() != meta.num_classes {
            return Err(ArtifactError::SchemaMismatch {
                field:      "num_classes",
                checkpoint: meta.num_classes,
                artifact:   answers.len(),
            });
        }

        let model = manager.load_model::<B>(&meta, device)?;
        tracing::info!(
            "Inference engine ready: {} classes, vocab_size={}",
            answers.len(),
            tokenizer.vocab_size()
        );

        Ok(Self {
            model,
            tokenizer: Arc::new(tokenizer),
            answers: Arc::new(answers),
            preprocessor: Preprocessor::new(),
            policy: ResponsePolicy::default(),
            device: device.clone(),
        })
    }

    pub fn with_policy(mut self, policy: ResponsePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Class probabilities for one query, indexed by class id.
    /// Queries carry the `[MED]` marker, like the training text.
    pub fn predict(&self, query: &str) -> Result<Vec<f64>, InferenceError> {
        let text = format!("{} {}", DomainTag::Medical.marker(), self.preprocessor.clean(query));
        let ids = self.tokenizer.encode_one(&text)?;
        let seq_len = ids.len();

        let flat: Vec<i32> = ids.iter().map(|&x| x as i32).collect();
        let input = Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([1, seq_len]);

        let probs: Vec<f64> = activation::softmax(self.model.forward(input), 1)
            .into_data()
            .iter::<f64>()
            .collect();

        if probs.len() != self.answers.len() {
            return Err(InferenceError::Readback(format!(
                "expected {} probabilities, got {}",
                self.answers.len(),
                probs.len()
            )));
        }
        Ok(probs)
    }

    /// The `top_k` most probable classes for `query`.
    pub fn rank(&self, query: &str, top_k: usize) -> Result<Vec<RankedClass>, InferenceError> {
        Ok(rank_top_k(&self.predict(query)?, top_k))
    }

    pub fn respond_top_k(&self, query: &str, top_k: usize) -> Result<String, InferenceError> {
        let ranked = self.rank(query, top_k)?;
        if let Some(top) = ranked.first() {
            tracing::debug!("Top class {} (p={:.4})", top.class_id, top.probability);
        }
        Ok(compose_response(query, &ranked, |id| self.answers.answer(id), &self.policy))
    }

    /// Answer with the policy's `top_k`; failures become the fixed
    /// processing-error message.
    pub fn respond(&self, query: &str) -> String {
        match self.respond_top_k(query, self.policy.top_k) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Error generating response: {}", e);
                PROCESSING_ERROR_MESSAGE.to_string()
            }
        }
    }
}
