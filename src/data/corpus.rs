// ============================================================
// Layer 4 — Corpus Preparation
// ============================================================
// Turns a list of dataset source ids into encoded, stratified
// train/validation splits:
//
//   Step 1: Load and tag every source    (per-source failures skipped)
//   Step 2: Drop answers seen only once  (hard policy, not tunable)
//   Step 3: Build the answer mapping     (first-seen order)
//   Step 4: Fit the tokenizer and encode
//   Step 5: Stratified split
//
// A class needs at least two members to be represented in both
// partitions, so singletons are removed before anything else.

use std::collections::HashMap;

use crate::data::preprocessor::Preprocessor;
use crate::data::splitter::stratified_split;
use crate::domain::answer_mapping::AnswerMapping;
use crate::domain::labeled_example::LabeledExample;
use crate::domain::source::SourceRegistry;
use crate::domain::traits::CorpusSource;
use crate::error::CorpusError;
use crate::infra::tokenizer_store::{SubwordTokenizer, TokenizerConfig};

/// Minimum number of examples an answer needs to become a class.
pub const MIN_CLASS_SIZE: usize = 2;

/// Output of [`CorpusPreparer::prepare`].
#[derive(Debug, Clone)]
pub struct PreparedCorpus {
    pub train_sequences: Vec<Vec<u32>>,
    pub val_sequences:   Vec<Vec<u32>>,
    pub train_labels:    Vec<usize>,
    pub val_labels:      Vec<usize>,
    pub num_classes:     usize,
    pub answers:         AnswerMapping,
    pub tokenizer:       SubwordTokenizer,
}

pub struct CorpusPreparer<S: CorpusSource> {
    registry:     SourceRegistry,
    source:       S,
    preprocessor: Preprocessor,
    tokenizer:    TokenizerConfig,
    val_fraction: f64,
    seed:         u64,
}

impl<S: CorpusSource> CorpusPreparer<S> {
    pub fn new(registry: SourceRegistry, source: S, tokenizer: TokenizerConfig) -> Self {
        Self {
            registry,
            source,
            preprocessor: Preprocessor::new(),
            tokenizer,
            val_fraction: 0.2,
            seed:         42,
        }
    }

    pub fn with_val_fraction(mut self, val_fraction: f64) -> Self {
        self.val_fraction = val_fraction;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Load one source and tag its questions.
    ///
    /// Unknown ids and loader failures are logged and yield an empty
    /// list; they never abort the pipeline.
    pub fn load_domain_dataset(&self, source_id: &str) -> Vec<LabeledExample> {
        let Some(source) = self.registry.resolve(source_id) else {
            tracing::warn!("Unknown dataset source '{}', skipping", source_id);
            return Vec::new();
        };

        let records = match self.source.fetch(source) {
            Ok(records) => records,
            Err(e) => {
                tracing::warn!("Error loading {}: {:#}", source_id, e);
                return Vec::new();
            }
        };

        records
            .into_iter()
            .filter_map(|r| {
                let question = self.preprocessor.clean(&r.question);
                let answer   = r.answer.trim().to_string();
                if question.is_empty() || answer.is_empty() {
                    return None;
                }
                Some(LabeledExample::new(question, source.tag, answer))
            })
            .collect()
    }

    pub fn prepare<I: AsRef<str>>(&self, source_ids: &[I]) -> Result<PreparedCorpus, CorpusError> {
        // ── Step 1: Aggregate ────────────────────────────────────────────────
        let examples: Vec<LabeledExample> = source_ids
            .iter()
            .flat_map(|id| self.load_domain_dataset(id.as_ref()))
            .collect();
        tracing::info!("Aggregated {} examples from {} sources", examples.len(), source_ids.len());

        // ── Step 2: Drop rare answers ────────────────────────────────────────
        let kept = filter_rare_classes(examples);

        // ── Step 3: Answer mapping ───────────────────────────────────────────
        let answers = AnswerMapping::from_answers(kept.iter().map(|e| e.answer.as_str()));
        if answers.len() < MIN_CLASS_SIZE {
            return Err(CorpusError::InsufficientData { classes: answers.len() });
        }
        let index = answers.index();
        let labels: Vec<usize> = kept
            .iter()
            .filter_map(|e| index.get(e.answer.as_str()).copied())
            .collect();
        tracing::info!("{} examples across {} classes", kept.len(), answers.len());

        // ── Step 4: Tokenize ─────────────────────────────────────────────────
        let texts: Vec<&str> = kept.iter().map(|e| e.tagged_text.as_str()).collect();
        let tokenizer = SubwordTokenizer::fit(&texts, &self.tokenizer)?;
        let sequences = tokenizer.encode(&texts)?;

        // ── Step 5: Stratified split ─────────────────────────────────────────
        let split = stratified_split(&labels, self.val_fraction, self.seed);
        let pick_seqs   = |idx: &[usize]| idx.iter().map(|&i| sequences[i].clone()).collect::<Vec<_>>();
        let pick_labels = |idx: &[usize]| idx.iter().map(|&i| labels[i]).collect::<Vec<_>>();

        Ok(PreparedCorpus {
            train_sequences: pick_seqs(&split.train),
            val_sequences:   pick_seqs(&split.val),
            train_labels:    pick_labels(&split.train),
            val_labels:      pick_labels(&split.val),
            num_classes:     answers.len(),
            answers,
            tokenizer,
        })
    }
}

/// Remove every example whose answer occurs fewer than
/// [`MIN_CLASS_SIZE`] times in the aggregate.
pub fn filter_rare_classes(examples: Vec<LabeledExample>) -> Vec<LabeledExample> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for e in &examples {
        *counts.entry(e.answer.as_str()).or_insert(0) += 1;
    }
    let keep: Vec<bool> = examples
        .iter()
        .map(|e| counts.get(e.answer.as_str()).copied().unwrap_or(0) >= MIN_CLASS_SIZE)
        .collect();

    let before = examples.len();
    let kept: Vec<LabeledExample> = examples
        .into_iter()
        .zip(keep)
        .filter_map(|(e, k)| k.then_some(e))
        .collect();
    if kept.len() < before {
        tracing::info!("Dropped {} examples with singleton answers", before - kept.len());
    }
    kept
}
