// ============================================================
// Layer 6 — Subword Tokenizer Store
// ============================================================
// Trains a byte-pair-encoding subword model with the HuggingFace
// `tokenizers` crate, converts text to fixed-length id sequences,
// and persists the trained model as a `tokenizer.json` artifact.
//
// Reserved ids (assigned by the trainer in this order):
//   0 <pad>   1 <unk>   2 <s>   3 </s>
//   4 [MED]   5 [CHEM]  6 [DIAG]
//   7 <sep>   8 <cls>   9 <mask>
//
// Pipeline: NFKC normaliser → metaspace pre-tokeniser → BPE →
// metaspace decoder (sentencepiece-style "▁" word boundaries).
//
// Reference: Sennrich et al. (2016) BPE paper

use std::path::Path;

use serde::{Deserialize, Serialize};
use tokenizers::decoders::DecoderWrapper;
use tokenizers::models::bpe::{BpeTrainerBuilder, BPE};
use tokenizers::normalizers::unicode::NFKC;
use tokenizers::normalizers::NormalizerWrapper;
use tokenizers::pre_tokenizers::metaspace::Metaspace;
use tokenizers::pre_tokenizers::PreTokenizerWrapper;
use tokenizers::processors::PostProcessorWrapper;
use tokenizers::{AddedToken, Tokenizer, TokenizerBuilder, TokenizerImpl};

use crate::error::TokenizerError;

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const BOS_ID: u32 = 2;
pub const EOS_ID: u32 = 3;

pub const PAD_TOKEN: &str = "<pad>";
pub const UNK_TOKEN: &str = "<unk>";

/// Control and user symbols in id order. The first four are the
/// pad/unk/bos/eos ids above.
pub const RESERVED_TOKENS: [&str; 10] = [
    PAD_TOKEN, UNK_TOKEN, "<s>", "</s>",
    "[MED]", "[CHEM]", "[DIAG]",
    "<sep>", "<cls>", "<mask>",
];

/// Settings for fitting a tokenizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    /// Target number of pieces, reserved tokens included.
    pub vocab_size:  usize,
    /// Every encoded sequence is truncated or padded to this length.
    pub max_seq_len: usize,
    /// Pairs seen fewer times than this are never merged.
    pub min_frequency: u64,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            vocab_size:    32_000,
            max_seq_len:   512,
            min_frequency: 0,
        }
    }
}

type TrainableTokenizer = TokenizerImpl<
    BPE,
    NormalizerWrapper,
    PreTokenizerWrapper,
    PostProcessorWrapper,
    DecoderWrapper,
>;

/// A trained subword tokenizer producing fixed-length sequences.
///
/// Immutable after `fit` or `load`; safe to share between threads.
#[derive(Clone)]
pub struct SubwordTokenizer {
    inner:       Tokenizer,
    max_seq_len: usize,
}

impl std::fmt::Debug for SubwordTokenizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubwordTokenizer")
            .field("vocab_size", &self.vocab_size())
            .field("max_seq_len", &self.max_seq_len)
            .finish()
    }
}

impl SubwordTokenizer {
    /// Train a BPE model on `corpus`.
    ///
    /// Fails with `TrainingFailure` when the corpus has no non-blank
    /// text or when the trainer itself rejects it.
    pub fn fit<S: AsRef<str> + Send>(
        corpus: &[S],
        config: &TokenizerConfig,
    ) -> Result<Self, TokenizerError> {
        if config.max_seq_len == 0 {
            return Err(TokenizerError::TrainingFailure(
                "max_seq_len must be positive".to_string(),
            ));
        }
        let lines: Vec<&str> = corpus
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(TokenizerError::TrainingFailure(
                "corpus contains no non-empty sentence".to_string(),
            ));
        }
        if config.vocab_size <= RESERVED_TOKENS.len() {
            return Err(TokenizerError::TrainingFailure(format!(
                "vocab_size {} leaves no room beyond {} reserved tokens",
                config.vocab_size,
                RESERVED_TOKENS.len()
            )));
        }

        tracing::info!(
            "Training BPE tokenizer on {} sentences (target vocab_size={})",
            lines.len(),
            config.vocab_size
        );

        let model = BPE::builder()
            .unk_token(UNK_TOKEN.to_string())
            .build()
            .map_err(|e| TokenizerError::TrainingFailure(e.to_string()))?;

        let mut tokenizer: TrainableTokenizer = TokenizerBuilder::<
            BPE,
            NormalizerWrapper,
            PreTokenizerWrapper,
            PostProcessorWrapper,
            DecoderWrapper,
        >::new()
            .with_model(model)
            .with_normalizer(Some(NFKC.into()))
            .with_pre_tokenizer(Some(Metaspace::default().into()))
            .with_post_processor(None)
            .with_decoder(Some(Metaspace::default().into()))
            .build()
            .map_err(|e| TokenizerError::TrainingFailure(e.to_string()))?;

        let special_tokens: Vec<AddedToken> = RESERVED_TOKENS
            .iter()
            .map(|t| AddedToken::from(t.to_string(), true))
            .collect();

        let mut trainer = BpeTrainerBuilder::new()
            .show_progress(false)
            .vocab_size(config.vocab_size)
            .min_frequency(config.min_frequency)
            .special_tokens(special_tokens)
            .build();

        tokenizer
            .train(&mut trainer, lines.into_iter())
            .map_err(|e| TokenizerError::TrainingFailure(e.to_string()))?;

        // Re-read through the serialised form so the trained model is held
        // as the same wrapper type `load` produces.
        let json = tokenizer
            .to_string(false)
            .map_err(|e| TokenizerError::TrainingFailure(e.to_string()))?;
        let inner = json
            .parse::<Tokenizer>()
            .map_err(|e| TokenizerError::TrainingFailure(e.to_string()))?;

        let trained = Self { inner, max_seq_len: config.max_seq_len };
        tracing::info!("Tokenizer trained with {} pieces", trained.vocab_size());
        Ok(trained)
    }

    /// Restore a tokenizer saved with [`SubwordTokenizer::save`].
    pub fn load(path: impl AsRef<Path>, max_seq_len: usize) -> Result<Self, TokenizerError> {
        let path = path.as_ref();
        let inner = Tokenizer::from_file(path).map_err(|e| TokenizerError::ArtifactLoad {
            path:   path.to_path_buf(),
            reason: e.to_string(),
        })?;
        for (expected, token) in RESERVED_TOKENS.iter().enumerate() {
            if inner.token_to_id(token) != Some(expected as u32) {
                return Err(TokenizerError::ArtifactLoad {
                    path:   path.to_path_buf(),
                    reason: format!("reserved token {token} is not at id {expected}"),
                });
            }
        }
        tracing::debug!("Loaded tokenizer from '{}'", path.display());
        Ok(Self { inner, max_seq_len })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TokenizerError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TokenizerError::ArtifactSave {
                path:   path.to_path_buf(),
                reason: e.to_string(),
            })?;
        }
        self.inner
            .save(path, false)
            .map_err(|e| TokenizerError::ArtifactSave {
                path:   path.to_path_buf(),
                reason: e.to_string(),
            })?;
        tracing::info!("Tokenizer saved to '{}'", path.display());
        Ok(())
    }

    /// Encode each text to exactly `max_seq_len` ids: truncated when
    /// longer, right-padded with `PAD_ID` when shorter.
    pub fn encode<S: AsRef<str>>(&self, texts: &[S]) -> Result<Vec<Vec<u32>>, TokenizerError> {
        texts.iter().map(|t| self.encode_one(t.as_ref())).collect()
    }

    pub fn encode_one(&self, text: &str) -> Result<Vec<u32>, TokenizerError> {
        let encoding = self
            .inner
            .encode(text, false)
            .map_err(|e| TokenizerError::Encode(e.to_string()))?;
        let mut ids: Vec<u32> = encoding.get_ids().to_vec();
        ids.truncate(self.max_seq_len);
        ids.resize(self.max_seq_len, PAD_ID);
        Ok(ids)
    }

    /// Strip padding and reconstruct approximate text. Lossy at
    /// whitespace boundaries; meant for diagnostics.
    pub fn decode(&self, sequences: &[Vec<u32>]) -> Result<Vec<String>, TokenizerError> {
        sequences
            .iter()
            .map(|seq| {
                let ids: Vec<u32> = seq.iter().copied().filter(|&id| id != PAD_ID).collect();
                self.inner
                    .decode(&ids, false)
                    .map_err(|e| TokenizerError::Decode(e.to_string()))
            })
            .collect()
    }

    /// Number of pieces including reserved tokens. Every encoded id is
    /// strictly below this value.
    pub fn vocab_size(&self) -> usize {
        self.inner.get_vocab_size(true)
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> Vec<String> {
        [
            "[MED] What are the symptoms of diabetes?",
            "[MED] What causes high blood pressure?",
            "[CHEM] What is the molecular weight of glucose?",
            "[DIAG] How is anemia diagnosed in adults?",
            "[MED] Which vitamin deficiency causes scurvy?",
            "[DIAG] What does an elevated white blood cell count indicate?",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect()
    }

    fn config() -> TokenizerConfig {
        TokenizerConfig { vocab_size: 100, max_seq_len: 10, min_frequency: 0 }
    }

    #[test]
    fn test_reserved_ids_are_fixed() {
        let tok = SubwordTokenizer::fit(&corpus(), &config()).unwrap();
        assert_eq!(tok.inner.token_to_id(PAD_TOKEN), Some(PAD_ID));
        assert_eq!(tok.inner.token_to_id(UNK_TOKEN), Some(UNK_ID));
        assert_eq!(tok.inner.token_to_id("<s>"), Some(BOS_ID));
        assert_eq!(tok.inner.token_to_id("</s>"), Some(EOS_ID));
        assert_eq!(tok.inner.token_to_id("[MED]"), Some(4));
    }

    #[test]
    fn test_sequences_have_fixed_length_and_valid_ids() {
        let tok = SubwordTokenizer::fit(&corpus(), &config()).unwrap();
        let texts = vec![
            "hi",
            "[MED] What are the symptoms of a very long chain of medical words here?",
            "",
            "ünseen çharacters ✓",
        ];
        let seqs = tok.encode(&texts).unwrap();
        assert_eq!(seqs.len(), texts.len());
        for seq in &seqs {
            assert_eq!(seq.len(), 10);
            assert!(seq.iter().all(|&id| (id as usize) < tok.vocab_size()));
        }
        // Empty text is all padding.
        assert!(seqs[2].iter().all(|&id| id == PAD_ID));
        let decoded = tok.decode(&seqs).unwrap();
        assert_eq!(decoded.len(), texts.len());
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let tok = SubwordTokenizer::fit(&corpus(), &config()).unwrap();
        let a = tok.encode_one("What causes anemia?").unwrap();
        let b = tok.encode_one("What causes anemia?").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_domain_marker_is_a_single_piece() {
        let tok = SubwordTokenizer::fit(&corpus(), &config()).unwrap();
        let seq = tok.encode_one("[CHEM] glucose").unwrap();
        assert!(seq.contains(&5));
    }

    #[test]
    fn test_empty_corpus_fails() {
        let empty: Vec<String> = Vec::new();
        let err = SubwordTokenizer::fit(&empty, &config()).unwrap_err();
        assert!(matches!(err, TokenizerError::TrainingFailure(_)));

        let blank = vec!["   ".to_string(), String::new()];
        let err = SubwordTokenizer::fit(&blank, &config()).unwrap_err();
        assert!(matches!(err, TokenizerError::TrainingFailure(_)));
    }

    #[test]
    fn test_save_and_load_preserve_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        let tok = SubwordTokenizer::fit(&corpus(), &config()).unwrap();
        tok.save(&path).unwrap();

        let restored = SubwordTokenizer::load(&path, 10).unwrap();
        assert_eq!(restored.vocab_size(), tok.vocab_size());
        assert_eq!(
            restored.encode_one("What causes high blood pressure?").unwrap(),
            tok.encode_one("What causes high blood pressure?").unwrap(),
        );
    }

    #[test]
    fn test_load_missing_or_corrupt_artifact_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = SubwordTokenizer::load(dir.path().join("nope.json"), 10).unwrap_err();
        assert!(matches!(missing, TokenizerError::ArtifactLoad { .. }));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{not json").unwrap();
        let err = SubwordTokenizer::load(&corrupt, 10).unwrap_err();
        assert!(matches!(err, TokenizerError::ArtifactLoad { .. }));
    }
}
