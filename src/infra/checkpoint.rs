// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists the best model and the artifacts it must be paired
// with. Weights go through a full-precision named MessagePack
// recorder so reloaded probabilities match the trained model.
//
// Directory layout:
//   <dir>/
//     model.mpk            ← best weights (recorder adds the extension)
//     checkpoint.json      ← CheckpointMeta: dims + best epoch / loss
//     tokenizer.json       ← written by SubwordTokenizer::save
//     answer_mapping.json  ← flat JSON array, index = class id
//
// The weights are only overwritten on a strict validation-loss
// improvement, so the files on disk always hold the best model
// seen so far.
//
// Reference: Burn Book §5 (Records and Checkpointing)

use std::{
    fmt, fs,
    path::{Path, PathBuf},
};

use burn::{
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder},
};
use serde::{Deserialize, Serialize};

use crate::domain::answer_mapping::AnswerMapping;
use crate::error::ArtifactError;
use crate::ml::model::{ClassifierConfig, MedicalClassifier};

type WeightsRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

pub const MODEL_FILE:     &str = "model";
/// Extension the weights recorder appends to MODEL_FILE
pub const MODEL_EXT:      &str = "mpk";
pub const META_FILE:      &str = "checkpoint.json";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const ANSWERS_FILE:   &str = "answer_mapping.json";

/// Dimensions needed to rebuild the network, plus where the best
/// weights came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub vocab_size:  usize,
    pub max_seq_len: usize,
    pub num_classes: usize,
    pub embed_dim:   usize,
    pub hidden_size: usize,
    pub epoch:       usize,
    pub val_loss:    f64,
}

impl CheckpointMeta {
    pub fn new(config: &ClassifierConfig, epoch: usize, val_loss: f64) -> Self {
        Self {
            vocab_size:  config.vocab_size,
            max_seq_len: config.max_seq_len,
            num_classes: config.num_classes,
            embed_dim:   config.embed_dim,
            hidden_size: config.hidden_size,
            epoch,
            val_loss,
        }
    }

    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig::new(self.vocab_size, self.num_classes, self.max_seq_len)
            .with_embed_dim(self.embed_dim)
            .with_hidden_size(self.hidden_size)
    }
}

#[derive(Debug, Clone)]
pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Does not touch the filesystem; directories are created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path handed to the recorder, without extension.
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// The weights file as it exists on disk.
    pub fn weights_path(&self) -> PathBuf {
        self.model_path().with_extension(MODEL_EXT)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.dir.join(TOKENIZER_FILE)
    }

    pub fn answers_path(&self) -> PathBuf {
        self.dir.join(ANSWERS_FILE)
    }

    /// Overwrite the best checkpoint: weights first, then metadata.
    pub fn save_best<B: Backend>(
        &self,
        model: &MedicalClassifier<B>,
        meta:  &CheckpointMeta,
    ) -> Result<(), ArtifactError> {
        self.ensure_dir()?;

        let path = self.model_path();
        WeightsRecorder::new()
            .record(model.clone().into_record(), path.clone())
            .map_err(|e| write_error(&path, e))?;

        write_json(&self.meta_path(), meta)?;
        tracing::info!(
            "Saved best checkpoint (epoch {}, val_loss={:.4})",
            meta.epoch,
            meta.val_loss
        );
        Ok(())
    }

    pub fn load_meta(&self) -> Result<CheckpointMeta, ArtifactError> {
        read_json(&self.meta_path())
    }

    /// Rebuild the network from `meta` and restore its weights.
    pub fn load_model<B: Backend>(
        &self,
        meta:   &CheckpointMeta,
        device: &B::Device,
    ) -> Result<MedicalClassifier<B>, ArtifactError> {
        let path = self.model_path();
        let config = meta.classifier_config();
        config.validate().map_err(|e| load_error(&self.meta_path(), e))?;

        let record = <WeightsRecorder as Recorder<B>>::load(&WeightsRecorder::new(), path.clone(), device)
            .map_err(|e| load_error(&path, e))?;

        tracing::info!("Loaded checkpoint from epoch {}", meta.epoch);
        Ok(config.init::<B>(device).load_record(record))
    }

    pub fn save_answers(&self, answers: &AnswerMapping) -> Result<(), ArtifactError> {
        self.ensure_dir()?;
        write_json(&self.answers_path(), answers)
    }

    fn ensure_dir(&self) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.dir).map_err(|e| write_error(&self.dir, e))
    }
}

/// Read an answer mapping artifact from any path.
pub fn load_answers(path: &Path) -> Result<AnswerMapping, ArtifactError> {
    read_json(path)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| write_error(path, e))?;
    fs::write(path, json).map_err(|e| write_error(path, e))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T, ArtifactError> {
    let json = fs::read_to_string(path).map_err(|e| load_error(path, e))?;
    serde_json::from_str(&json).map_err(|e| load_error(path, e))
}

fn load_error(path: &Path, e: impl fmt::Display) -> ArtifactError {
    ArtifactError::ArtifactLoad { path: path.to_path_buf(), reason: e.to_string() }
}

fn write_error(path: &Path, e: impl fmt::Display) -> ArtifactError {
    ArtifactError::Write { path: path.to_path_buf(), reason: e.to_string() }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn tiny() -> ClassifierConfig {
        ClassifierConfig::new(30, 3, 6).with_embed_dim(8).with_hidden_size(4)
    }

    fn ids(device: &<TestBackend as Backend>::Device) -> Tensor<TestBackend, 2, Int> {
        Tensor::<TestBackend, 1, Int>::from_ints([4, 10, 11, 12, 0, 0].as_slice(), device)
            .reshape([1, 6])
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path().join("run"));
        let device = Default::default();
        let model = tiny().init::<TestBackend>(&device);
        let meta = CheckpointMeta::new(&tiny(), 3, 0.75);

        manager.save_best(&model, &meta).unwrap();
        assert!(manager.weights_path().exists());
        assert_eq!(manager.load_meta().unwrap(), meta);

        let restored: MedicalClassifier<TestBackend> = manager.load_model(&meta, &device).unwrap();
        let a: Vec<f32> = model.forward(ids(&device)).into_data().to_vec().unwrap();
        let b: Vec<f32> = restored.forward(ids(&device)).into_data().to_vec().unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x - y).abs() < 1e-6, "{x} vs {y}");
        }
    }

    #[test]
    fn test_weights_extension_matches_recorder() {
        use burn::record::FileRecorder;
        assert_eq!(<WeightsRecorder as FileRecorder<TestBackend>>::file_extension(), MODEL_EXT);
        let manager = CheckpointManager::new("run");
        assert_eq!(manager.weights_path(), PathBuf::from("run").join("model.mpk"));
    }

    #[test]
    fn test_missing_checkpoint_is_artifact_load_error() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        assert!(matches!(manager.load_meta(), Err(ArtifactError::ArtifactLoad { .. })));

        let meta = CheckpointMeta::new(&tiny(), 1, 1.0);
        let result = manager.load_model::<TestBackend>(&meta, &Default::default());
        assert!(matches!(result, Err(ArtifactError::ArtifactLoad { .. })));
    }

    #[test]
    fn test_answers_round_trip_as_flat_array() {
        let dir = tempfile::tempdir().unwrap();
        let manager = CheckpointManager::new(dir.path());
        let answers = AnswerMapping::from_answers(["Insulin", "Aspirin"]);
        manager.save_answers(&answers).unwrap();

        let raw = fs::read_to_string(manager.answers_path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!(["Insulin", "Aspirin"]));

        assert_eq!(load_answers(&manager.answers_path()).unwrap(), answers);
    }

    #[test]
    fn test_corrupt_answers_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(ANSWERS_FILE);
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_answers(&path), Err(ArtifactError::ArtifactLoad { .. })));
    }
}
