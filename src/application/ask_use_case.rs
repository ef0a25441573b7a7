// ============================================================
// Layer 2 — Ask Use Case
// ============================================================
// Load-once, use-many question answering.
//
// MedicalAssistant owns an optional InferenceEngine built at
// construction. If the artifacts fail to load, the failure is
// logged once and every query gets the fixed "model unavailable"
// reply instead of an error, so callers never crash on a bad
// deployment.

use std::path::Path;

use burn::prelude::*;

use crate::domain::traits::Responder;
use crate::ml::inferencer::{ArtifactPaths, InferenceEngine};
use crate::ml::response::{ResponsePolicy, MODEL_UNAVAILABLE_MESSAGE};

type InferBackend = burn::backend::Wgpu;

// ─── MedicalAssistant ─────────────────────────────────────────────────────────
/// Built once at startup. Clone it per worker thread: clones share the
/// loaded engine's weights and artifacts (see `InferenceEngine`).
#[derive(Clone)]
pub struct MedicalAssistant<B: Backend> {
    engine: Option<InferenceEngine<B>>,
}

impl<B: Backend> MedicalAssistant<B> {
    pub fn load(paths: &ArtifactPaths, device: &B::Device) -> Self {
        Self::load_with_policy(paths, device, ResponsePolicy::default())
    }

    pub fn load_with_policy(paths: &ArtifactPaths, device: &B::Device, policy: ResponsePolicy) -> Self {
        match InferenceEngine::<B>::load(paths, device) {
            Ok(engine) => Self { engine: Some(engine.with_policy(policy)) },
            Err(e) => {
                tracing::error!("Error loading model: {}", e);
                Self { engine: None }
            }
        }
    }

    pub fn from_engine(engine: InferenceEngine<B>) -> Self {
        Self { engine: Some(engine) }
    }

    /// For health checks.
    pub fn is_model_loaded(&self) -> bool {
        self.engine.is_some()
    }
}

impl<B: Backend> Responder for MedicalAssistant<B> {
    fn respond(&self, query: &str) -> String {
        match &self.engine {
            Some(engine) => engine.respond(query),
            None => MODEL_UNAVAILABLE_MESSAGE.to_string(),
        }
    }
}

// ─── AskUseCase ───────────────────────────────────────────────────────────────
pub struct AskUseCase {
    assistant: MedicalAssistant<InferBackend>,
}

impl AskUseCase {
    /// Load the artifacts written by a training run into `artifact_dir`.
    pub fn new(artifact_dir: impl AsRef<Path>, top_k: usize) -> Self {
        let device = burn::backend::wgpu::WgpuDevice::default();
        let paths  = ArtifactPaths::in_dir(artifact_dir);
        let policy = ResponsePolicy { top_k, ..ResponsePolicy::default() };
        Self { assistant: MedicalAssistant::load_with_policy(&paths, &device, policy) }
    }

    pub fn is_model_loaded(&self) -> bool {
        self.assistant.is_model_loaded()
    }

    pub fn answer(&self, question: &str) -> String {
        self.assistant.respond(question)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::inferencer::tests::{write_artifacts, NUM_CLASSES};
    use burn::backend::NdArray;

    #[test]
    fn test_missing_artifacts_give_unavailable_message() {
        let dir = tempfile::tempdir().unwrap();
        let assistant =
            MedicalAssistant::<NdArray>::load(&ArtifactPaths::in_dir(dir.path()), &Default::default());
        assert!(!assistant.is_model_loaded());
        assert_eq!(assistant.respond("what is insulin?"), MODEL_UNAVAILABLE_MESSAGE);
    }

    #[test]
    fn test_assistant_clones_serve_concurrent_callers() {
        let dir = tempfile::tempdir().unwrap();
        let mut bias = vec![0.0; NUM_CLASSES];
        bias[7] = 6.0;
        let paths = write_artifacts(dir.path(), Some(bias), NUM_CLASSES);
        let engine = InferenceEngine::<NdArray>::load(&paths, &Default::default()).unwrap();
        let assistant = MedicalAssistant::from_engine(engine);
        assert!(assistant.is_model_loaded());

        let query = "what treats fever number 0?";
        let replies: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..3)
                .map(|_| {
                    let worker = assistant.clone();
                    scope.spawn(move || worker.respond(query))
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(replies.iter().all(|r| *r == replies[0]));
        assert!(replies[0].contains("The most likely answer is: answer 7"));
    }
}
