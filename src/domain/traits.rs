// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================

use anyhow::Result;

use crate::domain::labeled_example::QaRecord;
use crate::domain::source::DatasetSource;

// ─── CorpusSource ─────────────────────────────────────────────────────────────
/// External collaborator that yields (question, answer) rows for a
/// registered dataset source.
///
/// Implementations:
///   - JsonlCorpusSource → reads `<data_dir>/<source id>/<split>.jsonl`
///
/// An unavailable source should come back as an empty vector. Errors
/// that do escape are logged and skipped by corpus preparation.
pub trait CorpusSource {
    fn fetch(&self, source: &DatasetSource) -> Result<Vec<QaRecord>>;
}

// ─── Responder ────────────────────────────────────────────────────────────────
/// Caller-facing inference surface: UTF-8 query in, UTF-8 response
/// out, no side effects.
///
/// Implementations:
///   - MedicalAssistant → confidence-gated classifier with fallback
pub trait Responder {
    fn respond(&self, query: &str) -> String;
}
