// ============================================================
// Layer 3 — Dataset Sources
// ============================================================
// Explicit registry mapping source identifiers to a fixed set of
// loader strategies, plus the domain tag each source applies to
// its questions.
//
//   SourceKind::Mmmu → splits dev / validation / test
//   SourceKind::Mmlu → splits train / validation / test
//
// Domain tag rules on the lower-cased identifier:
//   contains "clinical" or "medicine" → [MED]
//   contains "chemistry"              → [CHEM]
//   otherwise                         → [DIAG]

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Domain-control prefix placed before every question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DomainTag {
    Medical,
    Chemistry,
    Diagnostic,
}

impl DomainTag {
    pub fn for_source(source_id: &str) -> Self {
        let id = source_id.to_lowercase();
        if id.contains("clinical") || id.contains("medicine") {
            DomainTag::Medical
        } else if id.contains("chemistry") {
            DomainTag::Chemistry
        } else {
            DomainTag::Diagnostic
        }
    }

    /// The reserved tokenizer symbol for this tag.
    pub fn marker(self) -> &'static str {
        match self {
            DomainTag::Medical    => "[MED]",
            DomainTag::Chemistry  => "[CHEM]",
            DomainTag::Diagnostic => "[DIAG]",
        }
    }
}

/// Loader strategy for a dataset family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    Mmmu,
    Mmlu,
}

impl SourceKind {
    pub fn splits(self) -> &'static [&'static str] {
        match self {
            SourceKind::Mmmu => &["dev", "validation", "test"],
            SourceKind::Mmlu => &["train", "validation", "test"],
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Mmmu => f.pad("mmmu"),
            SourceKind::Mmlu => f.pad("mmlu"),
        }
    }
}

/// A resolved registry entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetSource {
    pub id:   String,
    pub kind: SourceKind,
    pub tag:  DomainTag,
}

impl DatasetSource {
    pub fn new(id: impl Into<String>, kind: SourceKind) -> Self {
        let id = id.into();
        let tag = DomainTag::for_source(&id);
        Self { id, kind, tag }
    }
}

pub const DEFAULT_SOURCES: [(&str, SourceKind); 11] = [
    ("MMMU/Biology", SourceKind::Mmmu),
    ("MMMU/Basic_Medical_Science", SourceKind::Mmmu),
    ("MMMU/Chemistry", SourceKind::Mmmu),
    ("MMMU/Clinical_Medicine", SourceKind::Mmmu),
    ("cais/mmlu/college_medicine", SourceKind::Mmlu),
    ("cais/mmlu/clinical_knowledge", SourceKind::Mmlu),
    ("cais/mmlu/nutrition", SourceKind::Mmlu),
    ("cais/mmlu/philosophy", SourceKind::Mmlu),
    ("cais/mmlu/human_aging", SourceKind::Mmlu),
    ("cais/mmlu/human_sexuality", SourceKind::Mmlu),
    ("cais/mmlu/medical_genetics", SourceKind::Mmlu),
];

/// Registry of known sources keyed by identifier.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: BTreeMap<String, DatasetSource>,
}

impl SourceRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        for (id, kind) in DEFAULT_SOURCES {
            registry.register(id, kind);
        }
        registry
    }

    pub fn register(&mut self, id: impl Into<String>, kind: SourceKind) -> &mut Self {
        let source = DatasetSource::new(id, kind);
        self.sources.insert(source.id.clone(), source);
        self
    }

    pub fn resolve(&self, id: &str) -> Option<&DatasetSource> {
        self.sources.get(id)
    }

    /// Identifiers of the default training mix, in registration order.
    pub fn default_ids() -> Vec<String> {
        DEFAULT_SOURCES.iter().map(|(id, _)| id.to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DatasetSource> {
        self.sources.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_rules() {
        assert_eq!(DomainTag::for_source("cais/mmlu/clinical_knowledge"), DomainTag::Medical);
        assert_eq!(DomainTag::for_source("cais/mmlu/college_medicine"), DomainTag::Medical);
        assert_eq!(DomainTag::for_source("MMMU/Clinical_Medicine"), DomainTag::Medical);
        assert_eq!(DomainTag::for_source("MMMU/Chemistry"), DomainTag::Chemistry);
        assert_eq!(DomainTag::for_source("cais/mmlu/nutrition"), DomainTag::Diagnostic);
    }

    #[test]
    fn test_defaults_resolve_to_explicit_kinds() {
        let registry = SourceRegistry::with_defaults();
        assert_eq!(registry.iter().count(), 11);
        assert_eq!(registry.resolve("MMMU/Biology").unwrap().kind, SourceKind::Mmmu);
        assert_eq!(
            registry.resolve("cais/mmlu/nutrition").unwrap().kind,
            SourceKind::Mmlu
        );
        assert!(registry.resolve("unknown/source").is_none());
    }

    #[test]
    fn test_kinds_read_different_splits() {
        assert!(SourceKind::Mmmu.splits().contains(&"dev"));
        assert!(SourceKind::Mmlu.splits().contains(&"train"));
    }
}
