// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Plain Rust types and traits describing the classification
// problem: labelled examples, dataset sources, the answer index
// mapping, and the seams other layers implement.
//
// No burn types, no file I/O in this layer.

/// A question/answer pair tagged with its domain marker
pub mod labeled_example;

/// Dataset source registry and domain tags
pub mod source;

/// Ordered answer strings indexed by class id
pub mod answer_mapping;

/// Core abstractions (traits) that other layers implement
pub mod traits;
