// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between a dataset source id and a tensor batch.
//
//   <data_dir>/<source>/<split>.jsonl
//       │
//       ▼
//   JsonlCorpusSource      → raw (question, answer) rows
//       │
//       ▼
//   Preprocessor           → whitespace / control-char cleanup
//       │
//       ▼
//   CorpusPreparer         → domain tags, rare-class filter,
//       │                    answer mapping, tokenizer fit
//       ▼
//   stratified_split       → per-class train/validation split
//       │
//       ▼
//   ClassificationDataset  → Burn's Dataset trait
//       │
//       ▼
//   ClassificationBatcher  → stacked id / label tensors
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

/// Reads JSONL question/answer rows from a local mirror
pub mod loader;

/// Cleans and normalises raw question text
pub mod preprocessor;

/// Aggregates sources into encoded, split training data
pub mod corpus;

/// Implements Burn's Dataset trait for classification samples
pub mod dataset;

/// Implements Burn's Batcher trait to create tensor batches
pub mod batcher;

/// Stratified train/validation split
pub mod splitter;
