// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Persistence and reporting shared by training and inference:
//
//   tokenizer_store.rs — BPE subword tokenizer: fit, encode to
//                        fixed length, decode, save/load
//                        tokenizer.json
//
//   checkpoint.rs      — best-model weights (full-precision MessagePack),
//                        checkpoint.json metadata, answer mapping
//
//   metrics.rs         — per-epoch CSV, history.json and the
//                        per-class classification report
//
// Reference: Burn Book §5 (Checkpointing)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Tokenizer training, saving, and loading
pub mod tokenizer_store;

/// Training metrics CSV logger and classification report
pub mod metrics;
