// ============================================================
// Layer 5 — ML / Model Layer (Burn)
// ============================================================
// All network, optimisation and inference code.
//
//   model.rs      — MedicalClassifier: embedding + position bias,
//                   two residual BiLSTM blocks, dual attention
//                   pooling, three-layer ReLU head
//
//   clipping.rs   — global-norm gradient clipping across all
//                   parameters
//
//   schedule.rs   — reduce-on-plateau learning rate and early
//                   stopping state machines
//
//   trainer.rs    — epoch loop: weighted loss, AdamW, validation,
//                   best-checkpoint persistence, divergence checks
//
//   response.rs   — top-k ranking and confidence-gated text
//
//   inferencer.rs — loads paired artifacts, answers queries
//
// Reference: Burn Book §3 (Building Blocks)
//            Burn Book §5 (Training)
//            Hochreiter & Schmidhuber (1997) LSTM

/// BiLSTM attention classifier architecture
pub mod model;

/// Joint L2-norm gradient clipping
pub mod clipping;

/// Learning-rate plateau schedule and early stopping
pub mod schedule;

/// Full training loop with validation and checkpointing
pub mod trainer;

/// Probability ranking and response composition
pub mod response;

/// Inference engine — loads a checkpoint and answers queries
pub mod inferencer;
