// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Workflow coordination only: no model math, no printing, no
// direct file formats. Each use case wires the lower layers
// together for one goal.
//
//   train_use_case.rs — corpus → tokenizer → training → artifacts
//   ask_use_case.rs   — artifacts → MedicalAssistant → answer text
//
// Reference: Clean Architecture pattern

// The training workflow
pub mod train_use_case;

// The inference/question-answering workflow
pub mod ask_use_case;
