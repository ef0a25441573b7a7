// ============================================================
// Layer 5 — Confidence-Gated Response Composition
// ============================================================
// Turns a probability vector into the text returned to callers.
//
//   top-1 < confidence_threshold      → fixed low-confidence message
//   otherwise                         → lead answer
//     + alternatives (only if top-2 > alternatives_gate), each
//       ranked answer whose probability > alternative_floor,
//       at most max_alternatives of them
//     + standing disclaimer

use serde::{Deserialize, Serialize};

pub const LOW_CONFIDENCE_MESSAGE: &str = "I'm not confident about the answer to this medical question. \
Please consult with a healthcare professional for accurate information.";

pub const PROCESSING_ERROR_MESSAGE: &str =
    "I'm sorry, there was an error processing your medical query.";

pub const MODEL_UNAVAILABLE_MESSAGE: &str =
    "I'm sorry, the medical model is currently unavailable. Please try again later.";

pub const DISCLAIMER: &str =
    "Remember: This is AI-generated information and should not replace professional medical advice.";

pub const ALTERNATIVES_HEADER: &str = "Alternative possibilities include:";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponsePolicy {
    /// Minimum top-1 probability for answering at all
    pub confidence_threshold: f64,
    /// Alternatives are listed only when top-2 exceeds this
    pub alternatives_gate:    f64,
    /// Each listed alternative must exceed this
    pub alternative_floor:    f64,
    pub max_alternatives:     usize,
    pub top_k:                usize,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.3,
            alternatives_gate:    0.2,
            alternative_floor:    0.1,
            max_alternatives:     2,
            top_k:                3,
        }
    }
}

/// A class id with its probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedClass {
    pub class_id:    usize,
    pub probability: f64,
}

/// The `k` most probable classes, highest first. Equal probabilities
/// are ordered by ascending class id.
pub fn rank_top_k(probabilities: &[f64], k: usize) -> Vec<RankedClass> {
    let mut ranked: Vec<RankedClass> = probabilities
        .iter()
        .enumerate()
        .map(|(class_id, &probability)| RankedClass { class_id, probability })
        .collect();
    ranked.sort_by(|a, b| {
        b.probability
            .total_cmp(&a.probability)
            .then(a.class_id.cmp(&b.class_id))
    });
    ranked.truncate(k);
    ranked
}

/// Build the caller-facing text from ranked classes.
///
/// `answer` resolves a class id to its text; ranked entries it cannot
/// resolve are skipped.
pub fn compose_response<'a>(
    query:  &str,
    ranked: &[RankedClass],
    answer: impl Fn(usize) -> Option<&'a str>,
    policy: &ResponsePolicy,
) -> String {
    let Some(top) = ranked.first() else {
        return LOW_CONFIDENCE_MESSAGE.to_string();
    };
    if top.probability < policy.confidence_threshold {
        return LOW_CONFIDENCE_MESSAGE.to_string();
    }
    let Some(lead) = answer(top.class_id) else {
        return PROCESSING_ERROR_MESSAGE.to_string();
    };

    let mut response = format!("Based on your query: '{query}'\n\nThe most likely answer is: {lead}");

    let second = ranked.get(1).map(|r| r.probability).unwrap_or(0.0);
    if second > policy.alternatives_gate {
        let alternatives: Vec<&str> = ranked
            .iter()
            .skip(1)
            .take(policy.max_alternatives)
            .filter(|r| r.probability > policy.alternative_floor)
            .filter_map(|r| answer(r.class_id))
            .collect();
        if !alternatives.is_empty() {
            response.push_str("\n\n");
            response.push_str(ALTERNATIVES_HEADER);
            for alt in alternatives {
                response.push_str("\n- ");
                response.push_str(alt);
            }
        }
    }

    response.push_str("\n\n");
    response.push_str(DISCLAIMER);
    response
}
