// ============================================================
// Layer 3 — LabeledExample Domain Type
// ============================================================
// One training example: the raw question, the question with its
// domain-control prefix, and the gold answer string.

use serde::{Deserialize, Serialize};

use crate::domain::source::DomainTag;

/// A raw (question, answer) row as delivered by a corpus source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    pub answer:   String,
}

impl QaRecord {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self { question: question.into(), answer: answer.into() }
    }
}

/// A labelled example ready for tokenizer fitting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledExample {
    /// The question as it arrived from the source
    pub question: String,

    /// `"<marker> <question>"`, the text the tokenizer sees
    pub tagged_text: String,

    /// The gold answer; its position in the answer mapping is the class id
    pub answer: String,
}

impl LabeledExample {
    pub fn new(question: impl Into<String>, tag: DomainTag, answer: impl Into<String>) -> Self {
        let question = question.into();
        let tagged_text = format!("{} {}", tag.marker(), question);
        Self { question, tagged_text, answer: answer.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagged_text_has_marker_prefix() {
        let ex = LabeledExample::new("What is insulin?", DomainTag::Chemistry, "A hormone");
        assert_eq!(ex.tagged_text, "[CHEM] What is insulin?");
        assert_eq!(ex.question, "What is insulin?");
        assert_eq!(ex.answer, "A hormone");
    }
}
