// ============================================================
// Layer 3 — Answer Index Mapping
// ============================================================
// Ordered, deduplicated answer strings. The index of an answer is
// the class id emitted by the classifier's output layer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerMapping {
    answers: Vec<String>,
}

impl AnswerMapping {
    /// Build a mapping keeping the first occurrence of every answer.
    pub fn from_answers<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = std::collections::HashSet::new();
        let answers = answers
            .into_iter()
            .map(Into::into)
            .filter(|a: &String| seen.insert(a.clone()))
            .collect();
        Self { answers }
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn answer(&self, class_id: usize) -> Option<&str> {
        self.answers.get(class_id).map(String::as_str)
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    /// Reverse lookup table: answer → class id.
    pub fn index(&self) -> HashMap<&str, usize> {
        self.answers
            .iter()
            .enumerate()
            .map(|(i, a)| (a.as_str(), i))
            .collect()
    }
}
