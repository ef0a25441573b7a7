// ============================================================
// Layer 4 — Query Preprocessor
// ============================================================
// Normalises a raw question before tagging or tokenisation.
// Questions are short single-line texts, so all whitespace runs
// (including line breaks) collapse to one space.
//
// Cleaning steps:
//   1. Map non-breaking / zero-width spaces and BOM to plain space
//   2. Map remaining control characters to space
//   3. Collapse whitespace runs and trim the ends

#[derive(Debug, Clone, Copy)]
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw question string for downstream tokenisation.
    pub fn clean(&self, text: &str) -> String {
        let mapped: String = text
            .chars()
            .map(|c| match c {
                '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
                c if c.is_control() => ' ',
                c => c,
            })
            .collect();

        mapped.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}
