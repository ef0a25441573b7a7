// ============================================================
// Layer 4 — JSONL Corpus Loader
// ============================================================
// Reads question/answer rows for a registered dataset source from
// a local mirror laid out as:
//
//   <data_dir>/
//     MMMU/Biology/dev.jsonl
//     MMMU/Biology/validation.jsonl
//     cais/mmlu/nutrition/train.jsonl
//     ...
//
// One JSON object per line: {"question": "...", "answer": ...}.
// MMLU stores the answer as an integer index; it is kept as its
// decimal string. Missing split files contribute nothing; rows
// without both fields are skipped with a warning.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde_json::Value;

use crate::domain::labeled_example::QaRecord;
use crate::domain::source::DatasetSource;
use crate::domain::traits::CorpusSource;

pub struct JsonlCorpusSource {
    data_dir: PathBuf,
}

impl JsonlCorpusSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    fn split_path(&self, source: &DatasetSource, split: &str) -> PathBuf {
        self.data_dir.join(&source.id).join(format!("{split}.jsonl"))
    }
}

impl CorpusSource for JsonlCorpusSource {
    fn fetch(&self, source: &DatasetSource) -> Result<Vec<QaRecord>> {
        let mut records = Vec::new();

        for split in source.kind.splits() {
            let path = self.split_path(source, split);
            if !path.exists() {
                tracing::debug!("No '{}' split for {} at '{}'", split, source.id, path.display());
                continue;
            }
            let rows = read_split(&path)?;
            tracing::debug!("{}: {} rows from split '{}'", source.id, rows.len(), split);
            records.extend(rows);
        }

        tracing::info!("Loaded {} questions from {}", records.len(), source.id);
        Ok(records)
    }
}

/// Parse one JSONL split file.
fn read_split(path: &Path) -> Result<Vec<QaRecord>> {
    let file = File::open(path)
        .with_context(|| format!("Cannot open '{}'", path.display()))?;

    let mut rows = Vec::new();
    for (line_no, line) in BufReader::new(file).lines().enumerate() {
        let line = line.with_context(|| format!("Cannot read '{}'", path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(&line) {
            Some(row) => rows.push(row),
            None => tracing::warn!(
                "Skipping malformed row {} in '{}'",
                line_no + 1,
                path.display()
            ),
        }
    }
    Ok(rows)
}

fn parse_row(line: &str) -> Option<QaRecord> {
    let value: Value = serde_json::from_str(line).ok()?;
    let question = value.get("question")?.as_str()?.to_string();
    let answer = match value.get("answer")? {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    Some(QaRecord::new(question, answer))
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::source::SourceKind;

    fn write(path: &Path, body: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn test_reads_kind_specific_splits() {
        let dir = tempfile::tempdir().unwrap();
        let mmlu = DatasetSource::new("cais/mmlu/nutrition", SourceKind::Mmlu);
        write(
            &dir.path().join("cais/mmlu/nutrition/train.jsonl"),
            "{\"question\": \"Best source of vitamin C?\", \"answer\": 2}\n\n",
        );
        write(
            &dir.path().join("cais/mmlu/nutrition/test.jsonl"),
            "{\"question\": \"Iron rich food?\", \"answer\": \"spinach\"}\n",
        );
        // `dev` is not an MMLU split and must be ignored.
        write(
            &dir.path().join("cais/mmlu/nutrition/dev.jsonl"),
            "{\"question\": \"ignored\", \"answer\": \"x\"}\n",
        );

        let loader = JsonlCorpusSource::new(dir.path());
        let rows = loader.fetch(&mmlu).unwrap();
        assert_eq!(
            rows,
            vec![
                QaRecord::new("Best source of vitamin C?", "2"),
                QaRecord::new("Iron rich food?", "spinach"),
            ]
        );
    }

    #[test]
    fn test_missing_source_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loader = JsonlCorpusSource::new(dir.path());
        let source = DatasetSource::new("MMMU/Biology", SourceKind::Mmmu);
        assert!(loader.fetch(&source).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("MMMU/Biology/dev.jsonl"),
            "not json\n{\"question\": \"q\"}\n{\"question\": \"ok?\", \"answer\": \"A\"}\n",
        );
        let loader = JsonlCorpusSource::new(dir.path());
        let source = DatasetSource::new("MMMU/Biology", SourceKind::Mmmu);
        let rows = loader.fetch(&source).unwrap();
        assert_eq!(rows, vec![QaRecord::new("ok?", "A")]);
    }
}
