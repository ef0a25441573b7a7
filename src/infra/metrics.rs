// ============================================================
// Layer 6 — Metrics Logger and Classification Report
// ============================================================
// Records per-epoch training metrics and per-class diagnostics.
//
// Output files (in the artifact directory):
//   metrics.csv   — one row per epoch, appended as training runs
//   history.json  — the full list of EpochMetrics at the end
//
// Example CSV output:
//   epoch,train_loss,train_acc,val_loss,val_acc,lr
//   1,3.124500,0.123000,3.089200,0.118000,0.000200
//   2,2.890100,0.184000,2.854300,0.172000,0.000200
//
// ClassificationReport mirrors the usual per-class table:
// precision / recall / F1 / support, then macro and
// support-weighted averages and overall accuracy.

use std::{
    collections::BTreeSet,
    fmt,
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::ArtifactError;

// ─── EpochMetrics ─────────────────────────────────────────────────────────────
/// Loss and accuracy for one pass over a split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseMetrics {
    pub loss:     f64,
    pub accuracy: f64,
}

/// One entry of the training history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochMetrics {
    /// The epoch number (starts at 1)
    pub epoch: usize,

    pub train: PhaseMetrics,

    pub validation: PhaseMetrics,

    /// Learning rate used during this epoch
    pub learning_rate: f64,
}

impl EpochMetrics {
    pub fn new(epoch: usize, train: PhaseMetrics, validation: PhaseMetrics, learning_rate: f64) -> Self {
        Self { epoch, train, validation, learning_rate }
    }
}

// ─── MetricsLogger ────────────────────────────────────────────────────────────
pub struct MetricsLogger {
    dir:      PathBuf,
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger, writing the CSV header if the file is new.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|e| write_error(&dir, e))?;

        let csv_path = dir.join("metrics.csv");
        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path).map_err(|e| write_error(&csv_path, e))?;
            writeln!(f, "epoch,train_loss,train_acc,val_loss,val_acc,lr")
                .map_err(|e| write_error(&csv_path, e))?;
            tracing::debug!("Created metrics CSV: '{}'", csv_path.display());
        }

        Ok(Self { dir, csv_path })
    }

    /// Append one epoch as a CSV row.
    pub fn log(&self, m: &EpochMetrics) -> Result<(), ArtifactError> {
        let mut f = OpenOptions::new()
            .append(true)
            .open(&self.csv_path)
            .map_err(|e| write_error(&self.csv_path, e))?;

        writeln!(
            f,
            "{},{:.6},{:.6},{:.6},{:.6},{:.6}",
            m.epoch,
            m.train.loss,
            m.train.accuracy,
            m.validation.loss,
            m.validation.accuracy,
            m.learning_rate,
        )
        .map_err(|e| write_error(&self.csv_path, e))?;

        tracing::debug!(
            "Logged epoch {} metrics: train_loss={:.4}, val_loss={:.4}",
            m.epoch,
            m.train.loss,
            m.validation.loss,
        );
        Ok(())
    }

    /// Write the complete history to `history.json`.
    pub fn write_history(&self, history: &[EpochMetrics]) -> Result<PathBuf, ArtifactError> {
        let path = self.dir.join("history.json");
        let json = serde_json::to_string_pretty(history).map_err(|e| write_error(&path, e))?;
        fs::write(&path, json).map_err(|e| write_error(&path, e))?;
        Ok(path)
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}

fn write_error(path: &Path, e: impl fmt::Display) -> ArtifactError {
    ArtifactError::Write { path: path.to_path_buf(), reason: e.to_string() }
}

// ─── ClassificationReport ─────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    pub class_id:  usize,
    pub name:      String,
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
    pub support:   usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Averages {
    pub precision: f64,
    pub recall:    f64,
    pub f1:        f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    pub classes:      Vec<ClassScores>,
    pub macro_avg:    Averages,
    pub weighted_avg: Averages,
    pub accuracy:     f64,
    pub total:        usize,
}

impl ClassificationReport {
    /// Build a report over every class that occurs in `truth` or
    /// `predicted`. Ratios with a zero denominator are 0.
    pub fn from_predictions(truth: &[usize], predicted: &[usize], names: &[String]) -> Self {
        let labels: BTreeSet<usize> = truth.iter().chain(predicted).copied().collect();
        let total = truth.len().min(predicted.len());
        let pairs = || truth.iter().zip(predicted);

        let classes: Vec<ClassScores> = labels
            .into_iter()
            .map(|c| {
                let tp = pairs().filter(|&(&t, &p)| t == c && p == c).count();
                let predicted_c = pairs().filter(|&(_, &p)| p == c).count();
                let support = pairs().filter(|&(&t, _)| t == c).count();
                let precision = ratio(tp, predicted_c);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };
                ClassScores {
                    class_id: c,
                    name: names.get(c).cloned().unwrap_or_else(|| format!("class {c}")),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let n = classes.len().max(1) as f64;
        let macro_avg = Averages {
            precision: classes.iter().map(|s| s.precision).sum::<f64>() / n,
            recall:    classes.iter().map(|s| s.recall).sum::<f64>() / n,
            f1:        classes.iter().map(|s| s.f1).sum::<f64>() / n,
        };

        let weight = |f: fn(&ClassScores) -> f64| -> f64 {
            if total == 0 {
                return 0.0;
            }
            classes.iter().map(|s| f(s) * s.support as f64).sum::<f64>() / total as f64
        };
        let weighted_avg = Averages {
            precision: weight(|s| s.precision),
            recall:    weight(|s| s.recall),
            f1:        weight(|s| s.f1),
        };

        let correct = pairs().filter(|(t, p)| t == p).count();

        Self {
            accuracy: ratio(correct, total),
            classes,
            macro_avg,
            weighted_avg,
            total,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

const NAME_WIDTH: usize = 32;

fn short_name(name: &str) -> String {
    if name.chars().count() <= NAME_WIDTH {
        name.to_string()
    } else {
        let head: String = name.chars().take(NAME_WIDTH - 1).collect();
        format!("{head}…")
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>w$}  {:>9}  {:>9}  {:>9}  {:>7}",
            "", "precision", "recall", "f1-score", "support",
            w = NAME_WIDTH
        )?;
        for s in &self.classes {
            writeln!(
                f,
                "{:>w$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>7}",
                short_name(&s.name), s.precision, s.recall, s.f1, s.support,
                w = NAME_WIDTH
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>w$}  {:>9}  {:>9}  {:>9.2}  {:>7}",
            "accuracy", "", "", self.accuracy, self.total,
            w = NAME_WIDTH
        )?;
        for (label, avg) in [("macro avg", &self.macro_avg), ("weighted avg", &self.weighted_avg)] {
            writeln!(
                f,
                "{:>w$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>7}",
                label, avg.precision, avg.recall, avg.f1, self.total,
                w = NAME_WIDTH
            )?;
        }
        Ok(())
    }
}
