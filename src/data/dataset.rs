use burn::data::dataset::Dataset;
use serde::{Deserialize, Serialize};

/// One encoded question with its class id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationSample {
    pub token_ids: Vec<u32>,
    pub label:     usize,
}

pub struct ClassificationDataset {
    samples: Vec<ClassificationSample>,
}

impl ClassificationDataset {
    pub fn new(samples: Vec<ClassificationSample>) -> Self { Self { samples } }

    pub fn from_parts(sequences: &[Vec<u32>], labels: &[usize]) -> Self {
        let samples = sequences
            .iter()
            .zip(labels)
            .map(|(ids, &label)| ClassificationSample { token_ids: ids.clone(), label })
            .collect();
        Self { samples }
    }

    /// Number of samples per class id in `0..num_classes`.
    pub fn class_counts(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for s in &self.samples {
            if let Some(c) = counts.get_mut(s.label) {
                *c += 1;
            }
        }
        counts
    }
}

impl Dataset<ClassificationSample> for ClassificationDataset {
    fn get(&self, index: usize) -> Option<ClassificationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_counts() {
        let ds = ClassificationDataset::from_parts(
            &[vec![1, 2], vec![3, 4], vec![5, 6]],
            &[0, 2, 2],
        );
        assert_eq!(ds.len(), 3);
        assert_eq!(ds.class_counts(3), vec![1, 0, 2]);
        assert_eq!(ds.get(1).unwrap().token_ids, vec![3, 4]);
    }
}
