// ============================================================
// Layer 4 — Classification Batcher
// ============================================================
// Implements Burn's Batcher trait: stacks N pre-padded samples
// into an id tensor [N, seq_len] and a label tensor [N].

use burn::{
    data::dataloader::batcher::Batcher,
    prelude::*,
};

use crate::data::dataset::ClassificationSample;

// ─── ClassificationBatch ──────────────────────────────────────────────────────
#[derive(Debug, Clone)]
pub struct ClassificationBatch<B: Backend> {
    /// Token ids — shape: [batch_size, seq_len]
    pub token_ids: Tensor<B, 2, Int>,

    /// Class ids — shape: [batch_size]
    pub labels: Tensor<B, 1, Int>,
}

// ─── ClassificationBatcher ────────────────────────────────────────────────────
#[derive(Clone, Debug)]
pub struct ClassificationBatcher<B: Backend> {
    pub device: B::Device,
}

impl<B: Backend> ClassificationBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<ClassificationSample, ClassificationBatch<B>> for ClassificationBatcher<B> {
    fn batch(&self, items: Vec<ClassificationSample>) -> ClassificationBatch<B> {
        let batch_size = items.len();
        // All sequences have the same length (pre-padded)
        let seq_len = items.first().map(|s| s.token_ids.len()).unwrap_or(0);

        let ids_flat: Vec<i32> = items
            .iter()
            .flat_map(|s| s.token_ids.iter().map(|&x| x as i32))
            .collect();

        let labels: Vec<i32> = items.iter().map(|s| s.label as i32).collect();

        let token_ids = Tensor::<B, 1, Int>::from_ints(
            ids_flat.as_slice(), &self.device
        ).reshape([batch_size, seq_len]);

        let labels = Tensor::<B, 1, Int>::from_ints(labels.as_slice(), &self.device);

        ClassificationBatch { token_ids, labels }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_batch_shapes() {
        let batcher = ClassificationBatcher::<NdArray>::new(Default::default());
        let batch = batcher.batch(vec![
            ClassificationSample { token_ids: vec![4, 11, 12, 0], label: 1 },
            ClassificationSample { token_ids: vec![5, 13, 0, 0], label: 0 },
        ]);
        assert_eq!(batch.token_ids.dims(), [2, 4]);
        assert_eq!(batch.labels.dims(), [2]);
        let ids: Vec<i64> = batch.token_ids.into_data().convert::<i64>().to_vec().unwrap();
        assert_eq!(ids, vec![4, 11, 12, 0, 5, 13, 0, 0]);
    }
}
