// ============================================================
// Layer 4 — Stratified Train/Validation Splitter
// ============================================================
// Single shuffled split that keeps every class represented in both
// partitions, in proportion to its size.
//
// Per class with n members (n >= 2):
//   n_val   = round(n * val_fraction), clamped to [1, n - 1]
//   n_train = n - n_val
// Classes with a single member go entirely to training.
//
// Shuffling uses a seeded StdRng so a given (labels, seed) pair
// always produces the same split.

use std::collections::BTreeMap;

use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

/// Indices into the original sample list for each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub val:   Vec<usize>,
}

/// Split sample indices by class label.
///
/// # Arguments
/// * `labels`       - Class id of every sample
/// * `val_fraction` - Target share of each class held out, e.g. 0.2
/// * `seed`         - Shuffle seed
pub fn stratified_split(labels: &[usize], val_fraction: f64, seed: u64) -> SplitIndices {
    let mut rng = StdRng::seed_from_u64(seed);

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(index);
    }

    let mut train = Vec::with_capacity(labels.len());
    let mut val   = Vec::new();

    for (_, mut members) in by_class {
        members.shuffle(&mut rng);
        let n = members.len();
        let n_val = if n < 2 {
            0
        } else {
            ((n as f64 * val_fraction).round() as usize).clamp(1, n - 1)
        };
        val.extend_from_slice(&members[..n_val]);
        train.extend_from_slice(&members[n_val..]);
    }

    train.shuffle(&mut rng);
    val.shuffle(&mut rng);

    tracing::debug!(
        "Stratified split: {} training, {} validation",
        train.len(),
        val.len()
    );

    SplitIndices { train, val }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn classes(labels: &[usize], idx: &[usize]) -> HashSet<usize> {
        idx.iter().map(|&i| labels[i]).collect()
    }

    #[test]
    fn test_every_class_in_both_partitions() {
        let labels: Vec<usize> = (0..3).flat_map(|c| std::iter::repeat(c).take(5)).collect();
        let split = stratified_split(&labels, 0.2, 42);
        assert_eq!(split.train.len(), 12);
        assert_eq!(split.val.len(), 3);
        assert_eq!(classes(&labels, &split.train), HashSet::from([0, 1, 2]));
        assert_eq!(classes(&labels, &split.val), HashSet::from([0, 1, 2]));
    }

    #[test]
    fn test_two_member_class_is_split() {
        let labels = vec![0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 1];
        let split = stratified_split(&labels, 0.2, 7);
        assert!(classes(&labels, &split.train).contains(&0));
        assert!(classes(&labels, &split.val).contains(&0));
    }

    #[test]
    fn test_all_items_preserved() {
        let labels: Vec<usize> = (0..50).map(|i| i % 4).collect();
        let split = stratified_split(&labels, 0.3, 1);
        let mut all: Vec<usize> = split.train.iter().chain(&split.val).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_same_seed_same_split() {
        let labels: Vec<usize> = (0..40).map(|i| i % 5).collect();
        assert_eq!(stratified_split(&labels, 0.2, 9), stratified_split(&labels, 0.2, 9));
    }

    #[test]
    fn test_empty_dataset() {
        let split = stratified_split(&[], 0.2, 42);
        assert!(split.train.is_empty());
        assert!(split.val.is_empty());
    }
}
