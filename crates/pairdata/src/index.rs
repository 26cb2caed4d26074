//! Per-class index over dataset positions.

use std::collections::BTreeMap;

use crate::dataset::LabeledDataset;
use crate::error::PairError;

/// Maps each class label to the ordered dataset indices carrying it.
///
/// Built once per dataset in a single pass over labels. Every dataset index
/// lands in exactly one bucket, and buckets preserve the original relative
/// order of indices within a class. A `BTreeMap` keeps label iteration
/// deterministic for negative-class draws.
#[derive(Debug, Clone)]
pub struct ClassIndex {
    buckets: BTreeMap<i64, Vec<usize>>,
    total: usize,
}

impl ClassIndex {
    /// Group dataset indices by label, preserving in-class order.
    pub fn build(labels: impl IntoIterator<Item = i64>) -> Self {
        let mut buckets: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        let mut total = 0;
        for (i, label) in labels.into_iter().enumerate() {
            buckets.entry(label).or_default().push(i);
            total += 1;
        }
        Self { buckets, total }
    }

    /// Build from a dataset by iterating its labels in order.
    ///
    /// # Errors
    /// `EmptyDataset` if the dataset has no items.
    pub fn from_dataset(data: &dyn LabeledDataset) -> Result<Self, PairError> {
        if data.is_empty() {
            return Err(PairError::EmptyDataset);
        }
        let mut labels = Vec::with_capacity(data.len());
        for i in 0..data.len() {
            let label = data.label(i).ok_or(PairError::IndexOutOfBounds {
                index: i,
                len: data.len(),
            })?;
            labels.push(label);
        }
        Ok(Self::build(labels))
    }

    /// Dataset indices belonging to `label`, in original order.
    pub fn bucket(&self, label: i64) -> Option<&[usize]> {
        self.buckets.get(&label).map(Vec::as_slice)
    }

    /// Distinct labels present, ascending.
    pub fn labels(&self) -> Vec<i64> {
        self.buckets.keys().copied().collect()
    }

    /// Number of distinct classes.
    pub fn num_classes(&self) -> usize {
        self.buckets.len()
    }

    /// Total indices across all buckets (== dataset length).
    pub fn total(&self) -> usize {
        self.total
    }

    /// Ground-truth count per class.
    pub fn class_sizes(&self) -> BTreeMap<i64, usize> {
        self.buckets.iter().map(|(&l, v)| (l, v.len())).collect()
    }
}
