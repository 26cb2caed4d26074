use thiserror::Error;

/// Errors from dataset indexing and pair sampling.
#[derive(Debug, Error)]
pub enum PairError {
    /// The anchor's label is not present in the class index (dataset/label
    /// mismatch). Never recovered here — propagated to the caller.
    #[error("label {label} for anchor {anchor_index} is not in the class index")]
    InvalidLabel { label: i64, anchor_index: usize },

    /// The dataset has no items, so no index can be built.
    #[error("dataset is empty")]
    EmptyDataset,

    /// Negative sampling needs at least two distinct classes.
    #[error("dataset has a single class ({label}); negative pairs cannot be drawn")]
    SingleClass { label: i64 },

    /// A dataset index was out of range.
    #[error("index {index} out of bounds for dataset of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    /// A row's element count does not match the declared image shape.
    #[error("row {index} has {actual} elements, expected {expected} (C * H * W)")]
    ShapeMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// Rows and labels differ in length.
    #[error("{rows} rows but {labels} labels")]
    LabelCountMismatch { rows: usize, labels: usize },

    /// The positive-draw probability must lie in [0, 1].
    #[error("positive_ratio must be in [0, 1], got {0}")]
    InvalidRatio(f64),
}
