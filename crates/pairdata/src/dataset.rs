//! Random-access labeled dataset boundary.

use crate::error::PairError;

/// A random-access collection of `(image, label)` pairs.
///
/// Images are flattened `C * H * W` rows of `f32`; labels are integers,
/// dense or sparse (contiguity is not required). Implementations must be
/// safe for concurrent read-only access — `get` takes `&self` and may be
/// called from parallel loader workers.
pub trait LabeledDataset: Send + Sync {
    /// Number of items in the dataset.
    fn len(&self) -> usize;

    /// Image shape as `[channels, height, width]`. Fixed per dataset.
    fn image_dims(&self) -> [usize; 3];

    /// Returns the item at `index`, or `None` if out of range.
    fn get(&self, index: usize) -> Option<(Vec<f32>, i64)>;

    /// Returns just the label at `index`. Default goes through [`get`];
    /// implementations with cheap label storage should override.
    ///
    /// [`get`]: LabeledDataset::get
    fn label(&self, index: usize) -> Option<i64> {
        self.get(index).map(|(_, label)| label)
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An owned, in-memory [`LabeledDataset`].
///
/// Backing store for synthetic data and tests; rows are stored flattened
/// in dataset order.
#[derive(Debug, Clone)]
pub struct InMemoryDataset {
    rows: Vec<Vec<f32>>,
    labels: Vec<i64>,
    dims: [usize; 3],
}

impl InMemoryDataset {
    /// Build a dataset from flattened rows and labels.
    ///
    /// # Errors
    /// `EmptyDataset` if `rows` is empty; `LabelCountMismatch` if `rows` and
    /// `labels` disagree in length; `ShapeMismatch` if a row's element count
    /// is not `C * H * W`.
    pub fn new(rows: Vec<Vec<f32>>, labels: Vec<i64>, dims: [usize; 3]) -> Result<Self, PairError> {
        if rows.is_empty() {
            return Err(PairError::EmptyDataset);
        }
        if rows.len() != labels.len() {
            return Err(PairError::LabelCountMismatch {
                rows: rows.len(),
                labels: labels.len(),
            });
        }
        let expected = dims[0] * dims[1] * dims[2];
        for (i, row) in rows.iter().enumerate() {
            if row.len() != expected {
                return Err(PairError::ShapeMismatch {
                    index: i,
                    expected,
                    actual: row.len(),
                });
            }
        }
        Ok(Self { rows, labels, dims })
    }

    /// All labels in dataset order.
    pub fn labels(&self) -> &[i64] {
        &self.labels
    }
}

impl LabeledDataset for InMemoryDataset {
    fn len(&self) -> usize {
        self.rows.len()
    }

    fn image_dims(&self) -> [usize; 3] {
        self.dims
    }

    fn get(&self, index: usize) -> Option<(Vec<f32>, i64)> {
        let row = self.rows.get(index)?;
        Some((row.clone(), self.labels[index]))
    }

    fn label(&self, index: usize) -> Option<i64> {
        self.labels.get(index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_roundtrip() {
        let data = InMemoryDataset::new(
            vec![vec![0.0, 1.0], vec![2.0, 3.0]],
            vec![7, 9],
            [1, 1, 2],
        )
        .unwrap();

        assert_eq!(data.len(), 2);
        assert_eq!(data.image_dims(), [1, 1, 2]);
        let (row, label) = data.get(1).unwrap();
        assert_eq!(row, vec![2.0, 3.0]);
        assert_eq!(label, 9);
        assert_eq!(data.label(0), Some(7));
        assert!(data.get(2).is_none());
    }

    #[test]
    fn test_empty_rejected() {
        let err = InMemoryDataset::new(vec![], vec![], [1, 1, 1]).unwrap_err();
        assert!(matches!(err, PairError::EmptyDataset));
    }

    #[test]
    fn test_row_shape_mismatch_rejected() {
        let err = InMemoryDataset::new(vec![vec![0.0; 3]], vec![0], [1, 2, 2]).unwrap_err();
        assert!(matches!(
            err,
            PairError::ShapeMismatch { index: 0, expected: 4, actual: 3 }
        ));
    }

    #[test]
    fn test_label_count_mismatch_rejected() {
        let err =
            InMemoryDataset::new(vec![vec![0.0; 2], vec![0.0; 2]], vec![0], [1, 1, 2]).unwrap_err();
        assert!(matches!(
            err,
            PairError::LabelCountMismatch { rows: 2, labels: 1 }
        ));
    }
}
