//! Synthetic cluster datasets for tests and smoke runs.
//!
//! Real image pipelines live outside this workspace; these generators give
//! the trainer and the CLI something deterministic to chew on.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset::InMemoryDataset;
use crate::error::PairError;

/// Generate `n_classes * per_class` rows of shape `dims`, one cluster per
/// class, with uniform jitter of half-width `noise` around each center.
///
/// Class centers are axis-aligned: class `c` puts mass `1.0` at element
/// `c % (C*H*W)` and zero elsewhere, so with `noise == 0.0` every class
/// collapses to a single unit vector and clusters are perfectly separable.
/// Labels are `0..n_classes`. Deterministic for a given `seed`.
pub fn cluster_dataset(
    n_classes: usize,
    per_class: usize,
    dims: [usize; 3],
    noise: f32,
    seed: u64,
) -> Result<InMemoryDataset, PairError> {
    if n_classes == 0 || per_class == 0 {
        return Err(PairError::EmptyDataset);
    }
    let elems = dims[0] * dims[1] * dims[2];
    let mut rng = StdRng::seed_from_u64(seed);

    let mut rows = Vec::with_capacity(n_classes * per_class);
    let mut labels = Vec::with_capacity(n_classes * per_class);

    for class in 0..n_classes {
        let hot = class % elems;
        for _ in 0..per_class {
            let mut row = vec![0.0_f32; elems];
            row[hot] = 1.0;
            if noise > 0.0 {
                for v in row.iter_mut() {
                    *v += rng.gen_range(-noise..=noise);
                }
            }
            rows.push(row);
            labels.push(class as i64);
        }
    }

    InMemoryDataset::new(rows, labels, dims)
}
