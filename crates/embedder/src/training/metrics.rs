//! Retrieval-quality metrics: per-query ranking, average precision, and
//! mean average precision (mAP) at a fixed cutoff `k`.

use ordered_float::OrderedFloat;

use crate::error::TrainError;

/// Euclidean distance between two embedding rows.
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

/// Gallery indices sorted by ascending distance to `query`, truncated to `k`.
///
/// Ties in distance break toward the lower gallery index, so rankings are
/// deterministic across runs.
pub fn rank_gallery(query: &[f32], gallery: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut scored: Vec<(OrderedFloat<f32>, usize)> = gallery
        .iter()
        .enumerate()
        .map(|(i, row)| (OrderedFloat(euclidean(query, row)), i))
        .collect();
    scored.sort();
    scored.truncate(k);
    scored.into_iter().map(|(_, i)| i).collect()
}

/// Average precision over a ranked relevance mask.
///
/// `AP = (1/R) * sum over hit positions of precision@position`, where `R` is
/// the number of hits inside the window. A window with no relevant items
/// scores 0.0.
pub fn average_precision(relevant: &[bool]) -> f64 {
    let mut hits = 0usize;
    let mut precision_sum = 0.0;
    for (i, &is_hit) in relevant.iter().enumerate() {
        if is_hit {
            hits += 1;
            precision_sum += hits as f64 / (i + 1) as f64;
        }
    }
    if hits == 0 {
        0.0
    } else {
        precision_sum / hits as f64
    }
}

/// Mean average precision at `k` over a query set against a gallery.
///
/// Each query is ranked against the full gallery, truncated to the top `k`,
/// and scored by [`average_precision`] with relevance defined as label
/// equality. `k` larger than the gallery is clamped.
///
/// # Errors
/// `InvalidConfig` if `k == 0`, the query set is empty, the gallery is
/// empty, or the label slices do not match their embedding counts.
pub fn mean_average_precision(
    query_embeddings: &[Vec<f32>],
    query_labels: &[i64],
    gallery_embeddings: &[Vec<f32>],
    gallery_labels: &[i64],
    k: usize,
) -> Result<f64, TrainError> {
    if k == 0 {
        return Err(TrainError::InvalidConfig("top_k must be > 0".into()));
    }
    if query_embeddings.is_empty() {
        return Err(TrainError::InvalidConfig("empty query set".into()));
    }
    if gallery_embeddings.is_empty() {
        return Err(TrainError::InvalidConfig("empty gallery".into()));
    }
    if query_embeddings.len() != query_labels.len() {
        return Err(TrainError::InvalidConfig(format!(
            "query labels ({}) do not match query embeddings ({})",
            query_labels.len(),
            query_embeddings.len()
        )));
    }
    if gallery_embeddings.len() != gallery_labels.len() {
        return Err(TrainError::InvalidConfig(format!(
            "gallery labels ({}) do not match gallery embeddings ({})",
            gallery_labels.len(),
            gallery_embeddings.len()
        )));
    }

    let k = k.min(gallery_embeddings.len());
    let mut ap_sum = 0.0;
    for (query, &label) in query_embeddings.iter().zip(query_labels.iter()) {
        let ranked = rank_gallery(query, gallery_embeddings, k);
        let relevant: Vec<bool> = ranked.iter().map(|&i| gallery_labels[i] == label).collect();
        ap_sum += average_precision(&relevant);
    }
    Ok(ap_sum / query_embeddings.len() as f64)
}

/// Running average of batch losses over a logging interval.
pub struct RunningLoss {
    sum: f64,
    count: usize,
}

impl RunningLoss {
    pub fn new() -> Self {
        Self { sum: 0.0, count: 0 }
    }

    pub fn update(&mut self, loss: f64) {
        self.sum += loss;
        self.count += 1;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }
}

impl Default for RunningLoss {
    fn default() -> Self {
        Self::new()
    }
}
