//! Pair dataset: joins a base dataset with the pair sampler.

use std::sync::Arc;

use rand::Rng;

use crate::dataset::LabeledDataset;
use crate::error::PairError;
use crate::sampler::{PairSampler, PairSamplerConfig};

/// Whether `get` draws a partner (training) or returns the anchor alone
/// (evaluation — pairing would bias distance computations with random labels).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PairMode {
    Train,
    Eval,
}

/// One retrieved item: the anchor, and in training mode a sampled partner.
#[derive(Debug, Clone)]
pub struct PairItem {
    pub anchor: Vec<f32>,
    pub anchor_label: i64,
    /// Partner image; `None` in evaluation mode.
    pub partner: Option<Vec<f32>>,
    /// Whether the partner shares the anchor's class; `None` in eval mode.
    pub is_positive: Option<bool>,
}

/// Wraps a base dataset and a [`PairSampler`].
///
/// `get` is `&self` and touches no shared mutable state — randomness comes
/// from the caller's RNG — so a parallel loader pool may call it
/// concurrently, each worker holding its own generator.
pub struct PairDataset {
    base: Arc<dyn LabeledDataset>,
    sampler: PairSampler,
    mode: PairMode,
}

impl PairDataset {
    /// Build the class index over `base` and wrap it for `mode`.
    pub fn new(
        base: Arc<dyn LabeledDataset>,
        config: PairSamplerConfig,
        mode: PairMode,
    ) -> Result<Self, PairError> {
        let sampler = PairSampler::from_dataset(base.as_ref(), config)?;
        Ok(Self { base, sampler, mode })
    }

    /// Same length as the base dataset.
    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    pub fn mode(&self) -> PairMode {
        self.mode
    }

    /// Image shape of the base dataset.
    pub fn image_dims(&self) -> [usize; 3] {
        self.base.image_dims()
    }

    /// The sampler backing this dataset.
    pub fn sampler(&self) -> &PairSampler {
        &self.sampler
    }

    /// Retrieve the item at `index`; in training mode a fresh partner is
    /// drawn on every call (pairs are regenerated lazily, never cached).
    pub fn get(&self, index: usize, rng: &mut impl Rng) -> Result<PairItem, PairError> {
        let (anchor, anchor_label) = self.anchor(index)?;

        if self.mode == PairMode::Eval {
            return Ok(PairItem {
                anchor,
                anchor_label,
                partner: None,
                is_positive: None,
            });
        }

        let (partner_index, is_positive) = self.sampler.sample(index, anchor_label, rng)?;
        let (partner, _) = self
            .base
            .get(partner_index)
            .ok_or(PairError::IndexOutOfBounds {
                index: partner_index,
                len: self.base.len(),
            })?;

        Ok(PairItem {
            anchor,
            anchor_label,
            partner: Some(partner),
            is_positive: Some(is_positive),
        })
    }

    /// The raw `(image, label)` at `index`, skipping partner sampling.
    /// Used for gallery embedding, where pairing is irrelevant.
    pub fn anchor(&self, index: usize) -> Result<(Vec<f32>, i64), PairError> {
        self.base.get(index).ok_or(PairError::IndexOutOfBounds {
            index,
            len: self.base.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::InMemoryDataset;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_class_dataset() -> Arc<dyn LabeledDataset> {
        let rows: Vec<Vec<f32>> = (0..6).map(|i| vec![i as f32, 0.0]).collect();
        let labels = vec![0_i64, 0, 0, 1, 1, 1];
        Arc::new(InMemoryDataset::new(rows, labels, [1, 1, 2]).unwrap())
    }

    #[test]
    fn test_train_mode_yields_partner() {
        let data =
            PairDataset::new(two_class_dataset(), PairSamplerConfig::default(), PairMode::Train)
                .unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(data.len(), 6);
        for i in 0..data.len() {
            let item = data.get(i, &mut rng).unwrap();
            let partner = item.partner.expect("train mode draws a partner");
            let is_pos = item.is_positive.unwrap();
            assert_eq!(partner.len(), item.anchor.len());
            // Partner label consistency: row encodes its own index.
            let partner_index = partner[0] as usize;
            let partner_label = (partner_index >= 3) as i64;
            if is_pos {
                assert_eq!(partner_label, item.anchor_label);
            } else {
                assert_ne!(partner_label, item.anchor_label);
            }
        }
    }

    #[test]
    fn test_eval_mode_omits_partner() {
        let data =
            PairDataset::new(two_class_dataset(), PairSamplerConfig::default(), PairMode::Eval)
                .unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let item = data.get(4, &mut rng).unwrap();
        assert!(item.partner.is_none());
        assert!(item.is_positive.is_none());
        assert_eq!(item.anchor_label, 1);
        assert_eq!(item.anchor, vec![4.0, 0.0]);
    }

    #[test]
    fn test_out_of_bounds_index() {
        let data =
            PairDataset::new(two_class_dataset(), PairSamplerConfig::default(), PairMode::Train)
                .unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let err = data.get(6, &mut rng).unwrap_err();
        assert!(matches!(err, PairError::IndexOutOfBounds { index: 6, len: 6 }));
    }

    #[test]
    fn test_repeated_access_redraws() {
        // No pair caching: with enough redraws the same anchor sees more
        // than one distinct partner.
        let data =
            PairDataset::new(two_class_dataset(), PairSamplerConfig::default(), PairMode::Train)
                .unwrap();
        let mut rng = StdRng::seed_from_u64(5);

        let mut partners = std::collections::HashSet::new();
        for _ in 0..40 {
            let item = data.get(0, &mut rng).unwrap();
            partners.insert(item.partner.unwrap()[0] as i64);
        }
        assert!(partners.len() > 1, "expected varied partners, got {partners:?}");
    }
}
