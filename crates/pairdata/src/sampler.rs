//! Stratified positive/negative pair sampling.

use rand::seq::SliceRandom;
use rand::Rng;

use crate::dataset::LabeledDataset;
use crate::error::PairError;
use crate::index::ClassIndex;

/// What a positive draw does when the anchor's class has a single member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SingletonPolicy {
    /// Pair the anchor with itself, a degenerate positive pair with zero
    /// true distance.
    #[default]
    SelfPair,
    /// Draw a negative instead, so the pair always has two distinct items.
    ForceNegative,
}

/// Sampling policy knobs.
#[derive(Debug, Clone, Copy)]
pub struct PairSamplerConfig {
    /// Probability of drawing a positive pair. Independent of anchor and of
    /// dataset class balance.
    pub positive_ratio: f64,
    /// Singleton-class handling for positive draws.
    pub singleton_policy: SingletonPolicy,
}

impl Default for PairSamplerConfig {
    fn default() -> Self {
        Self {
            positive_ratio: 0.5,
            singleton_policy: SingletonPolicy::SelfPair,
        }
    }
}

/// Draws a partner index plus a positive/negative flag for a given anchor.
///
/// Holds the shared, read-only [`ClassIndex`]; every `sample` call is an
/// independent draw against a caller-supplied RNG, so concurrent workers
/// each bring their own generator and no state is shared mutably. Pairs are
/// never materialized or cached — repeated calls for the same anchor may
/// yield different partners.
#[derive(Debug)]
pub struct PairSampler {
    index: ClassIndex,
    labels: Vec<i64>,
    config: PairSamplerConfig,
}

impl PairSampler {
    /// Create a sampler over a pre-built class index.
    ///
    /// # Errors
    /// `InvalidRatio` if `positive_ratio` is outside [0, 1]; `EmptyDataset`
    /// if the index has no buckets; `SingleClass` if negatives could be
    /// requested (`positive_ratio < 1`) but only one class exists.
    pub fn new(index: ClassIndex, config: PairSamplerConfig) -> Result<Self, PairError> {
        if !(0.0..=1.0).contains(&config.positive_ratio) || config.positive_ratio.is_nan() {
            return Err(PairError::InvalidRatio(config.positive_ratio));
        }
        let labels = index.labels();
        match labels.as_slice() {
            [] => return Err(PairError::EmptyDataset),
            [only] if config.positive_ratio < 1.0 => {
                return Err(PairError::SingleClass { label: *only });
            }
            _ => {}
        }
        tracing::info!(
            classes = index.num_classes(),
            items = index.total(),
            positive_ratio = config.positive_ratio,
            "PairSampler initialized"
        );
        Ok(Self { index, labels, config })
    }

    /// Build the class index from a dataset and wrap it in a sampler.
    pub fn from_dataset(
        data: &dyn LabeledDataset,
        config: PairSamplerConfig,
    ) -> Result<Self, PairError> {
        Self::new(ClassIndex::from_dataset(data)?, config)
    }

    /// Draw `(partner_index, is_positive)` for an anchor.
    ///
    /// Positive draws are uniform over the anchor's class bucket excluding
    /// the anchor itself; a singleton bucket follows the configured
    /// [`SingletonPolicy`]. Negative draws pick a uniform *other* label,
    /// then a uniform member of that bucket.
    ///
    /// # Errors
    /// `InvalidLabel` if `anchor_label` is absent from the class index.
    pub fn sample(
        &self,
        anchor_index: usize,
        anchor_label: i64,
        rng: &mut impl Rng,
    ) -> Result<(usize, bool), PairError> {
        let bucket = self.index.bucket(anchor_label).ok_or(PairError::InvalidLabel {
            label: anchor_label,
            anchor_index,
        })?;

        let mut positive = rng.gen_bool(self.config.positive_ratio);
        if positive && bucket.len() == 1 {
            match self.config.singleton_policy {
                SingletonPolicy::SelfPair => return Ok((anchor_index, true)),
                SingletonPolicy::ForceNegative => positive = false,
            }
        }

        if positive {
            // Rejection draw terminates: the bucket has at least two members.
            loop {
                let &candidate = bucket.choose(rng).unwrap();
                if candidate != anchor_index {
                    return Ok((candidate, true));
                }
            }
        } else {
            let others: Vec<i64> = self
                .labels
                .iter()
                .copied()
                .filter(|&l| l != anchor_label)
                .collect();
            // Reachable with positive_ratio == 1.0 and ForceNegative on a
            // lone singleton class.
            let &neg_label = others
                .choose(rng)
                .ok_or(PairError::SingleClass { label: anchor_label })?;
            let neg_bucket = self.index.bucket(neg_label).unwrap();
            let &candidate = neg_bucket.choose(rng).unwrap();
            Ok((candidate, false))
        }
    }

    /// The shared class index.
    pub fn class_index(&self) -> &ClassIndex {
        &self.index
    }
}
