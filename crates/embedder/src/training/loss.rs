//! Margin-based contrastive loss over embedding pairs.
//!
//! Per pair with Euclidean distance `d`:
//! positive → `d²`, negative → `max(0, margin − d)²`. Both terms are smooth
//! except at the single point `d == margin`, where the hinge contributes a
//! zero subgradient; the distance itself is epsilon-stabilized so a negative
//! pair at `d == 0` backpropagates a finite (zero) gradient instead of the
//! raw `d/dx sqrt(x)` blowup.

use burn::prelude::*;

use crate::error::TrainError;

/// Epsilon floor under the squared distance before the square root.
const DIST_EPS: f64 = 1e-12;

/// How per-pair contributions are folded into the batch loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reduction {
    #[default]
    Mean,
    Sum,
}

/// Validated contrastive loss.
#[derive(Debug, Clone)]
pub struct ContrastiveLoss {
    margin: f64,
    reduction: Reduction,
}

impl ContrastiveLoss {
    /// Create the loss with the default mean reduction.
    ///
    /// # Errors
    /// `InvalidConfig` if `margin` is not strictly positive and finite.
    pub fn new(margin: f64) -> Result<Self, TrainError> {
        if !(margin > 0.0) || !margin.is_finite() {
            return Err(TrainError::InvalidConfig(format!(
                "margin must be > 0, got {margin}"
            )));
        }
        Ok(Self {
            margin,
            reduction: Reduction::Mean,
        })
    }

    pub fn with_reduction(mut self, reduction: Reduction) -> Self {
        self.reduction = reduction;
        self
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    /// Batch loss for `(batch, dim)` embedding pairs.
    ///
    /// `is_positive` is a float `(batch,)` tensor of 1.0 / 0.0 flags.
    /// Symmetric in `a` and `b`; differentiable with respect to both.
    pub fn forward<B: Backend>(
        &self,
        a: Tensor<B, 2>,
        b: Tensor<B, 2>,
        is_positive: Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        let per_pair = self.per_pair(a, b, is_positive);
        match self.reduction {
            Reduction::Mean => per_pair.mean(),
            Reduction::Sum => per_pair.sum(),
        }
    }

    /// Per-pair contributions, shape `(batch,)`.
    pub fn per_pair<B: Backend>(
        &self,
        a: Tensor<B, 2>,
        b: Tensor<B, 2>,
        is_positive: Tensor<B, 1>,
    ) -> Tensor<B, 1> {
        let (dist, dist_sq) = pairwise_distance(a, b);

        // Negative term: max(0, margin - d)^2. clamp_min(0) is the
        // zero-subgradient convention at d == margin.
        let hinge = dist.neg().add_scalar(self.margin).clamp_min(0.0);
        let negative_term = hinge.powf_scalar(2.0);

        let ones = is_positive.ones_like();
        is_positive.clone() * dist_sq + (ones - is_positive) * negative_term
    }
}

/// Row-wise Euclidean distance between two `(batch, dim)` tensors.
///
/// Returns `(d, d²)`. `d` is computed as `sqrt(clamp(d², eps))`, so its
/// gradient at zero distance is finite.
pub fn pairwise_distance<B: Backend>(
    a: Tensor<B, 2>,
    b: Tensor<B, 2>,
) -> (Tensor<B, 1>, Tensor<B, 1>) {
    let dist_sq: Tensor<B, 1> = (a - b).powf_scalar(2.0).sum_dim(1).squeeze::<1>(1);
    let dist = dist_sq.clone().clamp_min(DIST_EPS).sqrt();
    (dist, dist_sq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArray;
    use burn::backend::Autodiff;
    use burn::tensor::TensorData;

    type TestBackend = NdArray<f32>;
    type TestAutodiffBackend = Autodiff<NdArray<f32>>;

    fn pair(
        a: [[f32; 2]; 2],
        b: [[f32; 2]; 2],
        flags: [f32; 2],
    ) -> (
        Tensor<TestBackend, 2>,
        Tensor<TestBackend, 2>,
        Tensor<TestBackend, 1>,
    ) {
        let device = Default::default();
        (
            Tensor::from_data(TensorData::from(a), &device),
            Tensor::from_data(TensorData::from(b), &device),
            Tensor::from_data(TensorData::from(flags), &device),
        )
    }

    #[test]
    fn test_margin_must_be_positive() {
        assert!(matches!(
            ContrastiveLoss::new(0.0),
            Err(TrainError::InvalidConfig(_))
        ));
        assert!(matches!(
            ContrastiveLoss::new(-1.0),
            Err(TrainError::InvalidConfig(_))
        ));
        assert!(matches!(
            ContrastiveLoss::new(f64::NAN),
            Err(TrainError::InvalidConfig(_))
        ));
        assert!(ContrastiveLoss::new(1.0).is_ok());
    }

    #[test]
    fn test_identical_positive_pair_is_zero() {
        let loss = ContrastiveLoss::new(1.0).unwrap();
        let (a, b, flags) = pair([[0.6, 0.8], [1.0, 0.0]], [[0.6, 0.8], [1.0, 0.0]], [1.0, 1.0]);

        let value: f32 = loss.forward(a, b, flags).into_scalar().elem();
        assert!(value.abs() < 1e-6, "expected 0, got {value}");
    }

    #[test]
    fn test_negative_pair_beyond_margin_is_zero() {
        let loss = ContrastiveLoss::new(1.0).unwrap();
        // Distance 2.0 >= margin 1.0.
        let (a, b, flags) = pair([[1.0, 0.0], [1.0, 0.0]], [[-1.0, 0.0], [-1.0, 0.0]], [0.0, 0.0]);

        let value: f32 = loss.forward(a, b, flags).into_scalar().elem();
        assert!(value.abs() < 1e-6, "expected 0, got {value}");
    }

    #[test]
    fn test_positive_pair_is_squared_distance() {
        let loss = ContrastiveLoss::new(1.0).unwrap();
        // Distances 1.0 and 2.0 → d² = 1.0 and 4.0, mean 2.5.
        let (a, b, flags) = pair([[1.0, 0.0], [2.0, 0.0]], [[0.0, 0.0], [0.0, 0.0]], [1.0, 1.0]);

        let value: f32 = loss.forward(a, b, flags).into_scalar().elem();
        assert!((value - 2.5).abs() < 1e-5, "expected 2.5, got {value}");
    }

    #[test]
    fn test_negative_pair_hinge_value() {
        let loss = ContrastiveLoss::new(2.0).unwrap();
        // d = 0.5 → (2.0 - 0.5)² = 2.25 per pair.
        let (a, b, flags) = pair([[0.5, 0.0], [0.5, 0.0]], [[0.0, 0.0], [0.0, 0.0]], [0.0, 0.0]);

        let value: f32 = loss.forward(a, b, flags).into_scalar().elem();
        assert!((value - 2.25).abs() < 1e-5, "expected 2.25, got {value}");
    }

    #[test]
    fn test_symmetry_in_arguments() {
        let loss = ContrastiveLoss::new(1.0).unwrap();
        let (a, b, flags) = pair([[0.3, 0.7], [0.9, 0.1]], [[0.5, 0.5], [0.2, 0.8]], [1.0, 0.0]);

        let ab: f32 = loss
            .forward(a.clone(), b.clone(), flags.clone())
            .into_scalar()
            .elem();
        let ba: f32 = loss.forward(b, a, flags).into_scalar().elem();
        assert!((ab - ba).abs() < 1e-6, "loss must be symmetric: {ab} vs {ba}");
    }

    #[test]
    fn test_sum_reduction() {
        let loss = ContrastiveLoss::new(1.0)
            .unwrap()
            .with_reduction(Reduction::Sum);
        let (a, b, flags) = pair([[1.0, 0.0], [2.0, 0.0]], [[0.0, 0.0], [0.0, 0.0]], [1.0, 1.0]);

        let value: f32 = loss.forward(a, b, flags).into_scalar().elem();
        assert!((value - 5.0).abs() < 1e-5, "expected 5.0, got {value}");
    }

    #[test]
    fn test_zero_distance_negative_backprop_is_finite() {
        // A negative pair with identical embeddings must not produce NaN/inf
        // gradients through sqrt at zero.
        let device = Default::default();
        let loss = ContrastiveLoss::new(1.0).unwrap();

        let a = Tensor::<TestAutodiffBackend, 2>::from_data(
            TensorData::from([[0.5_f32, 0.5]]),
            &device,
        )
        .require_grad();
        let b = Tensor::<TestAutodiffBackend, 2>::from_data(
            TensorData::from([[0.5_f32, 0.5]]),
            &device,
        );
        let flags = Tensor::<TestAutodiffBackend, 1>::from_data(
            TensorData::from([0.0_f32]),
            &device,
        );

        let value = loss.forward(a.clone(), b, flags);
        let grads = value.backward();
        let grad: Vec<f32> = a.grad(&grads).unwrap().into_data().to_vec().unwrap();
        assert!(grad.iter().all(|g| g.is_finite()), "grad not finite: {grad:?}");
    }

    #[test]
    fn test_gradient_pulls_positives_together() {
        // For a positive pair at distance > 0, the gradient on `a` points
        // away from `b`, so an SGD step (subtracting the gradient) moves
        // the embeddings closer.
        let device = Default::default();
        let loss = ContrastiveLoss::new(1.0).unwrap();

        let a = Tensor::<TestAutodiffBackend, 2>::from_data(
            TensorData::from([[1.0_f32, 0.0]]),
            &device,
        )
        .require_grad();
        let b = Tensor::<TestAutodiffBackend, 2>::from_data(
            TensorData::from([[0.0_f32, 0.0]]),
            &device,
        );
        let flags = Tensor::<TestAutodiffBackend, 1>::from_data(
            TensorData::from([1.0_f32]),
            &device,
        );

        let value = loss.forward(a.clone(), b, flags);
        let grads = value.backward();
        let grad: Vec<f32> = a.grad(&grads).unwrap().into_data().to_vec().unwrap();
        // d(d²)/da_0 = 2 * (a_0 - b_0) = 2.0 > 0: step decreases a_0 toward b_0.
        assert!(grad[0] > 0.0, "expected positive gradient, got {}", grad[0]);
    }
}
