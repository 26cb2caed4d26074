//! Training pipeline: margin contrastive loss, retrieval metrics, and the
//! epoch loop with step-decay LR and best-checkpoint persistence.

pub mod loss;
pub mod metrics;
pub mod trainer;
