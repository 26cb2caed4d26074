//! Contrastive image-embedding training.
//!
//! Provides trainable burn embedding networks behind the [`ImageEmbedder`]
//! capability trait, a margin-based contrastive loss, the epoch training
//! loop with step-decay learning rate and best-checkpoint persistence, and
//! mean-average-precision retrieval evaluation.
//!
//! [`ImageEmbedder`]: model::embed::ImageEmbedder

pub mod checkpoint;
pub mod error;
pub mod inference;
pub mod model;
pub mod training;

pub use error::TrainError;
pub use inference::Embedder;
pub use model::conv::{ConvEmbeddingNet, ConvEmbeddingNetConfig};
pub use model::embed::ImageEmbedder;
pub use model::mlp::{MlpEmbeddingNet, MlpEmbeddingNetConfig};
pub use training::loss::{ContrastiveLoss, Reduction};
pub use training::metrics::mean_average_precision;
pub use training::trainer::{evaluate_map, fit, FitReport, TrainingConfig};
