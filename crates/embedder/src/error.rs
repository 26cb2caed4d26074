use thiserror::Error;

/// Errors from model construction, training, metrics, and checkpointing.
#[derive(Debug, Error)]
pub enum TrainError {
    /// Bad configuration value (margin, k, dimension, ...). Raised at
    /// construction time, before any training work.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Malformed batch mid-training. Fatal: aborts the run with the batch
    /// index and offending shape.
    #[error(
        "batch {batch_index}: image row has {actual} elements, expected {expected}"
    )]
    BatchShape {
        batch_index: usize,
        expected: usize,
        actual: usize,
    },

    /// Failed to persist or load a checkpoint. Training may continue without
    /// one, but the failure is surfaced and logged.
    #[error("checkpoint I/O: {0}")]
    Checkpoint(String),

    /// Error bubbled up from the pair-sampling layer.
    #[error(transparent)]
    Pair(#[from] pairdata::PairError),
}
