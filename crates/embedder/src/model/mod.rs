//! Embedding network components: the `ImageEmbedder` capability trait,
//! concrete conv/MLP networks, and the tensor bridge between flattened
//! dataset rows and burn tensors.

pub mod bridge;
pub mod conv;
pub mod embed;
pub mod mlp;
