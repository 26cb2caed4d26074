//! Tensor bridge: flattened dataset rows ↔ burn tensors.
//!
//! The data layer hands over plain `Vec<f32>` image rows; the models need
//! `Tensor<B, 4>` batches. Shape mismatches here are the trainer's
//! `BatchShape` abort signal, so conversions are fallible and carry the
//! batch index for diagnosis.

use burn::prelude::*;
use burn::tensor::TensorData;

use crate::error::TrainError;

/// Stack flattened image rows into a `(batch, C, H, W)` tensor.
///
/// # Errors
/// `BatchShape` if any row's element count differs from `C * H * W`.
pub fn images_to_tensor<B: Backend>(
    rows: &[Vec<f32>],
    dims: [usize; 3],
    batch_index: usize,
    device: &B::Device,
) -> Result<Tensor<B, 4>, TrainError> {
    let expected = dims[0] * dims[1] * dims[2];
    for row in rows {
        if row.len() != expected {
            return Err(TrainError::BatchShape {
                batch_index,
                expected,
                actual: row.len(),
            });
        }
    }

    let batch = rows.len();
    let flat: Vec<f32> = rows.iter().flat_map(|r| r.iter().copied()).collect();
    Ok(Tensor::from_data(
        TensorData::new(flat, [batch, dims[0], dims[1], dims[2]]),
        device,
    ))
}

/// Positive/negative flags as a float `(batch,)` tensor: 1.0 / 0.0.
pub fn flags_to_tensor<B: Backend>(flags: &[bool], device: &B::Device) -> Tensor<B, 1> {
    let values: Vec<f32> = flags.iter().map(|&f| if f { 1.0 } else { 0.0 }).collect();
    let len = values.len();
    Tensor::from_data(TensorData::new(values, [len]), device)
}

/// Split a `(batch, dim)` embedding tensor back into `Vec<f32>` rows.
pub fn tensor_to_rows<B: Backend>(tensor: Tensor<B, 2>) -> Vec<Vec<f32>> {
    let [_, dim] = tensor.dims();
    let flat: Vec<f32> = tensor.into_data().to_vec().unwrap();
    flat.chunks(dim).map(|c| c.to_vec()).collect()
}
