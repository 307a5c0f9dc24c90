use anyhow::Result;

use crate::detect::decode::RawDetections;
use crate::detect::preprocess::{InputTensor, TensorLayout};

/// Inference engine behind a `Detector`.
///
/// A backend owns the loaded model and turns one preprocessed input tensor
/// into the four raw detection outputs. It knows nothing about the source
/// image size; denormalization happens in the `Detector`.
///
/// Backends are dropped exactly once, by `Detector::release` or when the
/// detector itself is dropped.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Side length of the square model input.
    fn input_size(&self) -> u32;

    /// Tensor layout the model expects.
    fn layout(&self) -> TensorLayout;

    /// Run the model on a tensor shaped by `layout().shape(input_size())`.
    fn infer(&mut self, input: &InputTensor) -> Result<RawDetections>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
