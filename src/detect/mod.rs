//! Detection path: image → fixed-capacity batch of scored boxes.
//!
//! - `preprocess`: resize + normalize into the model's input tensor
//! - `backend`/`backends`: inference engines (tract ONNX, stub)
//! - `decode`: raw model outputs → caller-space `DetectionBatch`
//! - `detector`: lifecycle, degraded mode and failure recovery

mod backend;
pub mod backends;
mod decode;
mod detector;
mod error;
mod labels;
mod preprocess;
mod result;

pub use backend::InferenceBackend;
pub use backends::{StubBackend, StubProbe};
pub use decode::{decode, DecodeParams, RawDetections};
pub use detector::Detector;
pub use error::DetectorError;
pub use labels::{LabelTable, UNKNOWN_LABEL};
pub use preprocess::{frame_from_rgba, to_input_tensor, InputTensor, TensorLayout};
pub use result::{BatchSource, BoundingBox, Detection, DetectionBatch};

#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
