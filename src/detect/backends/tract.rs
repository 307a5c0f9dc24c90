#![cfg(feature = "backend-tract")]

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::InferenceBackend;
use crate::detect::decode::RawDetections;
use crate::detect::preprocess::{InputTensor, TensorLayout};

type RunnableOnnx = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract-based backend for ONNX SSD-style detectors.
///
/// The model must take one `f32` input of the configured layout and produce
/// four outputs in order: boxes `[1, N, 4]`, classes `[1, N]`, scores `[1, N]`
/// and a detection count `[1]`.
pub struct TractBackend {
    model: RunnableOnnx,
    input_size: u32,
    layout: TensorLayout,
}

impl TractBackend {
    /// Parse an in-memory ONNX model and prepare it for inference.
    pub fn from_bytes(bytes: &[u8], input_size: u32, layout: TensorLayout) -> Result<Self> {
        if bytes.is_empty() {
            return Err(anyhow!("model resource is empty"));
        }
        let [n, a, b, c] = layout.shape(input_size as usize);
        let model = tract_onnx::onnx()
            .model_for_read(&mut Cursor::new(bytes))
            .context("failed to parse ONNX model")?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(n, a, b, c)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            input_size,
            layout,
        })
    }
}

fn flat_f32(value: &TValue, what: &str) -> Result<Vec<f32>> {
    let tensor = value
        .cast_to::<f32>()
        .with_context(|| format!("{what} output is not numeric"))?;
    let slice = tensor
        .as_slice::<f32>()
        .with_context(|| format!("{what} output is not contiguous"))?;
    Ok(slice.to_vec())
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn layout(&self) -> TensorLayout {
        self.layout
    }

    fn infer(&mut self, input: &InputTensor) -> Result<RawDetections> {
        let tensor = Tensor::from_shape(&input.shape, &input.data)
            .context("failed to build input tensor")?;
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .context("ONNX inference failed")?;
        if outputs.len() < 4 {
            return Err(anyhow!(
                "model produced {} outputs, expected boxes/classes/scores/count",
                outputs.len()
            ));
        }

        let flat_boxes = flat_f32(&outputs[0], "boxes")?;
        if flat_boxes.len() % 4 != 0 {
            return Err(anyhow!(
                "boxes output has {} values, not a multiple of 4",
                flat_boxes.len()
            ));
        }
        let boxes = flat_boxes
            .chunks_exact(4)
            .map(|c| [c[0], c[1], c[2], c[3]])
            .collect();
        let classes = flat_f32(&outputs[1], "classes")?;
        let scores = flat_f32(&outputs[2], "scores")?;
        let count = flat_f32(&outputs[3], "count")?
            .first()
            .copied()
            .ok_or_else(|| anyhow!("count output is empty"))?;

        Ok(RawDetections {
            boxes,
            classes,
            scores,
            count,
        })
    }
}
