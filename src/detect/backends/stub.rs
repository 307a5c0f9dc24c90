use anyhow::{anyhow, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::detect::backend::InferenceBackend;
use crate::detect::decode::RawDetections;
use crate::detect::preprocess::{InputTensor, TensorLayout};

/// Stub backend for testing and headless demos. Replays canned model outputs.
pub struct StubBackend {
    outputs: Option<RawDetections>,
    input_size: u32,
    layout: TensorLayout,
    probe: StubProbe,
}

/// Shared counters observing a `StubBackend` after it has been boxed into a detector.
#[derive(Clone, Debug, Default)]
pub struct StubProbe {
    inferences: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl StubProbe {
    pub fn inferences(&self) -> usize {
        self.inferences.load(Ordering::SeqCst)
    }

    /// How many times the backend (the "model handle") has been freed.
    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

impl StubBackend {
    /// Backend that returns `outputs` on every call.
    pub fn new(outputs: RawDetections) -> Self {
        Self {
            outputs: Some(outputs),
            input_size: 300,
            layout: TensorLayout::Nhwc,
            probe: StubProbe::default(),
        }
    }

    /// Backend whose every inference fails.
    pub fn failing() -> Self {
        Self {
            outputs: None,
            input_size: 300,
            layout: TensorLayout::Nhwc,
            probe: StubProbe::default(),
        }
    }

    pub fn with_input(mut self, input_size: u32, layout: TensorLayout) -> Self {
        self.input_size = input_size;
        self.layout = layout;
        self
    }
    pub fn probe(&self) -> StubProbe {
        self.probe.clone()
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn layout(&self) -> TensorLayout {
        self.layout
    }

    fn infer(&mut self, input: &InputTensor) -> Result<RawDetections> {
        self.probe.inferences.fetch_add(1, Ordering::SeqCst);
        let expected = self.layout.shape(self.input_size as usize);
        if input.shape != expected {
            return Err(anyhow!(
                "input shape {:?} does not match stub model input {:?}",
                input.shape,
                expected
            ));
        }
        self.outputs
            .clone()
            .ok_or_else(|| anyhow!("stub backend configured to fail"))
    }
}

impl Drop for StubBackend {
    fn drop(&mut self) {
        self.probe.drops.fetch_add(1, Ordering::SeqCst);
    }
}
