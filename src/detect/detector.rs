use std::path::Path;
use std::time::Instant;

use image::DynamicImage;
use sha2::{Digest, Sha256};

use crate::config::DetectorSettings;
use crate::detect::backend::InferenceBackend;
use crate::detect::decode::{decode, DecodeParams};
use crate::detect::error::DetectorError;
use crate::detect::labels::LabelTable;
use crate::detect::preprocess::to_input_tensor;
use crate::detect::result::DetectionBatch;

enum ModelState {
    Ready(Box<dyn InferenceBackend>),
    Degraded,
    Released,
}

/// Object detector owning one exclusively held model handle.
///
/// Construction never fails: when the model cannot be loaded the detector
/// runs in degraded mode and every `detect` call yields the placeholder batch.
/// Inference failures are logged and replaced by the same placeholder. The
/// only error `detect` returns is [`DetectorError::UseAfterRelease`].
pub struct Detector {
    state: ModelState,
    labels: LabelTable,
    capacity: usize,
    score_threshold: f32,
}

impl Detector {
    /// Load a model from memory, falling back to degraded mode on failure.
    pub fn load(model_bytes: &[u8], settings: &DetectorSettings, labels: LabelTable) -> Self {
        match Self::try_load(model_bytes, settings, labels.clone()) {
            Ok(detector) => detector,
            Err(e) => {
                log::error!("{}; detector running in degraded mode", e);
                Self::degraded(settings, labels)
            }
        }
    }

    /// Strict variant of [`Detector::load`] that reports load failures.
    pub fn try_load(
        model_bytes: &[u8],
        settings: &DetectorSettings,
        labels: LabelTable,
    ) -> Result<Self, DetectorError> {
        if model_bytes.is_empty() {
            return Err(DetectorError::ModelLoadFailure(anyhow::anyhow!(
                "model resource is empty"
            )));
        }
        let backend =
            load_backend(model_bytes, settings).map_err(DetectorError::ModelLoadFailure)?;
        log::info!(
            "detection model loaded: backend={} bytes={} sha256={}",
            backend.name(),
            model_bytes.len(),
            hex::encode(Sha256::digest(model_bytes))
        );
        Ok(Self::with_backend(backend, settings, labels))
    }

    /// Read the bundled model file. A missing or unreadable file means degraded mode.
    pub fn open(path: &Path, settings: &DetectorSettings, labels: LabelTable) -> Self {
        match std::fs::read(path) {
            Ok(bytes) => Self::load(&bytes, settings, labels),
            Err(e) => {
                log::error!(
                    "failed to read detection model {}: {}; detector running in degraded mode",
                    path.display(),
                    e
                );
                Self::degraded(settings, labels)
            }
        }
    }

    /// Wrap an already constructed backend.
    pub fn with_backend(
        mut backend: Box<dyn InferenceBackend>,
        settings: &DetectorSettings,
        labels: LabelTable,
    ) -> Self {
        if let Err(e) = backend.warm_up() {
            log::warn!("backend {} warm-up failed: {:#}", backend.name(), e);
        }
        Self {
            state: ModelState::Ready(backend),
            labels,
            capacity: settings.capacity,
            score_threshold: settings.score_threshold,
        }
    }

    /// Detector without a model. Every call returns the placeholder batch.
    pub fn degraded(settings: &DetectorSettings, labels: LabelTable) -> Self {
        Self {
            state: ModelState::Degraded,
            labels,
            capacity: settings.capacity,
            score_threshold: settings.score_threshold,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self.state, ModelState::Degraded)
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, ModelState::Released)
    }

    pub fn backend_name(&self) -> Option<&'static str> {
        match &self.state {
            ModelState::Ready(backend) => Some(backend.name()),
            _ => None,
        }
    }

    pub fn label_for(&self, class_id: i32) -> &str {
        self.labels.label_for(class_id)
    }

    /// Run detection on `image`; coordinates come back in `image`'s pixel space.
    pub fn detect(&mut self, image: &DynamicImage) -> Result<DetectionBatch, DetectorError> {
        let params = DecodeParams {
            capacity: self.capacity,
            score_threshold: self.score_threshold,
        };
        let backend = match &mut self.state {
            ModelState::Released => return Err(DetectorError::UseAfterRelease),
            ModelState::Degraded => return Ok(DetectionBatch::placeholder(self.capacity)),
            ModelState::Ready(backend) => backend,
        };

        match run_inference(backend.as_mut(), image, params) {
            Ok(batch) => Ok(batch),
            Err(e) => {
                log::warn!("{}; substituting placeholder detections", e);
                Ok(DetectionBatch::placeholder(self.capacity))
            }
        }
    }

    /// Free the model handle. Returns `false` when it was already released.
    pub fn release(&mut self) -> bool {
        match std::mem::replace(&mut self.state, ModelState::Released) {
            ModelState::Ready(backend) => {
                let name = backend.name();
                drop(backend);
                log::info!("detection model released (backend={})", name);
                true
            }
            ModelState::Degraded => {
                log::debug!("degraded detector released");
                true
            }
            ModelState::Released => false,
        }
    }
}

impl Drop for Detector {
    fn drop(&mut self) {
        self.release();
    }
}

fn run_inference(
    backend: &mut dyn InferenceBackend,
    image: &DynamicImage,
    params: DecodeParams,
) -> Result<DetectionBatch, DetectorError> {
    let start = Instant::now();
    let input = to_input_tensor(image, backend.input_size(), backend.layout())
        .map_err(DetectorError::InferenceFailure)?;
    let raw = backend
        .infer(&input)
        .map_err(DetectorError::InferenceFailure)?;
    let batch = decode(&raw, image.width(), image.height(), params)
        .map_err(DetectorError::InferenceFailure)?;
    log::debug!(
        "inference on {}x{} took {}ms: reported={} valid={}",
        image.width(),
        image.height(),
        start.elapsed().as_millis(),
        batch.reported_count(),
        batch.valid_count()
    );
    Ok(batch)
}

#[cfg(feature = "backend-tract")]
fn load_backend(
    model_bytes: &[u8],
    settings: &DetectorSettings,
) -> anyhow::Result<Box<dyn InferenceBackend>> {
    let backend = crate::detect::backends::TractBackend::from_bytes(
        model_bytes,
        settings.input_size,
        settings.layout,
    )?;
    Ok(Box::new(backend))
}

#[cfg(not(feature = "backend-tract"))]
fn load_backend(
    _model_bytes: &[u8],
    _settings: &DetectorSettings,
) -> anyhow::Result<Box<dyn InferenceBackend>> {
    Err(anyhow::anyhow!(
        "no inference backend compiled in (enable the backend-tract feature)"
    ))
}
