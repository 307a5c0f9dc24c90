use thiserror::Error;

/// Failure taxonomy of the detection path.
///
/// Only `UseAfterRelease` ever escapes `Detector::detect`; the other two are
/// recovered locally (degraded mode and placeholder batches respectively).
#[derive(Debug, Error)]
pub enum DetectorError {
    /// The model resource was missing, empty or could not be parsed.
    #[error("failed to load detection model: {0:#}")]
    ModelLoadFailure(anyhow::Error),

    /// Preprocessing or inference failed for a single call.
    #[error("inference failed: {0:#}")]
    InferenceFailure(anyhow::Error),

    /// `detect` was called after `release`. Caller contract violation.
    #[error("detector used after release")]
    UseAfterRelease,
}
