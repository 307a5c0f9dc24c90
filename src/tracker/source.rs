use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use image::DynamicImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::TrackerSettings;
use crate::detect::Detector;
use crate::tracker::overlay::{OverlayDetection, Rect};
use crate::tracker::TargetState;

pub const SIMULATED_LABEL: &str = "Object";

/// Supplies at most one detection per tick.
pub trait DetectionSource: Send {
    fn name(&self) -> &'static str;

    /// Called once per tick, after the target has moved.
    fn poll(&mut self, target: &TargetState) -> Result<Option<OverlayDetection>>;

    /// Free any held resources. Called once when the tracker stops.
    fn release(&mut self) {}
}

/// Random detection events centered on the moving target.
pub struct SimulatedSource<R = StdRng> {
    rng: R,
    event_probability: f64,
    margin: f32,
    confidence_range: (f32, f32),
    label: String,
}

impl SimulatedSource<StdRng> {
    /// Seeded from `settings.seed` when present, otherwise from entropy.
    pub fn from_settings(settings: &TrackerSettings) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(settings, rng)
    }

    pub fn seeded(settings: &TrackerSettings, seed: u64) -> Self {
        Self::with_rng(settings, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> SimulatedSource<R> {
    pub fn with_rng(settings: &TrackerSettings, rng: R) -> Self {
        Self {
            rng,
            event_probability: settings.event_probability,
            margin: settings.margin,
            confidence_range: settings.confidence_range,
            label: SIMULATED_LABEL.to_string(),
        }
    }
}

impl<R: Rng + Send> DetectionSource for SimulatedSource<R> {
    fn name(&self) -> &'static str {
        "simulated"
    }

    fn poll(&mut self, target: &TargetState) -> Result<Option<OverlayDetection>> {
        if self.rng.gen::<f64>() >= self.event_probability {
            return Ok(None);
        }
        let (lo, hi) = self.confidence_range;
        let confidence = lo + self.rng.gen::<f32>() * (hi - lo);
        Ok(Some(OverlayDetection {
            rect: Rect::around_target(target, self.margin),
            label: self.label.clone(),
            confidence,
        }))
    }
}

#[derive(Default)]
struct SlotInner {
    frame: Option<Arc<DynamicImage>>,
    generation: u64,
}

/// Latest-wins frame mailbox shared between a capture thread and the tracker.
///
/// Publishing replaces any frame the tracker has not consumed yet.
#[derive(Clone, Default)]
pub struct FrameSlot {
    inner: Arc<Mutex<SlotInner>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame`, superseding the previous one. Returns its generation.
    pub fn publish(&self, frame: DynamicImage) -> Result<u64> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("frame slot lock poisoned"))?;
        inner.generation += 1;
        inner.frame = Some(Arc::new(frame));
        Ok(inner.generation)
    }

    /// Newest frame if it is newer than `seen`.
    pub fn latest_since(&self, seen: u64) -> Result<Option<(u64, Arc<DynamicImage>)>> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| anyhow!("frame slot lock poisoned"))?;
        if inner.generation <= seen {
            return Ok(None);
        }
        Ok(inner.frame.clone().map(|frame| (inner.generation, frame)))
    }
}

/// Runs the detector on the newest published frame and reports its best hit.
///
/// Each frame is detected once; ticks that find no new frame repeat the
/// previous result.
pub struct DetectorSource {
    detector: Detector,
    frames: FrameSlot,
    seen: u64,
    last: Option<OverlayDetection>,
}

impl DetectorSource {
    pub fn new(detector: Detector, frames: FrameSlot) -> Self {
        Self {
            detector,
            frames,
            seen: 0,
            last: None,
        }
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }
}

impl DetectionSource for DetectorSource {
    fn name(&self) -> &'static str {
        "detector"
    }

    fn poll(&mut self, _target: &TargetState) -> Result<Option<OverlayDetection>> {
        let Some((generation, frame)) = self.frames.latest_since(self.seen)? else {
            return Ok(self.last.clone());
        };
        self.seen = generation;
        self.last = None;

        let batch = self.detector.detect(&frame)?;
        self.last = batch.best().map(|det| OverlayDetection {
            rect: Rect::from_bbox(det.bbox()),
            label: self.detector.label_for(det.class_id()).to_string(),
            confidence: det.score(),
        });
        log::debug!(
            "frame {} detected: valid={} placeholder={}",
            generation,
            batch.valid_count(),
            batch.is_placeholder()
        );
        Ok(self.last.clone())
    }

    fn release(&mut self) {
        self.detector.release();
    }
}
