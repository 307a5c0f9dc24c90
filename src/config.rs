use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::{LabelTable, TensorLayout};
use crate::tracker::{ReflectionPolicy, TargetState, Viewport};

const DEFAULT_MODEL_PATH: &str = "model.onnx";
const DEFAULT_INPUT_SIZE: u32 = 300;
const DEFAULT_CAPACITY: usize = 10;
const DEFAULT_SCORE_THRESHOLD: f32 = 0.5;
const DEFAULT_TICK_MS: u64 = 1000 / 30;
const DEFAULT_EVENT_PROBABILITY: f64 = 0.05;
const DEFAULT_MARGIN: f32 = 1.2;
const DEFAULT_CONFIDENCE_RANGE: [f32; 2] = [0.7, 1.0];
const DEFAULT_VIEWPORT: [u32; 2] = [720, 1280];
const DEFAULT_CAPTION: &str = "Tracking Demo";
const DEFAULT_OVERLAY_ORIGIN: [f32; 2] = [100.0, 100.0];

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    detector: Option<DetectorConfigFile>,
    tracker: Option<TrackerConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<PathBuf>,
    labels_path: Option<PathBuf>,
    input_size: Option<u32>,
    capacity: Option<usize>,
    score_threshold: Option<f32>,
    layout: Option<TensorLayout>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    tick_ms: Option<u64>,
    event_probability: Option<f64>,
    margin: Option<f32>,
    confidence_range: Option<[f32; 2]>,
    viewport: Option<[u32; 2]>,
    target: Option<TargetConfigFile>,
    reflection: Option<ReflectionPolicy>,
    seed: Option<u64>,
    caption: Option<String>,
    overlay_origin: Option<[f32; 2]>,
}

#[derive(Debug, Deserialize, Default)]
struct TargetConfigFile {
    x: Option<f32>,
    y: Option<f32>,
    dx: Option<f32>,
    dy: Option<f32>,
    radius: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct OverlayConfig {
    pub detector: DetectorSettings,
    pub tracker: TrackerSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub model_path: PathBuf,
    pub labels_path: Option<PathBuf>,
    pub input_size: u32,
    pub capacity: usize,
    pub score_threshold: f32,
    pub layout: TensorLayout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackerSettings {
    pub tick_period: Duration,
    pub event_probability: f64,
    pub margin: f32,
    pub confidence_range: (f32, f32),
    pub viewport: Viewport,
    pub target: TargetState,
    pub reflection: ReflectionPolicy,
    pub seed: Option<u64>,
    pub caption: String,
    pub overlay_origin: (f32, f32),
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            labels_path: None,
            input_size: DEFAULT_INPUT_SIZE,
            capacity: DEFAULT_CAPACITY,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            layout: TensorLayout::default(),
        }
    }
}

impl DetectorSettings {
    /// Label table named by `labels_path`, or the built-in table.
    pub fn load_labels(&self) -> Result<LabelTable> {
        match &self.labels_path {
            Some(path) => LabelTable::from_json_file(path),
            None => Ok(LabelTable::default()),
        }
    }
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_millis(DEFAULT_TICK_MS),
            event_probability: DEFAULT_EVENT_PROBABILITY,
            margin: DEFAULT_MARGIN,
            confidence_range: (DEFAULT_CONFIDENCE_RANGE[0], DEFAULT_CONFIDENCE_RANGE[1]),
            viewport: Viewport::new(DEFAULT_VIEWPORT[0] as f32, DEFAULT_VIEWPORT[1] as f32),
            target: TargetState::default(),
            reflection: ReflectionPolicy::default(),
            seed: None,
            caption: DEFAULT_CAPTION.to_string(),
            overlay_origin: (DEFAULT_OVERLAY_ORIGIN[0], DEFAULT_OVERLAY_ORIGIN[1]),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            detector: DetectorSettings::default(),
            tracker: TrackerSettings::default(),
        }
    }
}

impl OverlayConfig {
    /// Defaults, then the file named by `OVERLAY_CONFIG`, then `OVERLAY_*` env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("OVERLAY_CONFIG").ok();
        let config_path = config_path
            .as_deref()
            .filter(|path| !path.trim().is_empty())
            .map(Path::new);
        Self::load_from(config_path)
    }

    /// Like [`OverlayConfig::load`] with an explicit file in place of `OVERLAY_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let file_cfg = match path {
            Some(path) => read_config_file(path)?,
            None => OverlayConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: OverlayConfigFile) -> Self {
        let defaults = Self::default();

        let det = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            model_path: det.model_path.unwrap_or(defaults.detector.model_path),
            labels_path: det.labels_path,
            input_size: det.input_size.unwrap_or(defaults.detector.input_size),
            capacity: det.capacity.unwrap_or(defaults.detector.capacity),
            score_threshold: det
                .score_threshold
                .unwrap_or(defaults.detector.score_threshold),
            layout: det.layout.unwrap_or(defaults.detector.layout),
        };

        let trk = file.tracker.unwrap_or_default();
        let base = defaults.tracker;
        let target = trk.target.unwrap_or_default();
        let tracker = TrackerSettings {
            tick_period: trk
                .tick_ms
                .map(Duration::from_millis)
                .unwrap_or(base.tick_period),
            event_probability: trk.event_probability.unwrap_or(base.event_probability),
            margin: trk.margin.unwrap_or(base.margin),
            confidence_range: trk
                .confidence_range
                .map(|[lo, hi]| (lo, hi))
                .unwrap_or(base.confidence_range),
            viewport: trk
                .viewport
                .map(|[w, h]| Viewport::new(w as f32, h as f32))
                .unwrap_or(base.viewport),
            target: TargetState {
                x: target.x.unwrap_or(base.target.x),
                y: target.y.unwrap_or(base.target.y),
                dx: target.dx.unwrap_or(base.target.dx),
                dy: target.dy.unwrap_or(base.target.dy),
                radius: target.radius.unwrap_or(base.target.radius),
            },
            reflection: trk.reflection.unwrap_or(base.reflection),
            seed: trk.seed,
            caption: trk.caption.unwrap_or(base.caption),
            overlay_origin: trk
                .overlay_origin
                .map(|[x, y]| (x, y))
                .unwrap_or(base.overlay_origin),
        };

        Self { detector, tracker }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("OVERLAY_MODEL_PATH") {
            if !path.trim().is_empty() {
                self.detector.model_path = PathBuf::from(path);
            }
        }
        if let Ok(path) = std::env::var("OVERLAY_LABELS_PATH") {
            if !path.trim().is_empty() {
                self.detector.labels_path = Some(PathBuf::from(path));
            }
        }
        if let Ok(layout) = std::env::var("OVERLAY_LAYOUT") {
            self.detector.layout = TensorLayout::parse(&layout)?;
        }
        if let Ok(threshold) = std::env::var("OVERLAY_SCORE_THRESHOLD") {
            self.detector.score_threshold = threshold
                .trim()
                .parse()
                .map_err(|_| anyhow!("OVERLAY_SCORE_THRESHOLD must be a number"))?;
        }
        if let Ok(tick_ms) = std::env::var("OVERLAY_TICK_MS") {
            let millis: u64 = tick_ms
                .trim()
                .parse()
                .map_err(|_| anyhow!("OVERLAY_TICK_MS must be an integer number of milliseconds"))?;
            self.tracker.tick_period = Duration::from_millis(millis);
        }
        if let Ok(probability) = std::env::var("OVERLAY_EVENT_PROBABILITY") {
            self.tracker.event_probability = probability
                .trim()
                .parse()
                .map_err(|_| anyhow!("OVERLAY_EVENT_PROBABILITY must be a number"))?;
        }
        if let Ok(seed) = std::env::var("OVERLAY_SEED") {
            let seed: u64 = seed
                .trim()
                .parse()
                .map_err(|_| anyhow!("OVERLAY_SEED must be an unsigned integer"))?;
            self.tracker.seed = Some(seed);
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let det = &self.detector;
        if det.input_size == 0 {
            return Err(anyhow!("detector input_size must be greater than zero"));
        }
        if det.capacity == 0 {
            return Err(anyhow!("detector capacity must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&det.score_threshold) {
            return Err(anyhow!("score_threshold must be within [0, 1]"));
        }

        let trk = &self.tracker;
        if trk.tick_period.is_zero() {
            return Err(anyhow!("tick period must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&trk.event_probability) {
            return Err(anyhow!("event_probability must be within [0, 1]"));
        }
        if !(trk.margin > 0.0) {
            return Err(anyhow!("margin must be greater than zero"));
        }
        let (lo, hi) = trk.confidence_range;
        if !(0.0..=1.0).contains(&lo) || !(0.0..=1.0).contains(&hi) || lo > hi {
            return Err(anyhow!(
                "confidence_range must satisfy 0 <= min <= max <= 1 (got [{}, {}])",
                lo,
                hi
            ));
        }
        if trk.viewport.width <= 0.0 || trk.viewport.height <= 0.0 {
            return Err(anyhow!("viewport must have a positive width and height"));
        }
        if !(trk.target.radius > 0.0) {
            return Err(anyhow!("target radius must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<OverlayConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}
