//! detect_image - run the detector once over a still image and print the batch as JSON

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;

use overlay_vision::{Detector, OverlayConfig, TensorLayout};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Image to run detection on.
    image: PathBuf,
    /// Config file (JSON, or TOML by extension). Defaults to $OVERLAY_CONFIG.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// ONNX model, overriding the configured path.
    #[arg(long, value_name = "PATH")]
    model: Option<PathBuf>,
    /// JSON label table, overriding the configured one.
    #[arg(long, value_name = "PATH")]
    labels: Option<PathBuf>,
    /// Model input layout (nhwc or nchw).
    #[arg(long)]
    layout: Option<String>,
    /// Include empty slots in the output.
    #[arg(long)]
    all_slots: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let mut cfg = OverlayConfig::load_from(args.config.as_deref())?;
    if let Some(model) = args.model {
        cfg.detector.model_path = model;
    }
    if let Some(labels) = args.labels {
        cfg.detector.labels_path = Some(labels);
    }
    if let Some(layout) = args.layout.as_deref() {
        cfg.detector.layout = TensorLayout::parse(layout)?;
    }

    let labels = cfg.detector.load_labels()?;
    let mut detector = Detector::open(&cfg.detector.model_path, &cfg.detector, labels);
    let image = image::open(&args.image)
        .with_context(|| format!("failed to open image {}", args.image.display()))?;
    let batch = detector.detect(&image)?;

    let detections: Vec<_> = batch
        .slots()
        .iter()
        .enumerate()
        .filter(|(_, slot)| args.all_slots || slot.is_some())
        .map(|(index, slot)| match slot {
            Some(det) => json!({
                "slot": index,
                "class_id": det.class_id(),
                "label": detector.label_for(det.class_id()),
                "score": det.score(),
                "bbox": det.bbox(),
            }),
            None => json!({ "slot": index }),
        })
        .collect();

    let report = json!({
        "image": args.image.display().to_string(),
        "width": image.width(),
        "height": image.height(),
        "backend": detector.backend_name(),
        "degraded": detector.is_degraded(),
        "placeholder": batch.is_placeholder(),
        "source": batch.source(),
        "capacity": batch.capacity(),
        "reported_count": batch.reported_count(),
        "valid_count": batch.valid_count(),
        "detections": detections,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    detector.release();
    Ok(())
}
