//! overlayd - bouncing-target overlay driven at a fixed frame rate
//!
//! Detection events come either from the simulated source or from the
//! detector running over a rotating set of still frames. Rendered frames can
//! be written out as PNG snapshots.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use image::DynamicImage;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use overlay_vision::tracker::{
    drive, DetectionSource, DetectorSource, FrameSlot, RasterCanvas, SimulatedSource, StopHandle,
    SystemClock, Tracker,
};
use overlay_vision::ui::{Ui, UiMode};
use overlay_vision::{Detector, OverlayConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    Simulated,
    Model,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (JSON, or TOML by extension). Defaults to $OVERLAY_CONFIG.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Where detection events come from.
    #[arg(long, value_enum, default_value_t = SourceKind::Simulated)]
    source: SourceKind,
    /// Still images fed to the detector in rotation (model source only).
    #[arg(long = "frame", value_name = "PATH")]
    frames: Vec<PathBuf>,
    /// Delay between published frames.
    #[arg(long, default_value_t = 100)]
    frame_interval_ms: u64,
    /// Stop after this many ticks. Runs until Ctrl-C otherwise.
    #[arg(long)]
    ticks: Option<u64>,
    /// Write PNG snapshots of rendered frames into this directory.
    #[arg(long, value_name = "DIR")]
    snapshot_dir: Option<PathBuf>,
    /// Snapshot every N ticks.
    #[arg(long, default_value_t = 30)]
    snapshot_every: u64,
    /// TrueType/OpenType font used for labels and the caption. Required,
    /// since every frame draws the caption.
    #[arg(long, value_name = "PATH")]
    font: PathBuf,
    /// Seed for the simulated source.
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let ui = Ui::new(UiMode::parse(Some(&args.ui)), std::io::stderr().is_terminal());

    let mut cfg = match &args.config {
        Some(path) => OverlayConfig::load_from(Some(path.as_path()))?,
        None => OverlayConfig::load()?,
    };
    if let Some(seed) = args.seed {
        cfg.tracker.seed = Some(seed);
    }

    let stop = StopHandle::new();
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.stop()).context("failed to install Ctrl-C handler")?;

    let mut feeder = None;
    let source: Box<dyn DetectionSource> = match args.source {
        SourceKind::Simulated => Box::new(SimulatedSource::from_settings(&cfg.tracker)),
        SourceKind::Model => {
            let detector = {
                let _stage = ui.stage("load detection model");
                let labels = cfg.detector.load_labels()?;
                Detector::open(&cfg.detector.model_path, &cfg.detector, labels)
            };
            if detector.is_degraded() {
                log::warn!("no usable model; overlay will show placeholder detections");
            }
            let slot = FrameSlot::new();
            let frames = load_frames(&args.frames)?;
            feeder = Some(spawn_feeder(
                frames,
                slot.clone(),
                stop.clone(),
                Duration::from_millis(args.frame_interval_ms),
            ));
            Box::new(DetectorSource::new(detector, slot))
        }
    };

    let mut canvas = RasterCanvas::new(
        cfg.tracker.viewport.width as u32,
        cfg.tracker.viewport.height as u32,
    )
    .with_font_file(&args.font)?;
    if let Some(dir) = &args.snapshot_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }
    let snapshot_every = args.snapshot_every.max(1);

    let mut tracker = Tracker::new(&cfg.tracker, source);
    let progress = ui.loop_progress(args.ticks, cfg_ticks_per_second(&cfg));
    let summary = drive(
        &mut tracker,
        &SystemClock,
        &mut canvas,
        &stop,
        args.ticks,
        |report, canvas| {
            progress.update(report);
            match &args.snapshot_dir {
                Some(dir) if report.tick % snapshot_every == 0 => {
                    canvas.save_png(&dir.join(format!("tick_{:06}.png", report.tick)))
                }
                _ => Ok(()),
            }
        },
    )?;

    stop.stop();
    if let Some(handle) = feeder {
        handle
            .join()
            .map_err(|_| anyhow!("frame feeder thread panicked"))?;
    }
    progress.finish(&summary);
    log::info!(
        "overlayd finished: ticks={} detection_events={} source_failures={} draw_failures={}",
        summary.ticks,
        summary.detection_events,
        summary.source_failures,
        summary.draw_failures
    );
    Ok(())
}

fn cfg_ticks_per_second(cfg: &OverlayConfig) -> u64 {
    let millis = cfg.tracker.tick_period.as_millis().max(1) as u64;
    (1000 / millis).max(1)
}

fn load_frames(paths: &[PathBuf]) -> Result<Vec<DynamicImage>> {
    if paths.is_empty() {
        return Err(anyhow!("--source model needs at least one --frame image"));
    }
    paths.iter().map(PathBuf::as_path).map(open_frame).collect()
}

fn open_frame(path: &Path) -> Result<DynamicImage> {
    image::open(path).with_context(|| format!("failed to open frame {}", path.display()))
}

fn spawn_feeder(
    frames: Vec<DynamicImage>,
    slot: FrameSlot,
    stop: StopHandle,
    interval: Duration,
) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for frame in frames.iter().cycle() {
            if stop.is_stopped() {
                break;
            }
            if let Err(e) = slot.publish(frame.clone()) {
                log::error!("frame feeder stopping: {:#}", e);
                break;
            }
            std::thread::sleep(interval);
        }
    })
}
