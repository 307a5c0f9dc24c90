//! Overlay Vision
//!
//! Object detection and a fixed-rate tracking overlay.
//!
//! # Architecture
//!
//! The crate has two halves that meet at [`tracker::DetectionSource`]:
//!
//! 1. **Detection**: a [`Detector`] owns one model handle and turns an image
//!    into a fixed-capacity [`DetectionBatch`] in the image's pixel space. A
//!    model that cannot be loaded puts the detector into degraded mode, where
//!    every call yields a single placeholder detection instead of failing.
//! 2. **Tracking**: a [`Tracker`] runs at a fixed cadence, moves a circular
//!    target that bounces off the viewport edges, polls its detection source
//!    once per tick and redraws the overlay on a [`tracker::Canvas`].
//!
//! # Module Structure
//!
//! - `config`: layered configuration (defaults, file, `OVERLAY_*` env)
//! - `detect`: preprocessing, inference backends, decoding, the detector
//! - `tracker`: kinematics, detection sources, drawing, the frame loop
//! - `ui`: terminal progress for the binaries

pub mod config;
pub mod detect;
pub mod tracker;
pub mod ui;

pub use config::{DetectorSettings, OverlayConfig, TrackerSettings};
pub use detect::{
    BatchSource, BoundingBox, Detection, DetectionBatch, Detector, DetectorError, LabelTable,
    TensorLayout,
};
pub use tracker::{
    drive, ReflectionPolicy, StopHandle, TargetState, TickReport, Tracker, Viewport,
};
