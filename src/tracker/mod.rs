//! Overlay tracker: a bouncing target, per-tick detection events and the
//! frame that renders them.

mod canvas;
mod clock;
mod frame_loop;
mod kinematics;
mod overlay;
mod source;

pub use canvas::{
    compose_frame, Canvas, DrawOp, OverlayStyle, RasterCanvas, RecordingCanvas, Shadow, Stroke,
    TextStyle,
};
pub use clock::{drive, Clock, ManualClock, RunSummary, StopHandle, SystemClock};
pub use frame_loop::{LoopState, TickReport, Tracker};
pub use kinematics::{Bounce, ReflectionPolicy, TargetState, Viewport};
pub use overlay::{format_label, OverlayDetection, OverlayState, Rect};
pub use source::{DetectionSource, DetectorSource, FrameSlot, SimulatedSource, SIMULATED_LABEL};
