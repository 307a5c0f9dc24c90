use std::time::{Duration, Instant};

use crate::config::TrackerSettings;
use crate::tracker::canvas::{compose_frame, Canvas, OverlayStyle};
use crate::tracker::kinematics::{Bounce, ReflectionPolicy, TargetState, Viewport};
use crate::tracker::overlay::{OverlayDetection, OverlayState};
use crate::tracker::source::DetectionSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    pub at: Instant,
    pub target: TargetState,
    pub bounce: Bounce,
    pub detection: Option<OverlayDetection>,
    pub source_failed: bool,
    pub draw_failed: bool,
}

/// Fixed-cadence tracker: each tick moves the target, asks the source for a
/// detection and redraws the overlay.
///
/// The loop is driven externally through [`Tracker::poll`]. Ticks are
/// scheduled at a fixed rate from the previous deadline; when the caller falls
/// more than one period behind, the schedule restarts from the current time
/// instead of bursting through the missed ticks. A failed tick never stops the
/// schedule.
///
/// `stop` is a one-way teardown: the source is released exactly once and the
/// tracker cannot be started again.
pub struct Tracker {
    period: Duration,
    viewport: Viewport,
    reflection: ReflectionPolicy,
    target: TargetState,
    overlay: OverlayState,
    source: Box<dyn DetectionSource>,
    style: OverlayStyle,
    state: LoopState,
    next_tick: Option<Instant>,
    torn_down: bool,
    ticks: u64,
    detection_events: u64,
    resyncs: u64,
    origin: (f32, f32),
}

impl Tracker {
    pub fn new(settings: &TrackerSettings, source: Box<dyn DetectionSource>) -> Self {
        Self {
            period: settings.tick_period,
            viewport: settings.viewport,
            reflection: settings.reflection,
            target: settings.target,
            overlay: OverlayState::default(),
            source,
            style: OverlayStyle {
                caption: settings.caption.clone(),
                ..OverlayStyle::default()
            },
            state: LoopState::Stopped,
            next_tick: None,
            torn_down: false,
            ticks: 0,
            detection_events: 0,
            resyncs: 0,
            origin: settings.overlay_origin,
        }
    }

    /// Schedule the first tick one period after `now`.
    ///
    /// Returns `false` if already running or torn down.
    pub fn start(&mut self, now: Instant) -> bool {
        if self.torn_down {
            log::warn!("tracker already torn down; start ignored");
            return false;
        }
        if self.state == LoopState::Running {
            log::debug!("tracker already running");
            return false;
        }
        self.state = LoopState::Running;
        self.next_tick = Some(now + self.period);
        log::info!(
            "tracker started: period={}ms source={} viewport={}x{}",
            self.period.as_millis(),
            self.source.name(),
            self.viewport.width,
            self.viewport.height
        );
        true
    }

    /// Cancel pending ticks and release the detection source.
    ///
    /// Idempotent; returns `true` only for the call that performed teardown.
    pub fn stop(&mut self) -> bool {
        self.state = LoopState::Stopped;
        self.next_tick = None;
        if self.torn_down {
            return false;
        }
        self.torn_down = true;
        self.source.release();
        log::info!(
            "tracker stopped after {} ticks ({} detection events, {} resyncs)",
            self.ticks,
            self.detection_events,
            self.resyncs
        );
        true
    }

    /// Run the tick that is due at `now`, if any.
    pub fn poll(&mut self, now: Instant, canvas: &mut dyn Canvas) -> Option<TickReport> {
        if self.state != LoopState::Running {
            return None;
        }
        let deadline = self.next_tick?;
        if now < deadline {
            return None;
        }

        let report = self.tick(now, canvas);

        let mut next = deadline + self.period;
        if now >= next + self.period {
            self.resyncs += 1;
            log::debug!(
                "tick {} ran {}ms late; resyncing schedule",
                report.tick,
                now.duration_since(deadline).as_millis()
            );
            next = now + self.period;
        }
        self.next_tick = Some(next);
        Some(report)
    }

    fn tick(&mut self, now: Instant, canvas: &mut dyn Canvas) -> TickReport {
        self.ticks += 1;
        let bounce = self.target.step(self.viewport, self.reflection);

        let (detection, source_failed) = match self.source.poll(&self.target) {
            Ok(detection) => (detection, false),
            Err(e) => {
                log::warn!(
                    "detection source {} failed on tick {}: {:#}",
                    self.source.name(),
                    self.ticks,
                    e
                );
                (None, true)
            }
        };
        if detection.is_some() {
            self.detection_events += 1;
        }
        self.overlay = OverlayState::new(detection.clone());

        let draw_failed = match compose_frame(canvas, &self.target, &self.overlay, &self.style) {
            Ok(()) => false,
            Err(e) => {
                log::warn!("drawing tick {} failed: {:#}", self.ticks, e);
                true
            }
        };

        TickReport {
            tick: self.ticks,
            at: now,
            target: self.target,
            bounce,
            detection,
            source_failed,
            draw_failed,
        }
    }

    /// Move the overlay window by a pointer drag delta.
    pub fn on_input_delta(&mut self, dx: f32, dy: f32) {
        self.origin.0 += dx;
        self.origin.1 += dy;
    }

    /// New viewport bounds, applied from the next tick.
    pub fn resize(&mut self, viewport: Viewport) {
        log::debug!("viewport resized to {}x{}", viewport.width, viewport.height);
        self.viewport = viewport;
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_tick
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn target(&self) -> &TargetState {
        &self.target
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn detection_events(&self) -> u64 {
        self.detection_events
    }

    pub fn resyncs(&self) -> u64 {
        self.resyncs
    }

    /// Overlay window position in whole pixels.
    pub fn overlay_origin(&self) -> (i32, i32) {
        (self.origin.0 as i32, self.origin.1 as i32)
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::canvas::{DrawOp, RasterCanvas, RecordingCanvas, Stroke, TextStyle};
    use crate::tracker::overlay::Rect;
    use anyhow::{anyhow, Result};
    use image::Rgba;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default, Clone)]
    struct Counters {
        polls: Arc<AtomicUsize>,
        releases: Arc<AtomicUsize>,
    }

    struct ScriptedSource {
        script: Vec<Result<Option<OverlayDetection>, String>>,
        counters: Counters,
    }

    impl DetectionSource for ScriptedSource {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn poll(&mut self, _target: &TargetState) -> Result<Option<OverlayDetection>> {
            let i = self.counters.polls.fetch_add(1, Ordering::SeqCst);
            match self.script.get(i).cloned().unwrap_or(Ok(None)) {
                Ok(detection) => Ok(detection),
                Err(msg) => Err(anyhow!(msg)),
            }
        }

        fn release(&mut self) {
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn hit() -> OverlayDetection {
        OverlayDetection {
            rect: Rect::new(1, 2, 3, 4),
            label: "Object".to_string(),
            confidence: 0.9,
        }
    }

    fn tracker(script: Vec<Result<Option<OverlayDetection>, String>>) -> (Tracker, Counters) {
        let counters = Counters::default();
        let source = ScriptedSource {
            script,
            counters: counters.clone(),
        };
        let settings = TrackerSettings::default();
        (Tracker::new(&settings, Box::new(source)), counters)
    }

    struct FailingCanvas;

    impl Canvas for FailingCanvas {
        fn size(&self) -> (u32, u32) {
            (1, 1)
        }
        fn clear(&mut self, _color: Rgba<u8>) -> Result<()> {
            Err(anyhow!("surface lost"))
        }
        fn stroke_circle(&mut self, _c: (f32, f32), _r: f32, _s: Stroke) -> Result<()> {
            Err(anyhow!("surface lost"))
        }
        fn stroke_line(&mut self, _a: (f32, f32), _b: (f32, f32), _s: Stroke) -> Result<()> {
            Err(anyhow!("surface lost"))
        }
        fn stroke_rect(&mut self, _r: Rect, _s: Stroke) -> Result<()> {
            Err(anyhow!("surface lost"))
        }
        fn fill_text(&mut self, _t: &str, _b: (f32, f32), _s: &TextStyle) -> Result<()> {
            Err(anyhow!("surface lost"))
        }
    }

    #[test]
    fn nothing_happens_before_start_or_deadline() {
        let (mut t, counters) = tracker(vec![]);
        let mut canvas = RecordingCanvas::new(720, 1280);
        let t0 = Instant::now();
        assert!(t.poll(t0, &mut canvas).is_none());

        assert!(t.start(t0));
        assert!(!t.start(t0));
        assert!(t.poll(t0 + Duration::from_millis(10), &mut canvas).is_none());
        assert_eq!(counters.polls.load(Ordering::SeqCst), 0);
        assert_eq!(canvas.frame_count(), 0);
    }

    #[test]
    fn ticks_follow_fixed_rate_schedule() {
        let (mut t, _) = tracker(vec![]);
        let mut canvas = RecordingCanvas::new(720, 1280);
        let t0 = Instant::now();
        let period = t.period();
        t.start(t0);

        for n in 1..=3u32 {
            let due = t0 + period * n;
            assert_eq!(t.next_deadline(), Some(due));
            let report = t.poll(due, &mut canvas).expect("tick due");
            assert_eq!(report.tick, n as u64);
        }
        assert_eq!(canvas.frame_count(), 3);
        assert_eq!((t.target().x, t.target().y), (315.0, 309.0));
    }

    #[test]
    fn slight_lateness_keeps_cadence_but_large_lag_resyncs() {
        let (mut t, _) = tracker(vec![]);
        let mut canvas = RecordingCanvas::new(720, 1280);
        let t0 = Instant::now();
        let period = t.period();
        t.start(t0);

        let late = t0 + period + Duration::from_millis(5);
        t.poll(late, &mut canvas).expect("tick");
        assert_eq!(t.next_deadline(), Some(t0 + period * 2));

        let very_late = t0 + period * 10;
        t.poll(very_late, &mut canvas).expect("tick");
        assert_eq!(t.next_deadline(), Some(very_late + period));
        assert_eq!(t.resyncs(), 1);
        assert_eq!(t.ticks(), 2);
    }

    #[test]
    fn detection_shows_for_exactly_one_tick() {
        let (mut t, _) = tracker(vec![Ok(Some(hit())), Ok(None)]);
        let mut canvas = RecordingCanvas::new(720, 1280);
        let t0 = Instant::now();
        t.start(t0);

        let first = t.poll(t0 + t.period(), &mut canvas).expect("tick 1");
        assert_eq!(first.detection, Some(hit()));
        assert!(t.overlay().is_active());
        assert!(canvas.last_texts().contains(&"Object: 90%"));

        let second = t.poll(t0 + t.period() * 2, &mut canvas).expect("tick 2");
        assert!(second.detection.is_none());
        assert!(!t.overlay().is_active());
        assert!(!canvas
            .last_frame()
            .expect("frame")
            .iter()
            .any(|op| matches!(op, DrawOp::Rect { .. })));
        assert_eq!(t.detection_events(), 1);
    }

    #[test]
    fn source_failure_keeps_loop_alive() {
        let (mut t, counters) = tracker(vec![Err("boom".to_string()), Ok(Some(hit()))]);
        let mut canvas = RecordingCanvas::new(720, 1280);
        let t0 = Instant::now();
        t.start(t0);

        let first = t.poll(t0 + t.period(), &mut canvas).expect("tick 1");
        assert!(first.source_failed);
        assert!(first.detection.is_none());
        assert_eq!(canvas.frame_count(), 1);

        let second = t.poll(t0 + t.period() * 2, &mut canvas).expect("tick 2");
        assert!(!second.source_failed);
        assert_eq!(counters.polls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn draw_failure_keeps_loop_alive() {
        let (mut t, _) = tracker(vec![]);
        let t0 = Instant::now();
        t.start(t0);
        let first = t.poll(t0 + t.period(), &mut FailingCanvas).expect("tick 1");
        assert!(first.draw_failed);
        assert_eq!(t.next_deadline(), Some(t0 + t.period() * 2));
        assert!(t.poll(t0 + t.period() * 2, &mut FailingCanvas).is_some());
    }

    #[test]
    fn missing_font_is_reported_as_draw_failure() {
        let (mut t, _) = tracker(vec![]);
        let mut canvas = RasterCanvas::new(720, 1280);
        let t0 = Instant::now();
        t.start(t0);
        let report = t.poll(t0 + t.period(), &mut canvas).expect("tick");
        assert!(report.draw_failed);
        assert_eq!(t.next_deadline(), Some(t0 + t.period() * 2));
    }

    #[test]
    fn stop_is_idempotent_and_final() {
        let (mut t, counters) = tracker(vec![]);
        let mut canvas = RecordingCanvas::new(720, 1280);
        let t0 = Instant::now();
        t.start(t0);

        assert!(t.stop());
        assert!(!t.stop());
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
        assert_eq!(t.state(), LoopState::Stopped);
        assert!(t.poll(t0 + t.period() * 5, &mut canvas).is_none());
        assert!(!t.start(t0));

        drop(t);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
        assert_eq!(canvas.frame_count(), 0);
    }

    #[test]
    fn drop_releases_source() {
        let (t, counters) = tracker(vec![]);
        drop(t);
        assert_eq!(counters.releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drag_moves_overlay_origin() {
        let (mut t, _) = tracker(vec![]);
        assert_eq!(t.overlay_origin(), (100, 100));
        t.on_input_delta(12.5, -30.0);
        t.on_input_delta(0.6, 0.0);
        assert_eq!(t.overlay_origin(), (113, 70));
    }

    #[test]
    fn resize_applies_on_next_tick() {
        let (mut t, _) = tracker(vec![]);
        let mut canvas = RecordingCanvas::new(720, 1280);
        let t0 = Instant::now();
        t.resize(Viewport::new(390.0, 1280.0));
        t.start(t0);
        let report = t.poll(t0 + t.period(), &mut canvas).expect("tick");
        assert!(report.bounce.x);
        assert_eq!(report.target.x, 290.0);
        assert_eq!(report.target.dx, -5.0);
    }
}
