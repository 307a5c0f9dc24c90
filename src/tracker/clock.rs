use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};

use crate::tracker::canvas::Canvas;
use crate::tracker::frame_loop::{TickReport, Tracker};

pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep_until(&self, deadline: Instant);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep_until(&self, deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Clock that only moves when told to. Sleeping jumps straight to the deadline.
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn sleep_until(&self, deadline: Instant) {
        if deadline > self.now.get() {
            self.now.set(deadline);
        }
    }
}

/// Shared stop flag, set from a signal handler or another thread.
#[derive(Debug, Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ticks: u64,
    pub detection_events: u64,
    pub source_failures: u64,
    pub draw_failures: u64,
}

impl RunSummary {
    fn record(&mut self, report: &TickReport) {
        self.ticks += 1;
        if report.detection.is_some() {
            self.detection_events += 1;
        }
        if report.source_failed {
            self.source_failures += 1;
        }
        if report.draw_failed {
            self.draw_failures += 1;
        }
    }
}

/// Run `tracker` against `clock` until `stop` is set or `max_ticks` ticks ran,
/// then tear it down.
///
/// Starts the tracker if it is not running yet. `on_tick` sees each report
/// together with the freshly drawn canvas; its errors are logged and ignored.
pub fn drive<C, K, F>(
    tracker: &mut Tracker,
    clock: &C,
    canvas: &mut K,
    stop: &StopHandle,
    max_ticks: Option<u64>,
    mut on_tick: F,
) -> Result<RunSummary>
where
    C: Clock + ?Sized,
    K: Canvas,
    F: FnMut(&TickReport, &K) -> Result<()>,
{
    if !tracker.is_running() && !tracker.start(clock.now()) {
        return Err(anyhow!("tracker has been torn down and cannot be driven"));
    }

    let mut summary = RunSummary::default();
    while !stop.is_stopped() {
        if max_ticks.is_some_and(|max| summary.ticks >= max) {
            break;
        }
        let Some(deadline) = tracker.next_deadline() else {
            break;
        };
        clock.sleep_until(deadline);
        if stop.is_stopped() {
            break;
        }
        if let Some(report) = tracker.poll(clock.now(), canvas) {
            summary.record(&report);
            if let Err(e) = on_tick(&report, canvas) {
                log::warn!("tick {} observer failed: {:#}", report.tick, e);
            }
        }
    }

    tracker.stop();
    Ok(summary)
}
