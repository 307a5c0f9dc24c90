use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

use crate::tracker::{RunSummary, TickReport};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

impl UiMode {
    pub fn parse(flag: Option<&str>) -> Self {
        match flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        }
    }
}

/// Terminal feedback for the binaries: spinners on a TTY, plain lines otherwise.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    /// Timed step such as loading the model. Reports its duration when dropped.
    pub fn stage(&self, name: &str) -> StageGuard {
        let spinner = if self.pretty() {
            let spinner = spinner("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            Some(spinner)
        } else {
            eprintln!("==> {}", name);
            None
        };
        StageGuard {
            name: name.to_string(),
            start: Instant::now(),
            spinner,
        }
    }

    /// Live tick counter for the frame loop. Plain mode prints every `every` ticks.
    pub fn loop_progress(&self, max_ticks: Option<u64>, every: u64) -> LoopProgress {
        let bar = if self.pretty() {
            let bar = match max_ticks {
                Some(max) => {
                    let bar = ProgressBar::new(max);
                    bar.set_draw_target(ProgressDrawTarget::stderr());
                    bar.set_style(
                        ProgressStyle::with_template("{bar:30} {pos}/{len} ticks {msg}")
                            .unwrap_or_else(|_| ProgressStyle::default_bar()),
                    );
                    bar
                }
                None => spinner("{spinner} {pos} ticks {msg}"),
            };
            Some(bar)
        } else {
            None
        };
        LoopProgress {
            bar,
            every: every.max(1),
        }
    }
}

fn spinner(template: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_style(
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

pub struct LoopProgress {
    bar: Option<ProgressBar>,
    every: u64,
}

impl LoopProgress {
    pub fn update(&self, report: &TickReport) {
        let hit = report
            .detection
            .as_ref()
            .map(|d| d.label_text())
            .unwrap_or_default();
        match &self.bar {
            Some(bar) => {
                bar.set_position(report.tick);
                if !hit.is_empty() {
                    bar.set_message(hit);
                }
            }
            None if report.tick % self.every == 0 || !hit.is_empty() => {
                eprintln!(
                    "tick {} target=({:.0},{:.0}) {}",
                    report.tick, report.target.x, report.target.y, hit
                );
            }
            None => {}
        }
    }

    pub fn finish(self, summary: &RunSummary) {
        let message = format!(
            "{} ticks, {} detection events, {} draw failures",
            summary.ticks, summary.detection_events, summary.draw_failures
        );
        match self.bar {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("✔ {message}"),
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
