use std::time::Duration;

use image::{DynamicImage, Rgb, RgbImage};

use overlay_vision::detect::{RawDetections, StubBackend};
use overlay_vision::tracker::{
    drive, Clock, DetectorSource, DrawOp, FrameSlot, ManualClock, RecordingCanvas,
    SimulatedSource, StopHandle, Tracker,
};
use overlay_vision::{Detector, DetectorSettings, LabelTable, TrackerSettings};

fn settings(event_probability: f64) -> TrackerSettings {
    TrackerSettings {
        event_probability,
        ..TrackerSettings::default()
    }
}

#[test]
fn runs_exactly_n_frames_at_the_configured_period() {
    let cfg = settings(0.05);
    let clock = ManualClock::new();
    let start = clock.now();
    let mut canvas = RecordingCanvas::new(720, 1280);
    let mut tracker = Tracker::new(&cfg, Box::new(SimulatedSource::seeded(&cfg, 9)));
    let mut tick_times = Vec::new();

    let summary = drive(
        &mut tracker,
        &clock,
        &mut canvas,
        &StopHandle::new(),
        Some(30),
        |report, _| {
            tick_times.push(report.at);
            Ok(())
        },
    )
    .expect("drive");

    assert_eq!(summary.ticks, 30);
    assert_eq!(canvas.frame_count(), 30);
    assert_eq!(tick_times.len(), 30);
    for (n, at) in tick_times.iter().enumerate() {
        assert_eq!(*at, start + cfg.tick_period * (n as u32 + 1));
    }
    assert!(!tracker.is_running());
    assert!(tracker.is_torn_down());
}

#[test]
fn every_frame_draws_target_and_caption() {
    let cfg = settings(0.5);
    let clock = ManualClock::new();
    let mut canvas = RecordingCanvas::new(720, 1280);
    let mut tracker = Tracker::new(&cfg, Box::new(SimulatedSource::seeded(&cfg, 3)));

    let summary = drive(
        &mut tracker,
        &clock,
        &mut canvas,
        &StopHandle::new(),
        Some(40),
        |report, canvas| {
            let frame = canvas.last_frame().expect("frame drawn");
            assert!(matches!(frame[0], DrawOp::Clear(_)));
            let has_box = frame.iter().any(|op| matches!(op, DrawOp::Rect { .. }));
            assert_eq!(has_box, report.detection.is_some());
            assert_eq!(canvas.last_texts().last().copied(), Some("Tracking Demo"));
            Ok(())
        },
    )
    .expect("drive");

    assert_eq!(summary.ticks, 40);
    assert!(summary.detection_events > 0);
    assert!(summary.detection_events < 40);
}

#[test]
fn stop_handle_ends_the_loop_and_no_tick_follows() {
    let cfg = settings(0.0);
    let clock = ManualClock::new();
    let mut canvas = RecordingCanvas::new(720, 1280);
    let mut tracker = Tracker::new(&cfg, Box::new(SimulatedSource::seeded(&cfg, 1)));
    let stop = StopHandle::new();

    let summary = drive(&mut tracker, &clock, &mut canvas, &stop, None, |report, _| {
        if report.tick == 5 {
            stop.stop();
        }
        Ok(())
    })
    .expect("drive");
    assert_eq!(summary.ticks, 5);

    clock.advance(Duration::from_secs(10));
    assert!(tracker.poll(clock.now(), &mut canvas).is_none());
    assert_eq!(canvas.frame_count(), 5);
    assert!(!tracker.stop());
    let restarted = drive(
        &mut tracker,
        &clock,
        &mut canvas,
        &StopHandle::new(),
        Some(1),
        |_, _| Ok(()),
    );
    assert!(restarted.is_err());
}

#[test]
fn observer_errors_do_not_stop_the_loop() {
    let cfg = settings(0.0);
    let clock = ManualClock::new();
    let mut canvas = RecordingCanvas::new(720, 1280);
    let mut tracker = Tracker::new(&cfg, Box::new(SimulatedSource::seeded(&cfg, 1)));

    let summary = drive(
        &mut tracker,
        &clock,
        &mut canvas,
        &StopHandle::new(),
        Some(10),
        |_, _| Err(anyhow::anyhow!("snapshot disk full")),
    )
    .expect("drive");
    assert_eq!(summary.ticks, 10);
}

#[test]
fn target_stays_inside_viewport_over_long_runs() {
    let cfg = settings(0.0);
    let clock = ManualClock::new();
    let mut canvas = RecordingCanvas::new(720, 1280);
    let mut tracker = Tracker::new(&cfg, Box::new(SimulatedSource::seeded(&cfg, 1)));
    let (w, h) = (cfg.viewport.width, cfg.viewport.height);

    drive(
        &mut tracker,
        &clock,
        &mut canvas,
        &StopHandle::new(),
        Some(2000),
        |report, _| {
            let t = report.target;
            assert!(t.x - t.radius >= 0.0 && t.x + t.radius <= w, "x={}", t.x);
            assert!(t.y - t.radius >= 0.0 && t.y + t.radius <= h, "y={}", t.y);
            Ok(())
        },
    )
    .expect("drive");
}

#[test]
fn detector_source_feeds_the_overlay_and_is_released_on_stop() {
    let backend = StubBackend::new(RawDetections {
        boxes: vec![[0.1, 0.2, 0.3, 0.4]],
        classes: vec![2.0],
        scores: vec![0.9],
        count: 1.0,
    });
    let probe = backend.probe();
    let detector = Detector::with_backend(
        Box::new(backend),
        &DetectorSettings::default(),
        LabelTable::default(),
    );
    let slot = FrameSlot::new();
    slot.publish(DynamicImage::ImageRgb8(RgbImage::from_pixel(
        640,
        480,
        Rgb([50, 50, 50]),
    )))
    .expect("publish");

    let cfg = settings(0.0);
    let clock = ManualClock::new();
    let mut canvas = RecordingCanvas::new(720, 1280);
    let mut tracker = Tracker::new(&cfg, Box::new(DetectorSource::new(detector, slot)));

    let summary = drive(
        &mut tracker,
        &clock,
        &mut canvas,
        &StopHandle::new(),
        Some(3),
        |_, _| Ok(()),
    )
    .expect("drive");

    assert_eq!(summary.detection_events, 3);
    assert!(canvas.last_texts().contains(&"Car: 90%"));
    assert_eq!(probe.inferences(), 1);
    assert_eq!(probe.drops(), 1);
}
