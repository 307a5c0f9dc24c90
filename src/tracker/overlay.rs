use serde::Serialize;

use crate::detect::BoundingBox;
use crate::tracker::TargetState;

/// Integer pixel rectangle used for drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    /// Square around the target, `margin` times its radius on each side.
    pub fn around_target(target: &TargetState, margin: f32) -> Self {
        let half = target.radius * margin;
        Self::new(
            (target.x - half) as i32,
            (target.y - half) as i32,
            (target.x + half) as i32,
            (target.y + half) as i32,
        )
    }

    pub fn from_bbox(bbox: BoundingBox) -> Self {
        Self::new(
            bbox.left as i32,
            bbox.top as i32,
            bbox.right as i32,
            bbox.bottom as i32,
        )
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverlayDetection {
    pub rect: Rect,
    pub label: String,
    pub confidence: f32,
}

impl OverlayDetection {
    /// Text drawn above the box, e.g. `Object: 85%`.
    pub fn label_text(&self) -> String {
        format_label(&self.label, self.confidence)
    }
}

pub fn format_label(label: &str, confidence: f32) -> String {
    format!("{}: {}%", label, (confidence * 100.0).round() as i32)
}

/// What the overlay shows on the current tick. Recomputed every tick, so a
/// detection never persists past the tick that produced it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverlayState {
    detection: Option<OverlayDetection>,
}

impl OverlayState {
    pub fn new(detection: Option<OverlayDetection>) -> Self {
        Self { detection }
    }

    pub fn is_active(&self) -> bool {
        self.detection.is_some()
    }

    pub fn detection(&self) -> Option<&OverlayDetection> {
        self.detection.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_rounds_to_whole_percent() {
        assert_eq!(format_label("Object", 0.854), "Object: 85%");
        assert_eq!(format_label("Object", 0.855), "Object: 86%");
        assert_eq!(format_label("Car", 1.0), "Car: 100%");
        assert_eq!(format_label("Person", 0.7), "Person: 70%");
    }

    #[test]
    fn rect_around_target_uses_margin() {
        let target = TargetState::default();
        let rect = Rect::around_target(&target, 1.2);
        assert_eq!(rect, Rect::new(180, 180, 420, 420));
        assert_eq!(rect.width(), 240);
    }

    #[test]
    fn rect_from_bbox_truncates() {
        let rect = Rect::from_bbox(BoundingBox::new(48.7, 128.2, 144.9, 256.5));
        assert_eq!(rect, Rect::new(128, 48, 256, 144));
    }
}
