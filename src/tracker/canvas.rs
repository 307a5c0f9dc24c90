use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use anyhow::{anyhow, Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::{
    draw_hollow_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut, draw_text_mut,
};
use imageproc::rect::Rect as PixelRect;

use crate::tracker::overlay::{OverlayState, Rect};
use crate::tracker::TargetState;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stroke {
    pub color: Rgba<u8>,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: Rgba<u8>,
    pub size: f32,
    pub shadow: Option<Shadow>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Rgba<u8>,
    pub offset: (f32, f32),
}

/// Drawing surface for one overlay frame.
///
/// Text positions are baselines. A frame starts with `clear`.
pub trait Canvas {
    fn size(&self) -> (u32, u32);
    fn clear(&mut self, color: Rgba<u8>) -> Result<()>;
    fn stroke_circle(&mut self, center: (f32, f32), radius: f32, stroke: Stroke) -> Result<()>;
    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: Stroke) -> Result<()>;
    fn stroke_rect(&mut self, rect: Rect, stroke: Stroke) -> Result<()>;
    fn fill_text(&mut self, text: &str, baseline: (f32, f32), style: &TextStyle) -> Result<()>;
}

/// Colors, strokes and caption for the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayStyle {
    pub backdrop: Rgba<u8>,
    pub target: Stroke,
    pub bbox: Stroke,
    pub text: TextStyle,
    pub caption: String,
    pub caption_at: (f32, f32),
    pub label_gap: f32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            backdrop: Rgba([0, 0, 0, 220]),
            target: Stroke {
                color: Rgba([255, 0, 0, 255]),
                width: 5.0,
            },
            bbox: Stroke {
                color: Rgba([0, 255, 0, 255]),
                width: 3.0,
            },
            text: TextStyle {
                color: Rgba([255, 255, 255, 255]),
                size: 40.0,
                shadow: Some(Shadow {
                    color: Rgba([0, 0, 0, 255]),
                    offset: (1.0, 1.0),
                }),
            },
            caption: "Tracking Demo".to_string(),
            caption_at: (20.0, 60.0),
            label_gap: 10.0,
        }
    }
}

/// Draw one full frame: backdrop, target with crosshair, optional detection, caption.
pub fn compose_frame(
    canvas: &mut dyn Canvas,
    target: &TargetState,
    overlay: &OverlayState,
    style: &OverlayStyle,
) -> Result<()> {
    let (x, y, r) = (target.x, target.y, target.radius);
    canvas.clear(style.backdrop)?;
    canvas.stroke_circle((x, y), r, style.target)?;
    canvas.stroke_line((x - r, y), (x + r, y), style.target)?;
    canvas.stroke_line((x, y - r), (x, y + r), style.target)?;

    if let Some(det) = overlay.detection() {
        canvas.stroke_rect(det.rect, style.bbox)?;
        let label_at = (det.rect.left as f32, det.rect.top as f32 - style.label_gap);
        canvas.fill_text(&det.label_text(), label_at, &style.text)?;
    }

    canvas.fill_text(&style.caption, style.caption_at, &style.text)
}

/// Pixel offsets that widen a one-pixel primitive to `width`.
fn stroke_offsets(width: f32) -> std::ops::Range<i32> {
    let w = width.round().max(1.0) as i32;
    let start = -(w - 1) / 2;
    start..start + w
}

/// RGBA raster canvas backed by imageproc.
///
/// Text needs a font; without one `fill_text` fails and the frame counts as
/// a draw failure.
pub struct RasterCanvas {
    image: RgbaImage,
    font: Option<FontVec>,
}

impl RasterCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            image: RgbaImage::new(width, height),
            font: None,
        }
    }

    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn with_font_file(self, path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read font {}", path.display()))?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))?;
        Ok(self.with_font(font))
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    pub fn save_png(&self, path: &Path) -> Result<()> {
        self.image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write snapshot {}", path.display()))
    }
}

impl Canvas for RasterCanvas {
    fn size(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    fn clear(&mut self, color: Rgba<u8>) -> Result<()> {
        for pixel in self.image.pixels_mut() {
            *pixel = color;
        }
        Ok(())
    }

    fn stroke_circle(&mut self, center: (f32, f32), radius: f32, stroke: Stroke) -> Result<()> {
        let c = (center.0.round() as i32, center.1.round() as i32);
        let r = radius.round() as i32;
        for offset in stroke_offsets(stroke.width) {
            if r + offset > 0 {
                draw_hollow_circle_mut(&mut self.image, c, r + offset, stroke.color);
            }
        }
        Ok(())
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: Stroke) -> Result<()> {
        let (vx, vy) = (to.0 - from.0, to.1 - from.1);
        let len = (vx * vx + vy * vy).sqrt();
        if len == 0.0 {
            draw_line_segment_mut(&mut self.image, from, to, stroke.color);
            return Ok(());
        }
        let (nx, ny) = (-vy / len, vx / len);
        for offset in stroke_offsets(stroke.width) {
            let o = offset as f32;
            draw_line_segment_mut(
                &mut self.image,
                (from.0 + nx * o, from.1 + ny * o),
                (to.0 + nx * o, to.1 + ny * o),
                stroke.color,
            );
        }
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, stroke: Stroke) -> Result<()> {
        for offset in stroke_offsets(stroke.width) {
            let w = rect.width() - 2 * offset;
            let h = rect.height() - 2 * offset;
            if w <= 0 || h <= 0 {
                continue;
            }
            let inset = PixelRect::at(rect.left + offset, rect.top + offset)
                .of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut self.image, inset, stroke.color);
        }
        Ok(())
    }

    fn fill_text(&mut self, text: &str, baseline: (f32, f32), style: &TextStyle) -> Result<()> {
        let Some(font) = &self.font else {
            return Err(anyhow!("no font loaded to draw {:?}", text));
        };
        let scale = PxScale::from(style.size);
        let ascent = font.as_scaled(scale).ascent();
        let x = baseline.0;
        let y = baseline.1 - ascent;
        if let Some(shadow) = style.shadow {
            draw_text_mut(
                &mut self.image,
                shadow.color,
                (x + shadow.offset.0).round() as i32,
                (y + shadow.offset.1).round() as i32,
                scale,
                font,
                text,
            );
        }
        draw_text_mut(
            &mut self.image,
            style.color,
            x.round() as i32,
            y.round() as i32,
            scale,
            font,
            text,
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Clear(Rgba<u8>),
    Circle {
        center: (f32, f32),
        radius: f32,
        stroke: Stroke,
    },
    Line {
        from: (f32, f32),
        to: (f32, f32),
        stroke: Stroke,
    },
    Rect {
        rect: Rect,
        stroke: Stroke,
    },
    Text {
        text: String,
        baseline: (f32, f32),
    },
}

/// Canvas that records draw calls, one op list per frame.
#[derive(Debug, Clone, Default)]
pub struct RecordingCanvas {
    width: u32,
    height: u32,
    frames: Vec<Vec<DrawOp>>,
}

impl RecordingCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            frames: Vec::new(),
        }
    }

    pub fn frames(&self) -> &[Vec<DrawOp>] {
        &self.frames
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn last_frame(&self) -> Option<&[DrawOp]> {
        self.frames.last().map(Vec::as_slice)
    }

    /// Text drawn in the most recent frame.
    pub fn last_texts(&self) -> Vec<&str> {
        self.last_frame()
            .unwrap_or_default()
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn push(&mut self, op: DrawOp) {
        match self.frames.last_mut() {
            Some(frame) => frame.push(op),
            None => self.frames.push(vec![op]),
        }
    }
}

impl Canvas for RecordingCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgba<u8>) -> Result<()> {
        self.frames.push(vec![DrawOp::Clear(color)]);
        Ok(())
    }

    fn stroke_circle(&mut self, center: (f32, f32), radius: f32, stroke: Stroke) -> Result<()> {
        self.push(DrawOp::Circle {
            center,
            radius,
            stroke,
        });
        Ok(())
    }

    fn stroke_line(&mut self, from: (f32, f32), to: (f32, f32), stroke: Stroke) -> Result<()> {
        self.push(DrawOp::Line { from, to, stroke });
        Ok(())
    }

    fn stroke_rect(&mut self, rect: Rect, stroke: Stroke) -> Result<()> {
        self.push(DrawOp::Rect { rect, stroke });
        Ok(())
    }

    fn fill_text(&mut self, text: &str, baseline: (f32, f32), _style: &TextStyle) -> Result<()> {
        self.push(DrawOp::Text {
            text: text.to_string(),
            baseline,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracker::overlay::OverlayDetection;

    #[test]
    fn frame_without_detection_has_target_and_caption() {
        let mut canvas = RecordingCanvas::new(720, 1280);
        let style = OverlayStyle::default();
        compose_frame(
            &mut canvas,
            &TargetState::default(),
            &OverlayState::default(),
            &style,
        )
        .expect("compose");

        let frame = canvas.last_frame().expect("frame");
        assert_eq!(frame.len(), 5);
        assert_eq!(frame[0], DrawOp::Clear(Rgba([0, 0, 0, 220])));
        assert!(matches!(frame[1], DrawOp::Circle { radius, .. } if radius == 100.0));
        assert_eq!(
            frame[2],
            DrawOp::Line {
                from: (200.0, 300.0),
                to: (400.0, 300.0),
                stroke: style.target
            }
        );
        assert_eq!(canvas.last_texts(), vec!["Tracking Demo"]);
    }

    #[test]
    fn detection_adds_box_and_label_above_it() {
        let mut canvas = RecordingCanvas::new(720, 1280);
        let overlay = OverlayState::new(Some(OverlayDetection {
            rect: Rect::new(180, 180, 420, 420),
            label: "Object".to_string(),
            confidence: 0.85,
        }));
        compose_frame(
            &mut canvas,
            &TargetState::default(),
            &overlay,
            &OverlayStyle::default(),
        )
        .expect("compose");

        let frame = canvas.last_frame().expect("frame");
        let expected = Rect::new(180, 180, 420, 420);
        assert!(frame
            .iter()
            .any(|op| matches!(op, DrawOp::Rect { rect, .. } if *rect == expected)));
        assert!(frame.contains(&DrawOp::Text {
            text: "Object: 85%".to_string(),
            baseline: (180.0, 170.0),
        }));
        assert_eq!(canvas.last_texts(), vec!["Object: 85%", "Tracking Demo"]);
    }

    #[test]
    fn raster_canvas_draws_strokes() {
        let mut canvas = RasterCanvas::new(64, 64);
        let red = Rgba([255, 0, 0, 255]);
        canvas.clear(Rgba([0, 0, 0, 255])).expect("clear");
        canvas
            .stroke_line((0.0, 32.0), (63.0, 32.0), Stroke { color: red, width: 3.0 })
            .expect("line");
        assert_eq!(*canvas.image().get_pixel(10, 31), red);
        assert_eq!(*canvas.image().get_pixel(10, 32), red);
        assert_eq!(*canvas.image().get_pixel(10, 33), red);
        assert_eq!(*canvas.image().get_pixel(10, 10), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn degenerate_rect_is_skipped() {
        let mut canvas = RasterCanvas::new(16, 16);
        let stroke = Stroke {
            color: Rgba([0, 255, 0, 255]),
            width: 3.0,
        };
        canvas.stroke_rect(Rect::new(5, 5, 5, 9), stroke).expect("empty rect");
        canvas.stroke_rect(Rect::new(2, 2, 12, 12), stroke).expect("rect");
        assert_eq!(*canvas.image().get_pixel(2, 2), stroke.color);
    }

    #[test]
    fn text_without_font_is_an_error() {
        let mut canvas = RasterCanvas::new(16, 16);
        assert!(!canvas.has_font());
        assert!(canvas
            .fill_text("hi", (1.0, 10.0), &OverlayStyle::default().text)
            .is_err());
        assert!(canvas.image().pixels().all(|p| *p == Rgba([0, 0, 0, 0])));
    }

    #[test]
    fn frame_on_fontless_raster_fails_after_drawing_the_target() {
        let mut canvas = RasterCanvas::new(720, 1280);
        let style = OverlayStyle::default();
        let result = compose_frame(
            &mut canvas,
            &TargetState::default(),
            &OverlayState::default(),
            &style,
        );
        assert!(result.is_err());
        assert_eq!(*canvas.image().get_pixel(300, 300), style.target.color);
    }
}
