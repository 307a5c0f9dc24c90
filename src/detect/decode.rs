use anyhow::{anyhow, Result};

use crate::detect::result::{BoundingBox, Detection, DetectionBatch};

/// The four parallel outputs of an SSD-style detection head.
///
/// Row `i` of `boxes`, `classes` and `scores` describe the same detection.
/// Box rows are normalized `[top, left, bottom, right]` relative to the model input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawDetections {
    pub boxes: Vec<[f32; 4]>,
    pub classes: Vec<f32>,
    pub scores: Vec<f32>,
    /// Number of rows the model claims are populated.
    pub count: f32,
}

/// Thresholds applied while decoding.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecodeParams {
    pub capacity: usize,
    pub score_threshold: f32,
}

/// Map raw model outputs back into the original image's pixel space.
///
/// Top/bottom scale by the original height, left/right by the original width.
/// Rows at or below the threshold, or with a non-finite coordinate, keep their
/// index as empty slots. A negative or non-finite count is malformed output.
pub fn decode(
    raw: &RawDetections,
    original_width: u32,
    original_height: u32,
    params: DecodeParams,
) -> Result<DetectionBatch> {
    if !raw.count.is_finite() || raw.count < 0.0 {
        return Err(anyhow!("model reported an invalid detection count {}", raw.count));
    }
    let reported = (raw.count as usize)
        .min(params.capacity)
        .min(raw.boxes.len())
        .min(raw.classes.len())
        .min(raw.scores.len());

    let width = original_width as f32;
    let height = original_height as f32;

    let slots = (0..reported)
        .map(|i| {
            let score = raw.scores[i];
            if !(score > params.score_threshold) {
                return None;
            }
            let coords = raw.boxes[i];
            if coords.iter().any(|v| !v.is_finite()) {
                return None;
            }
            let [top, left, bottom, right] = coords.map(|v| v.clamp(0.0, 1.0));
            let bbox = BoundingBox::new(top * height, left * width, bottom * height, right * width);
            Some(Detection::new(bbox, raw.classes[i] as i32, score))
        })
        .collect();

    Ok(DetectionBatch::from_slots(slots, params.capacity))
}
