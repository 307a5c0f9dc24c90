use serde::Serialize;

/// Bounding box in the source image's pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BoundingBox {
    pub top: f32,
    pub left: f32,
    pub bottom: f32,
    pub right: f32,
}

impl BoundingBox {
    pub fn new(top: f32, left: f32, bottom: f32, right: f32) -> Self {
        Self {
            top,
            left,
            bottom,
            right,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }
}

/// One scored, localized model output.
///
/// Fields are private: a detection is built once per inference call and never
/// mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    bbox: BoundingBox,
    class_id: i32,
    score: f32,
}

impl Detection {
    pub fn new(bbox: BoundingBox, class_id: i32, score: f32) -> Self {
        Self {
            bbox,
            class_id,
            score,
        }
    }

    pub fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    pub fn class_id(&self) -> i32 {
        self.class_id
    }

    pub fn score(&self) -> f32 {
        self.score
    }
}

/// Where a batch came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchSource {
    /// Decoded from real model outputs.
    Model,
    /// Deterministic stand-in produced in degraded mode or after an inference failure.
    Placeholder,
}

/// Fixed-capacity output of a single `detect` call.
///
/// Slot `i` corresponds to model output row `i`. Rows at or below the score
/// threshold stay in place as `None`; the batch is never compacted.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionBatch {
    slots: Vec<Option<Detection>>,
    capacity: usize,
    source: BatchSource,
}

impl DetectionBatch {
    /// Build a batch from decoded slots. Slots beyond `capacity` are dropped.
    pub fn from_slots(mut slots: Vec<Option<Detection>>, capacity: usize) -> Self {
        slots.truncate(capacity);
        Self {
            slots,
            capacity,
            source: BatchSource::Model,
        }
    }

    /// The deterministic placeholder: one detection at (100, 100, 300, 300), class 1, score 0.8.
    pub fn placeholder(capacity: usize) -> Self {
        let detection = Detection::new(BoundingBox::new(100.0, 100.0, 300.0, 300.0), 1, 0.8);
        Self {
            slots: vec![Some(detection)],
            capacity: capacity.max(1),
            source: BatchSource::Placeholder,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of rows the model reported (after clamping to capacity).
    pub fn reported_count(&self) -> usize {
        self.slots.len()
    }

    /// Number of rows that passed the score threshold.
    pub fn valid_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn source(&self) -> BatchSource {
        self.source
    }

    pub fn is_placeholder(&self) -> bool {
        self.source == BatchSource::Placeholder
    }

    pub fn slots(&self) -> &[Option<Detection>] {
        &self.slots
    }

    /// Valid detections together with their original slot index.
    pub fn valid(&self) -> impl Iterator<Item = (usize, &Detection)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(idx, slot)| slot.as_ref().map(|det| (idx, det)))
    }

    /// Highest-scoring valid detection. Ties keep the lowest slot index.
    pub fn best(&self) -> Option<&Detection> {
        self.valid().map(|(_, det)| det).fold(None, |best, det| match best {
            Some(current) if current.score() >= det.score() => Some(current),
            _ => Some(det),
        })
    }

    /// Flat `[top, left, bottom, right, class_id, score]` rows, zero-filled for empty slots.
    pub fn to_rows(&self) -> Vec<[f32; 6]> {
        self.slots
            .iter()
            .map(|slot| match slot {
                Some(det) => {
                    let b = det.bbox();
                    [
                        b.top,
                        b.left,
                        b.bottom,
                        b.right,
                        det.class_id() as f32,
                        det.score(),
                    ]
                }
                None => [0.0; 6],
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn det(score: f32) -> Detection {
        Detection::new(BoundingBox::new(1.0, 2.0, 3.0, 4.0), 2, score)
    }

    #[test]
    fn counts_respect_slot_layout() {
        let batch = DetectionBatch::from_slots(vec![Some(det(0.9)), None, Some(det(0.6))], 10);
        assert_eq!(batch.capacity(), 10);
        assert_eq!(batch.reported_count(), 3);
        assert_eq!(batch.valid_count(), 2);
        let indices: Vec<usize> = batch.valid().map(|(idx, _)| idx).collect();
        assert_eq!(indices, vec![0, 2]);
    }

    #[test]
    fn from_slots_truncates_to_capacity() {
        let batch = DetectionBatch::from_slots(vec![Some(det(0.9)); 4], 2);
        assert_eq!(batch.reported_count(), 2);
        assert!(batch.valid_count() <= batch.reported_count());
    }

    #[test]
    fn best_picks_highest_score() {
        let batch = DetectionBatch::from_slots(
            vec![Some(det(0.6)), None, Some(det(0.95)), Some(det(0.7))],
            10,
        );
        assert_eq!(batch.best().map(Detection::score), Some(0.95));

        let empty = DetectionBatch::from_slots(vec![None, None], 10);
        assert!(empty.best().is_none());
    }

    #[test]
    fn rows_are_zero_filled_for_empty_slots() {
        let batch = DetectionBatch::from_slots(vec![None, Some(det(0.8))], 10);
        let rows = batch.to_rows();
        assert_eq!(rows[0], [0.0; 6]);
        assert_eq!(rows[1], [1.0, 2.0, 3.0, 4.0, 2.0, 0.8]);
    }

    #[test]
    fn placeholder_is_fixed() {
        let batch = DetectionBatch::placeholder(10);
        assert!(batch.is_placeholder());
        assert_eq!(batch.reported_count(), 1);
        let best = batch.best().expect("placeholder detection");
        assert_eq!(best.bbox(), BoundingBox::new(100.0, 100.0, 300.0, 300.0));
        assert_eq!(best.class_id(), 1);
        assert_eq!(best.score(), 0.8);
    }
}
