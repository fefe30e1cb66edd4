//! Result types produced by the pipeline.

use crate::processors::geometry::{quad_bounding_height, quad_center, Quad};
use image::RgbImage;
use serde::{Deserialize, Serialize};

/// One recognized text region.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextEntry {
    /// Region boundary in the processed image's coordinate frame.
    pub quad: Quad,
    /// Recognized text.
    pub text: String,
    /// Recognition confidence in [0, 1].
    pub confidence: f32,
    /// Position after the reading-order sort.
    pub index: u32,
}

/// Failure description attached to a failed task.
#[derive(Debug, Clone)]
pub struct TaskFailure {
    /// Name of the stage that failed.
    pub stage: &'static str,
    /// Short failure message.
    pub message: String,
}

/// The published outcome of one task. Exactly one of these is emitted per
/// submitted task id.
#[derive(Debug)]
pub struct TaskResult {
    /// Task identity assigned at submission.
    pub id: u64,
    /// Recognized entries in reading order. Empty for failed tasks and for
    /// pages without text.
    pub entries: Vec<TextEntry>,
    /// The image after orientation and rectification; entry quads live in
    /// this image's coordinate space.
    pub processed_image: RgbImage,
    /// Present when the task failed in some stage.
    pub failure: Option<TaskFailure>,
}

impl TaskResult {
    /// True when the task ran to completion without a stage error.
    pub fn is_ok(&self) -> bool {
        self.failure.is_none()
    }
}

/// Sorts entries top-to-bottom then left-to-right and rewrites their
/// `index` fields sequentially.
///
/// Entries whose vertical centers differ by less than half the smaller
/// bounding height are treated as one line and ordered by horizontal center.
pub fn sort_reading_order(entries: &mut Vec<TextEntry>) {
    entries.sort_by(|a, b| {
        let ca = quad_center(&a.quad);
        let cb = quad_center(&b.quad);
        let tolerance = 0.5 * quad_bounding_height(&a.quad).min(quad_bounding_height(&b.quad));
        if (ca.y - cb.y).abs() < tolerance {
            ca.x.partial_cmp(&cb.x).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            ca.y.partial_cmp(&cb.y).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.index = i as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::geometry::Point;

    fn entry(x: f32, y: f32, h: f32, text: &str) -> TextEntry {
        TextEntry {
            quad: [
                Point::new(x, y),
                Point::new(x + 60.0, y),
                Point::new(x + 60.0, y + h),
                Point::new(x, y + h),
            ],
            text: text.into(),
            confidence: 0.9,
            index: 0,
        }
    }

    #[test]
    fn same_line_sorts_left_to_right() {
        let mut entries = vec![
            entry(300.0, 101.0, 20.0, "right"),
            entry(10.0, 100.0, 20.0, "left"),
            entry(150.0, 99.0, 20.0, "middle"),
        ];
        sort_reading_order(&mut entries);
        let texts: Vec<&str> = entries.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["left", "middle", "right"]);
        assert_eq!(
            entries.iter().map(|e| e.index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[test]
    fn distinct_lines_sort_top_to_bottom() {
        let mut entries = vec![
            entry(10.0, 200.0, 20.0, "second"),
            entry(500.0, 100.0, 20.0, "first"),
        ];
        sort_reading_order(&mut entries);
        assert_eq!(entries[0].text, "first");
        assert_eq!(entries[1].text, "second");
    }

    #[test]
    fn tolerance_scales_with_the_smaller_box() {
        // Vertical centers differ by 8; the smaller box is 14 tall, so the
        // tolerance is 7 and the boxes are on different lines.
        let mut entries = vec![
            entry(400.0, 100.0, 14.0, "a"),
            entry(10.0, 108.0, 40.0, "b"),
        ];
        sort_reading_order(&mut entries);
        assert_eq!(entries[0].text, "a");

        // With taller boxes the same offset is within tolerance: one line,
        // ordered by x.
        let mut entries = vec![
            entry(400.0, 100.0, 40.0, "a"),
            entry(10.0, 108.0, 40.0, "b"),
        ];
        sort_reading_order(&mut entries);
        assert_eq!(entries[0].text, "b");
    }
}
