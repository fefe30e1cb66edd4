//! Post-processing for DB-style text detection output.
//!
//! Converts the detector's probability map into text-region quadrilaterals:
//! binarize at the pixel threshold, extract external contours, score each
//! candidate by its mean probability, expand surviving boxes with the unclip
//! operation and map the corners back into the source image's coordinate
//! frame.

use crate::processors::geometry::{polygon_mean_score, Point, Polygon, Quad};
use image::{GrayImage, Luma};
use imageproc::contours::find_contours;
use ndarray::Array2;

/// Default cap on scored candidates per image.
pub const MAX_CANDIDATES: usize = 1500;

/// Minimum side length (in map pixels) for a detection to survive.
const MIN_BOX_SIZE: f32 = 3.0;

/// A detected text region with its probability score, in source coordinates.
#[derive(Debug, Clone)]
pub struct DetectedBox {
    /// Region boundary, clockwise from top-left.
    pub quad: Quad,
    /// Mean probability of the region on the detection map.
    pub score: f32,
}

/// DB probability-map post-processor.
#[derive(Debug, Clone)]
pub struct DbPostProcess {
    /// Cap on candidates kept per image, by descending score.
    pub max_candidates: usize,
    /// Minimum rotated-rect side length in map pixels.
    pub min_size: f32,
}

impl Default for DbPostProcess {
    fn default() -> Self {
        Self {
            max_candidates: MAX_CANDIDATES,
            min_size: MIN_BOX_SIZE,
        }
    }
}

impl DbPostProcess {
    /// Creates a post-processor with an explicit candidate cap.
    pub fn new(max_candidates: usize) -> Self {
        Self {
            max_candidates,
            ..Self::default()
        }
    }

    /// Extracts text-region quadrilaterals from a probability map.
    ///
    /// * `pred` - probability map of the padded model input (H×W, values in [0,1])
    /// * `valid_dims` - (height, width) of the scaled image inside the padded
    ///   map; the area to the right/bottom of it is letterbox padding
    /// * `src_dims` - (height, width) of the source image the corners are
    ///   mapped back into
    /// * `thresh` - binarization threshold for the map
    /// * `box_thresh` - minimum mean probability for a candidate to survive
    /// * `unclip_ratio` - expansion ratio for the unclip operation
    ///
    /// An empty result is a legal outcome, not an error.
    pub fn extract(
        &self,
        pred: &Array2<f32>,
        valid_dims: (u32, u32),
        src_dims: (u32, u32),
        thresh: f32,
        box_thresh: f32,
        unclip_ratio: f32,
    ) -> Vec<DetectedBox> {
        let (map_h, map_w) = (pred.shape()[0] as u32, pred.shape()[1] as u32);
        if map_h == 0 || map_w == 0 {
            return Vec::new();
        }

        let mut bitmap = GrayImage::new(map_w, map_h);
        for (y, row) in pred.outer_iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                if v > thresh {
                    bitmap.put_pixel(x as u32, y as u32, Luma([255u8]));
                }
            }
        }

        let (valid_h, valid_w) = valid_dims;
        let (src_h, src_w) = src_dims;
        let scale_x = src_w as f32 / valid_w.max(1) as f32;
        let scale_y = src_h as f32 / valid_h.max(1) as f32;

        let mut candidates: Vec<(Polygon, f32)> = Vec::new();
        for contour in find_contours::<u32>(&bitmap) {
            let polygon = Polygon::from_contour(&contour);
            let rect = polygon.min_area_rect();
            if rect.min_side() < self.min_size {
                continue;
            }
            let score = polygon_mean_score(pred, &polygon);
            if score < box_thresh {
                continue;
            }
            candidates.push((polygon, score));
        }

        candidates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        candidates.truncate(self.max_candidates);

        let mut boxes = Vec::with_capacity(candidates.len());
        for (polygon, score) in candidates {
            let area = polygon.area();
            let perimeter = polygon.perimeter();
            if perimeter <= f32::EPSILON {
                continue;
            }

            let expanded = polygon.dilate(area * unclip_ratio / perimeter);
            let rect = expanded.min_area_rect();
            if rect.min_side() < self.min_size + 2.0 {
                continue;
            }

            let quad: Quad = rect.corner_points().map(|p| {
                Point::new(
                    (p.x * scale_x).clamp(0.0, src_w as f32),
                    (p.y * scale_y).clamp(0.0, src_h as f32),
                )
            });
            boxes.push(DetectedBox { quad, score });
        }
        boxes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with_block(h: usize, w: usize, y0: usize, y1: usize, x0: usize, x1: usize) -> Array2<f32> {
        let mut pred = Array2::<f32>::zeros((h, w));
        for y in y0..y1 {
            for x in x0..x1 {
                pred[[y, x]] = 0.95;
            }
        }
        pred
    }

    #[test]
    fn blank_map_yields_no_boxes() {
        let pred = Array2::<f32>::zeros((64, 64));
        let post = DbPostProcess::default();
        let boxes = post.extract(&pred, (64, 64), (64, 64), 0.3, 0.6, 1.5);
        assert!(boxes.is_empty());
    }

    #[test]
    fn single_block_yields_one_expanded_box() {
        let pred = map_with_block(64, 96, 20, 36, 16, 72);
        let post = DbPostProcess::default();
        let boxes = post.extract(&pred, (64, 96), (128, 192), 0.3, 0.6, 1.5);
        assert_eq!(boxes.len(), 1);
        let b = &boxes[0];
        assert!(b.score > 0.9);

        // The corners are mapped into the 192x128 source frame and the
        // unclip expansion grows the region beyond the raw block.
        let min_x = b.quad.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
        let max_x = b.quad.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
        assert!(min_x < 32.0);
        assert!(max_x > 144.0);
        assert!(max_x <= 192.0);
    }

    #[test]
    fn low_score_region_is_filtered() {
        let mut pred = map_with_block(64, 64, 10, 30, 10, 50);
        // Degrade the interior so the mean probability drops below 0.6.
        for y in 10..30 {
            for x in 10..50 {
                pred[[y, x]] = 0.35;
            }
        }
        let post = DbPostProcess::default();
        let boxes = post.extract(&pred, (64, 64), (64, 64), 0.3, 0.6, 1.5);
        assert!(boxes.is_empty());
    }

    #[test]
    fn candidates_are_capped_by_descending_score() {
        let mut pred = Array2::<f32>::zeros((64, 256));
        // Three blocks with distinct scores.
        for (i, score) in [0.7f32, 0.95, 0.8].iter().enumerate() {
            let x0 = 10 + i * 80;
            for y in 20..40 {
                for x in x0..x0 + 50 {
                    pred[[y, x]] = *score;
                }
            }
        }
        let post = DbPostProcess::new(2);
        let boxes = post.extract(&pred, (64, 256), (64, 256), 0.3, 0.6, 1.5);
        assert_eq!(boxes.len(), 2);
        assert!(boxes[0].score >= boxes[1].score);
        assert!(boxes[1].score > 0.75);
    }
}
