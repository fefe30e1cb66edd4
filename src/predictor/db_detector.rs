//! DB-style text detector with resolution-specialized model variants.
//!
//! Two variants are trained at long sides 640 and 960; the 640 variant is
//! used for images whose long side is under the size threshold, the 960
//! variant otherwise. Detection maps each image through letterbox resize,
//! normalization, inference and probability-map post-processing, returning
//! quadrilaterals in the input image's coordinate frame sorted in reading
//! order.

use crate::core::{ModelHandle, OcrError, OcrResult};
use crate::processors::db_postprocess::{DbPostProcess, DetectedBox};
use crate::processors::geometry::{quad_bounding_height, quad_center};
use crate::processors::{letterbox_resize, Normalizer};
use image::RgbImage;
use tracing::debug;

/// Image long-side threshold for picking the 960 variant.
pub const DET_SIZE_THRESHOLD: u32 = 800;

/// Detection thresholds, overridable per task.
#[derive(Debug, Clone, Copy)]
pub struct DetectionParams {
    /// Binarization threshold for the probability map.
    pub thresh: f32,
    /// Minimum mean probability for a box to survive.
    pub box_thresh: f32,
    /// Unclip expansion ratio.
    pub unclip_ratio: f32,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            thresh: 0.3,
            box_thresh: 0.6,
            unclip_ratio: 1.5,
        }
    }
}

/// Text detector over the two resolution variants.
#[derive(Debug)]
pub struct TextDetector {
    model_640: ModelHandle,
    model_960: ModelHandle,
    normalizer: Normalizer,
    postprocess: DbPostProcess,
    size_threshold: u32,
}

impl TextDetector {
    /// Creates a detector from two loaded model variants.
    pub fn new(model_640: ModelHandle, model_960: ModelHandle) -> Self {
        Self {
            model_640,
            model_960,
            normalizer: Normalizer::for_detection(),
            postprocess: DbPostProcess::default(),
            size_threshold: DET_SIZE_THRESHOLD,
        }
    }

    /// Target long side for an image: 640 when `max(H, W)` is under the size
    /// threshold, 960 otherwise.
    pub fn target_long_side(&self, height: u32, width: u32) -> u32 {
        if height.max(width) < self.size_threshold {
            640
        } else {
            960
        }
    }

    fn variant_for(&self, long_side: u32) -> &ModelHandle {
        if long_side == 640 {
            &self.model_640
        } else {
            &self.model_960
        }
    }

    /// Detects text regions, returning quads in the input frame sorted in
    /// reading order with their scores. An empty result is legal.
    pub fn detect(&self, image: &RgbImage, params: &DetectionParams) -> OcrResult<Vec<DetectedBox>> {
        let (src_w, src_h) = image.dimensions();
        if src_w == 0 || src_h == 0 {
            return Err(OcrError::invalid_input("detection input image is empty"));
        }

        let long_side = self.target_long_side(src_h, src_w);
        let model = self.variant_for(long_side);

        let resized = letterbox_resize(image, long_side);
        let tensor = self.normalizer.to_tensor(&resized.image)?;

        let prob_map = model.submit(tensor)?.wait_4d()?;
        if prob_map.shape()[0] != 1 || prob_map.shape()[1] != 1 {
            return Err(OcrError::inference(
                model.name(),
                format!("unexpected probability map shape {:?}", prob_map.shape()),
            ));
        }
        let pred = prob_map
            .index_axis(ndarray::Axis(0), 0)
            .index_axis(ndarray::Axis(0), 0)
            .to_owned();

        let mut boxes = self.postprocess.extract(
            &pred,
            (resized.scaled_h, resized.scaled_w),
            (src_h, src_w),
            params.thresh,
            params.box_thresh,
            params.unclip_ratio,
        );
        sort_boxes_reading_order(&mut boxes);

        debug!(
            long_side,
            boxes = boxes.len(),
            "detection completed"
        );
        Ok(boxes)
    }
}

/// Sorts detections top-to-bottom, left-to-right. Two boxes whose vertical
/// centers differ by less than half the smaller box height count as the same
/// line and are ordered by horizontal center.
pub fn sort_boxes_reading_order(boxes: &mut [DetectedBox]) {
    boxes.sort_by(|a, b| {
        let ca = quad_center(&a.quad);
        let cb = quad_center(&b.quad);
        let tolerance = 0.5 * quad_bounding_height(&a.quad).min(quad_bounding_height(&b.quad));
        if (ca.y - cb.y).abs() < tolerance {
            ca.x.partial_cmp(&cb.x).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            ca.y.partial_cmp(&cb.y).unwrap_or(std::cmp::Ordering::Equal)
        }
    });
}
