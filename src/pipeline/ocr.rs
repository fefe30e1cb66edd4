//! Synchronous per-image orchestrator.
//!
//! Drives one image through the full stage sequence: optional orientation
//! correction, optional rectification, detection, per-region perspective
//! cropping, optional text-line orientation, recognition, filtering and the
//! reading-order sort. Batch callers use this directly; the asynchronous
//! scheduler reuses the same stage helpers across its worker pools.

use crate::core::OcrResult;
use crate::pipeline::config::TaskConfig;
use crate::pipeline::result::{sort_reading_order, TextEntry};
use crate::predictor::{
    DetectionParams, DocOrientationClassifier, DocRectifier, TextDetector, TextLineClassifier,
    TextRecognizer,
};
use crate::utils::get_rotate_crop_image;
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The loaded model stages shared by the sync orchestrator and the
/// asynchronous scheduler. Model handles are immutable after load and safe
/// to share across stage workers.
pub struct PipelineComponents {
    /// Text detection stage.
    pub detector: TextDetector,
    /// Text recognition stage.
    pub recognizer: TextRecognizer,
    /// Whole-page orientation stage, when loaded.
    pub doc_orientation: Option<DocOrientationClassifier>,
    /// Document rectification stage, when loaded.
    pub rectifier: Option<DocRectifier>,
    /// Text-line orientation stage, when loaded.
    pub textline_orientation: Option<TextLineClassifier>,
}

/// Timing and count statistics for one processed image.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    /// Detection wall time in milliseconds.
    pub detection_ms: f64,
    /// Classification (line orientation) wall time in milliseconds.
    pub classification_ms: f64,
    /// Recognition wall time in milliseconds.
    pub recognition_ms: f64,
    /// Total wall time in milliseconds.
    pub total_ms: f64,
    /// Number of detected regions.
    pub detected_boxes: usize,
    /// Number of crops flipped by line orientation.
    pub rotated_boxes: usize,
    /// Number of regions that produced a kept entry.
    pub recognized_boxes: usize,
}

/// Output of one synchronous pipeline run.
#[derive(Debug)]
pub struct OcrOutput {
    /// Entries in reading order.
    pub entries: Vec<TextEntry>,
    /// Image after orientation and rectification; quads live in its frame.
    pub processed_image: RgbImage,
    /// Run statistics.
    pub stats: PipelineStats,
}

/// Runs the page-level preprocessing stages the task config asks for.
///
/// Returns the processed image. Stages whose component is not loaded are
/// skipped with a log line, matching the task's view that preprocessing is
/// best-effort configuration rather than a hard dependency.
pub(crate) fn preprocess_page(
    components: &PipelineComponents,
    image: RgbImage,
    config: &TaskConfig,
) -> OcrResult<RgbImage> {
    let mut current = image;

    if config.use_doc_orientation {
        match &components.doc_orientation {
            Some(classifier) => {
                let (corrected, applied) = classifier.apply(current)?;
                current = corrected;
                if let Some(angle) = applied {
                    debug!(angle, "page orientation corrected");
                }
            }
            None => warn!("doc orientation requested but no classifier is loaded"),
        }
    }

    if config.use_unwarping {
        match &components.rectifier {
            Some(rectifier) => {
                current = rectifier.rectify(&current)?;
            }
            None => warn!("unwarping requested but no rectifier is loaded"),
        }
    }

    Ok(current)
}

/// Recognizes one crop: optional 0°/180° flip, then CTC recognition.
///
/// Returns the decoded text, its confidence and whether the crop was
/// flipped.
pub(crate) fn recognize_crop(
    components: &PipelineComponents,
    crop: RgbImage,
    config: &TaskConfig,
) -> OcrResult<(String, f32, bool)> {
    let (crop, flipped) = if config.use_textline_orientation {
        match &components.textline_orientation {
            Some(classifier) => classifier.apply(crop)?,
            None => (crop, false),
        }
    } else {
        (crop, false)
    };

    let (text, confidence) = components.recognizer.recognize(&crop)?;
    Ok((text, confidence, flipped))
}

/// Returns true when a recognition outcome should be kept as an entry.
pub(crate) fn keep_entry(text: &str, confidence: f32, config: &TaskConfig) -> bool {
    !text.is_empty() && confidence >= config.rec_score_thresh
}

/// Synchronous OCR driver for non-server callers.
pub struct OcrPipeline {
    components: Arc<PipelineComponents>,
}

impl OcrPipeline {
    /// Creates a pipeline over loaded components.
    pub fn new(components: Arc<PipelineComponents>) -> Self {
        Self { components }
    }

    /// The shared components, for handing to an asynchronous scheduler.
    pub fn components(&self) -> Arc<PipelineComponents> {
        self.components.clone()
    }

    /// Processes one image to completion.
    pub fn process(&self, image: &RgbImage, config: &TaskConfig) -> OcrResult<OcrOutput> {
        let total_start = Instant::now();
        let mut stats = PipelineStats::default();

        let processed = preprocess_page(&self.components, image.clone(), config)?;

        let det_start = Instant::now();
        let boxes = self.components.detector.detect(
            &processed,
            &DetectionParams {
                thresh: config.det_thresh,
                box_thresh: config.det_box_thresh,
                unclip_ratio: config.det_unclip_ratio,
            },
        )?;
        stats.detection_ms = det_start.elapsed().as_secs_f64() * 1000.0;
        stats.detected_boxes = boxes.len();

        let mut entries = Vec::with_capacity(boxes.len());
        let rec_start = Instant::now();
        for region in &boxes {
            let crop = match get_rotate_crop_image(&processed, &region.quad) {
                Ok(crop) => crop,
                Err(e) => {
                    debug!(error = %e, "skipping degenerate crop");
                    continue;
                }
            };

            let (text, confidence, flipped) = recognize_crop(&self.components, crop, config)?;
            if flipped {
                stats.rotated_boxes += 1;
            }
            if keep_entry(&text, confidence, config) {
                entries.push(TextEntry {
                    quad: region.quad,
                    text,
                    confidence,
                    index: 0,
                });
            }
        }
        stats.recognition_ms = rec_start.elapsed().as_secs_f64() * 1000.0;

        sort_reading_order(&mut entries);
        stats.recognized_boxes = entries.len();
        stats.total_ms = total_start.elapsed().as_secs_f64() * 1000.0;

        info!(
            detected = stats.detected_boxes,
            recognized = stats.recognized_boxes,
            total_ms = stats.total_ms,
            "pipeline run complete"
        );

        Ok(OcrOutput {
            entries,
            processed_image: processed,
            stats,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::testing::test_components;

    #[test]
    fn blank_image_completes_with_no_entries() {
        let pipeline = OcrPipeline::new(test_components(vec![], "ab", 0.9));
        let image = RgbImage::new(640, 480);
        let out = pipeline.process(&image, &TaskConfig::default()).unwrap();
        assert!(out.entries.is_empty());
        assert_eq!(out.stats.detected_boxes, 0);
    }

    #[test]
    fn single_region_produces_one_indexed_entry() {
        let pipeline = OcrPipeline::new(test_components(
            vec![(0.3, 0.5, 0.2, 0.8)],
            "hello",
            0.95,
        ));
        let image = RgbImage::new(400, 300);
        let out = pipeline.process(&image, &TaskConfig::default()).unwrap();
        assert_eq!(out.entries.len(), 1);
        assert_eq!(out.entries[0].text, "hello");
        assert_eq!(out.entries[0].index, 0);
        assert!(out.entries[0].confidence > 0.9 && out.entries[0].confidence < 1.0);
    }

    #[test]
    fn score_threshold_filters_entries_out() {
        let pipeline = OcrPipeline::new(test_components(
            vec![(0.3, 0.5, 0.2, 0.8)],
            "hello",
            0.95,
        ));
        let image = RgbImage::new(400, 300);
        let config = TaskConfig {
            rec_score_thresh: 0.99,
            ..TaskConfig::default()
        };
        let out = pipeline.process(&image, &config).unwrap();
        assert!(out.entries.is_empty());
        assert_eq!(out.stats.detected_boxes, 1);
    }
}
