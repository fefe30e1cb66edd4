//! Text recognition over aspect-ratio-specialized model variants.
//!
//! Six variants accept height-48 inputs at fixed widths `ratio * 48` for
//! ratios {3, 5, 10, 15, 25, 35}. A crop picks the smallest variant whose
//! ratio covers its own aspect ratio; crops wider than the largest variant
//! are letterboxed into it. The variant output is a `T × C` probability
//! sequence decoded greedily with CTC.

use crate::core::{ModelHandle, OcrError, OcrResult};
use crate::processors::{resize_for_recognition, CtcDecoder, Normalizer};
use image::RgbImage;

/// Recognition model input height.
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Aspect-ratio buckets the recognition variants are trained for.
pub const REC_RATIO_BUCKETS: [u32; 6] = [3, 5, 10, 15, 25, 35];

/// Picks the recognition bucket for a crop aspect ratio: the smallest bucket
/// `R >= r`, or the largest bucket when the crop is wider than all of them.
pub fn select_ratio_bucket(ratio: f32) -> u32 {
    for &bucket in &REC_RATIO_BUCKETS {
        if bucket as f32 >= ratio {
            return bucket;
        }
    }
    REC_RATIO_BUCKETS[REC_RATIO_BUCKETS.len() - 1]
}

/// Text recognizer holding one model handle per ratio bucket.
#[derive(Debug)]
pub struct TextRecognizer {
    variants: Vec<(u32, ModelHandle)>,
    decoder: CtcDecoder,
    normalizer: Normalizer,
}

impl TextRecognizer {
    /// Creates a recognizer from `(ratio, model)` pairs and a CTC decoder.
    ///
    /// Every bucket in [`REC_RATIO_BUCKETS`] must be present.
    pub fn new(mut variants: Vec<(u32, ModelHandle)>, decoder: CtcDecoder) -> OcrResult<Self> {
        variants.sort_by_key(|&(ratio, _)| ratio);
        for &bucket in &REC_RATIO_BUCKETS {
            if !variants.iter().any(|&(ratio, _)| ratio == bucket) {
                return Err(OcrError::config(format!(
                    "missing recognition variant for ratio {bucket}"
                )));
            }
        }
        Ok(Self {
            variants,
            decoder,
            normalizer: Normalizer::centered(),
        })
    }

    /// Recognizes a single text-line crop, returning the decoded text and
    /// its confidence.
    pub fn recognize(&self, crop: &RgbImage) -> OcrResult<(String, f32)> {
        let (w, h) = crop.dimensions();
        if w == 0 || h == 0 {
            return Err(OcrError::invalid_input("recognition crop is empty"));
        }

        let ratio = w as f32 / h as f32;
        let bucket = select_ratio_bucket(ratio);
        let model = self
            .variants
            .iter()
            .find(|&&(variant_ratio, _)| variant_ratio == bucket)
            .map(|(_, handle)| handle)
            .ok_or_else(|| {
                OcrError::config(format!("no recognition variant for ratio {bucket}"))
            })?;

        let input = resize_for_recognition(crop, REC_INPUT_HEIGHT, bucket * REC_INPUT_HEIGHT);
        let tensor = self.normalizer.to_tensor(&input)?;

        let probs = model.submit(tensor)?.wait_3d()?;
        if probs.shape()[0] != 1 {
            return Err(OcrError::inference(
                model.name(),
                format!("expected batch of 1, got shape {:?}", probs.shape()),
            ));
        }
        Ok(self.decoder.decode(probs.index_axis(ndarray::Axis(0), 0)))
    }
}
