//! Whole-page orientation classification.
//!
//! A four-class classifier over {0°, 90°, 180°, 270°}. The model's output is
//! already softmax-normalized; applying softmax again would flatten the
//! distribution and break the confidence threshold.

use crate::core::{ModelHandle, OcrResult};
use crate::processors::Normalizer;
use image::{imageops, RgbImage};

const INPUT_SIZE: u32 = 224;

/// Default minimum class probability before a rotation is applied.
pub const DEFAULT_ORIENTATION_THRESHOLD: f32 = 0.9;

/// Page orientation classifier.
#[derive(Debug)]
pub struct DocOrientationClassifier {
    model: ModelHandle,
    normalizer: Normalizer,
    threshold: f32,
}

impl DocOrientationClassifier {
    /// Creates a classifier with the default confidence threshold.
    pub fn new(model: ModelHandle) -> Self {
        Self {
            model,
            normalizer: Normalizer::centered(),
            threshold: DEFAULT_ORIENTATION_THRESHOLD,
        }
    }

    /// Overrides the confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Classifies the page rotation in degrees with its probability.
    pub fn classify(&self, image: &RgbImage) -> OcrResult<(u16, f32)> {
        let resized = imageops::resize(
            image,
            INPUT_SIZE,
            INPUT_SIZE,
            imageops::FilterType::Triangle,
        );
        let tensor = self.normalizer.to_tensor(&resized)?;
        let probs = self.model.submit(tensor)?.wait_2d()?;

        let mut best = 0usize;
        let mut best_prob = f32::MIN;
        for (i, &p) in probs.row(0).iter().enumerate().take(4) {
            if p > best_prob {
                best_prob = p;
                best = i;
            }
        }
        Ok((best as u16 * 90, best_prob))
    }

    /// Classifies and, when confident, rotates the page upright.
    ///
    /// Returns the corrected image and the detected rotation when one was
    /// applied.
    pub fn apply(&self, image: RgbImage) -> OcrResult<(RgbImage, Option<u16>)> {
        let (angle, prob) = self.classify(&image)?;
        if angle == 0 || prob < self.threshold {
            return Ok((image, None));
        }

        // The label is the rotation present in the image; correct by rotating
        // the opposite way.
        let corrected = match angle {
            90 => imageops::rotate270(&image),
            180 => imageops::rotate180(&image),
            270 => imageops::rotate90(&image),
            _ => image,
        };
        Ok((corrected, Some(angle)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SessionBackend, Tensor4D};
    use ndarray::ArrayD;

    struct FixedClass {
        probs: [f32; 4],
    }

    impl SessionBackend for FixedClass {
        fn run(&mut self, _input: Tensor4D) -> OcrResult<ArrayD<f32>> {
            Ok(
                ArrayD::from_shape_vec(ndarray::IxDyn(&[1, 4]), self.probs.to_vec())
                    .expect("static shape"),
            )
        }
    }

    #[test]
    fn confident_rotation_is_corrected() {
        let model = ModelHandle::with_backend(
            FixedClass {
                probs: [0.02, 0.95, 0.02, 0.01],
            },
            "doc-ori",
            1,
        );
        let clf = DocOrientationClassifier::new(model);
        let image = RgbImage::new(100, 40);
        let (corrected, applied) = clf.apply(image).unwrap();
        assert_eq!(applied, Some(90));
        // 90° correction swaps the dimensions.
        assert_eq!(corrected.dimensions(), (40, 100));
    }

    #[test]
    fn low_confidence_leaves_image_untouched() {
        let model = ModelHandle::with_backend(
            FixedClass {
                probs: [0.1, 0.5, 0.3, 0.1],
            },
            "doc-ori",
            1,
        );
        let clf = DocOrientationClassifier::new(model);
        let image = RgbImage::new(100, 40);
        let (corrected, applied) = clf.apply(image).unwrap();
        assert_eq!(applied, None);
        assert_eq!(corrected.dimensions(), (100, 40));
    }
}
