//! Text-line orientation classification.
//!
//! A two-class classifier over {0°, 180°} applied per text-line crop before
//! recognition. Outputs are already probabilities.

use crate::core::{ModelHandle, OcrResult};
use crate::processors::Normalizer;
use image::{imageops, RgbImage};

const INPUT_WIDTH: u32 = 160;
const INPUT_HEIGHT: u32 = 80;

/// Text-line 0°/180° classifier.
#[derive(Debug)]
pub struct TextLineClassifier {
    model: ModelHandle,
    normalizer: Normalizer,
    threshold: f32,
}

impl TextLineClassifier {
    /// Creates a classifier with the default 0.9 threshold.
    pub fn new(model: ModelHandle) -> Self {
        Self {
            model,
            normalizer: Normalizer::centered(),
            threshold: 0.9,
        }
    }

    /// Overrides the confidence threshold.
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Returns true when the crop is upside down with sufficient confidence.
    pub fn needs_flip(&self, crop: &RgbImage) -> OcrResult<bool> {
        let resized = imageops::resize(
            crop,
            INPUT_WIDTH,
            INPUT_HEIGHT,
            imageops::FilterType::Triangle,
        );
        let tensor = self.normalizer.to_tensor(&resized)?;
        let probs = self.model.submit(tensor)?.wait_2d()?;

        let p180 = if probs.shape()[1] > 1 {
            probs[[0, 1]]
        } else {
            0.0
        };
        Ok(p180 >= self.threshold)
    }

    /// Flips the crop 180° when the classifier says it is upside down.
    /// Returns the (possibly rotated) crop and whether a flip happened.
    pub fn apply(&self, crop: RgbImage) -> OcrResult<(RgbImage, bool)> {
        if self.needs_flip(&crop)? {
            Ok((imageops::rotate180(&crop), true))
        } else {
            Ok((crop, false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SessionBackend, Tensor4D};
    use ndarray::ArrayD;

    struct TwoClass {
        p180: f32,
    }

    impl SessionBackend for TwoClass {
        fn run(&mut self, _input: Tensor4D) -> OcrResult<ArrayD<f32>> {
            Ok(ArrayD::from_shape_vec(
                ndarray::IxDyn(&[1, 2]),
                vec![1.0 - self.p180, self.p180],
            )
            .expect("static shape"))
        }
    }

    #[test]
    fn flips_only_above_threshold() {
        let flip = TextLineClassifier::new(ModelHandle::with_backend(
            TwoClass { p180: 0.97 },
            "line-ori",
            1,
        ));
        let keep = TextLineClassifier::new(ModelHandle::with_backend(
            TwoClass { p180: 0.6 },
            "line-ori",
            1,
        ));

        let crop = RgbImage::new(120, 32);
        assert!(flip.needs_flip(&crop).unwrap());
        assert!(!keep.needs_flip(&crop).unwrap());

        let (_, flipped) = flip.apply(RgbImage::new(120, 32)).unwrap();
        assert!(flipped);
    }
}
