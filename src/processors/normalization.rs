//! Per-channel normalization and tensor conversion.
//!
//! Folds `(x * scale - mean) / std` into a per-channel `alpha`/`beta` pair
//! and converts channels-last byte images into channels-first f32 tensors
//! with a leading batch dimension of one.

use crate::core::errors::{OcrError, OcrResult, ProcessingStage};
use crate::core::Tensor4D;
use image::RgbImage;
use ndarray::Array4;

/// Per-channel linear normalizer: `out = pixel * alpha + beta`.
#[derive(Debug, Clone)]
pub struct Normalizer {
    alpha: [f32; 3],
    beta: [f32; 3],
}

impl Normalizer {
    /// Creates a normalizer from scale, per-channel mean and std.
    pub fn new(scale: f32, mean: [f32; 3], std: [f32; 3]) -> OcrResult<Self> {
        if scale <= 0.0 {
            return Err(OcrError::config("normalization scale must be positive"));
        }
        if std.iter().any(|&s| s <= 0.0) {
            return Err(OcrError::config("normalization std must be positive"));
        }
        let mut alpha = [0.0; 3];
        let mut beta = [0.0; 3];
        for c in 0..3 {
            alpha[c] = scale / std[c];
            beta[c] = -mean[c] / std[c];
        }
        Ok(Self { alpha, beta })
    }

    /// ImageNet statistics, used by the detection models.
    pub fn for_detection() -> Self {
        Self::new(
            1.0 / 255.0,
            [0.485, 0.456, 0.406],
            [0.229, 0.224, 0.225],
        )
        .unwrap_or(Self {
            alpha: [1.0 / 255.0; 3],
            beta: [0.0; 3],
        })
    }

    /// Symmetric [-1, 1] mapping, used by recognition and the classifiers.
    pub fn centered() -> Self {
        Self::new(1.0 / 255.0, [0.5, 0.5, 0.5], [0.5, 0.5, 0.5]).unwrap_or(Self {
            alpha: [1.0 / 255.0; 3],
            beta: [0.0; 3],
        })
    }

    /// Plain [0, 1] scaling without mean shift, used by the rectifier.
    pub fn unit_scale() -> Self {
        Self {
            alpha: [1.0 / 255.0; 3],
            beta: [0.0; 3],
        }
    }

    /// Normalizes an image into a (1, 3, H, W) tensor.
    pub fn to_tensor(&self, image: &RgbImage) -> OcrResult<Tensor4D> {
        let (w, h) = image.dimensions();
        if w == 0 || h == 0 {
            return Err(OcrError::processing(
                ProcessingStage::Normalization,
                format!("cannot normalize empty image ({w}x{h})"),
            ));
        }

        let mut tensor = Array4::<f32>::zeros((1, 3, h as usize, w as usize));
        for (x, y, pixel) in image.enumerate_pixels() {
            for c in 0..3 {
                tensor[[0, c, y as usize, x as usize]] =
                    pixel.0[c] as f32 * self.alpha[c] + self.beta[c];
            }
        }
        Ok(tensor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_maps_extremes_to_unit_range() {
        let norm = Normalizer::centered();
        let mut img = RgbImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgb([0, 0, 0]));
        img.put_pixel(1, 0, image::Rgb([255, 255, 255]));
        let t = norm.to_tensor(&img).unwrap();
        assert!((t[[0, 0, 0, 0]] + 1.0).abs() < 1e-5);
        assert!((t[[0, 0, 0, 1]] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn layout_is_channels_first() {
        let norm = Normalizer::unit_scale();
        let mut img = RgbImage::new(2, 2);
        img.put_pixel(1, 0, image::Rgb([255, 0, 0]));
        let t = norm.to_tensor(&img).unwrap();
        assert_eq!(t.shape(), &[1, 3, 2, 2]);
        assert!((t[[0, 0, 0, 1]] - 1.0).abs() < 1e-5);
        assert!(t[[0, 1, 0, 1]].abs() < 1e-5);
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let norm = Normalizer::for_detection();
        let img = RgbImage::new(0, 0);
        assert!(norm.to_tensor(&img).is_err());
    }
}
