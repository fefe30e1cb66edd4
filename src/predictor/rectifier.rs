//! Document rectification through a predicted flow field.
//!
//! The rectification model consumes the page at 488×712 and predicts, for
//! every output pixel, the normalized source coordinate to sample. The
//! dewarped page is produced at the model's input resolution with bilinear
//! sampling using the `align_corners = true` convention (a normalized
//! coordinate of 1.0 maps to the last pixel center).

use crate::core::{ModelHandle, OcrError, OcrResult};
use crate::processors::Normalizer;
use image::{imageops, Rgb, RgbImage};

const INPUT_WIDTH: u32 = 488;
const INPUT_HEIGHT: u32 = 712;

/// Flow-field document rectifier.
#[derive(Debug)]
pub struct DocRectifier {
    model: ModelHandle,
    normalizer: Normalizer,
}

impl DocRectifier {
    /// Creates a rectifier from a loaded flow-field model.
    pub fn new(model: ModelHandle) -> Self {
        Self {
            model,
            normalizer: Normalizer::unit_scale(),
        }
    }

    /// Dewarps a page. The output is at the model's working resolution;
    /// downstream detection operates in that coordinate frame.
    pub fn rectify(&self, image: &RgbImage) -> OcrResult<RgbImage> {
        let resized = imageops::resize(
            image,
            INPUT_WIDTH,
            INPUT_HEIGHT,
            imageops::FilterType::Triangle,
        );
        let tensor = self.normalizer.to_tensor(&resized)?;
        let flow = self.model.submit(tensor)?.wait_4d()?;

        let shape = flow.shape().to_vec();
        if shape[0] != 1 || shape[1] != 2 {
            return Err(OcrError::inference(
                self.model.name(),
                format!("expected flow field of shape [1, 2, H, W], got {shape:?}"),
            ));
        }
        let (out_h, out_w) = (shape[2], shape[3]);

        let src_w = resized.width() as f32;
        let src_h = resized.height() as f32;
        let mut out = RgbImage::new(out_w as u32, out_h as u32);

        for y in 0..out_h {
            for x in 0..out_w {
                // align_corners: normalized 1.0 lands on the last pixel center.
                let sx = flow[[0, 0, y, x]].clamp(0.0, 1.0) * (src_w - 1.0);
                let sy = flow[[0, 1, y, x]].clamp(0.0, 1.0) * (src_h - 1.0);

                let x0 = sx.floor() as u32;
                let y0 = sy.floor() as u32;
                let x1 = (x0 + 1).min(resized.width() - 1);
                let y1 = (y0 + 1).min(resized.height() - 1);
                let fx = sx - x0 as f32;
                let fy = sy - y0 as f32;

                let p00 = resized.get_pixel(x0, y0).0;
                let p10 = resized.get_pixel(x1, y0).0;
                let p01 = resized.get_pixel(x0, y1).0;
                let p11 = resized.get_pixel(x1, y1).0;

                let mut blended = [0u8; 3];
                for c in 0..3 {
                    let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
                    let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
                    blended[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
                }
                out.put_pixel(x as u32, y as u32, Rgb(blended));
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{SessionBackend, Tensor4D};
    use ndarray::ArrayD;

    /// Identity flow: every output pixel samples itself.
    struct IdentityFlow;

    impl SessionBackend for IdentityFlow {
        fn run(&mut self, input: Tensor4D) -> OcrResult<ArrayD<f32>> {
            let (h, w) = (input.shape()[2], input.shape()[3]);
            let mut flow = ArrayD::zeros(ndarray::IxDyn(&[1, 2, h, w]));
            for y in 0..h {
                for x in 0..w {
                    flow[[0, 0, y, x]] = x as f32 / (w - 1) as f32;
                    flow[[0, 1, y, x]] = y as f32 / (h - 1) as f32;
                }
            }
            Ok(flow)
        }
    }

    #[test]
    fn identity_flow_reproduces_the_resized_page() {
        let model = ModelHandle::with_backend(IdentityFlow, "uvdoc", 1);
        let rectifier = DocRectifier::new(model);

        let mut image = RgbImage::new(488, 712);
        for y in 100..200 {
            for x in 50..150 {
                image.put_pixel(x, y, Rgb([128, 64, 32]));
            }
        }
        let out = rectifier.rectify(&image).unwrap();
        assert_eq!(out.dimensions(), (488, 712));
        assert_eq!(out.get_pixel(100, 150).0, [128, 64, 32]);
        assert_eq!(out.get_pixel(300, 400).0, [0, 0, 0]);
    }

    #[test]
    fn malformed_flow_shape_is_an_error() {
        struct BadShape;
        impl SessionBackend for BadShape {
            fn run(&mut self, _input: Tensor4D) -> OcrResult<ArrayD<f32>> {
                Ok(ArrayD::zeros(ndarray::IxDyn(&[1, 3, 8, 8])))
            }
        }
        let rectifier = DocRectifier::new(ModelHandle::with_backend(BadShape, "uvdoc", 1));
        assert!(rectifier.rectify(&RgbImage::new(64, 64)).is_err());
    }
}
