//! Resizing strategies for the detection and recognition stages.

use image::{imageops, RgbImage};

/// Result of a letterbox resize: the padded image plus the dimensions of the
/// scaled content inside it.
#[derive(Debug)]
pub struct LetterboxResult {
    /// Scaled image padded right/bottom with black to /32 multiples.
    pub image: RgbImage,
    /// Height of the scaled content before padding.
    pub scaled_h: u32,
    /// Width of the scaled content before padding.
    pub scaled_w: u32,
}

/// Resizes an image so its long side equals `target_long_side`, preserving
/// aspect ratio, then pads right and bottom with black to the next multiple
/// of 32 in each dimension.
pub fn letterbox_resize(image: &RgbImage, target_long_side: u32) -> LetterboxResult {
    let (w, h) = image.dimensions();
    let long_side = w.max(h).max(1);
    let scale = target_long_side as f32 / long_side as f32;

    let scaled_w = ((w as f32 * scale).round() as u32).max(1);
    let scaled_h = ((h as f32 * scale).round() as u32).max(1);

    let scaled = imageops::resize(image, scaled_w, scaled_h, imageops::FilterType::Triangle);

    let padded_w = scaled_w.div_ceil(32) * 32;
    let padded_h = scaled_h.div_ceil(32) * 32;

    let image = if padded_w == scaled_w && padded_h == scaled_h {
        scaled
    } else {
        let mut canvas = RgbImage::new(padded_w, padded_h);
        imageops::overlay(&mut canvas, &scaled, 0, 0);
        canvas
    };

    LetterboxResult {
        image,
        scaled_h,
        scaled_w,
    }
}

/// Resizes a text-line crop to the recognition input height and right-pads it
/// with black to the width of the selected model variant.
///
/// The crop is scaled to height `input_height` with width
/// `round(input_height * aspect)` capped at `target_width`, then padded.
pub fn resize_for_recognition(crop: &RgbImage, input_height: u32, target_width: u32) -> RgbImage {
    let (w, h) = crop.dimensions();
    let aspect = w as f32 / h.max(1) as f32;
    let scaled_w = ((input_height as f32 * aspect).round() as u32)
        .clamp(1, target_width);

    let scaled = imageops::resize(
        crop,
        scaled_w,
        input_height,
        imageops::FilterType::Triangle,
    );
    if scaled_w == target_width {
        return scaled;
    }

    let mut canvas = RgbImage::new(target_width, input_height);
    imageops::overlay(&mut canvas, &scaled, 0, 0);
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_scales_long_side_and_pads_to_32() {
        let img = RgbImage::new(1000, 500);
        let out = letterbox_resize(&img, 960);
        assert_eq!(out.scaled_w, 960);
        assert_eq!(out.scaled_h, 480);
        assert_eq!(out.image.width(), 960);
        assert_eq!(out.image.height(), 480);

        let img = RgbImage::new(700, 300);
        let out = letterbox_resize(&img, 640);
        assert_eq!(out.scaled_w, 640);
        // 300 * 640/700 = 274.28 -> 274, padded to 288.
        assert_eq!(out.scaled_h, 274);
        assert_eq!(out.image.height(), 288);
        assert_eq!(out.image.width(), 640);
    }

    #[test]
    fn padding_area_is_black() {
        let mut img = RgbImage::new(90, 60);
        for p in img.pixels_mut() {
            *p = image::Rgb([255, 255, 255]);
        }
        let out = letterbox_resize(&img, 640);
        // 60 * 640/90 = 426.7 -> 427, padded up to 448.
        assert_eq!(out.scaled_h, 427);
        assert_eq!(out.image.height(), 448);
        assert_eq!(out.image.get_pixel(0, out.scaled_h).0, [0, 0, 0]);
        assert_eq!(out.image.get_pixel(0, out.scaled_h - 1).0, [255, 255, 255]);
    }

    #[test]
    fn recognition_resize_pads_to_variant_width() {
        let crop = RgbImage::new(96, 24); // aspect 4
        let out = resize_for_recognition(&crop, 48, 5 * 48);
        assert_eq!(out.height(), 48);
        assert_eq!(out.width(), 240);
    }

    #[test]
    fn recognition_resize_caps_overlong_crops() {
        let crop = RgbImage::new(4000, 40); // aspect 100, beyond the largest variant
        let out = resize_for_recognition(&crop, 48, 35 * 48);
        assert_eq!(out.width(), 35 * 48);
        assert_eq!(out.height(), 48);
    }
}
