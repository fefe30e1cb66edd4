//! Rendering of OCR results onto the processed image.
//!
//! Draws each text-region quadrilateral as a colored outline. The boxes are
//! in the processed image's coordinate frame, so drawing on any other image
//! would misplace them.

use crate::pipeline::result::TextEntry;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;

const BOX_COLOR: Rgb<u8> = Rgb([60, 179, 113]);

/// Returns a copy of `image` with every entry's quadrilateral outlined.
pub fn draw_ocr_results(image: &RgbImage, entries: &[TextEntry]) -> RgbImage {
    let mut canvas = image.clone();
    for entry in entries {
        for i in 0..4 {
            let a = entry.quad[i];
            let b = entry.quad[(i + 1) % 4];
            draw_line_segment_mut(&mut canvas, (a.x, a.y), (b.x, b.y), BOX_COLOR);
        }
    }
    canvas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::geometry::Point;

    #[test]
    fn drawing_marks_box_edges() {
        let image = RgbImage::new(64, 64);
        let entries = vec![TextEntry {
            quad: [
                Point::new(10.0, 10.0),
                Point::new(50.0, 10.0),
                Point::new(50.0, 30.0),
                Point::new(10.0, 30.0),
            ],
            text: "x".into(),
            confidence: 1.0,
            index: 0,
        }];
        let out = draw_ocr_results(&image, &entries);
        assert_eq!(out.get_pixel(30, 10).0, [60, 179, 113]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
    }
}
