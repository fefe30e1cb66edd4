//! Perspective transformation of text-region quadrilaterals.
//!
//! Rectifies a detected quadrilateral into an axis-aligned crop the
//! recognition stage can consume. The homography is solved from the four
//! point correspondences; near-vertical results are rotated so recognition
//! always sees a horizontal line.

use crate::core::errors::{OcrError, OcrResult};
use crate::processors::geometry::{Point, Quad};
use image::{imageops, Rgb, RgbImage};
use nalgebra::{Matrix3, SMatrix, SVector};

/// Extracts the perspective-rectified crop of a quadrilateral region.
///
/// The output width is the longer of the quad's top and bottom edges; the
/// output height the longer of its left and right edges. When the result is
/// taller than 1.5× its width it is rotated 90° counter-clockwise.
pub fn get_rotate_crop_image(src: &RgbImage, quad: &Quad) -> OcrResult<RgbImage> {
    // Crop to the quad's bounding box first so the warp touches few pixels.
    let min_x = quad.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
    let max_x = quad.iter().map(|p| p.x).fold(f32::NEG_INFINITY, f32::max);
    let min_y = quad.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = quad.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);

    let left = min_x.max(0.0) as u32;
    let top = min_y.max(0.0) as u32;
    let right = (max_x.min(src.width() as f32)) as u32;
    let bottom = (max_y.min(src.height() as f32)) as u32;
    if right <= left || bottom <= top {
        return Err(OcrError::invalid_input("quad crop region is empty"));
    }

    let cropped = imageops::crop_imm(src, left, top, right - left, bottom - top).to_image();
    let local: Quad = quad.map(|p| Point::new(p.x - left as f32, p.y - top as f32));

    let out_w = local[0]
        .distance(&local[1])
        .max(local[3].distance(&local[2]))
        .round() as u32;
    let out_h = local[0]
        .distance(&local[3])
        .max(local[1].distance(&local[2]))
        .round() as u32;
    if out_w == 0 || out_h == 0 {
        return Err(OcrError::invalid_input("quad collapses to zero size"));
    }

    let dst = [
        Point::new(0.0, 0.0),
        Point::new(out_w as f32, 0.0),
        Point::new(out_w as f32, out_h as f32),
        Point::new(0.0, out_h as f32),
    ];

    let forward = perspective_transform(&local, &dst)?;
    let inverse = forward
        .try_inverse()
        .ok_or_else(|| OcrError::invalid_input("degenerate quad: homography not invertible"))?;

    let warped = warp_bilinear(&cropped, &inverse, out_w, out_h);

    if warped.height() as f32 > warped.width() as f32 * 1.5 {
        Ok(imageops::rotate270(&warped))
    } else {
        Ok(warped)
    }
}

/// Solves the 3×3 homography mapping four source points to four destination
/// points (bottom-right element fixed at 1).
pub fn perspective_transform(src: &Quad, dst: &Quad) -> OcrResult<Matrix3<f32>> {
    let mut a = SMatrix::<f32, 8, 8>::zeros();
    let mut b = SVector::<f32, 8>::zeros();

    for i in 0..4 {
        let (sx, sy) = (src[i].x, src[i].y);
        let (dx, dy) = (dst[i].x, dst[i].y);

        a[(i, 0)] = sx;
        a[(i, 1)] = sy;
        a[(i, 2)] = 1.0;
        a[(i, 6)] = -sx * dx;
        a[(i, 7)] = -sy * dx;
        b[i] = dx;

        a[(i + 4, 3)] = sx;
        a[(i + 4, 4)] = sy;
        a[(i + 4, 5)] = 1.0;
        a[(i + 4, 6)] = -sx * dy;
        a[(i + 4, 7)] = -sy * dy;
        b[i + 4] = dy;
    }

    let coeffs = a
        .lu()
        .solve(&b)
        .ok_or_else(|| OcrError::invalid_input("perspective system is singular"))?;

    Ok(Matrix3::new(
        coeffs[0], coeffs[1], coeffs[2], //
        coeffs[3], coeffs[4], coeffs[5], //
        coeffs[6], coeffs[7], 1.0,
    ))
}

/// Applies a homography to a point.
pub fn apply_homography(m: &Matrix3<f32>, p: &Point) -> Point {
    let w = m[(2, 0)] * p.x + m[(2, 1)] * p.y + m[(2, 2)];
    let w = if w.abs() < f32::EPSILON { f32::EPSILON } else { w };
    Point::new(
        (m[(0, 0)] * p.x + m[(0, 1)] * p.y + m[(0, 2)]) / w,
        (m[(1, 0)] * p.x + m[(1, 1)] * p.y + m[(1, 2)]) / w,
    )
}

/// Samples the source through the inverse homography with bilinear
/// interpolation. Out-of-bounds samples are black.
fn warp_bilinear(src: &RgbImage, inverse: &Matrix3<f32>, out_w: u32, out_h: u32) -> RgbImage {
    let (src_w, src_h) = (src.width() as f32, src.height() as f32);
    let mut out = RgbImage::new(out_w, out_h);

    for y in 0..out_h {
        for x in 0..out_w {
            let mapped = apply_homography(inverse, &Point::new(x as f32, y as f32));
            if mapped.x < 0.0 || mapped.y < 0.0 || mapped.x >= src_w - 1.0 || mapped.y >= src_h - 1.0
            {
                continue;
            }

            let x0 = mapped.x.floor() as u32;
            let y0 = mapped.y.floor() as u32;
            let fx = mapped.x - x0 as f32;
            let fy = mapped.y - y0 as f32;

            let p00 = src.get_pixel(x0, y0).0;
            let p10 = src.get_pixel(x0 + 1, y0).0;
            let p01 = src.get_pixel(x0, y0 + 1).0;
            let p11 = src.get_pixel(x0 + 1, y0 + 1).0;

            let mut blended = [0u8; 3];
            for c in 0..3 {
                let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
                let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
                blended[c] = (top * (1.0 - fy) + bottom * fy).round() as u8;
            }
            out.put_pixel(x, y, Rgb(blended));
        }
    }
    out
}
