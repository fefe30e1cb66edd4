//! Geometric primitives for text detection post-processing.
//!
//! Provides the [`Point`] and [`Quad`] types used throughout the pipeline,
//! polygon measures (area, perimeter, convex hull), minimum-area rotated
//! rectangles via rotating calipers, and scanline-based mean-probability
//! scoring of a polygon over a prediction map.

use imageproc::contours::Contour;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// X-coordinate.
    pub x: f32,
    /// Y-coordinate.
    pub y: f32,
}

impl Point {
    /// Creates a new point.
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance(&self, other: &Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// A text-region boundary: four points in clockwise order starting at the
/// top-left corner. Convex after unclip expansion.
pub type Quad = [Point; 4];

/// Center of a quadrilateral.
pub fn quad_center(quad: &Quad) -> Point {
    let (mut cx, mut cy) = (0.0, 0.0);
    for p in quad {
        cx += p.x;
        cy += p.y;
    }
    Point::new(cx / 4.0, cy / 4.0)
}

/// Height of a quadrilateral's axis-aligned bounding rectangle.
pub fn quad_bounding_height(quad: &Quad) -> f32 {
    let min_y = quad.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
    let max_y = quad.iter().map(|p| p.y).fold(f32::NEG_INFINITY, f32::max);
    (max_y - min_y).max(0.0)
}

/// A polygon backed by an arbitrary number of points, as produced by contour
/// extraction over the binarized detection map.
#[derive(Debug, Clone)]
pub struct Polygon {
    /// The polygon's vertices.
    pub points: Vec<Point>,
}

impl Polygon {
    /// Creates a polygon from a vector of points.
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Creates a polygon from an extracted contour.
    pub fn from_contour(contour: &Contour<u32>) -> Self {
        Self {
            points: contour
                .points
                .iter()
                .map(|p| Point::new(p.x as f32, p.y as f32))
                .collect(),
        }
    }

    /// Shoelace area. Zero for degenerate polygons.
    pub fn area(&self) -> f32 {
        if self.points.len() < 3 {
            return 0.0;
        }
        let n = self.points.len();
        let mut twice_area = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            twice_area += self.points[i].x * self.points[j].y;
            twice_area -= self.points[j].x * self.points[i].y;
        }
        twice_area.abs() / 2.0
    }

    /// Sum of edge lengths.
    pub fn perimeter(&self) -> f32 {
        let n = self.points.len();
        let mut total = 0.0;
        for i in 0..n {
            let j = (i + 1) % n;
            total += self.points[i].distance(&self.points[j]);
        }
        total
    }

    /// Expands the polygon outward from its centroid by `distance` pixels.
    ///
    /// This is the unclip operation compensating for the shrink applied to
    /// text masks during detector training. `distance` is typically
    /// `area * unclip_ratio / perimeter`.
    pub fn dilate(&self, distance: f32) -> Polygon {
        let n = self.points.len() as f32;
        if n == 0.0 {
            return self.clone();
        }
        let cx = self.points.iter().map(|p| p.x).sum::<f32>() / n;
        let cy = self.points.iter().map(|p| p.y).sum::<f32>() / n;

        let points = self
            .points
            .iter()
            .map(|p| {
                let dx = p.x - cx;
                let dy = p.y - cy;
                let len = (dx * dx + dy * dy).sqrt();
                if len > f32::EPSILON {
                    let push = distance / len;
                    Point::new(p.x + dx * push, p.y + dy * push)
                } else {
                    *p
                }
            })
            .collect();
        Polygon::new(points)
    }

    /// Graham-scan convex hull. Polygons with fewer than three points are
    /// returned unchanged.
    fn convex_hull(&self) -> Vec<Point> {
        if self.points.len() < 3 {
            return self.points.clone();
        }

        let mut points = self.points.clone();
        let mut start = 0;
        for i in 1..points.len() {
            if points[i].y < points[start].y
                || (points[i].y == points[start].y && points[i].x < points[start].x)
            {
                start = i;
            }
        }
        points.swap(0, start);
        let pivot = points[0];

        points[1..].sort_by(|a, b| {
            let cross = cross(&pivot, a, b);
            if cross == 0.0 {
                let da = (a.x - pivot.x).powi(2) + (a.y - pivot.y).powi(2);
                let db = (b.x - pivot.x).powi(2) + (b.y - pivot.y).powi(2);
                da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
            } else if cross > 0.0 {
                std::cmp::Ordering::Less
            } else {
                std::cmp::Ordering::Greater
            }
        });

        let mut hull: Vec<Point> = Vec::with_capacity(points.len());
        for p in points {
            while hull.len() > 1 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], &p) <= 0.0 {
                hull.pop();
            }
            hull.push(p);
        }
        hull
    }

    /// Minimum-area rotated rectangle enclosing the polygon, found by
    /// rotating calipers over the convex hull.
    pub fn min_area_rect(&self) -> RotatedRect {
        let hull = self.convex_hull();

        if hull.len() < 3 {
            // Degenerate: fall back to the axis-aligned bounding box.
            let min_x = self.points.iter().map(|p| p.x).fold(f32::INFINITY, f32::min);
            let max_x = self
                .points
                .iter()
                .map(|p| p.x)
                .fold(f32::NEG_INFINITY, f32::max);
            let min_y = self.points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
            let max_y = self
                .points
                .iter()
                .map(|p| p.y)
                .fold(f32::NEG_INFINITY, f32::max);
            if !min_x.is_finite() {
                return RotatedRect::default();
            }
            return RotatedRect {
                center: Point::new((min_x + max_x) / 2.0, (min_y + max_y) / 2.0),
                width: max_x - min_x,
                height: max_y - min_y,
                angle: 0.0,
            };
        }

        let n = hull.len();
        let mut best_area = f32::MAX;
        let mut best = RotatedRect::default();

        for i in 0..n {
            let j = (i + 1) % n;
            let ex = hull[j].x - hull[i].x;
            let ey = hull[j].y - hull[i].y;
            let len = (ex * ex + ey * ey).sqrt();
            if len < f32::EPSILON {
                continue;
            }
            let (nx, ny) = (ex / len, ey / len);
            let (px, py) = (-ny, nx);

            let mut min_n = f32::MAX;
            let mut max_n = f32::MIN;
            let mut min_p = f32::MAX;
            let mut max_p = f32::MIN;
            for p in &hull {
                let dn = nx * (p.x - hull[i].x) + ny * (p.y - hull[i].y);
                let dp = px * (p.x - hull[i].x) + py * (p.y - hull[i].y);
                min_n = min_n.min(dn);
                max_n = max_n.max(dn);
                min_p = min_p.min(dp);
                max_p = max_p.max(dp);
            }

            let width = max_n - min_n;
            let height = max_p - min_p;
            let area = width * height;
            if area < best_area {
                best_area = area;
                let cn = (min_n + max_n) / 2.0;
                let cp = (min_p + max_p) / 2.0;
                best = RotatedRect {
                    center: Point::new(
                        hull[i].x + cn * nx + cp * px,
                        hull[i].y + cn * ny + cp * py,
                    ),
                    width,
                    height,
                    angle: ny.atan2(nx) * 180.0 / PI,
                };
            }
        }
        best
    }
}

#[inline]
fn cross(o: &Point, a: &Point, b: &Point) -> f32 {
    (a.x - o.x) * (b.y - o.y) - (a.y - o.y) * (b.x - o.x)
}

/// A rotated rectangle described by center, extent and rotation angle.
#[derive(Debug, Clone, Default)]
pub struct RotatedRect {
    /// Center point.
    pub center: Point,
    /// Extent along the rectangle's own x axis.
    pub width: f32,
    /// Extent along the rectangle's own y axis.
    pub height: f32,
    /// Rotation angle in degrees.
    pub angle: f32,
}

impl RotatedRect {
    /// Length of the shorter side.
    pub fn min_side(&self) -> f32 {
        self.width.min(self.height)
    }

    /// The rectangle's corners as a quadrilateral ordered top-left,
    /// top-right, bottom-right, bottom-left in image space.
    pub fn corner_points(&self) -> Quad {
        let cos_a = (self.angle * PI / 180.0).cos();
        let sin_a = (self.angle * PI / 180.0).sin();
        let (hw, hh) = (self.width / 2.0, self.height / 2.0);

        let mut corners = [(-hw, -hh), (hw, -hh), (hw, hh), (-hw, hh)].map(|(x, y)| {
            Point::new(
                x * cos_a - y * sin_a + self.center.x,
                x * sin_a + y * cos_a + self.center.y,
            )
        });
        order_clockwise_from_top_left(&mut corners);
        corners
    }
}

/// Reorders four corner points to top-left, top-right, bottom-right,
/// bottom-left by quadrant relative to the centroid, with a polar-angle
/// fallback for thin rectangles where quadrant classification collides.
fn order_clockwise_from_top_left(points: &mut Quad) {
    let cx = points.iter().map(|p| p.x).sum::<f32>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f32>() / 4.0;

    let mut classified: Vec<(usize, Point)> = points
        .iter()
        .map(|p| {
            let slot = match (p.x < cx, p.y < cy) {
                (true, true) => 0,
                (false, true) => 1,
                (false, false) => 2,
                (true, false) => 3,
            };
            (slot, *p)
        })
        .collect();
    classified.sort_by_key(|&(slot, _)| slot);

    let distinct: std::collections::HashSet<usize> =
        classified.iter().map(|&(slot, _)| slot).collect();
    if distinct.len() == 4 {
        for (i, (_, p)) in classified.into_iter().enumerate() {
            points[i] = p;
        }
        return;
    }

    // Thin or diagonal rectangle: order by angle from the centroid and start
    // at the point closest to the top-left direction.
    let mut by_angle: Vec<(f32, Point)> = points
        .iter()
        .map(|p| {
            let angle = (p.y - cy).atan2(p.x - cx);
            let angle = if angle < -PI / 2.0 {
                angle + 2.0 * PI
            } else {
                angle
            };
            (angle, *p)
        })
        .collect();
    by_angle.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut start = 0;
    let mut best = f32::MAX;
    for (i, (_, p)) in by_angle.iter().enumerate() {
        let score = (p.x - cx + 100.0).powi(2) + (p.y - cy + 100.0).powi(2);
        if score < best {
            best = score;
            start = i;
        }
    }
    for (i, slot) in points.iter_mut().enumerate() {
        *slot = by_angle[(start + i) % 4].1;
    }
}

/// Mean prediction score of the pixels inside a polygon.
///
/// Walks scanlines through the polygon's bounding rows, intersecting each
/// with the polygon edges and summing `pred` over the interior spans.
pub fn polygon_mean_score(pred: &ndarray::Array2<f32>, polygon: &Polygon) -> f32 {
    use rayon::prelude::*;

    let (rows, cols) = (pred.shape()[0], pred.shape()[1]);
    if polygon.points.is_empty() || rows == 0 || cols == 0 {
        return 0.0;
    }

    let Some((raw_min_y, raw_max_y)) = polygon.points.iter().map(|p| p.y).minmax().into_option()
    else {
        return 0.0;
    };
    let Some((raw_min_x, raw_max_x)) = polygon.points.iter().map(|p| p.x).minmax().into_option()
    else {
        return 0.0;
    };
    let min_y = raw_min_y.clamp(0.0, rows as f32 - 1.0) as usize;
    let max_y = raw_max_y.clamp(0.0, rows as f32 - 1.0) as usize;
    let min_x = raw_min_x.clamp(0.0, cols as f32 - 1.0) as usize;
    let max_x = raw_max_x.clamp(0.0, cols as f32 - 1.0) as usize;

    let region = (max_y - min_y + 1) * (max_x - min_x + 1);
    let scan = |y: usize| scanline_sum(pred, polygon, y as f32 + 0.5, min_x, max_x + 1);

    // Small regions are not worth the fork-join overhead.
    let (total, pixels) = if region < 8_000 {
        let mut acc = (0.0, 0usize);
        for y in min_y..=max_y {
            let (s, n) = scan(y);
            acc.0 += s;
            acc.1 += n;
        }
        acc
    } else {
        (min_y..=max_y)
            .into_par_iter()
            .map(scan)
            .reduce(|| (0.0, 0), |a, b| (a.0 + b.0, a.1 + b.1))
    };

    if pixels > 0 {
        total / pixels as f32
    } else {
        0.0
    }
}

/// Sums `pred` over the spans of one scanline that fall inside the polygon.
fn scanline_sum(
    pred: &ndarray::Array2<f32>,
    polygon: &Polygon,
    y: f32,
    start_x: usize,
    end_x: usize,
) -> (f32, usize) {
    let n = polygon.points.len();
    let mut crossings: Vec<f32> = Vec::with_capacity(n);
    for i in 0..n {
        let p1 = &polygon.points[i];
        let p2 = &polygon.points[(i + 1) % n];
        if ((p1.y <= y && y < p2.y) || (p2.y <= y && y < p1.y))
            && (p2.y - p1.y).abs() > f32::EPSILON
        {
            crossings.push(p1.x + (y - p1.y) * (p2.x - p1.x) / (p2.y - p1.y));
        }
    }
    crossings.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let row = y as usize;
    let mut sum = 0.0;
    let mut count = 0usize;
    for pair in crossings.chunks(2) {
        if pair.len() == 2 {
            let x1 = (pair[0].max(start_x as f32)) as usize;
            let x2 = (pair[1].min(end_x as f32)) as usize;
            if x1 < x2 && row < pred.shape()[0] {
                for x in x1..x2.min(pred.shape()[1]) {
                    sum += pred[[row, x]];
                    count += 1;
                }
            }
        }
    }
    (sum, count)
}
