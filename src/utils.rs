//! Utility functions for coordinate handling.

pub mod safe_cast;

use nalgebra::Point2;

/// Axis-aligned bounds `(min, max)` of a point cloud, `None` when empty or non-finite
#[must_use]
pub fn point_bounds(points: &[Point2<f64>]) -> Option<(Point2<f64>, Point2<f64>)> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in points {
        if !(p.x.is_finite() && p.y.is_finite()) {
            return None;
        }
        min = Point2::new(min.x.min(p.x), min.y.min(p.y));
        max = Point2::new(max.x.max(p.x), max.y.max(p.y));
    }
    Some((min, max))
}

/// `(x, y)` as unsigned pixel indices if it lies inside a `width` x `height` image
#[must_use]
pub fn pixel_in_bounds(x: i32, y: i32, width: u32, height: u32) -> Option<(u32, u32)> {
    let x = u32::try_from(x).ok()?;
    let y = u32::try_from(y).ok()?;
    (x < width && y < height).then_some((x, y))
}
