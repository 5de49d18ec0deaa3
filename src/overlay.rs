//! Drawing landmarks and the estimated pose onto still images.

use crate::{
    camera::CameraIntrinsics,
    landmarks::LandmarkSet,
    pose_estimation::PoseEstimate,
    utils::{pixel_in_bounds, point_bounds, safe_cast::f64_to_i32_clamp},
    Result,
};
use image::{Rgb, RgbImage};
use nalgebra::{Point2, Point3, Rotation3};
use std::path::{Path, PathBuf};

pub const BACKGROUND_COLOR: Rgb<u8> = Rgb([24, 24, 24]);
pub const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const POSE_BOX_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

/// Half-size of the square marker drawn per landmark
const LANDMARK_RADIUS: i32 = 1;

/// Pose box in model units: a smaller rear square on the face plane and a
/// larger front square in front of it
const REAR_SIZE: f64 = 75.0;
const REAR_DEPTH: f64 = 0.0;
const FRONT_SIZE: f64 = 100.0;
const FRONT_DEPTH: f64 = 100.0;

/// Slack outside the image that line endpoints are clamped to
const CLAMP_MARGIN: i32 = 4096;

/// Uniform canvas matching the stream resolution
#[must_use]
pub fn blank_canvas(width: u32, height: u32) -> RgbImage {
    RgbImage::from_pixel(width, height, BACKGROUND_COLOR)
}

fn put_pixel(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if let Some((px, py)) = pixel_in_bounds(x, y, image.width(), image.height()) {
        image.put_pixel(px, py, color);
    }
}

fn to_pixel(point: &Point2<f64>) -> (i32, i32) {
    (
        f64_to_i32_clamp(point.x, -CLAMP_MARGIN, i32::MAX / 2),
        f64_to_i32_clamp(point.y, -CLAMP_MARGIN, i32::MAX / 2),
    )
}

/// Bresenham line, clipped per pixel
pub fn draw_line(image: &mut RgbImage, from: &Point2<f64>, to: &Point2<f64>, color: Rgb<u8>) {
    let limit_x = i32::try_from(image.width()).unwrap_or(i32::MAX).saturating_add(CLAMP_MARGIN);
    let limit_y = i32::try_from(image.height()).unwrap_or(i32::MAX).saturating_add(CLAMP_MARGIN);
    let (x0, y0) = to_pixel(from);
    let (x1, y1) = to_pixel(to);
    let (mut x, mut y) = (x0.min(limit_x), y0.min(limit_y));
    let (x1, y1) = (x1.min(limit_x), y1.min(limit_y));

    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;

    loop {
        put_pixel(image, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Mark every landmark with a small square
pub fn draw_landmarks(image: &mut RgbImage, landmarks: &LandmarkSet, color: Rgb<u8>) {
    for point in landmarks.points() {
        let (cx, cy) = to_pixel(point);
        for dy in -LANDMARK_RADIUS..=LANDMARK_RADIUS {
            for dx in -LANDMARK_RADIUS..=LANDMARK_RADIUS {
                put_pixel(image, cx + dx, cy + dy, color);
            }
        }
    }
}

/// Outline the axis-aligned box around all landmarks. Returns `false` for an empty set.
pub fn draw_face_bounds(image: &mut RgbImage, landmarks: &LandmarkSet, color: Rgb<u8>) -> bool {
    let Some((min, max)) = point_bounds(landmarks.points()) else {
        return false;
    };
    let corners = [
        min,
        Point2::new(max.x, min.y),
        max,
        Point2::new(min.x, max.y),
    ];
    for i in 0..4 {
        draw_line(image, &corners[i], &corners[(i + 1) % 4], color);
    }
    true
}

fn pose_box_corners() -> [Point3<f64>; 8] {
    let square = |size: f64, depth: f64| {
        [
            Point3::new(-size, -size, depth),
            Point3::new(-size, size, depth),
            Point3::new(size, size, depth),
            Point3::new(size, -size, depth),
        ]
    };
    let rear = square(REAR_SIZE, REAR_DEPTH);
    let front = square(FRONT_SIZE, FRONT_DEPTH);
    [rear[0], rear[1], rear[2], rear[3], front[0], front[1], front[2], front[3]]
}

/// Project a 3D box attached to the head through the estimated pose.
///
/// Returns `false` and draws nothing if part of the box falls behind the camera.
pub fn draw_pose_box(image: &mut RgbImage, estimate: &PoseEstimate, camera: &CameraIntrinsics, color: Rgb<u8>) -> bool {
    let rotation = Rotation3::new(estimate.rotation_vector);
    let mut projected = [Point2::origin(); 8];
    for (slot, corner) in projected.iter_mut().zip(pose_box_corners()) {
        match camera.project(&(rotation.transform_point(&corner) + estimate.translation)) {
            Some(point) => *slot = point,
            None => return false,
        }
    }

    for i in 0..4 {
        let j = (i + 1) % 4;
        draw_line(image, &projected[i], &projected[j], color);
        draw_line(image, &projected[i + 4], &projected[j + 4], color);
    }
    // Connect rear and front faces
    for i in 1..4 {
        draw_line(image, &projected[i], &projected[i + 4], color);
    }
    true
}

/// Write `image` as `frame_<index>.png` under `dir`, creating the directory if needed
///
/// # Errors
///
/// Returns an error if the directory cannot be created or the image cannot be encoded.
pub fn save_snapshot<P: AsRef<Path>>(image: &RgbImage, dir: P, index: usize) -> Result<PathBuf> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("frame_{index:06}.png"));
    image.save(&path)?;
    log::debug!("Saved snapshot {}", path.display());
    Ok(path)
}
