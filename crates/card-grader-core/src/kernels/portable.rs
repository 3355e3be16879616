//! In-crate kernel implementations.
//!
//! These follow the same conventions as the `imageproc` kernels they stand
//! in for: borders are handled by clamping coordinates, Sobel uses the
//! standard 3x3 integer kernels, and Canny blurs with sigma 1.4 before
//! taking gradients.

use std::collections::VecDeque;

use image::{GrayImage, Luma};

use super::Gradients;

/// Sigma of the pre-blur applied by Canny.
const CANNY_SIGMA: f32 = 1.4;

#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
fn clamped(image: &GrayImage, x: i64, y: i64) -> f32 {
    let cx = x.clamp(0, i64::from(image.width()) - 1) as u32;
    let cy = y.clamp(0, i64::from(image.height()) - 1) as u32;
    f32::from(image.get_pixel(cx, cy).0[0])
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    let radius = (3.0 * sigma).ceil().max(1.0) as usize;
    let denom = 2.0 * sigma * sigma;
    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let d = i as f32 - radius as f32;
            (-(d * d) / denom).exp()
        })
        .collect();
    let sum: f32 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Separable Gaussian blur.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
pub fn gaussian_blur(image: &GrayImage, sigma: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    if sigma <= 0.0 || width == 0 || height == 0 {
        return image.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as i64;
    let (w, h) = (width as usize, height as usize);

    let mut horizontal = vec![0.0f32; w * h];
    for y in 0..height {
        for x in 0..width {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                acc += weight * clamped(image, i64::from(x) + k as i64 - radius, i64::from(y));
            }
            horizontal[y as usize * w + x as usize] = acc;
        }
    }

    let mut out = GrayImage::new(width, height);
    for y in 0..h {
        for x in 0..w {
            let mut acc = 0.0;
            for (k, weight) in kernel.iter().enumerate() {
                let sy = (y as i64 + k as i64 - radius).clamp(0, h as i64 - 1) as usize;
                acc += weight * horizontal[sy * w + x];
            }
            out.put_pixel(x as u32, y as u32, Luma([acc.round().clamp(0.0, 255.0) as u8]));
        }
    }
    out
}

/// Sobel gradients.
pub fn sobel(image: &GrayImage) -> Gradients {
    let (width, height) = image.dimensions();
    let mut gx = Vec::with_capacity((width * height) as usize);
    let mut gy = Vec::with_capacity((width * height) as usize);
    for y in 0..i64::from(height) {
        for x in 0..i64::from(width) {
            let p = |dx: i64, dy: i64| clamped(image, x + dx, y + dy);
            gx.push(
                (p(1, -1) + 2.0 * p(1, 0) + p(1, 1)) - (p(-1, -1) + 2.0 * p(-1, 0) + p(-1, 1)),
            );
            gy.push(
                (p(-1, 1) + 2.0 * p(0, 1) + p(1, 1)) - (p(-1, -1) + 2.0 * p(0, -1) + p(1, -1)),
            );
        }
    }
    Gradients::new(width, height, gx, gy)
}

/// Canny edge detector: blur, Sobel, non-maximum suppression, hysteresis.
///
/// Edge pixels are 255, everything else 0.
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn canny(image: &GrayImage, low: f32, high: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let blurred = gaussian_blur(image, CANNY_SIGMA);
    let gradients = sobel(&blurred);
    let (w, h) = (width as usize, height as usize);

    let magnitude: Vec<f32> = (0..w * h).map(|i| gradients.magnitude_at(i)).collect();
    let mag = |x: i64, y: i64| -> f32 {
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            0.0
        } else {
            magnitude[y as usize * w + x as usize]
        }
    };

    // Non-maximum suppression along the quantized gradient direction.
    let mut thin = vec![0.0f32; w * h];
    for y in 0..h {
        for x in 0..w {
            let i = y * w + x;
            let m = magnitude[i];
            if m <= 0.0 {
                continue;
            }
            let (dx, dy) = gradients.at_index(i);
            let angle = dy.atan2(dx).to_degrees().rem_euclid(180.0);
            let (ox, oy) = if !(22.5..157.5).contains(&angle) {
                (1, 0)
            } else if angle < 67.5 {
                (1, 1)
            } else if angle < 112.5 {
                (0, 1)
            } else {
                (-1, 1)
            };
            let (xi, yi) = (x as i64, y as i64);
            if m >= mag(xi + ox, yi + oy) && m >= mag(xi - ox, yi - oy) {
                thin[i] = m;
            }
        }
    }

    // Hysteresis: keep weak pixels connected to a strong one.
    let mut out = GrayImage::new(width, height);
    let mut queue = VecDeque::new();
    for (i, &m) in thin.iter().enumerate() {
        if m >= high {
            queue.push_back(i);
            out.put_pixel((i % w) as u32, (i / w) as u32, Luma([255]));
        }
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = ((i % w) as i64, (i / w) as i64);
        for dy in -1..=1 {
            for dx in -1..=1 {
                let (nx, ny) = (x + dx, y + dy);
                if nx < 0 || ny < 0 || nx >= w as i64 || ny >= h as i64 {
                    continue;
                }
                let j = ny as usize * w + nx as usize;
                let (px, py) = (nx as u32, ny as u32);
                if thin[j] >= low && out.get_pixel(px, py).0[0] == 0 {
                    out.put_pixel(px, py, Luma([255]));
                    queue.push_back(j);
                }
            }
        }
    }
    out
}

/// Otsu's threshold: the level maximizing between-class variance.
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn otsu_level(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[usize::from(pixel.0[0])] += 1;
    }
    let total: u64 = histogram.iter().sum();
    if total == 0 {
        return 0;
    }
    let weighted_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(level, &count)| level as f64 * count as f64)
        .sum();

    let mut background = 0u64;
    let mut background_sum = 0.0;
    let mut best_level = 0u8;
    let mut best_variance = -1.0;
    for (level, &count) in histogram.iter().enumerate() {
        background += count;
        if background == 0 {
            continue;
        }
        let foreground = total - background;
        if foreground == 0 {
            break;
        }
        background_sum += level as f64 * count as f64;
        let mean_bg = background_sum / background as f64;
        let mean_fg = (weighted_total - background_sum) / foreground as f64;
        let variance = background as f64 * foreground as f64 * (mean_bg - mean_fg).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best_level = level as u8;
        }
    }
    best_level
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(width: u32, height: u32, split: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, _| Luma([if x < split { 20 } else { 220 }]))
    }

    #[test]
    fn test_gaussian_kernel_is_normalized() {
        let kernel = gaussian_kernel(1.4);
        let sum: f32 = kernel.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert_eq!(kernel.len() % 2, 1);
    }

    #[test]
    fn test_blur_preserves_flat_image() {
        let flat = GrayImage::from_pixel(20, 20, Luma([77]));
        assert_eq!(gaussian_blur(&flat, 2.0), flat);
    }

    #[test]
    fn test_sobel_vertical_step() {
        let gradients = sobel(&step(10, 10, 5));
        let (gx, gy) = gradients.at(5, 5);
        assert!((gx - 800.0).abs() < 1e-3, "gx = {gx}");
        assert!(gy.abs() < 1e-3);
        assert!(gradients.at(1, 5).0.abs() < 1e-3);
    }

    #[test]
    fn test_canny_finds_single_line() {
        let edges = canny(&step(40, 30, 20), 50.0, 150.0);
        for y in 0..30 {
            let row: Vec<u32> = (0..40).filter(|&x| edges.get_pixel(x, y).0[0] > 0).collect();
            assert!(
                !row.is_empty() && row.len() <= 2,
                "row {y} should have a thin edge, got {row:?}"
            );
            assert!(row.iter().all(|&x| (18..=21).contains(&x)));
        }
    }

    #[test]
    fn test_otsu_separates_two_levels() {
        let level = otsu_level(&step(30, 10, 15));
        assert!((20..220).contains(&level), "level = {level}");
    }
}
