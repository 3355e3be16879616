//! Image kernels shared by the analyzers.
//!
//! Each kernel dispatches on the [`Backend`] chosen for the run. Contour
//! tracing and polygon approximation always come from `imageproc`.

mod backend;
mod portable;

use image::{GrayImage, Luma};

pub use backend::{Backend, BackendPreference};

/// Per-pixel Sobel gradients.
#[derive(Debug, Clone)]
pub struct Gradients {
    width: u32,
    height: u32,
    gx: Vec<f32>,
    gy: Vec<f32>,
}

impl Gradients {
    pub(crate) fn new(width: u32, height: u32, gx: Vec<f32>, gy: Vec<f32>) -> Self {
        debug_assert_eq!(gx.len(), (width * height) as usize);
        debug_assert_eq!(gy.len(), gx.len());
        Self {
            width,
            height,
            gx,
            gy,
        }
    }

    /// Gradient grid width.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Gradient grid height.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// `(gx, gy)` at a pixel.
    #[must_use]
    pub fn at(&self, x: u32, y: u32) -> (f32, f32) {
        self.at_index((y * self.width + x) as usize)
    }

    /// `(gx, gy)` at a row-major index.
    #[must_use]
    pub fn at_index(&self, index: usize) -> (f32, f32) {
        (self.gx[index], self.gy[index])
    }

    /// Gradient magnitude at a pixel.
    #[must_use]
    pub fn magnitude(&self, x: u32, y: u32) -> f32 {
        self.magnitude_at((y * self.width + x) as usize)
    }

    /// Gradient magnitude at a row-major index.
    #[must_use]
    pub fn magnitude_at(&self, index: usize) -> f32 {
        self.gx[index].hypot(self.gy[index])
    }
}

/// Gaussian blur.
#[must_use]
pub fn gaussian_blur(backend: Backend, image: &GrayImage, sigma: f32) -> GrayImage {
    match backend {
        Backend::Accelerated if sigma > 0.0 => imageproc::filter::gaussian_blur_f32(image, sigma),
        _ => portable::gaussian_blur(image, sigma),
    }
}

/// Sobel gradients.
#[must_use]
pub fn sobel(backend: Backend, image: &GrayImage) -> Gradients {
    match backend {
        Backend::Accelerated => {
            let gx = imageproc::gradients::horizontal_sobel(image);
            let gy = imageproc::gradients::vertical_sobel(image);
            Gradients::new(
                image.width(),
                image.height(),
                gx.pixels().map(|p| f32::from(p.0[0])).collect(),
                gy.pixels().map(|p| f32::from(p.0[0])).collect(),
            )
        }
        Backend::Portable => portable::sobel(image),
    }
}

/// Canny edge map; edge pixels are 255.
#[must_use]
pub fn canny(backend: Backend, image: &GrayImage, low: f32, high: f32) -> GrayImage {
    match backend {
        Backend::Accelerated => imageproc::edges::canny(image, low, high),
        Backend::Portable => portable::canny(image, low, high),
    }
}

/// Otsu threshold level.
#[must_use]
pub fn otsu_level(backend: Backend, image: &GrayImage) -> u8 {
    match backend {
        Backend::Accelerated => imageproc::contrast::otsu_level(image),
        Backend::Portable => portable::otsu_level(image),
    }
}

/// Grayscale erosion with a 3x3 square (local minimum).
#[must_use]
pub fn erode3(image: &GrayImage) -> GrayImage {
    rank3(image, u8::min, u8::MAX)
}

/// Grayscale dilation with a 3x3 square (local maximum).
#[must_use]
pub fn dilate3(image: &GrayImage) -> GrayImage {
    rank3(image, u8::max, u8::MIN)
}

/// Opening (erode, dilate) followed by closing (dilate, erode).
#[must_use]
pub fn open_close3(image: &GrayImage) -> GrayImage {
    let opened = dilate3(&erode3(image));
    erode3(&dilate3(&opened))
}

fn rank3(image: &GrayImage, pick: fn(u8, u8) -> u8, identity: u8) -> GrayImage {
    let (width, height) = image.dimensions();
    GrayImage::from_fn(width, height, |x, y| {
        let mut value = identity;
        for ny in y.saturating_sub(1)..=(y + 1).min(height - 1) {
            for nx in x.saturating_sub(1)..=(x + 1).min(width - 1) {
                value = pick(value, image.get_pixel(nx, ny).0[0]);
            }
        }
        Luma([value])
    })
}

/// Median intensity.
#[must_use]
pub fn median(image: &GrayImage) -> u8 {
    let mut histogram = [0u64; 256];
    for pixel in image.pixels() {
        histogram[usize::from(pixel.0[0])] += 1;
    }
    let total: u64 = histogram.iter().sum();
    let half = total.div_ceil(2);
    let mut cumulative = 0;
    for (level, &count) in histogram.iter().enumerate() {
        cumulative += count;
        if cumulative >= half && total > 0 {
            return u8::try_from(level).unwrap_or(u8::MAX);
        }
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOTH: [Backend; 2] = [Backend::Accelerated, Backend::Portable];

    fn rectangle(width: u32, height: u32) -> GrayImage {
        GrayImage::from_fn(width, height, |x, y| {
            let inside = (10..30).contains(&x) && (10..25).contains(&y);
            Luma([if inside { 200 } else { 40 }])
        })
    }

    #[test]
    fn test_backends_agree_on_sobel() {
        let image = rectangle(40, 35);
        let accelerated = sobel(Backend::Accelerated, &image);
        let portable = sobel(Backend::Portable, &image);
        for y in 0..35 {
            for x in 0..40 {
                let (ax, ay) = accelerated.at(x, y);
                let (px, py) = portable.at(x, y);
                assert!(
                    (ax.abs() - px.abs()).abs() < 1e-3 && (ay.abs() - py.abs()).abs() < 1e-3,
                    "sobel mismatch at ({x}, {y}): ({ax}, {ay}) vs ({px}, {py})"
                );
            }
        }
    }

    #[test]
    fn test_backends_detect_rectangle_edges() {
        let image = rectangle(40, 35);
        for backend in BOTH {
            let edges = canny(backend, &image, 50.0, 150.0);
            let on_left = (12..23).any(|y| (8..=11).any(|x| edges.get_pixel(x, y).0[0] > 0));
            let inside = edges.get_pixel(20, 17).0[0];
            assert!(on_left, "{backend}: left side not detected");
            assert_eq!(inside, 0, "{backend}: spurious edge inside");
        }
    }

    #[test]
    fn test_backends_agree_on_otsu_class_split() {
        let image = rectangle(40, 35);
        for backend in BOTH {
            let level = otsu_level(backend, &image);
            assert!((40..200).contains(&level), "{backend}: level {level}");
        }
    }

    #[test]
    fn test_open_close_removes_thin_scratch() {
        let mut image = GrayImage::from_pixel(20, 20, Luma([200]));
        for x in 2..18 {
            image.put_pixel(x, 10, Luma([40]));
        }
        let baseline = open_close3(&image);
        assert_eq!(baseline.get_pixel(10, 10).0[0], 200);
    }

    #[test]
    fn test_open_close_preserves_rectangle() {
        let image = rectangle(40, 35);
        assert_eq!(open_close3(&image), image);
    }

    #[test]
    fn test_median() {
        let image = GrayImage::from_fn(10, 1, |x, _| Luma([u8::try_from(x).unwrap_or(0) * 10]));
        assert_eq!(median(&image), 40);
        assert_eq!(median(&GrayImage::new(0, 0)), 0);
    }
}
