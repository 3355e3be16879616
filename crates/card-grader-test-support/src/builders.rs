//! Synthetic card images for testing.

use std::io::Cursor;

use card_grader_core::CardImage;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

/// Width of the reference layout; all geometry scales from it.
const BASE_WIDTH: f64 = 700.0;
/// Height of the reference layout.
const BASE_HEIGHT: f64 = 1000.0;

/// Builder for synthetic card photos.
///
/// The reference layout is a light card on a dark background with a darker
/// rectangular print area inside it. Every defect is drawn at a known place
/// so analyzers can be checked against it.
#[derive(Debug, Clone)]
pub struct SyntheticCardBuilder {
    scale: f64,
    background: u8,
    card: u8,
    print: u8,
    print_shift: (i64, i64),
    corner_radius: Option<f64>,
    chipped_edge: bool,
    scratches: u32,
    blotch: bool,
    print_area: bool,
    full_bleed: bool,
}

impl Default for SyntheticCardBuilder {
    fn default() -> Self {
        Self::perfect()
    }
}

impl SyntheticCardBuilder {
    /// A flawless, perfectly centered 700x1000 card.
    #[must_use]
    pub fn perfect() -> Self {
        Self {
            scale: 1.0,
            background: 30,
            card: 230,
            print: 100,
            print_shift: (0, 0),
            corner_radius: None,
            chipped_edge: false,
            scratches: 0,
            blotch: false,
            print_area: true,
            full_bleed: false,
        }
    }

    /// A card with no detectable border anywhere: one flat tone edge to edge.
    #[must_use]
    pub fn no_inner_border() -> Self {
        let mut builder = Self::perfect();
        builder.print_area = false;
        builder.full_bleed = true;
        builder
    }

    /// An image below the minimum usable size.
    #[must_use]
    pub fn too_small() -> DynamicImage {
        Self::perfect().scale(0.2).build()
    }

    /// Scales the whole layout (1.0 is 700x1000).
    #[must_use]
    pub fn scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    /// Moves the print area right by `dx` and down by `dy` reference pixels.
    ///
    /// A shift of 28 turns the 70 px side margins into 98/42, i.e. 70/30.
    #[must_use]
    pub fn off_center(mut self, dx: i64, dy: i64) -> Self {
        self.print_shift = (dx, dy);
        self
    }

    /// Rounds all four card corners with `radius` reference pixels.
    #[must_use]
    pub fn rounded_corners(mut self, radius: f64) -> Self {
        self.corner_radius = Some(radius);
        self
    }

    /// Knocks a notch out of the top edge.
    #[must_use]
    pub fn chipped_edge(mut self) -> Self {
        self.chipped_edge = true;
        self
    }

    /// Draws `count` thin dark scratches across the print area.
    #[must_use]
    pub fn scratches(mut self, count: u32) -> Self {
        self.scratches = count;
        self
    }

    /// Darkens a soft round patch in the middle of the print area.
    #[must_use]
    pub fn print_blotch(mut self) -> Self {
        self.blotch = true;
        self
    }

    /// Width and height of the built image.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn dimensions(&self) -> (u32, u32) {
        (
            (BASE_WIDTH * self.scale).round() as u32,
            (BASE_HEIGHT * self.scale).round() as u32,
        )
    }

    /// Renders the card.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn build(&self) -> DynamicImage {
        let (width, height) = self.dimensions();
        let image = RgbImage::from_fn(width, height, |x, y| {
            let (u, v) = (
                (f64::from(x) + 0.5) / self.scale,
                (f64::from(y) + 0.5) / self.scale,
            );
            let value = self.shade(u, v).round().clamp(0.0, 255.0) as u8;
            Rgb([value, value, value])
        });
        DynamicImage::ImageRgb8(image)
    }

    /// Renders the card as a [`CardImage`] with the given path.
    #[must_use]
    pub fn build_card(&self, path: &str) -> CardImage {
        CardImage::new(path, self.build())
    }

    /// Renders the card and encodes it as PNG.
    ///
    /// # Panics
    ///
    /// Panics if PNG encoding fails.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn png_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        self.build()
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .expect("encode synthetic card as PNG");
        bytes
    }

    /// Gray level at reference-layout coordinates `(u, v)`.
    fn shade(&self, u: f64, v: f64) -> f64 {
        if self.full_bleed {
            return f64::from(self.card);
        }
        if !self.on_card(u, v) {
            return f64::from(self.background);
        }
        #[allow(clippy::cast_precision_loss)]
        let (dx, dy) = (self.print_shift.0 as f64, self.print_shift.1 as f64);
        let in_print = self.print_area
            && (100.0 + dx..600.0 + dx).contains(&u)
            && (100.0 + dy..900.0 + dy).contains(&v);
        if !in_print {
            return f64::from(self.card);
        }

        let mut value = f64::from(self.print);
        if self.scratches > 0 {
            let pitch = 700.0 / f64::from(self.scratches);
            let row = v - 150.0;
            if (0.0..700.0).contains(&row) && row % pitch < 1.0 && (120.0..580.0).contains(&u) {
                value = 20.0;
            }
        }
        if self.blotch {
            let (cx, cy, sigma) = (350.0 + dx, 500.0 + dy, 50.0);
            let d2 = (u - cx).powi(2) + (v - cy).powi(2);
            value -= 60.0 * (-d2 / (2.0 * sigma * sigma)).exp();
        }
        value
    }

    fn on_card(&self, u: f64, v: f64) -> bool {
        let (left, top, right, bottom) = (30.0, 30.0, 670.0, 970.0);
        if !((left..right).contains(&u) && (top..bottom).contains(&v)) {
            return false;
        }
        if self.chipped_edge && (250.0..330.0).contains(&u) && v < 45.0 {
            return false;
        }
        if let Some(r) = self.corner_radius {
            let cx = if u < left + r {
                left + r
            } else if u > right - r {
                right - r
            } else {
                return true;
            };
            let cy = if v < top + r {
                top + r
            } else if v > bottom - r {
                bottom - r
            } else {
                return true;
            };
            return (u - cx).powi(2) + (v - cy).powi(2) <= r * r;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gray(builder: &SyntheticCardBuilder) -> image::GrayImage {
        builder.build().to_luma8()
    }

    #[test]
    fn test_perfect_layout() {
        let card = gray(&SyntheticCardBuilder::perfect());
        assert_eq!(card.dimensions(), (700, 1000));
        assert_eq!(card.get_pixel(5, 5).0[0], 30);
        assert_eq!(card.get_pixel(50, 50).0[0], 230);
        assert_eq!(card.get_pixel(350, 500).0[0], 100);
    }

    #[test]
    fn test_off_center_moves_print() {
        let card = gray(&SyntheticCardBuilder::perfect().off_center(28, 0));
        assert_eq!(card.get_pixel(110, 500).0[0], 230);
        assert_eq!(card.get_pixel(130, 500).0[0], 100);
        assert_eq!(card.get_pixel(620, 500).0[0], 100);
    }

    #[test]
    fn test_rounded_corners_cut_the_corner() {
        let card = gray(&SyntheticCardBuilder::perfect().rounded_corners(25.0));
        assert_eq!(card.get_pixel(31, 31).0[0], 30);
        assert_eq!(card.get_pixel(668, 968).0[0], 30);
        assert_eq!(card.get_pixel(55, 31).0[0], 230);
    }

    #[test]
    fn test_defects_are_drawn() {
        let chipped = gray(&SyntheticCardBuilder::perfect().chipped_edge());
        assert_eq!(chipped.get_pixel(280, 35).0[0], 30);

        let scratched = gray(&SyntheticCardBuilder::perfect().scratches(12));
        assert_eq!(scratched.get_pixel(300, 150).0[0], 20);

        let blotched = gray(&SyntheticCardBuilder::perfect().print_blotch());
        assert!(blotched.get_pixel(350, 500).0[0] < 50);
    }

    #[test]
    fn test_too_small_and_scaled() {
        let small = SyntheticCardBuilder::too_small();
        assert_eq!((small.width(), small.height()), (140, 200));
        let large = SyntheticCardBuilder::perfect().scale(2.0).build();
        assert_eq!((large.width(), large.height()), (1400, 2000));
    }

    #[test]
    fn test_no_inner_border_is_flat() {
        let card = gray(&SyntheticCardBuilder::no_inner_border());
        assert!(card.pixels().all(|p| p.0[0] == 230));
    }

    #[test]
    fn test_png_round_trip_decodes() {
        let bytes = SyntheticCardBuilder::perfect().png_bytes();
        let decoded = image::load_from_memory(&bytes).map(|i| (i.width(), i.height()));
        assert_eq!(decoded.ok(), Some((700, 1000)));
    }
}
