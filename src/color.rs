use eframe::egui::Color32;
use palette::{Hsl, IntoColor, LinSrgb, Mix, Srgb};

use crate::data::model::SpectralImage;

// ---------------------------------------------------------------------------
// Color palette generator
// ---------------------------------------------------------------------------

/// Generates `n` visually distinct colours using evenly spaced hues.
pub fn generate_palette(n: usize) -> Vec<Color32> {
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .map(|i| {
            let hue = (i as f32 / n as f32) * 360.0;
            let hsl = Hsl::new(hue, 0.75, 0.55);
            let rgb: Srgb = hsl.into_color();
            to_color32(rgb)
        })
        .collect()
}

fn to_color32(rgb: Srgb) -> Color32 {
    Color32::from_rgb(
        (rgb.red.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.green.clamp(0.0, 1.0) * 255.0) as u8,
        (rgb.blue.clamp(0.0, 1.0) * 255.0) as u8,
    )
}

// ---------------------------------------------------------------------------
// Intensity colour map: value → Color32
// ---------------------------------------------------------------------------

/// Viridis control points (sRGB), evenly spaced over `[0, 1]`.
const VIRIDIS: [(f32, f32, f32); 9] = [
    (0.267, 0.005, 0.329),
    (0.283, 0.141, 0.458),
    (0.254, 0.265, 0.530),
    (0.207, 0.372, 0.553),
    (0.164, 0.471, 0.558),
    (0.128, 0.567, 0.551),
    (0.135, 0.659, 0.518),
    (0.478, 0.821, 0.318),
    (0.993, 0.906, 0.144),
];

/// Viridis colour at `t` in `[0, 1]` (clamped), interpolated in linear RGB.
pub fn viridis(t: f32) -> Color32 {
    let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
    let scaled = t * (VIRIDIS.len() - 1) as f32;
    let i = (scaled.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = scaled - i as f32;

    let (r0, g0, b0) = VIRIDIS[i];
    let (r1, g1, b1) = VIRIDIS[i + 1];
    let a: LinSrgb = Srgb::new(r0, g0, b0).into_linear();
    let b: LinSrgb = Srgb::new(r1, g1, b1).into_linear();
    let rgb: Srgb = Srgb::from_linear(a.mix(b, frac));
    to_color32(rgb)
}

/// Linear stretch between display limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScale {
    pub lo: f64,
    pub hi: f64,
}

impl ColorScale {
    pub fn new(lo: f64, hi: f64) -> Self {
        Self { lo, hi }
    }

    /// Position of `value` in `[0, 1]`; a degenerate range maps to 0.5.
    pub fn normalize(&self, value: f64) -> f32 {
        let range = self.hi - self.lo;
        if range.abs() < f64::EPSILON {
            return 0.5;
        }
        ((value - self.lo) / range).clamp(0.0, 1.0) as f32
    }

    pub fn color_for(&self, value: f64) -> Color32 {
        if value.is_finite() {
            viridis(self.normalize(value))
        } else {
            Color32::TRANSPARENT
        }
    }
}

/// RGBA bytes for `image` with row 0 last, so that pixel `(x, y)` is drawn
/// at plot coordinate `(x, y)` with the origin in the lower left.
pub fn render_rgba(image: &SpectralImage, scale: &ColorScale) -> Vec<u8> {
    let (rows, cols) = image.shape();
    let mut rgba = Vec::with_capacity(rows * cols * 4);
    for r in (0..rows).rev() {
        for &v in image.row(r) {
            rgba.extend_from_slice(&scale.color_for(v).to_array());
        }
    }
    rgba
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_has_requested_size() {
        assert!(generate_palette(0).is_empty());
        let p = generate_palette(4);
        assert_eq!(p.len(), 4);
        assert_ne!(p[0], p[1]);
    }

    #[test]
    fn viridis_endpoints() {
        let dark = viridis(0.0);
        let bright = viridis(1.0);
        assert_eq!(dark, Color32::from_rgb(68, 1, 83));
        assert!(bright.r() > 240 && bright.g() > 220 && bright.b() < 60);
        assert_eq!(viridis(-3.0), dark);
        assert_eq!(viridis(f32::NAN), dark);
    }

    #[test]
    fn render_flips_rows_and_hides_nan() {
        let img = SpectralImage::from_fn(2, 1, |r, _| if r == 0 { 0.0 } else { f64::NAN });
        let rgba = render_rgba(&img, &ColorScale::new(0.0, 1.0));
        assert_eq!(rgba.len(), 8);
        // NaN row (row 1) comes first
        assert_eq!(&rgba[..4], &[0, 0, 0, 0]);
        assert_eq!(rgba[7], 255);
    }

    #[test]
    fn degenerate_scale_maps_to_middle() {
        assert_eq!(ColorScale::new(3.0, 3.0).normalize(10.0), 0.5);
        assert_eq!(ColorScale::new(0.0, 10.0).normalize(20.0), 1.0);
    }
}
