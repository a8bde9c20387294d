use std::collections::VecDeque;

use anyhow::{Context, Result, bail};
use eframe::egui::TextureHandle;

use crate::calib::zscale::zscale_limits;
use crate::color::ColorScale;
use crate::data::model::SpectralImage;

// ---------------------------------------------------------------------------
// Per-image view state
// ---------------------------------------------------------------------------

/// What an image viewer shows.
#[derive(Debug, Clone)]
pub enum ViewContent {
    /// The whole frame, with pan/zoom, crosshair and click capture.
    Full(SpectralImage),
    /// Fixed-size cutouts centred on star coordinates, drawn as a grid.
    Cutouts {
        centres: Vec<[f64; 2]>,
        cutouts: Vec<SpectralImage>,
        columns: usize,
    },
}

/// View state of one image window. Windows live in an ordered `Vec` on the
/// application state and are addressed by index.
pub struct ImageView {
    pub title: String,
    pub content: ViewContent,
    pub scale: ColorScale,
    /// Range of the colour-bar sliders.
    pub slider_bounds: (f64, f64),
    /// Text fields used to move the slider bounds.
    pub bound_inputs: (String, String),
    pub crosshair: bool,
    pub clicks: VecDeque<[f64; 2]>,
    pub max_clicks: usize,
    pub open: bool,
    /// Textures are rebuilt by the UI when this is set.
    pub dirty: bool,
    pub textures: Vec<TextureHandle>,
}

impl ImageView {
    pub fn full(title: impl Into<String>, image: SpectralImage, max_clicks: usize) -> Self {
        let values = image.finite_values();
        Self::with_values(title.into(), ViewContent::Full(image), &values, max_clicks)
    }

    /// Cutouts of `2 * half` pixels around each `[x, y]` of `centres`.
    pub fn cutouts(
        title: impl Into<String>,
        source: &SpectralImage,
        centres: Vec<[f64; 2]>,
        half: usize,
        columns: usize,
    ) -> Self {
        let cutouts: Vec<SpectralImage> = centres
            .iter()
            .map(|&[x, y]| source.cutout(x, y, half))
            .collect();
        let values: Vec<f64> = cutouts.iter().flat_map(|c| c.finite_values()).collect();
        let content = ViewContent::Cutouts {
            centres,
            cutouts,
            columns: columns.max(1),
        };
        Self::with_values(title.into(), content, &values, 0)
    }

    fn with_values(title: String, content: ViewContent, values: &[f64], max_clicks: usize) -> Self {
        let (lo, hi) = zscale_limits(values).unwrap_or((0.0, 1.0));
        let (min, max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(a, b), &v| {
                (a.min(v), b.max(v))
            });
        let slider_bounds = if min.is_finite() && max > min {
            (min, max)
        } else {
            (lo - 1.0, hi + 1.0)
        };
        Self {
            title,
            content,
            scale: ColorScale::new(lo.min(hi), hi.max(lo)),
            slider_bounds,
            bound_inputs: (format!("{:.0}", slider_bounds.0), format!("{:.0}", slider_bounds.1)),
            crosshair: true,
            clicks: VecDeque::new(),
            max_clicks,
            open: true,
            dirty: true,
            textures: Vec::new(),
        }
    }

    pub fn image(&self) -> Option<&SpectralImage> {
        match &self.content {
            ViewContent::Full(img) => Some(img),
            ViewContent::Cutouts { .. } => None,
        }
    }

    /// Append a clicked coordinate rounded to two decimals, dropping the
    /// oldest entries beyond `max_clicks`.
    pub fn record_click(&mut self, x: f64, y: f64) {
        if self.max_clicks == 0 {
            return;
        }
        let round = |v: f64| (v * 100.0).round() / 100.0;
        self.clicks.push_back([round(x), round(y)]);
        while self.clicks.len() > self.max_clicks {
            self.clicks.pop_front();
        }
        log::debug!("{}: recorded ({x:.2}, {y:.2})", self.title);
    }

    pub fn clear_clicks(&mut self) {
        self.clicks.clear();
    }

    /// Move the colour range, keeping `lo <= hi`.
    pub fn set_range(&mut self, lo: f64, hi: f64) {
        let scale = ColorScale::new(lo.min(hi), hi.max(lo));
        if scale != self.scale {
            self.scale = scale;
            self.dirty = true;
        }
    }

    /// Parse the bound text fields into new slider bounds and clamp the
    /// current colour range into them.
    pub fn apply_bound_inputs(&mut self) -> Result<()> {
        let lo: f64 = self
            .bound_inputs
            .0
            .trim()
            .parse()
            .with_context(|| format!("'{}' is not a number", self.bound_inputs.0))?;
        let hi: f64 = self
            .bound_inputs
            .1
            .trim()
            .parse()
            .with_context(|| format!("'{}' is not a number", self.bound_inputs.1))?;
        if !(lo < hi) {
            bail!("colour bar minimum {lo} must be below maximum {hi}");
        }
        self.slider_bounds = (lo, hi);
        self.set_range(self.scale.lo.clamp(lo, hi), self.scale.hi.clamp(lo, hi));
        Ok(())
    }

    /// Pixel value under plot coordinate `(x, y)` of a full view.
    pub fn value_at(&self, x: f64, y: f64) -> Option<f64> {
        let img = self.image()?;
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let (col, row) = (x as usize, y as usize);
        (row < img.rows() && col < img.cols()).then(|| img.get(row, col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field() -> SpectralImage {
        SpectralImage::from_fn(50, 80, |r, c| 100.0 + ((r * 7 + c * 3) % 11) as f64)
    }

    #[test]
    fn click_log_is_bounded_and_rounded() {
        let mut view = ImageView::full("field", field(), 3);
        for i in 0..5 {
            view.record_click(i as f64 + 0.123, 2.0 * i as f64 + 0.456);
        }
        assert_eq!(view.clicks.len(), 3);
        assert_eq!(view.clicks.front(), Some(&[2.12, 4.46]));
        assert_eq!(view.clicks.back(), Some(&[4.12, 8.46]));
    }

    #[test]
    fn colour_range_starts_inside_data() {
        let view = ImageView::full("field", field(), 35);
        assert!(view.scale.lo >= 100.0 && view.scale.hi <= 110.0);
        assert_eq!(view.slider_bounds, (100.0, 110.0));
        assert!(view.dirty);
    }

    #[test]
    fn bound_inputs_clamp_the_range() {
        let mut view = ImageView::full("field", field(), 35);
        view.bound_inputs = ("103".into(), "105".into());
        view.apply_bound_inputs().unwrap();
        assert_eq!(view.slider_bounds, (103.0, 105.0));
        assert!(view.scale.lo >= 103.0 && view.scale.hi <= 105.0);

        view.bound_inputs = ("9".into(), "x".into());
        assert!(view.apply_bound_inputs().is_err());
        view.bound_inputs = ("9".into(), "2".into());
        assert!(view.apply_bound_inputs().is_err());
    }

    #[test]
    fn cutout_view_keeps_one_frame_per_star() {
        let view = ImageView::cutouts("stars", &field(), vec![[10.0, 10.0], [70.0, 45.0]], 5, 5);
        match &view.content {
            ViewContent::Cutouts { cutouts, .. } => {
                assert_eq!(cutouts.len(), 2);
                assert_eq!(cutouts[1].shape(), (10, 10));
            }
            ViewContent::Full(_) => panic!("expected cutouts"),
        }
        assert!(view.image().is_none());
    }

    #[test]
    fn value_lookup_uses_column_then_row() {
        let view = ImageView::full("field", field(), 35);
        assert_eq!(view.value_at(3.7, 2.2), Some(field().get(2, 3)));
        assert_eq!(view.value_at(-1.0, 2.0), None);
        assert_eq!(view.value_at(80.0, 2.0), None);
    }
}
