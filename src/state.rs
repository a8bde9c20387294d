use std::path::Path;

use anyhow::{Context, Result, bail};

use crate::calib::background::{BandBounds, estimate_background};
use crate::calib::centroid::refine_centroids;
use crate::calib::wavelength::{WavelengthSolution, calibrate};
use crate::data::export;
use crate::data::loader;
use crate::data::model::{LineList, SpectralImage, Spectrum};
use crate::settings::LabSettings;
use crate::view::ImageView;

const BACKGROUND_VIEW: &str = "Background model";
const SUBTRACTED_VIEW: &str = "Background subtracted";

// ---------------------------------------------------------------------------
// Application state
// ---------------------------------------------------------------------------

/// Which plot the central panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotTab {
    Lines,
    Residuals,
    Calibrated,
}

/// The full UI state, independent of rendering.
pub struct AppState {
    pub settings: LabSettings,

    /// Loaded 2D frame (None until the user loads one).
    pub frame: Option<SpectralImage>,

    /// Background band boundaries edited in the side panel.
    pub bounds: BandBounds,

    /// Fitted sky model and the frame with it removed.
    pub background: Option<SpectralImage>,
    pub subtracted: Option<SpectralImage>,

    /// Rows summed into the 1D spectrum, `extract_rows.0..extract_rows.1`.
    pub extract_rows: (usize, usize),

    /// 1D arc spectrum, loaded or extracted.
    pub spectrum: Option<Spectrum>,

    pub lines: LineList,

    /// Gaussian centroids, parallel to `lines`.
    pub refined: Option<Vec<f64>>,

    pub solution: Option<WavelengthSolution>,
    pub wavelength_axis: Option<Vec<f64>>,

    /// Image viewers, addressed by index. Closed viewers stay in place so
    /// indices remain stable and they can be reopened.
    pub views: Vec<ImageView>,

    pub tab: PlotTab,

    /// Status / error message shown in the UI.
    pub status_message: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            settings: LabSettings::default(),
            frame: None,
            bounds: BandBounds::new(0, 63, 73, 135),
            background: None,
            subtracted: None,
            extract_rows: (64, 73),
            spectrum: None,
            lines: LineList::default(),
            refined: None,
            solution: None,
            wavelength_axis: None,
            views: Vec::new(),
            tab: PlotTab::Lines,
            status_message: None,
        }
    }
}

impl AppState {
    /// Log and surface the outcome of a user action.
    pub fn report(&mut self, action: &str, result: Result<()>) {
        match result {
            Ok(()) => self.status_message = None,
            Err(e) => {
                log::error!("{action} failed: {e:#}");
                self.status_message = Some(format!("{action}: {e:#}"));
            }
        }
    }

    // ---- loading ----

    pub fn load_frame(&mut self, path: &Path) -> Result<()> {
        let frame = loader::load_image(path)
            .with_context(|| format!("loading frame {}", path.display()))?;
        let (rows, cols) = frame.shape();
        log::info!("Loaded {rows}x{cols} frame from {}", path.display());

        let view = ImageView::full(
            file_title(path),
            frame.clone(),
            self.settings.max_recorded_clicks,
        );
        self.set_frame(frame);
        self.open_view(view);
        Ok(())
    }

    /// Replace the frame and drop everything derived from it.
    pub fn set_frame(&mut self, frame: SpectralImage) {
        let rows = frame.rows();
        let mid = rows / 2;
        self.extract_rows = (mid.saturating_sub(4), (mid + 5).min(rows));
        self.frame = Some(frame);
        self.background = None;
        self.subtracted = None;
    }

    pub fn load_spectrum(&mut self, path: &Path) -> Result<()> {
        let spectrum = loader::load_spectrum(path)
            .with_context(|| format!("loading spectrum {}", path.display()))?;
        log::info!("Loaded spectrum of {} samples", spectrum.len());
        self.set_spectrum(spectrum);
        Ok(())
    }

    pub fn set_spectrum(&mut self, spectrum: Spectrum) {
        self.spectrum = Some(spectrum);
        self.refined = None;
        self.solution = None;
        self.wavelength_axis = None;
    }

    pub fn load_line_list(&mut self, path: &Path) -> Result<()> {
        let lines = loader::load_line_list(path)
            .with_context(|| format!("loading line list {}", path.display()))?;
        log::info!("Loaded {} arc lines", lines.len());
        self.lines = lines;
        self.refined = None;
        self.solution = None;
        self.wavelength_axis = None;
        Ok(())
    }

    pub fn load_settings(&mut self, path: &Path) -> Result<()> {
        self.settings = LabSettings::load(path)?;
        Ok(())
    }

    // ---- calibration recipe ----

    /// Fit the sky background and subtract it from the frame.
    pub fn run_background(&mut self) -> Result<()> {
        let frame = self.frame.as_ref().context("no frame loaded")?;
        let limits = self.settings.band_limits_for(frame.rows());
        let background = estimate_background(frame, &self.bounds, &limits)?;
        let subtracted = frame.subtract(&background)?;
        log::info!(
            "Background fitted with bands {}..{} and {}..{}",
            self.bounds.y1,
            self.bounds.y2,
            self.bounds.y3,
            self.bounds.y4
        );

        let max_clicks = self.settings.max_recorded_clicks;
        self.replace_view(ImageView::full(BACKGROUND_VIEW, background.clone(), max_clicks));
        self.replace_view(ImageView::full(SUBTRACTED_VIEW, subtracted.clone(), max_clicks));
        self.background = Some(background);
        self.subtracted = Some(subtracted);
        Ok(())
    }

    /// Collapse `extract_rows` of the (background-subtracted) frame.
    pub fn extract_spectrum(&mut self) -> Result<()> {
        let source = self
            .subtracted
            .as_ref()
            .or(self.frame.as_ref())
            .context("no frame loaded")?;
        let (lo, hi) = self.extract_rows;
        let spectrum = source.collapse_rows(lo, hi)?;
        log::info!("Extracted rows {lo}..{hi} into {} samples", spectrum.len());
        self.set_spectrum(spectrum);
        Ok(())
    }

    /// Gaussian centroid for every line of the list.
    pub fn refine_lines(&mut self) -> Result<()> {
        let spectrum = self.spectrum.as_ref().context("no spectrum loaded")?;
        if self.lines.is_empty() {
            bail!("the line list is empty");
        }
        let refined = refine_centroids(
            &spectrum.intensity,
            &self.lines.pixels(),
            self.settings.centroid_half_width,
        )?;
        log::info!("Refined {} line centroids", refined.len());
        self.refined = Some(refined);
        Ok(())
    }

    /// Refine the lines with the current window and fit the wavelength solution.
    pub fn calibrate(&mut self) -> Result<()> {
        self.refine_lines()?;
        let spectrum = self.spectrum.as_ref().context("no spectrum loaded")?;
        let refined = self.refined.as_ref().context("no refined centroids")?;

        let (solution, axis) =
            calibrate(refined, &self.lines.wavelengths(), &spectrum.pixel_axis())?;
        self.solution = Some(solution);
        self.wavelength_axis = Some(axis);
        self.tab = PlotTab::Residuals;
        Ok(())
    }

    /// Positions to annotate: refined centroids when present.
    pub fn marker_positions(&self) -> Vec<f64> {
        self.refined.clone().unwrap_or_else(|| self.lines.pixels())
    }

    // ---- image viewers ----

    pub fn open_view(&mut self, view: ImageView) -> usize {
        self.views.push(view);
        self.views.len() - 1
    }

    /// Swap in `view` for the viewer with the same title, keeping its index.
    pub fn replace_view(&mut self, view: ImageView) -> usize {
        match self.views.iter().position(|v| v.title == view.title) {
            Some(idx) => {
                self.views[idx] = view;
                idx
            }
            None => self.open_view(view),
        }
    }

    /// Open a cutout grid around the coordinates recorded in view `index`.
    pub fn open_cutouts(&mut self, index: usize) -> Result<usize> {
        let view = self.views.get(index).context("no such viewer")?;
        let source = view.image().context("cutouts need a full-frame viewer")?;
        if view.clicks.is_empty() {
            bail!("double-click on stars in '{}' first", view.title);
        }
        let centres: Vec<[f64; 2]> = view.clicks.iter().copied().collect();
        let cutouts = ImageView::cutouts(
            format!("{} – cutouts", view.title),
            source,
            centres,
            self.settings.cutout_half_size,
            self.settings.cutout_columns,
        );
        Ok(self.open_view(cutouts))
    }

    // ---- export ----

    pub fn export_calibrated(&self, path: &Path) -> Result<()> {
        let spectrum = self.spectrum.as_ref().context("no spectrum loaded")?;
        let axis = self
            .wavelength_axis
            .as_ref()
            .context("calibrate the spectrum first")?;
        export::write_calibrated_csv(path, spectrum, axis)
    }
}

fn file_title(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".to_string())
}
