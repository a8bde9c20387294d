use eframe::egui::{self, Align2, Color32, RichText, Ui};
use egui_plot::{HLine, Legend, Line, LineStyle, MarkerShape, Plot, PlotPoint, PlotPoints, Points, Text};

use crate::calib::annotate::{MarkerHeights, layout_markers};
use crate::color::generate_palette;
use crate::state::{AppState, PlotTab};

// ---------------------------------------------------------------------------
// Central panel: tab strip + the selected plot
// ---------------------------------------------------------------------------

pub fn central_panel(ui: &mut Ui, state: &mut AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.selectable_value(&mut state.tab, PlotTab::Lines, "Arc lines");
        ui.selectable_value(&mut state.tab, PlotTab::Residuals, "Residuals");
        ui.selectable_value(&mut state.tab, PlotTab::Calibrated, "Calibrated spectrum");
        if state.tab == PlotTab::Lines {
            ui.separator();
            ui.label("Label size");
            ui.add(egui::Slider::new(&mut state.settings.label_font_size, 8.0..=24.0));
        }
    });
    ui.separator();

    match state.tab {
        PlotTab::Lines => lines_plot(ui, state),
        PlotTab::Residuals => residual_plot(ui, state),
        PlotTab::Calibrated => calibrated_plot(ui, state),
    }
}

fn placeholder(ui: &mut Ui, text: &str) {
    ui.centered_and_justified(|ui: &mut Ui| {
        ui.heading(text);
    });
}

// ---------------------------------------------------------------------------
// Arc spectrum with line identifications
// ---------------------------------------------------------------------------

/// Arc spectrum with each identified line labelled above the trace.
pub fn lines_plot(ui: &mut Ui, state: &AppState) {
    let Some(spectrum) = &state.spectrum else {
        placeholder(ui, "Open or extract a spectrum  (File → Open spectrum…)");
        return;
    };

    let max = spectrum.max().unwrap_or(1.0);
    let min = spectrum
        .intensity
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(0.0, f64::min);
    let heights = MarkerHeights::above(max);
    // keep labels roughly one label-width apart at full zoom
    let spacing = spectrum.len() as f64 / 45.0;
    let markers = layout_markers(&state.marker_positions(), &state.lines.labels(), spacing);
    let colors = generate_palette(markers.len());
    let font_size = state.settings.label_font_size;

    Plot::new("arc_lines")
        .legend(Legend::default())
        .x_axis_label("Pixel")
        .y_axis_label("Counts")
        .include_y(min)
        .include_y(1.2 * max)
        .allow_boxed_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(PlotPoints::from_ys_f64(&spectrum.intensity))
                    .name("arc spectrum")
                    .color(Color32::LIGHT_BLUE)
                    .width(1.5),
            );

            for (marker, color) in markers.iter().zip(colors) {
                let connector = vec![
                    [marker.x, heights.tip],
                    [marker.x, heights.bend],
                    [marker.label_x, heights.shoulder],
                    [marker.label_x, heights.label],
                ];
                plot_ui.line(Line::new(connector).color(color).width(1.0));
                plot_ui.text(
                    Text::new(
                        PlotPoint::new(marker.label_x, heights.label),
                        RichText::new(&marker.label).size(font_size),
                    )
                    .color(color)
                    .anchor(Align2::CENTER_BOTTOM),
                );
            }
        });
}

// ---------------------------------------------------------------------------
// Calibration residuals
// ---------------------------------------------------------------------------

/// Residual (predicted − input) against input wavelength.
pub fn residual_plot(ui: &mut Ui, state: &AppState) {
    let Some(solution) = &state.solution else {
        placeholder(ui, "Calibrate to see the fit residuals");
        return;
    };

    ui.label(RichText::new("Residuals of the wavelength calibration fit").strong());
    let points: Vec<[f64; 2]> = solution
        .residuals
        .iter()
        .map(|r| [r.wavelength, r.residual])
        .collect();
    let marker_color = ui.visuals().text_color();

    Plot::new("calibration_residuals")
        .legend(Legend::default())
        .x_axis_label("Input wavelength (Å)")
        .y_axis_label("Residual (Å)")
        .show(ui, |plot_ui| {
            plot_ui.hline(
                HLine::new(0.0)
                    .color(Color32::GRAY)
                    .style(LineStyle::dashed_loose()),
            );
            plot_ui.points(
                Points::new(points)
                    .shape(MarkerShape::Plus)
                    .radius(6.0)
                    .color(marker_color)
                    .name(solution.rms_label()),
            );
        });
}

// ---------------------------------------------------------------------------
// Spectrum on the calibrated wavelength axis
// ---------------------------------------------------------------------------

pub fn calibrated_plot(ui: &mut Ui, state: &AppState) {
    let (Some(spectrum), Some(axis)) = (&state.spectrum, &state.wavelength_axis) else {
        placeholder(ui, "Calibrate to see the spectrum against wavelength");
        return;
    };

    let points: PlotPoints = axis
        .iter()
        .zip(&spectrum.intensity)
        .map(|(&w, &y)| [w, y])
        .collect();

    Plot::new("calibrated_spectrum")
        .x_axis_label("Wavelength (Å)")
        .y_axis_label("Counts")
        .allow_boxed_zoom(true)
        .show(ui, |plot_ui| {
            plot_ui.line(Line::new(points).color(Color32::LIGHT_BLUE).width(1.5));
        });
}
