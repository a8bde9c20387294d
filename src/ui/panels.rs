use std::path::PathBuf;

use eframe::egui::{self, Color32, RichText, ScrollArea, Ui};
use egui_extras::{Column, TableBuilder};

use crate::calib::background::BandLimits;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Left side panel – the calibration recipe
// ---------------------------------------------------------------------------

/// Render the left recipe panel.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Calibration");
    ui.separator();

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            background_section(ui, state);
            extraction_section(ui, state);
            lines_section(ui, state);
            viewers_section(ui, state);
        });
}

fn background_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("1. Sky background").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            let Some(rows) = state.frame.as_ref().map(|f| f.rows()) else {
                ui.label("No frame loaded.");
                return;
            };
            let mut lab_limits = state.settings.band_limits == Some(BandLimits::lab_frame());
            if ui
                .checkbox(&mut lab_limits, "Lab detector limits (0–63, 73–135)")
                .changed()
            {
                state.settings.band_limits = lab_limits.then(BandLimits::lab_frame);
            }
            let limits = state.settings.band_limits_for(rows);
            ui.label(format!(
                "Band 1 within {}..={}, band 2 within {}..={}",
                limits.band1.0, limits.band1.1, limits.band2.0, limits.band2.1
            ));

            let b = &mut state.bounds;
            egui::Grid::new("band_bounds").show(ui, |ui: &mut Ui| {
                ui.label("Band 1");
                ui.add(egui::DragValue::new(&mut b.y1).range(0..=rows).prefix("y1 "));
                ui.add(egui::DragValue::new(&mut b.y2).range(0..=rows).prefix("y2 "));
                ui.end_row();
                ui.label("Band 2");
                ui.add(egui::DragValue::new(&mut b.y3).range(0..=rows).prefix("y3 "));
                ui.add(egui::DragValue::new(&mut b.y4).range(0..=rows).prefix("y4 "));
                ui.end_row();
            });

            if ui.button("Fit and subtract background").clicked() {
                let result = state.run_background();
                state.report("Background", result);
            }
        });
}

fn extraction_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("2. Extract spectrum").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            let Some(rows) = state.frame.as_ref().map(|f| f.rows()) else {
                ui.label("Load a frame, or open a 1D spectrum directly.");
                return;
            };
            ui.horizontal(|ui: &mut Ui| {
                ui.label("Rows");
                ui.add(egui::DragValue::new(&mut state.extract_rows.0).range(0..=rows));
                ui.label("to");
                ui.add(egui::DragValue::new(&mut state.extract_rows.1).range(0..=rows));
            });
            let source = if state.subtracted.is_some() {
                "background-subtracted frame"
            } else {
                "raw frame"
            };
            ui.small(format!("Summing the {source}"));
            if ui.button("Extract").clicked() {
                let result = state.extract_spectrum();
                state.report("Extraction", result);
            }
        });
}

fn lines_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("3. Arc lines").strong())
        .default_open(true)
        .show(ui, |ui: &mut Ui| {
            if state.lines.is_empty() {
                ui.label("No line list loaded.");
            } else {
                line_table(ui, state);
            }

            ui.horizontal(|ui: &mut Ui| {
                ui.label("Window half-width");
                ui.add(egui::DragValue::new(&mut state.settings.centroid_half_width).range(2..=50));
            });
            ui.horizontal(|ui: &mut Ui| {
                if ui.button("Refine centroids").clicked() {
                    let result = state.refine_lines();
                    state.report("Centroids", result);
                }
                if ui.button("Calibrate").clicked() {
                    let result = state.calibrate();
                    state.report("Calibration", result);
                }
            });

            if let Some(solution) = &state.solution {
                ui.label(RichText::new(solution.rms_label()).strong());
                let c = solution.polynomial.coefficients();
                ui.small(format!(
                    "λ = {:.4} + {:.4e}·p + {:.4e}·p² + {:.4e}·p³",
                    c[0], c[1], c[2], c[3]
                ));
            }
        });
}

fn line_table(ui: &mut Ui, state: &AppState) {
    let refined = state.refined.as_deref();
    let solution = state.solution.as_ref();
    TableBuilder::new(ui)
        .striped(true)
        .max_scroll_height(220.0)
        .column(Column::auto())
        .column(Column::auto())
        .column(Column::auto())
        .column(Column::auto())
        .column(Column::remainder())
        .header(18.0, |mut header| {
            header.col(|ui| {
                ui.strong("#");
            });
            header.col(|ui| {
                ui.strong("pixel");
            });
            header.col(|ui| {
                ui.strong("λ (Å)");
            });
            header.col(|ui| {
                ui.strong("centroid");
            });
            header.col(|ui| {
                ui.strong("Δλ");
            });
        })
        .body(|mut body| {
            for (i, line) in state.lines.lines.iter().enumerate() {
                body.row(18.0, |mut row| {
                    row.col(|ui| {
                        ui.label(i.to_string());
                    });
                    row.col(|ui| {
                        ui.label(format!("{:.1}", line.pixel));
                    });
                    row.col(|ui| {
                        ui.label(line.display_label());
                    });
                    let centroid = refined.and_then(|r| r.get(i)).copied();
                    row.col(|ui| {
                        match centroid {
                            Some(c) => ui.label(format!("{c:.3}")),
                            None => ui.weak("–"),
                        };
                    });
                    row.col(|ui| {
                        match centroid.zip(solution) {
                            Some((c, s)) => {
                                ui.label(format!("{:+.3}", s.wavelength_at(c) - line.wavelength))
                            }
                            None => ui.weak("–"),
                        };
                    });
                });
            }
        });
}

fn viewers_section(ui: &mut Ui, state: &mut AppState) {
    egui::CollapsingHeader::new(RichText::new("Image viewers").strong())
        .default_open(false)
        .show(ui, |ui: &mut Ui| {
            if state.views.is_empty() {
                ui.label("Open a frame to inspect it.");
                return;
            }
            for view in &mut state.views {
                ui.checkbox(&mut view.open, &view.title);
            }
        });
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the top menu / toolbar.
pub fn top_bar(ui: &mut Ui, state: &mut AppState) {
    egui::menu::bar(ui, |ui: &mut Ui| {
        ui.menu_button("File", |ui: &mut Ui| {
            if ui.button("Open frame…").clicked() {
                ui.close_menu();
                if let Some(path) = pick_file("Open 2D frame", &["parquet", "pq", "json", "csv"]) {
                    let result = state.load_frame(&path);
                    state.report("Open frame", result);
                }
            }
            if ui.button("Open spectrum…").clicked() {
                ui.close_menu();
                if let Some(path) = pick_file("Open 1D spectrum", &["parquet", "pq", "json", "csv"]) {
                    let result = state.load_spectrum(&path);
                    state.report("Open spectrum", result);
                }
            }
            if ui.button("Open line list…").clicked() {
                ui.close_menu();
                if let Some(path) = pick_file("Open arc line list", &["csv", "json"]) {
                    let result = state.load_line_list(&path);
                    state.report("Open line list", result);
                }
            }
            if ui.button("Load settings…").clicked() {
                ui.close_menu();
                if let Some(path) = pick_file("Load settings", &["json"]) {
                    let result = state.load_settings(&path);
                    state.report("Load settings", result);
                }
            }
            ui.separator();
            let can_export = state.wavelength_axis.is_some();
            if ui
                .add_enabled(can_export, egui::Button::new("Export calibrated spectrum…"))
                .clicked()
            {
                ui.close_menu();
                if let Some(path) = save_file("Export calibrated spectrum", "calibrated.csv", "csv") {
                    let result = state.export_calibrated(&path);
                    state.report("Export", result);
                }
            }
        });

        ui.separator();

        if let Some(frame) = &state.frame {
            let (rows, cols) = frame.shape();
            ui.label(format!("frame {rows}×{cols}"));
        }
        if let Some(spectrum) = &state.spectrum {
            ui.label(format!("spectrum {} px", spectrum.len()));
        }
        if !state.lines.is_empty() {
            ui.label(format!("{} lines", state.lines.len()));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// File dialogs
// ---------------------------------------------------------------------------

pub fn pick_file(title: &str, extensions: &[&str]) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title(title)
        .add_filter("Supported files", extensions)
        .pick_file()
}

pub fn save_file(title: &str, default_name: &str, extension: &str) -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title(title)
        .set_file_name(default_name)
        .add_filter(extension, &[extension])
        .save_file()
}
