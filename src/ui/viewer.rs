use eframe::egui::{self, Color32, ColorImage, Context, RichText, ScrollArea, Sense, TextureOptions, Ui};
use egui_plot::{HLine, MarkerShape, Plot, PlotImage, PlotPoint, Points, VLine};

use crate::color::{ColorScale, render_rgba, viridis};
use crate::data::export;
use crate::state::AppState;
use crate::ui::panels::save_file;
use crate::view::{ImageView, ViewContent};

/// Side of one cutout tile, in points.
const TILE_SIZE: f32 = 150.0;

/// What a viewer window asked the application to do this frame.
enum ViewAction {
    Cutouts(usize),
    Failed(&'static str, anyhow::Error),
}

// ---------------------------------------------------------------------------
// Image viewer windows
// ---------------------------------------------------------------------------

/// Draw one floating window per open view.
pub fn show_views(ctx: &Context, state: &mut AppState) {
    let mut actions = Vec::new();

    for (idx, view) in state.views.iter_mut().enumerate() {
        if !view.open {
            continue;
        }
        ensure_textures(ctx, idx, view);

        let mut open = view.open;
        egui::Window::new(view.title.clone())
            .id(egui::Id::new(("image_view", idx)))
            .open(&mut open)
            .default_size([680.0, 520.0])
            .show(ctx, |ui: &mut Ui| {
                colour_controls(ui, view, &mut actions);
                ui.separator();
                let is_full = matches!(view.content, ViewContent::Full(_));
                if is_full {
                    full_view(ui, idx, view, &mut actions);
                } else {
                    cutout_grid(ui, idx, view);
                }
            });
        view.open = open;
    }

    for action in actions {
        match action {
            ViewAction::Cutouts(idx) => {
                let result = state.open_cutouts(idx).map(|_| ());
                state.report("Cutouts", result);
            }
            ViewAction::Failed(what, e) => state.report(what, Err(e)),
        }
    }
}

/// (Re)upload the view's textures after a colour range change.
fn ensure_textures(ctx: &Context, idx: usize, view: &mut ImageView) {
    if !view.dirty && !view.textures.is_empty() {
        return;
    }
    let frames: Vec<_> = match &view.content {
        ViewContent::Full(img) => vec![img],
        ViewContent::Cutouts { cutouts, .. } => cutouts.iter().collect(),
    };
    let scale = view.scale;
    view.textures = frames
        .iter()
        .enumerate()
        .map(|(k, img)| {
            let rgba = render_rgba(img, &scale);
            let image = ColorImage::from_rgba_unmultiplied([img.cols(), img.rows()], &rgba);
            ctx.load_texture(format!("view-{idx}-{k}"), image, TextureOptions::NEAREST)
        })
        .collect();
    view.dirty = false;
}

// ---------------------------------------------------------------------------
// Colour bar
// ---------------------------------------------------------------------------

fn colour_controls(ui: &mut Ui, view: &mut ImageView, actions: &mut Vec<ViewAction>) {
    let (b0, b1) = view.slider_bounds;
    let (mut lo, mut hi) = (view.scale.lo, view.scale.hi);
    ui.horizontal(|ui: &mut Ui| {
        ui.add(egui::Slider::new(&mut lo, b0..=b1).text("min"));
        ui.add(egui::Slider::new(&mut hi, b0..=b1).text("max"));
    });
    view.set_range(lo, hi);

    ui.horizontal(|ui: &mut Ui| {
        ui.label("Colour bar range");
        ui.add(egui::TextEdit::singleline(&mut view.bound_inputs.0).desired_width(70.0));
        ui.add(egui::TextEdit::singleline(&mut view.bound_inputs.1).desired_width(70.0));
        if ui.button("Update colour bar").clicked() {
            if let Err(e) = view.apply_bound_inputs() {
                actions.push(ViewAction::Failed("Colour bar", e));
            }
        }
    });

    colour_bar(ui, &view.scale);
}

/// Horizontal viridis strip labelled with the current limits.
fn colour_bar(ui: &mut Ui, scale: &ColorScale) {
    ui.horizontal(|ui: &mut Ui| {
        ui.label(format!("{:.1}", scale.lo));
        let (rect, _) = ui.allocate_exact_size(egui::vec2(240.0, 12.0), Sense::hover());
        let steps = 64;
        let width = rect.width() / steps as f32;
        for i in 0..steps {
            let x = rect.left() + i as f32 * width;
            let strip = egui::Rect::from_min_max(
                egui::pos2(x, rect.top()),
                egui::pos2(x + width + 0.5, rect.bottom()),
            );
            ui.painter()
                .rect_filled(strip, 0.0, viridis(i as f32 / (steps - 1) as f32));
        }
        ui.label(format!("{:.1}", scale.hi));
    });
}

// ---------------------------------------------------------------------------
// Full frame: pan/zoom, crosshair, double-click capture
// ---------------------------------------------------------------------------

fn full_view(ui: &mut Ui, idx: usize, view: &mut ImageView, actions: &mut Vec<ViewAction>) {
    let Some((rows, cols)) = view.image().map(|img| img.shape()) else {
        return;
    };
    let Some(texture) = view.textures.first().map(|t| t.id()) else {
        return;
    };

    ui.horizontal(|ui: &mut Ui| {
        ui.checkbox(&mut view.crosshair, "Crosshair");
        if ui.button("Clear clicks").clicked() {
            view.clear_clicks();
        }
        if ui.button("Cutouts of clicked stars").clicked() {
            actions.push(ViewAction::Cutouts(idx));
        }
        if ui.button("Export PNG…").clicked() {
            if let Some(path) = save_file("Export frame", "frame.png", "png") {
                if let Some(img) = view.image() {
                    let rgba = render_rgba(img, &view.scale);
                    if let Err(e) = export::write_png(&path, cols, rows, rgba) {
                        actions.push(ViewAction::Failed("Export PNG", e));
                    }
                }
            }
        }
    });
    ui.small("Double-click to record a pixel coordinate.");

    ui.columns(2, |columns: &mut [Ui]| {
        let clicks: Vec<[f64; 2]> = view.clicks.iter().copied().collect();
        let crosshair = view.crosshair;

        let plot = Plot::new(("image_plot", idx))
            .data_aspect(1.0)
            .allow_double_click_reset(false)
            .allow_boxed_zoom(true)
            .height(columns[0].available_height().max(240.0))
            .show(&mut columns[0], |plot_ui| {
                plot_ui.image(PlotImage::new(
                    texture,
                    PlotPoint::new(cols as f64 / 2.0, rows as f64 / 2.0),
                    egui::vec2(cols as f32, rows as f32),
                ));
                if !clicks.is_empty() {
                    plot_ui.points(
                        Points::new(clicks)
                            .shape(MarkerShape::Cross)
                            .radius(5.0)
                            .color(Color32::RED),
                    );
                }
                let pointer = plot_ui.pointer_coordinate();
                if let (true, Some(p)) = (crosshair, pointer) {
                    let c = Color32::from_white_alpha(140);
                    plot_ui.vline(VLine::new(p.x).color(c).width(1.0));
                    plot_ui.hline(HLine::new(p.y).color(c).width(1.0));
                }
                pointer
            });

        if plot.response.double_clicked() {
            if let Some(pos) = plot.response.interact_pointer_pos() {
                let p = plot.transform.value_from_position(pos);
                view.record_click(p.x, p.y);
            }
        }

        let ui = &mut columns[1];
        if let Some(p) = plot.inner {
            let value = view
                .value_at(p.x, p.y)
                .map(|v| format!("{v:.1}"))
                .unwrap_or_else(|| "–".into());
            ui.label(format!("({:.0}, {:.0})  value {value}", p.x, p.y));
        }
        click_log(ui, view);
    });
}

/// Recorded x and y columns, newest last.
fn click_log(ui: &mut Ui, view: &ImageView) {
    ui.horizontal(|ui: &mut Ui| {
        ui.strong(format!("Clicks ({}/{})", view.clicks.len(), view.max_clicks));
        if ui.small_button("Copy").clicked() {
            let text: String = view
                .clicks
                .iter()
                .map(|[x, y]| format!("{x}, {y}\n"))
                .collect();
            ui.ctx().copy_text(text);
        }
    });
    ScrollArea::vertical()
        .id_salt("click_log")
        .auto_shrink([false, true])
        .show(ui, |ui: &mut Ui| {
            egui::Grid::new("click_grid").striped(true).show(ui, |ui: &mut Ui| {
                ui.label(RichText::new("x").strong());
                ui.label(RichText::new("y").strong());
                ui.end_row();
                for [x, y] in &view.clicks {
                    ui.label(format!("{x:.2}"));
                    ui.label(format!("{y:.2}"));
                    ui.end_row();
                }
            });
        });
}

// ---------------------------------------------------------------------------
// Cutout grid
// ---------------------------------------------------------------------------

fn cutout_grid(ui: &mut Ui, idx: usize, view: &ImageView) {
    let ViewContent::Cutouts {
        centres,
        cutouts,
        columns,
    } = &view.content
    else {
        return;
    };

    ScrollArea::both().show(ui, |ui: &mut Ui| {
        egui::Grid::new(("cutout_grid", idx)).show(ui, |ui: &mut Ui| {
            for (k, ((texture, centre), cutout)) in view
                .textures
                .iter()
                .zip(centres)
                .zip(cutouts)
                .enumerate()
            {
                let size = cutout.cols() as f64;
                let half = size / 2.0;
                let cross = [half + centre[0].fract(), half + centre[1].fract()];

                ui.vertical(|ui: &mut Ui| {
                    ui.small(format!("#{k}  ({:.1}, {:.1})", centre[0], centre[1]));
                    Plot::new(("cutout", idx, k))
                        .width(TILE_SIZE)
                        .height(TILE_SIZE)
                        .data_aspect(1.0)
                        .show_axes(false)
                        .show_grid(false)
                        .allow_drag(false)
                        .allow_zoom(false)
                        .allow_scroll(false)
                        .allow_boxed_zoom(false)
                        .allow_double_click_reset(false)
                        .include_x(0.0)
                        .include_x(size)
                        .include_y(0.0)
                        .include_y(size)
                        .show(ui, |plot_ui| {
                            plot_ui.image(PlotImage::new(
                                texture.id(),
                                PlotPoint::new(half, half),
                                egui::vec2(size as f32, size as f32),
                            ));
                            plot_ui.points(
                                Points::new(vec![cross])
                                    .shape(MarkerShape::Cross)
                                    .radius(6.0)
                                    .color(Color32::RED),
                            );
                        });
                });
                if (k + 1) % columns == 0 {
                    ui.end_row();
                }
            }
        });
    });
}
