mod app;
mod calib;
mod color;
mod data;
mod settings;
mod state;
mod ui;
mod view;

use app::SpectralLabApp;
use eframe::egui;

fn main() -> eframe::Result {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 820.0])
            .with_min_inner_size([640.0, 420.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Spectral Lab – Arc Calibration & Star Fields",
        options,
        Box::new(|_cc| Ok(Box::new(SpectralLabApp::default()))),
    )
}
