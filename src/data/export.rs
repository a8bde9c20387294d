use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use super::model::Spectrum;

#[derive(Serialize)]
struct CalibratedRow {
    pixel: usize,
    wavelength: f64,
    intensity: f64,
}

/// Write `pixel, wavelength, intensity` rows for a calibrated spectrum.
pub fn write_calibrated_csv(path: &Path, spectrum: &Spectrum, wavelength_axis: &[f64]) -> Result<()> {
    if spectrum.len() != wavelength_axis.len() {
        bail!(
            "spectrum has {} samples but the wavelength axis has {}",
            spectrum.len(),
            wavelength_axis.len()
        );
    }
    let mut writer = csv::Writer::from_path(path).context("creating CSV file")?;
    for (pixel, (&wavelength, &intensity)) in wavelength_axis
        .iter()
        .zip(&spectrum.intensity)
        .enumerate()
    {
        writer
            .serialize(CalibratedRow {
                pixel,
                wavelength,
                intensity,
            })
            .with_context(|| format!("writing row {pixel}"))?;
    }
    writer.flush().context("flushing CSV file")?;
    log::info!("Wrote {} calibrated samples to {}", spectrum.len(), path.display());
    Ok(())
}

/// Save an RGBA buffer (row 0 at the top) as PNG.
pub fn write_png(path: &Path, width: usize, height: usize, rgba: Vec<u8>) -> Result<()> {
    let img = image::RgbaImage::from_raw(width as u32, height as u32, rgba)
        .context("RGBA buffer does not match the image size")?;
    img.save(path)
        .with_context(|| format!("saving {}", path.display()))?;
    log::info!("Saved {width}x{height} frame to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_has_one_row_per_pixel() {
        let path = std::env::temp_dir().join(format!("spectral-lab-{}-cal.csv", std::process::id()));
        let sp = Spectrum::new(vec![5.0, 6.0]);
        write_calibrated_csv(&path, &sp, &[4000.0, 4002.5]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "pixel,wavelength,intensity");
        assert_eq!(lines[2], "1,4002.5,6.0");
        assert!(write_calibrated_csv(&path, &sp, &[1.0]).is_err());
    }

    #[test]
    fn png_size_is_checked() {
        let path = std::env::temp_dir().join(format!("spectral-lab-{}-frame.png", std::process::id()));
        assert!(write_png(&path, 2, 2, vec![0; 8]).is_err());
        write_png(&path, 2, 1, vec![255; 8]).unwrap();
        assert!(path.exists());
    }
}
