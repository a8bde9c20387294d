use super::error::{CalibError, Result};
use super::poly::Polynomial;

/// Degree of the pixel → wavelength mapping.
pub const CALIBRATION_DEGREE: usize = 3;

/// Residual of one calibration line: `predicted - input` at the input wavelength.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Residual {
    pub wavelength: f64,
    pub residual: f64,
}

/// A fitted dispersion solution.
#[derive(Debug, Clone, PartialEq)]
pub struct WavelengthSolution {
    pub polynomial: Polynomial,
    /// Root-mean-square of the residuals, in the wavelength unit of the input.
    pub rms: f64,
    pub residuals: Vec<Residual>,
}

impl WavelengthSolution {
    /// Fit the cubic mapping from refined pixel positions to wavelengths.
    pub fn fit(pixels: &[f64], wavelengths: &[f64]) -> Result<Self> {
        if pixels.len() != wavelengths.len() {
            return Err(CalibError::LengthMismatch {
                pixels: pixels.len(),
                wavelengths: wavelengths.len(),
            });
        }
        let needed = CALIBRATION_DEGREE + 1;
        let distinct = count_distinct(pixels);
        if distinct < needed {
            return Err(CalibError::TooFewLines {
                needed,
                got: distinct,
            });
        }

        let polynomial = Polynomial::fit(pixels, wavelengths, CALIBRATION_DEGREE)?;
        let residuals: Vec<Residual> = pixels
            .iter()
            .zip(wavelengths)
            .map(|(&p, &w)| Residual {
                wavelength: w,
                residual: polynomial.eval(p) - w,
            })
            .collect();
        let rms = (residuals.iter().map(|r| r.residual * r.residual).sum::<f64>()
            / residuals.len() as f64)
            .sqrt();

        log::info!("RMS: {rms} Angstroms ({} lines)", residuals.len());
        Ok(Self {
            polynomial,
            rms,
            residuals,
        })
    }

    pub fn wavelength_at(&self, pixel: f64) -> f64 {
        self.polynomial.eval(pixel)
    }

    /// Calibrated wavelength for every entry of `pixel_axis`.
    pub fn wavelength_axis(&self, pixel_axis: &[f64]) -> Vec<f64> {
        self.polynomial.eval_all(pixel_axis)
    }

    /// Legend text of the residual plot.
    pub fn rms_label(&self) -> String {
        format!("RMS: {:.3} Å", self.rms)
    }
}

/// Fit the mapping and evaluate it over `pixel_axis` in one go.
pub fn calibrate(
    pixels: &[f64],
    wavelengths: &[f64],
    pixel_axis: &[f64],
) -> Result<(WavelengthSolution, Vec<f64>)> {
    let solution = WavelengthSolution::fit(pixels, wavelengths)?;
    let axis = solution.wavelength_axis(pixel_axis);
    Ok((solution, axis))
}

fn count_distinct(values: &[f64]) -> usize {
    let mut sorted: Vec<f64> = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| (*a - *b).abs() <= 1e-9 * b.abs().max(1.0));
    sorted.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TRUE_COEFFS: [f64; 4] = [3650.0, 2.1, 4.0e-4, -6.0e-8];

    fn dispersion(p: f64) -> f64 {
        TRUE_COEFFS
            .iter()
            .rev()
            .fold(0.0, |acc, &c| acc * p + c)
    }

    fn lines() -> (Vec<f64>, Vec<f64>) {
        let pixels = vec![55.2, 210.7, 388.1, 512.9, 760.4, 1002.3, 1290.8, 1610.0, 1850.6];
        let wavelengths = pixels.iter().map(|&p| dispersion(p)).collect();
        (pixels, wavelengths)
    }

    #[test]
    fn recovers_cubic_dispersion() {
        let (pixels, wavelengths) = lines();
        let solution = WavelengthSolution::fit(&pixels, &wavelengths).unwrap();
        let coeffs = solution.polynomial.coefficients();
        for (got, want) in coeffs.iter().zip(TRUE_COEFFS) {
            assert!(
                (got - want).abs() <= 1e-6 * want.abs().max(1e-6),
                "got {got}, want {want}"
            );
        }
        assert!(solution.rms < 1e-8);
    }

    #[test]
    fn round_trip_reproduces_wavelengths_within_rms() {
        let (pixels, mut wavelengths) = lines();
        // perturb so the fit is not exact
        for (i, w) in wavelengths.iter_mut().enumerate() {
            *w += if i % 2 == 0 { 0.08 } else { -0.05 };
        }
        let solution = WavelengthSolution::fit(&pixels, &wavelengths).unwrap();
        assert!(solution.rms > 0.0);
        let worst = solution
            .residuals
            .iter()
            .map(|r| r.residual.abs())
            .fold(0.0, f64::max);
        assert!(worst <= solution.rms * (pixels.len() as f64).sqrt() + 1e-12);
        for (p, w) in pixels.iter().zip(&wavelengths) {
            assert!((solution.wavelength_at(*p) - w).abs() <= worst + 1e-12);
        }
    }

    #[test]
    fn evaluates_full_pixel_axis() {
        let (pixels, wavelengths) = lines();
        let axis: Vec<f64> = (0..2048).map(|i| i as f64).collect();
        let (_, wav_axis) = calibrate(&pixels, &wavelengths, &axis).unwrap();
        assert_eq!(wav_axis.len(), 2048);
        assert!((wav_axis[1000] - dispersion(1000.0)).abs() < 1e-6);
        assert!(wav_axis.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn rejects_underdetermined_fit() {
        let err = WavelengthSolution::fit(&[10.0, 20.0, 30.0, 30.0], &[1.0, 2.0, 3.0, 3.0])
            .unwrap_err();
        assert_eq!(err, CalibError::TooFewLines { needed: 4, got: 3 });
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let err = WavelengthSolution::fit(&[1.0, 2.0, 3.0, 4.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(
            err,
            CalibError::LengthMismatch {
                pixels: 4,
                wavelengths: 3
            }
        );
    }

    #[test]
    fn rms_label_rounds_to_three_places() {
        let (pixels, wavelengths) = lines();
        let mut solution = WavelengthSolution::fit(&pixels, &wavelengths).unwrap();
        solution.rms = 0.12345;
        assert_eq!(solution.rms_label(), "RMS: 0.123 Å");
    }
}
