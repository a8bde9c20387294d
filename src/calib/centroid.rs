use nalgebra::{Matrix4, Vector4};

use super::error::{CalibError, Result};

/// Half-width (in samples) of the window fitted around each line.
pub const DEFAULT_HALF_WIDTH: usize = 5;

const MAX_ITERATIONS: usize = 200;
const MAX_DAMPING: f64 = 1e12;
const RELATIVE_TOLERANCE: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Gaussian profile
// ---------------------------------------------------------------------------

/// Parameters of `baseline + amplitude * exp(-(x - centre)^2 / (2 sigma^2))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GaussianFit {
    pub baseline: f64,
    pub amplitude: f64,
    pub centre: f64,
    pub sigma: f64,
    pub iterations: usize,
}

fn gaussian(x: f64, p: &Vector4<f64>) -> f64 {
    let d = x - p[2];
    p[0] + p[1] * (-d * d / (2.0 * p[3] * p[3])).exp()
}

/// Partial derivatives with respect to (baseline, amplitude, centre, sigma).
fn gradient(x: f64, p: &Vector4<f64>) -> Vector4<f64> {
    let (a, x0, s) = (p[1], p[2], p[3]);
    let d = x - x0;
    let e = (-d * d / (2.0 * s * s)).exp();
    Vector4::new(1.0, e, a * e * d / (s * s), a * e * d * d / (s * s * s))
}

fn sum_sq(xs: &[f64], ys: &[f64], p: &Vector4<f64>) -> f64 {
    xs.iter()
        .zip(ys)
        .map(|(&x, &y)| {
            let r = y - gaussian(x, p);
            r * r
        })
        .sum()
}

/// Levenberg–Marquardt fit of a 4-parameter Gaussian starting from `initial`
/// (baseline, amplitude, centre, sigma). Returns the reason on failure.
fn fit_gaussian(
    xs: &[f64],
    ys: &[f64],
    initial: Vector4<f64>,
) -> std::result::Result<GaussianFit, String> {
    let mut p = initial;
    let mut cost = sum_sq(xs, ys, &p);
    if !cost.is_finite() {
        return Err("non-finite samples in window".into());
    }
    let mut lambda = 1e-3;

    for iteration in 1..=MAX_ITERATIONS {
        let mut jtj = Matrix4::<f64>::zeros();
        let mut jtr = Vector4::<f64>::zeros();
        for (&x, &y) in xs.iter().zip(ys) {
            let g = gradient(x, &p);
            jtj += g * g.transpose();
            jtr += g * (y - gaussian(x, &p));
        }

        let mut damped = jtj;
        for i in 0..4 {
            damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
        }

        let Some(step) = damped.lu().solve(&jtr) else {
            lambda *= 10.0;
            if lambda > MAX_DAMPING {
                return Err("normal equations are singular".into());
            }
            continue;
        };

        let trial = p + step;
        let trial_cost = sum_sq(xs, ys, &trial);
        if trial_cost.is_finite() && trial_cost < cost {
            let improvement = cost - trial_cost;
            p = trial;
            cost = trial_cost;
            lambda = (lambda / 10.0).max(1e-12);
            log::trace!("iteration {iteration}: cost {cost:.6e}, lambda {lambda:.1e}");
            if improvement <= RELATIVE_TOLERANCE * cost
                || step.norm() <= 1e-10 * (p.norm() + 1e-10)
            {
                return Ok(to_fit(p, iteration));
            }
        } else {
            lambda *= 10.0;
            // no downhill step left: we are sitting on the minimum
            if lambda > MAX_DAMPING {
                return Ok(to_fit(p, iteration));
            }
        }
    }

    Err(format!("no convergence after {MAX_ITERATIONS} iterations"))
}

fn to_fit(p: Vector4<f64>, iterations: usize) -> GaussianFit {
    GaussianFit {
        baseline: p[0],
        amplitude: p[1],
        centre: p[2],
        sigma: p[3].abs(),
        iterations,
    }
}

// ---------------------------------------------------------------------------
// Centroid refinement
// ---------------------------------------------------------------------------

/// Fit a Gaussian to the samples `centre - half_width ..= centre + half_width`
/// around `approx` (truncated to a whole pixel) and return the full fit.
pub fn fit_line(spectrum: &[f64], approx: f64, half_width: usize) -> Result<GaussianFit> {
    let floor = approx.floor();
    // compare in f64 so that huge positions cannot overflow the window bounds
    let in_range = floor - half_width as f64 >= 0.0
        && floor + (half_width as f64) < spectrum.len() as f64;
    let centre = floor as i64;
    if !approx.is_finite() || !in_range {
        return Err(CalibError::WindowOutOfRange {
            centre,
            half_width,
            len: spectrum.len(),
        });
    }

    let lo = floor as usize - half_width;
    let hi = floor as usize + half_width;
    let xs: Vec<f64> = (lo..=hi).map(|i| i as f64).collect();
    let ys = &spectrum[lo..=hi];

    let baseline = ys.iter().copied().fold(f64::INFINITY, f64::min);
    let initial = Vector4::new(baseline, ys[half_width] - baseline, centre as f64, 1.0);

    let fail = |reason: String| CalibError::FitDidNotConverge { centre, reason };
    let fit = fit_gaussian(&xs, ys, initial).map_err(fail)?;

    if ![fit.baseline, fit.amplitude, fit.centre, fit.sigma]
        .iter()
        .all(|v| v.is_finite())
    {
        return Err(fail("non-finite parameters".into()));
    }
    if fit.amplitude <= 0.0 || fit.sigma <= 0.0 {
        return Err(fail(format!(
            "no emission peak (amplitude {:.3}, sigma {:.3})",
            fit.amplitude, fit.sigma
        )));
    }
    if fit.centre < lo as f64 || fit.centre > hi as f64 {
        return Err(fail(format!(
            "centre {:.2} left the window {lo}..={hi}",
            fit.centre
        )));
    }

    log::debug!(
        "line near {approx:.1}: centre {:.3}, sigma {:.3} after {} iterations",
        fit.centre,
        fit.sigma,
        fit.iterations
    );
    Ok(fit)
}

/// Sub-pixel centre of the line near `approx`.
pub fn refine_centroid(spectrum: &[f64], approx: f64, half_width: usize) -> Result<f64> {
    fit_line(spectrum, approx, half_width).map(|fit| fit.centre)
}

/// Refine every approximate position independently, preserving order.
pub fn refine_centroids(spectrum: &[f64], approx: &[f64], half_width: usize) -> Result<Vec<f64>> {
    approx
        .iter()
        .map(|&p| refine_centroid(spectrum, p, half_width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PEAKS: [(f64, f64, f64); 3] = [(40.3, 1.5, 1000.0), (97.75, 2.0, 500.0), (150.1, 1.2, 2500.0)];

    fn synthetic_arc() -> Vec<f64> {
        (0..200)
            .map(|i| {
                let x = i as f64;
                20.0 + PEAKS
                    .iter()
                    .map(|&(mu, s, a)| a * (-(x - mu).powi(2) / (2.0 * s * s)).exp())
                    .sum::<f64>()
            })
            .collect()
    }

    #[test]
    fn recovers_known_centres() {
        let arc = synthetic_arc();
        let refined = refine_centroids(&arc, &[42.0, 96.0, 150.9], DEFAULT_HALF_WIDTH).unwrap();
        for (got, (want, _, _)) in refined.iter().zip(PEAKS) {
            assert!((got - want).abs() < 0.05, "got {got}, want {want}");
        }
    }

    #[test]
    fn recovers_full_profile() {
        let arc = synthetic_arc();
        let fit = fit_line(&arc, 97.0, DEFAULT_HALF_WIDTH).unwrap();
        assert!((fit.sigma - 2.0).abs() < 1e-3);
        assert!((fit.amplitude - 500.0).abs() < 1.0);
        assert!((fit.baseline - 20.0).abs() < 0.5);
    }

    #[test]
    fn flat_window_fails() {
        let flat = vec![50.0; 60];
        let err = refine_centroid(&flat, 30.0, DEFAULT_HALF_WIDTH).unwrap_err();
        assert!(matches!(err, CalibError::FitDidNotConverge { centre: 30, .. }));
    }

    #[test]
    fn window_must_fit_inside_spectrum() {
        let arc = synthetic_arc();
        assert!(matches!(
            refine_centroid(&arc, 2.0, DEFAULT_HALF_WIDTH),
            Err(CalibError::WindowOutOfRange { .. })
        ));
        assert!(matches!(
            refine_centroid(&arc, 196.5, DEFAULT_HALF_WIDTH),
            Err(CalibError::WindowOutOfRange { .. })
        ));
    }

    #[test]
    fn extreme_positions_are_rejected() {
        let flat = [1.0; 100];
        for approx in [1e19, -1e19, f64::MAX, f64::MIN, f64::NAN, f64::INFINITY] {
            assert!(
                matches!(
                    refine_centroid(&flat, approx, DEFAULT_HALF_WIDTH),
                    Err(CalibError::WindowOutOfRange { .. })
                ),
                "approx {approx}"
            );
        }
        assert!(matches!(
            refine_centroid(&flat, 50.0, usize::MAX),
            Err(CalibError::WindowOutOfRange { .. })
        ));
    }
}
