use nalgebra::{DMatrix, DVector};

use super::error::{CalibError, Result};

// ---------------------------------------------------------------------------
// Polynomial – least-squares fit and evaluation
// ---------------------------------------------------------------------------

/// A polynomial fitted by least squares.
///
/// The fit is carried out on the normalised abscissa `t = (x - shift) / scale`
/// so that cubic fits over pixel axes of a few thousand samples stay well
/// conditioned. [`Polynomial::coefficients`] expands back to the plain power
/// basis in `x`.
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    /// Coefficients in `t`, lowest order first.
    normalized: Vec<f64>,
    shift: f64,
    scale: f64,
}

impl Polynomial {
    /// Fit a polynomial of `degree` to the samples `(x[i], y[i])`.
    pub fn fit(x: &[f64], y: &[f64], degree: usize) -> Result<Self> {
        if x.len() != y.len() {
            return Err(CalibError::LengthMismatch {
                pixels: x.len(),
                wavelengths: y.len(),
            });
        }
        let needed = degree + 1;
        if x.len() < needed {
            return Err(CalibError::TooFewSamples {
                degree,
                needed,
                got: x.len(),
            });
        }

        let shift = x.iter().sum::<f64>() / x.len() as f64;
        let scale = x.iter().map(|&v| (v - shift).abs()).fold(0.0, f64::max);
        if degree > 0 && scale <= f64::EPSILON * shift.abs().max(1.0) {
            return Err(CalibError::SingularFit("all abscissae are equal"));
        }
        let scale = if scale > 0.0 { scale } else { 1.0 };

        let design = DMatrix::from_fn(x.len(), needed, |i, j| {
            ((x[i] - shift) / scale).powi(j as i32)
        });
        let rhs = DVector::from_column_slice(y);
        let solution = design
            .svd(true, true)
            .solve(&rhs, 1e-12)
            .map_err(CalibError::SingularFit)?;

        if solution.iter().any(|c| !c.is_finite()) {
            return Err(CalibError::SingularFit("non-finite coefficients"));
        }

        Ok(Self {
            normalized: solution.iter().copied().collect(),
            shift,
            scale,
        })
    }

    /// Evaluate at `x` (Horner's scheme in the normalised variable).
    pub fn eval(&self, x: f64) -> f64 {
        let t = (x - self.shift) / self.scale;
        self.normalized.iter().rev().fold(0.0, |acc, &c| acc * t + c)
    }

    /// Evaluate over a whole axis.
    pub fn eval_all(&self, xs: &[f64]) -> Vec<f64> {
        xs.iter().map(|&x| self.eval(x)).collect()
    }

    /// Power-basis coefficients in `x`, lowest order first.
    pub fn coefficients(&self) -> Vec<f64> {
        let n = self.normalized.len();
        let mut raw = vec![0.0; n];
        for (k, &c) in self.normalized.iter().enumerate() {
            let ck = c / self.scale.powi(k as i32);
            // (x - s)^k = sum_j C(k, j) x^j (-s)^(k-j)
            let mut binom = 1.0;
            for (j, slot) in raw.iter_mut().enumerate().take(k + 1) {
                *slot += ck * binom * (-self.shift).powi((k - j) as i32);
                binom = binom * (k - j) as f64 / (j + 1) as f64;
            }
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_exact_quadratic() {
        let x: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&v| 3.0 - 0.5 * v + 0.25 * v * v).collect();
        let p = Polynomial::fit(&x, &y, 2).unwrap();
        let c = p.coefficients();
        assert_eq!(c.len(), 3);
        assert!((c[0] - 3.0).abs() < 1e-9);
        assert!((c[1] + 0.5).abs() < 1e-9);
        assert!((c[2] - 0.25).abs() < 1e-9);
        assert!((p.eval(7.5) - (3.0 - 3.75 + 0.25 * 56.25)).abs() < 1e-9);
    }

    #[test]
    fn expands_offset_cubic() {
        // abscissae far from zero exercise the binomial expansion
        let x: Vec<f64> = (0..30).map(|i| 1000.0 + 10.0 * i as f64).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|&v| 1.0 + 2.0 * v - 1e-3 * v * v + 1e-7 * v * v * v)
            .collect();
        let c = Polynomial::fit(&x, &y, 3).unwrap().coefficients();
        assert_eq!(c.len(), 4);
        for (got, want) in c.iter().zip([1.0, 2.0, -1e-3, 1e-7]) {
            assert!((got - want).abs() <= 1e-6 * want.abs().max(1.0), "got {got}, want {want}");
        }
    }

    #[test]
    fn rejects_too_few_samples() {
        let err = Polynomial::fit(&[0.0, 1.0], &[1.0, 2.0], 2).unwrap_err();
        assert_eq!(
            err,
            CalibError::TooFewSamples {
                degree: 2,
                needed: 3,
                got: 2
            }
        );
    }

    #[test]
    fn rejects_identical_abscissae() {
        let err = Polynomial::fit(&[4.0; 5], &[1.0, 2.0, 3.0, 4.0, 5.0], 1).unwrap_err();
        assert!(matches!(err, CalibError::SingularFit(_)));
    }
}
