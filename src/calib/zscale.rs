//! IRAF-style z-scale display limits.
//!
//! Samples the image, fits a straight line to the sorted samples with
//! iterative sigma rejection, and narrows the range around the median by the
//! fitted slope divided by the contrast.

use super::poly::Polynomial;

#[derive(Debug, Clone, Copy)]
pub struct ZScale {
    pub n_samples: usize,
    pub contrast: f64,
    pub max_reject: f64,
    pub min_npixels: usize,
    pub krej: f64,
    pub max_iterations: usize,
}

impl Default for ZScale {
    fn default() -> Self {
        Self {
            n_samples: 1000,
            contrast: 0.25,
            max_reject: 0.5,
            min_npixels: 5,
            krej: 2.5,
            max_iterations: 5,
        }
    }
}

impl ZScale {
    /// `(vmin, vmax)` for the finite entries of `values`; `None` if there are none.
    pub fn limits(&self, values: &[f64]) -> Option<(f64, f64)> {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if finite.is_empty() {
            return None;
        }
        let stride = (finite.len() / self.n_samples.max(1)).max(1);
        let mut samples: Vec<f64> = finite
            .iter()
            .step_by(stride)
            .take(self.n_samples)
            .copied()
            .collect();
        samples.sort_by(f64::total_cmp);

        let npix = samples.len();
        let mut vmin = samples[0];
        let mut vmax = samples[npix - 1];
        if npix < 2 {
            return Some((vmin, vmax));
        }

        let min_pix = self.min_npixels.max((npix as f64 * self.max_reject) as usize);
        let ngrow = ((npix as f64 * 0.01) as usize).max(1);
        let x: Vec<f64> = (0..npix).map(|i| i as f64).collect();
        let mut bad = vec![false; npix];
        let mut ngood = npix;
        let mut last_ngood = npix + 1;
        let mut slope = 0.0;
        let mut intercept = 0.0;

        for _ in 0..self.max_iterations {
            if ngood >= last_ngood || ngood < min_pix {
                break;
            }
            let (gx, gy): (Vec<f64>, Vec<f64>) = x
                .iter()
                .zip(&samples)
                .zip(&bad)
                .filter(|(_, &b)| !b)
                .map(|((&x, &y), _)| (x, y))
                .unzip();
            let Ok(line) = Polynomial::fit(&gx, &gy, 1) else {
                break;
            };
            let c = line.coefficients();
            intercept = c[0];
            slope = c[1];

            let residuals: Vec<f64> = x
                .iter()
                .zip(&samples)
                .map(|(&x, &y)| y - (slope * x + intercept))
                .collect();
            let good_res: Vec<f64> = residuals
                .iter()
                .zip(&bad)
                .filter(|(_, &b)| !b)
                .map(|(&r, _)| r)
                .collect();
            let threshold = self.krej * std_dev(&good_res);

            let rejected: Vec<bool> = residuals.iter().map(|r| r.abs() > threshold).collect();
            bad = grow(&rejected, ngrow);
            last_ngood = ngood;
            ngood = bad.iter().filter(|&&b| !b).count();
        }

        if ngood >= min_pix {
            if self.contrast > 0.0 {
                slope /= self.contrast;
            }
            let centre = (npix - 1) / 2;
            let median = if npix % 2 == 1 {
                samples[npix / 2]
            } else {
                0.5 * (samples[npix / 2 - 1] + samples[npix / 2])
            };
            vmin = vmin.max(median - (centre as f64 - 1.0) * slope);
            vmax = vmax.min(median + (npix - centre) as f64 * slope);
        }
        Some((vmin, vmax))
    }
}

/// Z-scale limits with the default parameters.
pub fn zscale_limits(values: &[f64]) -> Option<(f64, f64)> {
    ZScale::default().limits(values)
}

fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Mark every sample within `width` of a rejected one.
fn grow(rejected: &[bool], width: usize) -> Vec<bool> {
    let before = (width - 1) - width / 2;
    let after = width / 2;
    let mut out = vec![false; rejected.len()];
    for (i, _) in rejected.iter().enumerate().filter(|(_, &r)| r) {
        let lo = i.saturating_sub(before);
        let hi = (i + after).min(rejected.len() - 1);
        out[lo..=hi].iter_mut().for_each(|b| *b = true);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_image_collapses_to_single_value() {
        let (lo, hi) = zscale_limits(&[42.0; 500]).unwrap();
        assert!((lo - 42.0).abs() < 1e-9);
        assert!((hi - 42.0).abs() < 1e-9);
    }

    #[test]
    fn outliers_are_clipped() {
        // smooth sky with a handful of saturated stars
        let mut values: Vec<f64> = (0..4000).map(|i| 1000.0 + (i % 50) as f64).collect();
        for v in values.iter_mut().step_by(397) {
            *v = 60000.0;
        }
        let (lo, hi) = zscale_limits(&values).unwrap();
        assert!(lo >= 1000.0);
        assert!(hi < 60000.0);
        assert!(lo < hi);
    }

    #[test]
    fn ignores_non_finite_pixels() {
        assert!(zscale_limits(&[f64::NAN, f64::INFINITY]).is_none());
        let (lo, hi) = zscale_limits(&[f64::NAN, 1.0, 2.0, 3.0]).unwrap();
        assert!(lo >= 1.0 && hi <= 3.0);
    }

    #[test]
    fn grow_widens_rejections() {
        let g = grow(&[false, false, true, false, false], 3);
        assert_eq!(g, vec![false, true, true, true, false]);
    }
}
