use crate::data::model::SpectralImage;

use super::error::{CalibError, Result};
use super::poly::Polynomial;

/// Degree of the per-column sky profile.
pub const BACKGROUND_DEGREE: usize = 2;

/// Columns at each edge that skip the 3-column median.
const EDGE_COLUMNS: usize = 2;

// ---------------------------------------------------------------------------
// Band boundaries and their allowed limits
// ---------------------------------------------------------------------------

/// Two half-open background bands `[y1, y2)` and `[y3, y4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandBounds {
    pub y1: usize,
    pub y2: usize,
    pub y3: usize,
    pub y4: usize,
}

impl BandBounds {
    pub fn new(y1: usize, y2: usize, y3: usize, y4: usize) -> Self {
        Self { y1, y2, y3, y4 }
    }

    /// Row indices sampled by the two bands.
    pub fn sample_rows(&self) -> impl Iterator<Item = usize> {
        (self.y1..self.y2).chain(self.y3..self.y4)
    }
}

/// Inclusive ranges that each band's boundaries must fall in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BandLimits {
    pub band1: (usize, usize),
    pub band2: (usize, usize),
}

impl BandLimits {
    pub fn new(band1: (usize, usize), band2: (usize, usize)) -> Self {
        Self { band1, band2 }
    }

    /// Band 1 in the first half of the rows, band 2 in the second half.
    pub fn for_height(rows: usize) -> Self {
        let mid = rows / 2;
        Self {
            band1: (0, mid),
            band2: (mid, rows),
        }
    }

    /// The limits used with the lab's 2D arc frames.
    pub fn lab_frame() -> Self {
        Self::new((0, 63), (73, 135))
    }

    /// Check ordering and limits.
    pub fn validate(&self, b: &BandBounds, rows: usize) -> Result<()> {
        let fail = |reason: String| {
            Err(CalibError::InvalidBands {
                y1: b.y1,
                y2: b.y2,
                y3: b.y3,
                y4: b.y4,
                reason,
            })
        };
        let within = |v: usize, (lo, hi): (usize, usize)| lo <= v && v <= hi;

        if !(b.y1 < b.y2 && b.y2 < b.y3 && b.y3 < b.y4) {
            return fail("boundaries must be strictly increasing".into());
        }
        if !within(b.y1, self.band1) || !within(b.y2, self.band1) {
            return fail(format!(
                "band 1 must lie within rows {}..={}",
                self.band1.0, self.band1.1
            ));
        }
        if !within(b.y3, self.band2) || !within(b.y4, self.band2) {
            return fail(format!(
                "band 2 must lie within rows {}..={}",
                self.band2.0, self.band2.1
            ));
        }
        if b.y4 > rows {
            return fail(format!("image only has {rows} rows"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Background estimation
// ---------------------------------------------------------------------------

/// Fit a degree-2 profile to the two background bands of every column and
/// evaluate it over the full column, returning a frame of `image`'s shape.
///
/// Interior columns are replaced by the row-wise median of themselves and
/// their two neighbours before sampling; the two columns at each edge are
/// used as they are.
pub fn estimate_background(
    image: &SpectralImage,
    bounds: &BandBounds,
    limits: &BandLimits,
) -> Result<SpectralImage> {
    limits.validate(bounds, image.rows())?;

    let rows: Vec<usize> = bounds.sample_rows().collect();
    let needed = BACKGROUND_DEGREE + 1;
    if rows.len() < needed {
        return Err(CalibError::TooFewSamples {
            degree: BACKGROUND_DEGREE,
            needed,
            got: rows.len(),
        });
    }
    let x: Vec<f64> = rows.iter().map(|&r| r as f64).collect();

    let (n_rows, n_cols) = image.shape();
    let mut profiles = Vec::with_capacity(n_cols);

    for col in 0..n_cols {
        let column = if col < EDGE_COLUMNS || col + EDGE_COLUMNS >= n_cols {
            image.column(col)
        } else {
            median_of_three(
                &image.column(col - 1),
                &image.column(col),
                &image.column(col + 1),
            )
        };
        let samples: Vec<f64> = rows.iter().map(|&r| column[r]).collect();
        profiles.push(Polynomial::fit(&x, &samples, BACKGROUND_DEGREE)?);
    }

    log::debug!(
        "fitted background over {n_cols} columns from {} rows",
        rows.len()
    );
    Ok(SpectralImage::from_fn(n_rows, n_cols, |r, c| {
        profiles[c].eval(r as f64)
    }))
}

fn median_of_three(a: &[f64], b: &[f64], c: &[f64]) -> Vec<f64> {
    a.iter()
        .zip(b)
        .zip(c)
        .map(|((&a, &b), &c)| a.max(b).min(a.min(b).max(c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_bands_give_flat_background() {
        // rows outside the bands carry a bright trace
        let img = SpectralImage::from_fn(136, 40, |r, c| {
            if (64..73).contains(&r) {
                5000.0 + c as f64
            } else {
                100.0
            }
        });
        let bkg = estimate_background(
            &img,
            &BandBounds::new(0, 63, 73, 135),
            &BandLimits::lab_frame(),
        )
        .unwrap();
        assert_eq!(bkg.shape(), img.shape());
        for v in bkg.values() {
            assert!((v - 100.0).abs() < 1e-9, "got {v}");
        }
    }

    #[test]
    fn recovers_known_quadratic_background() {
        let sky = |r: usize, c: usize| {
            let y = r as f64;
            20.0 + 0.3 * c as f64 + 0.5 * y - 0.004 * y * y
        };
        let img = SpectralImage::from_fn(100, 25, |r, c| {
            let trace = if (45..55).contains(&r) { 800.0 } else { 0.0 };
            sky(r, c) + trace
        });
        let bounds = BandBounds::new(5, 40, 60, 95);
        let bkg = estimate_background(&img, &bounds, &BandLimits::for_height(100)).unwrap();

        // the median of three linear-in-column neighbours equals the centre
        for r in 0..100 {
            for c in 0..25 {
                assert!((bkg.get(r, c) - sky(r, c)).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn rejects_decreasing_bounds() {
        let img = SpectralImage::from_fn(136, 10, |_, _| 1.0);
        let err = estimate_background(
            &img,
            &BandBounds::new(10, 5, 80, 100),
            &BandLimits::lab_frame(),
        )
        .unwrap_err();
        assert!(matches!(err, CalibError::InvalidBands { y1: 10, y2: 5, .. }));
    }

    #[test]
    fn rejects_bounds_outside_limits() {
        let img = SpectralImage::from_fn(136, 10, |_, _| 1.0);
        let limits = BandLimits::lab_frame();
        // y2 runs into the target region
        assert!(estimate_background(&img, &BandBounds::new(0, 66, 80, 100), &limits).is_err());
        // y3 starts inside band 1
        assert!(estimate_background(&img, &BandBounds::new(0, 20, 30, 100), &limits).is_err());
        // past the end of the frame
        let short = SpectralImage::from_fn(90, 10, |_, _| 1.0);
        assert!(estimate_background(&short, &BandBounds::new(0, 20, 80, 100), &limits).is_err());
    }

    #[test]
    fn default_limits_split_the_frame() {
        let limits = BandLimits::for_height(136);
        assert_eq!(limits, BandLimits::new((0, 68), (68, 136)));
        assert!(limits.validate(&BandBounds::new(0, 63, 73, 135), 136).is_ok());
    }

    #[test]
    fn median_picks_middle_value() {
        let m = median_of_three(&[1.0, 9.0, 5.0], &[3.0, 2.0, 5.0], &[2.0, 4.0, 1.0]);
        assert_eq!(m, vec![2.0, 4.0, 5.0]);
    }
}
