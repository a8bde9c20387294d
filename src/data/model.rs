use std::fmt;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

use crate::calib::error::CalibError;

// ---------------------------------------------------------------------------
// SpectralImage – a 2D frame (rows = spatial, columns = dispersion)
// ---------------------------------------------------------------------------

/// Row-major 2D grid of intensities.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralImage {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl SpectralImage {
    /// Wrap a row-major buffer. Fails if the buffer does not match the shape.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Result<Self> {
        if rows == 0 || cols == 0 {
            bail!("image must have at least one row and one column, got {rows}x{cols}");
        }
        if data.len() != rows * cols {
            bail!(
                "image buffer has {} values, expected {rows}x{cols} = {}",
                data.len(),
                rows * cols
            );
        }
        Ok(Self { rows, cols, data })
    }

    /// Build from a list of rows, all of the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_rows = rows.len();
        let n_cols = rows.first().map(Vec::len).unwrap_or(0);
        let mut data = Vec::with_capacity(n_rows * n_cols);
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != n_cols {
                bail!("row {i} has {} values but row 0 has {n_cols}", row.len());
            }
            data.extend(row);
        }
        Self::new(n_rows, n_cols, data)
    }

    /// Build by evaluating `f(row, col)` at every pixel.
    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Self {
        let data = (0..rows)
            .flat_map(|r| (0..cols).map(move |c| (r, c)))
            .map(|(r, c)| f(r, c))
            .collect();
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn column(&self, col: usize) -> Vec<f64> {
        (0..self.rows).map(|r| self.get(r, col)).collect()
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    /// Pixel-wise `self - other`.
    pub fn subtract(&self, other: &SpectralImage) -> Result<SpectralImage, CalibError> {
        if self.shape() != other.shape() {
            return Err(CalibError::ShapeMismatch {
                left: self.shape(),
                right: other.shape(),
            });
        }
        let data = self
            .data
            .iter()
            .zip(&other.data)
            .map(|(a, b)| a - b)
            .collect();
        Ok(SpectralImage {
            rows: self.rows,
            cols: self.cols,
            data,
        })
    }

    /// Sum rows `lo..hi` column by column into a 1D spectrum.
    pub fn collapse_rows(&self, lo: usize, hi: usize) -> Result<Spectrum, CalibError> {
        if lo >= hi || hi > self.rows {
            return Err(CalibError::RowRangeOutOfBounds {
                lo,
                hi,
                rows: self.rows,
            });
        }
        let intensity = (0..self.cols)
            .map(|c| (lo..hi).map(|r| self.get(r, c)).sum())
            .collect();
        Ok(Spectrum::new(intensity))
    }

    /// A `2*half x 2*half` frame centred on pixel `(x, y)` (x = column,
    /// y = row). Pixels falling outside the source are NaN.
    pub fn cutout(&self, x: f64, y: f64, half: usize) -> SpectralImage {
        let size = 2 * half;
        let x0 = x.trunc() as i64 - half as i64;
        let y0 = y.trunc() as i64 - half as i64;
        SpectralImage::from_fn(size, size, |r, c| {
            let sr = y0 + r as i64;
            let sc = x0 + c as i64;
            if sr < 0 || sc < 0 || sr >= self.rows as i64 || sc >= self.cols as i64 {
                f64::NAN
            } else {
                self.get(sr as usize, sc as usize)
            }
        })
    }

    /// Finite pixel values, used for display statistics.
    pub fn finite_values(&self) -> Vec<f64> {
        self.data.iter().copied().filter(|v| v.is_finite()).collect()
    }
}

// ---------------------------------------------------------------------------
// Spectrum – a 1D intensity trace indexed by pixel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub intensity: Vec<f64>,
}

impl Spectrum {
    pub fn new(intensity: Vec<f64>) -> Self {
        Self { intensity }
    }

    pub fn len(&self) -> usize {
        self.intensity.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intensity.is_empty()
    }

    /// `0, 1, ..., len-1` as floats.
    pub fn pixel_axis(&self) -> Vec<f64> {
        (0..self.len()).map(|i| i as f64).collect()
    }

    /// Largest finite intensity, if any.
    pub fn max(&self) -> Option<f64> {
        self.intensity
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .reduce(f64::max)
    }
}

// ---------------------------------------------------------------------------
// Line identifications
// ---------------------------------------------------------------------------

/// One arc line: approximate pixel position and its laboratory wavelength.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineId {
    pub pixel: f64,
    pub wavelength: f64,
    #[serde(default)]
    pub label: Option<String>,
}

impl LineId {
    /// Label to print next to the line: explicit label, else the wavelength.
    pub fn display_label(&self) -> String {
        match &self.label {
            Some(l) if !l.is_empty() => l.clone(),
            _ => format!("{:.2}", self.wavelength),
        }
    }
}

impl fmt::Display for LineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} px → {:.2} Å", self.pixel, self.wavelength)
    }
}

/// Ordered list of line identifications.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineList {
    pub lines: Vec<LineId>,
}

impl LineList {
    pub fn new(lines: Vec<LineId>) -> Self {
        Self { lines }
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn pixels(&self) -> Vec<f64> {
        self.lines.iter().map(|l| l.pixel).collect()
    }

    pub fn wavelengths(&self) -> Vec<f64> {
        self.lines.iter().map(|l| l.wavelength).collect()
    }

    pub fn labels(&self) -> Vec<String> {
        self.lines.iter().map(LineId::display_label).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(rows: usize, cols: usize) -> SpectralImage {
        SpectralImage::from_fn(rows, cols, |r, c| (r * 10 + c) as f64)
    }

    #[test]
    fn from_rows_rejects_ragged_input() {
        let err = SpectralImage::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(err.to_string().contains("row 1"));
        assert!(SpectralImage::from_rows(Vec::new()).is_err());
    }

    #[test]
    fn collapse_sums_selected_rows() {
        let img = ramp(4, 3);
        let sp = img.collapse_rows(1, 3).unwrap();
        assert_eq!(sp.intensity, vec![30.0, 32.0, 34.0]);
        assert!(img.collapse_rows(2, 2).is_err());
        assert!(img.collapse_rows(0, 5).is_err());
    }

    #[test]
    fn subtract_checks_shape() {
        let a = ramp(2, 2);
        let b = SpectralImage::from_fn(2, 2, |_, _| 1.0);
        assert_eq!(a.subtract(&b).unwrap().values(), &[-1.0, 0.0, 9.0, 10.0]);
        assert!(matches!(
            a.subtract(&ramp(3, 2)),
            Err(CalibError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn cutout_is_centred_and_padded() {
        let img = ramp(10, 10);
        let cut = img.cutout(5.0, 5.0, 2);
        assert_eq!(cut.shape(), (4, 4));
        // centre pixel of the cutout maps back to (row 5, col 5)
        assert_eq!(cut.get(2, 2), img.get(5, 5));

        let edge = img.cutout(0.0, 0.0, 2);
        assert!(edge.get(0, 0).is_nan());
        assert_eq!(edge.get(2, 2), img.get(0, 0));
    }

    #[test]
    fn line_labels_fall_back_to_wavelength() {
        let list = LineList::new(vec![
            LineId {
                pixel: 10.0,
                wavelength: 4046.5625,
                label: None,
            },
            LineId {
                pixel: 20.0,
                wavelength: 5769.6,
                label: Some("Hg I".into()),
            },
        ]);
        assert_eq!(list.labels(), vec!["4046.56".to_string(), "Hg I".to_string()]);
        assert_eq!(list.pixels(), vec![10.0, 20.0]);
    }
}
