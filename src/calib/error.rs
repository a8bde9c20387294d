use thiserror::Error;

/// Failures of the calibration recipe. Every numerical step returns one of
/// these instead of panicking; the UI layer wraps them with `anyhow` context.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CalibError {
    #[error(
        "y-values are inconsistent: got ({y1}, {y2}, {y3}, {y4}); {reason}. \
         Give them in increasing order and within the band limits"
    )]
    InvalidBands {
        y1: usize,
        y2: usize,
        y3: usize,
        y4: usize,
        reason: String,
    },

    #[error("polynomial of degree {degree} needs at least {needed} samples, got {got}")]
    TooFewSamples {
        degree: usize,
        needed: usize,
        got: usize,
    },

    #[error("least-squares system is singular ({0})")]
    SingularFit(&'static str),

    #[error("window of half-width {half_width} around pixel {centre} leaves a spectrum of {len} samples")]
    WindowOutOfRange {
        centre: i64,
        half_width: usize,
        len: usize,
    },

    #[error("Gaussian fit around pixel {centre} did not converge: {reason}")]
    FitDidNotConverge { centre: i64, reason: String },

    #[error("{pixels} pixel positions but {wavelengths} wavelengths")]
    LengthMismatch { pixels: usize, wavelengths: usize },

    #[error("cubic calibration needs at least {needed} distinct lines, got {got}")]
    TooFewLines { needed: usize, got: usize },

    #[error("image shapes differ: {left:?} vs {right:?}")]
    ShapeMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("row range {lo}..{hi} is outside an image of {rows} rows")]
    RowRangeOutOfBounds { lo: usize, hi: usize, rows: usize },
}

pub type Result<T> = std::result::Result<T, CalibError>;
