/// Calibration recipe: pure numerical steps on frames and spectra.
///
/// ```text
///  2D frame ──► background ──► subtract / collapse ──► 1D arc spectrum
///                                                        │
///                         approximate line pixels ──► centroid
///                                                        │
///                             known wavelengths ──► wavelength ──► axis, RMS
///                                                        │
///                                                     annotate (plot layout)
/// ```
///
/// `zscale` supplies display limits for frames.

pub mod annotate;
pub mod background;
pub mod centroid;
pub mod error;
pub mod poly;
pub mod wavelength;
pub mod zscale;
