/// Data layer: core types, loading, and export.
///
/// Architecture:
/// ```text
///  .parquet / .json / .csv
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → SpectralImage / Spectrum / LineList
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │    model      │  frames, spectra, line identifications
///   └──────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  export   │  calibrated spectrum → CSV, frame → PNG
///   └──────────┘
/// ```

pub mod export;
pub mod loader;
pub mod model;
