use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::calib::background::BandLimits;
use crate::calib::centroid::DEFAULT_HALF_WIDTH;

// ---------------------------------------------------------------------------
// Lab settings (optional JSON file, every field defaulted)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabSettings {
    /// Half-width of the Gaussian fitting window, in pixels.
    pub centroid_half_width: usize,
    /// Double-clicked coordinates kept per image viewer.
    pub max_recorded_clicks: usize,
    /// Cutouts are `2 * cutout_half_size` pixels on a side.
    pub cutout_half_size: usize,
    pub cutout_columns: usize,
    pub label_font_size: f32,
    /// Override for the background band limits; derived from the frame
    /// height when absent.
    pub band_limits: Option<BandLimits>,
}

impl Default for LabSettings {
    fn default() -> Self {
        Self {
            centroid_half_width: DEFAULT_HALF_WIDTH,
            max_recorded_clicks: 35,
            cutout_half_size: 30,
            cutout_columns: 5,
            label_font_size: 12.0,
            band_limits: None,
        }
    }
}

impl LabSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        let settings: LabSettings = serde_json::from_str(&text).context("parsing settings JSON")?;
        log::info!("Loaded settings from {}: {settings:?}", path.display());
        Ok(settings)
    }

    pub fn band_limits_for(&self, rows: usize) -> BandLimits {
        self.band_limits
            .unwrap_or_else(|| BandLimits::for_height(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let s: LabSettings = serde_json::from_str(r#"{"cutout_half_size": 20}"#).unwrap();
        assert_eq!(s.cutout_half_size, 20);
        assert_eq!(s.centroid_half_width, 5);
        assert_eq!(s.max_recorded_clicks, 35);
    }

    #[test]
    fn band_limits_override() {
        let s: LabSettings =
            serde_json::from_str(r#"{"band_limits": {"band1": [0, 63], "band2": [73, 135]}}"#)
                .unwrap();
        assert_eq!(s.band_limits_for(500), BandLimits::lab_frame());
        assert_eq!(
            LabSettings::default().band_limits_for(100),
            BandLimits::for_height(100)
        );
    }
}
