//! User-facing comping configuration

use serde::{Deserialize, Serialize};

use crate::density::DensityPolicy;
use crate::error::{ComperError, Result};
use crate::feel::{Humanization, JazzRendererConfig, Style};
use crate::rhythm::MAX_SWING;
use crate::voice_leading::VoiceLeadingWeights;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComperConfig {
    #[serde(default)]
    pub style: Style,
    #[serde(default)]
    pub humanization: Humanization,
    /// Fixed seed for reproducible renders; entropy-seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
    /// Name of the pattern used for measures the density table leaves open
    #[serde(default)]
    pub fallback_pattern: Option<String>,
    /// Overrides the catalog's swing factor
    #[serde(default)]
    pub swing: Option<f64>,
    #[serde(default)]
    pub voice_leading: VoiceLeadingWeights,
    #[serde(default)]
    pub density: DensityPolicy,
}

impl ComperConfig {
    pub fn for_style(style: Style) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    /// Style preset scaled by the humanization level
    pub fn renderer_config(&self) -> JazzRendererConfig {
        JazzRendererConfig::preset(self.style).humanized(self.humanization)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(swing) = self.swing {
            if !(0.0..=MAX_SWING).contains(&swing) {
                return Err(ComperError::Config(format!(
                    "swing {swing} outside [0, {MAX_SWING}]"
                )));
            }
        }
        let p = self.density.sparse_whole_note_probability;
        if !(0.0..=1.0).contains(&p) {
            return Err(ComperError::Config(format!(
                "sparse whole note probability {p} outside [0, 1]"
            )));
        }
        if self.density.dense_chord_count == 0 {
            return Err(ComperError::Config("dense chord count must be at least 1".into()));
        }
        if !self.density.dense_max_duration.is_finite() || self.density.dense_max_duration < 0.0 {
            return Err(ComperError::Config(format!(
                "dense max duration {} must be a non-negative beat count",
                self.density.dense_max_duration
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_is_default() {
        let config: ComperConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, ComperConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_config() {
        let config: ComperConfig = serde_json::from_str(
            r#"{"style":"ballad","humanization":"tight","seed":5,"density":{"dense_chord_count":3}}"#,
        )
        .unwrap();
        assert_eq!(config.style, Style::Ballad);
        assert_eq!(config.seed, Some(5));
        assert_eq!(config.density.dense_chord_count, 3);
        assert_eq!(config.density.dense_max_duration, 1.0);

        let feel = config.renderer_config();
        let base = JazzRendererConfig::preset(Style::Ballad);
        assert_eq!(feel.timing_jitter, base.timing_jitter * 0.5);
    }

    #[test]
    fn test_out_of_range_swing_rejected() {
        let config = ComperConfig {
            swing: Some(0.5),
            ..ComperConfig::default()
        };
        assert!(matches!(config.validate(), Err(ComperError::Config(_))));
    }
}
