use resect_consensus::LoRansacSettings;
use resect_optimize::BundleAdjusterSettings;
#[cfg(feature = "serde-serialize")]
use serde::{Deserialize, Serialize};

/// The settings of a [`Localizer`](crate::Localizer).
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct LocalizerSettings {
    /// The pixel threshold LO-RANSAC uses when the match data does not bound the error.
    #[cfg_attr(
        feature = "serde-serialize",
        serde(default = "default_lo_ransac_default_threshold")
    )]
    pub lo_ransac_default_threshold: f64,
    /// Seed of the random number generator, reset on every localization.
    #[cfg_attr(feature = "serde-serialize", serde(default = "default_seed"))]
    pub seed: u64,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub lo_ransac: LoRansacSettings,
    #[cfg_attr(feature = "serde-serialize", serde(default))]
    pub bundle_adjuster: BundleAdjusterSettings,
}

fn default_lo_ransac_default_threshold() -> f64 {
    4.0
}

fn default_seed() -> u64 {
    0
}

impl Default for LocalizerSettings {
    fn default() -> Self {
        Self {
            lo_ransac_default_threshold: default_lo_ransac_default_threshold(),
            seed: default_seed(),
            lo_ransac: LoRansacSettings::default(),
            bundle_adjuster: BundleAdjusterSettings::default(),
        }
    }
}

impl LocalizerSettings {
    #[must_use]
    pub fn seed(self, seed: u64) -> Self {
        Self { seed, ..self }
    }

    #[must_use]
    pub fn lo_ransac_default_threshold(self, lo_ransac_default_threshold: f64) -> Self {
        Self {
            lo_ransac_default_threshold,
            ..self
        }
    }
}
