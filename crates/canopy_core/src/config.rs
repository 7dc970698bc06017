//! Run configuration.

use canopy_qmc::{QmcMethod, RandomizationMethod};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Quantity reported per query and band.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnType {
    /// Absorbed flux, relative to unit source irradiance
    #[default]
    AbsorbedFlux,
    /// Absorbed flux per unit area
    AbsorbedIrradiance,
    /// Incident flux per unit area on the side facing up
    IncidentUpper,
    /// Incident flux per unit area on the side facing down
    IncidentLower,
    /// Number of ray hits
    IntersectionCount,
}

/// Local scattering model applied at every bounce.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReflectanceModel {
    #[default]
    Lambertian,
    Phong,
    BlinnPhong,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RussianRoulette {
    /// Paths at or below this intensity play roulette; 0 disables it
    pub threshold: f64,
    /// Probability that a playing path survives
    pub survival: f64,
}

impl Default for RussianRoulette {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            survival: 0.5,
        }
    }
}

impl RussianRoulette {
    pub fn disabled() -> Self {
        Self {
            threshold: 0.0,
            survival: 1.0,
        }
    }
}

/// Settings of one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub method: QmcMethod,
    pub randomization: RandomizationMethod,
    /// Base of the digital shift
    pub randomization_base: u32,
    /// Independent randomizations (replications) per run
    pub blocks: usize,
    /// Coordinates taken from the point set per path; later ones are extended
    pub dimension: usize,
    /// Source rays per block
    pub points: u64,
    pub max_depth: u32,
    pub russian_roulette: RussianRoulette,
    pub spectrum_bands: usize,
    /// Relative source irradiance per band
    pub band_weights: Vec<f64>,
    pub return_types: Vec<ReturnType>,
    /// Cells along X, Y and Z
    pub grid_resolution: [usize; 3],
    /// Carry every band on one ray instead of one path per band
    pub one_ray_per_spectrum: bool,
    /// Only tally hits at depth 0
    pub first_hit_only: bool,
    pub reflectance_model: ReflectanceModel,
    /// Seed for the stream factory; the default package seed when absent
    pub seed: Option<u64>,
    pub confidence_level: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            method: QmcMethod::Sobol,
            randomization: RandomizationMethod::Additive,
            randomization_base: 2,
            blocks: 8,
            dimension: 6,
            points: 1024,
            max_depth: 8,
            russian_roulette: RussianRoulette::default(),
            spectrum_bands: 1,
            band_weights: vec![1.0],
            return_types: vec![ReturnType::AbsorbedFlux],
            grid_resolution: [16, 16, 16],
            one_ray_per_spectrum: true,
            first_hit_only: false,
            reflectance_model: ReflectanceModel::Lambertian,
            seed: None,
            confidence_level: 0.95,
        }
    }
}

impl RunConfig {
    /// Check counts and per-band tables before anything is built.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.blocks == 0 {
            return Err(ConfigError::Zero("block"));
        }
        if self.points == 0 {
            return Err(ConfigError::Zero("point"));
        }
        if self.dimension == 0 {
            return Err(ConfigError::Zero("dimension"));
        }
        if self.spectrum_bands == 0 {
            return Err(ConfigError::Zero("spectral band"));
        }
        if self.grid_resolution.iter().any(|&n| n == 0) {
            return Err(ConfigError::Zero("grid cell per axis"));
        }

        let bands = self.spectrum_bands;
        if self.band_weights.len() != bands {
            return Err(ConfigError::BandMismatch {
                field: "band_weights",
                expected: bands,
                found: self.band_weights.len(),
            });
        }
        if self.return_types.len() != bands {
            return Err(ConfigError::BandMismatch {
                field: "return_types",
                expected: bands,
                found: self.return_types.len(),
            });
        }
        if self.band_weights.iter().any(|&w| w < 0.0 || !w.is_finite())
            || self.band_weights.iter().sum::<f64>() <= 0.0
        {
            return Err(ConfigError::BandWeights);
        }

        let survival = self.russian_roulette.survival;
        if !(survival > 0.0 && survival <= 1.0) {
            return Err(ConfigError::Survival(survival));
        }
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(ConfigError::ConfidenceLevel(self.confidence_level));
        }
        Ok(())
    }

    /// Band weights scaled to sum to 1.
    pub fn normalized_band_weights(&self) -> Vec<f64> {
        let total: f64 = self.band_weights.iter().sum();
        self.band_weights.iter().map(|w| w / total).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(RunConfig::default().validate(), Ok(()));
    }

    #[test]
    fn test_band_tables_must_match() {
        let config = RunConfig {
            spectrum_bands: 2,
            ..Default::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::BandMismatch {
                field: "band_weights",
                expected: 2,
                found: 1
            })
        );

        let config = RunConfig {
            spectrum_bands: 2,
            band_weights: vec![1.0, 3.0],
            return_types: vec![ReturnType::AbsorbedFlux, ReturnType::IncidentUpper],
            ..Default::default()
        };
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.normalized_band_weights(), vec![0.25, 0.75]);
    }

    #[test]
    fn test_invalid_values() {
        let bad_survival = RunConfig {
            russian_roulette: RussianRoulette {
                threshold: 0.1,
                survival: 0.0,
            },
            ..Default::default()
        };
        assert_eq!(bad_survival.validate(), Err(ConfigError::Survival(0.0)));

        let no_points = RunConfig {
            points: 0,
            ..Default::default()
        };
        assert_eq!(no_points.validate(), Err(ConfigError::Zero("point")));

        let flat_grid = RunConfig {
            grid_resolution: [4, 0, 4],
            ..Default::default()
        };
        assert!(flat_grid.validate().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"method": {"kind": "korobov"}, "points": 251, "reflectance_model": "blinn_phong"}"#;
        let config: RunConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.method, QmcMethod::Korobov { multiplier: None });
        assert_eq!(config.points, 251);
        assert_eq!(config.reflectance_model, ReflectanceModel::BlinnPhong);
        assert_eq!(config.blocks, RunConfig::default().blocks);
    }
}
