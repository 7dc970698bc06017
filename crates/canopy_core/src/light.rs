//! Light models: weighted directional lights or a physically modeled sky.

use std::path::PathBuf;

use canopy_math::DVec3;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// A parallel light source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DirectionalLight {
    /// Direction from the scene toward the light (normalized on use)
    pub direction: DVec3,

    /// Relative weight; weights are normalized across all lights
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl DirectionalLight {
    pub fn new(direction: DVec3, weight: f64) -> Self {
        Self { direction, weight }
    }

    /// Light straight above along +Y.
    pub fn overhead() -> Self {
        Self::new(DVec3::Y, 1.0)
    }
}

/// Inputs of the clear/overcast sky model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyParameters {
    /// Latitude in degrees, north positive
    pub latitude: f64,

    /// Longitude in degrees, east positive
    pub longitude: f64,

    /// Meridian of the local time zone in degrees; derived from the
    /// longitude when absent
    #[serde(default)]
    pub standard_meridian: Option<f64>,

    /// Atmospheric turbidity (2 = very clear, 10 = hazy)
    #[serde(default = "default_turbidity")]
    pub turbidity: f64,

    /// Fraction of the period with clear sky, in [0, 1]
    pub clear_fraction: f64,

    /// Day of year, 1-365
    pub julian_day: u32,

    /// Start of the growth period in local standard time (hours)
    pub start_hour: f64,

    /// End of the growth period in local standard time (hours)
    pub end_hour: f64,

    /// Integration step over the period (hours)
    #[serde(default = "default_hour_step")]
    pub hour_step: f64,

    /// Precomputed sky-intensity table; replaces the formula when present
    #[serde(default)]
    pub sky_file: Option<PathBuf>,

    #[serde(default = "default_azimuth_samples")]
    pub azimuth_samples: usize,

    #[serde(default = "default_altitude_samples")]
    pub altitude_samples: usize,
}

fn default_turbidity() -> f64 {
    2.5
}

fn default_hour_step() -> f64 {
    0.25
}

fn default_azimuth_samples() -> usize {
    72
}

fn default_altitude_samples() -> usize {
    18
}

impl Default for SkyParameters {
    fn default() -> Self {
        Self {
            latitude: 45.0,
            longitude: 0.0,
            standard_meridian: None,
            turbidity: default_turbidity(),
            clear_fraction: 1.0,
            julian_day: 172,
            start_hour: 6.0,
            end_hour: 18.0,
            hour_step: default_hour_step(),
            sky_file: None,
            azimuth_samples: default_azimuth_samples(),
            altitude_samples: default_altitude_samples(),
        }
    }
}

impl SkyParameters {
    /// Time-zone meridian, rounding the longitude to the nearest 15 degrees
    /// when none is given.
    pub fn meridian(&self) -> f64 {
        self.standard_meridian
            .unwrap_or_else(|| (self.longitude / 15.0).round() * 15.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightModel {
    Directional(Vec<DirectionalLight>),
    Sky(SkyParameters),
}

impl Default for LightModel {
    fn default() -> Self {
        LightModel::Directional(vec![DirectionalLight::overhead()])
    }
}

impl LightModel {
    /// Directional lights with unit directions and weights summing to 1.
    ///
    /// Lights with non-positive weight or a zero direction are dropped.
    pub fn normalized_lights(lights: &[DirectionalLight]) -> ConfigResult<Vec<DirectionalLight>> {
        let kept: Vec<DirectionalLight> = lights
            .iter()
            .filter(|l| l.weight > 0.0 && l.direction.length_squared() > 0.0)
            .map(|l| DirectionalLight::new(l.direction.normalize(), l.weight))
            .collect();

        let total: f64 = kept.iter().map(|l| l.weight).sum();
        if kept.is_empty() || total <= 0.0 {
            return Err(ConfigError::NoLights);
        }
        if kept.len() < lights.len() {
            log::warn!(
                "Dropped {} directional lights with zero weight or direction",
                lights.len() - kept.len()
            );
        }

        Ok(kept
            .into_iter()
            .map(|l| DirectionalLight::new(l.direction, l.weight / total))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_lights() {
        let lights = [
            DirectionalLight::new(DVec3::new(0.0, 2.0, 0.0), 3.0),
            DirectionalLight::new(DVec3::new(1.0, 1.0, 0.0), 1.0),
            DirectionalLight::new(DVec3::X, 0.0),
        ];
        let normalized = LightModel::normalized_lights(&lights).unwrap();
        assert_eq!(normalized.len(), 2);
        assert_eq!(normalized[0].direction, DVec3::Y);
        assert!((normalized[0].weight - 0.75).abs() < 1e-12);
        assert!((normalized[1].direction.length() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_no_usable_lights() {
        let lights = [DirectionalLight::new(DVec3::ZERO, 1.0)];
        assert_eq!(LightModel::normalized_lights(&lights), Err(ConfigError::NoLights));
        assert_eq!(LightModel::normalized_lights(&[]), Err(ConfigError::NoLights));
    }

    #[test]
    fn test_meridian_from_longitude() {
        let params = SkyParameters {
            longitude: -79.0,
            ..Default::default()
        };
        assert_eq!(params.meridian(), -75.0);

        let params = SkyParameters {
            standard_meridian: Some(-90.0),
            ..params
        };
        assert_eq!(params.meridian(), -90.0);
    }

    #[test]
    fn test_deserialize_sky() {
        let json = r#"{"sky": {"latitude": 52.0, "longitude": 5.0, "clear_fraction": 0.5,
                       "julian_day": 100, "start_hour": 8.0, "end_hour": 16.0}}"#;
        let model: LightModel = serde_json::from_str(json).unwrap();
        match model {
            LightModel::Sky(p) => {
                assert_eq!(p.turbidity, 2.5);
                assert_eq!(p.azimuth_samples, 72);
                assert!(p.sky_file.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
