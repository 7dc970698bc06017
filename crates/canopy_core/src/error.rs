//! Errors raised while building scenes, validating run settings and reading
//! sky files.

use thiserror::Error;

/// Errors that can occur while turning a scene description into a scene.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("Polygon {polygon} has {count} vertices; only triangles and quads are supported")]
    BadVertexCount { polygon: usize, count: usize },

    #[error("Polygon {polygon} references unknown material {material}")]
    UnknownMaterial { polygon: usize, material: usize },

    #[error("Material '{name}' has {found} bands for {property}, expected {expected}")]
    MaterialBands {
        name: String,
        property: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Scene needs at least one spectral band")]
    EmptySpectrum,

    #[error("Up vector must be non-zero")]
    ZeroUp,
}

/// Result type for scene construction.
pub type SceneResult<T> = Result<T, SceneError>;

/// Errors found when validating a run configuration.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Run needs at least one {0}")]
    Zero(&'static str),

    #[error("{field} has {found} entries, expected one per band ({expected})")]
    BandMismatch {
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Russian roulette survival probability must be in (0, 1], got {0}")]
    Survival(f64),

    #[error("Band weights must be non-negative with a positive sum")]
    BandWeights,

    #[error("Light model has no directional lights with positive weight")]
    NoLights,

    #[error("Confidence level must be in (0, 1), got {0}")]
    ConfidenceLevel(f64),
}

/// Result type for configuration checks.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while reading a sky-intensity file.
#[derive(Error, Debug)]
pub enum SkyFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed header: {0}")]
    Header(String),

    #[error("Malformed entry {index}: {message}")]
    Entry { index: usize, message: String },

    #[error("Expected {expected} entries, found {found}")]
    Count { expected: usize, found: usize },
}

/// Result type for sky-file reading.
pub type SkyFileResult<T> = Result<T, SkyFileError>;
