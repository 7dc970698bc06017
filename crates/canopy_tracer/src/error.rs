//! Errors that abort a simulation run.

use canopy_core::{ConfigError, SceneError, SkyFileError};
use canopy_qmc::QmcError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TraceError {
    #[error("QMC setup failed: {0}")]
    Qmc(#[from] QmcError),

    #[error("Invalid scene: {0}")]
    Scene(#[from] SceneError),

    #[error("Invalid run configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to load sky table: {0}")]
    SkyFile(#[from] SkyFileError),

    #[error("Grid resolution {0:?} needs at least one cell per axis")]
    GridResolution([usize; 3]),

    #[error("Scene has no primitives with area")]
    EmptyScene,

    #[error("Sky carries no light over the growth period")]
    EmptySky,

    #[error("Simulation state lock was poisoned by a panicked run")]
    Poisoned,
}

pub type TraceResult<T> = Result<T, TraceError>;
