//! Canopy Core - scene data and run configuration for light transport.
//!
//! This crate provides:
//!
//! - **Scene types**: `SceneDescription`, `Scene`, `Primitive`, `Material`
//! - **Light models**: weighted directional lights or sky parameters
//! - **Run configuration**: `RunConfig` with serde defaults
//! - **Sky files**: reading precomputed sky-intensity tables
//! - **Export**: `FluxRecord` byte views of per-primitive tallies
//!
//! # Example
//!
//! ```ignore
//! use canopy_core::{RunConfig, SceneDescription};
//!
//! let desc: SceneDescription = serde_json::from_str(&text)?;
//! let config = RunConfig::default();
//! let scene = desc.build(config.spectrum_bands)?;
//! println!("{} primitives", scene.primitive_count());
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod light;
pub mod scene;
pub mod sky_file;

// Re-export commonly used types
pub use config::{ReflectanceModel, ReturnType, RunConfig, RussianRoulette};
pub use error::{ConfigError, SceneError, SkyFileError};
pub use export::FluxRecord;
pub use light::{DirectionalLight, LightModel, SkyParameters};
pub use scene::{
    BandAccumulator, BandOptics, Material, Polygon, Primitive, PrimitiveKind, Scene,
    SceneDescription,
};
pub use sky_file::{read_sky_file, SkyTable};
