//! Canopy light transport.
//!
//! Quasi-Monte Carlo path tracing of light through a scene of triangles and
//! quads, accelerated by a uniform grid. Source rays come from weighted
//! directional lights or an importance-sampled sky; per-query tallies are
//! gathered over independently randomized blocks.

pub mod error;
pub mod grid;
pub mod intersect;
pub mod overlap;
pub mod ray;
pub mod reflectance;
pub mod sampler;
pub mod simulation;
pub mod sky;
pub mod tracer;

pub use error::{TraceError, TraceResult};
pub use grid::{CellWalker, Grid, GRID_EPSILON};
pub use intersect::is_intersection;
pub use overlap::tri_box_overlap;
pub use ray::Ray;
pub use sampler::{QmcSampler, UniformSource};
pub use simulation::{
    QueryBandResult, QueryResult, Simulation, SimulationResult, SimulationState, SourceRays,
};
pub use sky::{SkyModel, SkySample};
pub use tracer::{Hit, PathState, TraceSettings, Tracer};
