//! Canopy QMC - sampling and estimation building blocks.
//!
//! This crate provides:
//!
//! - **RNG streams**: MRG32k3a streams handed out by an explicit factory
//! - **Point sets**: Monte Carlo, Korobov, polynomial Korobov and Sobol generators
//! - **Randomization**: per-block additive or digital shifts for RQMC
//! - **Statistics**: blocked mean, variance, covariance and t-intervals
//!
//! # Example
//!
//! ```ignore
//! use canopy_qmc::{PointSet, QmcMethod, RngStreamFactory};
//!
//! let mut factory = RngStreamFactory::new();
//! let mut points = PointSet::new(&QmcMethod::Sobol, 4, 1024, &mut factory)?;
//! while let Some(p) = points.next_point() {
//!     println!("{:?}", p);
//! }
//! ```

pub mod error;
pub mod point_set;
pub mod randomize;
pub mod rng_stream;
pub mod stats;

// Re-export commonly used types
pub use error::{QmcError, QmcResult};
pub use point_set::{PointSet, PolyComponent, QmcMethod};
pub use randomize::{Randomization, RandomizationMethod};
pub use rng_stream::{ResetTarget, RngStream, RngStreamFactory};
pub use stats::{ConfidenceInterval, Statistics, Variable};
