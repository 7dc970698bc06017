//! Low-discrepancy point-set generators.
//!
//! Four generators share one contract: construct with a dimension and point
//! budget, draw points with [`PointSet::next_point`], rewind with
//! [`PointSet::reset`], and ask for coordinates past the declared dimension
//! with [`PointSet::extend_dimension`]. Dropping the value releases it.
//!
//! The slice returned by `next_point` is the generator's internal buffer and
//! is overwritten by the next draw; copy it if it must outlive the borrow.

mod korobov;
mod monte_carlo;
mod poly_korobov;
mod sobol;

use serde::{Deserialize, Serialize};

use crate::error::{QmcError, QmcResult};
use crate::rng_stream::RngStreamFactory;

pub use korobov::{tabulated_multiplier, Korobov};
pub use monte_carlo::MonteCarlo;
pub use poly_korobov::{default_components, PolyComponent, PolyKorobov, POLY_MAX_LOG2, POLY_MIN_LOG2};
pub use sobol::{Sobol, SOBOL_MAX_DIMENSION, SOBOL_MAX_POINTS};

/// Which generator to build, with its numeric parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QmcMethod {
    MonteCarlo,
    Korobov {
        #[serde(default)]
        multiplier: Option<u64>,
    },
    PolyKorobov {
        #[serde(default)]
        components: Option<Vec<PolyComponent>>,
    },
    #[default]
    Sobol,
}

impl QmcMethod {
    pub fn name(&self) -> &'static str {
        match self {
            QmcMethod::MonteCarlo => "monte-carlo",
            QmcMethod::Korobov { .. } => "korobov",
            QmcMethod::PolyKorobov { .. } => "poly-korobov",
            QmcMethod::Sobol => "sobol",
        }
    }

    /// True for generators whose points are a fixed deterministic sequence.
    pub fn is_low_discrepancy(&self) -> bool {
        !matches!(self, QmcMethod::MonteCarlo)
    }
}

/// A point-set generator of one of the supported kinds.
pub enum PointSet {
    MonteCarlo(MonteCarlo),
    Korobov(Korobov),
    PolyKorobov(PolyKorobov),
    Sobol(Sobol),
}

impl PointSet {
    /// Build a generator of `point_count` points in `dimension` coordinates.
    pub fn new(
        method: &QmcMethod,
        dimension: usize,
        point_count: u64,
        factory: &mut RngStreamFactory,
    ) -> QmcResult<Self> {
        if dimension == 0 {
            return Err(QmcError::InvalidDimension(dimension));
        }
        if point_count == 0 {
            return Err(QmcError::InvalidPointCount(point_count));
        }

        let set = match method {
            QmcMethod::MonteCarlo => {
                PointSet::MonteCarlo(MonteCarlo::new(dimension, point_count, factory))
            }
            QmcMethod::Korobov { multiplier } => {
                PointSet::Korobov(Korobov::new(dimension, point_count, *multiplier)?)
            }
            QmcMethod::PolyKorobov { components } => PointSet::PolyKorobov(PolyKorobov::new(
                dimension,
                point_count,
                components.clone(),
            )?),
            QmcMethod::Sobol => PointSet::Sobol(Sobol::new(dimension, point_count, factory)?),
        };
        Ok(set)
    }

    /// Next point, or `None` once `point_count` points have been drawn.
    pub fn next_point(&mut self) -> Option<&[f64]> {
        match self {
            PointSet::MonteCarlo(g) => g.next_point(),
            PointSet::Korobov(g) => g.next_point(),
            PointSet::PolyKorobov(g) => g.next_point(),
            PointSet::Sobol(g) => g.next_point(),
        }
    }

    /// Rewind to the first point.
    pub fn reset(&mut self) {
        match self {
            PointSet::MonteCarlo(g) => g.reset(),
            PointSet::Korobov(g) => g.reset(),
            PointSet::PolyKorobov(g) => g.reset(),
            PointSet::Sobol(g) => g.reset(),
        }
    }

    /// A coordinate of the current point beyond the declared dimension.
    pub fn extend_dimension(&mut self, requested_dim: usize) -> f64 {
        match self {
            PointSet::MonteCarlo(g) => g.extend_dimension(requested_dim),
            PointSet::Korobov(g) => g.extend_dimension(requested_dim),
            PointSet::PolyKorobov(g) => g.extend_dimension(requested_dim),
            PointSet::Sobol(g) => g.extend_dimension(requested_dim),
        }
    }

    pub fn dimension(&self) -> usize {
        match self {
            PointSet::MonteCarlo(g) => g.dimension(),
            PointSet::Korobov(g) => g.dimension(),
            PointSet::PolyKorobov(g) => g.dimension(),
            PointSet::Sobol(g) => g.dimension(),
        }
    }

    pub fn point_count(&self) -> u64 {
        match self {
            PointSet::MonteCarlo(g) => g.point_count(),
            PointSet::Korobov(g) => g.point_count(),
            PointSet::PolyKorobov(g) => g.point_count(),
            PointSet::Sobol(g) => g.point_count(),
        }
    }

    /// Number of points drawn since the last reset.
    pub fn index(&self) -> u64 {
        match self {
            PointSet::MonteCarlo(g) => g.index(),
            PointSet::Korobov(g) => g.index(),
            PointSet::PolyKorobov(g) => g.index(),
            PointSet::Sobol(g) => g.index(),
        }
    }

    pub fn method_name(&self) -> &'static str {
        match self {
            PointSet::MonteCarlo(_) => "monte-carlo",
            PointSet::Korobov(_) => "korobov",
            PointSet::PolyKorobov(_) => "poly-korobov",
            PointSet::Sobol(_) => "sobol",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw_all(set: &mut PointSet) -> Vec<Vec<f64>> {
        let mut points = Vec::new();
        while let Some(p) = set.next_point() {
            points.push(p.to_vec());
        }
        points
    }

    #[test]
    fn test_deterministic_sets_reproduce_after_reset() {
        let methods = [
            QmcMethod::Korobov { multiplier: None },
            QmcMethod::PolyKorobov { components: None },
            QmcMethod::Sobol,
        ];
        for method in methods {
            let mut factory = RngStreamFactory::new();
            let mut set = PointSet::new(&method, 4, 256, &mut factory).unwrap();
            let first = draw_all(&mut set);
            assert_eq!(first.len(), 256, "{}", method.name());
            assert!(first[0].iter().all(|&x| x == 0.0));

            set.reset();
            assert_eq!(first, draw_all(&mut set), "{}", method.name());
        }
    }

    #[test]
    fn test_monte_carlo_reproducible_from_seed() {
        let mut a = PointSet::new(&QmcMethod::MonteCarlo, 3, 50, &mut RngStreamFactory::from_u64(1)).unwrap();
        let mut b = PointSet::new(&QmcMethod::MonteCarlo, 3, 50, &mut RngStreamFactory::from_u64(1)).unwrap();
        assert_eq!(draw_all(&mut a), draw_all(&mut b));
    }

    #[test]
    fn test_invalid_configuration() {
        let mut factory = RngStreamFactory::new();
        assert!(PointSet::new(&QmcMethod::Sobol, 0, 16, &mut factory).is_err());
        assert!(PointSet::new(&QmcMethod::Sobol, 2, 0, &mut factory).is_err());
        assert!(PointSet::new(&QmcMethod::Korobov { multiplier: None }, 2, 1000, &mut factory).is_err());
    }

    #[test]
    fn test_points_in_unit_cube() {
        let methods = [
            QmcMethod::MonteCarlo,
            QmcMethod::Korobov { multiplier: None },
            QmcMethod::PolyKorobov { components: None },
            QmcMethod::Sobol,
        ];
        for method in methods {
            let mut set = PointSet::new(&method, 6, 128, &mut RngStreamFactory::new()).unwrap();
            while let Some(p) = set.next_point() {
                assert!(p.iter().all(|&x| (0.0..1.0).contains(&x)));
            }
            let extra = set.extend_dimension(6);
            assert!((0.0..1.0).contains(&extra));
        }
    }

    #[test]
    fn test_method_deserialize() {
        let m: QmcMethod = serde_json::from_str(r#"{"kind":"korobov","multiplier":12}"#).unwrap();
        assert_eq!(m, QmcMethod::Korobov { multiplier: Some(12) });

        let m: QmcMethod = serde_json::from_str(r#"{"kind":"poly_korobov"}"#).unwrap();
        assert_eq!(m, QmcMethod::PolyKorobov { components: None });

        let m: QmcMethod = serde_json::from_str(r#"{"kind":"sobol"}"#).unwrap();
        assert_eq!(m, QmcMethod::Sobol);
    }
}
