//! Sobol digital net in base 2 with Gray-code ordering.
//!
//! Direction numbers come from primitive polynomials over GF(2) and their
//! initial odd integers `m_1..m_s` (Joe-Kuo style table). Point `k + 1` is
//! point `k` XOR the direction number indexed by the rightmost zero bit of `k`.

use crate::error::{QmcError, QmcResult};
use crate::rng_stream::{RngStream, RngStreamFactory};

const BITS: usize = 32;

/// Largest supported point count: 2^(BITS - 1).
pub const SOBOL_MAX_POINTS: u64 = 1 << (BITS - 1);

/// Polynomial degree, interior coefficient bits and initial direction
/// integers for dimensions 2 onward. Dimension 1 is the van der Corput
/// sequence.
const DIRECTION_TABLE: &[(u32, u32, &[u32])] = &[
    (1, 0, &[1]),
    (2, 1, &[1, 3]),
    (3, 1, &[1, 3, 1]),
    (3, 2, &[1, 1, 1]),
    (4, 1, &[1, 1, 3, 3]),
    (4, 4, &[1, 3, 5, 13]),
    (5, 2, &[1, 1, 5, 5, 17]),
    (5, 4, &[1, 1, 5, 5, 5]),
    (5, 7, &[1, 1, 7, 11, 19]),
    (5, 11, &[1, 1, 5, 1, 1]),
    (5, 13, &[1, 1, 1, 3, 11]),
    (5, 14, &[1, 3, 5, 5, 31]),
    (6, 1, &[1, 3, 3, 9, 7, 49]),
    (6, 13, &[1, 1, 1, 15, 21, 21]),
    (6, 16, &[1, 3, 1, 13, 27, 49]),
    (6, 19, &[1, 1, 1, 15, 7, 5]),
    (6, 22, &[1, 3, 1, 15, 13, 25]),
    (6, 25, &[1, 1, 5, 5, 19, 61]),
    (7, 1, &[1, 3, 7, 11, 23, 15, 103]),
    (7, 4, &[1, 3, 7, 13, 13, 15, 69]),
];

/// Largest supported dimension.
pub const SOBOL_MAX_DIMENSION: usize = DIRECTION_TABLE.len() + 1;

/// Direction numbers `v[j][b]` for `dimension` coordinates.
fn direction_numbers(dimension: usize) -> Vec<[u32; BITS]> {
    let mut all = Vec::with_capacity(dimension);

    let mut first = [0u32; BITS];
    for (b, v) in first.iter_mut().enumerate() {
        *v = 1 << (BITS - 1 - b);
    }
    all.push(first);

    for &(degree, coeffs, m) in DIRECTION_TABLE.iter().take(dimension.saturating_sub(1)) {
        let s = degree as usize;
        let mut v = [0u32; BITS];
        for b in 0..BITS {
            if b < s {
                v[b] = m[b] << (BITS - 1 - b);
            } else {
                let mut value = v[b - s] ^ (v[b - s] >> s);
                for i in 1..s {
                    if (coeffs >> (s - 1 - i)) & 1 == 1 {
                        value ^= v[b - i];
                    }
                }
                v[b] = value;
            }
        }
        all.push(v);
    }

    all
}

pub struct Sobol {
    dimension: usize,
    point_count: u64,
    index: u64,
    directions: Vec<[u32; BITS]>,
    state: Vec<u32>,
    point: Vec<f64>,
    extension: RngStream,
}

impl Sobol {
    pub fn new(dimension: usize, point_count: u64, factory: &mut RngStreamFactory) -> QmcResult<Self> {
        if dimension > SOBOL_MAX_DIMENSION {
            return Err(QmcError::SobolDimension {
                requested: dimension,
                max: SOBOL_MAX_DIMENSION,
            });
        }
        if point_count > SOBOL_MAX_POINTS {
            return Err(QmcError::SobolPointCount {
                requested: point_count,
                max: SOBOL_MAX_POINTS,
            });
        }

        Ok(Self {
            dimension,
            point_count,
            index: 0,
            directions: direction_numbers(dimension),
            state: vec![0; dimension],
            point: vec![0.0; dimension],
            extension: factory.create("sobol-extension"),
        })
    }

    pub fn next_point(&mut self) -> Option<&[f64]> {
        if self.index >= self.point_count {
            return None;
        }

        if self.index > 0 {
            let c = (!(self.index - 1)).trailing_zeros() as usize;
            for (x, v) in self.state.iter_mut().zip(&self.directions) {
                *x ^= v[c];
            }
        }
        for (p, x) in self.point.iter_mut().zip(&self.state) {
            *p = *x as f64 / 4294967296.0;
        }

        self.index += 1;
        Some(&self.point)
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.directions = direction_numbers(self.dimension);
        self.state.iter_mut().for_each(|x| *x = 0);
        self.point.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Coordinates past the table are drawn from the generator's own stream.
    pub fn extend_dimension(&mut self, _requested_dim: usize) -> f64 {
        self.extension.next_uniform()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn point_count(&self) -> u64 {
        self.point_count
    }

    pub fn index(&self) -> u64 {
        self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_direction_integers_are_valid() {
        for &(degree, coeffs, m) in DIRECTION_TABLE {
            assert_eq!(m.len(), degree as usize);
            assert!(coeffs < (1 << degree.saturating_sub(1)).max(1));
            for (i, &mi) in m.iter().enumerate() {
                assert_eq!(mi % 2, 1, "m must be odd");
                assert!(mi < (1 << (i + 1)), "m_i must be below 2^i");
            }
        }
    }

    #[test]
    fn test_known_points() {
        let mut sobol = Sobol::new(2, 8, &mut RngStreamFactory::new()).unwrap();
        let expected = [
            [0.0, 0.0],
            [0.5, 0.5],
            [0.75, 0.25],
            [0.25, 0.75],
            [0.375, 0.375],
            [0.875, 0.875],
        ];
        for e in expected {
            assert_eq!(sobol.next_point().unwrap(), &e);
        }
    }

    #[test]
    fn test_net_property_first_dimensions() {
        // Every 2-D elementary interval of volume 1/16 holds exactly one of the first 16 points
        let mut sobol = Sobol::new(2, 16, &mut RngStreamFactory::new()).unwrap();
        let mut cells = [[0u32; 4]; 4];
        while let Some(p) = sobol.next_point() {
            cells[(p[0] * 4.0) as usize][(p[1] * 4.0) as usize] += 1;
        }
        for row in cells {
            assert!(row.iter().all(|&c| c == 1));
        }
    }

    #[test]
    fn test_limits() {
        let mut factory = RngStreamFactory::new();
        assert!(Sobol::new(SOBOL_MAX_DIMENSION, 16, &mut factory).is_ok());
        assert!(matches!(
            Sobol::new(SOBOL_MAX_DIMENSION + 1, 16, &mut factory),
            Err(QmcError::SobolDimension { .. })
        ));
        assert!(matches!(
            Sobol::new(2, SOBOL_MAX_POINTS + 1, &mut factory),
            Err(QmcError::SobolPointCount { .. })
        ));
    }

    #[test]
    fn test_reset_reproduces_sequence() {
        let mut sobol = Sobol::new(SOBOL_MAX_DIMENSION, 512, &mut RngStreamFactory::new()).unwrap();
        let first: Vec<Vec<f64>> = (0..512).map(|_| sobol.next_point().unwrap().to_vec()).collect();
        assert!(sobol.next_point().is_none());

        sobol.reset();
        let second: Vec<Vec<f64>> = (0..512).map(|_| sobol.next_point().unwrap().to_vec()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_each_coordinate_is_stratified() {
        let n = 64;
        let mut sobol = Sobol::new(SOBOL_MAX_DIMENSION, n, &mut RngStreamFactory::new()).unwrap();
        let mut counts = vec![vec![0u32; n as usize]; SOBOL_MAX_DIMENSION];
        while let Some(p) = sobol.next_point() {
            for (j, x) in p.iter().enumerate() {
                counts[j][(x * n as f64) as usize] += 1;
            }
        }
        for dim in counts {
            assert!(dim.iter().all(|&c| c == 1));
        }
    }
}
