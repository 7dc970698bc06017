//! Plain Monte Carlo: every point is a fresh vector of independent uniforms.

use crate::rng_stream::{RngStream, RngStreamFactory};

pub struct MonteCarlo {
    dimension: usize,
    point_count: u64,
    index: u64,
    stream: RngStream,
    point: Vec<f64>,
}

impl MonteCarlo {
    pub fn new(dimension: usize, point_count: u64, factory: &mut RngStreamFactory) -> Self {
        Self {
            dimension,
            point_count,
            index: 0,
            stream: factory.create("monte-carlo"),
            point: vec![0.0; dimension],
        }
    }

    pub fn next_point(&mut self) -> Option<&[f64]> {
        if self.index >= self.point_count {
            return None;
        }
        for x in self.point.iter_mut() {
            *x = self.stream.next_uniform();
        }
        self.index += 1;
        Some(&self.point)
    }

    /// Rewinds the point counter only; the stream keeps advancing.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    pub fn extend_dimension(&mut self, _requested_dim: usize) -> f64 {
        self.stream.next_uniform()
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
    fn test_first_point_is_random() {
        let mut mc = MonteCarlo::new(3, 4, &mut RngStreamFactory::new());
        let first = mc.next_point().unwrap();
        assert!(first.iter().all(|&x| x > 0.0 && x < 1.0));
    }

    #[test]
    fn test_budget() {
        let mut mc = MonteCarlo::new(2, 3, &mut RngStreamFactory::new());
        for _ in 0..3 {
            assert!(mc.next_point().is_some());
        }
        assert!(mc.next_point().is_none());

        mc.reset();
        assert!(mc.next_point().is_some());
    }

    #[test]
    fn test_reset_does_not_rewind_stream() {
        let mut mc = MonteCarlo::new(2, 2, &mut RngStreamFactory::new());
        let first = mc.next_point().unwrap().to_vec();
        mc.reset();
        let after_reset = mc.next_point().unwrap().to_vec();
        assert_ne!(first, after_reset);
    }

    #[test]
    fn test_reproducible_across_factories() {
        let mut a = MonteCarlo::new(4, 10, &mut RngStreamFactory::from_u64(9));
        let mut b = MonteCarlo::new(4, 10, &mut RngStreamFactory::from_u64(9));
        for _ in 0..10 {
            assert_eq!(a.next_point().unwrap(), b.next_point().unwrap());
        }
    }
}
