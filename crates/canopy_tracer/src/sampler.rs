//! Uniform numbers for path construction.
//!
//! A path reads its coordinates in order from one randomized QMC point:
//! the source position and direction first, then scattering and roulette
//! decisions. Coordinates past the point set's dimension are extended and
//! shifted with the current block's stream.

use canopy_core::RunConfig;
use canopy_qmc::{PointSet, QmcError, Randomization, RngStream, RngStreamFactory};

use crate::error::TraceResult;

/// Source of uniform numbers in [0, 1) consumed by the tracer.
pub trait UniformSource {
    fn next_uniform(&mut self) -> f64;
}

impl UniformSource for RngStream {
    fn next_uniform(&mut self) -> f64 {
        RngStream::next_uniform(self)
    }
}

pub struct QmcSampler {
    point_set: PointSet,
    randomization: Randomization,
    /// Randomized coordinates of the current path
    point: Vec<f64>,
    /// Next coordinate to hand out
    cursor: usize,
}

impl QmcSampler {
    /// Build the point set and per-block shifts described by `config`.
    pub fn new(config: &RunConfig, factory: &mut RngStreamFactory) -> TraceResult<Self> {
        let point_set = PointSet::new(&config.method, config.dimension, config.points, factory)?;
        let randomization = Randomization::new(
            config.dimension,
            config.randomization,
            config.randomization_base,
            config.blocks,
            factory,
        )?;
        Ok(Self {
            point: Vec::with_capacity(config.dimension),
            cursor: config.dimension,
            point_set,
            randomization,
        })
    }

    /// Rewind the point set and switch to the shift of `block`.
    pub fn begin_block(&mut self, block: usize) -> TraceResult<()> {
        self.point_set.reset();
        self.randomization.select_block(block)?;
        self.point.clear();
        self.cursor = 0;
        Ok(())
    }

    /// Load the next point; fails once the block's points are used up.
    pub fn next_path(&mut self) -> TraceResult<()> {
        let budget = self.point_set.point_count();
        let point = self
            .point_set
            .next_point()
            .ok_or(QmcError::PointBudgetExhausted(budget))?;

        self.point.clear();
        self.point.extend_from_slice(point);
        let block = self.randomization.current_block();
        self.randomization.apply(&mut self.point, block)?;
        self.cursor = 0;
        Ok(())
    }

    pub fn dimension(&self) -> usize {
        self.point_set.dimension()
    }

    pub fn point_count(&self) -> u64 {
        self.point_set.point_count()
    }

    pub fn method_name(&self) -> &'static str {
        self.point_set.method_name()
    }
}

impl UniformSource for QmcSampler {
    fn next_uniform(&mut self) -> f64 {
        let dim = self.cursor;
        self.cursor += 1;
        if dim < self.point.len() {
            return self.point[dim];
        }
        let raw = self.point_set.extend_dimension(dim);
        self.randomization.shift_extension(raw, dim)
    }
}
