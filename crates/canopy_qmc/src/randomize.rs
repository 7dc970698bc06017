//! Randomized QMC: per-block random shifts applied to deterministic points.
//!
//! Each block owns one shift vector drawn from a dedicated stream, together
//! with the stream position right after that draw. Coordinates past the
//! declared dimension are shifted with further draws replayed from that
//! position, so every block treats extra dimensions consistently.

use serde::{Deserialize, Serialize};

use crate::error::{QmcError, QmcResult};
use crate::point_set::PointSet;
use crate::rng_stream::{RngStream, RngStreamFactory, StreamState};

/// Bits of mantissa used for fixed-point digit arithmetic.
const MANTISSA_BITS: u32 = 52;
const TWO_52: f64 = 4503599627370496.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RandomizationMethod {
    /// Points pass through unchanged.
    #[default]
    None,
    /// Add the shift and reduce mod 1.
    Additive,
    /// Digit-wise addition mod the base (XOR in base 2).
    Digital,
}

/// Number of base-`b` digits that fit exactly in a 52-bit integer.
pub fn digit_count(base: u32) -> u32 {
    if base == 2 {
        return MANTISSA_BITS;
    }
    (MANTISSA_BITS as f64 / (base as f64).log2()).floor() as u32
}

/// `x + shift mod 1`, coordinate by coordinate.
pub fn shift_additive(point: &mut [f64], shift: &[f64]) {
    for (x, s) in point.iter_mut().zip(shift) {
        *x = wrap_unit(*x + s);
    }
}

/// Digit-wise sum mod `base` of the first `digits` base-`base` digits.
pub fn shift_digital(point: &mut [f64], shift: &[f64], base: u32, digits: u32) {
    if base == 2 {
        for (x, s) in point.iter_mut().zip(shift) {
            let xi = (*x * TWO_52) as u64;
            let si = (*s * TWO_52) as u64;
            *x = (xi ^ si) as f64 / TWO_52;
        }
        return;
    }

    let b = base as u64;
    let scale = b.pow(digits);
    for (x, s) in point.iter_mut().zip(shift) {
        let mut xi = (*x * scale as f64) as u64;
        let mut si = (*s * scale as f64) as u64;
        let mut result = 0u64;
        let mut place = 1u64;
        for _ in 0..digits {
            result += ((xi % b + si % b) % b) * place;
            xi /= b;
            si /= b;
            place *= b;
        }
        *x = result as f64 / scale as f64;
    }
}

#[inline]
fn wrap_unit(x: f64) -> f64 {
    let w = x - x.floor();
    // x slightly below an integer can round up to exactly 1.0
    if w >= 1.0 {
        0.0
    } else {
        w
    }
}

/// Per-block randomization state.
pub struct Randomization {
    method: RandomizationMethod,
    dimension: usize,
    base: u32,
    digits: u32,
    stream: RngStream,
    vectors: Vec<Vec<f64>>,
    snapshots: Vec<StreamState>,
    current_block: usize,
}

impl Randomization {
    /// Create the randomization and draw one shift vector per block.
    pub fn new(
        dimension: usize,
        method: RandomizationMethod,
        base: u32,
        num_blocks: usize,
        factory: &mut RngStreamFactory,
    ) -> QmcResult<Self> {
        if dimension == 0 {
            return Err(QmcError::InvalidDimension(dimension));
        }
        if num_blocks == 0 {
            return Err(QmcError::NoBlocks);
        }
        if method == RandomizationMethod::Digital && base < 2 {
            return Err(QmcError::InvalidBase(base));
        }

        let mut randomization = Self {
            method,
            dimension,
            base,
            digits: digit_count(base.max(2)),
            stream: factory.create("randomization"),
            vectors: Vec::with_capacity(num_blocks),
            snapshots: Vec::with_capacity(num_blocks),
            current_block: 0,
        };
        for _ in 0..num_blocks {
            randomization.generate_random_vector();
        }

        log::debug!(
            "Randomization {:?}: {} blocks, dimension {}, base {} ({} digits)",
            method,
            num_blocks,
            dimension,
            randomization.base,
            randomization.digits
        );
        Ok(randomization)
    }

    /// Draw the shift vector of a new block and snapshot the stream after it.
    pub fn generate_random_vector(&mut self) -> &[f64] {
        // Extra-dimension draws move the stream; resume where the last vector ended
        if let Some(last) = self.snapshots.last() {
            self.stream.restore_state(last);
        }

        let vector: Vec<f64> = (0..self.dimension).map(|_| self.stream.next_uniform()).collect();
        self.snapshots.push(self.stream.save_state());
        self.vectors.push(vector);
        &self.vectors[self.vectors.len() - 1]
    }

    /// Make `block` the current block and return its shift vector.
    pub fn select_block(&mut self, block: usize) -> QmcResult<&[f64]> {
        self.check_block(block)?;
        self.current_block = block;
        Ok(&self.vectors[block])
    }

    pub fn current_block(&self) -> usize {
        self.current_block
    }

    /// Randomize `point` in place with the shift of `block`.
    pub fn apply(&self, point: &mut [f64], block: usize) -> QmcResult<()> {
        self.check_block(block)?;
        let shift = &self.vectors[block];
        match self.method {
            RandomizationMethod::None => {}
            RandomizationMethod::Additive => shift_additive(point, shift),
            RandomizationMethod::Digital => shift_digital(point, shift, self.base, self.digits),
        }
        Ok(())
    }

    /// Randomized coordinate `dim` (zero-based, at or past the declared
    /// dimension) of the point set's current point.
    pub fn higher_dimension_value(
        &mut self,
        point_set: &mut PointSet,
        block: usize,
        dim: usize,
    ) -> QmcResult<f64> {
        self.check_block(block)?;
        let value = point_set.extend_dimension(dim);
        Ok(self.shift_past_dimension(value, dim, block))
    }

    /// Shift an extended coordinate `value` of dimension `dim` with the
    /// current block's stream.
    pub fn shift_extension(&mut self, value: f64, dim: usize) -> f64 {
        self.shift_past_dimension(value, dim, self.current_block)
    }

    fn shift_past_dimension(&mut self, value: f64, dim: usize, block: usize) -> f64 {
        if self.method == RandomizationMethod::None {
            return value;
        }
        self.stream.restore_state(&self.snapshots[block]);
        for _ in self.dimension..dim {
            self.stream.next_uniform();
        }
        let shift = self.stream.next_uniform();
        wrap_unit(value + shift)
    }

    pub fn method(&self) -> RandomizationMethod {
        self.method
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn block_count(&self) -> usize {
        self.vectors.len()
    }

    fn check_block(&self, block: usize) -> QmcResult<()> {
        if block >= self.vectors.len() {
            return Err(QmcError::BlockOutOfRange {
                block,
                count: self.vectors.len(),
            });
        }
        Ok(())
    }
}
