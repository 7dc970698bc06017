//! Error type shared by the QMC building blocks.

use thiserror::Error;

/// Errors raised while configuring or drawing from QMC components.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum QmcError {
    #[error("Invalid RNG seed: {0}")]
    InvalidSeed(String),

    #[error("Dimension must be at least 1 (got {0})")]
    InvalidDimension(usize),

    #[error("Point count must be at least 1 (got {0})")]
    InvalidPointCount(u64),

    #[error("Korobov modulus {0} is neither prime nor a power of two")]
    InvalidKorobovModulus(u64),

    #[error("No Korobov multiplier is tabulated for modulus {0}; supply one explicitly")]
    MissingKorobovMultiplier(u64),

    #[error("Korobov multiplier {multiplier} is not coprime to modulus {modulus}")]
    InvalidKorobovMultiplier { modulus: u64, multiplier: u64 },

    #[error("Invalid polynomial Korobov component (k={k}, q={q}, s={s}): {reason}")]
    InvalidPolyComponent {
        k: u32,
        q: u32,
        s: u32,
        reason: &'static str,
    },

    #[error(
        "Polynomial Korobov point count {0} must be a power of two between 2^{min} and 2^{max}",
        min = crate::point_set::POLY_MIN_LOG2,
        max = crate::point_set::POLY_MAX_LOG2
    )]
    InvalidPolyPointCount(u64),

    #[error("Sobol dimension {requested} exceeds the maximum of {max}")]
    SobolDimension { requested: usize, max: usize },

    #[error("Sobol point count {requested} exceeds the maximum of {max}")]
    SobolPointCount { requested: u64, max: u64 },

    #[error("Digital shift base must be at least 2 (got {0})")]
    InvalidBase(u32),

    #[error("Randomization needs at least one block")]
    NoBlocks,

    #[error("Block {block} out of range ({count} blocks)")]
    BlockOutOfRange { block: usize, count: usize },

    #[error("Point budget of {0} points exhausted")]
    PointBudgetExhausted(u64),
}

pub type QmcResult<T> = Result<T, QmcError>;
