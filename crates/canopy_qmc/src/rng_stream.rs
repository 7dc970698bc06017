//! Multiple independent streams of uniform random numbers.
//!
//! A combined multiple-recursive generator (two order-3 recurrences modulo
//! primes just below 2^32) with a period close to 2^191. The period is cut
//! into streams of 2^127 values and each stream into blocks (substreams) of
//! 2^76 values, so streams created in sequence never overlap.
//!
//! All arithmetic is carried out in `f64`. Products that would exceed 2^53
//! are split so every intermediate value stays exact.

use crate::error::{QmcError, QmcResult};

const M1: f64 = 4294967087.0;
const M2: f64 = 4294944443.0;
const NORM: f64 = 2.328306549295727688e-10;
const A12: f64 = 1403580.0;
const A13N: f64 = 810728.0;
const A21: f64 = 527612.0;
const A23N: f64 = 1370589.0;

const TWO17: f64 = 131072.0;
const TWO53: f64 = 9007199254740992.0;
const FACT: f64 = 5.9604644775390625e-8; // 2^-24

type Matrix = [[f64; 3]; 3];

/// Transition matrices of the two components.
const A1P0: Matrix = [
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [-A13N, A12, 0.0],
];
const A2P0: Matrix = [
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [-A23N, 0.0, A21],
];

/// Inverses of the transition matrices.
const INV_A1: Matrix = [
    [184888585.0, 0.0, 1945170933.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
];
const INV_A2: Matrix = [
    [0.0, 360363334.0, 4225571728.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
];

/// Jump 2^76 steps (one block).
const A1P76: Matrix = [
    [82758667.0, 1871391091.0, 4127413238.0],
    [3672831523.0, 69195019.0, 1871391091.0],
    [3672091415.0, 3528743235.0, 69195019.0],
];
const A2P76: Matrix = [
    [1511326704.0, 3759209742.0, 1610795712.0],
    [4292754251.0, 1511326704.0, 3889917532.0],
    [3859662829.0, 4292754251.0, 3708466080.0],
];

/// Jump 2^127 steps (one stream).
const A1P127: Matrix = [
    [2427906178.0, 3580155704.0, 949770784.0],
    [226153695.0, 1230515664.0, 3580155704.0],
    [1988835001.0, 986791581.0, 1230515664.0],
];
const A2P127: Matrix = [
    [1464411153.0, 277697599.0, 1610723613.0],
    [32183930.0, 1464411153.0, 1022607788.0],
    [2824425944.0, 32183930.0, 2093834863.0],
];

/// Seed used when no package seed is given.
pub const DEFAULT_SEED: [f64; 6] = [12345.0; 6];

/// Where [`RngStream::reset`] rewinds to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetTarget {
    /// Initial state of the stream.
    StreamStart,
    /// Start of the current block.
    BlockStart,
    /// Start of the block following the current one.
    NextBlock,
}

/// Compute `(a*s + c) mod m` exactly, for `|a|, |s|, |c| < m < 2^35`.
fn mult_mod_m(a: f64, s: f64, c: f64, m: f64) -> f64 {
    let mut v = a * s + c;

    if v >= TWO53 || v <= -TWO53 {
        let a1 = (a / TWO17).trunc();
        let a = a - a1 * TWO17;
        v = a1 * s;
        let k = (v / m).trunc();
        v -= k * m;
        v = v * TWO17 + a * s + c;
    }

    let k = (v / m).trunc();
    v -= k * m;
    if v < 0.0 {
        v += m;
    }
    v
}

fn mat_vec_mod_m(a: &Matrix, s: &[f64], m: f64) -> [f64; 3] {
    let mut x = [0.0; 3];
    for (i, row) in a.iter().enumerate() {
        let mut v = mult_mod_m(row[0], s[0], 0.0, m);
        v = mult_mod_m(row[1], s[1], v, m);
        v = mult_mod_m(row[2], s[2], v, m);
        x[i] = v;
    }
    x
}

fn mat_mat_mod_m(a: &Matrix, b: &Matrix, m: f64) -> Matrix {
    let mut c = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            let mut v = mult_mod_m(a[i][0], b[0][j], 0.0, m);
            v = mult_mod_m(a[i][1], b[1][j], v, m);
            v = mult_mod_m(a[i][2], b[2][j], v, m);
            c[i][j] = v;
        }
    }
    c
}

/// `A^(2^e) mod m` by repeated squaring.
fn mat_two_pow_mod_m(a: &Matrix, m: f64, e: u32) -> Matrix {
    let mut b = *a;
    for _ in 0..e {
        b = mat_mat_mod_m(&b, &b, m);
    }
    b
}

/// `A^n mod m` by binary exponentiation.
fn mat_pow_mod_m(a: &Matrix, m: f64, mut n: u64) -> Matrix {
    let mut w = *a;
    let mut b = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
    while n > 0 {
        if n % 2 == 1 {
            b = mat_mat_mod_m(&w, &b, m);
        }
        w = mat_mat_mod_m(&w, &w, m);
        n /= 2;
    }
    b
}

/// Check that a seed lies in the valid sub-modulus range.
fn check_seed(seed: &[f64; 6]) -> QmcResult<()> {
    for (i, &s) in seed.iter().enumerate() {
        let m = if i < 3 { M1 } else { M2 };
        if s < 0.0 || s >= m || s.fract() != 0.0 {
            return Err(QmcError::InvalidSeed(format!(
                "seed[{i}] = {s} must be an integer in [0, {m})"
            )));
        }
    }
    if seed[..3].iter().all(|&s| s == 0.0) {
        return Err(QmcError::InvalidSeed("first three seed values are all 0".into()));
    }
    if seed[3..].iter().all(|&s| s == 0.0) {
        return Err(QmcError::InvalidSeed("last three seed values are all 0".into()));
    }
    Ok(())
}

/// Snapshot of a stream's position, restorable with [`RngStream::restore_state`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamState {
    current: [f64; 6],
    block_start: [f64; 6],
    stream_start: [f64; 6],
}

/// Source of non-overlapping streams.
///
/// Holds the seed of the next stream to be created and advances it by 2^127
/// steps each time a stream is handed out.
#[derive(Debug, Clone)]
pub struct RngStreamFactory {
    next_seed: [f64; 6],
}

impl RngStreamFactory {
    /// Factory starting from [`DEFAULT_SEED`].
    pub fn new() -> Self {
        Self {
            next_seed: DEFAULT_SEED,
        }
    }

    /// Factory starting from a caller-chosen package seed.
    pub fn with_seed(seed: [f64; 6]) -> QmcResult<Self> {
        check_seed(&seed)?;
        Ok(Self { next_seed: seed })
    }

    /// Derive a full package seed from a single integer.
    ///
    /// Each word is spread with a splitmix step and reduced below its modulus.
    pub fn from_u64(seed: u64) -> Self {
        let mut z = seed;
        let mut words = [0.0; 6];
        for (i, word) in words.iter_mut().enumerate() {
            z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
            let mut x = z;
            x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
            x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
            x ^= x >> 31;
            let m = if i < 3 { M1 } else { M2 };
            // Never zero, so neither triple can be all zeros.
            *word = 1.0 + (x % (m as u64 - 1)) as f64;
        }
        Self { next_seed: words }
    }

    /// Create the next stream.
    pub fn create(&mut self, name: impl Into<String>) -> RngStream {
        let seed = self.next_seed;

        let s1 = mat_vec_mod_m(&A1P127, &self.next_seed[..3], M1);
        let s2 = mat_vec_mod_m(&A2P127, &self.next_seed[3..], M2);
        self.next_seed[..3].copy_from_slice(&s1);
        self.next_seed[3..].copy_from_slice(&s2);

        RngStream {
            name: name.into(),
            antithetic: false,
            increased_precision: false,
            current: seed,
            block_start: seed,
            stream_start: seed,
        }
    }
}

impl Default for RngStreamFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// One independent stream of uniform random numbers.
#[derive(Debug, Clone)]
pub struct RngStream {
    name: String,
    antithetic: bool,
    increased_precision: bool,
    current: [f64; 6],
    block_start: [f64; 6],
    stream_start: [f64; 6],
}

impl RngStream {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Reseed the stream; the new seed becomes the start of stream and block.
    pub fn set_seed(&mut self, seed: [f64; 6]) -> QmcResult<()> {
        check_seed(&seed)?;
        self.current = seed;
        self.block_start = seed;
        self.stream_start = seed;
        Ok(())
    }

    /// Rewind or skip to a stream/block boundary.
    pub fn reset(&mut self, target: ResetTarget) {
        match target {
            ResetTarget::StreamStart => {
                self.current = self.stream_start;
                self.block_start = self.stream_start;
            }
            ResetTarget::BlockStart => {
                self.current = self.block_start;
            }
            ResetTarget::NextBlock => {
                let b1 = mat_vec_mod_m(&A1P76, &self.block_start[..3], M1);
                let b2 = mat_vec_mod_m(&A2P76, &self.block_start[3..], M2);
                self.block_start[..3].copy_from_slice(&b1);
                self.block_start[3..].copy_from_slice(&b2);
                self.current = self.block_start;
            }
        }
    }

    /// Jump the current state by `2^|e| * c` steps, backwards when exactly one
    /// of `e` and `c` is negative. `e == 0` jumps by `c` steps.
    pub fn advance_state(&mut self, e: i32, c: i64) {
        if c == 0 {
            return;
        }
        let backward = (e < 0) != (c < 0);
        let (base1, base2) = if backward {
            (&INV_A1, &INV_A2)
        } else {
            (&A1P0, &A2P0)
        };

        let b1 = mat_two_pow_mod_m(base1, M1, e.unsigned_abs());
        let b2 = mat_two_pow_mod_m(base2, M2, e.unsigned_abs());
        let c1 = mat_pow_mod_m(&b1, M1, c.unsigned_abs());
        let c2 = mat_pow_mod_m(&b2, M2, c.unsigned_abs());

        let s1 = mat_vec_mod_m(&c1, &self.current[..3], M1);
        let s2 = mat_vec_mod_m(&c2, &self.current[3..], M2);
        self.current[..3].copy_from_slice(&s1);
        self.current[3..].copy_from_slice(&s2);
    }

    /// Return `1 - u` instead of `u` from now on.
    pub fn set_antithetic(&mut self, antithetic: bool) {
        self.antithetic = antithetic;
    }

    /// Combine two draws per value for 53 bits of resolution.
    pub fn set_increased_precision(&mut self, increased: bool) {
        self.increased_precision = increased;
    }

    /// The six words of the current state.
    pub fn state(&self) -> [f64; 6] {
        self.current
    }

    pub fn save_state(&self) -> StreamState {
        StreamState {
            current: self.current,
            block_start: self.block_start,
            stream_start: self.stream_start,
        }
    }

    pub fn restore_state(&mut self, state: &StreamState) {
        self.current = state.current;
        self.block_start = state.block_start;
        self.stream_start = state.stream_start;
    }

    /// One step of the combined generator, in (0, 1).
    fn u01(&mut self) -> f64 {
        let g = &mut self.current;

        // Component 1
        let mut p1 = A12 * g[1] - A13N * g[0];
        let k = (p1 / M1).trunc();
        p1 -= k * M1;
        if p1 < 0.0 {
            p1 += M1;
        }
        g[0] = g[1];
        g[1] = g[2];
        g[2] = p1;

        // Component 2
        let mut p2 = A21 * g[5] - A23N * g[3];
        let k = (p2 / M2).trunc();
        p2 -= k * M2;
        if p2 < 0.0 {
            p2 += M2;
        }
        g[3] = g[4];
        g[4] = g[5];
        g[5] = p2;

        let u = if p1 > p2 {
            (p1 - p2) * NORM
        } else {
            (p1 - p2 + M1) * NORM
        };
        if self.antithetic {
            1.0 - u
        } else {
            u
        }
    }

    /// Next uniform value in [0, 1).
    pub fn next_uniform(&mut self) -> f64 {
        if !self.increased_precision {
            return self.u01();
        }

        let mut u = self.u01();
        if self.antithetic {
            u += (self.u01() - 1.0) * FACT;
            if u < 0.0 {
                u + 1.0
            } else {
                u
            }
        } else {
            u += self.u01() * FACT;
            if u < 1.0 {
                u
            } else {
                u - 1.0
            }
        }
    }

    /// Uniform integer in `[low, high]`.
    pub fn next_int(&mut self, low: i64, high: i64) -> i64 {
        low + ((high - low + 1) as f64 * self.next_uniform()) as i64
    }
}
