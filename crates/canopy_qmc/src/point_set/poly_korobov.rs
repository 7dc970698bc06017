//! Polynomial (combined) Korobov rules over GF(2).
//!
//! Up to three Tausworthe components, each driven by a primitive trinomial
//! `x^k + x^q + 1` and step size `s`, are XOR-combined. The point set is the
//! set of output vectors `(u_0, ..., u_{d-1})` over every combination of
//! component initial states, so its size is `2^(k_1 + k_2 + k_3)`. Point `c`
//! takes its component states from the bit-fields of the counter `c`; point
//! 0 starts from the all-zero state and is therefore the zero vector.

use serde::{Deserialize, Serialize};

use crate::error::{QmcError, QmcResult};

pub const POLY_MIN_LOG2: u32 = 3;
pub const POLY_MAX_LOG2: u32 = 30;

/// Primitive trinomials `x^k + x^q + 1` with `2q < k`.
const PRIMITIVE_TRINOMIALS: &[(u32, u32)] = &[
    (3, 1),
    (4, 1),
    (5, 2),
    (6, 1),
    (7, 1),
    (9, 4),
    (10, 3),
    (11, 2),
    (15, 1),
    (17, 3),
    (18, 7),
    (20, 3),
    (21, 2),
    (22, 1),
    (23, 5),
    (25, 3),
    (28, 3),
    (29, 2),
    (31, 3),
];

/// One Tausworthe component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolyComponent {
    pub k: u32,
    pub q: u32,
    pub s: u32,
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl PolyComponent {
    fn validate(&self) -> QmcResult<()> {
        let fail = |reason| QmcError::InvalidPolyComponent {
            k: self.k,
            q: self.q,
            s: self.s,
            reason,
        };
        if self.k == 0 || self.k > 32 {
            return Err(fail("degree k must be in 1..=32"));
        }
        if self.q == 0 || 2 * self.q >= self.k {
            return Err(fail("q must satisfy 0 < 2q < k"));
        }
        if self.s == 0 || self.s > self.k - self.q {
            return Err(fail("s must satisfy 0 < s <= k - q"));
        }
        let period = (1u64 << self.k) - 1;
        if gcd(self.s as u64, period) != 1 {
            return Err(fail("s must be coprime to 2^k - 1"));
        }
        Ok(())
    }

    /// Build a component for a tabulated trinomial, choosing the largest
    /// valid step size.
    fn from_trinomial(k: u32, q: u32) -> Self {
        let period = (1u64 << k) - 1;
        let s = (1..=k - q)
            .rev()
            .find(|&s| gcd(s as u64, period) == 1)
            .unwrap_or(1);
        Self { k, q, s }
    }

    #[inline]
    fn mask(&self) -> u32 {
        u32::MAX << (32 - self.k)
    }

    /// Expand a `k`-bit state into a 32-bit word holding 32 consecutive
    /// bits of the component's output sequence, most significant first.
    fn seed_word(&self, bits: u32) -> u32 {
        let mut z = if self.k == 32 { bits } else { bits << (32 - self.k) };
        for i in self.k..32 {
            let a = (z >> (31 - (i - self.k))) & 1;
            let b = (z >> (31 - (i - self.k + self.q))) & 1;
            z |= (a ^ b) << (31 - i);
        }
        z
    }

    /// One step of the component recurrence on a 32-bit word whose top
    /// `k` bits hold the state.
    #[inline]
    fn step(&self, z: u32) -> u32 {
        let b = ((z << self.q) ^ z) >> (self.k - self.s);
        ((z & self.mask()) << self.s) ^ b
    }
}

/// Default components for a point set of `2^log2_n` points: a single
/// trinomial when one of that degree is tabulated, otherwise two (or three)
/// with pairwise coprime degrees.
pub fn default_components(log2_n: u32) -> Option<Vec<PolyComponent>> {
    let degrees: Vec<(u32, u32)> = PRIMITIVE_TRINOMIALS.to_vec();
    if let Some(&(k, q)) = degrees.iter().find(|(k, _)| *k == log2_n) {
        return Some(vec![PolyComponent::from_trinomial(k, q)]);
    }

    for &(k1, q1) in degrees.iter().rev() {
        for &(k2, q2) in degrees.iter() {
            if k1 > k2 && k1 + k2 == log2_n && gcd(k1 as u64, k2 as u64) == 1 {
                return Some(vec![
                    PolyComponent::from_trinomial(k1, q1),
                    PolyComponent::from_trinomial(k2, q2),
                ]);
            }
        }
    }

    for &(k1, q1) in degrees.iter().rev() {
        for &(k2, q2) in degrees.iter().rev() {
            for &(k3, q3) in degrees.iter().rev() {
                let coprime = gcd(k1 as u64, k2 as u64) == 1
                    && gcd(k1 as u64, k3 as u64) == 1
                    && gcd(k2 as u64, k3 as u64) == 1;
                if k1 > k2 && k2 > k3 && k1 + k2 + k3 == log2_n && coprime {
                    return Some(vec![
                        PolyComponent::from_trinomial(k1, q1),
                        PolyComponent::from_trinomial(k2, q2),
                        PolyComponent::from_trinomial(k3, q3),
                    ]);
                }
            }
        }
    }

    None
}

pub struct PolyKorobov {
    dimension: usize,
    point_count: u64,
    components: Vec<PolyComponent>,
    index: u64,
    point: Vec<f64>,
    /// Component states of the most recently returned point, before any step.
    initial_states: [u32; 3],
    /// Component states used to continue past the declared dimension.
    extension_states: [u32; 3],
    extension_dim: usize,
}

impl PolyKorobov {
    pub fn new(
        dimension: usize,
        point_count: u64,
        components: Option<Vec<PolyComponent>>,
    ) -> QmcResult<Self> {
        if !point_count.is_power_of_two() {
            return Err(QmcError::InvalidPolyPointCount(point_count));
        }
        let log2_n = point_count.trailing_zeros();
        if !(POLY_MIN_LOG2..=POLY_MAX_LOG2).contains(&log2_n) {
            return Err(QmcError::InvalidPolyPointCount(point_count));
        }

        let components = match components {
            Some(c) => c,
            None => default_components(log2_n).ok_or(QmcError::InvalidPolyPointCount(point_count))?,
        };
        if components.is_empty() || components.len() > 3 {
            return Err(QmcError::InvalidPolyPointCount(point_count));
        }
        for c in &components {
            c.validate()?;
        }
        let total: u32 = components.iter().map(|c| c.k).sum();
        if total != log2_n {
            return Err(QmcError::InvalidPolyPointCount(point_count));
        }

        log::debug!(
            "Polynomial Korobov rule with {} points: {:?}",
            point_count,
            components
        );

        Ok(Self {
            dimension,
            point_count,
            components,
            index: 0,
            point: vec![0.0; dimension],
            initial_states: [0; 3],
            extension_states: [0; 3],
            extension_dim: dimension,
        })
    }

    /// Split the point counter into component states.
    fn load_states(&self, counter: u64) -> [u32; 3] {
        let mut states = [0u32; 3];
        let mut shift = 0;
        for (j, c) in self.components.iter().enumerate() {
            let bits = (counter >> shift) & ((1u64 << c.k) - 1);
            states[j] = c.seed_word(bits as u32);
            shift += c.k;
        }
        states
    }

    #[inline]
    fn combined(&self, states: &[u32; 3]) -> f64 {
        let mut z = 0u32;
        for state in states.iter().take(self.components.len()) {
            z ^= *state;
        }
        z as f64 / 4294967296.0
    }

    #[inline]
    fn step_all(&self, states: &mut [u32; 3]) {
        for (j, c) in self.components.iter().enumerate() {
            states[j] = c.step(states[j]);
        }
    }

    pub fn next_point(&mut self) -> Option<&[f64]> {
        if self.index >= self.point_count {
            return None;
        }

        let mut states = self.load_states(self.index);
        self.initial_states = states;
        for i in 0..self.dimension {
            self.point[i] = self.combined(&states);
            self.step_all(&mut states);
        }
        self.extension_states = states;
        self.extension_dim = self.dimension;

        self.index += 1;
        Some(&self.point)
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.initial_states = [0; 3];
        self.extension_states = [0; 3];
        self.extension_dim = self.dimension;
        self.point.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Output `requested_dim` of the current point's combined stream.
    ///
    /// Sequential requests continue from the saved state; any other request
    /// replays the recurrence from the point's initial state.
    pub fn extend_dimension(&mut self, requested_dim: usize) -> f64 {
        if requested_dim != self.extension_dim {
            let mut states = self.initial_states;
            for _ in 0..requested_dim {
                self.step_all(&mut states);
            }
            self.extension_states = states;
            self.extension_dim = requested_dim;
        }

        let mut states = self.extension_states;
        let value = self.combined(&states);
        self.step_all(&mut states);
        self.extension_states = states;
        self.extension_dim += 1;
        value
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

    pub fn components(&self) -> &[PolyComponent] {
        &self.components
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_full_period() {
        // x^5 + x^2 + 1 is primitive, so the nonzero states form one cycle.
        let c = PolyComponent::from_trinomial(5, 2);
        let start = c.seed_word(1);
        let mut z = start;
        let mut period = 0;
        loop {
            z = c.step(z);
            period += 1;
            if z == start || period > 40 {
                break;
            }
        }
        assert_eq!(period, 31);
    }

    #[test]
    fn test_component_validation() {
        assert!(PolyComponent { k: 5, q: 2, s: 3 }.validate().is_ok());
        assert!(PolyComponent { k: 5, q: 3, s: 1 }.validate().is_err());
        assert!(PolyComponent { k: 5, q: 2, s: 4 }.validate().is_err());
        // 2^4 - 1 = 15 shares a factor with 3
        assert!(PolyComponent { k: 4, q: 1, s: 3 }.validate().is_err());
    }

    #[test]
    fn test_default_components_cover_range() {
        for log2_n in POLY_MIN_LOG2..=POLY_MAX_LOG2 {
            let comps = default_components(log2_n).expect("components");
            assert_eq!(comps.iter().map(|c| c.k).sum::<u32>(), log2_n);
            for c in &comps {
                assert!(c.validate().is_ok());
            }
        }
    }

    #[test]
    fn test_first_coordinate_is_stratified() {
        // Single component: the first output's top k bits are the state itself
        let n = 128u64;
        let mut rule = PolyKorobov::new(3, n, None).unwrap();
        assert_eq!(rule.next_point().unwrap(), &[0.0, 0.0, 0.0]);

        rule.reset();
        let mut cells = vec![0u32; n as usize];
        while let Some(p) = rule.next_point() {
            cells[(p[0] * n as f64) as usize] += 1;
        }
        assert!(cells.iter().all(|&c| c == 1));
    }

    #[test]
    fn test_reset_reproduces_sequence() {
        let mut rule = PolyKorobov::new(5, 1024, None).unwrap();
        let first: Vec<Vec<f64>> = (0..1024).map(|_| rule.next_point().unwrap().to_vec()).collect();
        assert!(rule.next_point().is_none());

        rule.reset();
        let second: Vec<Vec<f64>> = (0..1024).map(|_| rule.next_point().unwrap().to_vec()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_extend_dimension_matches_longer_rule() {
        let mut short = PolyKorobov::new(2, 64, None).unwrap();
        let mut long = PolyKorobov::new(4, 64, None).unwrap();
        for _ in 0..10 {
            short.next_point();
            long.next_point();
        }
        let p = long.next_point().unwrap().to_vec();
        short.next_point();
        assert_eq!(short.extend_dimension(2), p[2]);
        assert_eq!(short.extend_dimension(3), p[3]);
        // Out of order requests replay from the initial state
        assert_eq!(short.extend_dimension(2), p[2]);
    }

    #[test]
    fn test_invalid_counts() {
        assert!(PolyKorobov::new(2, 100, None).is_err());
        assert!(PolyKorobov::new(2, 4, None).is_err());
        let wrong_total = vec![PolyComponent { k: 5, q: 2, s: 3 }];
        assert!(PolyKorobov::new(2, 64, Some(wrong_total)).is_err());
    }
}
