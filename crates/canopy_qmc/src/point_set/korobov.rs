//! Korobov rank-1 lattice rules.
//!
//! Point `k` of an `n`-point rule with multiplier `a` has coordinates
//! `x_0 = k`, `x_i = x_{i-1} * a mod n`, each divided by `n`.

use crate::error::{QmcError, QmcResult};

/// Tabulated multipliers, keyed by modulus.
///
/// Each multiplier is the integer nearest `n * (2 - phi)` (odd for powers of
/// two), which gives the Fibonacci-like lattice in the first two coordinates.
const MULTIPLIERS: &[(u64, u64)] = &[
    // primes
    (251, 96),
    (509, 194),
    (1021, 390),
    (2039, 779),
    (4093, 1563),
    (8191, 3129),
    (16381, 6257),
    (32749, 12509),
    (65521, 25027),
    (131071, 50065),
    (262139, 100128),
    (524287, 200261),
    (1048573, 400522),
    // powers of two
    (64, 25),
    (128, 49),
    (256, 97),
    (512, 195),
    (1024, 391),
    (2048, 783),
    (4096, 1565),
    (8192, 3129),
    (16384, 6259),
    (32768, 12517),
    (65536, 25033),
    (131072, 50065),
    (262144, 100131),
    (524288, 200261),
    (1048576, 400523),
];

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut d = 3;
    while d <= n / d {
        if n % d == 0 {
            return false;
        }
        d += 2;
    }
    true
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[inline]
fn mul_mod(a: u64, b: u64, n: u64) -> u64 {
    ((a as u128 * b as u128) % n as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, n: u64) -> u64 {
    let mut result = 1 % n;
    base %= n;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mul_mod(result, base, n);
        }
        base = mul_mod(base, base, n);
        exp >>= 1;
    }
    result
}

/// Look up the tabulated multiplier for modulus `n`.
pub fn tabulated_multiplier(n: u64) -> Option<u64> {
    MULTIPLIERS.iter().find(|(m, _)| *m == n).map(|(_, a)| *a)
}

pub struct Korobov {
    dimension: usize,
    modulus: u64,
    multiplier: u64,
    index: u64,
    point: Vec<f64>,
}

impl Korobov {
    /// Create an `n`-point rule, where `n` must be prime or a power of two.
    pub fn new(dimension: usize, modulus: u64, multiplier: Option<u64>) -> QmcResult<Self> {
        if !(modulus.is_power_of_two() && modulus >= 2) && !is_prime(modulus) {
            return Err(QmcError::InvalidKorobovModulus(modulus));
        }

        let multiplier = match multiplier {
            Some(a) => a,
            None => tabulated_multiplier(modulus)
                .ok_or(QmcError::MissingKorobovMultiplier(modulus))?,
        };
        if multiplier == 0 || multiplier >= modulus || gcd(multiplier, modulus) != 1 {
            return Err(QmcError::InvalidKorobovMultiplier { modulus, multiplier });
        }

        Ok(Self {
            dimension,
            modulus,
            multiplier,
            index: 0,
            point: vec![0.0; dimension],
        })
    }

    pub fn next_point(&mut self) -> Option<&[f64]> {
        if self.index >= self.modulus {
            return None;
        }

        let n = self.modulus;
        let mut x = self.index;
        for coord in self.point.iter_mut() {
            *coord = x as f64 / n as f64;
            x = mul_mod(x, self.multiplier, n);
        }

        self.index += 1;
        Some(&self.point)
    }

    pub fn reset(&mut self) {
        self.index = 0;
        self.point.iter_mut().for_each(|x| *x = 0.0);
    }

    /// Coordinate `requested_dim` of the most recently returned point,
    /// continuing the lattice recurrence past the declared dimension.
    pub fn extend_dimension(&mut self, requested_dim: usize) -> f64 {
        let k = self.index.saturating_sub(1);
        let n = self.modulus;
        let x = mul_mod(k, pow_mod(self.multiplier, requested_dim as u64, n), n);
        x as f64 / n as f64
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn point_count(&self) -> u64 {
        self.modulus
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn multiplier(&self) -> u64 {
        self.multiplier
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modulus_validation() {
        assert!(Korobov::new(2, 1021, None).is_ok());
        assert!(Korobov::new(2, 1024, None).is_ok());
        assert!(matches!(
            Korobov::new(2, 1000, None),
            Err(QmcError::InvalidKorobovModulus(1000))
        ));
        // Valid modulus without a table entry needs an explicit multiplier
        assert!(matches!(
            Korobov::new(2, 31, None),
            Err(QmcError::MissingKorobovMultiplier(31))
        ));
        assert!(Korobov::new(2, 31, Some(12)).is_ok());
        // Even multiplier shares a factor with a power of two
        assert!(Korobov::new(2, 64, Some(10)).is_err());
    }

    #[test]
    fn test_is_prime_near_integer_limits() {
        assert!(is_prime(1_000_000_007));
        assert!(is_prime(4_294_967_291));
        assert!(!is_prime(4_294_967_297));
        assert!(!is_prime(u64::MAX));
        assert!(!is_prime(1));
        assert!(is_prime(2));
    }

    #[test]
    fn test_points_follow_recurrence() {
        let mut rule = Korobov::new(3, 31, Some(12)).unwrap();

        let zero = rule.next_point().unwrap();
        assert_eq!(zero, &[0.0, 0.0, 0.0]);

        let p1 = rule.next_point().unwrap();
        assert_eq!(p1, &[1.0 / 31.0, 12.0 / 31.0, (144 % 31) as f64 / 31.0]);
    }

    #[test]
    fn test_first_coordinate_is_stratified() {
        let n = 64;
        let mut rule = Korobov::new(2, n, None).unwrap();
        let mut seen = vec![false; n as usize];
        while let Some(p) = rule.next_point() {
            let cell = (p[1] * n as f64).round() as usize;
            seen[cell] = true;
        }
        // Multiplier is a unit mod n, so every coordinate visits every cell
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn test_reset_reproduces_sequence() {
        let mut rule = Korobov::new(4, 251, None).unwrap();
        let mut first = Vec::new();
        while let Some(p) = rule.next_point() {
            first.push(p.to_vec());
        }
        assert_eq!(first.len(), 251);

        rule.reset();
        let mut second = Vec::new();
        while let Some(p) = rule.next_point() {
            second.push(p.to_vec());
        }
        assert_eq!(first, second);
    }

    #[test]
    fn test_extend_dimension_continues_recurrence() {
        let mut rule = Korobov::new(2, 31, Some(12)).unwrap();
        rule.next_point();
        rule.next_point(); // k = 1
        let expected = pow_mod(12, 2, 31) as f64 / 31.0;
        assert_eq!(rule.extend_dimension(2), expected);
    }
}
