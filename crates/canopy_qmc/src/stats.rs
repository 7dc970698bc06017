//! Blocked statistics: running mean, variance and covariance per block.
//!
//! Each block tracks up to two jointly observed variables with Welford's
//! update, so a constant series reports a variance of exactly zero.

use std::f64::consts::FRAC_PI_2;

use crate::error::{QmcError, QmcResult};

/// Which of the two jointly tracked variables to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    First,
    Second,
}

impl Variable {
    fn index(self) -> usize {
        match self {
            Variable::First => 0,
            Variable::Second => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Block {
    count: u64,
    mean: [f64; 2],
    m2: [f64; 2],
    co_moment: f64,
}

impl Block {
    fn push(&mut self, x: f64, y: f64) {
        self.count += 1;
        let n = self.count as f64;
        let dx = x - self.mean[0];
        let dy = y - self.mean[1];
        self.mean[0] += dx / n;
        self.mean[1] += dy / n;
        self.m2[0] += dx * (x - self.mean[0]);
        self.m2[1] += dy * (y - self.mean[1]);
        self.co_moment += dx * (y - self.mean[1]);
    }
}

/// Symmetric confidence interval around a block mean.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInterval {
    pub mean: f64,
    pub half_width: f64,
}

impl ConfidenceInterval {
    pub fn lower(&self) -> f64 {
        self.mean - self.half_width
    }

    pub fn upper(&self) -> f64 {
        self.mean + self.half_width
    }
}

#[derive(Debug, Clone)]
pub struct Statistics {
    blocks: Vec<Block>,
}

impl Statistics {
    pub fn new(block_count: usize) -> Self {
        Self {
            blocks: vec![Block::default(); block_count],
        }
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Record one observation of the first variable.
    pub fn update(&mut self, block: usize, value: f64) -> QmcResult<()> {
        self.update2(block, value, 0.0)
    }

    /// Record one joint observation of both variables.
    pub fn update2(&mut self, block: usize, v1: f64, v2: f64) -> QmcResult<()> {
        self.block_mut(block)?.push(v1, v2);
        Ok(())
    }

    pub fn count(&self, block: usize) -> QmcResult<u64> {
        Ok(self.block(block)?.count)
    }

    pub fn average(&self, block: usize, which: Variable) -> QmcResult<f64> {
        Ok(self.block(block)?.mean[which.index()])
    }

    /// Bessel-corrected sample variance; zero with fewer than two observations.
    pub fn variance(&self, block: usize, which: Variable) -> QmcResult<f64> {
        let b = self.block(block)?;
        if b.count < 2 {
            return Ok(0.0);
        }
        Ok((b.m2[which.index()] / (b.count - 1) as f64).max(0.0))
    }

    pub fn covariance(&self, block: usize) -> QmcResult<f64> {
        let b = self.block(block)?;
        if b.count < 2 {
            return Ok(0.0);
        }
        Ok(b.co_moment / (b.count - 1) as f64)
    }

    /// Pearson correlation; zero when either variable is constant.
    pub fn correlation(&self, block: usize) -> QmcResult<f64> {
        let b = self.block(block)?;
        let denom = (b.m2[0] * b.m2[1]).sqrt();
        if b.count < 2 || denom <= 0.0 {
            return Ok(0.0);
        }
        Ok((b.co_moment / denom).clamp(-1.0, 1.0))
    }

    /// Student-t interval for the mean at confidence `level` (e.g. 0.95).
    ///
    /// With fewer than two observations the half width is zero.
    pub fn confidence_interval(
        &self,
        block: usize,
        which: Variable,
        level: f64,
    ) -> QmcResult<ConfidenceInterval> {
        let b = self.block(block)?;
        let mean = b.mean[which.index()];
        if b.count < 2 {
            return Ok(ConfidenceInterval {
                mean,
                half_width: 0.0,
            });
        }

        let n = b.count as f64;
        let variance = self.variance(block, which)?;
        let t = student_t_quantile(1.0 - level.clamp(0.0, 1.0), b.count - 1);
        Ok(ConfidenceInterval {
            mean,
            half_width: t * (variance / n).sqrt(),
        })
    }

    pub fn reset(&mut self, block: usize) -> QmcResult<()> {
        *self.block_mut(block)? = Block::default();
        Ok(())
    }

    fn block(&self, block: usize) -> QmcResult<&Block> {
        let count = self.blocks.len();
        self.blocks
            .get(block)
            .ok_or(QmcError::BlockOutOfRange { block, count })
    }

    fn block_mut(&mut self, block: usize) -> QmcResult<&mut Block> {
        let count = self.blocks.len();
        self.blocks
            .get_mut(block)
            .ok_or(QmcError::BlockOutOfRange { block, count })
    }
}

/// Lower-tail standard normal quantile (Abramowitz & Stegun 26.2.23).
pub fn normal_quantile(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }

    const C: [f64; 3] = [2.515517, 0.802853, 0.010328];
    const D: [f64; 3] = [1.432788, 0.189269, 0.001308];

    let tail = p.min(1.0 - p);
    let t = (-2.0 * tail.ln()).sqrt();
    let x = t - (C[0] + C[1] * t + C[2] * t * t) / (1.0 + D[0] * t + D[1] * t * t + D[2] * t * t * t);
    if p < 0.5 {
        -x
    } else {
        x
    }
}

/// Two-sided Student-t critical value: `P(|T| > t) = p` for `df` degrees of
/// freedom (Hill 1970, algorithm 396).
pub fn student_t_quantile(p: f64, df: u64) -> f64 {
    if p <= 0.0 {
        return f64::INFINITY;
    }
    if p >= 1.0 || df == 0 {
        return 0.0;
    }

    if df == 1 {
        let angle = p * FRAC_PI_2;
        return angle.cos() / angle.sin();
    }
    if df == 2 {
        return (2.0 / (p * (2.0 - p)) - 2.0).sqrt();
    }

    let n = df as f64;
    let a = 1.0 / (n - 0.5);
    let b = 48.0 / (a * a);
    let mut c = ((20700.0 * a / b - 98.0) * a - 16.0) * a + 96.36;
    let d = ((94.5 / (b + c) - 3.0) / b + 1.0) * (a * FRAC_PI_2).sqrt() * n;
    let mut y = (d * p).powf(2.0 / n);

    if y > 0.05 + a {
        // Asymptotic expansion around the normal deviate
        let x = normal_quantile(0.5 * p);
        y = x * x;
        if df < 5 {
            c += 0.3 * (n - 4.5) * (x + 0.6);
        }
        c = (((0.05 * d * x - 5.0) * x - 7.0) * x - 2.0) * x + b + c;
        y = (((((0.4 * y + 6.3) * y + 36.0) * y + 94.5) / c - y - 3.0) / b + 1.0) * x;
        y = (a * y * y).exp_m1();
    } else {
        y = ((1.0 / (((n + 6.0) / (n * y) - 0.089 * d - 0.822) * (n + 2.0) * 3.0)
            + 0.5 / (n + 4.0))
            * y
            - 1.0)
            * (n + 1.0)
            / (n + 2.0)
            + 1.0 / y;
    }
    (n * y).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        let mut stats = Statistics::new(2);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.update(0, v).unwrap();
        }
        assert_eq!(stats.count(0).unwrap(), 5);
        assert_eq!(stats.average(0, Variable::First).unwrap(), 3.0);
        assert_eq!(stats.variance(0, Variable::First).unwrap(), 2.5);

        // Other blocks are untouched
        assert_eq!(stats.count(1).unwrap(), 0);
    }

    #[test]
    fn test_constant_series_has_zero_variance() {
        let mut stats = Statistics::new(1);
        for _ in 0..10 {
            stats.update(0, 0.1).unwrap();
        }
        assert_eq!(stats.variance(0, Variable::First).unwrap(), 0.0);
        let ci = stats.confidence_interval(0, Variable::First, 0.95).unwrap();
        assert_eq!(ci.half_width, 0.0);
    }

    #[test]
    fn test_covariance_and_correlation() {
        let mut stats = Statistics::new(1);
        for x in [1.0, 2.0, 3.0, 4.0] {
            stats.update2(0, x, 2.0 * x + 1.0).unwrap();
        }
        assert!((stats.covariance(0).unwrap() - 2.0 * 5.0 / 3.0).abs() < 1e-12);
        assert!((stats.correlation(0).unwrap() - 1.0).abs() < 1e-12);
        assert!((stats.average(0, Variable::Second).unwrap() - 6.0).abs() < 1e-12);

        let mut anti = Statistics::new(1);
        for x in [1.0, 2.0, 3.0] {
            anti.update2(0, x, -x).unwrap();
        }
        assert!((anti.correlation(0).unwrap() + 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_reset_clears_one_block() {
        let mut stats = Statistics::new(2);
        stats.update(0, 1.0).unwrap();
        stats.update(1, 2.0).unwrap();
        stats.reset(0).unwrap();
        assert_eq!(stats.count(0).unwrap(), 0);
        assert_eq!(stats.count(1).unwrap(), 1);
    }

    #[test]
    fn test_block_out_of_range() {
        let mut stats = Statistics::new(1);
        assert!(matches!(
            stats.update(1, 0.0),
            Err(QmcError::BlockOutOfRange { block: 1, count: 1 })
        ));
        assert!(stats.average(3, Variable::First).is_err());
    }

    #[test]
    fn test_student_t_quantiles() {
        let cases = [(1, 12.706), (2, 4.303), (3, 3.182), (5, 2.571), (10, 2.228), (30, 2.042)];
        for (df, expected) in cases {
            let t = student_t_quantile(0.05, df);
            assert!((t - expected).abs() < 0.01, "df {}: {} vs {}", df, t, expected);
        }
        assert!((student_t_quantile(0.05, 100_000) - 1.96).abs() < 0.01);
        assert!((student_t_quantile(0.01, 10) - 3.169).abs() < 0.01);
    }

    #[test]
    fn test_normal_quantile() {
        assert!((normal_quantile(0.975) - 1.96).abs() < 1e-3);
        assert!((normal_quantile(0.025) + 1.96).abs() < 1e-3);
        assert!(normal_quantile(0.5).abs() < 1e-3);
    }

    #[test]
    fn test_confidence_interval_width() {
        let mut stats = Statistics::new(1);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.update(0, v).unwrap();
        }
        let ci = stats.confidence_interval(0, Variable::First, 0.95).unwrap();
        // t(0.05, 4) = 2.776, standard error = sqrt(2.5 / 5)
        let expected = 2.776 * (0.5f64).sqrt();
        assert!((ci.half_width - expected).abs() < 0.01);
        assert!(ci.lower() < 3.0 && ci.upper() > 3.0);
    }
}
