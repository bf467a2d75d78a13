use crate::errors::{SimError, SimResult};

/// Trading days per year used to annualize daily variance.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Realized volatility over a close series.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct VolEstimate {
    /// sqrt(sample variance of daily log-returns * 252)
    pub annualized: f64,
    pub returns_used: usize,
    /// Adjacent pairs excluded for a non-positive price or non-finite log-return
    pub skipped: usize,
}

/// ln(next/prev), or None when the pair cannot produce a usable return.
#[inline]
fn log_return(prev: f64, next: f64) -> Option<f64> {
    if prev <= 0.0 || next <= 0.0 {
        return None;
    }
    let r = (next / prev).ln();
    r.is_finite().then_some(r)
}

#[inline]
fn annualize(variance: f64) -> f64 {
    (variance.max(0.0) * TRADING_DAYS_PER_YEAR).sqrt()
}

/// Annualized realized volatility of `closes` (two-pass, Bessel-corrected).
///
/// Bad pairs are excluded from the statistics, not fatal. Fewer than two
/// usable returns is `InsufficientData`.
pub fn estimate(closes: &[f64]) -> SimResult<VolEstimate> {
    let mut returns = Vec::with_capacity(closes.len().saturating_sub(1));
    let mut skipped = 0usize;

    for pair in closes.windows(2) {
        match log_return(pair[0], pair[1]) {
            Some(r) => returns.push(r),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!(
            skipped = skipped,
            total = closes.len().saturating_sub(1),
            "excluded non-finite log-returns from volatility estimate"
        );
    }

    let n = returns.len();
    if n < 2 {
        return Err(SimError::InsufficientData(format!(
            "need at least 2 usable log-returns, have {n}"
        )));
    }

    let nf = n as f64;
    let mean = returns.iter().sum::<f64>() / nf;
    let var_sum: f64 = returns.iter().map(|r| (r - mean) * (r - mean)).sum();

    Ok(VolEstimate {
        annualized: annualize(var_sum / (nf - 1.0)),
        returns_used: n,
        skipped,
    })
}

/// Welford running variance over log-returns, fed one close at a time.
/// Same pair rule and result as [`estimate`] on the prefix seen so far.
#[derive(Debug, Clone, Default)]
pub struct RunningVolatility {
    prev_close: Option<f64>,
    count: u64,
    mean: f64,
    m2: f64,
    skipped: u64,
}

impl RunningVolatility {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, close: f64) {
        let Some(prev) = self.prev_close.replace(close) else {
            return;
        };

        let Some(r) = log_return(prev, close) else {
            self.skipped += 1;
            tracing::warn!(prev = prev, close = close, "skipped non-finite log-return");
            return;
        };

        self.count += 1;
        let delta = r - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (r - self.mean);
    }

    /// None until two usable returns have been seen.
    #[inline]
    pub fn annualized(&self) -> Option<f64> {
        if self.count < 2 {
            return None;
        }
        Some(annualize(self.m2 / (self.count - 1) as f64))
    }

    #[inline]
    pub fn returns_used(&self) -> u64 {
        self.count
    }

    #[inline]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alternating(n: usize) -> Vec<f64> {
        (0..n).map(|i| if i % 2 == 0 { 100.0 } else { 105.0 }).collect()
    }

    #[test]
    fn test_constant_series_zero_vol() {
        let est = estimate(&[250.0; 30]).unwrap();
        assert_eq!(est.annualized, 0.0);
        assert_eq!(est.returns_used, 29);
    }

    #[test]
    fn test_alternating_deterministic() {
        let closes = alternating(50);
        let a = estimate(&closes).unwrap();
        let b = estimate(&closes).unwrap();
        assert!(a.annualized > 0.0);
        assert_eq!(a.annualized.to_bits(), b.annualized.to_bits());

        // 49 returns of +/- ln(1.05): sample std is close to ln(1.05)
        let daily = a.annualized / TRADING_DAYS_PER_YEAR.sqrt();
        assert!((daily - 1.05_f64.ln()).abs() < 0.002, "daily={daily}");
    }

    #[test]
    fn test_insufficient_returns() {
        assert!(matches!(estimate(&[]), Err(SimError::InsufficientData(_))));
        assert!(matches!(estimate(&[100.0, 101.0]), Err(SimError::InsufficientData(_))));
        assert!(estimate(&[100.0, 101.0, 99.0]).is_ok());
    }

    #[test]
    fn test_bad_pairs_skipped_not_fatal() {
        let est = estimate(&[100.0, 0.0, 102.0, 101.0, 103.0]).unwrap();
        // 100->0 and 0->102 are dropped
        assert_eq!(est.skipped, 2);
        assert_eq!(est.returns_used, 2);

        let clean = estimate(&[102.0, 101.0, 103.0]).unwrap();
        assert_eq!(est.annualized, clean.annualized);
    }

    #[test]
    fn test_running_matches_batch() {
        let closes = [100.0, 101.5, 99.8, 102.3, 0.0, 104.1, 103.0, 105.9, 104.4];
        let mut running = RunningVolatility::new();
        for (i, &c) in closes.iter().enumerate() {
            running.push(c);
            match estimate(&closes[..=i]) {
                Ok(batch) => {
                    let inc = running.annualized().unwrap();
                    assert!(
                        (inc - batch.annualized).abs() <= 1e-12 * batch.annualized.max(1.0),
                        "step {i}: running={inc} batch={}",
                        batch.annualized
                    );
                    assert_eq!(running.returns_used() as usize, batch.returns_used);
                }
                Err(_) => assert!(running.annualized().is_none(), "step {i}"),
            }
        }
        assert_eq!(running.skipped(), 2);
    }
}
