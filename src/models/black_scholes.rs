use crate::models::{OptionPricer, PricingParams};
use crate::state::OptionType;
use statrs::distribution::{ContinuousCDF, Normal};

/// Black-Scholes European option pricing.
///
/// Call = S * Phi(d1) - K * e^(-rT) * Phi(d2)
/// Put  = K * e^(-rT) * Phi(-d2) - S * Phi(-d1)
///
/// where d1 = (ln(S/K) + (r + sigma^2/2)*T) / (sigma * sqrt(T))
/// and d2 = d1 - sigma * sqrt(T).
///
/// Expired or zero-vol contracts are worth their intrinsic value.
pub struct BlackScholesEuropean {
    /// Standard normal distribution (created once, reused)
    normal: Normal,
}

impl BlackScholesEuropean {
    pub fn new() -> Self {
        Self {
            normal: Normal::standard(),
        }
    }
}

impl Default for BlackScholesEuropean {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionPricer for BlackScholesEuropean {
    #[inline]
    fn name(&self) -> &'static str {
        "Black-Scholes"
    }

    #[inline]
    fn price(&self, params: &PricingParams) -> f64 {
        let PricingParams {
            spot,
            strike,
            ttl_years: t,
            rate,
            sigma,
            option_type,
        } = *params;

        if t <= 0.0 || sigma <= 0.0 {
            return params.intrinsic();
        }
        // ln(S/K) is undefined here; callers validate, this keeps price() total.
        if !(spot > 0.0 && strike > 0.0) {
            return params.intrinsic();
        }

        let sigma_sqrt_t = sigma * t.sqrt();
        let d1 = ((spot / strike).ln() + (rate + 0.5 * sigma * sigma) * t) / sigma_sqrt_t;
        let d2 = d1 - sigma_sqrt_t;
        let discounted_strike = strike * (-rate * t).exp();

        let value = match option_type {
            OptionType::Call => spot * self.normal.cdf(d1) - discounted_strike * self.normal.cdf(d2),
            OptionType::Put => discounted_strike * self.normal.cdf(-d2) - spot * self.normal.cdf(-d1),
        };

        // Rounding can push deep OTM values a hair below zero
        value.max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T30: f64 = 30.0 / 365.0;

    fn price(spot: f64, strike: f64, t: f64, r: f64, sigma: f64, ty: OptionType) -> f64 {
        BlackScholesEuropean::new().price(&PricingParams::new(spot, strike, t, r, sigma, ty))
    }

    #[test]
    fn test_reference_values() {
        let call = price(100.0, 100.0, T30, 0.035, 0.20, OptionType::Call);
        let put = price(100.0, 100.0, T30, 0.035, 0.20, OptionType::Put);
        assert!((call - 2.4304).abs() < 0.01, "ATM call={call}");
        assert!((put - 2.1431).abs() < 0.01, "ATM put={put}");
    }

    #[test]
    fn test_put_call_parity() {
        let cases = [
            (100.0, 100.0, T30, 0.035, 0.20),
            (120.0, 100.0, 0.5, 0.01, 0.35),
            (80.0, 100.0, 2.0, 0.05, 0.15),
            (71_000.0, 70_000.0, 90.0 / 365.0, -0.005, 0.45),
        ];
        for (s, k, t, r, v) in cases {
            let call = price(s, k, t, r, v, OptionType::Call);
            let put = price(s, k, t, r, v, OptionType::Put);
            let forward_gap = s - k * (-r * t).exp();
            let err = ((call - put) - forward_gap).abs() / s.max(k);
            assert!(err < 1e-6, "parity violated for S={s} K={k}: err={err}");
        }
    }

    #[test]
    fn test_expiry_limit_matches_intrinsic() {
        for (s, k) in [(110.0, 100.0), (90.0, 100.0), (100.0, 100.0)] {
            for ty in [OptionType::Call, OptionType::Put] {
                let at_zero = price(s, k, 0.0, 0.035, 0.2, ty);
                let near_zero = price(s, k, 1e-9, 0.035, 0.2, ty);
                assert_eq!(at_zero, ty.intrinsic(s, k));
                // ATM time value at T=1e-9 is ~0.4 * S * sigma * sqrt(T) = 2.5e-4
                assert!((near_zero - at_zero).abs() < 1e-3, "{ty} S={s}: {near_zero} vs {at_zero}");
            }
        }
    }

    #[test]
    fn test_zero_vol_is_intrinsic() {
        assert_eq!(price(110.0, 100.0, 0.5, 0.035, 0.0, OptionType::Call), 10.0);
        assert_eq!(price(110.0, 100.0, 0.5, 0.035, -0.1, OptionType::Put), 0.0);
        let tiny = price(90.0, 100.0, 1e-9, 0.0, 1e-6, OptionType::Put);
        assert!((tiny - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_call_lower_bound_and_monotone_in_vol() {
        let s: f64 = 100.0;
        let k: f64 = 95.0;
        let t: f64 = 0.25;
        let r: f64 = 0.035;
        let lower = (s - k * (-r * t).exp()).max(0.0);
        let mut prev = 0.0;
        for v in [0.05, 0.1, 0.2, 0.4, 0.8] {
            let c = price(s, k, t, r, v, OptionType::Call);
            assert!(c >= lower - 1e-12);
            assert!(c > prev, "call not increasing in vol at {v}");
            prev = c;
        }
    }

    #[test]
    fn test_deep_otm_never_negative() {
        let p = price(10.0, 1_000.0, 0.01, 0.035, 0.1, OptionType::Call);
        assert!(p >= 0.0);
        assert!(p < 1e-12);
    }

    #[test]
    fn test_reproducible() {
        let model = BlackScholesEuropean::new();
        let params = PricingParams::new(101.3, 98.7, 0.3, 0.02, 0.27, OptionType::Put);
        assert_eq!(model.price(&params).to_bits(), model.price(&params).to_bits());
    }
}
