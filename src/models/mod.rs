pub mod black_scholes;
pub mod payoff;
pub mod volatility;

use crate::state::OptionType;

/// Closed-form pricers implement this trait.
/// price() must be a pure function: deterministic output from inputs only.
/// Send + Sync required for sharing across tokio tasks.
pub trait OptionPricer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fair value of one unit of the underlying's option. Never negative, never panics.
    fn price(&self, params: &PricingParams) -> f64;
}

/// Inputs to a single valuation. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy)]
#[repr(C)]
pub struct PricingParams {
    pub spot: f64,
    pub strike: f64,
    pub ttl_years: f64,
    pub rate: f64,
    pub sigma: f64,
    pub option_type: OptionType,
}

impl PricingParams {
    #[inline]
    pub fn new(
        spot: f64,
        strike: f64,
        ttl_years: f64,
        rate: f64,
        sigma: f64,
        option_type: OptionType,
    ) -> Self {
        Self {
            spot,
            strike,
            ttl_years,
            rate,
            sigma,
            option_type,
        }
    }

    #[inline]
    pub fn intrinsic(&self) -> f64 {
        self.option_type.intrinsic(self.spot, self.strike)
    }
}
