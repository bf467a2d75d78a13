use crate::errors::{SimError, SimResult};
use crate::models::payoff::{self, DEFAULT_GRID_POINTS};
use crate::models::volatility::{self, VolEstimate};
use crate::models::{OptionPricer, PricingParams};
use crate::state::{ContractSpec, PayoffCurve, PriceSeries, PricingResult};

/// Strike slider range around the last close: [0.8, 1.2] x spot.
const STRIKE_LOW: f64 = 0.8;
const STRIKE_HIGH: f64 = 1.2;

/// Full single-shot valuation of a contract against a history.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Quote {
    pub result: PricingResult,
    pub curve: PayoffCurve,
    pub volatility: VolEstimate,
    pub pricer: &'static str,
}

/// Suggested strike inputs for a given spot.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct StrikeBounds {
    pub min: f64,
    pub max: f64,
    pub default: f64,
    pub step: f64,
}

impl StrikeBounds {
    pub fn around(spot: f64) -> Self {
        let min = (spot * STRIKE_LOW).trunc();
        let max = (spot * STRIKE_HIGH).trunc();
        Self {
            min,
            max,
            default: spot.round(),
            step: ((max - min) / 100.0).floor().max(1.0),
        }
    }
}

/// Price `spec` at the last close of `series` with volatility from the full
/// history, then size the position and build its payoff curve.
///
/// Validation runs before any numeric work. Pure apart from logging.
pub fn quote(series: &PriceSeries, spec: &ContractSpec, pricer: &dyn OptionPricer) -> SimResult<Quote> {
    spec.validate()?;

    if series.is_empty() {
        return Err(SimError::InsufficientData(format!(
            "{}: price history is empty",
            series.instrument
        )));
    }

    let spot = series.last_close().ok_or_else(|| {
        SimError::InsufficientData(format!("{}: no positive close in history", series.instrument))
    })?;

    let vol = volatility::estimate(&series.closes())?;

    let params = PricingParams::new(
        spot,
        spec.strike,
        spec.ttl_years(),
        spec.risk_free_rate,
        vol.annualized,
        spec.option_type,
    );
    let theoretical_price = pricer.price(&params);

    let result = PricingResult {
        spot,
        strike: spec.strike,
        option_type: spec.option_type,
        days_to_expiry: spec.days_to_expiry,
        theoretical_price,
        annualized_volatility: vol.annualized,
        contracts_implied: payoff::contracts_implied(spec.investment_amount, theoretical_price),
        investment_amount: spec.investment_amount,
    };

    let curve = payoff::generate(spot, spec, &result, DEFAULT_GRID_POINTS)?;

    tracing::debug!(
        instrument = %series.instrument,
        spot = spot,
        strike = spec.strike,
        option_type = %spec.option_type,
        sigma = vol.annualized,
        price = theoretical_price,
        "quote computed"
    );

    Ok(Quote {
        result,
        curve,
        volatility: vol,
        pricer: pricer.name(),
    })
}
