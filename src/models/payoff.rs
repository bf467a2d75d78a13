use crate::errors::{SimError, SimResult};
use crate::state::{ContractSpec, PayoffCurve, PayoffPoint, PricingResult};

/// Units of the underlying per option contract.
pub const CONTRACT_MULTIPLIER: f64 = 100.0;

/// 201 samples = 200 equal steps across the grid.
pub const DEFAULT_GRID_POINTS: usize = 201;

/// Grid bounds as fractions of the current price.
const GRID_LOW: f64 = 0.5;
const GRID_HIGH: f64 = 1.5;

/// Number of contracts `investment` buys at `theoretical_price` per unit.
/// Zero when the option is priced at zero.
#[inline]
pub fn contracts_implied(investment: f64, theoretical_price: f64) -> f64 {
    if theoretical_price > 0.0 {
        investment / (theoretical_price * CONTRACT_MULTIPLIER)
    } else {
        0.0
    }
}

/// Net P/L at expiry over [0.5, 1.5] x `current_price`.
///
/// net(p) = intrinsic(p) * contracts * 100 - investment
///
/// Pure function: regenerated in full on every call.
pub fn generate(
    current_price: f64,
    spec: &ContractSpec,
    pricing: &PricingResult,
    grid_points: usize,
) -> SimResult<PayoffCurve> {
    if !(current_price > 0.0 && current_price.is_finite()) {
        return Err(SimError::InvalidInput(format!(
            "current price must be positive, got {current_price}"
        )));
    }
    if grid_points < 2 {
        return Err(SimError::InvalidInput(format!(
            "payoff grid needs at least 2 points, got {grid_points}"
        )));
    }

    let lo = current_price * GRID_LOW;
    let hi = current_price * GRID_HIGH;
    let step = (hi - lo) / (grid_points - 1) as f64;
    let units = pricing.contracts_implied * CONTRACT_MULTIPLIER;

    let points = (0..grid_points)
        .map(|i| {
            // Pin the last sample so the grid is inclusive of `hi` exactly
            let spot = if i == grid_points - 1 { hi } else { lo + step * i as f64 };
            let gross = spec.option_type.intrinsic(spot, spec.strike) * units;
            PayoffPoint {
                spot,
                net_payoff: gross - spec.investment_amount,
            }
        })
        .collect();

    Ok(PayoffCurve { points })
}
