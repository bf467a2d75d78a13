use crate::errors::{SimError, SimResult};
use crate::models::volatility::RunningVolatility;
use crate::models::{OptionPricer, PricingParams};
use crate::state::{
    check_strike_and_days, usable_price, OptionType, PriceSeries, ReplaySnapshot, ReplayState,
    ReplayStatus, DAYS_PER_YEAR,
};
use std::sync::Arc;

/// Fixed contract terms for a replay. The spot comes from each step.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ReplayParams {
    pub option_type: OptionType,
    pub strike: f64,
    pub days_to_expiry: i64,
    pub risk_free_rate: f64,
}

impl ReplayParams {
    pub fn validate(&self) -> SimResult<()> {
        let problems = check_strike_and_days(self.strike, self.days_to_expiry);
        if problems.is_empty() {
            Ok(())
        } else {
            Err(SimError::InvalidInput(problems.join("; ")))
        }
    }
}

/// Replays a history one day per tick.
///
/// State machine: Idle -> Running (start) -> Idle (stop, or the tick after
/// the last step). `tick()` is synchronous and has no timer of its own; the
/// host calls it at whatever cadence it likes.
///
/// Volatility at step i covers closes[0..=i]. It is kept in a running
/// accumulator, so a tick is O(1) and the result equals re-estimating the
/// whole prefix.
pub struct ReplayDriver {
    series: Arc<PriceSeries>,
    params: ReplayParams,
    pricer: Arc<dyn OptionPricer>,
    state: ReplayState,
    step: usize,
    vol: RunningVolatility,
}

impl ReplayDriver {
    pub fn new(
        series: Arc<PriceSeries>,
        params: ReplayParams,
        pricer: Arc<dyn OptionPricer>,
    ) -> SimResult<Self> {
        params.validate()?;
        Ok(Self {
            series,
            params,
            pricer,
            state: ReplayState::Idle,
            step: 0,
            vol: RunningVolatility::new(),
        })
    }

    /// Idle -> Running from step 0.
    pub fn start(&mut self) -> SimResult<()> {
        if self.state == ReplayState::Running {
            return Err(SimError::ReplayActive);
        }
        if self.series.is_empty() {
            return Err(SimError::InsufficientData(format!(
                "{}: no price history to replay",
                self.series.instrument
            )));
        }

        self.step = 0;
        self.vol = RunningVolatility::new();
        self.state = ReplayState::Running;
        tracing::info!(
            instrument = %self.series.instrument,
            steps = self.series.len(),
            strike = self.params.strike,
            option_type = %self.params.option_type,
            "replay started"
        );
        Ok(())
    }

    /// Running -> Idle. No-op when already idle.
    pub fn stop(&mut self) {
        if self.state == ReplayState::Running {
            self.state = ReplayState::Idle;
            tracing::info!(step = self.step, "replay stopped");
        }
    }

    /// Emit the snapshot for the current step and advance.
    ///
    /// Returns None while idle, and on the tick past the last step, which
    /// also moves the driver to Idle.
    pub fn tick(&mut self) -> Option<ReplaySnapshot> {
        if self.state != ReplayState::Running {
            return None;
        }

        let total = self.series.len();
        let Some(point) = self.series.points.get(self.step) else {
            self.state = ReplayState::Idle;
            tracing::info!(steps = total, skipped_returns = self.vol.skipped(), "replay completed");
            return None;
        };

        // Missing closes leave the index intact but add nothing to the stats
        if let Some(close) = point.close {
            self.vol.push(close);
        }

        // Under two returns: report zero vol, which prices at intrinsic
        let sigma = self.vol.annualized().unwrap_or(0.0);
        let spot = usable_price(point.close);
        let theoretical = spot.map(|s| {
            self.pricer.price(&PricingParams::new(
                s,
                self.params.strike,
                self.params.days_to_expiry as f64 / DAYS_PER_YEAR,
                self.params.risk_free_rate,
                sigma,
                self.params.option_type,
            ))
        });

        let snapshot = ReplaySnapshot {
            step_index: self.step,
            total_steps: total,
            date: point.date,
            price_at_step: spot,
            cumulative_volatility: sigma,
            theoretical_price_at_step: theoretical,
        };

        tracing::debug!(
            step = self.step,
            price = ?spot,
            sigma = sigma,
            returns = self.vol.returns_used(),
            value = ?theoretical,
            "replay tick"
        );

        self.step += 1;
        Some(snapshot)
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.state == ReplayState::Running
    }

    pub fn status(&self) -> ReplayStatus {
        ReplayStatus {
            state: self.state,
            step_index: self.step,
            total_steps: self.series.len(),
        }
    }
}
