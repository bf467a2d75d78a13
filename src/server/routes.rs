use crate::errors::{SimError, SimResult};
use crate::execution::quote::{self, Quote, StrikeBounds};
use crate::feeds::{Instrument, INSTRUMENTS};
use crate::replay::driver::ReplayParams;
use crate::replay::{self, SessionStatus};
use crate::state::{AppState, ContractSpec, OptionType, PriceSeries};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Json;
use portable_atomic::Ordering;
use std::sync::Arc;

#[derive(Debug, serde::Deserialize)]
pub struct QuoteRequest {
    pub instrument: String,
    pub option_type: String,
    pub strike: f64,
    pub days_to_expiry: i64,
    pub investment_amount: f64,
}

#[derive(Debug, serde::Deserialize)]
pub struct ReplayRequest {
    pub instrument: String,
    pub option_type: String,
    pub strike: f64,
    pub days_to_expiry: i64,
}

#[derive(serde::Serialize)]
pub struct HistoryResponse {
    pub series: Arc<PriceSeries>,
    pub last_close: f64,
    pub strike_bounds: StrikeBounds,
}

#[derive(serde::Serialize)]
pub struct QuoteResponse {
    pub instrument: String,
    #[serde(flatten)]
    pub quote: Quote,
    pub strike_bounds: StrikeBounds,
    /// Vertical extent of the current-price marker on the payoff chart
    pub payoff_range: Option<(f64, f64)>,
    pub warning: Option<String>,
}

/// Count and log a failed request before it becomes an error response.
fn track<T>(state: &AppState, route: &'static str, res: SimResult<T>) -> SimResult<T> {
    if let Err(e) = &res {
        state.counters.errors.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(route = route, error = %e, "request rejected");
    }
    res
}

/// Unwrap a JSON body, turning malformed or mistyped payloads into InvalidInput.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> SimResult<T> {
    payload
        .map(|Json(req)| req)
        .map_err(|rejection| SimError::InvalidInput(rejection.body_text()))
}

/// GET /api/instruments -- selectable underlyings
pub async fn get_instruments() -> Json<&'static [Instrument]> {
    Json(INSTRUMENTS)
}

/// GET /api/history/{id} -- full series for charting
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, SimError> {
    let res = history(&state, &id).await;
    track(&state, "history", res).map(Json)
}

async fn history(state: &AppState, id: &str) -> SimResult<HistoryResponse> {
    let series = state.load_series(id).await?;
    let last_close = series
        .last_close()
        .ok_or_else(|| SimError::InsufficientData(format!("{id}: no positive close in history")))?;
    Ok(HistoryResponse {
        series,
        last_close,
        strike_bounds: StrikeBounds::around(last_close),
    })
}

/// POST /api/quote -- price, sizing and payoff curve at the last close
pub async fn post_quote(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QuoteRequest>, JsonRejection>,
) -> Result<Json<QuoteResponse>, SimError> {
    let res = match body(payload) {
        Ok(req) => price_contract(&state, req).await,
        Err(e) => Err(e),
    };
    track(&state, "quote", res).map(Json)
}

async fn price_contract(state: &AppState, req: QuoteRequest) -> SimResult<QuoteResponse> {
    let spec = ContractSpec {
        option_type: req.option_type.parse::<OptionType>()?,
        strike: req.strike,
        days_to_expiry: req.days_to_expiry,
        risk_free_rate: state.config.risk_free_rate,
        investment_amount: req.investment_amount,
    };
    spec.validate()?;

    let series = state.load_series(&req.instrument).await?;
    let quote = quote::quote(&series, &spec, state.pricer.as_ref())?;

    let warning = (quote.result.theoretical_price <= 0.0).then(|| {
        tracing::warn!(instrument = %req.instrument, strike = spec.strike, "option priced at zero");
        "option price is zero; check strike and expiry".to_string()
    });

    let payoff_range = quote.curve.min_payoff().zip(quote.curve.max_payoff());

    state.counters.quotes_served.fetch_add(1, Ordering::Relaxed);
    Ok(QuoteResponse {
        instrument: series.instrument.clone(),
        strike_bounds: StrikeBounds::around(quote.result.spot),
        quote,
        payoff_range,
        warning,
    })
}

/// POST /api/replay/start -- begin a replay; 409 while one is running
pub async fn post_replay_start(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ReplayRequest>, JsonRejection>,
) -> Result<Json<SessionStatus>, SimError> {
    let res = match body(payload) {
        Ok(req) => start_replay(&state, req).await,
        Err(e) => Err(e),
    };
    track(&state, "replay_start", res).map(Json)
}

async fn start_replay(state: &AppState, req: ReplayRequest) -> SimResult<SessionStatus> {
    let params = ReplayParams {
        option_type: req.option_type.parse::<OptionType>()?,
        strike: req.strike,
        days_to_expiry: req.days_to_expiry,
        risk_free_rate: state.config.risk_free_rate,
    };
    params.validate()?;

    let series = state.load_series(&req.instrument).await?;
    replay::start_session(state, series, params)
}

/// POST /api/replay/stop -- idempotent
pub async fn post_replay_stop(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionStatus>, SimError> {
    track(&state, "replay_stop", replay::stop_session(&state)).map(Json)
}

/// GET /api/replay -- cursor of the current (or last) replay
pub async fn get_replay(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SessionStatus>, SimError> {
    let status = {
        let slot = state.replay_lock()?;
        SessionStatus::of(slot.as_ref())
    };
    Ok(Json(status))
}

/// GET /api/counters -- performance counters (lock-free reads)
pub async fn get_counters(
    State(state): State<Arc<AppState>>,
) -> Json<serde_json::Value> {
    use portable_atomic::Ordering::Relaxed;
    Json(serde_json::json!({
        "quotes_served": state.counters.quotes_served.load(Relaxed),
        "replays_started": state.counters.replays_started.load(Relaxed),
        "snapshots_emitted": state.counters.snapshots_emitted.load(Relaxed),
        "errors": state.counters.errors.load(Relaxed),
        "ws_messages_sent": state.counters.ws_messages_sent.load(Relaxed),
    }))
}
