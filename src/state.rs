use crate::config::AppConfig;
use crate::errors::{SimError, SimResult};
use crate::feeds::cache::HistoryCache;
use crate::feeds::{self, HistoryProvider};
use crate::models::OptionPricer;
use crate::replay::ReplaySession;
use chrono::NaiveDate;
use portable_atomic::{AtomicU64, Ordering};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

/// Calendar days per year used to convert days-to-expiry into years.
pub const DAYS_PER_YEAR: f64 = 365.0;

// ── Contract Types ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptionType {
    Call,
    Put,
}

impl OptionType {
    /// Payoff if exercised now at `spot`.
    #[inline]
    pub fn intrinsic(self, spot: f64, strike: f64) -> f64 {
        match self {
            Self::Call => (spot - strike).max(0.0),
            Self::Put => (strike - spot).max(0.0),
        }
    }
}

impl std::fmt::Display for OptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Call => write!(f, "call"),
            Self::Put => write!(f, "put"),
        }
    }
}

impl std::str::FromStr for OptionType {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "call" => Ok(Self::Call),
            "put" => Ok(Self::Put),
            other => Err(SimError::InvalidInput(format!("unknown option type: {other:?}"))),
        }
    }
}

/// One pricing request's contract. Immutable for the duration of a computation.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct ContractSpec {
    pub option_type: OptionType,
    pub strike: f64,
    pub days_to_expiry: i64,
    pub risk_free_rate: f64,
    pub investment_amount: f64,
}

impl ContractSpec {
    /// Reject out-of-range fields before any numeric work.
    pub fn validate(&self) -> SimResult<()> {
        let mut problems: SmallVec<[String; 4]> = SmallVec::new();
        problems.extend(check_strike_and_days(self.strike, self.days_to_expiry));
        if !(self.investment_amount > 0.0 && self.investment_amount.is_finite()) {
            problems.push(format!("investment amount must be positive, got {}", self.investment_amount));
        }
        if !self.risk_free_rate.is_finite() {
            problems.push("risk-free rate must be finite".into());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(SimError::InvalidInput(problems.join("; ")))
        }
    }

    #[inline]
    pub fn ttl_years(&self) -> f64 {
        self.days_to_expiry as f64 / DAYS_PER_YEAR
    }
}

/// Shared strike/expiry checks for quotes and replays.
pub fn check_strike_and_days(strike: f64, days_to_expiry: i64) -> SmallVec<[String; 2]> {
    let mut problems = SmallVec::new();
    if !(strike > 0.0 && strike.is_finite()) {
        problems.push(format!("strike must be positive, got {strike}"));
    }
    if days_to_expiry < 0 {
        problems.push(format!("days to expiry must be non-negative, got {days_to_expiry}"));
    }
    problems
}

// ── Price History ──

/// A single trading day. Missing cells are `None`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
}

/// Daily history for one instrument, ascending by date.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PriceSeries {
    pub instrument: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    /// Sorts by date so consumers can rely on chronological order.
    pub fn new(instrument: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self {
            instrument: instrument.into(),
            points,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Closing prices present in the series, in order. Missing closes are
    /// dropped here; the points themselves keep their place in the index.
    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().filter_map(|p| p.close).collect()
    }

    /// Most recent usable close.
    pub fn last_close(&self) -> Option<f64> {
        self.points.iter().rev().find_map(|p| usable_price(p.close))
    }
}

/// A price that can be fed into the pricer: present, finite and positive.
#[inline]
pub fn usable_price(price: Option<f64>) -> Option<f64> {
    price.filter(|p| *p > 0.0 && p.is_finite())
}

// ── Derived Values ──

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PricingResult {
    pub spot: f64,
    pub strike: f64,
    pub option_type: OptionType,
    pub days_to_expiry: i64,
    pub theoretical_price: f64,
    pub annualized_volatility: f64,
    pub contracts_implied: f64,
    pub investment_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PayoffPoint {
    pub spot: f64,
    pub net_payoff: f64,
}

/// Net P/L at expiry over a spot grid, ascending by spot.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PayoffCurve {
    pub points: Vec<PayoffPoint>,
}

impl PayoffCurve {
    pub fn min_payoff(&self) -> Option<f64> {
        self.points.iter().map(|p| p.net_payoff).reduce(f64::min)
    }

    pub fn max_payoff(&self) -> Option<f64> {
        self.points.iter().map(|p| p.net_payoff).reduce(f64::max)
    }
}

// ── Replay ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayState {
    Idle,
    Running,
}

impl std::fmt::Display for ReplayState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// One replay step. Consumed by the sink and discarded.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ReplaySnapshot {
    pub step_index: usize,
    pub total_steps: usize,
    pub date: NaiveDate,
    pub price_at_step: Option<f64>,
    pub cumulative_volatility: f64,
    pub theoretical_price_at_step: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ReplayStatus {
    pub state: ReplayState,
    pub step_index: usize,
    pub total_steps: usize,
}

impl Default for ReplayStatus {
    fn default() -> Self {
        Self {
            state: ReplayState::Idle,
            step_index: 0,
            total_steps: 0,
        }
    }
}

// ── Messages OUT to display clients ──

#[derive(Debug, Clone, serde::Serialize)]
#[serde(tag = "type")]
pub enum WsMessage {
    #[serde(rename = "replay_snapshot")]
    ReplaySnapshot {
        session_id: String,
        #[serde(flatten)]
        snapshot: ReplaySnapshot,
    },

    #[serde(rename = "replay_state")]
    ReplayStateMsg {
        session_id: Option<String>,
        state: String,
        reason: String,
    },
}

// ── Performance Counters (lock-free) ──

pub struct PerfCounters {
    pub quotes_served: AtomicU64,
    pub replays_started: AtomicU64,
    pub snapshots_emitted: AtomicU64,
    pub errors: AtomicU64,
    pub ws_messages_sent: AtomicU64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self {
            quotes_served: AtomicU64::new(0),
            replays_started: AtomicU64::new(0),
            snapshots_emitted: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            ws_messages_sent: AtomicU64::new(0),
        }
    }
}

// ── Application shared state ──

pub struct AppState {
    pub config: AppConfig,
    pub provider: Arc<dyn HistoryProvider>,
    pub pricer: Arc<dyn OptionPricer>,
    pub cache: HistoryCache,

    // The one replay cursor. HTTP handlers and the ticker take this lock for
    // a single call each and never across an await.
    pub replay: Mutex<Option<ReplaySession>>,

    // Core -> display clients: event stream (broadcast for WS clients)
    pub ws_tx: broadcast::Sender<WsMessage>,

    pub counters: PerfCounters,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn HistoryProvider>,
        pricer: Arc<dyn OptionPricer>,
    ) -> Arc<Self> {
        let (ws_tx, _) = broadcast::channel(2048);
        let cache = HistoryCache::new(chrono::Duration::seconds(config.history_cache_secs));

        Arc::new(Self {
            config,
            provider,
            pricer,
            cache,
            replay: Mutex::new(None),
            ws_tx,
            counters: PerfCounters::new(),
        })
    }

    #[inline]
    pub fn broadcast(&self, msg: WsMessage) {
        self.counters.ws_messages_sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.ws_tx.send(msg);
    }

    /// History for an instrument id, from cache or the provider.
    /// Provider failures become `NoData`; an empty series is `InsufficientData`.
    pub async fn load_series(&self, instrument_id: &str) -> SimResult<Arc<PriceSeries>> {
        let instrument = feeds::find_instrument(instrument_id)?;

        if let Some(series) = self.cache.get(instrument.id) {
            return Ok(series);
        }

        let series = match self.provider.fetch(instrument).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(instrument = instrument.id, error = %e, "history fetch failed");
                return Err(SimError::NoData(format!("{}: {e}", instrument.id)));
            }
        };

        if series.is_empty() {
            return Err(SimError::InsufficientData(format!(
                "{}: price history is empty",
                instrument.id
            )));
        }

        tracing::info!(instrument = instrument.id, points = series.len(), "history loaded");
        let series = Arc::new(series);
        self.cache.insert(instrument.id, series.clone());
        Ok(series)
    }

    pub fn replay_lock(&self) -> SimResult<std::sync::MutexGuard<'_, Option<ReplaySession>>> {
        self.replay
            .lock()
            .map_err(|e| SimError::StateCorruption(format!("replay lock poisoned: {e}")))
    }
}
