pub mod cache;
pub mod csv_history;
pub mod yahoo;

use crate::config::{AppConfig, HistorySource};
use crate::errors::{SimError, SimResult};
use crate::state::PriceSeries;
use futures_util::future::BoxFuture;
use std::sync::Arc;

/// A selectable underlying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct Instrument {
    pub id: &'static str,
    pub name: &'static str,
    /// Yahoo Finance ticker
    pub symbol: &'static str,
    /// File name under the data directory
    pub csv_file: &'static str,
}

pub const INSTRUMENTS: &[Instrument] = &[
    Instrument {
        id: "samsung",
        name: "삼성전자",
        symbol: "005930.KS",
        csv_file: "samsung.csv",
    },
    Instrument {
        id: "sk",
        name: "SK하이닉스",
        symbol: "000660.KS",
        csv_file: "sk.csv",
    },
    Instrument {
        id: "lg",
        name: "LG",
        symbol: "003550.KS",
        csv_file: "lg.csv",
    },
];

pub fn find_instrument(id: &str) -> SimResult<&'static Instrument> {
    INSTRUMENTS
        .iter()
        .find(|i| i.id.eq_ignore_ascii_case(id.trim()))
        .ok_or_else(|| SimError::InvalidInput(format!("unknown instrument: {id:?}")))
}

/// Supplies daily history for an instrument, ascending by date.
/// Retrieval completes before any pricing starts; failures are reported, not retried.
pub trait HistoryProvider: Send + Sync {
    fn name(&self) -> &'static str;

    fn fetch<'a>(&'a self, instrument: &'a Instrument) -> BoxFuture<'a, SimResult<PriceSeries>>;
}

pub fn build_provider(config: &AppConfig) -> Arc<dyn HistoryProvider> {
    let provider: Arc<dyn HistoryProvider> = match config.history_source {
        HistorySource::Csv => Arc::new(csv_history::CsvHistory::new(config.data_dir.clone())),
        HistorySource::Yahoo => Arc::new(yahoo::YahooHistory::new(
            &config.yahoo_base_url,
            config.history_days,
        )),
    };
    tracing::info!(provider = provider.name(), "history provider ready");
    provider
}
