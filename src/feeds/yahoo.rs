//! Yahoo Finance daily history.
//!
//! Uses the unofficial chart endpoint. Data is delayed and intended for
//! personal/educational use.

use crate::errors::{SimError, SimResult};
use crate::feeds::{HistoryProvider, Instrument};
use crate::state::{PricePoint, PriceSeries};
use futures_util::future::BoxFuture;
use reqwest::Client;

pub struct YahooHistory {
    client: Client,
    base_url: String,
    lookback_days: i64,
}

impl YahooHistory {
    pub fn new(base_url: &str, lookback_days: i64) -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            lookback_days,
        }
    }
}

impl HistoryProvider for YahooHistory {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    fn fetch<'a>(&'a self, instrument: &'a Instrument) -> BoxFuture<'a, SimResult<PriceSeries>> {
        Box::pin(async move {
            let end = chrono::Utc::now();
            let start = end - chrono::Duration::days(self.lookback_days);
            let url = format!(
                "{}/chart/{}?period1={}&period2={}&interval=1d",
                self.base_url,
                instrument.symbol,
                start.timestamp(),
                end.timestamp()
            );

            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| SimError::Network(format!("request failed: {e}")))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(SimError::Network(format!("HTTP {status}: {body}")));
            }

            let chart: ChartResponse = resp
                .json()
                .await
                .map_err(|e| SimError::Parse(format!("chart: {e}")))?;

            parse_chart(instrument.id, chart)
        })
    }
}

// Chart response shape (trimmed):
// {
//   "chart": {
//     "result": [{
//       "meta": { "symbol": "005930.KS", "gmtoffset": 32400 },
//       "timestamp": [1704153600, ...],
//       "indicators": { "quote": [{ "open": [...], "high": [...], "low": [...], "close": [...] }] }
//     }],
//     "error": null
//   }
// }

#[derive(serde::Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(serde::Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<ChartError>,
}

#[derive(serde::Deserialize)]
struct ChartError {
    code: Option<String>,
    description: Option<String>,
}

#[derive(serde::Deserialize)]
struct ChartResult {
    meta: Option<ChartMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(serde::Deserialize)]
struct ChartMeta {
    gmtoffset: Option<i64>,
}

#[derive(serde::Deserialize)]
struct Indicators {
    quote: Vec<QuoteBars>,
}

#[derive(serde::Deserialize, Default)]
struct QuoteBars {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn parse_chart(instrument_id: &str, chart: ChartResponse) -> SimResult<PriceSeries> {
    if let Some(err) = chart.chart.error {
        return Err(SimError::NoData(format!(
            "{}: {}",
            err.code.unwrap_or_default(),
            err.description.unwrap_or_default()
        )));
    }

    let result = chart
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| SimError::NoData(format!("{instrument_id}: no chart result")))?;

    // Bars are stamped at the exchange open in UTC; shift to local dates
    let offset = result.meta.and_then(|m| m.gmtoffset).unwrap_or(0);
    let bars = result.indicators.quote.into_iter().next().unwrap_or_default();
    let cell = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();

    let points = result
        .timestamp
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .filter_map(|(i, ts)| {
            let date = chrono::DateTime::from_timestamp(ts + offset, 0)?.date_naive();
            Some(PricePoint {
                date,
                open: cell(&bars.open, i),
                high: cell(&bars.high, i),
                low: cell(&bars.low, i),
                close: cell(&bars.close, i),
            })
        })
        .collect();

    Ok(PriceSeries::new(instrument_id, points))
}
