use crate::errors::{SimError, SimResult};
use crate::feeds::{HistoryProvider, Instrument};
use crate::state::{PricePoint, PriceSeries};
use chrono::NaiveDate;
use futures_util::future::BoxFuture;
use std::path::PathBuf;

/// Bundled daily histories: one `Date,Open,High,Low,Close[,...]` file per
/// instrument. Blank or unparseable cells load as `None`.
pub struct CsvHistory {
    data_dir: PathBuf,
}

impl CsvHistory {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }
}

impl HistoryProvider for CsvHistory {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn fetch<'a>(&'a self, instrument: &'a Instrument) -> BoxFuture<'a, SimResult<PriceSeries>> {
        Box::pin(async move {
            let path = self.data_dir.join(instrument.csv_file);
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| SimError::Io(format!("{}: {e}", path.display())))?;
            parse_csv(instrument.id, &bytes)
        })
    }
}

#[derive(serde::Deserialize)]
struct CsvRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Open", default, deserialize_with = "csv::invalid_option")]
    open: Option<f64>,
    #[serde(rename = "High", default, deserialize_with = "csv::invalid_option")]
    high: Option<f64>,
    #[serde(rename = "Low", default, deserialize_with = "csv::invalid_option")]
    low: Option<f64>,
    #[serde(rename = "Close", default, deserialize_with = "csv::invalid_option")]
    close: Option<f64>,
}

/// Parse a history file. A row with an unreadable date is an error; a row
/// with missing prices is kept.
pub fn parse_csv(instrument_id: &str, bytes: &[u8]) -> SimResult<PriceSeries> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(bytes);

    let mut points = Vec::new();
    for (line, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row?;
        let date = parse_date(&row.date).ok_or_else(|| {
            SimError::Parse(format!("{instrument_id}: row {}: bad date {:?}", line + 1, row.date))
        })?;
        points.push(PricePoint {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
        });
    }

    Ok(PriceSeries::new(instrument_id, points))
}

/// Accepts `2024-01-02` and exports with a time suffix such as `2024-01-02 00:00:00+09:00`.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let day = s.get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}
