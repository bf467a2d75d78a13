use crate::errors::{SimError, SimResult};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySource {
    Csv,
    Yahoo,
}

impl std::str::FromStr for HistorySource {
    type Err = SimError;

    fn from_str(s: &str) -> SimResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "yahoo" => Ok(Self::Yahoo),
            other => Err(SimError::Config(format!("HISTORY_SOURCE: unknown source {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub risk_free_rate: f64,
    pub replay_interval_ms: u64,
    pub history_source: HistorySource,
    pub data_dir: PathBuf,
    pub yahoo_base_url: String,
    pub history_days: i64,
    pub history_cache_secs: i64,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> SimResult<Self> {
        dotenvy::dotenv().ok();

        let risk_free_rate = env_var_or("RISK_FREE_RATE", "0.035")
            .parse::<f64>()
            .map_err(|e| SimError::Config(format!("RISK_FREE_RATE: {e}")))?;

        let replay_interval_ms = env_var_or("REPLAY_INTERVAL_MS", "150")
            .parse::<u64>()
            .map_err(|e| SimError::Config(format!("REPLAY_INTERVAL_MS: {e}")))?;

        let history_days = env_var_or("HISTORY_DAYS", "365")
            .parse::<i64>()
            .map_err(|e| SimError::Config(format!("HISTORY_DAYS: {e}")))?;

        let history_cache_secs = env_var_or("HISTORY_CACHE_SECS", "3600")
            .parse::<i64>()
            .map_err(|e| SimError::Config(format!("HISTORY_CACHE_SECS: {e}")))?;

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| SimError::Config(format!("SERVER_PORT: {e}")))?;

        let config = Self {
            risk_free_rate,
            replay_interval_ms,
            history_source: env_var_or("HISTORY_SOURCE", "csv").parse()?,
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            yahoo_base_url: env_var_or(
                "YAHOO_BASE_URL",
                "https://query1.finance.yahoo.com/v8/finance",
            ),
            history_days,
            history_cache_secs,
            server_port,
        };
        config.validate()?;
        Ok(config)
    }

    /// Range checks that parsing alone does not catch.
    pub fn validate(&self) -> SimResult<()> {
        if self.replay_interval_ms == 0 {
            return Err(SimError::Config("REPLAY_INTERVAL_MS must be positive".into()));
        }
        if self.history_days <= 0 {
            return Err(SimError::Config(format!(
                "HISTORY_DAYS must be positive, got {}",
                self.history_days
            )));
        }
        if self.history_cache_secs < 0 {
            return Err(SimError::Config(format!(
                "HISTORY_CACHE_SECS must be non-negative, got {}",
                self.history_cache_secs
            )));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.035,
            replay_interval_ms: 150,
            history_source: HistorySource::Csv,
            data_dir: PathBuf::from("data"),
            yahoo_base_url: "https://query1.finance.yahoo.com/v8/finance".into(),
            history_days: 365,
            history_cache_secs: 3600,
            server_port: 3001,
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_source_parse() {
        assert_eq!("CSV".parse::<HistorySource>().unwrap(), HistorySource::Csv);
        assert_eq!(" yahoo ".parse::<HistorySource>().unwrap(), HistorySource::Yahoo);
        assert!("sqlite".parse::<HistorySource>().is_err());
    }

    #[test]
    fn test_validate_ranges() {
        assert!(AppConfig::default().validate().is_ok());

        let zero_cache = AppConfig {
            history_cache_secs: 0,
            ..AppConfig::default()
        };
        assert!(zero_cache.validate().is_ok());

        let bad = [
            AppConfig { replay_interval_ms: 0, ..AppConfig::default() },
            AppConfig { history_days: -30, ..AppConfig::default() },
            AppConfig { history_cache_secs: -1, ..AppConfig::default() },
        ];
        for cfg in bad {
            assert!(matches!(cfg.validate(), Err(SimError::Config(_))), "{cfg:?}");
        }
    }
}
