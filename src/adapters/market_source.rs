//! Market configuration sources
//!
//! The configuration collection is owned by the CRUD service; this side only
//! reads it, freshly on every cycle.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::MarketConfig;
use crate::error::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Current market configurations in stored order; empty when none exist
    async fn load(&self) -> Result<Vec<MarketConfig>>;
}

/// Reads the JSON array persisted by the configuration service
#[derive(Debug, Clone)]
pub struct JsonFileMarketSource {
    path: PathBuf,
}

impl JsonFileMarketSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl MarketSource for JsonFileMarketSource {
    async fn load(&self) -> Result<Vec<MarketConfig>> {
        if !self.path.exists() {
            debug!("No market file at {:?}", self.path);
            return Ok(Vec::new());
        }

        let content = tokio::fs::read_to_string(&self.path).await?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }

        let markets: Vec<MarketConfig> = serde_json::from_str(&content)?;
        debug!("Loaded {} markets from {:?}", markets.len(), self.path);
        Ok(markets)
    }
}

/// Fixed list of markets
#[derive(Debug, Clone, Default)]
pub struct StaticMarketSource {
    markets: Vec<MarketConfig>,
}

impl StaticMarketSource {
    pub fn new(markets: Vec<MarketConfig>) -> Self {
        Self { markets }
    }
}

#[async_trait]
impl MarketSource for StaticMarketSource {
    async fn load(&self) -> Result<Vec<MarketConfig>> {
        Ok(self.markets.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoggerError;
    use rust_decimal_macros::dec;

    fn temp_file(name: &str, content: Option<&str>) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "threshold_logger_{}_{}.json",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);
        if let Some(content) = content {
            std::fs::write(&path, content).unwrap();
        }
        path
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let source = JsonFileMarketSource::new(temp_file("missing", None));
        assert!(source.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_blank_file_is_empty() {
        let path = temp_file("blank", Some("  \n"));
        let source = JsonFileMarketSource::new(&path);
        assert!(source.load().await.unwrap().is_empty());
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_loads_markets_in_order() {
        let path = temp_file(
            "markets",
            Some(
                r#"[
                    {"marketId": "MKT002", "marketLabel": "ETH above $5k?", "threshold1": 0.99},
                    {"marketId": "MKT001", "marketLabel": "Will BTC close above $100k?",
                     "threshold1": 1.0, "threshold2": 0.95, "threshold3": 0.90}
                ]"#,
            ),
        );
        let markets = JsonFileMarketSource::new(&path).load().await.unwrap();

        assert_eq!(markets.len(), 2);
        assert_eq!(markets[0].market_id, "MKT002");
        assert_eq!(markets[0].thresholds(), [dec!(0.99), dec!(0.95), dec!(0.90)]);
        assert_eq!(markets[1].market_label, "Will BTC close above $100k?");
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_malformed_file_is_an_error() {
        let path = temp_file("malformed", Some(r#"[{"marketLabel": "no id"}]"#));
        let err = JsonFileMarketSource::new(&path).load().await.unwrap_err();
        assert!(matches!(err, LoggerError::Json(_)));
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn test_reload_sees_changes() {
        let path = temp_file("reload", Some("[]"));
        let source = JsonFileMarketSource::new(&path);
        assert!(source.load().await.unwrap().is_empty());

        std::fs::write(&path, r#"[{"marketId": "MKT009", "marketLabel": "New"}]"#).unwrap();
        assert_eq!(source.load().await.unwrap().len(), 1);
        let _ = std::fs::remove_file(path);
    }
}
