use crate::{portfolio::PortfolioConfig, risk::RiskConfig};
use ashare_execution::{
    broker::mock::MockBrokerConfig, cost::CostConfig, simulator::SimulatorConfig,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Core engine settings.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CoreConfig {
    pub initial_capital: Decimal,
    /// When false, signals are observed and logged but never executed.
    pub enable_trading: bool,
    pub max_orders_per_second: u32,
    pub heartbeat_interval_s: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::new(1_000_000, 0),
            enable_trading: true,
            max_orders_per_second: 10,
            heartbeat_interval_s: 30,
        }
    }
}

/// Persistent cache settings.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    pub db_path: PathBuf,
    pub default_ttl_s: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("cache.db"),
            default_ttl_s: 3_600,
        }
    }
}

/// The aggregate configuration document consumed by the engines. Every section has serde
/// defaults, so a partial document (or none at all) yields a fully-populated configuration.
#[derive(Clone, PartialEq, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    pub market: SimulatorConfig,
    pub costs: CostConfig,
    pub risk: RiskConfig,
    pub engine: CoreConfig,
    pub broker: MockBrokerConfig,
    pub cache: CacheConfig,
}

impl EngineConfig {
    /// Portfolio settings implied by this document.
    pub fn portfolio(&self) -> PortfolioConfig {
        PortfolioConfig {
            initial_capital: self.engine.initial_capital,
            max_position_pct: self.risk.max_position_pct,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn empty_document_deserializes_to_defaults() {
        let config: EngineConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.engine.initial_capital, dec!(1000000));
        assert_eq!(config.engine.max_orders_per_second, 10);
        assert_eq!(config.costs.min_commission, dec!(5));
        assert_eq!(config.risk.max_total_exposure, dec!(0.95));
        assert!(!config.market.ignore_trading_hours);
        assert_eq!(config.cache.default_ttl_s, 3_600);
    }

    #[test]
    fn partial_document_overrides_only_named_keys() {
        let config: EngineConfig = serde_json::from_str(
            r#"{
                "engine": {"initial_capital": "500000", "enable_trading": false},
                "risk": {"max_position_pct": "0.2"}
            }"#,
        )
        .unwrap();

        assert_eq!(config.engine.initial_capital, dec!(500000));
        assert!(!config.engine.enable_trading);
        assert_eq!(config.risk.max_position_pct, dec!(0.2));
        // untouched sections keep their defaults
        assert_eq!(config.engine.max_orders_per_second, 10);
        assert_eq!(config.portfolio().max_position_pct, dec!(0.2));
    }
}
