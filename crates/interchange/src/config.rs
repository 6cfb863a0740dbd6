use std::path::{Path, PathBuf};
use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::price::{PriceTable, SimulatedOracle};

/// Runtime settings, loaded from TOML. Every field has a default.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Chain selected when no preference is stored.
    pub default_chain_id: u32,
    /// Simulated latency before an amount recompute resolves.
    pub recompute_delay_ms: u64,
    /// Simulated settlement time for a submitted swap.
    pub swap_delay_ms: u64,
    pub bridge_fee_min: Decimal,
    pub bridge_fee_max: Decimal,
    pub price_impact_max: Decimal,
    /// JSON file for persisted preferences; in-memory when unset.
    pub storage_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_chain_id: 1,
            recompute_delay_ms: 500,
            swap_delay_ms: 2000,
            bridge_fee_min: Decimal::new(10, 2),
            bridge_fee_max: Decimal::new(30, 2),
            price_impact_max: Decimal::new(50, 2),
            storage_path: None,
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let percent = Decimal::ZERO..=Decimal::ONE_HUNDRED;
        if !percent.contains(&self.bridge_fee_min) || !percent.contains(&self.bridge_fee_max) {
            return Err(ConfigError::Invalid(
                "bridge fee bounds must lie within 0..=100".to_string(),
            ));
        }
        if self.bridge_fee_min > self.bridge_fee_max {
            return Err(ConfigError::Invalid(format!(
                "bridge_fee_min {} exceeds bridge_fee_max {}",
                self.bridge_fee_min, self.bridge_fee_max
            )));
        }
        if !percent.contains(&self.price_impact_max) {
            return Err(ConfigError::Invalid(
                "price_impact_max must lie within 0..=100".to_string(),
            ));
        }
        Ok(())
    }

    pub fn recompute_delay(&self) -> Duration {
        Duration::from_millis(self.recompute_delay_ms)
    }

    pub fn swap_delay(&self) -> Duration {
        Duration::from_millis(self.swap_delay_ms)
    }

    /// Runtime oracle over the built-in price table using these bounds.
    pub fn simulated_oracle(&self) -> SimulatedOracle {
        SimulatedOracle::new(
            PriceTable::builtin(),
            self.bridge_fee_min,
            self.bridge_fee_max,
            self.price_impact_max,
        )
    }
}
