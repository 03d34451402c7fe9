// 7.0 config.rs: risk settings in one place. collateral weights, stake risk,
// liquidation premium, the two overdue windows.
// 7.1 weights, stake risk and premium are all x/255 fractions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{AccountId, Amount, AssetId, FULL_WEIGHT};

/// An asset counted toward a position, with its risk weight out of 255.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralAsset {
    pub asset: AssetId,
    pub weight: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeConfig {
    // Unit of account. oracle prices are quoted in it and its own price is 1.
    // Liquidation rewards are paid in it.
    pub settlement_asset: AssetId,
    // Asset accounts can lock as stake
    pub stake_asset: AssetId,
    // Assets counted as collateral, in evaluation order
    pub collateral: Vec<CollateralAsset>,
    // Weight applied to locked stake
    pub stake_risk: u8,
    // Liquidator bonus on repaid value
    pub liquidation_premium: u8,
    // Oracle prices older than this are unusable
    pub price_overdue: Duration,
    // Liabilities older than this are overdue
    pub position_overdue: Duration,
    // When set, only this identity may submit fills
    pub allowed_matcher: Option<AccountId>,
    // A liquidation may not leave the target POSITIVE above this weighted position
    pub max_post_liquidation_position: Amount,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            settlement_asset: AssetId(1),
            stake_asset: AssetId(1),
            collateral: Vec::new(),
            stake_risk: FULL_WEIGHT,
            liquidation_premium: 12, // ~4.7%
            price_overdue: Duration::from_secs(3 * 3600),
            position_overdue: Duration::from_secs(30 * 86_400),
            allowed_matcher: None,
            max_post_liquidation_position: Amount::from_units(10 * 100_000_000),
        }
    }
}

impl ExchangeConfig {
    // Create a configuration preset for testnet with short windows
    pub fn testnet() -> Self {
        Self {
            price_overdue: Duration::from_secs(3600),
            position_overdue: Duration::from_secs(86_400),
            ..Self::default()
        }
    }

    // Create a configuration preset for mainnet with conservative settings
    pub fn mainnet_conservative() -> Self {
        Self {
            stake_risk: 204, // 80%
            liquidation_premium: 25,
            price_overdue: Duration::from_secs(15 * 60),
            position_overdue: Duration::from_secs(7 * 86_400),
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_collateral(mut self, asset: AssetId, weight: u8) -> Self {
        self.set_collateral_weight(asset, weight);
        self
    }

    // Validate the configuration for internal consistency
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.price_overdue.is_zero() {
            return Err(ConfigError::InvalidWindow {
                reason: "price_overdue must be positive".to_string(),
            });
        }
        if self.position_overdue.is_zero() {
            return Err(ConfigError::InvalidWindow {
                reason: "position_overdue must be positive".to_string(),
            });
        }
        if self.liquidation_premium == 0 {
            return Err(ConfigError::InvalidRisk {
                reason: "liquidation premium must be positive".to_string(),
            });
        }
        if !self.max_post_liquidation_position.is_positive() {
            return Err(ConfigError::InvalidRisk {
                reason: "liquidation ceiling must be positive".to_string(),
            });
        }
        for (i, c) in self.collateral.iter().enumerate() {
            if c.asset.is_native() {
                return Err(ConfigError::InvalidCollateral {
                    reason: "native sentinel cannot be collateral".to_string(),
                });
            }
            if self.collateral[..i].iter().any(|p| p.asset == c.asset) {
                return Err(ConfigError::InvalidCollateral {
                    reason: format!("{} listed twice", c.asset),
                });
            }
        }
        Ok(())
    }

    // Get collateral weight for an asset. not configured means not collateral.
    pub fn collateral_weight(&self, asset: AssetId) -> Option<u8> {
        self.collateral
            .iter()
            .find(|c| c.asset == asset)
            .map(|c| c.weight)
    }

    pub fn set_collateral_weight(&mut self, asset: AssetId, weight: u8) {
        match self.collateral.iter_mut().find(|c| c.asset == asset) {
            Some(entry) => entry.weight = weight,
            None => self.collateral.push(CollateralAsset { asset, weight }),
        }
    }

    pub fn remove_collateral_asset(&mut self, asset: AssetId) -> bool {
        let before = self.collateral.len();
        self.collateral.retain(|c| c.asset != asset);
        self.collateral.len() != before
    }
}

// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid window: {reason}")]
    InvalidWindow { reason: String },

    #[error("invalid risk parameter: {reason}")]
    InvalidRisk { reason: String },

    #[error("invalid collateral: {reason}")]
    InvalidCollateral { reason: String },

    #[error("config parse error: {0}")]
    Parse(String),
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Testnet,
    Mainnet,
}

impl Environment {
    pub fn config(&self) -> ExchangeConfig {
        match self {
            Environment::Development => ExchangeConfig::default(),
            Environment::Testnet => ExchangeConfig::testnet(),
            Environment::Mainnet => ExchangeConfig::mainnet_conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Testnet.config().validate().is_ok());
        assert!(Environment::Mainnet.config().validate().is_ok());
    }

    #[test]
    fn test_collateral_weights() {
        let mut config = ExchangeConfig::default()
            .with_collateral(AssetId(2), 255)
            .with_collateral(AssetId(3), 200);
        assert_eq!(config.collateral_weight(AssetId(3)), Some(200));
        assert_eq!(config.collateral_weight(AssetId(4)), None);

        config.set_collateral_weight(AssetId(3), 100);
        assert_eq!(config.collateral.len(), 2);
        assert_eq!(config.collateral_weight(AssetId(3)), Some(100));

        assert!(config.remove_collateral_asset(AssetId(2)));
        assert!(!config.remove_collateral_asset(AssetId(2)));
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = ExchangeConfig::default();
        config.price_overdue = Duration::ZERO;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidWindow { .. })));

        let mut config = ExchangeConfig::default();
        config.liquidation_premium = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRisk { .. })));

        let mut config = ExchangeConfig::default();
        config.collateral.push(CollateralAsset { asset: AssetId(2), weight: 1 });
        config.collateral.push(CollateralAsset { asset: AssetId(2), weight: 2 });
        assert!(matches!(config.validate(), Err(ConfigError::InvalidCollateral { .. })));
    }

    #[test]
    fn test_config_serialization() {
        let config = ExchangeConfig::mainnet_conservative().with_collateral(AssetId(2), 250);
        let json = serde_json::to_string(&config).unwrap();
        let back = ExchangeConfig::from_json(&json).unwrap();
        assert_eq!(back, config);

        assert!(matches!(
            ExchangeConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
