//! Session settings for the trading binary

use crate::session::SessionConfig;
use common::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Strategy to start on
    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default = "default_base_stake")]
    pub base_stake: Decimal,

    /// JSON strategy document; the built-in presets when absent
    #[serde(default)]
    pub strategies_file: Option<String>,

    /// Risk engine TOML
    #[serde(default = "default_risk_config")]
    pub risk_config: String,

    /// Starting balance of the paper account
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,

    /// Seed for barriers and paper settlements
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default)]
    pub session: SessionConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            base_stake: default_base_stake(),
            strategies_file: None,
            risk_config: default_risk_config(),
            initial_balance: default_initial_balance(),
            seed: None,
            session: SessionConfig::default(),
        }
    }
}

fn default_strategy() -> String {
    strategy_engine::EVEN_RECOVERY.to_string()
}

fn default_base_stake() -> Decimal {
    Decimal::ONE
}

fn default_risk_config() -> String {
    "config/risk.toml".to_string()
}

fn default_initial_balance() -> Decimal {
    dec!(1000)
}

/// Load settings from an optional TOML file with `SESSION__KEY` overrides.
///
/// `env` replaces the process environment when given.
pub fn load_settings(
    path: &str,
    env: Option<config::Map<String, String>>,
) -> anyhow::Result<Settings> {
    let settings = config::Config::builder()
        .add_source(config::File::new(path, config::FileFormat::Toml).required(false))
        .add_source(
            config::Environment::with_prefix("SESSION")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()?;

    Ok(settings.try_deserialize()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let settings = load_settings("does/not/exist.toml", Some(config::Map::new())).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_env_overrides() {
        let mut env = config::Map::new();
        env.insert("SESSION__STRATEGY".to_string(), "parity-switch".to_string());
        env.insert("SESSION__SEED".to_string(), "7".to_string());
        env.insert("SESSION__SESSION__MAX_TRADES".to_string(), "20".to_string());

        let settings = load_settings("does/not/exist.toml", Some(env)).unwrap();
        assert_eq!(settings.strategy, "parity-switch");
        assert_eq!(settings.seed, Some(7));
        assert_eq!(settings.session.max_trades, Some(20));
        assert!(settings.session.stop_on_safety_mode);
    }
}
