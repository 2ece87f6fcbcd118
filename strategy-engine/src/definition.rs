//! Declarative strategy documents
//!
//! A strategy is a named list of step templates plus sequencing and risk
//! scalars. Documents are JSON with camelCase keys; unknown keys are
//! rejected rather than ignored.

use crate::barrier::barrier_matches;
use crate::StrategyError;
use common::{Barrier, Basis, ContractType, DurationUnit};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// One planned trade template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StrategyStep {
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub basis: Option<Basis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub contract_type: ContractType,
    /// Required; kept optional here so a missing symbol gets a precise error
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_duration_value: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract_duration_units: Option<DurationUnit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barrier: Option<Barrier>,
}

impl StrategyStep {
    pub fn new(contract_type: ContractType, symbol: &str, amount: Decimal) -> Self {
        Self {
            amount,
            basis: None,
            currency: None,
            contract_type,
            symbol: Some(symbol.to_string()),
            contract_duration_value: None,
            contract_duration_units: None,
            barrier: None,
        }
    }

    pub fn with_barrier(mut self, barrier: Barrier) -> Self {
        self.barrier = Some(barrier);
        self
    }

    pub fn with_duration(mut self, value: u32, units: DurationUnit) -> Self {
        self.contract_duration_value = Some(value);
        self.contract_duration_units = Some(units);
        self
    }

    /// Contract type used for payout lookup.
    ///
    /// A generic DIGITOVER/DIGITUNDER with an explicit digit barrier pays
    /// like its numbered variant.
    pub fn effective_contract_type(&self) -> ContractType {
        match (self.contract_type, self.barrier) {
            (ContractType::DigitOver(None), Some(Barrier::Digit(d))) => {
                ContractType::DigitOver(Some(d))
            }
            (ContractType::DigitUnder(None), Some(Barrier::Digit(d))) => {
                ContractType::DigitUnder(Some(d))
            }
            (contract_type, _) => contract_type,
        }
    }

    fn validate(&self, index: usize) -> Result<(), StrategyError> {
        let invalid = |reason: String| {
            StrategyError::InvalidStrategyDefinition(format!("step {}: {}", index, reason))
        };

        if self.amount <= Decimal::ZERO {
            return Err(invalid(format!("amount must be positive, got {}", self.amount)));
        }

        match self.symbol.as_deref().map(str::trim) {
            Some(symbol) if !symbol.is_empty() => {}
            _ => return Err(invalid("missing symbol".to_string())),
        }

        if let Some(currency) = &self.currency {
            if currency.trim().is_empty() {
                return Err(invalid("currency is blank".to_string()));
            }
        }

        if self.contract_duration_value == Some(0) {
            return Err(invalid("contract duration must be positive".to_string()));
        }

        if let Some(barrier) = self.barrier {
            if !barrier_matches(self.contract_type, barrier) {
                return Err(invalid(format!(
                    "barrier {} is not valid for {}",
                    barrier, self.contract_type
                )));
            }
        }

        Ok(())
    }
}

fn default_profit_percentage() -> Decimal {
    dec!(95)
}

fn default_loss_recovery_percentage() -> Decimal {
    dec!(100)
}

fn default_anticipated_profit_percentage() -> Decimal {
    dec!(95)
}

/// A named recovery strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StrategyConfig {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Aggressive strategies skip the per-step exposure clamp
    #[serde(default)]
    pub is_aggressive: bool,

    /// Number of steps in the compiled ladder (≥ number of templates)
    pub max_sequence: usize,

    pub max_consecutive_losses: u32,

    /// Multiplier on the base stake bounding any single computed stake
    pub max_risk_exposure: Decimal,

    /// Planning target: payout expected from a winning step
    #[serde(default = "default_profit_percentage")]
    pub profit_percentage: Decimal,

    /// Planning target: share of carried losses a recovery step should win back
    #[serde(default = "default_loss_recovery_percentage")]
    pub loss_recovery_percentage: Decimal,

    /// Planning target: profit margin anticipated on top of recovery
    #[serde(default = "default_anticipated_profit_percentage")]
    pub anticipated_profit_percentage: Decimal,

    pub strategy_steps: Vec<StrategyStep>,
}

impl StrategyConfig {
    /// Parse and validate a single strategy
    pub fn from_json(json: &str) -> Result<Self, StrategyError> {
        let config: StrategyConfig = serde_json::from_str(json)
            .map_err(|e| StrategyError::InvalidStrategyDefinition(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StrategyError> {
        let invalid = |reason: String| {
            StrategyError::InvalidStrategyDefinition(format!(
                "strategy `{}`: {}",
                self.name, reason
            ))
        };

        if self.name.trim().is_empty() {
            return Err(StrategyError::InvalidStrategyDefinition(
                "strategy name is blank".to_string(),
            ));
        }

        if self.strategy_steps.is_empty() {
            return Err(invalid("strategySteps is empty".to_string()));
        }

        for (index, step) in self.strategy_steps.iter().enumerate() {
            step.validate(index).map_err(|e| match e {
                StrategyError::InvalidStrategyDefinition(reason) => invalid(reason),
                other => other,
            })?;
        }

        if self.max_sequence < self.strategy_steps.len() {
            return Err(invalid(format!(
                "maxSequence {} is shorter than {} steps",
                self.max_sequence,
                self.strategy_steps.len()
            )));
        }

        if self.max_consecutive_losses == 0 {
            return Err(invalid("maxConsecutiveLosses must be at least 1".to_string()));
        }

        if self.max_risk_exposure < Decimal::ONE {
            return Err(invalid(format!(
                "maxRiskExposure must be at least 1, got {}",
                self.max_risk_exposure
            )));
        }

        for (field, value) in [
            ("profitPercentage", self.profit_percentage),
            ("lossRecoveryPercentage", self.loss_recovery_percentage),
            ("anticipatedProfitPercentage", self.anticipated_profit_percentage),
        ] {
            if value <= Decimal::ZERO {
                return Err(invalid(format!("{} must be positive, got {}", field, value)));
            }
        }

        Ok(())
    }

    /// Stake of the first template, used when no session stake is given
    pub fn base_stake(&self) -> Option<Decimal> {
        self.strategy_steps.first().map(|step| step.amount)
    }

    /// Template used for ladder position `i`; the last one repeats
    pub fn template_for(&self, i: usize) -> Option<&StrategyStep> {
        let last = self.strategy_steps.len().checked_sub(1)?;
        self.strategy_steps.get(i.min(last))
    }

    /// Largest single stake permitted for a non-aggressive ladder; `None` on overflow
    pub fn stake_cap(&self, base_stake: Decimal) -> Option<Decimal> {
        base_stake.checked_mul(self.max_risk_exposure)
    }
}

/// A set of named strategies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StrategyCatalog {
    strategies: Vec<StrategyConfig>,
}

impl StrategyCatalog {
    pub fn new(strategies: Vec<StrategyConfig>) -> Result<Self, StrategyError> {
        let mut catalog = Self::default();
        for strategy in strategies {
            catalog.insert(strategy)?;
        }
        Ok(catalog)
    }

    /// Parse either `{"strategies": [...]}` or a single strategy object
    pub fn from_json(json: &str) -> Result<Self, StrategyError> {
        let invalid =
            |e: serde_json::Error| StrategyError::InvalidStrategyDefinition(e.to_string());

        let mut value: serde_json::Value = serde_json::from_str(json).map_err(invalid)?;
        let strategies: Vec<StrategyConfig> = match value.get_mut("strategies") {
            Some(list) => serde_json::from_value(list.take()).map_err(invalid)?,
            None => vec![serde_json::from_value(value).map_err(invalid)?],
        };

        Self::new(strategies)
    }

    pub fn insert(&mut self, strategy: StrategyConfig) -> Result<(), StrategyError> {
        strategy.validate()?;
        if self.index_of(&strategy.name).is_some() {
            return Err(StrategyError::InvalidStrategyDefinition(format!(
                "duplicate strategy name `{}`",
                strategy.name
            )));
        }
        self.strategies.push(strategy);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&StrategyConfig, StrategyError> {
        self.strategies
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| StrategyError::UnknownStrategy(name.to_string()))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.strategies.iter().position(|s| s.name == name)
    }

    pub fn by_index(&self, index: usize) -> Option<&StrategyConfig> {
        self.strategies.get(index)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.strategies.iter().map(|s| s.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVEN_STRATEGY: &str = r#"{
        "name": "even-ladder",
        "maxSequence": 5,
        "maxConsecutiveLosses": 5,
        "maxRiskExposure": 40,
        "strategySteps": [
            {"amount": 1, "contractType": "DIGITEVEN", "symbol": "R_100", "barrier": "EVEN",
             "contractDurationValue": 1, "contractDurationUnits": "t"}
        ]
    }"#;

    fn expect_invalid(json: &str) -> String {
        match StrategyConfig::from_json(json) {
            Err(StrategyError::InvalidStrategyDefinition(reason)) => reason,
            other => panic!("expected InvalidStrategyDefinition, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_valid_strategy() {
        let config = StrategyConfig::from_json(EVEN_STRATEGY).unwrap();
        assert_eq!(config.name, "even-ladder");
        assert_eq!(config.base_stake(), Some(dec!(1)));
        assert_eq!(config.profit_percentage, dec!(95));
        assert!(!config.is_aggressive);
        assert_eq!(config.template_for(9).unwrap().contract_type, ContractType::DigitEven);
    }

    #[test]
    fn test_empty_steps_rejected() {
        let reason = expect_invalid(
            r#"{"name":"x","maxSequence":1,"maxConsecutiveLosses":1,"maxRiskExposure":2,"strategySteps":[]}"#,
        );
        assert!(reason.contains("empty"));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let reason = expect_invalid(&EVEN_STRATEGY.replace("\"amount\": 1", "\"amount\": 0"));
        assert!(reason.contains("amount"));
    }

    #[test]
    fn test_missing_symbol_rejected() {
        let reason = expect_invalid(&EVEN_STRATEGY.replace("\"symbol\": \"R_100\",", ""));
        assert!(reason.contains("symbol"));
    }

    #[test]
    fn test_unknown_contract_type_rejected() {
        let reason = expect_invalid(&EVEN_STRATEGY.replace("DIGITEVEN", "DIGITMATCH"));
        assert!(reason.contains("DIGITMATCH"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        expect_invalid(
            &EVEN_STRATEGY.replace("\"maxSequence\"", "\"martingaleFactor\": 2, \"maxSequence\""),
        );
    }

    #[test]
    fn test_mismatched_barrier_rejected() {
        let reason = expect_invalid(&EVEN_STRATEGY.replace("\"EVEN\"", "\"ODD\""));
        assert!(reason.contains("barrier"));
    }

    #[test]
    fn test_short_max_sequence_rejected() {
        let config = StrategyConfig {
            max_sequence: 0,
            ..StrategyConfig::from_json(EVEN_STRATEGY).unwrap()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_generic_over_with_digit_barrier_pays_like_numbered() {
        let step = StrategyStep::new(ContractType::DigitOver(None), "R_10", dec!(1))
            .with_barrier(Barrier::Digit(common::Digit::new(2).unwrap()));
        assert_eq!(step.effective_contract_type().to_string(), "DIGITOVER_2");
    }

    #[test]
    fn test_catalog_accepts_single_and_list_documents() {
        let single = StrategyCatalog::from_json(EVEN_STRATEGY).unwrap();
        assert_eq!(single.len(), 1);

        let list = format!(
            r#"{{"strategies": [{}, {}]}}"#,
            EVEN_STRATEGY,
            EVEN_STRATEGY.replace("even-ladder", "even-ladder-2")
        );
        let catalog = StrategyCatalog::from_json(&list).unwrap();
        assert_eq!(catalog.names().collect::<Vec<_>>(), vec!["even-ladder", "even-ladder-2"]);
        assert_eq!(catalog.index_of("even-ladder-2"), Some(1));
        assert!(matches!(catalog.get("missing"), Err(StrategyError::UnknownStrategy(_))));
    }

    #[test]
    fn test_catalog_rejects_duplicate_names() {
        let list = format!(r#"{{"strategies": [{}, {}]}}"#, EVEN_STRATEGY, EVEN_STRATEGY);
        assert!(StrategyCatalog::from_json(&list).is_err());
    }
}
