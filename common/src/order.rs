//! Concrete trade orders handed to the execution venue

use crate::contract::{Barrier, Basis, ContractType, DurationUnit};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Session-level fallbacks used when a strategy step leaves a field open.
///
/// Keys are snake_case like the rest of the risk TOML; the venue's
/// camelCase names are accepted on input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradeDefaults {
    pub symbol: String,
    pub currency: String,
    pub basis: Basis,
    #[serde(alias = "contractType")]
    pub contract_type: ContractType,
    #[serde(alias = "contractDurationValue")]
    pub contract_duration_value: u32,
    #[serde(alias = "contractDurationUnits")]
    pub contract_duration_units: DurationUnit,
}

impl Default for TradeDefaults {
    fn default() -> Self {
        Self {
            symbol: "R_100".to_string(),
            currency: "USD".to_string(),
            basis: Basis::Stake,
            contract_type: ContractType::DigitEven,
            contract_duration_value: 1,
            contract_duration_units: DurationUnit::Ticks,
        }
    }
}

/// How the engine arrived at a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryKind {
    /// First step of the ladder, nothing to recover
    #[default]
    Base,
    /// A compounding recovery step from the compiled table
    Compounding,
    /// Explicit last-resort recovery after the ladder ran out
    LastResort,
    /// Base-stake trade used because the step table was unavailable
    Fallback,
    /// Protective minimal-risk trade issued during safety mode
    Safety,
}

/// Annotations attached to an order for the caller's benefit
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeMetadata {
    pub safety_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default)]
    pub recovery: RecoveryKind,
}

/// Fully concrete order ready for submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTradeParams {
    pub basis: Basis,
    pub symbol: String,
    pub amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub barrier: Option<Barrier>,
    pub currency: String,
    pub contract_type: ContractType,
    pub contract_duration_value: u32,
    pub contract_duration_units: DurationUnit,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TradeMetadata>,
}

impl NextTradeParams {
    pub fn with_metadata(mut self, metadata: TradeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_safety_mode(&self) -> bool {
        self.metadata.as_ref().map_or(false, |m| m.safety_mode)
    }

    /// Stable reason code attached to a safety or fallback order
    pub fn reason(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.reason.as_deref())
    }

    pub fn recovery(&self) -> RecoveryKind {
        self.metadata.as_ref().map(|m| m.recovery).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_params_serialize_with_venue_field_names() {
        let params = NextTradeParams {
            basis: Basis::Stake,
            symbol: "R_100".to_string(),
            amount: dec!(2.90),
            barrier: Some(Barrier::Even),
            currency: "USD".to_string(),
            contract_type: ContractType::DigitEven,
            contract_duration_value: 1,
            contract_duration_units: DurationUnit::Ticks,
            metadata: None,
        };

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["contractType"], "DIGITEVEN");
        assert_eq!(json["contractDurationUnits"], "t");
        assert_eq!(json["barrier"], "EVEN");
        assert_eq!(json["basis"], "stake");
        assert!(json.get("metadata").is_none());
        assert!(!params.is_safety_mode());
    }

    #[test]
    fn test_trade_defaults_accept_both_key_styles() {
        let snake: TradeDefaults = serde_json::from_str(
            r#"{"contract_type":"DIGITODD","contract_duration_units":"s"}"#,
        )
        .unwrap();
        let camel: TradeDefaults =
            serde_json::from_str(r#"{"contractType":"DIGITODD","contractDurationUnits":"s"}"#)
                .unwrap();

        assert_eq!(snake, camel);
        assert_eq!(snake.contract_type, ContractType::DigitOdd);
        assert_eq!(snake.contract_duration_units, DurationUnit::Seconds);
        assert_eq!(snake.symbol, "R_100");

        let json = serde_json::to_value(TradeDefaults::default()).unwrap();
        assert_eq!(json["contract_type"], "DIGITEVEN");
    }

    #[test]
    fn test_safety_metadata_accessors() {
        let params = NextTradeParams {
            basis: Basis::Stake,
            symbol: "R_50".to_string(),
            amount: dec!(0.35),
            barrier: None,
            currency: "USD".to_string(),
            contract_type: ContractType::Call,
            contract_duration_value: 5,
            contract_duration_units: DurationUnit::Ticks,
            metadata: None,
        }
        .with_metadata(TradeMetadata {
            safety_mode: true,
            reason: Some("balance_floor".to_string()),
            recovery: RecoveryKind::Safety,
            ..Default::default()
        });

        assert!(params.is_safety_mode());
        assert_eq!(params.reason(), Some("balance_floor"));
        assert_eq!(params.recovery(), RecoveryKind::Safety);
    }
}
