//! Contract vocabulary shared by the strategy and risk layers

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Digit used by DIGITOVER/DIGITUNDER contracts that carry no explicit digit.
pub const DEFAULT_OVER_UNDER_DIGIT: u8 = 5;

/// Errors raised while parsing contract vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContractError {
    #[error("unrecognized contract type `{0}`")]
    UnknownContractType(String),

    #[error("digit {0} is outside 0-9")]
    InvalidDigit(u64),

    #[error("unrecognized barrier `{0}`")]
    UnknownBarrier(String),
}

/// A single last-digit value (0-9)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digit(u8);

impl Digit {
    pub fn new(value: u8) -> Result<Self, ContractError> {
        if value > 9 {
            return Err(ContractError::InvalidDigit(value as u64));
        }
        Ok(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub(crate) fn default_over_under() -> Self {
        Self(DEFAULT_OVER_UNDER_DIGIT)
    }
}

impl fmt::Display for Digit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Closed set of contract types the venue accepts.
///
/// The string codes (`CALL`, `DIGITOVER_3`, ...) are the stable wire
/// representation; display labels live on [`MarketFamily`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ContractType {
    Call,
    Put,
    DigitDiff,
    DigitEven,
    DigitOdd,
    /// DIGITOVER, or DIGITOVER_n when a digit is present
    DigitOver(Option<Digit>),
    /// DIGITUNDER, or DIGITUNDER_n when a digit is present
    DigitUnder(Option<Digit>),
}

impl ContractType {
    /// Every contract type the venue knows, including all numbered variants
    pub fn all() -> Vec<ContractType> {
        let mut types = vec![
            ContractType::Call,
            ContractType::Put,
            ContractType::DigitDiff,
            ContractType::DigitEven,
            ContractType::DigitOdd,
            ContractType::DigitOver(None),
            ContractType::DigitUnder(None),
        ];
        for n in 0..=9u8 {
            types.push(ContractType::DigitOver(Some(Digit(n))));
        }
        for n in 0..=9u8 {
            types.push(ContractType::DigitUnder(Some(Digit(n))));
        }
        types
    }

    /// Explicit digit carried by a numbered over/under contract
    pub fn digit(&self) -> Option<Digit> {
        match self {
            ContractType::DigitOver(d) | ContractType::DigitUnder(d) => *d,
            _ => None,
        }
    }

    /// Resolve generic DIGITOVER/DIGITUNDER to their default-digit variant
    pub fn resolved(self) -> Self {
        match self {
            ContractType::DigitOver(None) => {
                ContractType::DigitOver(Some(Digit::default_over_under()))
            }
            ContractType::DigitUnder(None) => {
                ContractType::DigitUnder(Some(Digit::default_over_under()))
            }
            other => other,
        }
    }

    pub fn is_digit_contract(&self) -> bool {
        !matches!(self, ContractType::Call | ContractType::Put)
    }

    pub fn family(&self) -> MarketFamily {
        match self {
            ContractType::Call | ContractType::Put => MarketFamily::RiseFall,
            ContractType::DigitEven | ContractType::DigitOdd => MarketFamily::EvenOdd,
            ContractType::DigitOver(_) | ContractType::DigitUnder(_) => MarketFamily::OverUnder,
            ContractType::DigitDiff => MarketFamily::Differs,
        }
    }
}

impl fmt::Display for ContractType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractType::Call => write!(f, "CALL"),
            ContractType::Put => write!(f, "PUT"),
            ContractType::DigitDiff => write!(f, "DIGITDIFF"),
            ContractType::DigitEven => write!(f, "DIGITEVEN"),
            ContractType::DigitOdd => write!(f, "DIGITODD"),
            ContractType::DigitOver(None) => write!(f, "DIGITOVER"),
            ContractType::DigitOver(Some(d)) => write!(f, "DIGITOVER_{}", d),
            ContractType::DigitUnder(None) => write!(f, "DIGITUNDER"),
            ContractType::DigitUnder(Some(d)) => write!(f, "DIGITUNDER_{}", d),
        }
    }
}

impl FromStr for ContractType {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        let unknown = || ContractError::UnknownContractType(s.to_string());

        match code.as_str() {
            "CALL" => return Ok(ContractType::Call),
            "PUT" => return Ok(ContractType::Put),
            "DIGITDIFF" => return Ok(ContractType::DigitDiff),
            "DIGITEVEN" => return Ok(ContractType::DigitEven),
            "DIGITODD" => return Ok(ContractType::DigitOdd),
            "DIGITOVER" => return Ok(ContractType::DigitOver(None)),
            "DIGITUNDER" => return Ok(ContractType::DigitUnder(None)),
            _ => {}
        }

        let (prefix, suffix) = code.split_once('_').ok_or_else(unknown)?;
        let digit = match suffix.parse::<u8>() {
            Ok(n) if suffix.len() == 1 => Digit::new(n)?,
            _ => return Err(unknown()),
        };

        match prefix {
            "DIGITOVER" => Ok(ContractType::DigitOver(Some(digit))),
            "DIGITUNDER" => Ok(ContractType::DigitUnder(Some(digit))),
            _ => Err(unknown()),
        }
    }
}

impl TryFrom<String> for ContractType {
    type Error = ContractError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl Serialize for ContractType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContractType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Grouping of contract types as presented to a user.
///
/// `code()` is stable and safe to match on; `label()` is display-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarketFamily {
    EvenOdd,
    OverUnder,
    RiseFall,
    Differs,
}

impl MarketFamily {
    pub fn code(&self) -> &'static str {
        match self {
            MarketFamily::EvenOdd => "even_odd",
            MarketFamily::OverUnder => "over_under",
            MarketFamily::RiseFall => "rise_fall",
            MarketFamily::Differs => "differs",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MarketFamily::EvenOdd => "🎲 Even/Odd",
            MarketFamily::OverUnder => "🔢 Over/Under",
            MarketFamily::RiseFall => "📈 Rise/Fall",
            MarketFamily::Differs => "🎯 Matches/Differs",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "even_odd" => Some(MarketFamily::EvenOdd),
            "over_under" => Some(MarketFamily::OverUnder),
            "rise_fall" => Some(MarketFamily::RiseFall),
            "differs" => Some(MarketFamily::Differs),
            _ => None,
        }
    }
}

/// Contract barrier as sent to the venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Barrier {
    Even,
    Odd,
    Digit(Digit),
}

impl fmt::Display for Barrier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Barrier::Even => write!(f, "EVEN"),
            Barrier::Odd => write!(f, "ODD"),
            Barrier::Digit(d) => write!(f, "{}", d),
        }
    }
}

impl FromStr for Barrier {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        match token.to_ascii_uppercase().as_str() {
            "EVEN" => Ok(Barrier::Even),
            "ODD" => Ok(Barrier::Odd),
            _ => match token.parse::<u8>() {
                Ok(n) => Ok(Barrier::Digit(Digit::new(n)?)),
                Err(_) => Err(ContractError::UnknownBarrier(s.to_string())),
            },
        }
    }
}

impl Serialize for Barrier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Barrier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Strategy documents write digit barriers both as "3" and 3
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawBarrier {
            Text(String),
            Number(u64),
        }

        match RawBarrier::deserialize(deserializer)? {
            RawBarrier::Text(text) => text.parse().map_err(serde::de::Error::custom),
            RawBarrier::Number(n) => {
                let digit = u8::try_from(n)
                    .map_err(|_| ContractError::InvalidDigit(n))
                    .and_then(Digit::new)
                    .map_err(serde::de::Error::custom)?;
                Ok(Barrier::Digit(digit))
            }
        }
    }
}

/// Whether `amount` is the stake paid or the payout requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Basis {
    #[default]
    Stake,
    Payout,
}

/// Contract duration unit, using the venue's single-letter codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DurationUnit {
    #[default]
    #[serde(rename = "t")]
    Ticks,
    #[serde(rename = "s")]
    Seconds,
    #[serde(rename = "m")]
    Minutes,
    #[serde(rename = "h")]
    Hours,
    #[serde(rename = "d")]
    Days,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_codes_round_trip_through_display() {
        for contract_type in ContractType::all() {
            let code = contract_type.to_string();
            assert_eq!(code.parse::<ContractType>().unwrap(), contract_type);
        }
    }

    #[test]
    fn test_numbered_variants_parse() {
        assert_eq!(
            "DIGITOVER_3".parse::<ContractType>().unwrap(),
            ContractType::DigitOver(Some(Digit::new(3).unwrap()))
        );
        assert_eq!(
            "digitunder_7".parse::<ContractType>().unwrap(),
            ContractType::DigitUnder(Some(Digit::new(7).unwrap()))
        );
    }

    #[test]
    fn test_unknown_contract_types_rejected() {
        for bad in ["", "DIGITMATCH", "DIGITOVER_", "DIGITOVER_10", "DIGITEVEN_2", "CALL_1"] {
            assert!(bad.parse::<ContractType>().is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_generic_over_under_resolves_to_default_digit() {
        let resolved = ContractType::DigitOver(None).resolved();
        assert_eq!(resolved.digit().unwrap().value(), DEFAULT_OVER_UNDER_DIGIT);
        assert_eq!(ContractType::Call.resolved(), ContractType::Call);
    }

    #[test]
    fn test_family_codes_are_stable() {
        assert_eq!(ContractType::DigitOdd.family().code(), "even_odd");
        assert_eq!(MarketFamily::from_code("differs"), Some(MarketFamily::Differs));
        assert!(MarketFamily::Differs.label().contains("Differs"));
    }

    #[test]
    fn test_barrier_deserializes_from_text_and_number() {
        let text: Barrier = serde_json::from_str("\"ODD\"").unwrap();
        assert_eq!(text, Barrier::Odd);

        let number: Barrier = serde_json::from_str("4").unwrap();
        assert_eq!(number, Barrier::Digit(Digit::new(4).unwrap()));

        assert!(serde_json::from_str::<Barrier>("12").is_err());
    }

    #[test]
    fn test_contract_type_serde_uses_codes() {
        let json =
            serde_json::to_string(&ContractType::DigitUnder(Some(Digit::new(2).unwrap()))).unwrap();
        assert_eq!(json, "\"DIGITUNDER_2\"");
        assert!(serde_json::from_str::<ContractType>("\"NOPE\"").is_err());
    }
}
