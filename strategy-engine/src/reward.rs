//! Payout percentage model
//!
//! Every contract type owns a list of stake brackets. Brackets are
//! half-open `[min_stake, max_stake)`, start at zero, and the last one is
//! unbounded. A table that violates this refuses to initialise.

use common::{percent_of, round_money, ContractType, Digit};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised by the reward table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewardError {
    #[error("no reward tiers for contract type {0}")]
    UnsupportedContractType(ContractType),

    #[error("stake {stake} is not covered by any {contract_type} reward tier")]
    StakeOutOfRange {
        contract_type: ContractType,
        stake: Decimal,
    },

    #[error("invalid reward tiers for {contract_type}: {reason}")]
    InvalidTiers {
        contract_type: ContractType,
        reason: String,
    },

    #[error("could not parse reward table: {0}")]
    Parse(String),
}

/// One stake bracket and the payout it earns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardTier {
    pub min_stake: Decimal,
    /// Exclusive upper bound; `None` means unbounded
    #[serde(default)]
    pub max_stake: Option<Decimal>,
    pub reward_percentage: Decimal,
}

impl RewardTier {
    pub fn new(min_stake: Decimal, max_stake: Option<Decimal>, reward_percentage: Decimal) -> Self {
        Self {
            min_stake,
            max_stake,
            reward_percentage,
        }
    }

    pub fn covers(&self, stake: Decimal) -> bool {
        stake >= self.min_stake && self.max_stake.map_or(true, |max| stake < max)
    }
}

/// Stake brackets shared by every standard tier list
const BRACKET_BOUNDS: [Decimal; 3] = [dec!(5), dec!(20), dec!(100)];

/// Payout uplift per bracket in the standard table
const BRACKET_STEP: Decimal = dec!(0.20);

/// Contract type → tiered payout percentages
#[derive(Debug, Clone, PartialEq)]
pub struct RewardTable {
    tiers: BTreeMap<ContractType, Vec<RewardTier>>,
}

impl RewardTable {
    /// The venue's published payout schedule.
    ///
    /// DIGITOVER_9 and DIGITUNDER_0 can never settle in the money and have
    /// no tiers.
    pub fn standard() -> Result<Self, RewardError> {
        let mut tiers = BTreeMap::new();

        tiers.insert(ContractType::Call, standard_ladder(dec!(94.50)));
        tiers.insert(ContractType::Put, standard_ladder(dec!(94.50)));
        tiers.insert(ContractType::DigitEven, standard_ladder(dec!(95.00)));
        tiers.insert(ContractType::DigitOdd, standard_ladder(dec!(95.00)));
        tiers.insert(ContractType::DigitDiff, standard_ladder(dec!(10.50)));

        // Indexed by the digit of the barrier.
        let over = [
            dec!(5.56),
            dec!(18.75),
            dec!(35.71),
            dec!(58.33),
            dec!(90.00),
            dec!(137.50),
            dec!(216.67),
            dec!(375.00),
            dec!(850.00),
        ];
        for (n, base) in over.iter().enumerate() {
            tiers.insert(ContractType::DigitOver(Some(digit(n)?)), standard_ladder(*base));
        }

        let under = [
            dec!(850.00),
            dec!(375.00),
            dec!(216.67),
            dec!(137.50),
            dec!(90.00),
            dec!(58.33),
            dec!(35.71),
            dec!(18.75),
            dec!(5.56),
        ];
        for (i, base) in under.iter().enumerate() {
            tiers.insert(
                ContractType::DigitUnder(Some(digit(i + 1)?)),
                standard_ladder(*base),
            );
        }

        Self::from_tiers(tiers)
    }

    /// Build a table from explicit tier lists, validating every list
    pub fn from_tiers(tiers: BTreeMap<ContractType, Vec<RewardTier>>) -> Result<Self, RewardError> {
        for (contract_type, list) in &tiers {
            validate_tiers(*contract_type, list)?;
        }
        Ok(Self { tiers })
    }

    /// Parse `{"DIGITEVEN": [{"min_stake": 0, "max_stake": null, "reward_percentage": 95}]}`
    pub fn from_json(json: &str) -> Result<Self, RewardError> {
        let tiers: BTreeMap<ContractType, Vec<RewardTier>> =
            serde_json::from_str(json).map_err(|e| RewardError::Parse(e.to_string()))?;
        Self::from_tiers(tiers)
    }

    /// Payout percentage for `stake` on `contract_type`
    pub fn percentage_for(
        &self,
        contract_type: ContractType,
        stake: Decimal,
    ) -> Result<Decimal, RewardError> {
        let tiers = self
            .tiers
            .get(&contract_type.resolved())
            .ok_or(RewardError::UnsupportedContractType(contract_type))?;

        tiers
            .iter()
            .find(|tier| tier.covers(stake))
            .map(|tier| tier.reward_percentage)
            .ok_or(RewardError::StakeOutOfRange {
                contract_type,
                stake,
            })
    }

    /// Profit a winning contract pays on `stake`, rounded to cents
    pub fn anticipated_profit(
        &self,
        contract_type: ContractType,
        stake: Decimal,
    ) -> Result<Decimal, RewardError> {
        let percentage = self.percentage_for(contract_type, stake)?;
        Ok(round_money(percent_of(stake, percentage)))
    }

    pub fn tiers_for(&self, contract_type: ContractType) -> Option<&[RewardTier]> {
        self.tiers.get(&contract_type.resolved()).map(Vec::as_slice)
    }

    pub fn supports(&self, contract_type: ContractType) -> bool {
        self.tiers.contains_key(&contract_type.resolved())
    }

    pub fn contract_types(&self) -> impl Iterator<Item = &ContractType> {
        self.tiers.keys()
    }
}

fn digit(n: usize) -> Result<Digit, RewardError> {
    u8::try_from(n)
        .ok()
        .and_then(|n| Digit::new(n).ok())
        .ok_or_else(|| RewardError::Parse(format!("digit {n} out of range")))
}

fn standard_ladder(base: Decimal) -> Vec<RewardTier> {
    let mut tiers = Vec::with_capacity(BRACKET_BOUNDS.len() + 1);
    let mut lower = Decimal::ZERO;
    let mut percentage = base;

    for upper in BRACKET_BOUNDS {
        tiers.push(RewardTier::new(lower, Some(upper), percentage));
        lower = upper;
        percentage += BRACKET_STEP;
    }
    tiers.push(RewardTier::new(lower, None, percentage));
    tiers
}

/// Tiers must partition `[0, ∞)`: sorted, contiguous, non-empty brackets
pub fn validate_tiers(
    contract_type: ContractType,
    tiers: &[RewardTier],
) -> Result<(), RewardError> {
    let invalid = |reason: String| RewardError::InvalidTiers {
        contract_type,
        reason,
    };

    let first = tiers.first().ok_or_else(|| invalid("tier list is empty".to_string()))?;
    if first.min_stake != Decimal::ZERO {
        return Err(invalid(format!("first tier starts at {} instead of 0", first.min_stake)));
    }

    for (i, tier) in tiers.iter().enumerate() {
        if tier.reward_percentage <= Decimal::ZERO {
            return Err(invalid(format!(
                "tier {} has non-positive reward {}",
                i, tier.reward_percentage
            )));
        }

        let is_last = i + 1 == tiers.len();
        match (tier.max_stake, is_last) {
            (None, true) => {}
            (None, false) => {
                return Err(invalid(format!("tier {} is unbounded but not last", i)));
            }
            (Some(max), true) => {
                return Err(invalid(format!("last tier is capped at {}", max)));
            }
            (Some(max), false) => {
                if max <= tier.min_stake {
                    return Err(invalid(format!(
                        "tier {} is empty: [{}, {})",
                        i, tier.min_stake, max
                    )));
                }
                let next = &tiers[i + 1];
                if next.min_stake > max {
                    return Err(invalid(format!("gap between {} and {}", max, next.min_stake)));
                }
                if next.min_stake < max {
                    return Err(invalid(format!("overlap between {} and {}", next.min_stake, max)));
                }
            }
        }
    }

    Ok(())
}
