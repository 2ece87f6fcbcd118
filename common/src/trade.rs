//! Settled-trade records flowing back from the execution venue

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Largest stake, profit or balance accepted from the venue
pub const MAX_REPORT_AMOUNT: Decimal = dec!(1000000000000);

/// Problems found while validating an upstream trade report
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutcomeError {
    #[error("trade report is missing `{0}`")]
    MissingField(&'static str),

    #[error("trade report field `{field}` has invalid value {value}")]
    InvalidAmount { field: &'static str, value: Decimal },
}

/// Settlement report as received from the venue.
///
/// Every field is optional because upstream payloads are not trusted;
/// call [`TradeReport::validate`] to obtain a [`TradeOutcome`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeReport {
    pub contract_id: Option<String>,
    pub won: Option<bool>,
    pub stake: Option<Decimal>,
    /// Realized profit; negative (or absent) for a loss
    pub profit: Option<Decimal>,
    /// Account balance after settlement
    pub balance: Option<Decimal>,
    pub timestamp: Option<DateTime<Utc>>,
}

impl TradeReport {
    /// Report for a winning contract
    pub fn win(
        contract_id: impl Into<String>,
        stake: Decimal,
        profit: Decimal,
        balance: Decimal,
    ) -> Self {
        Self {
            contract_id: Some(contract_id.into()),
            won: Some(true),
            stake: Some(stake),
            profit: Some(profit),
            balance: Some(balance),
            timestamp: None,
        }
    }

    /// Report for a losing contract; the whole stake is lost
    pub fn loss(contract_id: impl Into<String>, stake: Decimal, balance: Decimal) -> Self {
        Self {
            contract_id: Some(contract_id.into()),
            won: Some(false),
            stake: Some(stake),
            profit: Some(-stake),
            balance: Some(balance),
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Check required fields and produce a typed outcome.
    ///
    /// `received_at` stamps reports that arrive without a timestamp.
    pub fn validate(&self, received_at: DateTime<Utc>) -> Result<TradeOutcome, OutcomeError> {
        let contract_id = self
            .contract_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(OutcomeError::MissingField("contract_id"))?
            .to_string();

        let won = self.won.ok_or(OutcomeError::MissingField("won"))?;

        let stake = self.stake.ok_or(OutcomeError::MissingField("stake"))?;
        if stake <= Decimal::ZERO || stake > MAX_REPORT_AMOUNT {
            return Err(OutcomeError::InvalidAmount { field: "stake", value: stake });
        }

        let balance = self.balance.ok_or(OutcomeError::MissingField("balance"))?;
        if balance < Decimal::ZERO || balance > MAX_REPORT_AMOUNT {
            return Err(OutcomeError::InvalidAmount { field: "balance", value: balance });
        }

        let profit = if won {
            let profit = self.profit.ok_or(OutcomeError::MissingField("profit"))?;
            if profit < Decimal::ZERO || profit > MAX_REPORT_AMOUNT {
                return Err(OutcomeError::InvalidAmount { field: "profit", value: profit });
            }
            profit
        } else {
            -stake
        };

        Ok(TradeOutcome {
            contract_id,
            won,
            stake,
            profit,
            balance,
            timestamp: self.timestamp.unwrap_or(received_at),
        })
    }
}

/// Validated settlement of one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub contract_id: String,
    pub won: bool,
    pub stake: Decimal,
    pub profit: Decimal,
    pub balance: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl TradeOutcome {
    /// Amount charged against the recovery ledger when this trade lost
    pub fn loss_amount(&self) -> Decimal {
        if self.won {
            Decimal::ZERO
        } else {
            self.stake
        }
    }
}
