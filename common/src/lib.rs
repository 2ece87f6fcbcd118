//! Shared types for the digit-contract trading engine
//!
//! Contract vocabulary, settlement reports from the venue and the
//! concrete orders handed back to it.

mod contract;
mod money;
mod order;
mod trade;

pub use contract::{
    Barrier, Basis, ContractError, ContractType, Digit, DurationUnit, MarketFamily,
    DEFAULT_OVER_UNDER_DIGIT,
};
pub use money::{checked_percent_of, percent_of, round_money};
pub use order::{NextTradeParams, RecoveryKind, TradeDefaults, TradeMetadata};
pub use trade::{OutcomeError, TradeOutcome, TradeReport, MAX_REPORT_AMOUNT};

pub use rust_decimal::Decimal;
pub use uuid::Uuid;
