//! Plain-language notifications for whoever is watching the session

use chrono::{DateTime, Utc};
use common::{ContractType, Decimal, NextTradeParams};
use risk_manager::SafetyReason;
use serde::Serialize;

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StopReason {
    Requested,
    MaxTrades,
    TakeProfit,
    SafetyMode { reason: String },
    CircuitBreaker { reasons: Vec<String> },
    ExecutorFailed { error: String },
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Requested => write!(f, "stopped on request"),
            StopReason::MaxTrades => write!(f, "trade limit reached"),
            StopReason::TakeProfit => write!(f, "profit target reached"),
            StopReason::SafetyMode { reason } => {
                let text = SafetyReason::from_code(reason)
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| reason.clone());
                write!(f, "safety mode: {}", text)
            }
            StopReason::CircuitBreaker { reasons } => {
                write!(f, "circuit breaker: {}", reasons.join(", "))
            }
            StopReason::ExecutorFailed { error } => write!(f, "execution failed: {}", error),
        }
    }
}

/// Event surfaced to the user
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    SessionStarted {
        strategy: String,
        base_stake: Decimal,
    },
    TradePlaced {
        contract_type: ContractType,
        amount: Decimal,
        safety_mode: bool,
    },
    TradeSettled {
        won: bool,
        profit: Decimal,
        balance: Decimal,
    },
    SafetyModeEntered {
        reason: String,
        until: Option<DateTime<Utc>>,
    },
    CircuitBreakerTripped {
        reasons: Vec<String>,
    },
    SessionStopped {
        reason: StopReason,
        net_profit: Decimal,
    },
}

impl Notification {
    pub fn trade_placed(params: &NextTradeParams) -> Self {
        Notification::TradePlaced {
            contract_type: params.contract_type,
            amount: params.amount,
            safety_mode: params.is_safety_mode(),
        }
    }

    /// Message text; market names use display labels
    pub fn text(&self) -> String {
        match self {
            Notification::SessionStarted { strategy, base_stake } => {
                format!("▶️ Trading started with {} at ${:.2}", strategy, base_stake)
            }
            Notification::TradePlaced {
                contract_type,
                amount,
                safety_mode,
            } => {
                let prefix = if *safety_mode { "🛡️ Safety trade" } else { "Placed" };
                format!(
                    "{} {} {} for ${:.2}",
                    prefix,
                    contract_type.family().label(),
                    contract_type,
                    amount
                )
            }
            Notification::TradeSettled { won, profit, balance } => {
                if *won {
                    format!("✅ Won ${:.2}, balance ${:.2}", profit, balance)
                } else {
                    format!("❌ Lost ${:.2}, balance ${:.2}", profit.abs(), balance)
                }
            }
            Notification::SafetyModeEntered { reason, until } => {
                let text = SafetyReason::from_code(reason)
                    .map(|r| r.to_string())
                    .unwrap_or_else(|| reason.clone());
                match until {
                    Some(until) => format!(
                        "⚠️ Safety mode on: {}. Reduced stakes until {} UTC",
                        text,
                        until.format("%H:%M")
                    ),
                    None => format!("⚠️ Safety mode on: {}", text),
                }
            }
            Notification::CircuitBreakerTripped { reasons } => {
                format!("🛑 Trading halted by circuit breaker ({})", reasons.join(", "))
            }
            Notification::SessionStopped { reason, net_profit } => {
                format!("⏹️ Trading {} - net result ${:.2}", reason, net_profit)
            }
        }
    }
}
