//! Circuit breaker checks over the session's loss ledger and account

use crate::config::{CircuitBreakerConfig, RiskLimits};
use crate::state::RiskManagerState;
use chrono::{DateTime, Duration, Utc};
use common::percent_of;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account figures the breaker validates the next stake against
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    /// Stake the caller is about to place
    pub next_stake: Decimal,
}

/// Outcome of the last breaker evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    pub triggered: bool,
    pub reasons: Vec<String>,
    pub safety_mode_until: Option<DateTime<Utc>>,
}

/// Risk violation types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RiskViolation {
    DailyLossLimitExceeded {
        daily_loss: Decimal,
        limit: Decimal,
    },
    MaxLossLimitExceeded {
        total_loss: Decimal,
        limit: Decimal,
    },
    ConsecutiveLossesExceeded {
        count: u32,
        limit: u32,
    },
    InsufficientBalance {
        balance: Decimal,
        required: Decimal,
    },
    StakeExceedsRiskPercentage {
        stake: Decimal,
        balance: Decimal,
        max_percentage: Decimal,
    },
    RapidLosses {
        triggers: u32,
        until: Option<DateTime<Utc>>,
    },
}

impl RiskViolation {
    /// Stable code recorded in [`CircuitBreakerState::reasons`]
    pub fn code(&self) -> &'static str {
        match self {
            RiskViolation::DailyLossLimitExceeded { .. } => "daily_loss_limit",
            RiskViolation::MaxLossLimitExceeded { .. } => "max_loss_limit",
            RiskViolation::ConsecutiveLossesExceeded { .. } => "consecutive_losses",
            RiskViolation::InsufficientBalance { .. } => "insufficient_balance",
            RiskViolation::StakeExceedsRiskPercentage { .. } => "max_risk_percentage",
            RiskViolation::RapidLosses { .. } => "rapid_losses",
        }
    }
}

impl std::fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskViolation::DailyLossLimitExceeded { daily_loss, limit } => {
                write!(f, "Daily loss ${:.2} reached limit ${:.2}", daily_loss, limit)
            }
            RiskViolation::MaxLossLimitExceeded { total_loss, limit } => {
                write!(f, "Total loss ${:.2} reached limit ${:.2}", total_loss, limit)
            }
            RiskViolation::ConsecutiveLossesExceeded { count, limit } => {
                write!(f, "{} consecutive losses reached limit {}", count, limit)
            }
            RiskViolation::InsufficientBalance { balance, required } => {
                write!(
                    f,
                    "Balance ${:.2} is below the required ${:.2}",
                    balance, required
                )
            }
            RiskViolation::StakeExceedsRiskPercentage {
                stake,
                balance,
                max_percentage,
            } => {
                write!(
                    f,
                    "Stake ${:.2} exceeds {:.2}% of balance ${:.2}",
                    stake, max_percentage, balance
                )
            }
            RiskViolation::RapidLosses { triggers, .. } => {
                write!(f, "Rapid losses detected (trigger #{})", triggers)
            }
        }
    }
}

impl std::error::Error for RiskViolation {}

/// Trips when session-level ceilings are breached and holds for a cooldown
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    limits: RiskLimits,
    state: CircuitBreakerState,
    trips: Vec<DateTime<Utc>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig, limits: RiskLimits) -> Self {
        Self {
            config,
            limits,
            state: CircuitBreakerState::default(),
            trips: Vec::new(),
        }
    }

    pub fn state(&self) -> &CircuitBreakerState {
        &self.state
    }

    pub fn cooldown(&self) -> Duration {
        Duration::minutes(self.config.cooldown_minutes)
    }

    /// Every ceiling the ledger or the account currently breaches
    pub fn evaluate(
        &self,
        risk: &RiskManagerState,
        account: &AccountSnapshot,
    ) -> Vec<RiskViolation> {
        let mut violations = Vec::new();
        if !self.config.enabled {
            return violations;
        }

        if risk.daily_loss_amount >= self.limits.daily_loss_limit {
            violations.push(RiskViolation::DailyLossLimitExceeded {
                daily_loss: risk.daily_loss_amount,
                limit: self.limits.daily_loss_limit,
            });
        }

        if risk.total_loss_amount >= self.limits.max_loss_limit {
            violations.push(RiskViolation::MaxLossLimitExceeded {
                total_loss: risk.total_loss_amount,
                limit: self.limits.max_loss_limit,
            });
        }

        if risk.consecutive_losses >= self.limits.max_consecutive_losses {
            violations.push(RiskViolation::ConsecutiveLossesExceeded {
                count: risk.consecutive_losses,
                limit: self.limits.max_consecutive_losses,
            });
        }

        let required = account.next_stake * self.limits.min_balance_multiplier;
        if account.balance < required {
            violations.push(RiskViolation::InsufficientBalance {
                balance: account.balance,
                required,
            });
        }

        if account.next_stake > percent_of(account.balance, self.limits.max_risk_percentage) {
            violations.push(RiskViolation::StakeExceedsRiskPercentage {
                stake: account.next_stake,
                balance: account.balance,
                max_percentage: self.limits.max_risk_percentage,
            });
        }

        violations
    }

    /// Trip the breaker for `violations`, holding until at least `until`
    pub fn trigger_at(
        &mut self,
        violations: &[RiskViolation],
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) {
        let until = match self.state.safety_mode_until {
            Some(current) if self.state.triggered && current > until => current,
            _ => until,
        };

        self.state = CircuitBreakerState {
            triggered: true,
            reasons: violations.iter().map(|v| v.code().to_string()).collect(),
            safety_mode_until: Some(until),
        };
        self.trips.push(now);

        let summary: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
        tracing::error!(
            reasons = ?self.state.reasons,
            violations = ?summary,
            until = %until,
            "Circuit breaker TRIGGERED - Trading halted"
        );
    }

    /// Check if circuit breaker is active; an expired trip is cleared
    pub fn is_active_at(&mut self, now: DateTime<Utc>) -> bool {
        if !self.state.triggered {
            return false;
        }

        match self.state.safety_mode_until {
            Some(until) if now >= until => {
                tracing::info!("Circuit breaker cooldown elapsed - Trading resumed");
                self.state = CircuitBreakerState::default();
                false
            }
            _ => true,
        }
    }

    /// Reset the circuit breaker
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.state = CircuitBreakerState::default();

        // Clear old trips (older than 24 hours)
        let cutoff = now - Duration::hours(24);
        self.trips.retain(|t| *t > cutoff);

        tracing::info!("Circuit breaker reset - Trading resumed");
    }

    /// Number of trips within the last 24 hours
    pub fn trips_today(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::hours(24);
        self.trips.iter().filter(|t| **t > cutoff).count()
    }
}
