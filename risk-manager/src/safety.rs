//! Safety mode status shared by every protective mechanism

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why safety mode was entered; `code()` is the stable audit string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyReason {
    MaxRecoveryAttempts,
    ConsecutiveLosses,
    BalanceFloor,
    RiskExposure,
    CircuitBreaker,
    RapidLosses,
    MalformedOutcome,
}

impl SafetyReason {
    pub fn code(&self) -> &'static str {
        match self {
            SafetyReason::MaxRecoveryAttempts => "max_recovery_attempts",
            SafetyReason::ConsecutiveLosses => "consecutive_losses",
            SafetyReason::BalanceFloor => "balance_floor",
            SafetyReason::RiskExposure => "risk_exposure",
            SafetyReason::CircuitBreaker => "circuit_breaker",
            SafetyReason::RapidLosses => "rapid_losses",
            SafetyReason::MalformedOutcome => "malformed_outcome",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        [
            SafetyReason::MaxRecoveryAttempts,
            SafetyReason::ConsecutiveLosses,
            SafetyReason::BalanceFloor,
            SafetyReason::RiskExposure,
            SafetyReason::CircuitBreaker,
            SafetyReason::RapidLosses,
            SafetyReason::MalformedOutcome,
        ]
        .into_iter()
        .find(|reason| reason.code() == code)
    }
}

impl std::fmt::Display for SafetyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SafetyReason::MaxRecoveryAttempts => "maximum recovery attempts reached",
            SafetyReason::ConsecutiveLosses => "too many consecutive losses",
            SafetyReason::BalanceFloor => "account balance below the safety floor",
            SafetyReason::RiskExposure => "accumulated loss exceeds the strategy's risk exposure",
            SafetyReason::CircuitBreaker => "circuit breaker tripped",
            SafetyReason::RapidLosses => "too many losses in a short time",
            SafetyReason::MalformedOutcome => "trade result could not be validated",
        };
        f.write_str(text)
    }
}

/// Mechanism that put the engine into safety mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetySource {
    RiskManager,
    CircuitBreaker,
    RapidLoss,
}

/// Single view of whether protective mode is on, until when and why
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SafetyStatus {
    pub active: bool,
    pub until: Option<DateTime<Utc>>,
    pub reason: Option<SafetyReason>,
    pub source: Option<SafetySource>,
}

impl SafetyStatus {
    /// Status in force until `until`
    pub fn engaged(reason: SafetyReason, source: SafetySource, until: DateTime<Utc>) -> Self {
        Self {
            active: true,
            until: Some(until),
            reason: Some(reason),
            source: Some(source),
        }
    }

    /// Active and not yet expired at `now`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.until.map_or(true, |until| now < until)
    }

    /// True when the status was active but its deadline has passed
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.active && self.until.map_or(false, |until| now >= until)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_reason_codes_round_trip() {
        for reason in [
            SafetyReason::MaxRecoveryAttempts,
            SafetyReason::BalanceFloor,
            SafetyReason::RapidLosses,
        ] {
            assert_eq!(SafetyReason::from_code(reason.code()), Some(reason));
        }
        assert_eq!(SafetyReason::from_code("🔥"), None);
        assert_eq!(
            serde_json::to_value(SafetyReason::MaxRecoveryAttempts).unwrap(),
            "max_recovery_attempts"
        );
    }

    #[test]
    fn test_status_expiry() {
        let now = Utc::now();
        let status = SafetyStatus::engaged(
            SafetyReason::BalanceFloor,
            SafetySource::RiskManager,
            now + Duration::minutes(15),
        );

        assert!(status.is_active_at(now));
        assert!(!status.is_expired_at(now));
        assert!(!status.is_active_at(now + Duration::minutes(15)));
        assert!(status.is_expired_at(now + Duration::minutes(16)));
        assert!(!SafetyStatus::default().is_active_at(now));
    }
}
