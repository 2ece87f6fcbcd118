//! Per-session counters

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where the engine sits in its recovery cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecoveryPhase {
    Normal,
    Recovering,
    SafetyMode,
}

/// Canonical mutable state of one risk manager
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskManagerState {
    pub consecutive_losses: u32,
    /// Outstanding loss still to be recovered, never negative
    pub total_loss_amount: Decimal,
    pub daily_loss_amount: Decimal,
    pub winning_trades: u64,
    pub losing_trades: u64,
    pub total_trades: u64,
    pub recovery_attempts: u32,
    pub current_strategy_index: usize,
    pub current_recovery_step: usize,
    /// UTC day `daily_loss_amount` belongs to
    pub trading_day: Option<NaiveDate>,
    pub last_balance: Option<Decimal>,
}

impl RiskManagerState {
    /// Apply a win; returns the amount of outstanding loss it recovered
    pub fn record_win(&mut self, profit: Decimal) -> Decimal {
        self.consecutive_losses = 0;
        self.winning_trades += 1;
        self.recovery_attempts = 0;

        let recovered = profit.max(Decimal::ZERO).min(self.total_loss_amount);
        self.total_loss_amount -= recovered;

        if self.total_loss_amount.is_zero() {
            self.current_recovery_step = 0;
        }
        recovered
    }

    pub fn record_loss(&mut self, amount: Decimal) {
        self.consecutive_losses += 1;
        self.losing_trades += 1;
        self.recovery_attempts += 1;

        let amount = amount.max(Decimal::ZERO);
        self.total_loss_amount += amount;
        self.daily_loss_amount += amount;
    }

    /// Start a new daily ledger when `day` differs from the tracked one.
    ///
    /// Returns true when a rollover happened.
    pub fn roll_day(&mut self, day: NaiveDate) -> bool {
        match self.trading_day {
            Some(current) if current == day => false,
            Some(_) => {
                self.trading_day = Some(day);
                self.daily_loss_amount = Decimal::ZERO;
                true
            }
            None => {
                self.trading_day = Some(day);
                false
            }
        }
    }

    /// Forget the recovery cycle; trade tallies are kept
    pub fn clear_recovery(&mut self) {
        self.consecutive_losses = 0;
        self.recovery_attempts = 0;
        self.total_loss_amount = Decimal::ZERO;
        self.current_recovery_step = 0;
    }

    /// Back to a freshly started session on the same strategy
    pub fn reset(&mut self) {
        let strategy = self.current_strategy_index;
        *self = Self {
            current_strategy_index: strategy,
            ..Self::default()
        };
    }

    pub fn is_recovering(&self) -> bool {
        self.consecutive_losses > 0 || self.total_loss_amount > Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_loss_then_win_recovers() {
        let mut state = RiskManagerState::default();
        state.record_loss(dec!(1));
        state.record_loss(dec!(2.90));
        state.current_recovery_step = 2;

        assert_eq!(state.consecutive_losses, 2);
        assert_eq!(state.total_loss_amount, dec!(3.90));
        assert_eq!(state.daily_loss_amount, dec!(3.90));
        assert!(state.is_recovering());

        let recovered = state.record_win(dec!(8.15));
        assert_eq!(recovered, dec!(3.90));
        assert_eq!(state.total_loss_amount, Decimal::ZERO);
        assert_eq!(state.consecutive_losses, 0);
        assert_eq!(state.recovery_attempts, 0);
        assert_eq!(state.current_recovery_step, 0);
        assert!(!state.is_recovering());
    }

    #[test]
    fn test_partial_recovery_keeps_step() {
        let mut state = RiskManagerState::default();
        state.record_loss(dec!(10));
        state.current_recovery_step = 1;

        state.record_win(dec!(4));
        assert_eq!(state.total_loss_amount, dec!(6));
        assert_eq!(state.current_recovery_step, 1);
        assert_eq!(state.daily_loss_amount, dec!(10));
    }

    #[test]
    fn test_roll_day_resets_daily_loss_only() {
        let mut state = RiskManagerState::default();
        let monday = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let tuesday = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();

        assert!(!state.roll_day(monday));
        state.record_loss(dec!(5));
        assert!(!state.roll_day(monday));
        assert!(state.roll_day(tuesday));

        assert_eq!(state.daily_loss_amount, Decimal::ZERO);
        assert_eq!(state.total_loss_amount, dec!(5));
    }

    #[test]
    fn test_reset_keeps_strategy() {
        let mut state = RiskManagerState {
            current_strategy_index: 2,
            total_trades: 9,
            ..Default::default()
        };
        state.record_loss(dec!(3));
        state.reset();

        assert_eq!(state.current_strategy_index, 2);
        assert_eq!(state.total_trades, 0);
        assert_eq!(state.total_loss_amount, Decimal::ZERO);
    }
}
