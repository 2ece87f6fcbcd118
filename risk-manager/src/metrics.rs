//! Session performance figures

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Rolling performance of one trading session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub trades: u64,
    pub wins: u64,
    pub losses: u64,
    pub net_profit: Decimal,
    pub largest_loss_streak: u32,
    pub safety_entries: u32,
    pub malformed_outcomes: u32,
    drawdown: DrawdownCalculator,
    current_streak: u32,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_trade(&mut self, won: bool, profit: Decimal, balance: Decimal) {
        self.trades += 1;
        self.net_profit += profit;

        if won {
            self.wins += 1;
            self.current_streak = 0;
        } else {
            self.losses += 1;
            self.current_streak += 1;
            self.largest_loss_streak = self.largest_loss_streak.max(self.current_streak);
        }

        self.drawdown.update(balance);
    }

    pub fn record_safety_entry(&mut self) {
        self.safety_entries += 1;
    }

    pub fn record_malformed(&mut self) {
        self.malformed_outcomes += 1;
    }

    /// Percentage of trades won, `None` before the first trade
    pub fn win_rate(&self) -> Option<Decimal> {
        if self.trades == 0 {
            return None;
        }
        Some(Decimal::from(self.wins) * Decimal::ONE_HUNDRED / Decimal::from(self.trades))
    }

    pub fn peak_balance(&self) -> Decimal {
        self.drawdown.peak()
    }

    /// Largest peak-to-trough fall in balance, as a fraction of the peak
    pub fn max_drawdown(&self) -> Decimal {
        self.drawdown.max_drawdown()
    }

    pub fn current_drawdown(&self) -> Decimal {
        self.drawdown.current_drawdown()
    }
}

/// Peak and maximum drawdown tracker over account balances
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrawdownCalculator {
    peak: Decimal,
    max_drawdown: Decimal,
    current_value: Decimal,
}

impl DrawdownCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Update with a new balance
    pub fn update(&mut self, value: Decimal) {
        self.current_value = value;

        if value > self.peak {
            self.peak = value;
        }

        let drawdown = self.current_drawdown();
        if drawdown > self.max_drawdown {
            self.max_drawdown = drawdown;
        }
    }

    pub fn peak(&self) -> Decimal {
        self.peak
    }

    pub fn max_drawdown(&self) -> Decimal {
        self.max_drawdown
    }

    pub fn current_drawdown(&self) -> Decimal {
        if self.peak > Decimal::ZERO {
            (self.peak - self.current_value) / self.peak
        } else {
            Decimal::ZERO
        }
    }

    pub fn reset(&mut self) {
        self.peak = self.current_value;
        self.max_drawdown = Decimal::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_drawdown_calculator() {
        let mut calc = DrawdownCalculator::new();

        calc.update(dec!(100));
        calc.update(dec!(110));
        calc.update(dec!(99));
        calc.update(dec!(105));

        assert_eq!(calc.peak(), dec!(110));
        assert_eq!(calc.max_drawdown(), dec!(0.1));

        calc.reset();
        assert_eq!(calc.max_drawdown(), Decimal::ZERO);
        assert_eq!(calc.peak(), dec!(105));
    }

    #[test]
    fn test_session_metrics() {
        let mut metrics = SessionMetrics::new();
        assert_eq!(metrics.win_rate(), None);

        metrics.record_trade(false, dec!(-1), dec!(99));
        metrics.record_trade(false, dec!(-2.90), dec!(96.10));
        metrics.record_trade(true, dec!(8.15), dec!(104.25));
        metrics.record_trade(false, dec!(-1), dec!(103.25));

        assert_eq!(metrics.trades, 4);
        assert_eq!(metrics.largest_loss_streak, 2);
        assert_eq!(metrics.net_profit, dec!(3.25));
        assert_eq!(metrics.win_rate(), Some(dec!(25)));
        assert_eq!(metrics.peak_balance(), dec!(104.25));
        assert!(metrics.max_drawdown() > Decimal::ZERO);
    }
}
