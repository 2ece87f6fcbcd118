//! Trading session loop
//!
//! Drives one [`RiskManager`] serially: take the next order, check the
//! circuit breakers, execute, feed the settlement back. The manager is
//! owned by the session and never shared across tasks.

use crate::executor::ContractExecutor;
use crate::notify::{Notification, StopReason};
use anyhow::Result;
use common::{Decimal, NextTradeParams};
use risk_manager::{AccountSnapshot, RiskManager, RiskSummary};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// Session run limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Stop after this many executed trades
    #[serde(default)]
    pub max_trades: Option<u64>,

    /// Stop once net profit reaches this amount
    #[serde(default)]
    pub take_profit: Option<Decimal>,

    /// Pause between trades (milliseconds)
    #[serde(default = "default_trade_interval_ms")]
    pub trade_interval_ms: u64,

    /// End the session instead of placing safety trades
    #[serde(default = "default_stop_on_safety_mode")]
    pub stop_on_safety_mode: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_trades: None,
            take_profit: None,
            trade_interval_ms: default_trade_interval_ms(),
            stop_on_safety_mode: default_stop_on_safety_mode(),
        }
    }
}

fn default_trade_interval_ms() -> u64 {
    1000
}

fn default_stop_on_safety_mode() -> bool {
    true
}

/// How a session ended
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub reason: StopReason,
    pub trades: u64,
    pub summary: RiskSummary,
}

pub struct TradingSession {
    manager: RiskManager,
    executor: Arc<dyn ContractExecutor>,
    config: SessionConfig,
    stop: watch::Receiver<bool>,
    notifications: Option<mpsc::Sender<Notification>>,
}

impl TradingSession {
    pub fn new(
        manager: RiskManager,
        executor: Arc<dyn ContractExecutor>,
        config: SessionConfig,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            manager,
            executor,
            config,
            stop,
            notifications: None,
        }
    }

    /// Forward notifications to `tx`
    pub fn with_notifications(mut self, tx: mpsc::Sender<Notification>) -> Self {
        self.notifications = Some(tx);
        self
    }

    pub fn manager(&self) -> &RiskManager {
        &self.manager
    }

    /// Run until a stop condition; the manager is reset afterwards
    pub async fn run(&mut self) -> Result<SessionReport> {
        let session_id = self.manager.session_id();
        info!(
            session = %session_id,
            strategy = %self.manager.strategy().name,
            "Trading session started"
        );
        self.notify(Notification::SessionStarted {
            strategy: self.manager.strategy().name.clone(),
            base_stake: self.manager.base_stake(),
        })
        .await;

        let mut trades = 0u64;
        let mut params = self.manager.next_trade_params();

        let reason = loop {
            if *self.stop.borrow() {
                break StopReason::Requested;
            }

            if self.config.max_trades.map_or(false, |max| trades >= max) {
                break StopReason::MaxTrades;
            }

            if self
                .config
                .take_profit
                .map_or(false, |target| self.manager.metrics().net_profit >= target)
            {
                break StopReason::TakeProfit;
            }

            if params.is_safety_mode() && self.config.stop_on_safety_mode {
                break StopReason::SafetyMode {
                    reason: params.reason().unwrap_or("unknown").to_string(),
                };
            }

            let balance = match self.executor.balance().await {
                Ok(balance) => balance,
                Err(e) => break StopReason::ExecutorFailed { error: e.to_string() },
            };

            let account = AccountSnapshot {
                balance,
                next_stake: params.amount,
            };
            if self.manager.check_circuit_breakers(&account) {
                let reasons = self.manager.circuit_breaker_state().reasons.clone();
                self.notify(Notification::CircuitBreakerTripped {
                    reasons: reasons.clone(),
                })
                .await;
                break StopReason::CircuitBreaker { reasons };
            }

            self.notify(Notification::trade_placed(&params)).await;
            let report = match self.executor.execute(&params).await {
                Ok(report) => report,
                Err(e) => {
                    error!(session = %session_id, error = %e, "Contract execution failed");
                    break StopReason::ExecutorFailed { error: e.to_string() };
                }
            };
            trades += 1;

            if let (Some(won), Some(balance)) = (report.won, report.balance) {
                let profit = report.profit.unwrap_or(Decimal::ZERO);
                self.notify(Notification::TradeSettled { won, profit, balance }).await;
            }

            let was_safe = self.manager.safety_status().active;
            params = self.manager.process_result(&report);
            self.announce_safety(&params, was_safe).await;

            if self.pause().await {
                break StopReason::Requested;
            }
        };

        let summary = self.manager.summary_at(chrono::Utc::now());
        info!(
            session = %session_id,
            reason = %reason,
            trades,
            net_profit = %summary.metrics.net_profit,
            "Trading session stopped"
        );
        self.notify(Notification::SessionStopped {
            reason: reason.clone(),
            net_profit: summary.metrics.net_profit,
        })
        .await;

        self.manager.reset();

        Ok(SessionReport {
            reason,
            trades,
            summary,
        })
    }

    async fn announce_safety(&self, params: &NextTradeParams, was_safe: bool) {
        let status = self.manager.safety_status();
        if params.is_safety_mode() && status.active && !was_safe {
            self.notify(Notification::SafetyModeEntered {
                reason: params.reason().unwrap_or("unknown").to_string(),
                until: status.until,
            })
            .await;
        }
    }

    /// Wait between trades; true when a stop was requested meanwhile
    async fn pause(&mut self) -> bool {
        let interval = Duration::from_millis(self.config.trade_interval_ms);
        let changed = tokio::select! {
            _ = tokio::time::sleep(interval) => None,
            changed = self.stop.changed() => Some(changed.is_ok()),
        };

        match changed {
            None => false,
            // stop handle dropped
            Some(false) => true,
            Some(true) => *self.stop.borrow(),
        }
    }

    async fn notify(&self, notification: Notification) {
        if let Some(tx) = &self.notifications {
            if tx.send(notification).await.is_err() {
                warn!("Notification receiver dropped");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{ContractType, TradeReport};
    use risk_manager::RiskConfig;
    use rust_decimal_macros::dec;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use strategy_engine::{StrategyConfig, StrategyStep};

    /// Settles trades from a fixed win/loss script
    struct ScriptedExecutor {
        script: Mutex<VecDeque<bool>>,
        balance: Mutex<Decimal>,
        sequence: Mutex<u64>,
    }

    impl ScriptedExecutor {
        fn new(script: &[bool], balance: Decimal) -> Self {
            Self {
                script: Mutex::new(script.iter().copied().collect()),
                balance: Mutex::new(balance),
                sequence: Mutex::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl ContractExecutor for ScriptedExecutor {
        async fn execute(&self, params: &NextTradeParams) -> Result<TradeReport> {
            let won = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))?;
            let mut balance = self.balance.lock().unwrap();
            let mut sequence = self.sequence.lock().unwrap();
            *sequence += 1;

            let id = format!("s{}", *sequence);
            if won {
                let profit = common::round_money(params.amount * dec!(0.95));
                *balance += profit;
                Ok(TradeReport::win(id, params.amount, profit, *balance))
            } else {
                *balance -= params.amount;
                Ok(TradeReport::loss(id, params.amount, *balance))
            }
        }

        async fn balance(&self) -> Result<Decimal> {
            Ok(*self.balance.lock().unwrap())
        }
    }

    fn manager() -> RiskManager {
        let strategy = StrategyConfig {
            name: "even".to_string(),
            description: None,
            is_aggressive: false,
            max_sequence: 6,
            max_consecutive_losses: 5,
            max_risk_exposure: dec!(1000),
            profit_percentage: dec!(95),
            loss_recovery_percentage: dec!(100),
            anticipated_profit_percentage: dec!(95),
            strategy_steps: vec![StrategyStep::new(ContractType::DigitEven, "R_100", dec!(1))],
        };
        let mut config = RiskConfig::default();
        config.rapid_loss.enabled = false;
        RiskManager::new(strategy, dec!(1), config).unwrap()
    }

    fn fast() -> SessionConfig {
        SessionConfig {
            trade_interval_ms: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_stops_on_safety_mode() {
        let (_tx, rx) = watch::channel(false);
        let executor = Arc::new(ScriptedExecutor::new(&[false; 8], dec!(10000)));
        let (ntx, mut nrx) = mpsc::channel(64);

        let mut session =
            TradingSession::new(manager(), executor, fast(), rx).with_notifications(ntx);
        let report = session.run().await.unwrap();

        assert_eq!(report.trades, 5);
        assert_eq!(
            report.reason,
            StopReason::SafetyMode {
                reason: "max_recovery_attempts".to_string()
            }
        );
        assert_eq!(report.summary.state.recovery_attempts, 5);
        assert_eq!(session.manager().state().total_trades, 0);

        let mut saw_safety = false;
        while let Ok(notification) = nrx.try_recv() {
            if matches!(notification, Notification::SafetyModeEntered { .. }) {
                saw_safety = true;
            }
        }
        assert!(saw_safety);
    }

    #[tokio::test]
    async fn test_recovery_win_nets_profit() {
        let (_tx, rx) = watch::channel(false);
        let executor = Arc::new(ScriptedExecutor::new(&[false, false, true], dec!(1000)));
        let config = SessionConfig {
            max_trades: Some(3),
            ..fast()
        };

        let mut session = TradingSession::new(manager(), executor, config, rx);
        let report = session.run().await.unwrap();

        assert_eq!(report.reason, StopReason::MaxTrades);
        assert_eq!(report.summary.state.total_loss_amount, Decimal::ZERO);
        // -1 - 2.90 + 8.56 × 0.95
        assert_eq!(report.summary.metrics.net_profit, dec!(4.23));
    }

    #[tokio::test]
    async fn test_take_profit_stops_session() {
        let (_tx, rx) = watch::channel(false);
        let executor = Arc::new(ScriptedExecutor::new(&[true; 10], dec!(1000)));
        let config = SessionConfig {
            take_profit: Some(dec!(2)),
            ..fast()
        };

        let report = TradingSession::new(manager(), executor, config, rx).run().await.unwrap();
        assert_eq!(report.reason, StopReason::TakeProfit);
        assert_eq!(report.trades, 3);
    }

    #[tokio::test]
    async fn test_stop_signal_is_honoured() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let executor = Arc::new(ScriptedExecutor::new(&[true], dec!(1000)));

        let report = TradingSession::new(manager(), executor, fast(), rx).run().await.unwrap();
        assert_eq!(report.reason, StopReason::Requested);
        assert_eq!(report.trades, 0);
    }

    #[tokio::test]
    async fn test_executor_failure_ends_session() {
        let (_tx, rx) = watch::channel(false);
        let executor = Arc::new(ScriptedExecutor::new(&[], dec!(1000)));

        let report = TradingSession::new(manager(), executor, fast(), rx).run().await.unwrap();
        assert!(matches!(report.reason, StopReason::ExecutorFailed { .. }));
    }

    #[tokio::test]
    async fn test_breaker_halts_before_unaffordable_trade() {
        let (_tx, rx) = watch::channel(false);
        let executor = Arc::new(ScriptedExecutor::new(&[true], dec!(2)));

        let report = TradingSession::new(manager(), executor, fast(), rx).run().await.unwrap();
        match report.reason {
            StopReason::CircuitBreaker { reasons } => {
                assert!(reasons.contains(&"insufficient_balance".to_string()));
            }
            other => panic!("unexpected stop: {:?}", other),
        }
    }
}
