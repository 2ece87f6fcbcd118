//! Risk Manager
//!
//! Stateful loss-recovery engine for one trading session. It ingests
//! settled trades, keeps the recovery ledger, walks the compiled recovery
//! ladder, and forces a protective safety mode when any risk rule is
//! breached.
//!
//! The engine has no timers. Every deadline is compared lazily against a
//! clock value, and each time-dependent operation has an `*_at(now)`
//! variant so callers supply the clock.

mod circuit_breaker;
mod config;
mod metrics;
mod rapid_loss;
mod safety;
mod state;

pub use circuit_breaker::{AccountSnapshot, CircuitBreaker, CircuitBreakerState, RiskViolation};
pub use config::{
    create_config_template, load_config, load_layered_config, save_config, CircuitBreakerConfig,
    LastResortConfig, RapidLossConfig, RiskConfig, RiskLimits, SafetyConfig,
};
pub use metrics::{DrawdownCalculator, SessionMetrics};
pub use rapid_loss::{LossEvent, RapidLossDetector, RapidLossState};
pub use safety::{SafetyReason, SafetySource, SafetyStatus};
pub use state::{RecoveryPhase, RiskManagerState};

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use common::{
    percent_of, round_money, ContractType, NextTradeParams, RecoveryKind, TradeMetadata,
    TradeOutcome, TradeReport, Uuid,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::sync::Arc;
use strategy_engine::{
    CompiledStep, CompiledStepTable, ContractParamsFactory, RewardTable, StrategyCatalog,
    StrategyCompiler, StrategyConfig, StrategyError,
};
use tracing::{debug, error, info, warn};

const LAST_RESORT_REASON: &str = "last_resort_recovery";
const NO_STEP_TABLE_REASON: &str = "step_table_unavailable";
const INTERNAL_ERROR_REASON: &str = "internal_error";

/// Coarse risk assessment for reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn from_score(score: Decimal) -> Self {
        match score {
            s if s >= dec!(0.9) => RiskLevel::Critical,
            s if s >= dec!(0.7) => RiskLevel::High,
            s if s >= dec!(0.4) => RiskLevel::Medium,
            _ => RiskLevel::Low,
        }
    }
}

/// Point-in-time view of a session for reporting
#[derive(Debug, Clone, Serialize)]
pub struct RiskSummary {
    pub session_id: Uuid,
    pub strategy: String,
    pub phase: RecoveryPhase,
    pub risk_level: RiskLevel,
    pub state: RiskManagerState,
    pub safety: SafetyStatus,
    pub circuit_breaker: CircuitBreakerState,
    pub metrics: SessionMetrics,
}

/// Loss-recovery and risk engine bound to one session
#[derive(Debug, Clone)]
pub struct RiskManager {
    session_id: Uuid,
    config: RiskConfig,
    catalog: StrategyCatalog,
    strategy: StrategyConfig,
    base_stake: Decimal,
    compiler: StrategyCompiler,
    compiled: Option<CompiledStepTable>,
    params: ContractParamsFactory,
    state: RiskManagerState,
    safety: SafetyStatus,
    breaker: CircuitBreaker,
    rapid: RapidLossDetector,
    metrics: SessionMetrics,
}

impl RiskManager {
    /// Manager for a single strategy using the standard reward table
    pub fn new(
        strategy: StrategyConfig,
        base_stake: Decimal,
        config: RiskConfig,
    ) -> Result<Self, StrategyError> {
        let name = strategy.name.clone();
        let catalog = StrategyCatalog::new(vec![strategy])?;
        let rewards = Arc::new(RewardTable::standard()?);
        Self::with_catalog(catalog, &name, base_stake, config, rewards)
    }

    /// Manager starting on `strategy` from `catalog`.
    ///
    /// Invalid strategies, a non-positive base stake and ladders whose
    /// stakes overflow are rejected. A strategy whose steps have no reward
    /// tiers leaves the manager on base-stake fallback trades.
    pub fn with_catalog(
        catalog: StrategyCatalog,
        strategy: &str,
        base_stake: Decimal,
        config: RiskConfig,
        rewards: Arc<RewardTable>,
    ) -> Result<Self, StrategyError> {
        if base_stake <= Decimal::ZERO {
            return Err(StrategyError::InvalidStrategyDefinition(format!(
                "base stake must be positive, got {}",
                base_stake
            )));
        }

        let selected = catalog.get(strategy)?.clone();
        let index = catalog.index_of(strategy).unwrap_or_default();

        let compiler = StrategyCompiler::new(rewards);
        let compiled = compile_or_fallback(&compiler, &selected, base_stake)?;

        let session_id = Uuid::new_v4();
        let state = RiskManagerState {
            current_strategy_index: index,
            ..Default::default()
        };

        info!(
            session = %session_id,
            strategy = %selected.name,
            base_stake = %base_stake,
            compiled = compiled.is_some(),
            "Risk manager started"
        );

        Ok(Self {
            session_id,
            params: ContractParamsFactory::new(config.trade_defaults.clone()),
            breaker: CircuitBreaker::new(config.circuit_breakers.clone(), config.limits.clone()),
            rapid: RapidLossDetector::new(config.rapid_loss.clone(), base_stake),
            config,
            catalog,
            strategy: selected,
            base_stake,
            compiler,
            compiled,
            state,
            safety: SafetyStatus::default(),
            metrics: SessionMetrics::new(),
        })
    }

    /// Seed the random digit barriers for reproducible runs
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.params = ContractParamsFactory::with_seed(self.config.trade_defaults.clone(), seed);
        self
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn strategy(&self) -> &StrategyConfig {
        &self.strategy
    }

    pub fn base_stake(&self) -> Decimal {
        self.base_stake
    }

    pub fn state(&self) -> &RiskManagerState {
        &self.state
    }

    pub fn safety_status(&self) -> &SafetyStatus {
        &self.safety
    }

    pub fn circuit_breaker_state(&self) -> &CircuitBreakerState {
        self.breaker.state()
    }

    pub fn rapid_loss_state(&self) -> &RapidLossState {
        self.rapid.state()
    }

    pub fn metrics(&self) -> &SessionMetrics {
        &self.metrics
    }

    /// Recovery ladder in use, `None` when running on fallback trades
    pub fn compiled_steps(&self) -> Option<&CompiledStepTable> {
        self.compiled.as_ref()
    }

    pub fn phase_at(&self, now: DateTime<Utc>) -> RecoveryPhase {
        if self.safety.is_active_at(now) {
            RecoveryPhase::SafetyMode
        } else if self.state.is_recovering() {
            RecoveryPhase::Recovering
        } else {
            RecoveryPhase::Normal
        }
    }

    pub fn phase(&self) -> RecoveryPhase {
        self.phase_at(Utc::now())
    }

    pub fn is_in_safety_mode_at(&self, now: DateTime<Utc>) -> bool {
        self.safety.is_active_at(now)
    }

    /// Ingest one settled trade and decide the next order.
    ///
    /// Never fails: a malformed report or a breached rule yields a
    /// protective order tagged `metadata.safety_mode`.
    pub fn process_result_at(
        &mut self,
        report: &TradeReport,
        now: DateTime<Utc>,
    ) -> NextTradeParams {
        self.refresh_safety(now);

        let outcome = match report.validate(now) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    session = %self.session_id,
                    error = %e,
                    "Rejected malformed trade report"
                );
                self.metrics.record_malformed();
                return self.safety_trade(SafetyReason::MalformedOutcome);
            }
        };

        if self.state.roll_day(outcome.timestamp.date_naive()) {
            info!(
                session = %self.session_id,
                day = ?self.state.trading_day,
                "New trading day - daily loss reset"
            );
        }

        self.state.total_trades += 1;
        self.state.last_balance = Some(outcome.balance);
        self.metrics.record_trade(outcome.won, outcome.profit, outcome.balance);

        if outcome.won {
            self.handle_win(&outcome);
        } else {
            self.handle_loss(&outcome, now);
        }

        if let Some(reason) = self.active_reason(now) {
            return self.safety_trade(reason);
        }

        if let Some(reason) = self.should_enter_safety_mode(outcome.balance) {
            self.enter_safety_mode_at(reason, SafetySource::RiskManager, now);
            return self.safety_trade(reason);
        }

        self.next_trade_params_at(now)
    }

    pub fn process_result(&mut self, report: &TradeReport) -> NextTradeParams {
        self.process_result_at(report, Utc::now())
    }

    /// Apply a winning trade; returns the step at the recovery pointer
    pub fn handle_win(&mut self, outcome: &TradeOutcome) -> Option<&CompiledStep> {
        let recovered = self.state.record_win(outcome.profit);

        info!(
            session = %self.session_id,
            contract_id = %outcome.contract_id,
            profit = %outcome.profit,
            recovered = %recovered,
            outstanding = %self.state.total_loss_amount,
            "Trade won"
        );

        if self.state.total_loss_amount.is_zero() && !recovered.is_zero() {
            info!(session = %self.session_id, "Losses fully recovered");
        }

        let pointer = self.state.current_recovery_step;
        self.compiled.as_ref().and_then(|table| table.get(pointer))
    }

    /// Apply a losing trade, forcing safety mode once recovery attempts run out
    pub fn handle_loss(&mut self, outcome: &TradeOutcome, now: DateTime<Utc>) {
        let amount = outcome.loss_amount();
        self.state.record_loss(amount);
        self.rapid.record_loss(amount, outcome.timestamp);

        info!(
            session = %self.session_id,
            contract_id = %outcome.contract_id,
            stake = %outcome.stake,
            consecutive_losses = self.state.consecutive_losses,
            total_loss = %self.state.total_loss_amount,
            daily_loss = %self.state.daily_loss_amount,
            "Trade lost"
        );

        if self.state.recovery_attempts >= self.config.safety.max_recovery_attempts {
            self.enter_safety_mode_at(
                SafetyReason::MaxRecoveryAttempts,
                SafetySource::RiskManager,
                now,
            );
        }
    }

    /// First safety rule the current ledger and `balance` break, if any
    pub fn should_enter_safety_mode(&self, balance: Decimal) -> Option<SafetyReason> {
        let safety = &self.config.safety;

        let consecutive_limit = self
            .strategy
            .max_consecutive_losses
            .saturating_mul(safety.consecutive_loss_factor);
        if self.state.consecutive_losses >= consecutive_limit {
            return Some(SafetyReason::ConsecutiveLosses);
        }

        if self.state.recovery_attempts >= safety.max_recovery_attempts {
            return Some(SafetyReason::MaxRecoveryAttempts);
        }

        if balance < self.base_stake * safety.balance_floor_multiplier {
            return Some(SafetyReason::BalanceFloor);
        }

        if self.state.total_loss_amount > self.base_stake * self.strategy.max_risk_exposure {
            return Some(SafetyReason::RiskExposure);
        }

        None
    }

    /// Order to place next
    pub fn next_trade_params_at(&mut self, now: DateTime<Utc>) -> NextTradeParams {
        if let Some(reason) = self.active_reason(now) {
            return self.safety_trade(reason);
        }

        match self.plan_next_trade() {
            Ok(params) => params,
            Err(e) => {
                error!(
                    session = %self.session_id,
                    error = %e,
                    "Failed to plan next trade - falling back to base stake"
                );
                self.fallback_trade(INTERNAL_ERROR_REASON)
            }
        }
    }

    pub fn next_trade_params(&mut self) -> NextTradeParams {
        self.next_trade_params_at(Utc::now())
    }

    pub fn enter_safety_mode_at(
        &mut self,
        reason: SafetyReason,
        source: SafetySource,
        now: DateTime<Utc>,
    ) {
        let until = now + Duration::minutes(self.config.safety.cooldown_minutes);
        self.enter_safety_until(reason, source, now, until);
    }

    pub fn enter_safety_mode(&mut self, reason: SafetyReason) {
        self.enter_safety_mode_at(reason, SafetySource::RiskManager, Utc::now());
    }

    /// Evaluate every circuit breaker against `account`.
    ///
    /// Returns true when trading must not continue; a new breach also puts
    /// the manager in safety mode until the breaker cooldown ends.
    pub fn check_circuit_breakers_at(
        &mut self,
        account: &AccountSnapshot,
        now: DateTime<Utc>,
    ) -> bool {
        if self.breaker.is_active_at(now) {
            return true;
        }

        let mut violations = self.breaker.evaluate(&self.state, account);
        let breaker_tripped = !violations.is_empty();

        if self.rapid.check_at(now) {
            violations.push(RiskViolation::RapidLosses {
                triggers: self.rapid.trigger_count(),
                until: self.rapid.cooldown_until(),
            });
        }

        if violations.is_empty() {
            return false;
        }

        let rapid_until = self.rapid.cooldown_until();
        let (reason, source, until) = if breaker_tripped {
            let until = now + self.breaker.cooldown();
            let until = rapid_until.map_or(until, |r| r.max(until));
            (SafetyReason::CircuitBreaker, SafetySource::CircuitBreaker, until)
        } else {
            let until = rapid_until.unwrap_or(now + self.breaker.cooldown());
            (SafetyReason::RapidLosses, SafetySource::RapidLoss, until)
        };

        self.breaker.trigger_at(&violations, now, until);
        self.enter_safety_until(reason, source, now, until);
        true
    }

    pub fn check_circuit_breakers(&mut self, account: &AccountSnapshot) -> bool {
        self.check_circuit_breakers_at(account, Utc::now())
    }

    /// Whether a loss burst requires a pause at `now`
    pub fn check_rapid_losses_at(&mut self, now: DateTime<Utc>) -> bool {
        let cooling = self.rapid.check_at(now);
        if cooling && !self.safety.is_active_at(now) {
            if let Some(until) = self.rapid.cooldown_until() {
                self.enter_safety_until(
                    SafetyReason::RapidLosses,
                    SafetySource::RapidLoss,
                    now,
                    until,
                );
            }
        }
        cooling
    }

    pub fn check_rapid_losses(&mut self) -> bool {
        self.check_rapid_losses_at(Utc::now())
    }

    /// Start over after trading stopped; the rapid-loss trigger count is kept
    pub fn reset_at(&mut self, now: DateTime<Utc>) {
        self.state.reset();
        self.safety.clear();
        self.breaker.reset(now);
        self.rapid.clear();
        info!(session = %self.session_id, "Risk manager reset");
    }

    pub fn reset(&mut self) {
        self.reset_at(Utc::now());
    }

    /// Move to another catalogue strategy, recompiling its ladder
    pub fn switch_strategy(&mut self, name: &str) -> Result<(), StrategyError> {
        let config = self.catalog.get(name)?.clone();
        let index = self.catalog.index_of(name).unwrap_or_default();
        let table = self.compiler.compile(&config, self.base_stake)?;

        info!(
            session = %self.session_id,
            from = %self.strategy.name,
            to = %config.name,
            "Switching strategy"
        );

        self.strategy = config;
        self.compiled = Some(table);
        self.state.current_strategy_index = index;
        self.state.current_recovery_step = 0;
        Ok(())
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    /// Score in `[0, 1]` from how close the ledger is to its ceilings
    pub fn risk_level(&self) -> RiskLevel {
        let limits = &self.config.limits;
        let ratio = |value: Decimal, limit: Decimal| {
            if limit > Decimal::ZERO {
                value / limit
            } else {
                Decimal::ZERO
            }
        };

        let score = ratio(self.state.daily_loss_amount, limits.daily_loss_limit)
            .max(ratio(self.state.total_loss_amount, limits.max_loss_limit))
            .max(ratio(
                Decimal::from(self.state.consecutive_losses),
                Decimal::from(limits.max_consecutive_losses),
            ))
            .min(Decimal::ONE);

        RiskLevel::from_score(score)
    }

    pub fn summary_at(&self, now: DateTime<Utc>) -> RiskSummary {
        RiskSummary {
            session_id: self.session_id,
            strategy: self.strategy.name.clone(),
            phase: self.phase_at(now),
            risk_level: self.risk_level(),
            state: self.state.clone(),
            safety: self.safety.clone(),
            circuit_breaker: self.breaker.state().clone(),
            metrics: self.metrics.clone(),
        }
    }

    fn enter_safety_until(
        &mut self,
        reason: SafetyReason,
        source: SafetySource,
        now: DateTime<Utc>,
        until: DateTime<Utc>,
    ) {
        let was_active = self.safety.is_active_at(now);
        let until = match self.safety.until {
            Some(current) if was_active && current > until => current,
            _ => until,
        };

        self.safety = SafetyStatus::engaged(reason, source, until);
        if !was_active {
            self.metrics.record_safety_entry();
        }

        warn!(
            session = %self.session_id,
            reason = reason.code(),
            source = ?source,
            until = %until,
            consecutive_losses = self.state.consecutive_losses,
            total_loss = %self.state.total_loss_amount,
            "Entering safety mode"
        );
    }

    /// Lazily leave an expired safety mode, starting a fresh recovery cycle
    fn refresh_safety(&mut self, now: DateTime<Utc>) {
        if !self.safety.is_expired_at(now) {
            return;
        }

        info!(
            session = %self.session_id,
            reason = ?self.safety.reason.map(|r| r.code()),
            "Safety mode expired"
        );
        self.safety.clear();
        self.state.clear_recovery();
    }

    fn active_reason(&mut self, now: DateTime<Utc>) -> Option<SafetyReason> {
        self.refresh_safety(now);
        if self.safety.is_active_at(now) {
            Some(self.safety.reason.unwrap_or(SafetyReason::CircuitBreaker))
        } else {
            None
        }
    }

    fn plan_next_trade(&mut self) -> anyhow::Result<NextTradeParams> {
        let Some(table) = self.compiled.as_ref() else {
            warn!(
                session = %self.session_id,
                strategy = %self.strategy.name,
                "No compiled step table - using base stake"
            );
            return Ok(self.fallback_trade(NO_STEP_TABLE_REASON));
        };

        let losses = self.state.consecutive_losses;
        let exhausted = usize::try_from(losses).map_or(true, |l| l >= table.len());
        if exhausted
            && self.config.last_resort.enabled
            && self.state.total_loss_amount > Decimal::ZERO
        {
            return self.last_resort_trade();
        }

        let step = table
            .step_for_losses(losses)
            .cloned()
            .ok_or_else(|| anyhow!("step table for `{}` is empty", table.strategy))?;

        self.state.current_recovery_step = step.index;
        let amount = self.clamp_stake(step.stake);
        let recovery = if step.index == 0 {
            RecoveryKind::Base
        } else {
            RecoveryKind::Compounding
        };

        debug!(
            session = %self.session_id,
            step = step.index,
            amount = %amount,
            contract_type = %step.contract_type,
            "Next trade from recovery ladder"
        );

        let metadata = TradeMetadata {
            safety_mode: false,
            reason: None,
            step_index: Some(step.index),
            strategy: Some(self.strategy.name.clone()),
            recovery,
        };
        Ok(self.params.for_step(&step, amount).with_metadata(metadata))
    }

    fn last_resort_trade(&mut self) -> anyhow::Result<NextTradeParams> {
        let mut amount = self
            .state
            .total_loss_amount
            .checked_mul(self.config.last_resort.multiplier)
            .ok_or_else(|| anyhow!("last-resort stake overflow"))?;
        amount = amount.min(self.config.limits.max_stake);
        if let Some(balance) = self.state.last_balance {
            amount = amount.min(percent_of(balance, self.config.limits.max_risk_percentage));
        }
        let amount = round_money(amount);

        if amount <= Decimal::ZERO {
            return Ok(self.fallback_trade(LAST_RESORT_REASON));
        }

        warn!(
            session = %self.session_id,
            total_loss = %self.state.total_loss_amount,
            amount = %amount,
            "Recovery ladder exhausted - last-resort recovery"
        );

        let metadata = TradeMetadata {
            safety_mode: false,
            reason: Some(LAST_RESORT_REASON.to_string()),
            step_index: None,
            strategy: Some(self.strategy.name.clone()),
            recovery: RecoveryKind::LastResort,
        };
        Ok(self
            .params
            .for_contract(ContractType::DigitDiff, amount)
            .with_metadata(metadata))
    }

    /// Minimal-risk order on the default contract
    fn safety_trade(&mut self, reason: SafetyReason) -> NextTradeParams {
        let amount = round_money(self.base_stake.min(self.config.limits.min_stake));
        let metadata = TradeMetadata {
            safety_mode: true,
            reason: Some(reason.code().to_string()),
            step_index: None,
            strategy: Some(self.strategy.name.clone()),
            recovery: RecoveryKind::Safety,
        };
        self.params.base_trade(amount).with_metadata(metadata)
    }

    fn fallback_trade(&mut self, reason: &str) -> NextTradeParams {
        let amount = self.clamp_stake(self.base_stake);
        let metadata = TradeMetadata {
            safety_mode: false,
            reason: Some(reason.to_string()),
            step_index: None,
            strategy: Some(self.strategy.name.clone()),
            recovery: RecoveryKind::Fallback,
        };
        self.params.base_trade(amount).with_metadata(metadata)
    }

    fn clamp_stake(&self, amount: Decimal) -> Decimal {
        round_money(amount.min(self.config.limits.max_stake))
    }
}

/// Compile `strategy`; a reward-table gap degrades to fallback trades,
/// anything else is a configuration error
fn compile_or_fallback(
    compiler: &StrategyCompiler,
    strategy: &StrategyConfig,
    base_stake: Decimal,
) -> Result<Option<CompiledStepTable>, StrategyError> {
    match compiler.compile(strategy, base_stake) {
        Ok(table) => Ok(Some(table)),
        Err(StrategyError::Reward(e)) => {
            error!(
                strategy = %strategy.name,
                error = %e,
                "Strategy compilation failed - trading on base stake only"
            );
            Ok(None)
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Barrier, Digit};
    use strategy_engine::StrategyStep;

    fn even_strategy() -> StrategyConfig {
        StrategyConfig {
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
        }
    }

    fn manager() -> RiskManager {
        RiskManager::new(even_strategy(), dec!(1), RiskConfig::default())
            .unwrap()
            .with_seed(7)
    }

    #[test]
    fn test_first_trade_is_base_step() {
        let mut rm = manager();
        let params = rm.next_trade_params_at(Utc::now());

        assert_eq!(params.amount, dec!(1));
        assert_eq!(params.contract_type, ContractType::DigitEven);
        assert_eq!(params.barrier, Some(Barrier::Even));
        assert_eq!(params.recovery(), RecoveryKind::Base);
        assert!(!params.is_safety_mode());
        assert_eq!(rm.phase_at(Utc::now()), RecoveryPhase::Normal);
    }

    #[test]
    fn test_rejects_bad_construction() {
        assert!(matches!(
            RiskManager::new(even_strategy(), dec!(0), RiskConfig::default()),
            Err(StrategyError::InvalidStrategyDefinition(_))
        ));

        let mut strategy = even_strategy();
        strategy.strategy_steps.clear();
        assert!(RiskManager::new(strategy, dec!(1), RiskConfig::default()).is_err());
    }

    #[test]
    fn test_unpriceable_strategy_falls_back_to_base_trade() {
        let mut strategy = even_strategy();
        strategy.strategy_steps = vec![StrategyStep::new(
            ContractType::DigitOver(Some(Digit::new(9).unwrap())),
            "R_100",
            dec!(1),
        )];

        let mut rm = RiskManager::new(strategy, dec!(2), RiskConfig::default()).unwrap();
        assert!(rm.compiled_steps().is_none());

        let params = rm.next_trade_params_at(Utc::now());
        assert_eq!(params.amount, dec!(2));
        assert_eq!(params.contract_type, ContractType::DigitEven);
        assert_eq!(params.barrier, Some(Barrier::Even));
        assert_eq!(params.recovery(), RecoveryKind::Fallback);
        assert_eq!(params.reason(), Some(NO_STEP_TABLE_REASON));
    }

    #[test]
    fn test_malformed_report_gets_safety_response() {
        let mut rm = manager();
        let report = TradeReport {
            won: Some(false),
            stake: Some(dec!(1)),
            ..Default::default()
        };

        let params = rm.process_result_at(&report, Utc::now());
        assert!(params.is_safety_mode());
        assert_eq!(params.reason(), Some("malformed_outcome"));
        assert_eq!(params.amount, dec!(0.35));
        assert_eq!(rm.state().total_trades, 0);
        assert_eq!(rm.metrics().malformed_outcomes, 1);
        assert_eq!(rm.safety_status(), &SafetyStatus::default());
    }

    #[test]
    fn test_oversized_reports_do_not_corrupt_ledger() {
        let mut rm = manager();
        let now = Utc::now();
        let huge = dec!(50000000000000000000000000000);

        for id in ["c1", "c2"] {
            let params = rm.process_result_at(&TradeReport::loss(id, huge, dec!(1000)), now);
            assert!(params.is_safety_mode());
            assert_eq!(params.reason(), Some("malformed_outcome"));
        }
        assert_eq!(rm.state().total_loss_amount, Decimal::ZERO);
        assert_eq!(rm.metrics().net_profit, Decimal::ZERO);
        assert_eq!(rm.metrics().malformed_outcomes, 2);
    }

    #[test]
    fn test_overflowing_ladder_is_rejected() {
        let mut strategy = even_strategy();
        strategy.is_aggressive = true;
        strategy.max_sequence = 120;

        match RiskManager::new(strategy, dec!(1), RiskConfig::default()) {
            Err(StrategyError::InvalidStrategyDefinition(reason)) => {
                assert!(reason.contains("stake overflow"));
            }
            other => panic!(
                "expected invalid definition, got {:?}",
                other.map(|rm| rm.session_id())
            ),
        }
    }

    #[test]
    fn test_win_after_losses_returns_to_base() {
        let mut rm = manager();
        let now = Utc::now();

        rm.process_result_at(&TradeReport::loss("c1", dec!(1), dec!(999)), now);
        let next = rm.process_result_at(&TradeReport::loss("c2", dec!(2.90), dec!(996.10)), now);
        assert_eq!(next.amount, dec!(8.56));
        assert_eq!(rm.state().current_recovery_step, 2);

        let win = TradeReport::win("c3", dec!(8.56), dec!(8.15), dec!(1004.25));
        let next = rm.process_result_at(&win, now);
        assert_eq!(next.amount, dec!(1));
        assert_eq!(rm.state().consecutive_losses, 0);
        assert_eq!(rm.state().total_loss_amount, Decimal::ZERO);
        assert_eq!(rm.state().current_recovery_step, 0);
        assert_eq!(rm.phase_at(now), RecoveryPhase::Normal);
    }

    #[test]
    fn test_stakes_are_clamped_to_max_stake() {
        let mut config = RiskConfig::default();
        config.limits.max_stake = dec!(5);
        let mut rm = RiskManager::new(even_strategy(), dec!(1), config).unwrap();
        let now = Utc::now();

        rm.process_result_at(&TradeReport::loss("c1", dec!(1), dec!(999)), now);
        let next = rm.process_result_at(&TradeReport::loss("c2", dec!(2.90), dec!(996.10)), now);
        assert_eq!(next.amount, dec!(5));
    }

    #[test]
    fn test_safety_mode_expires_lazily() {
        let mut rm = manager();
        let now = Utc::now();

        rm.enter_safety_mode_at(SafetyReason::BalanceFloor, SafetySource::RiskManager, now);
        assert!(rm.next_trade_params_at(now + Duration::minutes(14)).is_safety_mode());
        assert_eq!(rm.phase_at(now), RecoveryPhase::SafetyMode);

        let params = rm.next_trade_params_at(now + Duration::minutes(15));
        assert!(!params.is_safety_mode());
        assert_eq!(params.amount, dec!(1));
        assert!(!rm.safety_status().active);
        assert_eq!(rm.metrics().safety_entries, 1);
    }

    #[test]
    fn test_last_resort_after_ladder_exhausted() {
        let mut strategy = even_strategy();
        strategy.max_sequence = 2;
        let mut config = RiskConfig::default();
        config.last_resort.enabled = true;
        let mut rm = RiskManager::new(strategy, dec!(1), config).unwrap();
        let now = Utc::now();

        rm.process_result_at(&TradeReport::loss("c1", dec!(1), dec!(1000)), now);
        let next = rm.process_result_at(&TradeReport::loss("c2", dec!(2.90), dec!(1000)), now);

        assert_eq!(next.recovery(), RecoveryKind::LastResort);
        assert_eq!(next.contract_type, ContractType::DigitDiff);
        assert!(matches!(next.barrier, Some(Barrier::Digit(_))));
        assert_eq!(next.amount, dec!(46.80));
    }

    #[test]
    fn test_last_resort_respects_balance_share() {
        let mut strategy = even_strategy();
        strategy.max_sequence = 1;
        let mut config = RiskConfig::default();
        config.last_resort.enabled = true;
        let mut rm = RiskManager::new(strategy, dec!(1), config).unwrap();

        let next = rm.process_result_at(&TradeReport::loss("c1", dec!(1), dec!(20)), Utc::now());
        assert_eq!(next.amount, dec!(5));
    }

    #[test]
    fn test_last_resort_overflow_falls_back_to_base() {
        let mut strategy = even_strategy();
        strategy.max_sequence = 1;
        let mut config = RiskConfig::default();
        config.last_resort.enabled = true;
        config.last_resort.multiplier = Decimal::MAX;
        let mut rm = RiskManager::new(strategy, dec!(1), config).unwrap();

        let next = rm.process_result_at(&TradeReport::loss("c1", dec!(2), dec!(1000)), Utc::now());
        assert!(!next.is_safety_mode());
        assert_eq!(next.recovery(), RecoveryKind::Fallback);
        assert_eq!(next.reason(), Some(INTERNAL_ERROR_REASON));
        assert_eq!(next.amount, dec!(1));
    }

    #[test]
    fn test_without_last_resort_last_step_repeats() {
        let mut strategy = even_strategy();
        strategy.max_sequence = 2;
        let mut rm = RiskManager::new(strategy, dec!(1), RiskConfig::default()).unwrap();
        let now = Utc::now();

        rm.process_result_at(&TradeReport::loss("c1", dec!(1), dec!(1000)), now);
        let next = rm.process_result_at(&TradeReport::loss("c2", dec!(2.90), dec!(1000)), now);
        assert_eq!(next.recovery(), RecoveryKind::Compounding);
        assert_eq!(next.amount, dec!(2.90));
    }

    #[test]
    fn test_risk_level_tracks_ceilings() {
        let mut rm = manager();
        assert_eq!(rm.risk_level(), RiskLevel::Low);

        let now = Utc::now();
        for i in 0..4 {
            rm.process_result_at(&TradeReport::loss(format!("c{}", i), dec!(1), dec!(1000)), now);
        }
        // 4 of 8 consecutive losses
        assert_eq!(rm.risk_level(), RiskLevel::Medium);
        assert_eq!(rm.summary_at(now).phase, RecoveryPhase::Recovering);
    }
}
