//! Strategy compilation
//!
//! Turns a [`StrategyConfig`] and a base stake into a concrete recovery
//! ladder. Each recovery step is sized to win back every stake spent so
//! far plus the profit a fresh base-stake trade would have earned:
//!
//! ```text
//! stake_i = carry + carry × step_pct / 100 + base × first_pct / 100
//! ```
//!
//! where `carry` is the sum of all previously computed stakes.

use crate::definition::{StrategyConfig, StrategyStep};
use crate::reward::RewardTable;
use crate::StrategyError;
use common::{checked_percent_of, round_money, ContractType};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// One concrete, profit-annotated step of a recovery ladder
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStep {
    pub index: usize,
    pub template: StrategyStep,
    /// Contract type used for payout lookup
    pub contract_type: ContractType,
    pub stake: Decimal,
    pub profit_percentage: Decimal,
    pub anticipated_profit: Decimal,
    /// Sum of the stakes of every earlier step
    pub carry: Decimal,
    pub clamped: bool,
    /// Human-readable derivation of `stake`, kept for audit
    pub formula: String,
}

/// Ordered recovery ladder produced by [`StrategyCompiler::compile`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledStepTable {
    pub strategy: String,
    pub base_stake: Decimal,
    /// Per-step cap applied to non-aggressive ladders
    pub stake_cap: Option<Decimal>,
    steps: Vec<CompiledStep>,
}

impl CompiledStepTable {
    pub fn steps(&self) -> &[CompiledStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CompiledStep> {
        self.steps.get(index)
    }

    /// Step to play after `consecutive_losses` losses in a row; the last step repeats
    pub fn step_for_losses(&self, consecutive_losses: u32) -> Option<&CompiledStep> {
        let last = self.steps.len().checked_sub(1)?;
        let index = usize::try_from(consecutive_losses).unwrap_or(usize::MAX).min(last);
        self.steps.get(index)
    }

    /// Total amount staked if every step in the ladder loses
    pub fn total_exposure(&self) -> Decimal {
        self.steps.iter().map(|s| s.stake).sum()
    }

    pub fn largest_stake(&self) -> Decimal {
        self.steps
            .iter()
            .map(|s| s.stake)
            .max()
            .unwrap_or(Decimal::ZERO)
    }
}

/// Compiles strategies against a shared reward table
#[derive(Debug, Clone)]
pub struct StrategyCompiler {
    rewards: Arc<RewardTable>,
}

impl StrategyCompiler {
    pub fn new(rewards: Arc<RewardTable>) -> Self {
        Self { rewards }
    }

    pub fn rewards(&self) -> &RewardTable {
        &self.rewards
    }

    /// Build the recovery ladder for `config` starting at `base_stake`.
    ///
    /// Pure: the same inputs always produce the same table.
    pub fn compile(
        &self,
        config: &StrategyConfig,
        base_stake: Decimal,
    ) -> Result<CompiledStepTable, StrategyError> {
        config.validate()?;
        if base_stake <= Decimal::ZERO {
            return Err(StrategyError::InvalidStrategyDefinition(format!(
                "base stake must be positive, got {}",
                base_stake
            )));
        }

        let first = config.template_for(0).ok_or_else(no_steps)?;
        let first_type = first.effective_contract_type();
        let first_pct = self.rewards.percentage_for(first_type, base_stake)?;

        let stake_cap = if config.is_aggressive {
            None
        } else {
            let cap = config
                .stake_cap(base_stake)
                .ok_or_else(|| overflow("stake cap"))?;
            Some(round_money(cap))
        };
        let fresh_profit =
            checked_percent_of(base_stake, first_pct).ok_or_else(|| overflow("step 0"))?;

        let mut steps = Vec::with_capacity(config.max_sequence);
        let mut carry = Decimal::ZERO;

        for i in 0..config.max_sequence {
            let template = config.template_for(i).ok_or_else(no_steps)?;
            let contract_type = template.effective_contract_type();
            let step_overflow = || overflow(&format!("step {}", i));

            let (mut stake, mut formula) = if i == 0 {
                (base_stake, format!("base stake {}", base_stake))
            } else {
                let basis = if carry.is_zero() { base_stake } else { carry };
                let step_pct = self.rewards.percentage_for(contract_type, basis)?;

                let carried_profit = checked_percent_of(carry, step_pct).ok_or_else(step_overflow)?;
                let stake = carry
                    .checked_add(carried_profit)
                    .and_then(|sum| sum.checked_add(fresh_profit))
                    .map(round_money)
                    .ok_or_else(step_overflow)?;

                let formula = format!(
                    "{} + {} × {}% + {} × {}% = {}",
                    carry, carry, step_pct, base_stake, first_pct, stake
                );
                (stake, formula)
            };

            let mut clamped = false;
            if let Some(cap) = stake_cap {
                if stake > cap {
                    formula = format!("{} (clamped to {})", formula, cap);
                    stake = cap;
                    clamped = true;
                }
            }

            let profit_percentage = self.rewards.percentage_for(contract_type, stake)?;
            let anticipated_profit = checked_percent_of(stake, profit_percentage)
                .map(round_money)
                .ok_or_else(step_overflow)?;

            debug!(
                strategy = %config.name,
                step = i,
                stake = %stake,
                profit_percentage = %profit_percentage,
                "Compiled recovery step"
            );

            steps.push(CompiledStep {
                index: i,
                template: template.clone(),
                contract_type,
                stake,
                profit_percentage,
                anticipated_profit,
                carry,
                clamped,
                formula,
            });

            carry = carry.checked_add(stake).ok_or_else(step_overflow)?;
        }

        info!(
            strategy = %config.name,
            base_stake = %base_stake,
            steps = steps.len(),
            exposure = %carry,
            "Strategy compiled"
        );

        Ok(CompiledStepTable {
            strategy: config.name.clone(),
            base_stake,
            stake_cap,
            steps,
        })
    }
}

fn no_steps() -> StrategyError {
    StrategyError::InvalidStrategyDefinition("strategySteps is empty".to_string())
}

fn overflow(at: &str) -> StrategyError {
    StrategyError::InvalidStrategyDefinition(format!("stake overflow at {}", at))
}
