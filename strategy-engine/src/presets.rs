//! Built-in strategies used when no strategy document is supplied

use crate::definition::{StrategyCatalog, StrategyConfig, StrategyStep};
use crate::StrategyError;
use common::{Barrier, ContractType, Digit, DurationUnit};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const EVEN_RECOVERY: &str = "even-recovery";
pub const PARITY_SWITCH: &str = "parity-switch";
pub const OVER_UNDER_RECOVERY: &str = "over-under-recovery";
pub const DIFFERS_STEADY: &str = "differs-steady";

const DEFAULT_SYMBOL: &str = "R_100";

fn strategy(
    name: &str,
    description: &str,
    max_sequence: usize,
    max_consecutive_losses: u32,
    max_risk_exposure: Decimal,
    steps: Vec<StrategyStep>,
) -> StrategyConfig {
    StrategyConfig {
        name: name.to_string(),
        description: Some(description.to_string()),
        is_aggressive: false,
        max_sequence,
        max_consecutive_losses,
        max_risk_exposure,
        profit_percentage: dec!(95),
        loss_recovery_percentage: dec!(100),
        anticipated_profit_percentage: dec!(95),
        strategy_steps: steps,
    }
}

fn tick_step(contract_type: ContractType, barrier: Option<Barrier>) -> StrategyStep {
    let step = StrategyStep::new(contract_type, DEFAULT_SYMBOL, Decimal::ONE)
        .with_duration(1, DurationUnit::Ticks);
    match barrier {
        Some(barrier) => step.with_barrier(barrier),
        None => step,
    }
}

/// The stock strategies shipped with the engine
pub fn builtin_strategies() -> Result<Vec<StrategyConfig>, StrategyError> {
    let two = Digit::new(2).map_err(|e| StrategyError::InvalidStrategyDefinition(e.to_string()))?;
    let seven = Digit::new(7).map_err(|e| StrategyError::InvalidStrategyDefinition(e.to_string()))?;

    Ok(vec![
        strategy(
            EVEN_RECOVERY,
            "Even digit with compounding recovery",
            6,
            5,
            dec!(40),
            vec![tick_step(ContractType::DigitEven, Some(Barrier::Even))],
        ),
        strategy(
            PARITY_SWITCH,
            "Even first, then odd for every recovery step",
            6,
            5,
            dec!(40),
            vec![
                tick_step(ContractType::DigitEven, Some(Barrier::Even)),
                tick_step(ContractType::DigitOdd, Some(Barrier::Odd)),
            ],
        ),
        strategy(
            OVER_UNDER_RECOVERY,
            "Low-risk over 2, recovering on under 7",
            5,
            4,
            dec!(30),
            vec![
                tick_step(ContractType::DigitOver(Some(two)), None),
                tick_step(ContractType::DigitUnder(Some(seven)), None),
            ],
        ),
        strategy(
            DIFFERS_STEADY,
            "Digit differs with a random barrier",
            4,
            3,
            dec!(25),
            vec![tick_step(ContractType::DigitDiff, None)],
        ),
    ])
}

/// Catalogue holding every built-in strategy
pub fn builtin_catalog() -> Result<StrategyCatalog, StrategyError> {
    StrategyCatalog::new(builtin_strategies()?)
}
