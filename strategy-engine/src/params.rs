//! Concrete trade parameters from compiled steps or bare contract types

use crate::barrier::default_barrier_with;
use crate::compiler::CompiledStep;
use common::{ContractType, Decimal, NextTradeParams, TradeDefaults};

/// Builds [`NextTradeParams`], filling gaps from session defaults
#[derive(Debug, Clone)]
pub struct ContractParamsFactory {
    defaults: TradeDefaults,
    rng: fastrand::Rng,
}

impl ContractParamsFactory {
    pub fn new(defaults: TradeDefaults) -> Self {
        Self {
            defaults,
            rng: fastrand::Rng::new(),
        }
    }

    /// Deterministic random-digit barriers, for replays and tests
    pub fn with_seed(defaults: TradeDefaults, seed: u64) -> Self {
        Self {
            defaults,
            rng: fastrand::Rng::with_seed(seed),
        }
    }

    pub fn defaults(&self) -> &TradeDefaults {
        &self.defaults
    }

    /// Order for a compiled ladder step at `amount`
    pub fn for_step(&mut self, step: &CompiledStep, amount: Decimal) -> NextTradeParams {
        let template = &step.template;
        let barrier = match template.barrier {
            Some(barrier) => Some(barrier),
            None => default_barrier_with(template.contract_type, &mut self.rng),
        };

        NextTradeParams {
            basis: template.basis.unwrap_or(self.defaults.basis),
            symbol: template
                .symbol
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| self.defaults.symbol.clone()),
            amount,
            barrier,
            currency: template
                .currency
                .clone()
                .unwrap_or_else(|| self.defaults.currency.clone()),
            contract_type: template.contract_type,
            contract_duration_value: template
                .contract_duration_value
                .unwrap_or(self.defaults.contract_duration_value),
            contract_duration_units: template
                .contract_duration_units
                .unwrap_or(self.defaults.contract_duration_units),
            metadata: None,
        }
    }

    /// Order on `contract_type` with session defaults and its default barrier
    pub fn for_contract(
        &mut self,
        contract_type: ContractType,
        amount: Decimal,
    ) -> NextTradeParams {
        NextTradeParams {
            basis: self.defaults.basis,
            symbol: self.defaults.symbol.clone(),
            amount,
            barrier: default_barrier_with(contract_type, &mut self.rng),
            currency: self.defaults.currency.clone(),
            contract_type,
            contract_duration_value: self.defaults.contract_duration_value,
            contract_duration_units: self.defaults.contract_duration_units,
            metadata: None,
        }
    }

    /// Order on the session's default contract type
    pub fn base_trade(&mut self, amount: Decimal) -> NextTradeParams {
        let contract_type = self.defaults.contract_type;
        self.for_contract(contract_type, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::StrategyCompiler;
    use crate::definition::{StrategyConfig, StrategyStep};
    use crate::reward::RewardTable;
    use common::{Barrier, Basis, DurationUnit};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn compiled_step(step: StrategyStep) -> CompiledStep {
        let config = StrategyConfig {
            name: "single".to_string(),
            description: None,
            is_aggressive: false,
            max_sequence: 1,
            max_consecutive_losses: 3,
            max_risk_exposure: dec!(10),
            profit_percentage: dec!(95),
            loss_recovery_percentage: dec!(100),
            anticipated_profit_percentage: dec!(95),
            strategy_steps: vec![step],
        };
        let compiler = StrategyCompiler::new(Arc::new(RewardTable::standard().unwrap()));
        compiler.compile(&config, dec!(1)).unwrap().steps()[0].clone()
    }

    #[test]
    fn test_step_fields_fall_back_to_defaults() {
        let step = compiled_step(StrategyStep::new(ContractType::DigitOdd, "R_50", dec!(1)));
        let mut factory = ContractParamsFactory::new(TradeDefaults::default());
        let params = factory.for_step(&step, dec!(1));

        assert_eq!(params.symbol, "R_50");
        assert_eq!(params.currency, "USD");
        assert_eq!(params.basis, Basis::Stake);
        assert_eq!(params.barrier, Some(Barrier::Odd));
        assert_eq!(params.contract_duration_value, 1);
        assert_eq!(params.contract_duration_units, DurationUnit::Ticks);
    }

    #[test]
    fn test_step_fields_override_defaults() {
        let mut template = StrategyStep::new(ContractType::Call, "frxEURUSD", dec!(1))
            .with_duration(5, DurationUnit::Minutes);
        template.currency = Some("EUR".to_string());
        let step = compiled_step(template);

        let mut factory = ContractParamsFactory::new(TradeDefaults::default());
        let params = factory.for_step(&step, dec!(3));

        assert_eq!(params.amount, dec!(3));
        assert_eq!(params.currency, "EUR");
        assert_eq!(params.barrier, None);
        assert_eq!(params.contract_duration_units, DurationUnit::Minutes);
    }

    #[test]
    fn test_base_trade_uses_default_contract() {
        let mut factory = ContractParamsFactory::with_seed(TradeDefaults::default(), 1);
        let params = factory.base_trade(dec!(0.35));
        assert_eq!(params.contract_type, ContractType::DigitEven);
        assert_eq!(params.barrier, Some(Barrier::Even));
        assert!(params.metadata.is_none());
    }

    #[test]
    fn test_differs_barrier_is_seeded() {
        let defaults = TradeDefaults::default();
        let a = ContractParamsFactory::with_seed(defaults.clone(), 9)
            .for_contract(ContractType::DigitDiff, dec!(1));
        let b = ContractParamsFactory::with_seed(defaults, 9)
            .for_contract(ContractType::DigitDiff, dec!(1));
        assert_eq!(a.barrier, b.barrier);
        assert!(matches!(a.barrier, Some(Barrier::Digit(_))));
    }
}
