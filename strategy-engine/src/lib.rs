//! Strategy Engine
//!
//! Reward model, barrier defaults, strategy documents and the compiler
//! that turns a strategy into a concrete recovery ladder.

mod barrier;
mod compiler;
mod definition;
mod params;
mod presets;
mod reward;

pub use barrier::{barrier_matches, default_barrier, default_barrier_with};
pub use compiler::{CompiledStep, CompiledStepTable, StrategyCompiler};
pub use definition::{StrategyCatalog, StrategyConfig, StrategyStep};
pub use params::ContractParamsFactory;
pub use presets::{
    builtin_catalog, builtin_strategies, DIFFERS_STEADY, EVEN_RECOVERY, OVER_UNDER_RECOVERY,
    PARITY_SWITCH,
};
pub use reward::{validate_tiers, RewardError, RewardTable, RewardTier};

use thiserror::Error;

/// Errors raised while loading or compiling strategies
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("invalid strategy definition: {0}")]
    InvalidStrategyDefinition(String),

    #[error("unknown strategy `{0}`")]
    UnknownStrategy(String),

    #[error(transparent)]
    Reward(#[from] RewardError),
}
