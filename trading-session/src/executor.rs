// Contract execution
// The venue boundary plus a paper simulator that settles on a random last digit

use anyhow::{anyhow, bail, Result};
use chrono::Utc;
use common::{round_money, Barrier, ContractType, Decimal, NextTradeParams, TradeReport};
use std::sync::{Arc, Mutex};
use strategy_engine::RewardTable;
use tracing::debug;

/// Places one contract and waits for its settlement
#[async_trait::async_trait]
pub trait ContractExecutor: Send + Sync {
    async fn execute(&self, params: &NextTradeParams) -> Result<TradeReport>;

    /// Current account balance
    async fn balance(&self) -> Result<Decimal>;
}

/// Paper trading configuration
#[derive(Debug, Clone)]
pub struct PaperExecutorConfig {
    pub initial_balance: Decimal,
    /// Seed for reproducible settlements
    pub seed: Option<u64>,
}

impl Default for PaperExecutorConfig {
    fn default() -> Self {
        Self {
            initial_balance: Decimal::from(1000),
            seed: None,
        }
    }
}

#[derive(Debug)]
struct PaperBook {
    balance: Decimal,
    rng: fastrand::Rng,
    sequence: u64,
}

/// Simulated venue paying out from the reward table
#[derive(Debug, Clone)]
pub struct PaperExecutor {
    rewards: Arc<RewardTable>,
    book: Arc<Mutex<PaperBook>>,
}

impl PaperExecutor {
    pub fn new(config: PaperExecutorConfig, rewards: Arc<RewardTable>) -> Self {
        let rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };

        Self {
            rewards,
            book: Arc::new(Mutex::new(PaperBook {
                balance: config.initial_balance,
                rng,
                sequence: 0,
            })),
        }
    }

    fn settle(&self, params: &NextTradeParams) -> Result<TradeReport> {
        let stake = params.amount;
        if stake <= Decimal::ZERO {
            bail!("stake must be positive, got {}", stake);
        }

        let payout_type = match (params.contract_type, params.barrier) {
            (ContractType::DigitOver(None), Some(Barrier::Digit(d))) => {
                ContractType::DigitOver(Some(d))
            }
            (ContractType::DigitUnder(None), Some(Barrier::Digit(d))) => {
                ContractType::DigitUnder(Some(d))
            }
            (contract_type, _) => contract_type,
        };
        let percentage = self.rewards.percentage_for(payout_type, stake)?;

        let mut book = self
            .book
            .lock()
            .map_err(|_| anyhow!("paper book lock poisoned"))?;

        if book.balance < stake {
            bail!("insufficient balance {} for stake {}", book.balance, stake);
        }

        book.sequence += 1;
        let digit = book.rng.u8(0..=9);
        let won = wins(params.contract_type, params.barrier, digit, &mut book.rng);

        let profit = if won {
            round_money(stake * percentage / Decimal::ONE_HUNDRED)
        } else {
            -stake
        };
        book.balance = round_money(book.balance + profit);

        debug!(
            contract_type = %params.contract_type,
            digit,
            won,
            profit = %profit,
            balance = %book.balance,
            "Paper contract settled"
        );

        let contract_id = format!("paper-{}", book.sequence);
        let report = if won {
            TradeReport::win(contract_id, stake, profit, book.balance)
        } else {
            TradeReport::loss(contract_id, stake, book.balance)
        };
        Ok(report.at(Utc::now()))
    }
}

#[async_trait::async_trait]
impl ContractExecutor for PaperExecutor {
    async fn execute(&self, params: &NextTradeParams) -> Result<TradeReport> {
        self.settle(params)
    }

    async fn balance(&self) -> Result<Decimal> {
        let book = self
            .book
            .lock()
            .map_err(|_| anyhow!("paper book lock poisoned"))?;
        Ok(book.balance)
    }
}

/// Whether a contract wins when the last tick ends on `digit`
fn wins(
    contract_type: ContractType,
    barrier: Option<Barrier>,
    digit: u8,
    rng: &mut fastrand::Rng,
) -> bool {
    let target = match barrier {
        Some(Barrier::Digit(d)) => Some(d.value()),
        _ => contract_type.resolved().digit().map(|d| d.value()),
    };

    match contract_type {
        ContractType::DigitEven => digit % 2 == 0,
        ContractType::DigitOdd => digit % 2 == 1,
        ContractType::DigitDiff => target.map_or(true, |t| digit != t),
        ContractType::DigitOver(_) => target.map_or(false, |t| digit > t),
        ContractType::DigitUnder(_) => target.map_or(false, |t| digit < t),
        ContractType::Call | ContractType::Put => rng.bool(),
    }
}
