//! Detection of loss bursts inside a sliding time window
//!
//! Every trigger starts a cooldown of
//! `initial × multiplier^(triggers - 1)`, capped at the configured maximum.
//! The trigger counter survives cooldown expiry so repeat bursts are
//! penalised harder.

use crate::config::RapidLossConfig;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tracing::{info, warn};

/// A loss remembered by the detector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossEvent {
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
}

/// Snapshot of the detector's memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RapidLossState {
    pub events: VecDeque<LossEvent>,
    pub cooldown_until: Option<DateTime<Utc>>,
    pub trigger_count: u32,
}

#[derive(Debug, Clone)]
pub struct RapidLossDetector {
    config: RapidLossConfig,
    threshold: Decimal,
    state: RapidLossState,
}

impl RapidLossDetector {
    pub fn new(config: RapidLossConfig, base_stake: Decimal) -> Self {
        let threshold = base_stake * config.min_stake_multiplier;
        Self {
            config,
            threshold,
            state: RapidLossState::default(),
        }
    }

    pub fn state(&self) -> &RapidLossState {
        &self.state
    }

    pub fn trigger_count(&self) -> u32 {
        self.state.trigger_count
    }

    pub fn cooldown_until(&self) -> Option<DateTime<Utc>> {
        self.state.cooldown_until
    }

    /// Remember a loss; returns whether it was large enough to count
    pub fn record_loss(&mut self, amount: Decimal, at: DateTime<Utc>) -> bool {
        if !self.config.enabled || amount < self.threshold {
            return false;
        }

        self.state.events.push_back(LossEvent { timestamp: at, amount });
        while self.state.events.len() > self.config.max_tracked_losses.max(1) {
            self.state.events.pop_front();
        }
        true
    }

    /// Whether trading must pause at `now`.
    ///
    /// Purges events outside the window, starts a new cooldown when enough
    /// qualifying losses remain, and clears an expired cooldown.
    pub fn check_at(&mut self, now: DateTime<Utc>) -> bool {
        if !self.config.enabled {
            return false;
        }

        if let Some(until) = self.state.cooldown_until {
            if now < until {
                return true;
            }
            self.state.cooldown_until = None;
            info!(
                triggers = self.state.trigger_count,
                "Rapid-loss cooldown expired"
            );
        }

        let cutoff = now - Duration::milliseconds(self.config.time_window_ms);
        self.state.events.retain(|event| event.timestamp >= cutoff);

        if self.state.events.len() < self.config.max_losses.max(1) {
            return false;
        }

        self.state.trigger_count += 1;
        let cooldown = self.cooldown_for(self.state.trigger_count);
        self.state.cooldown_until = Some(now + cooldown);

        warn!(
            losses = self.state.events.len(),
            window_ms = self.config.time_window_ms,
            triggers = self.state.trigger_count,
            cooldown_ms = cooldown.num_milliseconds(),
            "Rapid losses detected - cooling down"
        );

        self.state.events.clear();
        true
    }

    pub fn check(&mut self) -> bool {
        self.check_at(Utc::now())
    }

    /// Cooldown length for the `trigger`-th trigger (1-based)
    pub fn cooldown_for(&self, trigger: u32) -> Duration {
        let max = self.config.max_cooldown_ms.max(0);
        let mut ms = self.config.initial_cooldown_ms.max(0);
        for _ in 1..trigger {
            if ms >= max {
                break;
            }
            ms = ms.saturating_mul(i64::from(self.config.cooldown_multiplier));
        }
        Duration::milliseconds(ms.min(max))
    }

    /// Forget events and any running cooldown; the trigger count stays
    pub fn clear(&mut self) {
        self.state.events.clear();
        self.state.cooldown_until = None;
    }
}
