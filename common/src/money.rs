//! Cent-precision helpers for stakes and payouts

use rust_decimal::{Decimal, RoundingStrategy};

/// Round a money amount to cents, midpoint away from zero
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `amount × percentage / 100`, unrounded
pub fn percent_of(amount: Decimal, percentage: Decimal) -> Decimal {
    amount * percentage / Decimal::ONE_HUNDRED
}

/// [`percent_of`] that returns `None` instead of overflowing
pub fn checked_percent_of(amount: Decimal, percentage: Decimal) -> Option<Decimal> {
    amount
        .checked_mul(percentage)
        .map(|product| product / Decimal::ONE_HUNDRED)
}
