//! Revenue/payout split of a gross amount.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

use super::error::LedgerError;

/// Gross amount divided into the platform's and the professional's shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RevenueSplit {
    /// Amount collected.
    pub gross: Decimal,
    /// Platform share.
    pub revenue: Decimal,
    /// Professional share.
    pub payout: Decimal,
}

impl RevenueSplit {
    /// Splits `gross` at `payout_rate`.
    ///
    /// The payout share uses Banker's Rounding to 2 decimal places and the
    /// revenue share is the remainder, so `revenue + payout == gross`.
    pub fn compute(gross: Decimal, payout_rate: Decimal) -> Result<Self, LedgerError> {
        if gross < Decimal::ZERO {
            return Err(LedgerError::NegativeAmount);
        }
        if gross.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        if payout_rate < Decimal::ZERO || payout_rate > Decimal::ONE {
            return Err(LedgerError::InvalidPayoutRate(payout_rate));
        }

        let payout = (gross * payout_rate)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven);

        Ok(Self {
            gross,
            revenue: gross - payout,
            payout,
        })
    }
}
