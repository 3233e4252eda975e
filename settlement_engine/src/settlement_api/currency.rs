//! Converts canonical-currency amounts into the currency the buyer is charged in.
//!
//! Amounts are converted in integer minor units with round-half-up. Because each sub-order is rounded on its own, the
//! per-order amounts may not add up to the converted checkout total. The buyer is charged the converted total, and the
//! difference is assigned to the marketplace. It is never spread over the sellers.
use log::*;
use mkt_common::{div_round_half_up, Money, DEFAULT_CURRENCY_CODE};
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{ExchangeRate, RATE_SCALE},
    settlement_api::errors::NormalizerError,
    traits::ExchangeRates,
};

/// Currencies with more minor-unit digits than this are not supported.
const MAX_DECIMALS: i64 = 8;

/// How a checkout's charge is split across its sub-orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeAllocation {
    pub currency: String,
    /// The amount the buyer is charged: the checkout subtotal, converted once.
    pub total: Money,
    /// Each sub-order's subtotal, converted separately. Same order as the input.
    pub per_order: Vec<Money>,
    /// `total - Σ per_order`
    pub rounding_adjustment: Money,
}

pub struct CurrencyNormalizer<B> {
    db: B,
    canonical: String,
    canonical_decimals: u32,
}

impl<B> CurrencyNormalizer<B> {
    pub fn new<S: Into<String>>(db: B, canonical: S) -> Self {
        Self { db, canonical: canonical.into(), canonical_decimals: 2 }
    }

    pub fn canonical_currency(&self) -> &str {
        &self.canonical
    }
}

impl<B: Clone> Clone for CurrencyNormalizer<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), canonical: self.canonical.clone(), canonical_decimals: self.canonical_decimals }
    }
}

impl<B> CurrencyNormalizer<B>
where B: ExchangeRates
{
    pub fn with_default_currency(db: B) -> Self {
        Self::new(db, DEFAULT_CURRENCY_CODE)
    }

    /// Converts `subtotal` (canonical minor units) into minor units of `target`.
    pub async fn to_charge(&self, subtotal: Money, target: &str) -> Result<Money, NormalizerError> {
        let rate = self.rate_for(target).await?;
        convert(subtotal, &rate, self.canonical_decimals)
    }

    /// Converts the checkout total once, and each sub-order subtotal separately.
    pub async fn allocate(&self, subtotals: &[Money], target: &str) -> Result<ChargeAllocation, NormalizerError> {
        let rate = self.rate_for(target).await?;
        let total = convert(subtotals.iter().sum(), &rate, self.canonical_decimals)?;
        let per_order = subtotals.iter().map(|s| convert(*s, &rate, self.canonical_decimals)).collect::<Result<Vec<_>, _>>()?;
        let rounding_adjustment = total - per_order.iter().sum();
        if !rounding_adjustment.is_zero() {
            debug!("💱️ Converting to {target} leaves {rounding_adjustment} of rounding drift for the marketplace");
        }
        Ok(ChargeAllocation { currency: rate.currency, total, per_order, rounding_adjustment })
    }

    async fn rate_for(&self, target: &str) -> Result<ExchangeRate, NormalizerError> {
        if target.eq_ignore_ascii_case(&self.canonical) {
            return Ok(ExchangeRate::new(self.canonical.clone(), RATE_SCALE, i64::from(self.canonical_decimals)));
        }
        let rate = self.db.fetch_last_rate(target).await?;
        trace!("💱️ Using exchange rate {rate}");
        Ok(rate)
    }
}

/// `amount × rate / RATE_SCALE`, rescaled from the canonical number of decimals to the target's.
pub fn convert(amount: Money, rate: &ExchangeRate, canonical_decimals: u32) -> Result<Money, NormalizerError> {
    if rate.rate <= 0 || !(0..=MAX_DECIMALS).contains(&rate.decimals) {
        return Err(NormalizerError::InvalidRate(rate.currency.clone()));
    }
    let overflow = || NormalizerError::Overflow { amount, currency: rate.currency.clone() };
    // decimals was range-checked above
    let target_scale = 10i128.pow(rate.decimals as u32);
    let canonical_scale = 10i128.checked_pow(canonical_decimals).ok_or_else(overflow)?;
    let numerator = i128::from(amount.value())
        .checked_mul(i128::from(rate.rate))
        .and_then(|v| v.checked_mul(target_scale))
        .ok_or_else(overflow)?;
    let denominator = i128::from(RATE_SCALE).checked_mul(canonical_scale).ok_or_else(overflow)?;
    Money::try_from(div_round_half_up(numerator, denominator)).map_err(|_| overflow())
}
