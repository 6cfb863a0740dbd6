//! Pure quote arithmetic.
//!
//! Amounts and rates are reported to 6 decimal places, fee and impact
//! percentages to 2, rounding half away from zero.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use time::OffsetDateTime;

use crate::price::QuoteOracle;

pub const AMOUNT_DECIMALS: u32 = 6;
pub const PERCENT_DECIMALS: u32 = 2;

/// Result of one calculation pass. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub source_amount: Decimal,
    pub dest_amount: Decimal,
    /// Destination units received per source unit.
    pub rate: Decimal,
    pub price_impact_percent: Decimal,
    pub bridge_fee_percent: Decimal,
    #[serde(with = "time::serde::rfc3339")]
    pub quoted_at: OffsetDateTime,
}

impl Quote {
    /// `1 ATOM = 22.368421 OSMO`
    pub fn rate_label(&self, from_symbol: &str, to_symbol: &str) -> String {
        format!("1 {from_symbol} = {} {to_symbol}", self.rate)
    }
}

/// Exchange rate `price(from) / price(to)`; `None` when either price is missing.
pub fn compute_rate(oracle: &dyn QuoteOracle, from_symbol: &str, to_symbol: &str) -> Option<Decimal> {
    let from_price = oracle.price(from_symbol)?;
    let to_price = oracle.price(to_symbol)?;
    from_price
        .checked_div(to_price)
        .map(|rate| round(rate, AMOUNT_DECIMALS))
}

/// Bridge fee percent: zero for same-chain pairs, an oracle draw otherwise.
pub fn compute_bridge_fee(oracle: &dyn QuoteOracle, from_chain_id: u32, to_chain_id: u32) -> Decimal {
    if from_chain_id == to_chain_id {
        return round(Decimal::ZERO, PERCENT_DECIMALS);
    }
    round(oracle.cross_chain_fee(), PERCENT_DECIMALS)
}

/// Price impact percent for a refreshed quote. Independent of trade size.
pub fn compute_price_impact(oracle: &dyn QuoteOracle) -> Decimal {
    round(oracle.price_impact(), PERCENT_DECIMALS)
}

/// `source × from_price × (1 − fee/100) / to_price`
pub fn derive_dest_amount(
    source_amount: Decimal,
    from_price: Decimal,
    to_price: Decimal,
    bridge_fee_percent: Decimal,
) -> Option<Decimal> {
    let multiplier = Decimal::ONE - bridge_fee_percent / Decimal::ONE_HUNDRED;
    source_amount
        .checked_mul(from_price)?
        .checked_mul(multiplier)?
        .checked_div(to_price)
        .map(|amount| round(amount, AMOUNT_DECIMALS))
}

/// `dest × to_price × (1 + fee/100) / from_price`
///
/// Not the exact inverse of [`derive_dest_amount`]; callers observe the
/// `(1 + fee)` form.
pub fn derive_source_amount(
    dest_amount: Decimal,
    from_price: Decimal,
    to_price: Decimal,
    bridge_fee_percent: Decimal,
) -> Option<Decimal> {
    let multiplier = Decimal::ONE + bridge_fee_percent / Decimal::ONE_HUNDRED;
    dest_amount
        .checked_mul(to_price)?
        .checked_mul(multiplier)?
        .checked_div(from_price)
        .map(|amount| round(amount, AMOUNT_DECIMALS))
}

/// Parse a user-entered amount. Blank, non-numeric and negative input yield `None`.
pub fn parse_amount(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let value = Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .ok()?;
    if value.is_sign_negative() {
        return None;
    }
    Some(value)
}

/// Impact strictly above 0.3 % is flagged as a warning.
pub fn is_high_price_impact(percent: Decimal) -> bool {
    percent > Decimal::new(3, 1)
}

pub fn format_amount(value: Decimal) -> String {
    round(value, AMOUNT_DECIMALS).to_string()
}

pub fn format_percent(value: Decimal) -> String {
    round(value, PERCENT_DECIMALS).to_string()
}

/// Round half away from zero and pin the scale so `Display` shows exactly `dp` digits.
pub(crate) fn round(value: Decimal, dp: u32) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(dp);
    rounded
}
