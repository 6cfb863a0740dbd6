use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::debug;

use crate::chain::Chain;
use crate::price::QuoteOracle;
use crate::quote::{self, Quote};
use crate::token::Token;

/// One side of the swap form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Side {
    From,
    To,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::From => Side::To,
            Side::To => Side::From,
        }
    }
}

/// Which amount drives a recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    /// The source amount was edited; derive the destination amount.
    FromTo,
    /// The destination amount was edited; derive the source amount.
    ToFrom,
}

impl Direction {
    /// The side a user types into to produce this direction.
    pub fn edited_side(self) -> Side {
        match self {
            Direction::FromTo => Side::From,
            Direction::ToFrom => Side::To,
        }
    }

    fn reversed(self) -> Self {
        match self {
            Direction::FromTo => Direction::ToFrom,
            Direction::ToFrom => Direction::FromTo,
        }
    }
}

impl From<Side> for Direction {
    fn from(side: Side) -> Self {
        match side {
            Side::From => Direction::FromTo,
            Side::To => Direction::ToFrom,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum QuoteStatus {
    Idle,
    Computing,
}

/// Chain, token and amount text for one side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Leg {
    pub chain: Option<Chain>,
    pub token: Option<Token>,
    pub amount: String,
}

/// A scheduled recompute. Only the request holding the current ticket may resolve.
#[derive(Debug, Clone, PartialEq)]
pub struct RecomputeRequest {
    pub ticket: u64,
    pub direction: Direction,
    pub amount: Decimal,
}

/// Bidirectional quote state for the swap form.
///
/// Pricing inputs (chains and tokens) refresh the rate and bridge fee
/// immediately. Amount edits produce a [`RecomputeRequest`] that the caller
/// resolves after its debounce delay; a newer request invalidates any
/// older one, so at most one recompute is ever pending.
pub struct QuoteEngine {
    oracle: Arc<dyn QuoteOracle>,
    from: Leg,
    to: Leg,
    editing: Direction,
    rate: Option<Decimal>,
    bridge_fee: Decimal,
    price_impact: Decimal,
    pending: Option<RecomputeRequest>,
    next_ticket: u64,
    recomputes: u64,
}

impl QuoteEngine {
    pub fn new(oracle: Arc<dyn QuoteOracle>) -> Self {
        Self {
            oracle,
            from: Leg::default(),
            to: Leg::default(),
            editing: Direction::FromTo,
            rate: None,
            bridge_fee: quote::round(Decimal::ZERO, quote::PERCENT_DECIMALS),
            price_impact: quote::round(Decimal::ZERO, quote::PERCENT_DECIMALS),
            pending: None,
            next_ticket: 1,
            recomputes: 0,
        }
    }

    pub fn leg(&self, side: Side) -> &Leg {
        match side {
            Side::From => &self.from,
            Side::To => &self.to,
        }
    }

    fn leg_mut(&mut self, side: Side) -> &mut Leg {
        match side {
            Side::From => &mut self.from,
            Side::To => &mut self.to,
        }
    }

    pub fn rate(&self) -> Option<Decimal> {
        self.rate
    }

    pub fn bridge_fee(&self) -> Decimal {
        self.bridge_fee
    }

    pub fn price_impact(&self) -> Decimal {
        self.price_impact
    }

    pub fn editing(&self) -> Direction {
        self.editing
    }

    pub fn pending(&self) -> Option<&RecomputeRequest> {
        self.pending.as_ref()
    }

    pub fn status(&self) -> QuoteStatus {
        if self.pending.is_some() {
            QuoteStatus::Computing
        } else {
            QuoteStatus::Idle
        }
    }

    /// Number of recomputes that resolved and wrote an amount.
    pub fn recomputes(&self) -> u64 {
        self.recomputes
    }

    pub fn is_cross_chain(&self) -> bool {
        match (&self.from.chain, &self.to.chain) {
            (Some(from), Some(to)) => from.id != to.id,
            _ => false,
        }
    }

    /// Change a side's chain. Returns a follow-up recompute when the edited
    /// amount is still valid.
    pub fn set_chain(&mut self, side: Side, chain: Chain) -> Option<RecomputeRequest> {
        self.leg_mut(side).chain = Some(chain);
        self.pricing_changed()
    }

    /// Change a side's token. Returns a follow-up recompute when the edited
    /// amount is still valid.
    pub fn set_token(&mut self, side: Side, token: Option<Token>) -> Option<RecomputeRequest> {
        self.leg_mut(side).token = token;
        self.pricing_changed()
    }

    /// Record a keystroke in one amount field.
    ///
    /// Any pending recompute is superseded. Blank or non-numeric input, or a
    /// form without both tokens, clears the opposite amount and schedules
    /// nothing.
    pub fn edit_amount(&mut self, side: Side, text: &str) -> Option<RecomputeRequest> {
        self.leg_mut(side).amount = text.to_string();
        self.editing = Direction::from(side);
        self.schedule()
    }

    /// Apply a recompute whose delay elapsed. Stale tickets are ignored.
    pub fn resolve(&mut self, ticket: u64) -> Option<Quote> {
        match &self.pending {
            Some(request) if request.ticket == ticket => {}
            _ => {
                debug!(ticket, "ignoring superseded recompute");
                return None;
            }
        }
        let request = self.pending.take()?;
        let derived_side = request.direction.edited_side().opposite();

        let Some((from_price, to_price)) = self.prices() else {
            self.leg_mut(derived_side).amount.clear();
            return None;
        };

        let derived = match request.direction {
            Direction::FromTo => {
                quote::derive_dest_amount(request.amount, from_price, to_price, self.bridge_fee)
            }
            Direction::ToFrom => {
                quote::derive_source_amount(request.amount, from_price, to_price, self.bridge_fee)
            }
        };

        match derived {
            Some(amount) => {
                self.leg_mut(derived_side).amount = quote::format_amount(amount);
                self.price_impact = quote::compute_price_impact(self.oracle.as_ref());
                self.recomputes += 1;
                debug!(ticket, direction = ?request.direction, %amount, "recompute resolved");
                self.quote()
            }
            None => {
                self.leg_mut(derived_side).amount.clear();
                None
            }
        }
    }

    /// Drop any pending recompute.
    pub fn cancel_pending(&mut self) {
        if let Some(request) = self.pending.take() {
            debug!(ticket = request.ticket, "recompute cancelled");
        }
    }

    /// Swap chains, tokens and amounts between the two sides in one step.
    ///
    /// A recompute that was still pending is rescheduled in the flipped
    /// direction, so the typed amount keeps driving its counterpart.
    pub fn invert(&mut self) -> Option<RecomputeRequest> {
        let was_pending = self.pending.is_some();
        self.cancel_pending();
        std::mem::swap(&mut self.from, &mut self.to);
        self.editing = self.editing.reversed();
        self.refresh_pricing();
        if was_pending {
            self.schedule()
        } else {
            None
        }
    }

    /// Clear both amount fields.
    pub fn clear_amounts(&mut self) {
        self.cancel_pending();
        self.from.amount.clear();
        self.to.amount.clear();
    }

    /// Recompute rate and bridge fee from the current chains and tokens.
    pub fn refresh_pricing(&mut self) {
        self.rate = match (&self.from.token, &self.to.token) {
            (Some(from), Some(to)) => {
                quote::compute_rate(self.oracle.as_ref(), from.price_key(), to.price_key())
            }
            _ => None,
        };
        self.bridge_fee = match (&self.from.chain, &self.to.chain) {
            (Some(from), Some(to)) => quote::compute_bridge_fee(self.oracle.as_ref(), from.id, to.id),
            _ => quote::round(Decimal::ZERO, quote::PERCENT_DECIMALS),
        };
    }

    /// Snapshot of the current quote, if both tokens are priced and both amounts are set.
    pub fn quote(&self) -> Option<Quote> {
        let rate = self.rate?;
        let source_amount = quote::parse_amount(&self.from.amount)?;
        let dest_amount = quote::parse_amount(&self.to.amount)?;
        Some(Quote {
            source_amount,
            dest_amount,
            rate,
            price_impact_percent: self.price_impact,
            bridge_fee_percent: self.bridge_fee,
            quoted_at: OffsetDateTime::now_utc(),
        })
    }

    fn pricing_changed(&mut self) -> Option<RecomputeRequest> {
        self.refresh_pricing();
        let edited = self.editing.edited_side();
        if quote::parse_amount(&self.leg(edited).amount).is_some() {
            self.schedule()
        } else {
            None
        }
    }

    fn schedule(&mut self) -> Option<RecomputeRequest> {
        self.cancel_pending();
        let edited = self.editing.edited_side();
        let derived_side = edited.opposite();

        let amount = quote::parse_amount(&self.leg(edited).amount);
        let (Some(amount), true) = (amount, self.has_tokens()) else {
            self.leg_mut(derived_side).amount.clear();
            return None;
        };

        let request = RecomputeRequest {
            ticket: self.next_ticket,
            direction: self.editing,
            amount,
        };
        self.next_ticket += 1;
        debug!(ticket = request.ticket, direction = ?request.direction, "recompute scheduled");
        self.pending = Some(request.clone());
        Some(request)
    }

    fn has_tokens(&self) -> bool {
        self.from.token.is_some() && self.to.token.is_some()
    }

    fn prices(&self) -> Option<(Decimal, Decimal)> {
        let from = self.from.token.as_ref()?;
        let to = self.to.token.as_ref()?;
        Some((
            self.oracle.price(from.price_key())?,
            self.oracle.price(to.price_key())?,
        ))
    }
}
