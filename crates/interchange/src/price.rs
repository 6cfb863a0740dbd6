use std::collections::HashMap;

use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Symbol → price in the implicit reference currency.
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    prices: HashMap<String, Decimal>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock prices for the built-in catalog.
    pub fn builtin() -> Self {
        let mut table = Self::new();
        for (symbol, price) in [
            ("ATOM", Decimal::new(85, 1)),
            ("OSMO", Decimal::new(38, 2)),
            ("JUNO", Decimal::new(25, 2)),
            ("SCRT", Decimal::new(3, 1)),
            ("AKT", Decimal::new(12, 1)),
            ("STARS", Decimal::new(1, 2)),
            ("USDT", Decimal::ONE),
            ("USDC", Decimal::ONE),
            ("AXL", Decimal::new(5, 1)),
            ("NETA", Decimal::new(20, 0)),
        ] {
            table.insert(symbol, price);
        }
        table
    }

    /// Insert a price. Non-positive prices are treated as missing.
    pub fn insert(&mut self, symbol: &str, price: Decimal) {
        if price > Decimal::ZERO {
            self.prices.insert(symbol.to_string(), price);
        } else {
            self.prices.remove(symbol);
        }
    }

    pub fn get(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }
}

/// Source of the figures a quote is built from.
///
/// The runtime implementation is still a mock; the trait keeps the oracle
/// shape so a real price feed or fee schedule can be plugged in later.
pub trait QuoteOracle: Send + Sync {
    /// Price for a token symbol, `None` when unknown.
    fn price(&self, symbol: &str) -> Option<Decimal>;

    /// Bridge fee percent for a cross-chain quote. Only consulted when the
    /// chains differ; same-chain quotes never pay a fee.
    fn cross_chain_fee(&self) -> Decimal;

    /// Price impact percent reported alongside a recomputed amount.
    fn price_impact(&self) -> Decimal;
}

/// Static prices with random fee and impact draws on a hundredths grid.
#[derive(Debug, Clone)]
pub struct SimulatedOracle {
    prices: PriceTable,
    fee_min: Decimal,
    fee_max: Decimal,
    impact_max: Decimal,
}

impl SimulatedOracle {
    pub fn new(prices: PriceTable, fee_min: Decimal, fee_max: Decimal, impact_max: Decimal) -> Self {
        Self {
            prices,
            fee_min,
            fee_max,
            impact_max,
        }
    }

    fn draw(lo: Decimal, hi: Decimal) -> Decimal {
        let lo = hundredths(lo);
        let hi = hundredths(hi).max(lo);
        let n = rand::thread_rng().gen_range(lo..=hi);
        Decimal::new(n, 2)
    }
}

impl Default for SimulatedOracle {
    fn default() -> Self {
        Self::new(
            PriceTable::builtin(),
            Decimal::new(10, 2),
            Decimal::new(30, 2),
            Decimal::new(50, 2),
        )
    }
}

impl QuoteOracle for SimulatedOracle {
    fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol)
    }

    fn cross_chain_fee(&self) -> Decimal {
        Self::draw(self.fee_min, self.fee_max)
    }

    fn price_impact(&self) -> Decimal {
        Self::draw(Decimal::ZERO, self.impact_max)
    }
}

/// Deterministic oracle: fixed fee and impact.
#[derive(Debug, Clone)]
pub struct FixedOracle {
    prices: PriceTable,
    fee: Decimal,
    impact: Decimal,
}

impl FixedOracle {
    pub fn new(prices: PriceTable, fee: Decimal, impact: Decimal) -> Self {
        Self {
            prices,
            fee,
            impact,
        }
    }
}

impl QuoteOracle for FixedOracle {
    fn price(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol)
    }

    fn cross_chain_fee(&self) -> Decimal {
        self.fee
    }

    fn price_impact(&self) -> Decimal {
        self.impact
    }
}

fn hundredths(value: Decimal) -> i64 {
    (value * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .unwrap_or(0)
}
