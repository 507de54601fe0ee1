//! Price level ledger and the matching algorithm.
//!
//! The book is level-2 only: each side maps price ticks to the aggregated
//! resting quantity at that price. Individual orders merged into a level
//! are indistinguishable afterwards, so matching is price-priority only;
//! there is no per-order FIFO inside a level to preserve.
//!
//! Nothing in here is synchronized. Exclusive access is structural: the
//! book is owned by the engine and only ever mutated from its run loop.

use crate::protocol::{format_price, Order, Side};
use std::collections::BTreeMap;
use std::fmt;

/// Aggregated resting quantity at one price on one side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    pub price: u64,
    pub quantity: u64,
}

/// One fill produced while matching an incoming order: `quantity` was
/// consumed from the opposite side at the resting level's `price`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fill {
    pub price: u64,
    pub quantity: u64,
}

/// Two independent sorted sides: bids best-first from the highest price,
/// asks best-first from the lowest.
#[derive(Debug, Clone, Default)]
pub struct OrderBook {
    bids: BTreeMap<u64, u64>,
    asks: BTreeMap<u64, u64>,
}

impl OrderBook {
    pub fn new() -> Self {
        OrderBook::default()
    }

    fn levels(&self, side: Side) -> &BTreeMap<u64, u64> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn levels_mut(&mut self, side: Side) -> &mut BTreeMap<u64, u64> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    /// Top-of-book level for a side: highest bid, lowest ask.
    pub fn best(&self, side: Side) -> Option<PriceLevel> {
        let levels = self.levels(side);
        let (&price, &quantity) = match side {
            Side::Buy => levels.iter().next_back()?,
            Side::Sell => levels.iter().next()?,
        };
        Some(PriceLevel { price, quantity })
    }

    /// Adds `qty` to the level at `price`, creating it if absent.
    /// Aggregation saturates at `u64::MAX` instead of wrapping; wire
    /// quantities are capped at parse time, so the bound is unreachable
    /// through the protocol.
    pub fn increase(&mut self, side: Side, price: u64, qty: u64) {
        debug_assert!(qty > 0, "increase by zero");
        let level = self.levels_mut(side).entry(price).or_insert(0);
        *level = level.saturating_add(qty);
    }

    /// Subtracts `qty` from the level at `price`. The caller never asks for
    /// more than is resident (the matching loop fills with `min`); a level
    /// reaching zero is removed, never kept as an empty entry.
    pub fn decrease(&mut self, side: Side, price: u64, qty: u64) {
        let levels = self.levels_mut(side);
        let Some(resident) = levels.get_mut(&price) else {
            debug_assert!(false, "decrease on absent level {price}");
            return;
        };
        debug_assert!(qty <= *resident, "decrease below zero at {price}");
        *resident = resident.saturating_sub(qty);
        if *resident == 0 {
            levels.remove(&price);
        }
    }

    /// Applies one incoming order: consumes marketable liquidity from the
    /// opposite side best-level first, then rests any remainder at the
    /// order's own price. Returns the fills in execution order.
    ///
    /// Fills execute at the resting level's price, not the incoming price.
    pub fn apply(&mut self, order: Order) -> Vec<Fill> {
        let mut fills = Vec::new();
        let mut remaining = order.quantity;
        let opposite = order.side.opposite();

        while remaining > 0 {
            let Some(best) = self.best(opposite) else {
                break;
            };
            let marketable = match order.side {
                Side::Buy => order.price >= best.price,
                Side::Sell => order.price <= best.price,
            };
            if !marketable {
                break;
            }
            let fill = remaining.min(best.quantity);
            self.decrease(opposite, best.price, fill);
            remaining -= fill;
            fills.push(Fill {
                price: best.price,
                quantity: fill,
            });
        }

        if remaining > 0 {
            self.increase(order.side, order.price, remaining);
        }
        fills
    }

    /// Number of distinct price levels on a side.
    pub fn depth(&self, side: Side) -> usize {
        self.levels(side).len()
    }

    /// Total resting quantity across all levels of a side.
    pub fn total_quantity(&self, side: Side) -> u64 {
        self.levels(side).values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

impl fmt::Display for OrderBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.best(Side::Buy) {
            Some(l) => write!(f, "bid {} x {}", format_price(l.price), l.quantity)?,
            None => write!(f, "bid -")?,
        }
        write!(f, " / ")?;
        match self.best(Side::Sell) {
            Some(l) => write!(f, "ask {} x {}", format_price(l.price), l.quantity),
            None => write!(f, "ask -"),
        }
    }
}
