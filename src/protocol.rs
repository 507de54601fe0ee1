//! Order model and the line-oriented text wire format.
//!
//! A request line is `<side> <price> <quantity>`, whitespace-separated:
//! - `<side>` is exactly `buy` or `sell` (case-sensitive)
//! - `<price>` is a positive decimal with at most four fractional digits
//! - `<quantity>` is a positive integer no larger than [`MAX_ORDER_QUANTITY`]
//!
//! Anything after the third field is ignored. Prices are normalized to
//! fixed-point ticks at this boundary so the book only ever compares
//! integers; a level inserted at some price is always re-found by later
//! lookups at the same price.

use std::fmt;
use thiserror::Error;

/// Number of price ticks per whole currency unit (four decimal places).
pub const PRICE_SCALE: u64 = 10_000;

/// Largest quantity a single order may carry. Keeps aggregated level
/// counters far away from `u64::MAX` no matter what a peer sends.
pub const MAX_ORDER_QUANTITY: u64 = 1_000_000_000;

/// Acknowledgement sent after a line was parsed and handed to the engine.
pub const ACK_LINE: &str = "Order received";

/// Rejection sent when a line does not parse into a valid order.
pub const NACK_LINE: &str = "Invalid order format";

/// Buy or sell direction of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        })
    }
}

/// An immutable, validated order. `price` is in fixed-point ticks
/// (see [`PRICE_SCALE`]); both `price` and `quantity` are positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Order {
    pub side: Side,
    pub price: u64,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseOrderError {
    #[error("missing {0} field")]
    MissingField(&'static str),
    #[error("unknown side `{0}`")]
    InvalidSide(String),
    #[error("invalid price `{0}`")]
    InvalidPrice(String),
    #[error("invalid quantity `{0}`")]
    InvalidQuantity(String),
}

/// Parses one request line into an [`Order`].
///
/// Non-positive prices and quantities are rejected here, before the order
/// can reach the engine; malformed and invalid input are indistinguishable
/// to the peer (both get [`NACK_LINE`]).
pub fn parse_order(line: &str) -> Result<Order, ParseOrderError> {
    let mut fields = line.split_whitespace();

    let side = match fields.next() {
        Some("buy") => Side::Buy,
        Some("sell") => Side::Sell,
        Some(other) => return Err(ParseOrderError::InvalidSide(other.to_string())),
        None => return Err(ParseOrderError::MissingField("side")),
    };

    let price_text = fields
        .next()
        .ok_or(ParseOrderError::MissingField("price"))?;
    let price = parse_price(price_text)?;

    let quantity_text = fields
        .next()
        .ok_or(ParseOrderError::MissingField("quantity"))?;
    let quantity = quantity_text
        .parse::<u64>()
        .ok()
        .filter(|&q| q > 0 && q <= MAX_ORDER_QUANTITY)
        .ok_or_else(|| ParseOrderError::InvalidQuantity(quantity_text.to_string()))?;

    // Trailing fields are ignored, matching the historic server behavior.
    Ok(Order {
        side,
        price,
        quantity,
    })
}

/// Parses a decimal price into ticks. At most four fractional digits are
/// accepted; excess precision is an error rather than a silent rounding.
pub fn parse_price(text: &str) -> Result<u64, ParseOrderError> {
    let bad = || ParseOrderError::InvalidPrice(text.to_string());

    let (whole, frac) = match text.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (text, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(bad());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(bad());
    }
    if frac.len() > 4 {
        return Err(bad());
    }

    let whole_units = if whole.is_empty() {
        0
    } else {
        whole.parse::<u64>().map_err(|_| bad())?
    };
    let frac_ticks = if frac.is_empty() {
        0
    } else {
        // "5" means .5000, so scale by the missing digit count.
        frac.parse::<u64>().map_err(|_| bad())? * 10u64.pow(4 - frac.len() as u32)
    };

    whole_units
        .checked_mul(PRICE_SCALE)
        .and_then(|t| t.checked_add(frac_ticks))
        .filter(|&t| t > 0)
        .ok_or_else(bad)
}

/// Formats ticks back to a decimal string, trimming trailing zeros.
pub fn format_price(ticks: u64) -> String {
    let whole = ticks / PRICE_SCALE;
    let frac = ticks % PRICE_SCALE;
    if frac == 0 {
        format!("{whole}")
    } else {
        let digits = format!("{frac:04}");
        format!("{whole}.{}", digits.trim_end_matches('0'))
    }
}
