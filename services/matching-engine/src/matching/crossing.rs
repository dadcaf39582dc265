//! Crossing detection
//!
//! A taker crosses a resting level when its limit allows trading at the
//! maker's price. MARKET takers carry no limit and cross everything.
//! The side books' `iter_crossing` applies this predicate to bound the
//! level sequence the match walk consumes.

use types::numeric::Price;
use types::order::Side;

/// Whether a taker on `taker_side` with `taker_limit` can trade against
/// a resting order at `resting_price`.
pub fn crosses(taker_side: Side, taker_limit: Option<Price>, resting_price: Price) -> bool {
    match taker_limit {
        None => true,
        Some(limit) => match taker_side {
            Side::Buy => resting_price <= limit,
            Side::Sell => resting_price >= limit,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_crosses_at_or_below_limit() {
        let limit = Some(Price::from_u64(100));
        assert!(crosses(Side::Buy, limit, Price::from_u64(99)));
        assert!(crosses(Side::Buy, limit, Price::from_u64(100)));
        assert!(!crosses(Side::Buy, limit, Price::from_u64(101)));
    }

    #[test]
    fn test_sell_crosses_at_or_above_limit() {
        let limit = Some(Price::from_u64(100));
        assert!(crosses(Side::Sell, limit, Price::from_u64(101)));
        assert!(crosses(Side::Sell, limit, Price::from_u64(100)));
        assert!(!crosses(Side::Sell, limit, Price::from_u64(99)));
    }

    #[test]
    fn test_market_crosses_everything() {
        assert!(crosses(Side::Buy, None, Price::from_u64(1)));
        assert!(crosses(Side::Sell, None, Price::from_u64(1_000_000)));
    }
}
