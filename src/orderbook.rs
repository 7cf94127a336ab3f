use crate::types::Level;

/// A full order-book snapshot for one asset. The stream replaces this
/// wholesale on every delivery — it is never mutated in place.
#[derive(Debug, Clone, Default)]
pub struct OrderBookSnapshot {
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub received_at_ms: i64,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.iter().map(|l| l.price).fold(None, |acc, p| {
            Some(acc.map_or(p, |a: f64| a.max(p)))
        })
    }

    pub fn best_ask(&self) -> Option<f64> {
        self.asks.iter().map(|l| l.price).fold(None, |acc, p| {
            Some(acc.map_or(p, |a: f64| a.min(p)))
        })
    }

    pub fn mid(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b + a) / 2.0),
            _ => None,
        }
    }

    pub fn spread(&self) -> Option<f64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some(a - b),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario: a snapshot with unsorted levels.
    /// Expected: best_bid is the max bid price, best_ask is the min ask
    /// price, regardless of input order.
    #[test]
    fn best_bid_ask_are_derived_extrema() {
        let book = OrderBookSnapshot {
            bids: vec![
                Level { price: 0.45, size: 10.0 },
                Level { price: 0.50, size: 5.0 },
                Level { price: 0.30, size: 20.0 },
            ],
            asks: vec![
                Level { price: 0.60, size: 8.0 },
                Level { price: 0.55, size: 12.0 },
            ],
            received_at_ms: 0,
        };
        assert_eq!(book.best_bid(), Some(0.50));
        assert_eq!(book.best_ask(), Some(0.55));
        assert_eq!(book.spread(), Some(0.05));
    }

    /// Scenario: an empty snapshot (stream just connected).
    /// Expected: all derived quantities are None rather than panicking.
    #[test]
    fn empty_book_has_no_derived_prices() {
        let book = OrderBookSnapshot::default();
        assert_eq!(book.best_bid(), None);
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.mid(), None);
    }
}
