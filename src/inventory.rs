use serde::{Deserialize, Serialize};

use crate::config::now_ms;
use crate::types::{Outcome, Side};

/// Portfolio inventory state: `S_t = {Q_yes, C_yes, Q_no, C_no}`.
///
/// Pure accounting — no I/O, no knowledge of orders or streams. Mutated only
/// by `record_fill` and `lock_profit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryLedger {
    pub q_yes: f64,
    pub c_yes: f64,
    pub q_no: f64,
    pub c_no: f64,

    pub locked_profit: f64,
    pub locked_quantity: f64,
    pub completed_rounds: u64,

    pub total_trades: u64,
    pub total_volume: f64,

    pub created_at: i64,
    pub updated_at: i64,
}

impl Default for InventoryLedger {
    fn default() -> Self {
        let now = now_ms();
        Self {
            q_yes: 0.0,
            c_yes: 0.0,
            q_no: 0.0,
            c_no: 0.0,
            locked_profit: 0.0,
            locked_quantity: 0.0,
            completed_rounds: 0,
            total_trades: 0,
            total_volume: 0.0,
            created_at: now,
            updated_at: now,
        }
    }
}

impl InventoryLedger {
    /// VWAP for a side; 0 if nothing is held.
    pub fn mu(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::Yes => {
                if self.q_yes == 0.0 {
                    0.0
                } else {
                    self.c_yes / self.q_yes
                }
            }
            Outcome::No => {
                if self.q_no == 0.0 {
                    0.0
                } else {
                    self.c_no / self.q_no
                }
            }
        }
    }

    /// Imbalance ΔQ = q_yes − q_no.
    pub fn delta_q(&self) -> f64 {
        self.q_yes - self.q_no
    }

    /// Combined VWAP μ_yes + μ_no.
    pub fn combined_vwap(&self) -> f64 {
        self.mu(Outcome::Yes) + self.mu(Outcome::No)
    }

    pub fn is_balanced(&self) -> bool {
        self.delta_q().abs() < 0.01
    }

    /// Potential profit if the box could be closed at current VWAPs.
    pub fn potential_profit(&self) -> f64 {
        let lockable = self.q_yes.min(self.q_no);
        if lockable == 0.0 || self.combined_vwap() >= 1.0 {
            return 0.0;
        }
        lockable * (1.0 - self.combined_vwap())
    }

    /// Record a confirmed fill.
    ///
    /// BUY: `c_i += price*size; q_i += size`.
    /// SELL (unused in the normal trading path, but defined for flatten):
    /// reduce `q_i` by `size`, reduce `c_i` proportionally by the current
    /// VWAP, flooring `q_i` at 0.
    pub fn record_fill(&mut self, outcome: Outcome, side: Side, price: f64, size: f64) {
        self.total_trades += 1;
        self.total_volume += price * size;
        self.updated_at = now_ms();

        let (q, c) = match outcome {
            Outcome::Yes => (&mut self.q_yes, &mut self.c_yes),
            Outcome::No => (&mut self.q_no, &mut self.c_no),
        };

        match side {
            Side::Buy => {
                *c += price * size;
                *q += size;
            }
            Side::Sell => {
                if *q > 0.0 {
                    let avg_cost = *c / *q;
                    *c -= avg_cost * size.min(*q);
                    *q = (*q - size).max(0.0);
                }
            }
        }
    }

    /// Lock in profit from the portion of inventory that is now balanced.
    /// Idempotent and monotonic: `locked_profit`/`completed_rounds` never
    /// decrease, and calling this twice without an intervening fill is a
    /// no-op.
    pub fn lock_profit(&mut self, c_target: f64) {
        let _ = c_target; // retained for call-site symmetry with the policy
        let lockable = self.q_yes.min(self.q_no);
        if lockable <= self.locked_quantity {
            return;
        }

        let new_locked = lockable - self.locked_quantity;
        let profit_per_share = 1.0 - self.combined_vwap();

        if profit_per_share > 0.0 {
            self.locked_profit += new_locked * profit_per_share;
            self.locked_quantity = lockable;
            self.completed_rounds += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scenario: a single BUY fill on the YES side.
    /// Expected: q_yes and c_yes both increase by the fill amounts, trade
    /// counters advance.
    #[test]
    fn record_fill_buy_increases_quantity_and_cost() {
        let mut ledger = InventoryLedger::default();
        ledger.record_fill(Outcome::Yes, Side::Buy, 0.48, 10.0);
        assert_eq!(ledger.q_yes, 10.0);
        assert!((ledger.c_yes - 4.8).abs() < 1e-9);
        assert_eq!(ledger.total_trades, 1);
        assert!((ledger.total_volume - 4.8).abs() < 1e-9);
    }

    /// Scenario: SELL more than is held.
    /// Expected: q floors at 0, cost basis fully unwound, never goes negative.
    #[test]
    fn record_fill_sell_floors_quantity_at_zero() {
        let mut ledger = InventoryLedger::default();
        ledger.record_fill(Outcome::Yes, Side::Buy, 0.5, 5.0);
        ledger.record_fill(Outcome::Yes, Side::Sell, 0.5, 10.0);
        assert_eq!(ledger.q_yes, 0.0);
        assert!(ledger.c_yes.abs() < 1e-9);
    }

    /// Scenario: a full completed box round at margin 0.02 (c_target = 0.98).
    /// Expected: locked_profit = 10 * (1 - 0.98) = 0.20, completed_rounds = 1.
    #[test]
    fn lock_profit_full_box_round() {
        let mut ledger = InventoryLedger::default();
        ledger.record_fill(Outcome::Yes, Side::Buy, 0.48, 10.0);
        ledger.record_fill(Outcome::No, Side::Buy, 0.50, 10.0);
        ledger.lock_profit(0.98);
        assert!((ledger.locked_profit - 0.20).abs() < 1e-9);
        assert_eq!(ledger.completed_rounds, 1);
        assert_eq!(ledger.locked_quantity, 10.0);
    }

    /// Scenario: lock_profit called twice with no fills in between.
    /// Expected: the second call changes nothing (idempotence).
    #[test]
    fn lock_profit_is_idempotent() {
        let mut ledger = InventoryLedger::default();
        ledger.record_fill(Outcome::Yes, Side::Buy, 0.48, 10.0);
        ledger.record_fill(Outcome::No, Side::Buy, 0.50, 10.0);
        ledger.lock_profit(0.98);
        let snapshot = ledger.clone();
        ledger.lock_profit(0.98);
        assert_eq!(snapshot.locked_profit, ledger.locked_profit);
        assert_eq!(snapshot.completed_rounds, ledger.completed_rounds);
        assert_eq!(snapshot.locked_quantity, ledger.locked_quantity);
    }

    /// Scenario: combined VWAP is >= 1.0 (bad fills, no edge).
    /// Expected: lock_profit refuses to lock a negative or zero profit.
    #[test]
    fn lock_profit_refuses_when_no_edge() {
        let mut ledger = InventoryLedger::default();
        ledger.record_fill(Outcome::Yes, Side::Buy, 0.60, 10.0);
        ledger.record_fill(Outcome::No, Side::Buy, 0.55, 10.0);
        ledger.lock_profit(0.98);
        assert_eq!(ledger.locked_profit, 0.0);
        assert_eq!(ledger.completed_rounds, 0);
    }

    /// Scenario: InventoryLedger serialized then deserialized.
    /// Expected: round trip is the identity for all fields.
    #[test]
    fn json_round_trip_is_identity() {
        let mut ledger = InventoryLedger::default();
        ledger.record_fill(Outcome::Yes, Side::Buy, 0.48, 10.0);
        ledger.record_fill(Outcome::No, Side::Buy, 0.50, 10.0);
        ledger.lock_profit(0.98);

        let json = serde_json::to_string(&ledger).unwrap();
        let restored: InventoryLedger = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.q_yes, ledger.q_yes);
        assert_eq!(restored.c_yes, ledger.c_yes);
        assert_eq!(restored.q_no, ledger.q_no);
        assert_eq!(restored.c_no, ledger.c_no);
        assert_eq!(restored.locked_profit, ledger.locked_profit);
        assert_eq!(restored.locked_quantity, ledger.locked_quantity);
        assert_eq!(restored.completed_rounds, ledger.completed_rounds);
        assert_eq!(restored.total_trades, ledger.total_trades);
        assert_eq!(restored.total_volume, ledger.total_volume);
    }

    proptest::proptest! {
        /// Property 1: for any sequence of BUY fills, q_i and c_i stay
        /// non-negative, and q_i == 0 implies c_i == 0.
        #[test]
        fn prop_buy_fills_keep_nonnegative_state(
            fills in proptest::collection::vec((0u8..2, 0.01f64..0.99, 0.1f64..50.0), 0..50)
        ) {
            let mut ledger = InventoryLedger::default();
            for (outcome_tag, price, size) in fills {
                let outcome = if outcome_tag == 0 { Outcome::Yes } else { Outcome::No };
                ledger.record_fill(outcome, Side::Buy, price, size);
            }
            proptest::prop_assert!(ledger.q_yes >= 0.0);
            proptest::prop_assert!(ledger.q_no >= 0.0);
            proptest::prop_assert!(ledger.c_yes >= 0.0);
            proptest::prop_assert!(ledger.c_no >= 0.0);
            if ledger.q_yes == 0.0 {
                proptest::prop_assert_eq!(ledger.c_yes, 0.0);
            }
            if ledger.q_no == 0.0 {
                proptest::prop_assert_eq!(ledger.c_no, 0.0);
            }
        }

        /// Property 2 & 5: locked_profit/completed_rounds never decrease, and
        /// locked_quantity never exceeds min(q_yes, q_no), across an
        /// arbitrary interleaving of fills and lock_profit calls.
        #[test]
        fn prop_lock_profit_monotonic_and_bounded(
            fills in proptest::collection::vec((0u8..2, 0.01f64..0.99, 0.1f64..50.0), 0..50)
        ) {
            let mut ledger = InventoryLedger::default();
            let mut last_profit = 0.0;
            let mut last_rounds = 0u64;
            for (outcome_tag, price, size) in fills {
                let outcome = if outcome_tag == 0 { Outcome::Yes } else { Outcome::No };
                ledger.record_fill(outcome, Side::Buy, price, size);
                ledger.lock_profit(0.98);

                proptest::prop_assert!(ledger.locked_profit >= last_profit - 1e-9);
                proptest::prop_assert!(ledger.completed_rounds >= last_rounds);
                proptest::prop_assert!(ledger.locked_quantity <= ledger.q_yes.min(ledger.q_no) + 1e-9);

                last_profit = ledger.locked_profit;
                last_rounds = ledger.completed_rounds;
            }
        }
    }
}
