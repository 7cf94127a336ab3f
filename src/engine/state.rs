use std::collections::HashMap;

use crate::inventory::InventoryLedger;
use crate::orderbook::OrderBookSnapshot;
use crate::types::{LiveOrder, Outcome};

/// Current strategy mode. Mode ∈ {OPEN, HEDGE_YES, HEDGE_NO, STOPPED}.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Open,
    HedgeYes,
    HedgeNo,
    Stopped,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Mode::Open => write!(f, "OPEN"),
            Mode::HedgeYes => write!(f, "HEDGE_YES"),
            Mode::HedgeNo => write!(f, "HEDGE_NO"),
            Mode::Stopped => write!(f, "STOPPED"),
        }
    }
}

/// Classification of a fill's originating order slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderRole {
    TrapYes,
    TrapNo,
    Hedge,
    Unknown,
}

/// The full strategy state: mode, inventory, at-most-one-live order per
/// slot, cached books, and the re-entrance guards that serialize order
/// placement batches across suspension points.
pub struct StrategyState {
    pub mode: Mode,
    pub inventory: InventoryLedger,

    pub trap_yes: Option<LiveOrder>,
    pub trap_no: Option<LiveOrder>,
    pub hedge: Option<LiveOrder>,

    pub book_yes: Option<OrderBookSnapshot>,
    pub book_no: Option<OrderBookSnapshot>,

    pub market_expiry_ms: i64,
    pub started_at_ms: i64,

    /// order_id -> outcome the engine intended that order to touch.
    pub order_intent: HashMap<String, Outcome>,

    pub placing_traps: bool,
    pub placing_hedge: bool,
}

impl StrategyState {
    pub fn new(market_expiry_ms: i64, inventory: InventoryLedger, started_at_ms: i64) -> Self {
        Self {
            mode: Mode::Open,
            inventory,
            trap_yes: None,
            trap_no: None,
            hedge: None,
            book_yes: None,
            book_no: None,
            market_expiry_ms,
            started_at_ms,
            order_intent: HashMap::new(),
            placing_traps: false,
            placing_hedge: false,
        }
    }

    pub fn has_both_books(&self) -> bool {
        self.book_yes.is_some() && self.book_no.is_some()
    }

    pub fn remember_order(&mut self, order_id: &str, outcome: Outcome) {
        self.order_intent.insert(order_id.to_string(), outcome);
    }

    pub fn forget_order(&mut self, order_id: &str) {
        self.order_intent.remove(order_id);
    }

    /// Classify an incoming order id against the three live slots.
    pub fn classify(&self, order_id: &str) -> OrderRole {
        if self.trap_yes.as_ref().is_some_and(|o| o.order_id == order_id) {
            OrderRole::TrapYes
        } else if self.trap_no.as_ref().is_some_and(|o| o.order_id == order_id) {
            OrderRole::TrapNo
        } else if self.hedge.as_ref().is_some_and(|o| o.order_id == order_id) {
            OrderRole::Hedge
        } else {
            OrderRole::Unknown
        }
    }

    pub fn active_order_ids(&self) -> Vec<String> {
        let mut ids = Vec::new();
        if let Some(o) = &self.trap_yes {
            if o.is_active() {
                ids.push(o.order_id.clone());
            }
        }
        if let Some(o) = &self.trap_no {
            if o.is_active() {
                ids.push(o.order_id.clone());
            }
        }
        if let Some(o) = &self.hedge {
            if o.is_active() {
                ids.push(o.order_id.clone());
            }
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Side;

    fn state() -> StrategyState {
        StrategyState::new(0, InventoryLedger::default(), 0)
    }

    /// Scenario: classify an order id that matches the yes trap slot.
    /// Expected: classified as TrapYes, not Unknown.
    #[test]
    fn classify_matches_trap_yes_slot() {
        let mut s = state();
        s.trap_yes = Some(LiveOrder::new("abc".into(), Outcome::Yes, Side::Buy, 0.48, 10.0));
        assert_eq!(s.classify("abc"), OrderRole::TrapYes);
    }

    /// Scenario: a fill arrives with an order id not present in any slot.
    /// Expected: classified as Unknown.
    #[test]
    fn classify_unknown_order_id() {
        let s = state();
        assert_eq!(s.classify("never-seen"), OrderRole::Unknown);
    }

    #[test]
    fn active_order_ids_excludes_inactive_orders() {
        let mut s = state();
        let mut cancelled = LiveOrder::new("c1".into(), Outcome::Yes, Side::Buy, 0.48, 10.0);
        cancelled.status = crate::types::OrderStatus::Cancelled;
        s.trap_yes = Some(cancelled);
        s.trap_no = Some(LiveOrder::new("c2".into(), Outcome::No, Side::Buy, 0.46, 10.0));
        assert_eq!(s.active_order_ids(), vec!["c2".to_string()]);
    }
}
