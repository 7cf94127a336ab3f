use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary market outcome. The two token ids behind YES/NO are fixed for a
/// session and never change once the market is resolved by discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Yes,
    No,
}

impl Outcome {
    pub fn opposite(self) -> Outcome {
        match self {
            Outcome::Yes => Outcome::No,
            Outcome::No => Outcome::Yes,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Yes => write!(f, "YES"),
            Outcome::No => write!(f, "NO"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

/// Time in force for a limit order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tif {
    Gtc,
    Ioc,
    Fok,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderStatus {
    Pending,
    Live,
    Partial,
    Filled,
    Cancelled,
    Failed,
}

/// A single level of an order book side: a price and the resting size there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Level {
    pub price: f64,
    pub size: f64,
}

/// A live order tracked by the engine.
///
/// Invariant: `filled_size <= original_size`; `status` in {Live, Partial}
/// implies `filled_size < original_size`.
#[derive(Debug, Clone)]
pub struct LiveOrder {
    pub order_id: String,
    pub outcome: Outcome,
    pub side: Side,
    pub price: f64,
    pub original_size: f64,
    pub filled_size: f64,
    pub status: OrderStatus,
}

impl LiveOrder {
    pub fn new(order_id: String, outcome: Outcome, side: Side, price: f64, size: f64) -> Self {
        Self {
            order_id,
            outcome,
            side,
            price,
            original_size: size,
            filled_size: 0.0,
            status: OrderStatus::Live,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self.status,
            OrderStatus::Pending | OrderStatus::Live | OrderStatus::Partial
        )
    }
}

/// A fully-formed fill as reported by the private fill stream, already
/// disambiguated against the engine's order-intent map.
#[derive(Debug, Clone)]
pub struct Fill {
    pub order_id: String,
    pub outcome: Outcome,
    pub price: f64,
    pub size: f64,
}

/// A market descriptor yielded by `MarketSource`.
#[derive(Debug, Clone)]
pub struct MarketInfo {
    pub condition_id: String,
    pub token_id_yes: String,
    pub token_id_no: String,
    pub end_ms: i64,
}
