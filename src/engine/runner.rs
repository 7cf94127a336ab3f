use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::{trap_threshold, Config};
use crate::engine::state::{Mode, OrderRole, StrategyState};
use crate::exchange::ExchangeClient;
use crate::orderbook::OrderBookSnapshot;
use crate::policy::{hedge_price, trap_price, PolicyParams};
use crate::types::{Fill, Outcome, Side, Tif};

/// Minimum imbalance worth hedging at all — below this the box is close
/// enough to flat that a hedge order would trip the exchange minimum.
const MIN_HEDGE_THRESHOLD: f64 = 2.5;

/// Exchange-enforced minimum order size; hedges below this are rounded up
/// to it (a small deliberate overhedge) rather than rejected.
const MIN_POLYMARKET_SIZE: f64 = 5.0;

/// A hedge is reused rather than replaced if the previously-quoted price is
/// within this tolerance of the freshly computed one.
const HEDGE_PRICE_REUSE_TOLERANCE: f64 = 0.005;

/// An already-hedged position is considered complete once the residual
/// imbalance drops below this.
const HEDGE_COMPLETE_TOLERANCE: f64 = 0.5;

/// The box-spread market-making engine: owns the mutex-guarded strategy
/// state and drives it from book updates, fills, and periodic ticks. All
/// mutation happens under a single lock — there is exactly one writer at a
/// time, enforced by the `placing_traps`/`placing_hedge` guards across
/// await points rather than by the lock alone.
pub struct Engine<X: ExchangeClient> {
    pub state: Mutex<StrategyState>,
    exchange: Arc<X>,
    config: Config,
    policy: PolicyParams,
}

impl<X: ExchangeClient> Engine<X> {
    pub fn new(config: Config, exchange: Arc<X>, state: StrategyState) -> Self {
        let policy = PolicyParams {
            c_target: config.c_target,
            range_min: config.range_min,
            range_max: config.range_max,
        };
        Self {
            state: Mutex::new(state),
            exchange,
            config,
            policy,
        }
    }

    /// Feed a fresh order-book snapshot for one side, then advance the
    /// state machine.
    pub async fn on_book(&self, outcome: Outcome, book: OrderBookSnapshot) {
        {
            let mut state = self.state.lock().await;
            match outcome {
                Outcome::Yes => state.book_yes = Some(book),
                Outcome::No => state.book_no = Some(book),
            }
        }
        self.step().await;
    }

    /// Handle a confirmed fill from the private stream.
    ///
    /// Unknown order ids (already cancelled locally, or a stray echo) are
    /// ignored entirely — they must not touch inventory.
    pub async fn on_fill(&self, fill: Fill, reported_outcome: Outcome) {
        let mut state = self.state.lock().await;

        let role = state.classify(&fill.order_id);
        if role == OrderRole::Unknown {
            eprintln!("[ENGINE] fill for unknown order {} ignored", fill.order_id);
            return;
        }

        // The engine's own intent map is authoritative over whatever the
        // stream reports — upstream sometimes reports the wrong asset_id
        // for a maker-side fill.
        let outcome = state
            .order_intent
            .get(&fill.order_id)
            .copied()
            .unwrap_or(reported_outcome);

        state.inventory.record_fill(outcome, Side::Buy, fill.price, fill.size);
        state.forget_order(&fill.order_id);

        match role {
            OrderRole::TrapYes => {
                if let Some(o) = &mut state.trap_yes {
                    o.filled_size += fill.size;
                    o.status = crate::types::OrderStatus::Filled;
                }
                eprintln!("[ENGINE] YES trap filled {:.2} @ {:.2}", fill.size, fill.price);
            }
            OrderRole::TrapNo => {
                if let Some(o) = &mut state.trap_no {
                    o.filled_size += fill.size;
                    o.status = crate::types::OrderStatus::Filled;
                }
                eprintln!("[ENGINE] NO trap filled {:.2} @ {:.2}", fill.size, fill.price);
            }
            OrderRole::Hedge => {
                if let Some(o) = &mut state.hedge {
                    o.filled_size += fill.size;
                    o.status = crate::types::OrderStatus::Filled;
                }
                eprintln!("[ENGINE] hedge filled {:.2} @ {:.2}", fill.size, fill.price);
                if state.inventory.delta_q().abs() < HEDGE_COMPLETE_TOLERANCE {
                    state.inventory.lock_profit(self.config.c_target);
                }
            }
            OrderRole::Unknown => unreachable!(),
        }

        drop(state);
        self.step().await;
    }

    /// The core tick: final-exit check, expiry-buffer check, exposure
    /// check, opportunistic profit lock, then mode dispatch.
    pub async fn step(&self) {
        let now = crate::config::now_ms();

        let mut state = self.state.lock().await;
        if state.mode == Mode::Stopped {
            return;
        }

        let remaining_ms = state.market_expiry_ms - now;
        if remaining_ms <= self.config.final_exit_seconds * 1000 {
            drop(state);
            self.final_exit("final exit window reached").await;
            return;
        }

        if remaining_ms <= self.config.expiry_buffer_seconds * 1000 && state.mode == Mode::Open {
            eprintln!("[ENGINE] inside expiry buffer, no new traps will be placed");
        }

        if state.inventory.is_balanced() {
            state.inventory.lock_profit(self.config.c_target);
        }

        let delta_q = state.inventory.delta_q();
        let exposure = delta_q.abs();
        let threshold = trap_threshold(self.config.min_order_size);

        let target_mode = if exposure > self.config.max_exposure {
            if delta_q > 0.0 {
                Mode::HedgeYes
            } else {
                Mode::HedgeNo
            }
        } else if delta_q.abs() > threshold.max(MIN_HEDGE_THRESHOLD) {
            if delta_q > 0.0 {
                Mode::HedgeYes
            } else {
                Mode::HedgeNo
            }
        } else {
            Mode::Open
        };

        if target_mode != state.mode {
            eprintln!("[ENGINE] mode {} -> {}", state.mode, target_mode);
            state.mode = target_mode;
        }

        let mode = state.mode;
        let buffered = remaining_ms <= self.config.expiry_buffer_seconds * 1000;
        drop(state);

        match mode {
            Mode::Open => {
                if !buffered {
                    self.mode_open().await;
                }
            }
            Mode::HedgeYes => self.mode_hedge(Outcome::Yes).await,
            Mode::HedgeNo => self.mode_hedge(Outcome::No).await,
            Mode::Stopped => {}
        }
    }

    /// OPEN mode: quote both traps whenever the books imply a legal box.
    async fn mode_open(&self) {
        let mut state = self.state.lock().await;

        if state.placing_traps {
            return;
        }
        if !state.has_both_books() {
            return;
        }

        // Entering OPEN clears any stale hedge slot left from a prior
        // HEDGE_* excursion.
        if let Some(hedge) = state.hedge.take() {
            if hedge.is_active() {
                state.hedge = Some(hedge);
            }
        }

        let both_live = state.trap_yes.as_ref().is_some_and(|o| o.is_active())
            && state.trap_no.as_ref().is_some_and(|o| o.is_active());
        if both_live {
            return;
        }

        let ask_yes = state.book_yes.as_ref().and_then(|b| b.best_ask());
        let ask_no = state.book_no.as_ref().and_then(|b| b.best_ask());
        let (Some(ask_yes), Some(ask_no)) = (ask_yes, ask_no) else {
            return;
        };

        state.placing_traps = true;
        drop(state);

        let yes_quote = trap_price(self.policy, ask_no, ask_yes);
        let no_quote = trap_price(self.policy, ask_yes, ask_no);

        if let Some(price) = yes_quote {
            self.place_trap(Outcome::Yes, price).await;
        }
        if let Some(price) = no_quote {
            self.place_trap(Outcome::No, price).await;
        }

        let mut state = self.state.lock().await;
        state.placing_traps = false;
    }

    async fn place_trap(&self, outcome: Outcome, price: f64) {
        let mut state = self.state.lock().await;
        let already_live = match outcome {
            Outcome::Yes => state.trap_yes.as_ref().is_some_and(|o| o.is_active()),
            Outcome::No => state.trap_no.as_ref().is_some_and(|o| o.is_active()),
        };
        if already_live {
            return;
        }
        drop(state);

        let token_id = self.token_id(outcome);
        let size = self.config.trap_order_size;

        match self.exchange.place_limit(&token_id, Side::Buy, price, size, Tif::Gtc).await {
            Ok(placed) => {
                let mut state = self.state.lock().await;
                let order = crate::types::LiveOrder::new(
                    placed.order_id.clone(),
                    outcome,
                    Side::Buy,
                    price,
                    size,
                );
                state.remember_order(&placed.order_id, outcome);
                match outcome {
                    Outcome::Yes => state.trap_yes = Some(order),
                    Outcome::No => state.trap_no = Some(order),
                }
                eprintln!("[ENGINE] {} trap placed {:.2} @ {:.2}", outcome, size, price);
            }
            Err(e) => eprintln!("[ENGINE] {} trap placement failed: {}", outcome, e),
        }
    }

    /// HEDGE_{YES,NO} mode: the `long_side` already has more inventory than
    /// the opposite leg; cancel both traps and buy the opposite leg up to
    /// balance.
    async fn mode_hedge(&self, long_side: Outcome) {
        let mut state = self.state.lock().await;

        if state.hedge.as_ref().is_some_and(|o| o.is_active()) {
            return;
        }
        if state.placing_hedge {
            return;
        }
        state.placing_hedge = true;

        let trap_yes = state.trap_yes.take();
        let trap_no = state.trap_no.take();
        drop(state);

        if let Some(o) = trap_yes {
            if o.is_active() {
                let _ = self.exchange.cancel(&o.order_id).await;
                let mut state = self.state.lock().await;
                state.forget_order(&o.order_id);
            }
        }
        if let Some(o) = trap_no {
            if o.is_active() {
                let _ = self.exchange.cancel(&o.order_id).await;
                let mut state = self.state.lock().await;
                state.forget_order(&o.order_id);
            }
        }

        let mut state = self.state.lock().await;
        let short_side = long_side.opposite();
        let delta_q = state.inventory.delta_q().abs();
        let qty = if delta_q < MIN_POLYMARKET_SIZE {
            MIN_POLYMARKET_SIZE
        } else {
            delta_q
        };
        let own_vwap = state.inventory.mu(long_side);
        let price = hedge_price(self.policy, own_vwap);

        let reuse = state
            .hedge
            .as_ref()
            .is_some_and(|o| o.outcome == short_side && (o.price - price).abs() < HEDGE_PRICE_REUSE_TOLERANCE);
        state.placing_hedge = false;
        if reuse {
            return;
        }
        drop(state);

        let token_id = self.token_id(short_side);
        match self.exchange.place_limit(&token_id, Side::Buy, price, qty, Tif::Gtc).await {
            Ok(placed) => {
                let mut state = self.state.lock().await;
                let order = crate::types::LiveOrder::new(placed.order_id.clone(), short_side, Side::Buy, price, qty);
                state.remember_order(&placed.order_id, short_side);
                state.hedge = Some(order);
                eprintln!("[ENGINE] hedge placed {} {:.2} @ {:.2}", short_side, qty, price);
            }
            Err(e) => eprintln!("[ENGINE] hedge placement failed: {}", e),
        }
    }

    /// Cancel every live order and move to STOPPED. Idempotent: calling
    /// this again once already stopped is a no-op.
    pub async fn final_exit(&self, reason: &str) {
        let mut state = self.state.lock().await;
        if state.mode == Mode::Stopped {
            return;
        }
        eprintln!("[ENGINE] final exit: {}", reason);
        let ids = state.active_order_ids();
        state.mode = Mode::Stopped;
        drop(state);

        for id in ids {
            let _ = self.exchange.cancel(&id).await;
        }
        let _ = self.exchange.cancel_all().await;
    }

    /// Liquidate any residual one-sided inventory at shutdown: sell the
    /// larger leg's surplus at `best_bid - 0.02` (floored at the minimum
    /// tick) via a fill-or-kill market order capped at that price.
    pub async fn flatten(&self) {
        let state = self.state.lock().await;
        let delta_q = state.inventory.delta_q();
        if delta_q.abs() < 0.01 {
            return;
        }
        let (outcome, qty, book) = if delta_q > 0.0 {
            (Outcome::Yes, delta_q, state.book_yes.clone())
        } else {
            (Outcome::No, -delta_q, state.book_no.clone())
        };
        let best_bid = book.and_then(|b| b.best_bid()).unwrap_or(0.03);
        let price_cap = (best_bid - 0.02).max(0.01);
        drop(state);

        let token_id = self.token_id(outcome);
        eprintln!("[ENGINE] flattening {:.2} {} @ {:.2}", qty, outcome, price_cap);
        match self.exchange.place_market(&token_id, Side::Sell, qty, price_cap).await {
            Ok(_) => {
                let mut state = self.state.lock().await;
                state.inventory.record_fill(outcome, Side::Sell, price_cap, qty);
            }
            Err(e) => eprintln!("[ENGINE] flatten order failed: {}", e),
        }
    }

    fn token_id(&self, outcome: Outcome) -> String {
        match outcome {
            Outcome::Yes => self.config.token_id_yes.clone(),
            Outcome::No => self.config.token_id_no.clone(),
        }
    }
}
