const TICK: f64 = 0.01;

fn round_to_tick(price: f64) -> f64 {
    (price / TICK).round() * TICK
}

/// Pricing parameters fixed at session start.
#[derive(Debug, Clone, Copy)]
pub struct PolicyParams {
    pub c_target: f64,
    pub range_min: f64,
    pub range_max: f64,
}

/// Compute the trap (limit BUY) price for one side.
///
/// `π = c_target − opposing_ask`, only active while both asks sit in
/// `[range_min, range_max]`. Returns `None` (no quote) outside that band or
/// when the resulting price would not be a legal quote.
pub fn trap_price(params: PolicyParams, opposing_ask: f64, own_ask: f64) -> Option<f64> {
    if own_ask < params.range_min
        || own_ask > params.range_max
        || opposing_ask < params.range_min
        || opposing_ask > params.range_max
    {
        return None;
    }

    let raw = params.c_target - opposing_ask;
    let price = round_to_tick(raw);

    if price <= 0.01 || price > 0.99 {
        return None;
    }

    Some(price)
}

/// Compute the maximum price we will pay for the hedge leg:
/// `π = c_target − own_vwap`, clamped to `[0.01, 0.99]`.
pub fn hedge_price(params: PolicyParams, own_vwap: f64) -> f64 {
    let raw = params.c_target - own_vwap;
    round_to_tick(raw.clamp(0.01, 0.99))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> PolicyParams {
        PolicyParams {
            c_target: 0.98,
            range_min: 0.40,
            range_max: 0.60,
        }
    }

    /// Scenario: YES ask 0.52, NO ask 0.50.
    /// Expected: YES trap at 0.98 - 0.50 = 0.48, NO trap at 0.98 - 0.52 = 0.46.
    #[test]
    fn trap_price_full_box_scenario() {
        let yes_trap = trap_price(params(), 0.50, 0.52);
        let no_trap = trap_price(params(), 0.52, 0.50);
        assert_eq!(yes_trap, Some(0.48));
        assert_eq!(no_trap, Some(0.46));
    }

    /// Scenario: YES ask 0.70, NO ask 0.32 — both outside [0.40, 0.60].
    /// Expected: both traps decline to quote.
    #[test]
    fn trap_price_out_of_range_silence() {
        assert_eq!(trap_price(params(), 0.32, 0.70), None);
        assert_eq!(trap_price(params(), 0.70, 0.32), None);
    }

    /// Scenario: opposing ask sits right at c_target, producing a price at
    /// the lower admissible boundary.
    /// Expected: a price of exactly 0.01 is rejected (must be strictly > 0.01).
    #[test]
    fn trap_price_rejects_at_lower_boundary() {
        let p = PolicyParams {
            c_target: 0.41,
            range_min: 0.40,
            range_max: 0.60,
            // opposing_ask 0.40 -> raw 0.01, rejected at the boundary
        };
        assert_eq!(trap_price(p, 0.40, 0.50), None);
    }

    #[test]
    fn hedge_price_clamps_into_valid_range() {
        let p = params();
        assert_eq!(hedge_price(p, 0.0), 0.98);
        assert_eq!(hedge_price(p, 1.5), 0.01);
    }

    /// Scenario 1 continued: hedge leg after the YES trap fills at 0.48.
    /// Expected: hedge_price = 0.98 - 0.48 = 0.50.
    #[test]
    fn hedge_price_full_box_scenario() {
        assert_eq!(hedge_price(params(), 0.48), 0.50);
    }

    proptest::proptest! {
        /// Property 3: for any in-band pair of asks, trap_price is either a
        /// no-quote or lies in (0.01, 0.99].
        #[test]
        fn prop_trap_price_in_bounds_or_no_quote(
            own_ask in 0.40f64..=0.60,
            opposing_ask in 0.40f64..=0.60,
        ) {
            if let Some(price) = trap_price(params(), opposing_ask, own_ask) {
                proptest::prop_assert!(price > 0.01 && price <= 0.99);
            }
        }

        /// Property 4: whenever a quote is produced, trap_price + opposing_ask
        /// equals c_target, modulo rounding to the 0.01 tick.
        #[test]
        fn prop_trap_price_sums_to_c_target(
            own_ask in 0.40f64..=0.60,
            opposing_ask in 0.40f64..=0.60,
        ) {
            if let Some(price) = trap_price(params(), opposing_ask, own_ask) {
                proptest::prop_assert!((price + opposing_ask - params().c_target).abs() < 1e-6);
            }
        }

        /// Property: hedge_price is always within the legal quoting range.
        #[test]
        fn prop_hedge_price_always_in_range(own_vwap in -1.0f64..2.0) {
            let price = hedge_price(params(), own_vwap);
            proptest::prop_assert!(price >= 0.01 && price <= 0.99);
        }
    }
}
