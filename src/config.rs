use std::time::{SystemTime, UNIX_EPOCH};

/// Error raised when the environment does not describe a tradeable session.
#[derive(Debug)]
pub struct ConfigError(pub String);

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid configuration: {}", self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Configuration loaded from environment variables. Constructed once per
/// process and passed by reference to every other component — there is no
/// global mutable config instance.
#[derive(Clone)]
pub struct Config {
    // API & network
    pub private_key: String,
    pub clob_http_url: String,
    pub clob_ws_url: String,
    pub chain_id: u64,

    // Strategy hyperparameters
    pub profit_margin: f64,
    pub c_target: f64,
    pub max_exposure: f64,
    pub trap_order_size: f64,
    pub min_order_size: f64,
    pub range_min: f64,
    pub range_max: f64,

    // Market selection
    pub condition_id: String,
    pub token_id_yes: String,
    pub token_id_no: String,
    pub market_duration_minutes: i64,
    pub gamma_api_url: String,

    // Safety
    pub expiry_buffer_seconds: i64,
    pub final_exit_seconds: i64,

    // Operational
    pub log_level: String,
    pub state_file: String,
    pub state_persist_interval: u64,
    pub ws_reconnect_delay: u64,
    /// Reserved for a periodic trap-refresh policy; 0 disables it. Traps
    /// are currently never refreshed once placed (see engine::runner).
    pub order_refresh_interval: f64,
}

impl Config {
    /// Load configuration from the process environment (after loading a
    /// `.env` file if present), then validate it. Returns `Err` rather than
    /// panicking so the caller can report a clean fatal-at-startup error.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let profit_margin = get_float("PROFIT_MARGIN", 0.02);
        let c_target = std::env::var("C_TARGET")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(1.0 - profit_margin);

        let config = Config {
            private_key: get_required("PRIVATE_KEY")?,
            clob_http_url: get_str("CLOB_HTTP_URL", "https://clob.polymarket.com"),
            clob_ws_url: get_str(
                "CLOB_WS_URL",
                "wss://ws-subscriptions-clob.polymarket.com/ws",
            ),
            chain_id: get_int("CHAIN_ID", 137) as u64,

            profit_margin,
            c_target,
            max_exposure: get_float("MAX_EXPOSURE", 100.0),
            trap_order_size: get_float("TRAP_ORDER_SIZE", 10.0),
            min_order_size: get_float("MIN_ORDER_SIZE", 1.0),
            range_min: get_float("RANGE_MIN", 0.40),
            range_max: get_float("RANGE_MAX", 0.60),

            condition_id: get_str("CONDITION_ID", ""),
            token_id_yes: get_str("TOKEN_ID_YES", ""),
            token_id_no: get_str("TOKEN_ID_NO", ""),
            market_duration_minutes: get_int("MARKET_DURATION_MINUTES", 15),
            gamma_api_url: get_str("GAMMA_API_URL", "https://gamma-api.polymarket.com"),

            expiry_buffer_seconds: get_int("EXPIRY_BUFFER_SECONDS", 60),
            final_exit_seconds: get_int("FINAL_EXIT_SECONDS", 10),

            log_level: get_str("LOG_LEVEL", "INFO"),
            state_file: get_str("STATE_FILE", "mm_state.json"),
            state_persist_interval: get_int("STATE_PERSIST_INTERVAL", 30) as u64,
            ws_reconnect_delay: get_int("WS_RECONNECT_DELAY", 5) as u64,
            order_refresh_interval: get_float("ORDER_REFRESH_INTERVAL", 0.0),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.profit_margin <= 0.0 || self.profit_margin >= 1.0 {
            return Err(ConfigError(format!(
                "PROFIT_MARGIN must be between 0 and 1, got {}",
                self.profit_margin
            )));
        }
        if self.max_exposure <= 0.0 {
            return Err(ConfigError(format!(
                "MAX_EXPOSURE must be positive, got {}",
                self.max_exposure
            )));
        }
        if self.c_target <= 0.0 || self.c_target >= 1.0 {
            return Err(ConfigError(format!(
                "C_TARGET must be between 0 and 1, got {}",
                self.c_target
            )));
        }
        Ok(())
    }

    /// Whether a market has been pinned directly via env vars, bypassing
    /// discovery.
    pub fn has_pinned_market(&self) -> bool {
        !self.condition_id.is_empty()
            && !self.token_id_yes.is_empty()
            && !self.token_id_no.is_empty()
    }
}

/// Half of the exchange minimum order size — the trap/hedge mode-transition
/// threshold θ from the strategy table.
pub fn trap_threshold(min_order_size: f64) -> f64 {
    min_order_size / 2.0
}

pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn get_required(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError(format!("required environment variable {} is not set", key)))
}

fn get_float(key: &str, default: f64) -> f64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_int(key: &str, default: i64) -> i64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(key: &str, val: &str) {
        std::env::set_var(key, val);
    }
    fn clear(key: &str) {
        std::env::remove_var(key);
    }

    /// Scenario: PROFIT_MARGIN of exactly 1.0 is out of the open interval (0,1).
    /// Expected: validate() rejects it as a fatal configuration error.
    #[test]
    fn rejects_profit_margin_out_of_range() {
        set("PRIVATE_KEY", "0xdead");
        set("PROFIT_MARGIN", "1.0");
        let result = Config::from_env();
        assert!(result.is_err());
        clear("PROFIT_MARGIN");
        clear("PRIVATE_KEY");
    }

    /// Scenario: MAX_EXPOSURE is set to a negative number.
    /// Expected: validate() rejects it.
    #[test]
    fn rejects_negative_max_exposure() {
        set("PRIVATE_KEY", "0xdead");
        set("MAX_EXPOSURE", "-5");
        let result = Config::from_env();
        assert!(result.is_err());
        clear("MAX_EXPOSURE");
        clear("PRIVATE_KEY");
    }

    /// Scenario: no PRIVATE_KEY in the environment.
    /// Expected: a required-variable error, not a panic.
    #[test]
    fn missing_private_key_is_fatal() {
        clear("PRIVATE_KEY");
        let result = Config::from_env();
        assert!(result.is_err());
    }

    #[test]
    fn trap_threshold_is_half_min_size() {
        assert_eq!(trap_threshold(5.0), 2.5);
    }
}
