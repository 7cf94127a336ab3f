use std::str::FromStr;

use polymarket_client_sdk::auth::state::Authenticated;
use polymarket_client_sdk::auth::{LocalSigner, Normal, Signer};
use polymarket_client_sdk::clob::types::{OrderType as ClobOrderType, Side as ClobSide};
use polymarket_client_sdk::clob::{Client as ClobClient, Config as ClobConfig};
use polymarket_client_sdk::types::{Decimal, U256};
use polymarket_client_sdk::POLYGON;

use crate::config::Config;
use crate::types::{Side, Tif};

const TICK_DECIMALS: usize = 2;

#[derive(Debug)]
pub struct ExchangeError(pub String);

impl std::fmt::Display for ExchangeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "exchange error: {}", self.0)
    }
}

impl std::error::Error for ExchangeError {}

/// Result of a limit order submission: either the exchange's assigned id
/// (order resting or immediately matched) or a rejection.
#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: String,
    pub resting: bool,
}

/// Abstraction over the exchange so the engine never touches the CLOB SDK
/// directly. One implementation talks to the live Polymarket CLOB; tests
/// substitute a fake.
#[async_trait::async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn place_limit(
        &self,
        token_id: &str,
        side: Side,
        price: f64,
        size: f64,
        tif: Tif,
    ) -> Result<PlacedOrder, ExchangeError>;

    /// A marketable order capped at `price_cap` — implemented as a
    /// fill-or-kill limit so it either takes immediately or is rejected
    /// outright, never left resting past the cap.
    async fn place_market(
        &self,
        token_id: &str,
        side: Side,
        size: f64,
        price_cap: f64,
    ) -> Result<PlacedOrder, ExchangeError>;

    async fn cancel(&self, order_id: &str) -> Result<(), ExchangeError>;

    async fn cancel_all(&self) -> Result<(), ExchangeError>;

    async fn cancel_market(&self, condition_id: &str) -> Result<(), ExchangeError>;
}

/// Live implementation backed by `polymarket-client-sdk`'s CLOB client,
/// signing with a local EOA key via `alloy`.
pub struct ClobExchangeClient {
    client: ClobClient<Authenticated<Normal>>,
    signer: alloy::signers::local::PrivateKeySigner,
    condition_id: String,
    token_yes: String,
    token_no: String,
}

impl ClobExchangeClient {
    pub async fn connect(config: &Config) -> Result<Self, ExchangeError> {
        let signer = LocalSigner::from_str(&config.private_key)
            .map_err(|e| ExchangeError(format!("invalid private key: {}", e)))?
            .with_chain_id(Some(POLYGON));

        let client = ClobClient::new(&config.clob_http_url, ClobConfig::default())
            .map_err(|e| ExchangeError(format!("failed to create CLOB client: {}", e)))?
            .authentication_builder(&signer)
            .authenticate()
            .await
            .map_err(|e| ExchangeError(format!("CLOB authentication failed: {}", e)))?;

        eprintln!("[XC] authenticated, address={}", client.address());

        Ok(Self {
            client,
            signer,
            condition_id: config.condition_id.clone(),
            token_yes: config.token_id_yes.clone(),
            token_no: config.token_id_no.clone(),
        })
    }

    fn format_price(price: f64) -> Result<Decimal, ExchangeError> {
        let rounded = (price / 0.01).round() * 0.01;
        let s = format!("{:.prec$}", rounded, prec = TICK_DECIMALS);
        Decimal::from_str(&s).map_err(|e| ExchangeError(format!("bad price '{}': {}", s, e)))
    }
}

/// Treat "already cancelled" / "already matched" responses from the
/// exchange as success rather than propagating an error — by the time the
/// cancel lands the order may already be gone for a reason we don't care
/// about.
fn is_benign_cancel_error(msg: &str) -> bool {
    let lower = msg.to_lowercase();
    lower.contains("already cancel") || lower.contains("already match") || lower.contains("not found")
}

#[async_trait::async_trait]
impl ExchangeClient for ClobExchangeClient {
    async fn place_limit(
        &self,
        token_id: &str,
        side: Side,
        price: f64,
        size: f64,
        tif: Tif,
    ) -> Result<PlacedOrder, ExchangeError> {
        let price_dec = Self::format_price(price)?;
        let size_str = format!("{:.2}", size);
        let size_dec = Decimal::from_str(&size_str)
            .map_err(|e| ExchangeError(format!("bad size '{}': {}", size_str, e)))?;
        let token = U256::from_str(token_id)
            .map_err(|e| ExchangeError(format!("bad token_id '{}': {}", token_id, e)))?;
        let clob_side = match side {
            Side::Buy => ClobSide::Buy,
            Side::Sell => ClobSide::Sell,
        };
        let order_type = match tif {
            Tif::Gtc => ClobOrderType::GTC,
            Tif::Ioc => ClobOrderType::FAK,
            Tif::Fok => ClobOrderType::FOK,
        };

        let signable = self
            .client
            .limit_order()
            .token_id(token)
            .price(price_dec)
            .size(size_dec)
            .side(clob_side)
            .order_type(order_type)
            .build()
            .await
            .map_err(|e| ExchangeError(format!("build: {}", e)))?;

        let signed = self
            .client
            .sign(&self.signer, signable)
            .await
            .map_err(|e| ExchangeError(format!("sign: {}", e)))?;

        let resp = self
            .client
            .post_order(signed)
            .await
            .map_err(|e| ExchangeError(format!("post: {}", e)))?;

        if !resp.success {
            return Err(ExchangeError(
                resp.error_msg.unwrap_or_else(|| "rejected".to_string()),
            ));
        }

        Ok(PlacedOrder {
            order_id: resp.order_id,
            resting: tif == Tif::Gtc,
        })
    }

    async fn place_market(
        &self,
        token_id: &str,
        side: Side,
        size: f64,
        price_cap: f64,
    ) -> Result<PlacedOrder, ExchangeError> {
        // Polymarket's CLOB has no native market order type; a fill-or-kill
        // limit at the worst-case price the caller is willing to take is
        // the closest equivalent — it either matches immediately or is
        // rejected, never left resting.
        self.place_limit(token_id, side, price_cap, size, Tif::Fok).await
    }

    async fn cancel(&self, order_id: &str) -> Result<(), ExchangeError> {
        match self.client.cancel_order(order_id).await {
            Ok(_) => Ok(()),
            Err(e) if is_benign_cancel_error(&e.to_string()) => Ok(()),
            Err(e) => Err(ExchangeError(format!("cancel {}: {}", order_id, e))),
        }
    }

    async fn cancel_all(&self) -> Result<(), ExchangeError> {
        match self.client.cancel_all_orders().await {
            Ok(_) => Ok(()),
            Err(e) if is_benign_cancel_error(&e.to_string()) => Ok(()),
            Err(e) => Err(ExchangeError(format!("cancel_all: {}", e))),
        }
    }

    async fn cancel_market(&self, condition_id: &str) -> Result<(), ExchangeError> {
        let market = polymarket_client_sdk::types::B256::from_str(condition_id)
            .map_err(|e| ExchangeError(format!("bad condition_id '{}': {}", condition_id, e)))?;
        let mut request =
            polymarket_client_sdk::clob::types::request::CancelMarketOrderRequest::default();
        request.market = Some(market);
        match self.client.cancel_market_orders(&request).await {
            Ok(_) => Ok(()),
            Err(e) if is_benign_cancel_error(&e.to_string()) => Ok(()),
            Err(e) => Err(ExchangeError(format!("cancel_market {}: {}", condition_id, e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_price_rounds_to_tick() {
        let price = ClobExchangeClient::format_price(0.4834).unwrap();
        assert_eq!(price.to_string(), "0.48");
    }

    #[test]
    fn benign_cancel_errors_are_recognized() {
        assert!(is_benign_cancel_error("order already cancelled"));
        assert!(is_benign_cancel_error("Order Already Matched"));
        assert!(is_benign_cancel_error("order not found"));
        assert!(!is_benign_cancel_error("insufficient balance"));
    }
}
