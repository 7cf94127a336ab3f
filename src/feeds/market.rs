use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use crate::orderbook::OrderBookSnapshot;
use crate::types::{Level, Outcome};

/// A full-snapshot book update for one side, ready to hand to the engine.
#[derive(Debug, Clone)]
pub struct BookUpdate {
    pub outcome: Outcome,
    pub snapshot: OrderBookSnapshot,
}

/// Public order-book stream: connects to the CLOB market channel, subscribes
/// to both token ids, and emits a full snapshot (never a diff) every time
/// the exchange pushes one. Reconnects with exponential backoff; non-JSON
/// frames (ping/keep-alive text) are silently dropped.
pub async fn market_feed(tx: mpsc::Sender<BookUpdate>, ws_url: String, token_yes: String, token_no: String) {
    let mut backoff_ms: u64 = 1000;

    loop {
        eprintln!("[BOOK] connecting to {}", ws_url);
        let ws = match connect_async(&ws_url).await {
            Ok((ws, _)) => {
                eprintln!("[BOOK] connected");
                backoff_ms = 1000;
                ws
            }
            Err(e) => {
                eprintln!("[BOOK] connect failed: {}, retrying in {}ms", e, backoff_ms);
                tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(10_000);
                continue;
            }
        };

        let (mut write, mut read) = ws.split();

        let sub = serde_json::json!({
            "type": "MARKET",
            "assets_ids": [&token_yes, &token_no],
        });
        if let Err(e) = write.send(Message::Text(sub.to_string())).await {
            eprintln!("[BOOK] subscribe failed: {}, reconnecting", e);
            tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
            backoff_ms = (backoff_ms * 2).min(10_000);
            continue;
        }

        let mut ping_interval = tokio::time::interval(tokio::time::Duration::from_secs(10));

        loop {
            tokio::select! {
                msg = read.next() => {
                    let msg = match msg {
                        Some(Ok(m)) => m,
                        Some(Err(e)) => {
                            eprintln!("[BOOK] ws error: {}, reconnecting", e);
                            break;
                        }
                        None => {
                            eprintln!("[BOOK] stream ended, reconnecting");
                            break;
                        }
                    };

                    if let Message::Text(text) = msg {
                        for update in parse_snapshots(&text, &token_yes, &token_no) {
                            if tx.send(update).await.is_err() {
                                eprintln!("[BOOK] channel closed, exiting");
                                return;
                            }
                        }
                    }
                }
                _ = ping_interval.tick() => {
                    let _ = write.send(Message::Ping(vec![])).await;
                }
            }
        }

        eprintln!("[BOOK] disconnected, reconnecting in {}ms", backoff_ms);
        tokio::time::sleep(tokio::time::Duration::from_millis(backoff_ms)).await;
        backoff_ms = (backoff_ms * 2).min(10_000);
    }
}

/// Parse one WS text frame into zero or more full book snapshots.
///
/// Keep-alive frames are not valid JSON (or are JSON that doesn't start
/// an object/array) and are dropped here rather than logged as errors.
fn parse_snapshots(text: &str, token_yes: &str, token_no: &str) -> Vec<BookUpdate> {
    let trimmed = text.trim();
    if !(trimmed.starts_with('{') || trimmed.starts_with('[')) {
        return Vec::new();
    }
    let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) else {
        return Vec::new();
    };

    let events = match &value {
        serde_json::Value::Array(a) => a.clone(),
        serde_json::Value::Object(_) => vec![value],
        _ => return Vec::new(),
    };

    let now_ms = chrono::Utc::now().timestamp_millis();
    let mut updates = Vec::new();

    for event in events {
        let Some(asset_id) = event.get("asset_id").and_then(|v| v.as_str()) else {
            continue;
        };
        let outcome = if asset_id == token_yes {
            Outcome::Yes
        } else if asset_id == token_no {
            Outcome::No
        } else {
            continue;
        };

        let Some(bids) = event.get("bids").and_then(|v| v.as_array()) else {
            continue;
        };
        let Some(asks) = event.get("asks").and_then(|v| v.as_array()) else {
            continue;
        };

        updates.push(BookUpdate {
            outcome,
            snapshot: OrderBookSnapshot {
                bids: parse_levels(bids),
                asks: parse_levels(asks),
                received_at_ms: now_ms,
            },
        });
    }

    updates
}

fn parse_levels(levels: &[serde_json::Value]) -> Vec<Level> {
    levels
        .iter()
        .filter_map(|l| {
            let price = l.get("price")?;
            let size = l.get("size")?;
            let price = price.as_str().and_then(|s| s.parse().ok()).or_else(|| price.as_f64())?;
            let size = size.as_str().and_then(|s| s.parse().ok()).or_else(|| size.as_f64())?;
            Some(Level { price, size })
        })
        .collect()
}
