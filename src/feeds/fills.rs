use std::thread;
use std::time::Duration;

use tokio::sync::mpsc;
use tungstenite::Message;

use crate::types::{Fill, Outcome};

/// Credentials for the authenticated user channel.
#[derive(Debug, Clone)]
pub struct ApiCreds {
    pub api_key: String,
    pub secret: String,
    pub passphrase: String,
}

/// A confirmed trade plus the outcome the exchange reported for it. The
/// engine's own order-intent map takes precedence when the two disagree.
#[derive(Debug, Clone)]
pub struct FillEvent {
    pub fill: Fill,
    pub reported_outcome: Outcome,
}

/// Spawn the private fill stream on a dedicated OS thread. The upstream
/// client library is synchronous, so rather than fight it with a runtime
/// bridge we let it own a real thread and hand completed fills back across
/// a channel — mirroring how the original bot ran its websocket client on
/// a background `Thread` rather than on the asyncio event loop.
pub fn spawn_fill_stream(
    ws_url: String,
    creds: ApiCreds,
    token_yes: String,
    token_no: String,
    tx: mpsc::Sender<FillEvent>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || run_fill_stream(&ws_url, &creds, &token_yes, &token_no, &tx))
}

fn run_fill_stream(ws_url: &str, creds: &ApiCreds, token_yes: &str, token_no: &str, tx: &mpsc::Sender<FillEvent>) {
    let mut backoff = Duration::from_secs(1);

    loop {
        match tungstenite::connect(ws_url) {
            Ok((mut socket, _)) => {
                eprintln!("[FILL] connected");
                backoff = Duration::from_secs(1);

                let auth = serde_json::json!({
                    "type": "user",
                    "markets": [],
                    "auth": {
                        "apiKey": creds.api_key,
                        "secret": creds.secret,
                        "passphrase": creds.passphrase,
                    }
                });
                if socket.send(Message::Text(auth.to_string())).is_err() {
                    eprintln!("[FILL] auth send failed, reconnecting");
                    thread::sleep(backoff);
                    continue;
                }

                let mut tracked: std::collections::HashSet<String> = std::collections::HashSet::new();
                let mut last_ping = std::time::Instant::now();

                loop {
                    if last_ping.elapsed() >= Duration::from_secs(10) {
                        if socket.send(Message::Text("PING".to_string())).is_err() {
                            eprintln!("[FILL] ping failed, reconnecting");
                            break;
                        }
                        last_ping = std::time::Instant::now();
                    }

                    match socket.read() {
                        Ok(Message::Text(text)) => {
                            if let Some(event) = parse_fill_event(&text, token_yes, token_no, &mut tracked) {
                                if tx.blocking_send(event).is_err() {
                                    eprintln!("[FILL] channel closed, exiting thread");
                                    return;
                                }
                            }
                        }
                        Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                        Ok(Message::Close(_)) => {
                            eprintln!("[FILL] server closed connection, reconnecting");
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            eprintln!("[FILL] read error: {}, reconnecting", e);
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                eprintln!("[FILL] connect failed: {}, retrying in {:?}", e, backoff);
            }
        }

        thread::sleep(backoff);
        backoff = (backoff * 2).min(Duration::from_secs(30));
    }
}

/// Parse one "trade" message, returning at most one fill event per tracked
/// order id — an order id is removed from `tracked` the moment its fill is
/// reported, so replays of the same trade message never double-fill.
fn parse_fill_event(
    text: &str,
    token_yes: &str,
    token_no: &str,
    tracked: &mut std::collections::HashSet<String>,
) -> Option<FillEvent> {
    let trimmed = text.trim();
    if trimmed == "PONG" || trimmed.is_empty() {
        return None;
    }
    let v: serde_json::Value = serde_json::from_str(trimmed).ok()?;

    let event_type = v.get("type").and_then(|t| t.as_str()).unwrap_or("");
    if event_type == "order" {
        handle_order_update(&v, tracked);
        return None;
    }
    if event_type != "trade" {
        return None;
    }

    if let Some(taker_id) = v.get("taker_order_id").and_then(|s| s.as_str()) {
        if tracked.remove(taker_id) {
            let price = v.get("price").and_then(numeric).unwrap_or(0.0);
            let size = v.get("size").and_then(numeric).unwrap_or(0.0);
            let asset_id = v.get("asset_id").and_then(|s| s.as_str());
            let Some(outcome) = asset_id.and_then(|a| asset_to_outcome(a, token_yes, token_no)) else {
                eprintln!("[FILL] dropping fill for {}: asset_id {:?} matches neither YES nor NO token", taker_id, asset_id);
                tracked.insert(taker_id.to_string());
                return None;
            };
            return Some(FillEvent {
                fill: Fill { order_id: taker_id.to_string(), outcome, price, size },
                reported_outcome: outcome,
            });
        }
    }

    let makers = v.get("maker_orders").and_then(|m| m.as_array())?;
    for maker in makers {
        let Some(order_id) = maker.get("order_id").and_then(|s| s.as_str()) else {
            continue;
        };
        if !tracked.remove(order_id) {
            continue;
        }
        let price = maker.get("price").and_then(numeric).or_else(|| v.get("price").and_then(numeric)).unwrap_or(0.0);
        let size = maker
            .get("matched_amount")
            .and_then(numeric)
            .or_else(|| maker.get("size").and_then(numeric))
            .unwrap_or(0.0);
        let asset_id = maker.get("asset_id").and_then(|s| s.as_str()).or_else(|| v.get("asset_id").and_then(|s| s.as_str()));
        let Some(outcome) = asset_id.and_then(|a| asset_to_outcome(a, token_yes, token_no)) else {
            eprintln!("[FILL] dropping fill for {}: asset_id {:?} matches neither YES nor NO token", order_id, asset_id);
            tracked.insert(order_id.to_string());
            continue;
        };

        return Some(FillEvent {
            fill: Fill { order_id: order_id.to_string(), outcome, price, size },
            reported_outcome: outcome,
        });
    }

    None
}

/// Reconcile resting-order lifecycle events so `tracked` stays in sync with
/// what the engine has actually placed. Only PLACEMENT adds to the set —
/// everything else is informational.
fn handle_order_update(v: &serde_json::Value, tracked: &mut std::collections::HashSet<String>) {
    let update_type = v.get("event_type").or_else(|| v.get("status")).and_then(|s| s.as_str()).unwrap_or("");
    let Some(order_id) = v.get("order_id").and_then(|s| s.as_str()) else {
        return;
    };
    match update_type.to_uppercase().as_str() {
        "PLACEMENT" => {
            tracked.insert(order_id.to_string());
        }
        "CANCELLATION" => {
            tracked.remove(order_id);
        }
        _ => {}
    }
}

fn numeric(v: &serde_json::Value) -> Option<f64> {
    v.as_f64().or_else(|| v.as_str().and_then(|s| s.parse().ok()))
}

/// Map a reported asset_id to the outcome it belongs to, given this
/// session's two token ids. `None` means the trade message named neither —
/// the caller drops the fill rather than guess.
fn asset_to_outcome(asset_id: &str, token_yes: &str, token_no: &str) -> Option<Outcome> {
    if asset_id == token_yes {
        Some(Outcome::Yes)
    } else if asset_id == token_no {
        Some(Outcome::No)
    } else {
        None
    }
}
