mod config;
mod engine;
mod exchange;
mod feeds;
mod inventory;
mod market;
mod orderbook;
mod persist;
mod policy;
mod types;

use std::sync::Arc;

use tokio::sync::mpsc;

use config::Config;
use engine::runner::Engine;
use engine::state::StrategyState;
use exchange::ClobExchangeClient;
use feeds::fills::{spawn_fill_stream, ApiCreds};
use feeds::market::market_feed;
use market::discovery::discover_next_market;
use types::Fill;

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("[MAIN] fatal: {}", e);
            std::process::exit(1);
        }
    };

    eprintln!("╔══════════════════════════════════════════════════╗");
    eprintln!("║  Box-spread market maker");
    eprintln!("║  c_target={:.3} max_exposure={:.0} range=[{:.2},{:.2}]", config.c_target, config.max_exposure, config.range_min, config.range_max);
    eprintln!("╚══════════════════════════════════════════════════╝");

    let http = reqwest::Client::new();
    let market = match discover_next_market(&http, &config).await {
        Ok(m) => m,
        Err(e) => {
            eprintln!("[MAIN] market discovery failed: {}", e);
            std::process::exit(1);
        }
    };
    eprintln!(
        "[MAIN] trading condition_id={} end_ms={} yes={} no={}",
        market.condition_id, market.end_ms, market.token_id_yes, market.token_id_no
    );

    let exchange = match ClobExchangeClient::connect(&config).await {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("[MAIN] exchange connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let ledger = persist::load_ledger(&config.state_file);
    let started_at = config::now_ms();
    let state = StrategyState::new(market.end_ms, ledger, started_at);
    let engine = Arc::new(Engine::new(config.clone(), exchange, state));

    let (book_tx, mut book_rx) = mpsc::channel(1024);
    let book_handle = tokio::spawn(market_feed(
        book_tx,
        config.clob_ws_url.clone(),
        market.token_id_yes.clone(),
        market.token_id_no.clone(),
    ));

    let (fill_tx, mut fill_rx) = mpsc::channel::<feeds::fills::FillEvent>(256);
    let creds = ApiCreds {
        api_key: std::env::var("POLYMARKET_API_KEY").unwrap_or_default(),
        secret: std::env::var("POLYMARKET_API_SECRET").unwrap_or_default(),
        passphrase: std::env::var("POLYMARKET_API_PASSPHRASE").unwrap_or_default(),
    };
    let mut ws_base = config.clob_ws_url.trim_end_matches('/').to_string();
    if let Some(stripped) = ws_base.strip_suffix("/ws") {
        ws_base = stripped.to_string();
    }
    let fill_ws_url = format!("{}/ws/user", ws_base);
    let _fill_thread = spawn_fill_stream(
        fill_ws_url,
        creds,
        market.token_id_yes.clone(),
        market.token_id_no.clone(),
        fill_tx,
    );

    let persist_engine = engine.clone();
    let persist_config = config.clone();
    let persist_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(tokio::time::Duration::from_secs(persist_config.state_persist_interval));
        loop {
            interval.tick().await;
            let state = persist_engine.state.lock().await;
            persist::save_ledger(&persist_config.state_file, &state.inventory);
        }
    });

    let mut shutdown = Box::pin(tokio::signal::ctrl_c());

    loop {
        tokio::select! {
            update = book_rx.recv() => {
                match update {
                    Some(update) => engine.on_book(update.outcome, update.snapshot).await,
                    None => {
                        eprintln!("[MAIN] book stream ended, shutting down");
                        break;
                    }
                }
            }
            event = fill_rx.recv() => {
                match event {
                    Some(event) => engine.on_fill(Fill { outcome: event.reported_outcome, ..event.fill }, event.reported_outcome).await,
                    None => {
                        eprintln!("[MAIN] fill stream ended, shutting down");
                        break;
                    }
                }
            }
            _ = &mut shutdown => {
                eprintln!("[MAIN] shutdown signal received");
                break;
            }
            _ = tokio::time::sleep(tokio::time::Duration::from_secs(1)) => {
                engine.step().await;
            }
        }

        let stopped = { engine.state.lock().await.mode == engine::state::Mode::Stopped };
        if stopped {
            eprintln!("[MAIN] engine stopped, exiting main loop");
            break;
        }
    }

    engine.final_exit("process shutdown").await;
    engine.flatten().await;

    {
        let state = engine.state.lock().await;
        persist::save_ledger(&config.state_file, &state.inventory);
    }

    book_handle.abort();
    persist_handle.abort();
    eprintln!("[MAIN] shutdown complete");
}
