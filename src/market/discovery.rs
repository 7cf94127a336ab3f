use crate::config::Config;
use crate::types::MarketInfo;

/// Minimum time remaining for a discovered market to be worth entering.
const MIN_REMAINING_SECONDS: i64 = 120;

/// Find a tradeable market: either the pinned one from config, or the
/// soonest-expiring still-open binary market from the Gamma API with at
/// least `MIN_REMAINING_SECONDS` left.
pub async fn discover_next_market(client: &reqwest::Client, config: &Config) -> Result<MarketInfo, String> {
    if config.has_pinned_market() {
        eprintln!("[DISCOVERY] using pinned market {}", config.condition_id);
        return Ok(MarketInfo {
            condition_id: config.condition_id.clone(),
            token_id_yes: config.token_id_yes.clone(),
            token_id_no: config.token_id_no.clone(),
            end_ms: chrono::Utc::now().timestamp_millis() + config.market_duration_minutes * 60_000,
        });
    }

    let url = format!(
        "{}/markets?active=true&closed=false&limit=100&order=endDate&ascending=true",
        config.gamma_api_url,
    );
    eprintln!("[DISCOVERY] fetching {}", url);

    let resp = client.get(&url).send().await.map_err(|e| format!("HTTP error: {}", e))?;
    let text = resp.text().await.map_err(|e| format!("body error: {}", e))?;
    let markets: serde_json::Value = serde_json::from_str(&text).map_err(|e| format!("JSON error: {}", e))?;

    let markets_arr = markets.as_array().ok_or("unexpected response shape")?;

    let now_ms = chrono::Utc::now().timestamp_millis();
    let mut candidates: Vec<MarketInfo> = markets_arr
        .iter()
        .filter_map(|m| parse_market(m))
        .filter(|m| (m.end_ms - now_ms) / 1000 >= MIN_REMAINING_SECONDS)
        .collect();

    candidates.sort_by_key(|m| m.end_ms);

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| "no tradeable binary markets found".to_string())
}

fn parse_market(market: &serde_json::Value) -> Option<MarketInfo> {
    let condition_id = market.get("conditionId").and_then(|v| v.as_str())?.to_string();
    let end_ms = market
        .get("endDate")
        .and_then(|v| v.as_str())
        .and_then(parse_datetime_ms)?;

    let outcomes_str = market.get("outcomes").and_then(|v| v.as_str()).unwrap_or("");
    let tokens_str = market.get("clobTokenIds").and_then(|v| v.as_str()).unwrap_or("");

    let outcomes: Vec<String> = serde_json::from_str(outcomes_str).ok()?;
    let tokens: Vec<String> = serde_json::from_str(tokens_str).ok()?;
    if outcomes.len() != 2 || tokens.len() != 2 {
        return None;
    }

    let (mut token_yes, mut token_no) = (String::new(), String::new());
    for (outcome, token) in outcomes.iter().zip(tokens.iter()) {
        let lower = outcome.to_lowercase();
        if lower.contains("yes") {
            token_yes = token.clone();
        } else if lower.contains("no") {
            token_no = token.clone();
        }
    }
    if token_yes.is_empty() || token_no.is_empty() {
        return None;
    }

    Some(MarketInfo { condition_id, token_id_yes: token_yes, token_id_no: token_no, end_ms })
}

/// Parse a Gamma API date string into epoch milliseconds. Tries RFC3339
/// first, then the two plain-datetime formats Gamma sometimes returns.
fn parse_datetime_ms(s: &str) -> Option<i64> {
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, fmt) {
            return Some(ndt.and_utc().timestamp_millis());
        }
    }
    s.parse::<i64>().ok()
}
