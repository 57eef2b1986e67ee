use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ApiConfig;
use crate::domain::MarketSnapshot;
use crate::error::Result;

/// Source of market snapshots for the scan cycle
#[async_trait]
pub trait MarketFeed: Send + Sync {
    async fn fetch_snapshots(&self) -> Result<Vec<MarketSnapshot>>;
}

/// REST client for the Gamma markets API.
///
/// This is the parsing boundary: venue records arrive as loosely typed JSON
/// (stringified price arrays, numbers-as-strings) and leave as validated
/// `MarketSnapshot`s. A malformed record drops that one market, never the
/// fetch.
#[derive(Debug, Clone)]
pub struct GammaClient {
    http: reqwest::Client,
    base_url: String,
    fetch_limit: u32,
}

impl GammaClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            base_url: config.gamma_url.trim_end_matches('/').to_string(),
            fetch_limit: config.fetch_limit,
        })
    }
}

#[async_trait]
impl MarketFeed for GammaClient {
    async fn fetch_snapshots(&self) -> Result<Vec<MarketSnapshot>> {
        let url = format!("{}/markets", self.base_url);
        let raw: Vec<RawMarket> = self
            .http
            .get(&url)
            .query(&[
                ("limit", self.fetch_limit.to_string()),
                ("active", "true".to_string()),
                ("closed", "false".to_string()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let total = raw.len();
        let now = Utc::now();
        let snapshots: Vec<MarketSnapshot> = raw
            .into_iter()
            .filter_map(|market| market.into_snapshot(now))
            .collect();

        info!(
            fetched = total,
            parsed = snapshots.len(),
            "fetched market snapshots"
        );
        Ok(snapshots)
    }
}

/// Venue-shaped market record, before validation
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMarket {
    id: Option<String>,
    question: Option<String>,
    /// JSON array of price strings, itself often string-encoded
    outcome_prices: Option<Value>,
    volume: Option<Value>,
    #[serde(rename = "volume24hr")]
    volume_24hr: Option<Value>,
    end_date: Option<String>,
    #[serde(default)]
    closed: bool,
    #[serde(default)]
    resolved: bool,
}

impl RawMarket {
    fn into_snapshot(self, fetched_at: DateTime<Utc>) -> Option<MarketSnapshot> {
        let market_id = self.id?;
        let question = self.question.unwrap_or_default();

        let (yes_price, no_price) = match parse_outcome_prices(self.outcome_prices.as_ref()) {
            Some(prices) => prices,
            None => {
                debug!(%market_id, "dropping market with unparseable prices");
                return None;
            }
        };

        let snapshot = MarketSnapshot {
            market_id,
            question,
            yes_price,
            no_price,
            volume_usd: parse_decimal(self.volume.as_ref()).unwrap_or(Decimal::ZERO),
            volume_24h_usd: parse_decimal(self.volume_24hr.as_ref()).unwrap_or(Decimal::ZERO),
            end_date: self
                .end_date
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            closed: self.closed,
            resolved: self.resolved,
            fetched_at,
        };

        if !snapshot.has_valid_prices() {
            debug!(market_id = %snapshot.market_id, "dropping market with out-of-range prices");
            return None;
        }

        Some(snapshot)
    }
}

/// Accept `["0.2", "0.8"]` either as a JSON array or a string-encoded one
fn parse_outcome_prices(value: Option<&Value>) -> Option<(Decimal, Decimal)> {
    let value = value?;
    let list: Vec<String> = match value {
        Value::String(s) => serde_json::from_str(s).ok()?,
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?,
        _ => return None,
    };

    if list.len() < 2 {
        return None;
    }

    let yes = Decimal::from_str(list[0].trim()).ok()?;
    let no = Decimal::from_str(list[1].trim()).ok()?;
    Some((yes, no))
}

/// Venue numerics come as either numbers or strings
fn parse_decimal(value: Option<&Value>) -> Option<Decimal> {
    match value? {
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn raw(json: serde_json::Value) -> RawMarket {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_parses_string_encoded_prices() {
        let market = raw(serde_json::json!({
            "id": "m1",
            "question": "Will it happen?",
            "outcomePrices": "[\"0.20\", \"0.80\"]",
            "volume": "54321.5",
            "volume24hr": 321.0,
            "endDate": "2026-12-31T00:00:00Z",
            "closed": false
        }));

        let snapshot = market.into_snapshot(Utc::now()).unwrap();
        assert_eq!(snapshot.yes_price, dec!(0.20));
        assert_eq!(snapshot.no_price, dec!(0.80));
        assert_eq!(snapshot.volume_usd, dec!(54321.5));
        assert_eq!(snapshot.volume_24h_usd, dec!(321));
        assert!(snapshot.end_date.is_some());
    }

    #[test]
    fn test_parses_plain_array_prices() {
        let market = raw(serde_json::json!({
            "id": "m1",
            "question": "q",
            "outcomePrices": ["0.35", "0.65"],
            "volume": 1000
        }));

        let snapshot = market.into_snapshot(Utc::now()).unwrap();
        assert_eq!(snapshot.yes_price, dec!(0.35));
    }

    #[test]
    fn test_drops_market_without_prices() {
        let market = raw(serde_json::json!({
            "id": "m1",
            "question": "q",
            "volume": "1000"
        }));
        assert!(market.into_snapshot(Utc::now()).is_none());
    }

    #[test]
    fn test_drops_market_with_out_of_range_prices() {
        let market = raw(serde_json::json!({
            "id": "m1",
            "question": "q",
            "outcomePrices": "[\"0.00\", \"1.00\"]",
            "volume": "1000"
        }));
        assert!(market.into_snapshot(Utc::now()).is_none());
    }

    #[test]
    fn test_drops_market_without_id() {
        let market = raw(serde_json::json!({
            "question": "q",
            "outcomePrices": "[\"0.20\", \"0.80\"]"
        }));
        assert!(market.into_snapshot(Utc::now()).is_none());
    }

    #[test]
    fn test_missing_volume_defaults_to_zero() {
        let market = raw(serde_json::json!({
            "id": "m1",
            "question": "q",
            "outcomePrices": "[\"0.20\", \"0.80\"]"
        }));
        let snapshot = market.into_snapshot(Utc::now()).unwrap();
        assert_eq!(snapshot.volume_usd, Decimal::ZERO);
    }
}
