use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::AiConfig;
use crate::domain::{MarketSnapshot, Signal};
use crate::error::{Result, SkewError};

/// Verdict from the qualitative gate
#[derive(Debug, Clone)]
pub struct AiVerdict {
    pub approve: bool,
    pub confidence: Decimal,
    pub reason: String,
}

/// Optional qualitative filter consulted after a signal fires.
///
/// The gate is fail-open by contract: the engine treats an error from
/// `review` as approval with neutral confidence, so a flaky or absent
/// reviewer can never block trading.
#[async_trait]
pub trait AiGate: Send + Sync {
    async fn review(&self, snapshot: &MarketSnapshot, signal: &Signal) -> Result<AiVerdict>;
}

/// The disabled gate: approves everything at neutral confidence. Selecting
/// this at construction time keeps the "no reviewer" path a first-class,
/// testable variant.
#[derive(Debug, Default)]
pub struct ApproveAll;

#[async_trait]
impl AiGate for ApproveAll {
    async fn review(&self, _snapshot: &MarketSnapshot, _signal: &Signal) -> Result<AiVerdict> {
        Ok(AiVerdict {
            approve: true,
            confidence: dec!(0.5),
            reason: "gate disabled".to_string(),
        })
    }
}

/// Reviewer backed by an OpenAI-compatible chat completions endpoint
pub struct ChatGate {
    http: reqwest::Client,
    config: AiConfig,
    api_key: String,
}

impl ChatGate {
    /// Build from config, reading the API key from the configured environment
    /// variable. Returns None when the key is absent.
    pub fn from_env(config: AiConfig) -> Option<Self> {
        let api_key = std::env::var(&config.api_key_env).ok()?;
        if api_key.is_empty() {
            return None;
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .ok()?;

        Some(Self {
            http,
            config,
            api_key,
        })
    }

    fn build_prompt(snapshot: &MarketSnapshot, signal: &Signal) -> String {
        format!(
            "You're evaluating a prediction market trade. Be brief.\n\n\
             Market: {}\n\
             End Date: {}\n\
             Proposed: buy {} at {:.0}%\n\
             Strategy: mean reversion - betting price will move toward 50%\n\n\
             Is this a reasonable trade? Consider:\n\
             1. Is the market still active/relevant (not already resolved or stale)?\n\
             2. Does the extreme price suggest genuine mispricing vs correct pricing of an unlikely outcome?\n\
             3. Any obvious red flags?\n\n\
             Respond with JSON only:\n\
             {{\"approve\": true/false, \"confidence\": 0.0-1.0, \"reason\": \"brief reason\"}}",
            snapshot.question,
            snapshot
                .end_date
                .map(|d| d.to_rfc3339())
                .unwrap_or_else(|| "unknown".to_string()),
            signal.side,
            signal.entry_price * dec!(100),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct RawVerdict {
    #[serde(default)]
    approve: bool,
    #[serde(default = "default_confidence")]
    confidence: f64,
    #[serde(default)]
    reason: String,
}

fn default_confidence() -> f64 {
    0.5
}

#[async_trait]
impl AiGate for ChatGate {
    async fn review(&self, snapshot: &MarketSnapshot, signal: &Signal) -> Result<AiVerdict> {
        let body = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": Self::build_prompt(snapshot, signal)}],
            "temperature": 0.3,
            "max_tokens": 150,
        });

        let response: ChatResponse = self
            .http
            .post(&self.config.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .first()
            .map(|c| c.message.content.trim())
            .ok_or_else(|| SkewError::AiGate("empty completion".to_string()))?;

        let verdict: RawVerdict = serde_json::from_str(strip_code_fence(content))
            .map_err(|e| SkewError::AiGate(format!("unparseable verdict: {}", e)))?;

        let confidence = Decimal::try_from(verdict.confidence)
            .unwrap_or(dec!(0.5))
            .clamp(Decimal::ZERO, Decimal::ONE);

        if verdict.approve {
            info!(
                market_id = %snapshot.market_id,
                %confidence,
                reason = %verdict.reason,
                "ai approved"
            );
        } else {
            debug!(
                market_id = %snapshot.market_id,
                reason = %verdict.reason,
                "ai rejected"
            );
        }

        Ok(AiVerdict {
            approve: verdict.approve,
            confidence,
            reason: verdict.reason,
        })
    }
}

/// Models often wrap JSON in a markdown fence
fn strip_code_fence(content: &str) -> &str {
    let content = content.trim();
    let Some(inner) = content.strip_prefix("```") else {
        return content;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.trim_end_matches('`').trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;
    use chrono::Utc;

    fn snapshot() -> MarketSnapshot {
        MarketSnapshot {
            market_id: "m1".to_string(),
            question: "Will it happen?".to_string(),
            yes_price: dec!(0.20),
            no_price: dec!(0.80),
            volume_usd: dec!(50000),
            volume_24h_usd: dec!(5000),
            end_date: None,
            closed: false,
            resolved: false,
            fetched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_approve_all_is_neutral() {
        let gate = ApproveAll;
        let signal = Signal::new(Side::Yes, dec!(0.20));
        let verdict = gate.review(&snapshot(), &signal).await.unwrap();
        assert!(verdict.approve);
        assert_eq!(verdict.confidence, dec!(0.5));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_raw_verdict_defaults() {
        let verdict: RawVerdict = serde_json::from_str("{\"approve\": true}").unwrap();
        assert!(verdict.approve);
        assert_eq!(verdict.confidence, 0.5);
    }
}
