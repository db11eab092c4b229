//! OpenRouter model pricing lookup.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;

/// Per-token prices for a model, in USD.
///
/// # Invariant
/// Both prices are finite and `>= 0.0`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PricingInfo {
    pub prompt: f64,
    pub completion: f64,
}

impl PricingInfo {
    /// Build pricing, mapping negative or non-finite prices to zero.
    pub fn new(prompt: f64, completion: f64) -> Self {
        Self {
            prompt: sanitize(prompt),
            completion: sanitize(completion),
        }
    }

    /// Pricing used whenever the real rates are unknown.
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn is_zero(&self) -> bool {
        self.prompt == 0.0 && self.completion == 0.0
    }
}

fn sanitize(price: f64) -> f64 {
    if price.is_finite() && price > 0.0 {
        price
    } else {
        0.0
    }
}

/// Parse a decimal price string as OpenRouter publishes it (e.g. `"0.000003"`).
fn parse_price(raw: &str) -> f64 {
    raw.trim().parse::<f64>().map(sanitize).unwrap_or(0.0)
}

/// Source of per-model pricing.
///
/// Lookups never fail: unknown models and retrieval errors yield
/// [`PricingInfo::zero`].
#[async_trait]
pub trait PricingLookup: Send + Sync {
    async fn pricing_for(&self, model_id: &str) -> PricingInfo;
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
    pricing: Option<ModelPriceStrings>,
}

#[derive(Debug, Deserialize)]
struct ModelPriceStrings {
    prompt: Option<String>,
    completion: Option<String>,
}

/// Live pricing from the OpenRouter models endpoint.
///
/// Every lookup fetches the catalogue again; nothing is cached.
pub struct ModelPricing {
    client: reqwest::Client,
    models_url: String,
}

impl ModelPricing {
    /// Create a pricing lookup against `{base_url}/models`.
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            models_url: format!("{}/models", base_url.trim_end_matches('/')),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Self::new(&config.base_url, config.request_timeout)
    }

    async fn fetch(&self, model_id: &str) -> anyhow::Result<Option<PricingInfo>> {
        let response = self.client.get(&self.models_url).send().await?;
        if !response.status().is_success() {
            anyhow::bail!("Failed to fetch models: HTTP {}", response.status());
        }
        let catalogue: ModelsResponse = response.json().await?;

        let pricing = catalogue
            .data
            .into_iter()
            .find(|m| m.id == model_id)
            .and_then(|m| m.pricing)
            .map(|p| {
                PricingInfo::new(
                    p.prompt.as_deref().map(parse_price).unwrap_or(0.0),
                    p.completion.as_deref().map(parse_price).unwrap_or(0.0),
                )
            });
        Ok(pricing)
    }
}

#[async_trait]
impl PricingLookup for ModelPricing {
    async fn pricing_for(&self, model_id: &str) -> PricingInfo {
        match self.fetch(model_id).await {
            Ok(Some(pricing)) => {
                tracing::debug!(
                    model = %model_id,
                    prompt = pricing.prompt,
                    completion = pricing.completion,
                    "Fetched model pricing"
                );
                pricing
            }
            Ok(None) => {
                tracing::warn!(model = %model_id, "No pricing found for model");
                PricingInfo::zero()
            }
            Err(e) => {
                tracing::warn!(model = %model_id, error = %e, "Error fetching pricing");
                PricingInfo::zero()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn pricing_server(body: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/models"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    fn lookup(server: &MockServer) -> ModelPricing {
        ModelPricing::new(&format!("{}/api/v1", server.uri()), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_price() {
        assert_eq!(parse_price("0.000003"), 0.000003);
        assert_eq!(parse_price(" 0 "), 0.0);
        assert_eq!(parse_price("-1"), 0.0);
        assert_eq!(parse_price("free"), 0.0);
        assert_eq!(parse_price("NaN"), 0.0);
    }

    #[test]
    fn test_pricing_info_is_never_negative() {
        let pricing = PricingInfo::new(-0.5, f64::INFINITY);
        assert!(pricing.is_zero());
    }

    #[tokio::test]
    async fn test_known_model() {
        let server = pricing_server(json!({
            "data": [
                {"id": "other/model", "pricing": {"prompt": "1", "completion": "1"}},
                {"id": "anthropic/claude-3.5-sonnet", "pricing": {"prompt": "0.000003", "completion": "0.000015"}}
            ]
        }))
        .await;

        let pricing = lookup(&server).pricing_for("anthropic/claude-3.5-sonnet").await;
        assert_eq!(pricing, PricingInfo::new(0.000003, 0.000015));
    }

    #[tokio::test]
    async fn test_unknown_model_or_missing_pricing_is_zero() {
        let server = pricing_server(json!({
            "data": [{"id": "no/pricing"}]
        }))
        .await;
        let pricing = lookup(&server);

        assert!(pricing.pricing_for("no/pricing").await.is_zero());
        assert!(pricing.pricing_for("not/listed").await.is_zero());
    }

    #[tokio::test]
    async fn test_partial_pricing_fields() {
        let server = pricing_server(json!({
            "data": [{"id": "half/priced", "pricing": {"prompt": "0.5"}}]
        }))
        .await;

        let pricing = lookup(&server).pricing_for("half/priced").await;
        assert_eq!(pricing, PricingInfo::new(0.5, 0.0));
    }

    #[tokio::test]
    async fn test_http_failure_is_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        assert!(lookup(&server).pricing_for("any/model").await.is_zero());
    }

    #[tokio::test]
    async fn test_malformed_body_is_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"data\": 7}"))
            .mount(&server)
            .await;

        assert!(lookup(&server).pricing_for("any/model").await.is_zero());
    }

    #[tokio::test]
    async fn test_unreachable_host_is_zero() {
        let pricing = ModelPricing::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        assert!(pricing.pricing_for("any/model").await.is_zero());
    }
}
