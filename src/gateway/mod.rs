//! Provider gateway for OpenRouter chat completions.
//!
//! [`ProviderGateway`] wraps a [`ChatProvider`] with retry/backoff and usage
//! recording. Callers depend on the [`ChatGateway`] trait so tests can swap
//! in a scripted gateway.

pub mod error;
pub mod openrouter;
pub mod pricing;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use openrouter::{ChatProvider, OpenRouterAdapter};
use usage::ProviderCallRecord;

pub use error::{ErrorContext, ProviderError};
pub use pricing::{chat_cost, get_pricing, ModelPricing};
pub use types::*;
pub use usage::{MemoryUsageSink, NoopUsageSink, TracingUsageSink, UsageSink};

#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Upper bound on any single wait, including server Retry-After hints.
    pub max_retry_delay: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            retry_base_delay: Duration::from_secs(1),
            max_retry_delay: Duration::from_secs(30),
        }
    }
}

pub struct ProviderGateway<U: UsageSink, P: ChatProvider = OpenRouterAdapter> {
    provider: P,
    usage_sink: Arc<U>,
    config: GatewayConfig,
}

#[async_trait::async_trait]
impl<U: UsageSink, P: ChatProvider> ChatGateway for ProviderGateway<U, P> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSink> ProviderGateway<U, OpenRouterAdapter> {
    pub fn from_env(usage_sink: Arc<U>, config: GatewayConfig) -> Result<Self, ProviderError> {
        Ok(Self::with_config(
            OpenRouterAdapter::from_env()?,
            usage_sink,
            config,
        ))
    }
}

impl<U: UsageSink, P: ChatProvider> ProviderGateway<U, P> {
    pub fn with_config(provider: P, usage_sink: Arc<U>, config: GatewayConfig) -> Self {
        Self {
            provider,
            usage_sink,
            config,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.provider.chat(&req).await {
                Ok(resp) => {
                    self.record_usage(&req, &resp, attempt, None).await;
                    return Ok(resp);
                }
                Err(err) => {
                    self.record_usage(&req, &ChatResponse::empty(), attempt, Some(&err))
                        .await;

                    if !err.is_retryable() || attempt >= self.config.max_retries {
                        return Err(err);
                    }

                    let delay = err
                        .retry_after()
                        .unwrap_or_else(|| backoff_delay(self.config.retry_base_delay, attempt))
                        .min(self.config.max_retry_delay);
                    warn!(
                        model = req.model.model_id(),
                        attempt,
                        error_code = err.code(),
                        delay_ms = delay.as_millis() as u64,
                        "retrying chat request"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn record_usage(
        &self,
        req: &ChatRequest,
        resp: &ChatResponse,
        attempt: u32,
        error: Option<&ProviderError>,
    ) {
        let record = ProviderCallRecord::new(
            req.model.provider(),
            "chat/completions",
            req.model.model_id(),
            req.attribution.caller,
        )
        .tokens(resp.input_tokens, resp.output_tokens)
        .cost(resp.cost_nanodollars)
        .upstream_cost(resp.upstream_cost_nanodollars)
        .session(req.attribution.session_id.clone())
        .latency(resp.latency.as_millis() as u64)
        .attempt(attempt);

        let record = match error {
            Some(err) => record
                .error(err.code())
                .request_id(err.request_id().map(str::to_string)),
            None => record.request_id(resp.request_id.clone()),
        };
        self.usage_sink.record(record).await;
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let multiplier = 2u32.pow(attempt.min(5));
    base * multiplier
}
