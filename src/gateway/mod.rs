//! Provider gateway for Groq chat completions.
//!
//! There is deliberately no retry loop here: a failed scoring call is absorbed
//! into a per-facet fallback score further up, and pacing against the provider's
//! rate limits is handled by the engine's inter-group delay.

pub mod error;
pub mod groq;
pub mod types;
pub mod usage;

use std::sync::Arc;

use groq::{ChatProvider, GroqAdapter as Adapter};
use usage::{ProviderCallRecord, UsageSink as UsageSinkTrait};

pub use error::{ErrorContext, ProviderError};
pub use groq::{GroqAdapter, DEFAULT_GROQ_BASE_URL};
pub use types::*;
pub use usage::{CallStatus, NoopUsageSink, StderrUsageSink, UsageSink};

/// Object-safe chat entry point. The oracle client depends on this rather than
/// a concrete gateway so tests can substitute a stub.
#[async_trait::async_trait]
pub trait ChatGateway: Send + Sync {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Gateway that forwards to the Groq adapter and records usage per call.
pub struct ProviderGateway<U: UsageSinkTrait> {
    adapter: Adapter,
    usage_sink: Arc<U>,
}

#[async_trait::async_trait]
impl<U: UsageSinkTrait> ChatGateway for ProviderGateway<U> {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        ProviderGateway::chat(self, req).await
    }
}

impl<U: UsageSinkTrait> ProviderGateway<U> {
    pub fn from_env(usage_sink: Arc<U>) -> Result<Self, ProviderError> {
        let adapter = Adapter::from_env()?;
        Ok(Self {
            adapter,
            usage_sink,
        })
    }

    pub fn with_adapter(adapter: Adapter, usage_sink: Arc<U>) -> Self {
        Self {
            adapter,
            usage_sink,
        }
    }

    pub async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        match self.adapter.chat(&req).await {
            Ok(resp) => {
                self.record_usage(&req, &resp, None).await;
                Ok(resp)
            }
            Err(err) => {
                let code = err.code().to_string();
                self.record_usage(&req, &ChatResponse::empty(), Some(code))
                    .await;
                Err(err)
            }
        }
    }

    async fn record_usage(&self, req: &ChatRequest, resp: &ChatResponse, error_code: Option<String>) {
        let record = ProviderCallRecord::new(
            "groq",
            "chat/completions",
            req.model.clone(),
            req.attribution.caller,
        )
        .tokens(resp.input_tokens as i32, resp.output_tokens as i32)
        .evaluation(req.attribution.evaluation_id)
        .latency(resp.latency.as_millis() as i32);

        let record = if let Some(code) = error_code {
            record.error(code)
        } else {
            record
        };

        self.usage_sink.record(record).await;
    }
}
