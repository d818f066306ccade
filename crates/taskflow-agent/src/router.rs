use async_trait::async_trait;
use tracing::{info, warn};

use crate::provider::{CompletionRequest, EventStream, LlmProvider, ProviderError};

/// Configuration for a single provider slot inside the ProviderRouter.
pub struct ProviderSlot {
    /// The LLM provider to try.
    pub provider: Box<dyn LlmProvider>,
    /// Retries after the first attempt before moving to the next provider.
    pub max_retries: u32,
}

impl ProviderSlot {
    pub fn new(provider: Box<dyn LlmProvider>, max_retries: u32) -> Self {
        Self {
            provider,
            max_retries,
        }
    }
}

/// Routes stream requests across providers with retry and failover.
///
/// Only failures to *open* a stream are retried. Once a stream is handed
/// back, mid-stream errors belong to the caller.
pub struct ProviderRouter {
    name: String,
    slots: Vec<ProviderSlot>,
}

impl ProviderRouter {
    /// Create a new router with the given priority-ordered provider slots.
    /// Unconfigured providers are dropped; the router may end up empty, in
    /// which case `is_configured()` is false.
    pub fn new(name: impl Into<String>, slots: Vec<ProviderSlot>) -> Self {
        let slots = slots
            .into_iter()
            .filter(|s| s.provider.is_configured())
            .collect();
        Self {
            name: name.into(),
            slots,
        }
    }
}

#[async_trait]
impl LlmProvider for ProviderRouter {
    fn name(&self) -> &str {
        match self.slots.as_slice() {
            [only] => only.provider.name(),
            _ => &self.name,
        }
    }

    fn is_configured(&self) -> bool {
        !self.slots.is_empty()
    }

    async fn send_stream(&self, req: &CompletionRequest) -> Result<EventStream, ProviderError> {
        let mut last_err: Option<ProviderError> = None;

        for slot in &self.slots {
            let provider_name = slot.provider.name();

            for attempt in 0..=slot.max_retries {
                match slot.provider.send_stream(req).await {
                    Ok(stream) => {
                        if attempt > 0 {
                            info!(
                                provider = %provider_name,
                                attempt,
                                "stream opened after retry"
                            );
                        }
                        return Ok(stream);
                    }
                    Err(e) => {
                        warn!(
                            provider = %provider_name,
                            attempt,
                            err = %e,
                            "provider send_stream failed"
                        );

                        let retriable = e.is_retriable();
                        last_err = Some(e);
                        if !retriable {
                            break;
                        }

                        if attempt < slot.max_retries {
                            // small back-off between retries on the same provider
                            tokio::time::sleep(tokio::time::Duration::from_millis(
                                200 * (attempt as u64 + 1),
                            ))
                            .await;
                        }
                    }
                }
            }

            info!(
                provider = %provider_name,
                "stream provider exhausted, trying next provider"
            );
        }

        Err(last_err.unwrap_or_else(|| {
            ProviderError::Unavailable("no provider configured".to_string())
        }))
    }
}
