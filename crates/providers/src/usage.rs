//! Usage tracking: a provider decorator that records token usage and
//! latency for every successful call.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rivet_core::error::ProviderError;
use rivet_core::provider::{Provider, ProviderRequest, ProviderResponse, Usage};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::debug;

/// One successful model call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageRecord {
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub usage: Usage,
    pub latency_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// A sink for usage records. Recording must not fail the call.
pub trait UsageTracker: Send + Sync {
    fn record(&self, record: UsageRecord);
}

#[derive(Debug, Default)]
pub struct InMemoryUsageTracker {
    records: Mutex<Vec<UsageRecord>>,
}

impl InMemoryUsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<UsageRecord> {
        self.lock().clone()
    }

    /// Token totals per model.
    pub fn totals_by_model(&self) -> BTreeMap<String, Usage> {
        let mut totals: BTreeMap<String, Usage> = BTreeMap::new();
        for record in self.lock().iter() {
            let entry = totals.entry(record.model.clone()).or_default();
            entry.prompt_tokens += record.usage.prompt_tokens;
            entry.completion_tokens += record.usage.completion_tokens;
            entry.total_tokens += record.usage.total_tokens;
        }
        totals
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<UsageRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl UsageTracker for InMemoryUsageTracker {
    fn record(&self, record: UsageRecord) {
        self.lock().push(record);
    }
}

/// Wraps any provider and reports usage to a [`UsageTracker`].
pub struct UsageTrackingProvider {
    inner: Arc<dyn Provider>,
    tracker: Arc<dyn UsageTracker>,
}

impl UsageTrackingProvider {
    pub fn new(inner: Arc<dyn Provider>, tracker: Arc<dyn UsageTracker>) -> Self {
        Self { inner, tracker }
    }
}

#[async_trait]
impl Provider for UsageTrackingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn chat(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let requested_model = request.model.clone();
        let session_id = request.session_id.clone();
        let started = Instant::now();

        let response = self.inner.chat(request).await?;

        if let Some(usage) = response.usage {
            let record = UsageRecord {
                provider: self.inner.name().to_string(),
                model: response.model.clone().unwrap_or(requested_model),
                session_id,
                usage,
                latency_ms: started.elapsed().as_millis() as u64,
                timestamp: Utc::now(),
            };
            debug!(
                provider = %record.provider,
                model = %record.model,
                tokens = usage.total_tokens,
                latency_ms = record.latency_ms,
                "Usage recorded"
            );
            self.tracker.record(record);
        }
        Ok(response)
    }

    async fn health_check(&self) -> Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
