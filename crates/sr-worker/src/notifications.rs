//! Completion event publishers.
//!
//! Each sink implements [`sr_pipeline::Publisher`]. Unlike fire-and-forget
//! status pings, a failed publish is reported back so the pipeline can keep
//! the artifact and mark the job failed.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sr_core::events::CompletionEvent;
use sr_core::{Error, Result};
use sr_pipeline::Publisher;
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// Webhook
// ---------------------------------------------------------------------------

/// POSTs each completion event as JSON to a fixed URL.
pub struct WebhookPublisher {
    client: Client,
    url: String,
}

impl WebhookPublisher {
    /// Create a publisher with a shared [`reqwest::Client`] bounded by `timeout`.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build webhook HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Publisher for WebhookPublisher {
    async fn publish(&self, event: &CompletionEvent) -> Result<()> {
        tracing::info!(url = %self.url, job_id = %event.job_id, "Posting completion webhook");

        match self.client.post(&self.url).json(event).send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                tracing::warn!(url = %self.url, status = %status, body = %body, "Webhook returned non-success status");
                Err(Error::Notify(format!("webhook returned {status}")))
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Failed to contact webhook");
                Err(Error::Notify(format!("webhook request failed: {e}")))
            }
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}

// ---------------------------------------------------------------------------
// In-process broadcast
// ---------------------------------------------------------------------------

/// Sends completion events to in-process subscribers.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    tx: broadcast::Sender<CompletionEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CompletionEvent> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Publisher for BroadcastPublisher {
    /// Fails when nobody is subscribed, since the event would be lost.
    async fn publish(&self, event: &CompletionEvent) -> Result<()> {
        self.tx
            .send(event.clone())
            .map(|receivers| tracing::debug!(receivers, "Completion event broadcast"))
            .map_err(|_| Error::Notify("no subscribers for completion events".into()))
    }

    fn name(&self) -> &str {
        "broadcast"
    }
}

// ---------------------------------------------------------------------------
// Stdout
// ---------------------------------------------------------------------------

/// Writes one JSON line per completion event to standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutPublisher;

#[async_trait]
impl Publisher for StdoutPublisher {
    async fn publish(&self, event: &CompletionEvent) -> Result<()> {
        let line = serde_json::to_string(event)
            .map_err(|e| Error::Notify(format!("failed to serialize event: {e}")))?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}")
            .and_then(|_| out.flush())
            .map_err(|e| Error::Notify(format!("failed to write event: {e}")))
    }

    fn name(&self) -> &str {
        "stdout"
    }
}
