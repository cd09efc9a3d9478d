//! Probe execution against external dependencies
//!
//! A probe observes and reports: its failures are data, never errors.
//! The [`Prober`] trait keeps the transport swappable; [`HttpProber`] is
//! the HTTP implementation. A probe that exceeds its timeout resolves to
//! a failed outcome with an explicit timeout error — identical in
//! downstream effect to a connection failure, never left pending.

use crate::{Error, Result};
use async_trait::async_trait;
use std::time::{Duration, Instant};
use tracing::debug;
use vigil_core::ProbeOutcome;

/// Executes one connectivity check against an endpoint
#[async_trait]
pub trait Prober: Send + Sync {
    /// Probe the endpoint, bounded by `timeout`
    ///
    /// Always returns an outcome; transport failures are captured in it.
    async fn probe(&self, endpoint: &str, timeout: Duration) -> ProbeOutcome;
}

/// HTTP GET prober
pub struct HttpProber {
    client: reqwest::Client,
}

impl HttpProber {
    /// Create a prober with a shared HTTP client
    ///
    /// The per-probe timeout is enforced around each request; the client
    /// itself carries no global timeout.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, endpoint: &str, timeout: Duration) -> ProbeOutcome {
        let start = Instant::now();

        let response = tokio::time::timeout(timeout, self.client.get(endpoint).send()).await;
        let latency_ms = start.elapsed().as_millis() as i64;

        match response {
            Err(_) => ProbeOutcome::failure(
                None,
                timeout.as_millis() as i64,
                format!("probe timed out after {}ms", timeout.as_millis()),
            ),
            Ok(Err(e)) => ProbeOutcome::failure(None, latency_ms, format!("request failed: {}", e)),
            Ok(Ok(response)) => {
                let status = response.status();
                debug!(endpoint = %endpoint, status = %status, latency_ms, "probe completed");
                if status.is_success() {
                    ProbeOutcome::success(status.as_u16(), latency_ms)
                } else {
                    ProbeOutcome::failure(
                        Some(status.as_u16()),
                        latency_ms,
                        format!("HTTP {}", status),
                    )
                }
            }
        }
    }
}
