//! Notification dispatch across configured channels
//!
//! The dispatcher is infallible by contract: a channel that cannot be
//! reached produces a failed [`NotificationAttempt`], never an error that
//! would abort alert creation. Channel transports hang off the
//! [`ChannelSender`] trait so tests can substitute recording fakes.

use crate::{Error, Result};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::{instrument, warn};
use vigil_core::{AlertSeverity, ChannelKind};
use vigil_storage::{AlertModel, NotificationAttempt, Store};

/// Delivers an alert over one kind of channel
#[async_trait]
pub trait ChannelSender: Send + Sync {
    /// The channel kind this sender handles
    fn kind(&self) -> ChannelKind;

    /// Deliver the alert to one endpoint
    async fn send(&self, endpoint: &str, alert: &AlertModel) -> std::result::Result<(), String>;
}

/// Webhook sender posting the alert as JSON
pub struct WebhookSender {
    client: reqwest::Client,
}

impl WebhookSender {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ChannelSender for WebhookSender {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    async fn send(&self, endpoint: &str, alert: &AlertModel) -> std::result::Result<(), String> {
        let payload = serde_json::json!({
            "alert_id": alert.id,
            "type": alert.alert_type,
            "severity": alert.severity,
            "title": alert.title,
            "message": alert.message,
            "service": alert.service,
            "scope": alert.scope,
            "status": alert.status,
            "created_at": alert.created_at,
        });

        let response = self
            .client
            .post(endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|e| format!("webhook request failed: {}", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("webhook returned HTTP {}", response.status()))
        }
    }
}

/// Routes an alert to every matching channel configuration
pub struct NotificationDispatcher {
    store: Arc<dyn Store>,
    senders: Vec<Arc<dyn ChannelSender>>,
}

impl NotificationDispatcher {
    pub fn new(store: Arc<dyn Store>, senders: Vec<Arc<dyn ChannelSender>>) -> Self {
        Self { store, senders }
    }

    /// Deliver an alert to every enabled endpoint of every matching config
    ///
    /// Never fails: delivery problems become failed attempt records, and a
    /// store error fetching configurations logs a warning and yields no
    /// attempts.
    #[instrument(skip(self, alert), fields(alert_id = %alert.id, service = %alert.service))]
    pub async fn dispatch(&self, alert: &AlertModel) -> Vec<NotificationAttempt> {
        let configs = match self.store.channel_configs_for(&alert.service).await {
            Ok(configs) => configs,
            Err(e) => {
                warn!(error = %e, "failed to load channel configs; skipping notification");
                return Vec::new();
            }
        };

        let mut attempts = Vec::new();
        for config in configs.iter().filter(|c| c.matches(alert)) {
            if config.suppress_duplicates {
                if let Some(last) = alert.last_notified_at {
                    if Utc::now() - last < Duration::minutes(config.cooldown_minutes) {
                        warn!(
                            config = %config.name,
                            "notification suppressed inside cooldown window"
                        );
                        continue;
                    }
                }
            }

            for endpoint in config.channels.iter().filter(|c| c.enabled) {
                // Paging is reserved for actionable alerts.
                if endpoint.kind == ChannelKind::Pager && alert.severity == AlertSeverity::Info {
                    continue;
                }
                attempts.push(self.deliver(endpoint.kind, &endpoint.endpoint, alert).await);
            }
        }
        attempts
    }

    async fn deliver(
        &self,
        kind: ChannelKind,
        endpoint: &str,
        alert: &AlertModel,
    ) -> NotificationAttempt {
        let result = match self.senders.iter().find(|s| s.kind() == kind) {
            Some(sender) => sender.send(endpoint, alert).await,
            None => Err(format!("no sender registered for channel {}", kind)),
        };

        if let Err(error) = &result {
            warn!(channel = %kind, endpoint = %endpoint, error = %error, "notification failed");
        }

        NotificationAttempt {
            channel: kind,
            recipient: endpoint.to_string(),
            success: result.is_ok(),
            error: result.err(),
            attempted_at: Utc::now(),
        }
    }
}
