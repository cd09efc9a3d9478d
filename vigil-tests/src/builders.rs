//! Fluent builders for constructing test configuration objects

use uuid::Uuid;
use vigil_core::{AlertSeverity, AlertType, ChannelKind};
use vigil_storage::{ChannelConfigModel, ChannelEndpoint};

/// Builder for notification channel configurations
pub struct ChannelConfigBuilder {
    name: String,
    services: Vec<String>,
    alert_types: Vec<AlertType>,
    min_severity: AlertSeverity,
    channels: Vec<ChannelEndpoint>,
    cooldown_minutes: i64,
    suppress_duplicates: bool,
    enabled: bool,
}

impl ChannelConfigBuilder {
    /// A config matching every service and type at Info severity and up
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            services: vec![],
            alert_types: vec![],
            min_severity: AlertSeverity::Info,
            channels: vec![],
            cooldown_minutes: 30,
            suppress_duplicates: true,
            enabled: true,
        }
    }

    /// Restrict the config to the given services
    pub fn services(mut self, services: &[&str]) -> Self {
        self.services = services.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Restrict the config to the given alert types
    pub fn alert_types(mut self, types: &[AlertType]) -> Self {
        self.alert_types = types.to_vec();
        self
    }

    /// Require at least this severity
    pub fn min_severity(mut self, severity: AlertSeverity) -> Self {
        self.min_severity = severity;
        self
    }

    /// Add an enabled channel endpoint
    pub fn channel(mut self, kind: ChannelKind, endpoint: &str) -> Self {
        self.channels.push(ChannelEndpoint {
            kind,
            endpoint: endpoint.to_string(),
            enabled: true,
        });
        self
    }

    /// Add a disabled channel endpoint
    pub fn disabled_channel(mut self, kind: ChannelKind, endpoint: &str) -> Self {
        self.channels.push(ChannelEndpoint {
            kind,
            endpoint: endpoint.to_string(),
            enabled: false,
        });
        self
    }

    /// Set the renotification cooldown
    pub fn cooldown_minutes(mut self, minutes: i64) -> Self {
        self.cooldown_minutes = minutes;
        self
    }

    /// Allow repeated notifications inside the cooldown window
    pub fn without_duplicate_suppression(mut self) -> Self {
        self.suppress_duplicates = false;
        self
    }

    /// Disable the whole config
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn build(self) -> ChannelConfigModel {
        ChannelConfigModel {
            id: Uuid::new_v4(),
            name: self.name,
            services: self.services,
            alert_types: self.alert_types,
            min_severity: self.min_severity,
            channels: self.channels,
            cooldown_minutes: self.cooldown_minutes,
            suppress_duplicates: self.suppress_duplicates,
            enabled: self.enabled,
        }
    }
}
