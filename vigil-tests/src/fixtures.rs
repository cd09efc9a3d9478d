//! Pre-wired component stacks and data factories for tests

use crate::mocks::ScriptedProber;
use std::sync::{Arc, Once};
use std::time::Duration;
use vigil_core::{HealthThresholds, ItemSource, StageCatalog};
use vigil_runtime::{
    AlertLifecycleManager, AlertManagerConfig, ChannelSender, HealthService,
    HealthStatusAggregator, NotificationDispatcher, Prober, StageTracker, TargetConfig,
};
use vigil_storage::MemoryStore;

static TRACING: Once = Once::new();

/// Install a test-friendly tracing subscriber once per process
///
/// Honors `RUST_LOG`; defaults to warnings only so test output stays
/// readable.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

/// A manually sourced work item
pub fn manual_source() -> ItemSource {
    ItemSource::Manual {
        user: "tester".to_string(),
    }
}

/// An automation-sourced work item
pub fn automation_source() -> ItemSource {
    ItemSource::Automation {
        workflow: "nightly-ingest".to_string(),
    }
}

/// A fully wired monitoring stack over an in-memory store
///
/// Built by [`MonitoringStackBuilder`]; every component shares the same
/// store so tests can assert on persisted state directly.
pub struct MonitoringStack {
    pub store: Arc<MemoryStore>,
    pub tracker: StageTracker,
    pub health: Arc<HealthService>,
    pub alerts: Arc<AlertLifecycleManager>,
}

impl MonitoringStack {
    pub fn builder() -> MonitoringStackBuilder {
        MonitoringStackBuilder::new()
    }
}

/// Builder assembling a [`MonitoringStack`] piece by piece
pub struct MonitoringStackBuilder {
    prober: Arc<dyn Prober>,
    senders: Vec<Arc<dyn ChannelSender>>,
    targets: Vec<TargetConfig>,
    thresholds: HealthThresholds,
    alert_config: AlertManagerConfig,
    catalog: StageCatalog,
}

impl MonitoringStackBuilder {
    fn new() -> Self {
        Self {
            prober: Arc::new(ScriptedProber::healthy()),
            senders: vec![],
            targets: vec![],
            thresholds: HealthThresholds::default(),
            alert_config: AlertManagerConfig::default(),
            catalog: StageCatalog::document_pipeline(),
        }
    }

    pub fn prober(mut self, prober: impl Prober + 'static) -> Self {
        self.prober = Arc::new(prober);
        self
    }

    pub fn sender(mut self, sender: Arc<dyn ChannelSender>) -> Self {
        self.senders.push(sender);
        self
    }

    pub fn target(mut self, service: &str, endpoint: &str) -> Self {
        self.targets.push(
            TargetConfig::new(service, endpoint).with_timeout(Duration::from_millis(500)),
        );
        self
    }

    pub fn thresholds(mut self, thresholds: HealthThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn alert_config(mut self, config: AlertManagerConfig) -> Self {
        self.alert_config = config;
        self
    }

    pub fn build(self) -> MonitoringStack {
        init_tracing();
        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn vigil_storage::Store> = store.clone();

        let aggregator = Arc::new(HealthStatusAggregator::new(
            store_dyn.clone(),
            self.thresholds.clone(),
        ));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            store_dyn.clone(),
            self.senders,
        ));
        let alerts = Arc::new(AlertLifecycleManager::new(
            store_dyn.clone(),
            dispatcher,
            self.thresholds,
            self.alert_config,
        ));
        let health = Arc::new(HealthService::new(
            store_dyn.clone(),
            self.prober,
            aggregator,
            alerts.clone(),
            self.targets,
        ));
        let tracker = StageTracker::new(store_dyn, Arc::new(self.catalog));

        MonitoringStack {
            store,
            tracker,
            health,
            alerts,
        }
    }
}
