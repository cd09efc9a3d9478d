//! Mock implementations for the probing and notification seams

use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;
use vigil_core::{ChannelKind, ProbeOutcome};
use vigil_runtime::{ChannelSender, Prober};
use vigil_storage::AlertModel;

/// Prober that replays a scripted sequence of outcomes
///
/// Outcomes are consumed in order; once only one remains it is repeated
/// for every further probe, so a script can end in a steady state.
pub struct ScriptedProber {
    outcomes: Mutex<Vec<ProbeOutcome>>,
}

impl ScriptedProber {
    pub fn new(outcomes: Vec<ProbeOutcome>) -> Self {
        assert!(!outcomes.is_empty(), "script needs at least one outcome");
        let mut reversed = outcomes;
        reversed.reverse();
        Self {
            outcomes: Mutex::new(reversed),
        }
    }

    /// A prober that always succeeds quickly
    pub fn healthy() -> Self {
        Self::new(vec![ProbeOutcome::success(200, 10)])
    }

    /// A prober that fails `failures` times, then succeeds forever
    pub fn failing_then_recovering(failures: usize) -> Self {
        let mut outcomes: Vec<ProbeOutcome> = (0..failures)
            .map(|_| ProbeOutcome::failure(None, 10, "connection refused"))
            .collect();
        outcomes.push(ProbeOutcome::success(200, 10));
        Self::new(outcomes)
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, _endpoint: &str, _timeout: Duration) -> ProbeOutcome {
        let mut outcomes = self.outcomes.lock().unwrap();
        if outcomes.len() > 1 {
            outcomes.pop().unwrap()
        } else {
            outcomes.last().cloned().unwrap()
        }
    }
}

/// A delivered (or refused) notification captured by [`RecordingSender`]
#[derive(Debug, Clone)]
pub struct SentNotification {
    pub endpoint: String,
    pub alert_title: String,
}

/// Channel sender that records every delivery instead of sending it
pub struct RecordingSender {
    kind: ChannelKind,
    refuse: bool,
    sent: Mutex<Vec<SentNotification>>,
}

impl RecordingSender {
    pub fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            refuse: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// A sender whose every delivery fails
    pub fn refusing(kind: ChannelKind) -> Self {
        Self {
            kind,
            refuse: true,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Everything this sender was asked to deliver, in order
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChannelSender for RecordingSender {
    fn kind(&self) -> ChannelKind {
        self.kind
    }

    async fn send(&self, endpoint: &str, alert: &AlertModel) -> Result<(), String> {
        self.sent.lock().unwrap().push(SentNotification {
            endpoint: endpoint.to_string(),
            alert_title: alert.title.clone(),
        });
        if self.refuse {
            Err("delivery refused".to_string())
        } else {
            Ok(())
        }
    }
}
