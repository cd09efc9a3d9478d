//! End-to-end health monitoring and alerting tests
//!
//! Drives scripted probe sequences through the full stack (prober,
//! aggregator, alert manager, dispatcher) and verifies the alerts and
//! notifications that come out the other end.

use std::sync::Arc;
use vigil_core::{
    AlertSeverity, AlertStatus, AlertType, ChannelKind, HealthStatus, ProbeOutcome, TriggerReason,
};
use vigil_runtime::{AlertManagerConfig, ChannelSender};
use vigil_storage::{HealthHistoryFilter, Store};
use vigil_tests::builders::ChannelConfigBuilder;
use vigil_tests::fixtures::MonitoringStack;
use vigil_tests::mocks::{RecordingSender, ScriptedProber};

const OCR_ENDPOINT: &str = "http://ocr.internal/health";

async fn probe(stack: &MonitoringStack, times: usize) {
    for _ in 0..times {
        stack
            .health
            .run_health_check("ocr", TriggerReason::Scheduled)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_three_failures_open_exactly_one_alert() {
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::new(vec![ProbeOutcome::failure(
            None,
            10,
            "connection refused",
        )]))
        .target("ocr", OCR_ENDPOINT)
        .build();

    probe(&stack, 2).await;
    assert!(stack.store.open_alerts("ocr", None).await.unwrap().is_empty());

    probe(&stack, 1).await;
    let open = stack.store.open_alerts("ocr", None).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].alert_type, AlertType::ConnectionFailure);
    assert_eq!(open[0].severity, AlertSeverity::Error);

    // Further failures refresh the same incident instead of piling up.
    probe(&stack, 3).await;
    assert_eq!(stack.store.open_alerts("ocr", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_recovery_resolves_incident_and_leaves_one_notice() {
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::failing_then_recovering(3))
        .target("ocr", OCR_ENDPOINT)
        .build();

    probe(&stack, 3).await;
    let incident = &stack.store.open_alerts("ocr", None).await.unwrap()[0];
    let incident_id = incident.id;

    // The healthy probe closes the incident.
    probe(&stack, 1).await;
    assert!(stack.store.open_alerts("ocr", None).await.unwrap().is_empty());

    let closed = stack.store.get_alert(incident_id).await.unwrap().unwrap();
    assert_eq!(closed.status, AlertStatus::Resolved);

    // Exactly one recovery notice exists, already resolved, chained to
    // the incident it cleared.
    let notice = stack
        .store
        .find_open_alert(AlertType::Recovered, "ocr", None)
        .await
        .unwrap();
    assert!(notice.is_none(), "recovery notice must not stay open");

    probe(&stack, 2).await;
    // Staying healthy raises nothing new.
    assert!(stack.store.open_alerts("ocr", None).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_recovery_notice_links_back_to_incident() {
    let sender = Arc::new(RecordingSender::new(ChannelKind::Slack));
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::failing_then_recovering(3))
        .target("ocr", OCR_ENDPOINT)
        .sender(sender.clone())
        .build();
    stack
        .store
        .upsert_channel_config(
            ChannelConfigBuilder::new("oncall")
                .channel(ChannelKind::Slack, "#pipeline-alerts")
                .build(),
        )
        .await
        .unwrap();

    probe(&stack, 3).await;
    let incident_id = stack.store.open_alerts("ocr", None).await.unwrap()[0].id;

    probe(&stack, 1).await;

    // Both the incident and the recovery were announced.
    let titles: Vec<String> = sender.sent().into_iter().map(|s| s.alert_title).collect();
    assert_eq!(titles, ["ocr is unhealthy", "ocr recovered"]);

    // The notice carries a link to the incident it closed.
    let incident = stack.store.get_alert(incident_id).await.unwrap().unwrap();
    assert_eq!(incident.resolution_note.as_deref(), Some("target recovered"));
}

#[tokio::test]
async fn test_degraded_latency_raises_a_single_warning() {
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::new(vec![ProbeOutcome::success(200, 9_000)]))
        .target("ocr", OCR_ENDPOINT)
        .build();

    probe(&stack, 3).await;

    let open = stack.store.open_alerts("ocr", None).await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].alert_type, AlertType::Degraded);
    assert_eq!(open[0].severity, AlertSeverity::Warning);
}

#[tokio::test]
async fn test_notifications_respect_severity_floor() {
    let slack = Arc::new(RecordingSender::new(ChannelKind::Slack));
    let pager = Arc::new(RecordingSender::new(ChannelKind::Pager));
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::new(vec![ProbeOutcome::success(200, 9_000)]))
        .target("ocr", OCR_ENDPOINT)
        .sender(slack.clone() as Arc<dyn ChannelSender>)
        .sender(pager.clone() as Arc<dyn ChannelSender>)
        .build();
    stack
        .store
        .upsert_channel_config(
            ChannelConfigBuilder::new("pages")
                .min_severity(AlertSeverity::Error)
                .channel(ChannelKind::Pager, "pd-key")
                .build(),
        )
        .await
        .unwrap();
    stack
        .store
        .upsert_channel_config(
            ChannelConfigBuilder::new("chat")
                .channel(ChannelKind::Slack, "#pipeline-alerts")
                .build(),
        )
        .await
        .unwrap();

    // A degraded warning reaches chat but stays below the paging floor.
    probe(&stack, 1).await;
    assert_eq!(slack.sent().len(), 1);
    assert!(pager.sent().is_empty());
}

#[tokio::test]
async fn test_ongoing_incident_renotifies_when_configured() {
    let slack = Arc::new(RecordingSender::new(ChannelKind::Slack));
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::new(vec![ProbeOutcome::failure(
            None,
            10,
            "connection refused",
        )]))
        .target("ocr", OCR_ENDPOINT)
        .sender(slack.clone() as Arc<dyn ChannelSender>)
        .alert_config(AlertManagerConfig {
            cooldown_minutes: 0,
            renotify_after_cooldown: true,
        })
        .build();
    stack
        .store
        .upsert_channel_config(
            ChannelConfigBuilder::new("chat")
                .channel(ChannelKind::Slack, "#pipeline-alerts")
                .without_duplicate_suppression()
                .build(),
        )
        .await
        .unwrap();

    // Alert opens on the 3rd failure; with a zero cooldown and the
    // renotify knob on, the 4th and 5th refresh it loudly.
    probe(&stack, 5).await;
    assert_eq!(slack.sent().len(), 3);
    assert_eq!(stack.store.open_alerts("ocr", None).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_delivery_is_recorded_on_the_alert() {
    let email = Arc::new(RecordingSender::refusing(ChannelKind::Email));
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::new(vec![ProbeOutcome::failure(
            None,
            10,
            "connection refused",
        )]))
        .target("ocr", OCR_ENDPOINT)
        .sender(email.clone() as Arc<dyn ChannelSender>)
        .build();
    stack
        .store
        .upsert_channel_config(
            ChannelConfigBuilder::new("mail")
                .channel(ChannelKind::Email, "oncall@example.com")
                .build(),
        )
        .await
        .unwrap();

    probe(&stack, 3).await;

    let alert = &stack.store.open_alerts("ocr", None).await.unwrap()[0];
    assert_eq!(alert.notification_attempts.len(), 1);
    let attempt = &alert.notification_attempts[0];
    assert!(!attempt.success);
    assert_eq!(attempt.error.as_deref(), Some("delivery refused"));
    // A failed delivery still counts as a notification cycle.
    assert!(alert.last_notified_at.is_some());
}

#[tokio::test]
async fn test_history_filter_narrows_by_status() {
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::new(vec![
            ProbeOutcome::success(200, 10),
            ProbeOutcome::failure(None, 10, "refused"),
            ProbeOutcome::success(200, 10),
        ]))
        .target("ocr", OCR_ENDPOINT)
        .build();

    probe(&stack, 3).await;

    let unhealthy_only = stack
        .health
        .health_history(
            "ocr",
            &HealthHistoryFilter {
                status: Some(HealthStatus::Unhealthy),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(unhealthy_only.len(), 1);
    assert!(!unhealthy_only[0].success);
}

#[tokio::test]
async fn test_overall_health_exposes_open_alerts() {
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::new(vec![ProbeOutcome::failure(
            None,
            10,
            "connection refused",
        )]))
        .target("ocr", OCR_ENDPOINT)
        .build();

    probe(&stack, 3).await;

    let health = stack.health.overall_health("ocr").await.unwrap();
    assert_eq!(health.status, HealthStatus::Unhealthy);
    assert_eq!(health.consecutive_failures, 3);
    assert_eq!(health.open_alerts.len(), 1);
}

#[tokio::test]
async fn test_manual_acknowledgement_survives_refresh() {
    let stack = MonitoringStack::builder()
        .prober(ScriptedProber::new(vec![ProbeOutcome::failure(
            None,
            10,
            "connection refused",
        )]))
        .target("ocr", OCR_ENDPOINT)
        .build();

    probe(&stack, 3).await;
    let alert_id = stack.store.open_alerts("ocr", None).await.unwrap()[0].id;
    stack
        .alerts
        .acknowledge(alert_id, "casey", None)
        .await
        .unwrap();

    // Further failures refresh the incident without reopening it.
    probe(&stack, 2).await;
    let alert = stack.store.get_alert(alert_id).await.unwrap().unwrap();
    assert_eq!(alert.status, AlertStatus::Acknowledged);
    assert_eq!(alert.acknowledged_by.as_deref(), Some("casey"));
}
