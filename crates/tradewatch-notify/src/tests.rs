use crate::channels::webhook::GenericWebhookChannel;
use crate::dispatcher::NotificationDispatcher;
use crate::plugin::ChannelRegistry;
use crate::{ChannelAdapter, DispatchEvent, NotifyError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tradewatch_common::types::{Alert, AlertStatus, Severity};

fn make_alert() -> Alert {
    let mut tags = HashMap::new();
    tags.insert("symbol".to_string(), "ETHUSDT".to_string());
    Alert {
        id: "signal-generator:signals_today:low-signals".into(),
        rule_id: "low-signals".into(),
        title: "Daily signal count too low".into(),
        description: "signals_today on signal-generator is below 52.00 (current value 48.00)"
            .into(),
        severity: Severity::High,
        service: "signal-generator".into(),
        metric: "signals_today".into(),
        threshold: 52.0,
        current_value: 48.0,
        timestamp: Utc::now(),
        status: AlertStatus::Active,
        tags,
        details: HashMap::new(),
    }
}

enum StubBehavior {
    Succeed,
    Fail,
    Hang,
}

struct StubChannel {
    name: String,
    behavior: StubBehavior,
    fires: AtomicUsize,
    resolutions: AtomicUsize,
}

impl StubChannel {
    fn new(name: &str, behavior: StubBehavior) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            behavior,
            fires: AtomicUsize::new(0),
            resolutions: AtomicUsize::new(0),
        })
    }

    async fn act(&self) -> Result<()> {
        match self.behavior {
            StubBehavior::Succeed => Ok(()),
            StubBehavior::Fail => Err(NotifyError::Smtp("connection refused".into())),
            StubBehavior::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ChannelAdapter for StubChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_alert(&self, _alert: &Alert) -> Result<()> {
        self.fires.fetch_add(1, Ordering::SeqCst);
        self.act().await
    }

    async fn send_resolution(&self, _alert: &Alert) -> Result<()> {
        self.resolutions.fetch_add(1, Ordering::SeqCst);
        self.act().await
    }
}

#[tokio::test]
async fn dispatch_isolates_channel_failures() {
    let ok = StubChannel::new("email", StubBehavior::Succeed);
    let bad = StubChannel::new("chat", StubBehavior::Fail);
    let dispatcher = NotificationDispatcher::new(
        vec![ok.clone(), bad.clone()],
        5,
        Duration::from_secs(10),
    );

    let attempts = dispatcher.dispatch(&make_alert(), DispatchEvent::Fire).await;

    assert_eq!(attempts.len(), 2);
    assert!(attempts["email"].success);
    assert!(attempts["email"].error.is_none());
    assert!(!attempts["chat"].success);
    assert!(attempts["chat"]
        .error
        .as_deref()
        .unwrap()
        .contains("connection refused"));
    assert_eq!(ok.fires.load(Ordering::SeqCst), 1);
    assert_eq!(bad.fires.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dispatch_times_out_hung_channels_without_delaying_others() {
    let hung = StubChannel::new("webhook", StubBehavior::Hang);
    let ok = StubChannel::new("email", StubBehavior::Succeed);
    let dispatcher = NotificationDispatcher::new(
        vec![hung.clone(), ok.clone()],
        5,
        Duration::from_millis(100),
    );

    let attempts = dispatcher.dispatch(&make_alert(), DispatchEvent::Fire).await;

    assert!(attempts["email"].success);
    assert!(!attempts["webhook"].success);
    assert!(attempts["webhook"]
        .error
        .as_deref()
        .unwrap()
        .contains("timed out"));
}

#[tokio::test]
async fn dispatch_resolve_event_uses_resolution_path() {
    let ok = StubChannel::new("email", StubBehavior::Succeed);
    let dispatcher =
        NotificationDispatcher::new(vec![ok.clone()], 5, Duration::from_secs(10));

    let attempts = dispatcher
        .dispatch(&make_alert(), DispatchEvent::Resolve)
        .await;

    assert!(attempts["email"].success);
    assert_eq!(ok.fires.load(Ordering::SeqCst), 0);
    assert_eq!(ok.resolutions.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn dispatch_completes_with_pool_smaller_than_channel_count() {
    let channels: Vec<Arc<dyn ChannelAdapter>> = (0..4)
        .map(|i| StubChannel::new(&format!("ch{i}"), StubBehavior::Succeed) as Arc<dyn ChannelAdapter>)
        .collect();
    let dispatcher = NotificationDispatcher::new(channels, 1, Duration::from_secs(10));

    let attempts = dispatcher.dispatch(&make_alert(), DispatchEvent::Fire).await;

    assert_eq!(attempts.len(), 4);
    assert!(attempts.values().all(|a| a.success));
}

#[tokio::test]
async fn attempt_records_reference_the_alert() {
    let ok = StubChannel::new("email", StubBehavior::Succeed);
    let dispatcher = NotificationDispatcher::new(vec![ok], 5, Duration::from_secs(10));

    let alert = make_alert();
    let attempts = dispatcher.dispatch(&alert, DispatchEvent::Fire).await;

    assert_eq!(attempts["email"].alert_id, alert.id);
    assert_eq!(attempts["email"].channel_name, "email");
}

// ── Plugin registry tests ──

#[test]
fn registry_default_has_all_builtin_plugins() {
    let registry = ChannelRegistry::default();
    let mut names = registry.plugin_names();
    names.sort();
    assert_eq!(names, vec!["chat", "email", "webhook"]);
}

#[test]
fn registry_unknown_plugin_returns_error() {
    let registry = ChannelRegistry::default();
    let config = serde_json::json!({});
    let err = registry
        .create_channel("pager", "ops-pager", &config)
        .err()
        .expect("should return error for unknown plugin");
    assert!(
        err.to_string().contains("unknown channel type"),
        "error message was: {err}"
    );
}

#[test]
fn chat_plugin_validates_config() {
    let registry = ChannelRegistry::default();

    let valid = serde_json::json!({
        "webhook_url": "https://hooks.example.com/services/T000/B000/XXX"
    });
    assert!(registry.create_channel("chat", "ops-chat", &valid).is_ok());

    let invalid = serde_json::json!({});
    assert!(registry.create_channel("chat", "ops-chat", &invalid).is_err());
}

#[test]
fn webhook_plugin_validates_config() {
    let registry = ChannelRegistry::default();

    let valid = serde_json::json!({
        "url": "https://alerts.example.com/ingest"
    });
    assert!(registry.create_channel("webhook", "ops-hook", &valid).is_ok());

    let invalid = serde_json::json!({});
    assert!(registry
        .create_channel("webhook", "ops-hook", &invalid)
        .is_err());
}

#[tokio::test]
async fn email_plugin_validates_and_redacts_config() {
    let registry = ChannelRegistry::default();

    let valid = serde_json::json!({
        "smtp_host": "smtp.example.com",
        "smtp_port": 587,
        "smtp_username": "alerts",
        "smtp_password": "hunter2",
        "from": "alerts@example.com",
        "recipients": ["ops@example.com"]
    });
    assert!(registry.create_channel("email", "ops-mail", &valid).is_ok());

    let invalid = serde_json::json!({ "smtp_host": "smtp.example.com" });
    assert!(registry.create_channel("email", "ops-mail", &invalid).is_err());

    let bad_address = serde_json::json!({
        "smtp_host": "smtp.example.com",
        "smtp_port": 587,
        "from": "not-an-address",
        "recipients": ["ops@example.com"]
    });
    assert!(registry
        .create_channel("email", "ops-mail", &bad_address)
        .is_err());

    let redacted = registry
        .get_plugin("email")
        .unwrap()
        .redact_config(&valid);
    assert_eq!(redacted["smtp_password"], "***");
    assert_eq!(redacted["smtp_host"], "smtp.example.com");
}

// ── Webhook body rendering ──

#[test]
fn webhook_template_substitutes_placeholders() {
    let channel = GenericWebhookChannel::new(
        "ops-hook",
        "https://alerts.example.com/ingest",
        Some("{{service}}/{{metric}} {{state}}: {{value}} vs {{threshold}}".to_string()),
    );

    let body = channel.render_body(&make_alert(), false);
    assert_eq!(
        body,
        "signal-generator/signals_today firing: 48.00 vs 52.00"
    );

    let body = channel.render_body(&make_alert(), true);
    assert!(body.contains("resolved"));
}

#[test]
fn webhook_default_body_is_full_json() {
    let channel =
        GenericWebhookChannel::new("ops-hook", "https://alerts.example.com/ingest", None);

    let body = channel.render_body(&make_alert(), false);
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["service"], "signal-generator");
    assert_eq!(parsed["state"], "firing");
    assert_eq!(parsed["severity"], "high");
    assert_eq!(parsed["tags"]["symbol"], "ETHUSDT");
}
