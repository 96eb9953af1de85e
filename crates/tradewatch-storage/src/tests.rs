use crate::sqlite::SqliteAuditStore;
use crate::AuditStore;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tempfile::TempDir;
use tradewatch_common::types::{
    Alert, AlertCondition, AlertRule, AlertStatus, NotificationAttempt, Severity,
};

fn make_rule(id: &str) -> AlertRule {
    AlertRule {
        id: id.to_string(),
        name: format!("rule {id}"),
        description: "test rule".into(),
        service: "signal-generator".into(),
        metric: "signals_today".into(),
        condition: AlertCondition::LessThan,
        threshold: 52.0,
        severity: Severity::High,
        duration_secs: 3600,
        cooldown_secs: 7200,
        tags: HashMap::new(),
        enabled: true,
    }
}

fn make_alert(id: &str, status: AlertStatus, secs_ago: i64) -> Alert {
    let mut tags = HashMap::new();
    tags.insert("symbol".to_string(), "BTCUSDT".to_string());
    Alert {
        id: id.to_string(),
        rule_id: "low-signals".into(),
        title: "Daily signal count too low".into(),
        description: "signals_today on signal-generator is below 52".into(),
        severity: Severity::High,
        service: "signal-generator".into(),
        metric: "signals_today".into(),
        threshold: 52.0,
        current_value: 48.0,
        timestamp: Utc::now() - Duration::seconds(secs_ago),
        status,
        tags,
        details: HashMap::new(),
    }
}

#[test]
fn rule_upsert_and_list_round_trip() {
    let store = SqliteAuditStore::in_memory().unwrap();

    store.upsert_rule(&make_rule("r1")).unwrap();
    store.upsert_rule(&make_rule("r2")).unwrap();

    // Upsert by id replaces rather than duplicates
    let mut updated = make_rule("r1");
    updated.threshold = 40.0;
    updated.enabled = false;
    store.upsert_rule(&updated).unwrap();

    let rules = store.list_rules().unwrap();
    assert_eq!(rules.len(), 2);
    let r1 = rules.iter().find(|r| r.id == "r1").unwrap();
    assert_eq!(r1.threshold, 40.0);
    assert!(!r1.enabled);
    assert_eq!(r1.condition, AlertCondition::LessThan);
    assert_eq!(r1.severity, Severity::High);
}

#[test]
fn alert_upsert_is_status_mutable() {
    let store = SqliteAuditStore::in_memory().unwrap();

    let alert = make_alert("svc:metric:r1", AlertStatus::Active, 60);
    store.upsert_alert(&alert).unwrap();

    let mut resolved = alert.clone();
    resolved.status = AlertStatus::Resolved;
    resolved.current_value = 70.0;
    store.upsert_alert(&resolved).unwrap();

    let fetched = store.get_alert("svc:metric:r1").unwrap().unwrap();
    assert_eq!(fetched.status, AlertStatus::Resolved);
    assert_eq!(fetched.current_value, 70.0);
    assert_eq!(fetched.tags.get("symbol").unwrap(), "BTCUSDT");
}

#[test]
fn active_listing_excludes_resolved() {
    let store = SqliteAuditStore::in_memory().unwrap();

    store
        .upsert_alert(&make_alert("a1", AlertStatus::Active, 30))
        .unwrap();
    store
        .upsert_alert(&make_alert("a2", AlertStatus::Acknowledged, 20))
        .unwrap();
    store
        .upsert_alert(&make_alert("a3", AlertStatus::Resolved, 10))
        .unwrap();

    let active = store.list_active_alerts().unwrap();
    let ids: Vec<&str> = active.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["a2", "a1"], "most recent first, resolved excluded");
}

#[test]
fn alert_history_paginates_most_recent_first() {
    let store = SqliteAuditStore::in_memory().unwrap();
    for i in 0..5 {
        store
            .upsert_alert(&make_alert(&format!("a{i}"), AlertStatus::Resolved, i * 10))
            .unwrap();
    }

    let page = store.alert_history(2, 0).unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].id, "a0");

    let page = store.alert_history(2, 2).unwrap();
    assert_eq!(page[0].id, "a2");
}

#[test]
fn attempts_append_and_count_failures() {
    let store = SqliteAuditStore::in_memory().unwrap();
    let now = Utc::now();

    for (channel, success, error) in [
        ("email", true, None),
        ("chat", false, Some("timed out after 10s".to_string())),
        ("webhook", true, None),
    ] {
        store
            .record_attempt(&NotificationAttempt {
                alert_id: "a1".into(),
                channel_name: channel.into(),
                success,
                error,
                timestamp: now,
            })
            .unwrap();
    }

    let attempts = store.attempts_for_alert("a1").unwrap();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[1].channel_name, "chat");
    assert!(!attempts[1].success);
    assert!(attempts[1].error.as_deref().unwrap().contains("timed out"));

    assert_eq!(store.count_failed_attempts().unwrap(), 1);
    assert!(store.attempts_for_alert("missing").unwrap().is_empty());
}

#[test]
fn on_disk_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("audit.db");

    {
        let store = SqliteAuditStore::open(&path).unwrap();
        store.upsert_rule(&make_rule("r1")).unwrap();
        store
            .upsert_alert(&make_alert("a1", AlertStatus::Active, 5))
            .unwrap();
    }

    let store = SqliteAuditStore::open(&path).unwrap();
    assert_eq!(store.list_rules().unwrap().len(), 1);
    assert_eq!(store.list_active_alerts().unwrap().len(), 1);
}

#[test]
fn require_alert_reports_not_found() {
    let store = SqliteAuditStore::in_memory().unwrap();
    let err = store.require_alert("nope").unwrap_err();
    assert!(err.to_string().contains("not found"));
}
