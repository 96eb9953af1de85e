use crate::error::EngineError;
use crate::shard::ShardedMap;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tradewatch_common::types::{Alert, AlertRule, AlertStatus};

/// What [`AlertLifecycleManager::open_or_update`] did.
#[derive(Debug, Clone)]
pub enum Transition {
    /// First sustained violation: a fresh alert entered the active set.
    Opened(Alert),
    /// Repeat firing while tracked: value and timestamp refreshed in place.
    Updated(Alert),
}

/// Exclusive owner of the active-alert set and its state machine.
///
/// One alert instance exists per rule at a time; `Resolved` is terminal
/// and removes the instance, so a later violation opens a fresh one under
/// the same logical id.
pub struct AlertLifecycleManager {
    active: ShardedMap<String, Alert>,
}

impl AlertLifecycleManager {
    pub fn new() -> Self {
        Self {
            active: ShardedMap::new(),
        }
    }

    pub fn get(&self, alert_id: &str) -> Option<Alert> {
        self.active.get_clone(&alert_id.to_string())
    }

    pub fn is_active(&self, alert_id: &str) -> bool {
        self.active.contains(&alert_id.to_string())
    }

    /// Opens a new alert for `rule` or refreshes the tracked one.
    ///
    /// An acknowledged or suppressed alert keeps its status on update:
    /// operator state survives re-firing; there is no automatic
    /// reactivation.
    pub fn open_or_update(
        &self,
        rule: &AlertRule,
        value: f64,
        tags: &HashMap<String, String>,
        entity: &str,
        now: DateTime<Utc>,
    ) -> Transition {
        let alert_id = rule.alert_id();
        let updated = self.active.with_existing(&alert_id, |alert| {
            alert.current_value = value;
            alert.timestamp = now;
            alert.clone()
        });
        match updated {
            Some(alert) => Transition::Updated(alert),
            None => {
                let alert = build_alert(rule, value, tags, entity, now);
                self.active.insert(alert_id, alert.clone());
                Transition::Opened(alert)
            }
        }
    }

    /// Terminal transition: removes the alert and marks it resolved.
    ///
    /// `clearing_value` is the sample that cleared the condition, when one
    /// exists (a sweep resolution of a stale window has none).
    pub fn resolve(
        &self,
        alert_id: &str,
        clearing_value: Option<f64>,
        now: DateTime<Utc>,
    ) -> Option<Alert> {
        let mut alert = self.active.remove(&alert_id.to_string())?;
        alert.status = AlertStatus::Resolved;
        if let Some(value) = clearing_value {
            alert.current_value = value;
        }
        alert.timestamp = now;
        Some(alert)
    }

    /// Manual operator transition. The alert stays in the active set and
    /// keeps being evaluated for resolution, but stops re-notifying.
    pub fn acknowledge(&self, alert_id: &str) -> Result<Alert, EngineError> {
        self.set_status(alert_id, AlertStatus::Acknowledged)
    }

    /// Manual operator transition, like [`Self::acknowledge`] but also
    /// silencing the eventual resolution notice.
    pub fn suppress(&self, alert_id: &str) -> Result<Alert, EngineError> {
        self.set_status(alert_id, AlertStatus::Suppressed)
    }

    fn set_status(&self, alert_id: &str, status: AlertStatus) -> Result<Alert, EngineError> {
        self.active
            .with_existing(&alert_id.to_string(), |alert| {
                alert.status = status;
                alert.clone()
            })
            .ok_or_else(|| EngineError::UnknownAlert(alert_id.to_string()))
    }

    /// Active alerts, most recent first.
    pub fn active_alerts(&self) -> Vec<Alert> {
        let mut alerts = Vec::new();
        self.active.for_each(|_, alert| alerts.push(alert.clone()));
        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Active-alert counts keyed by severity name.
    pub fn counts_by_severity(&self) -> HashMap<String, u64> {
        let mut counts = HashMap::new();
        self.active.for_each(|_, alert| {
            *counts.entry(alert.severity.to_string()).or_insert(0) += 1;
        });
        counts
    }

    /// Reinserts a persisted non-resolved alert, e.g. on warm start.
    pub fn restore(&self, alert: Alert) {
        if alert.status != AlertStatus::Resolved {
            self.active.insert(alert.id.clone(), alert);
        }
    }
}

impl Default for AlertLifecycleManager {
    fn default() -> Self {
        Self::new()
    }
}

fn build_alert(
    rule: &AlertRule,
    value: f64,
    tags: &HashMap<String, String>,
    entity: &str,
    now: DateTime<Utc>,
) -> Alert {
    let mut merged_tags = rule.tags.clone();
    for (k, v) in tags {
        merged_tags.insert(k.clone(), v.clone());
    }
    let mut details = HashMap::new();
    details.insert("condition".to_string(), rule.condition.to_string());
    details.insert("entity".to_string(), entity.to_string());

    Alert {
        id: rule.alert_id(),
        rule_id: rule.id.clone(),
        title: rule.name.clone(),
        description: format!(
            "{} on {} is {} {:.2} (current value {:.2})",
            rule.metric,
            rule.service,
            rule.condition.phrase(),
            rule.threshold,
            value,
        ),
        severity: rule.severity,
        service: rule.service.clone(),
        metric: rule.metric.clone(),
        threshold: rule.threshold,
        current_value: value,
        timestamp: now,
        status: AlertStatus::Active,
        tags: merged_tags,
        details,
    }
}
