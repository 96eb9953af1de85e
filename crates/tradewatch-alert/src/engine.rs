use crate::config::EngineConfig;
use crate::cooldown::{entity_key, CooldownController};
use crate::error::{ConfigError, EngineError};
use crate::evaluator::{Outcome, RuleEvaluator};
use crate::history::MetricHistory;
use crate::lifecycle::{AlertLifecycleManager, Transition};
use crate::rules::{RuleDefinition, RuleStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tradewatch_common::types::{Alert, AlertRule, AlertStatus, MetricSample};
use tradewatch_notify::DispatchEvent;
use tradewatch_storage::AuditStore;

/// A lifecycle transition that needs notification dispatch.
#[derive(Debug, Clone)]
pub struct AlertSignal {
    pub alert: Alert,
    pub event: DispatchEvent,
}

/// Aggregate view for dashboards and external policy consumers.
#[derive(Debug, Clone, Serialize)]
pub struct AlertSummary {
    pub total_active: usize,
    pub by_severity: HashMap<String, u64>,
    pub rule_count: usize,
    pub evaluation_failures: u64,
    pub dispatch_failures: u64,
}

/// The synchronous evaluation core.
///
/// `ingest` is intended to be called from many concurrent producers; all
/// internal state is behind fine-grained sharded locks and nothing on this
/// path blocks on network I/O. Returned [`AlertSignal`]s are the caller's
/// responsibility to dispatch; [`crate::service::AlertService`] feeds them
/// to the notification worker in FIFO order.
pub struct AlertEngine {
    history: Arc<MetricHistory>,
    rules: RuleStore,
    evaluator: RuleEvaluator,
    cooldown: CooldownController,
    lifecycle: AlertLifecycleManager,
    audit: Arc<dyn AuditStore>,
    evaluation_failures: AtomicU64,
    dispatch_failures: Arc<AtomicU64>,
}

impl AlertEngine {
    pub fn new(config: &EngineConfig, audit: Arc<dyn AuditStore>) -> Self {
        let history = Arc::new(MetricHistory::new(config.history_capacity));
        Self {
            evaluator: RuleEvaluator::new(history.clone()),
            history,
            rules: RuleStore::new(),
            cooldown: CooldownController::new(),
            lifecycle: AlertLifecycleManager::new(),
            audit,
            evaluation_failures: AtomicU64::new(0),
            dispatch_failures: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registers or replaces a rule. The rule is persisted to the audit
    /// store before taking effect; only configuration errors are surfaced.
    pub fn add_rule(&self, rule: AlertRule) -> Result<(), ConfigError> {
        rule.validate()?;
        self.audit.upsert_rule(&rule)?;
        tracing::info!(rule_id = %rule.id, service = %rule.service, metric = %rule.metric, "Alert rule registered");
        self.rules.upsert(rule);
        Ok(())
    }

    /// Registers a rule arriving as an untyped definition (seed file or
    /// admin API), rejecting unknown operators, unknown severities and
    /// negative intervals.
    pub fn add_rule_definition(&self, def: RuleDefinition) -> Result<(), ConfigError> {
        self.add_rule(AlertRule::try_from(def)?)
    }

    /// Records one sample and evaluates every enabled rule bound to its
    /// `(service, metric)` key.
    ///
    /// One rule's evaluation failure is logged and counted without
    /// aborting its siblings; producers are never blocked or crashed by
    /// alerting internals.
    pub fn ingest(&self, sample: &MetricSample) -> Vec<AlertSignal> {
        self.history.append(
            &sample.service,
            &sample.metric,
            sample.value,
            sample.timestamp,
        );

        let mut signals = Vec::new();
        for rule in self.rules.rules_for(&sample.service, &sample.metric) {
            match self.apply_rule(&rule, sample) {
                Ok(Some(signal)) => signals.push(signal),
                Ok(None) => {}
                Err(e) => {
                    self.evaluation_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(rule_id = %rule.id, error = %e, "Rule evaluation failed");
                }
            }
        }
        signals
    }

    fn apply_rule(
        &self,
        rule: &AlertRule,
        sample: &MetricSample,
    ) -> Result<Option<AlertSignal>, EngineError> {
        let alert_id = rule.alert_id();
        let was_active = self.lifecycle.is_active(&alert_id);
        let outcome = self
            .evaluator
            .evaluate(rule, sample.value, sample.timestamp, was_active)?;

        match outcome {
            Outcome::NewlyMet => {
                let entity = entity_key(&sample.service, &sample.tags);
                let transition = self.lifecycle.open_or_update(
                    rule,
                    sample.value,
                    &sample.tags,
                    &entity,
                    sample.timestamp,
                );
                let alert = match transition {
                    Transition::Opened(alert) | Transition::Updated(alert) => alert,
                };
                self.persist_alert(&alert);

                if self
                    .cooldown
                    .may_fire(&rule.id, &entity, rule.cooldown_secs, sample.timestamp)
                {
                    self.cooldown
                        .record_fire(&rule.id, &entity, sample.timestamp);
                    tracing::info!(
                        alert_id = %alert.id,
                        severity = %alert.severity,
                        value = alert.current_value,
                        "Alert fired"
                    );
                    Ok(Some(AlertSignal {
                        alert,
                        event: DispatchEvent::Fire,
                    }))
                } else {
                    tracing::debug!(
                        rule_id = %rule.id,
                        entity = %entity,
                        "Alert tracked but notification suppressed (cooldown)"
                    );
                    Ok(None)
                }
            }
            Outcome::StillMet => {
                let entity = entity_key(&sample.service, &sample.tags);
                if let Transition::Updated(alert) = self.lifecycle.open_or_update(
                    rule,
                    sample.value,
                    &sample.tags,
                    &entity,
                    sample.timestamp,
                ) {
                    self.persist_alert(&alert);
                }
                Ok(None)
            }
            Outcome::NotMet => Ok(self.resolve_alert(&alert_id, Some(sample.value), sample.timestamp)),
            Outcome::NeverMet => Ok(None),
        }
    }

    /// Shared resolution path for inline clearing and the periodic sweep.
    fn resolve_alert(
        &self,
        alert_id: &str,
        clearing_value: Option<f64>,
        now: DateTime<Utc>,
    ) -> Option<AlertSignal> {
        let prior_status = self.lifecycle.get(alert_id).map(|a| a.status)?;
        let resolved = self.lifecycle.resolve(alert_id, clearing_value, now)?;
        self.persist_alert(&resolved);
        tracing::info!(alert_id = %resolved.id, "Alert resolved");

        // A suppressed alert's resolution stays silent; the operator asked
        // for no further noise from it.
        if prior_status == AlertStatus::Suppressed {
            return None;
        }
        Some(AlertSignal {
            alert: resolved,
            event: DispatchEvent::Resolve,
        })
    }

    /// Re-evaluates every active alert against the latest history, so that
    /// alerts resolve even when their producer has gone quiet and the
    /// sustained window has aged out.
    pub fn sweep(&self, now: DateTime<Utc>) -> Vec<AlertSignal> {
        let mut signals = Vec::new();
        for alert in self.lifecycle.active_alerts() {
            let Some(rule) = self.rules.get(&alert.rule_id) else {
                continue;
            };
            if !rule.enabled {
                continue;
            }

            let value = match self.history.latest(&rule.service, &rule.metric) {
                Some((_, value)) => value,
                // Zero-duration rules need a sample to decide; sustained
                // windows resolve on an empty window regardless of value.
                None if rule.duration_secs == 0 => continue,
                None => 0.0,
            };

            match self.evaluator.evaluate(&rule, value, now, true) {
                Ok(Outcome::NotMet) => {
                    if let Some(signal) = self.resolve_alert(&alert.id, None, now) {
                        signals.push(signal);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    self.evaluation_failures.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(rule_id = %rule.id, error = %e, "Sweep evaluation failed");
                }
            }
        }
        signals
    }

    fn persist_alert(&self, alert: &Alert) {
        if let Err(e) = self.audit.upsert_alert(alert) {
            tracing::error!(alert_id = %alert.id, error = %e, "Failed to persist alert");
        }
    }

    // ── Operator surface ──

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.lifecycle.active_alerts()
    }

    /// One tracked alert by logical id, if currently active.
    pub fn get_alert(&self, alert_id: &str) -> Option<Alert> {
        self.lifecycle.get(alert_id)
    }

    /// Every registered rule, enabled or not.
    pub fn all_rules(&self) -> Vec<Arc<AlertRule>> {
        self.rules.all()
    }

    pub fn acknowledge(&self, alert_id: &str) -> Result<Alert, EngineError> {
        let alert = self.lifecycle.acknowledge(alert_id)?;
        self.persist_alert(&alert);
        tracing::info!(alert_id = %alert.id, "Alert acknowledged");
        Ok(alert)
    }

    pub fn suppress(&self, alert_id: &str) -> Result<Alert, EngineError> {
        let alert = self.lifecycle.suppress(alert_id)?;
        self.persist_alert(&alert);
        tracing::info!(alert_id = %alert.id, "Alert suppressed");
        Ok(alert)
    }

    pub fn summary(&self) -> AlertSummary {
        AlertSummary {
            total_active: self.lifecycle.active_count(),
            by_severity: self.lifecycle.counts_by_severity(),
            rule_count: self.rules.len(),
            evaluation_failures: self.evaluation_failures.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
        }
    }

    /// Counter shared with the dispatch worker.
    pub(crate) fn dispatch_failure_counter(&self) -> Arc<AtomicU64> {
        self.dispatch_failures.clone()
    }

    /// Rebuilds rules and the active-alert working set from the audit
    /// store. Returns `(rule_count, active_alert_count)`.
    pub fn restore_from_audit(&self) -> Result<(usize, usize), tradewatch_storage::StorageError> {
        let rules = self.audit.list_rules()?;
        let rule_count = rules.len();
        self.rules.replace_all(rules);

        let alerts = self.audit.list_active_alerts()?;
        let alert_count = alerts.len();
        for alert in alerts {
            self.lifecycle.restore(alert);
        }

        tracing::info!(
            rule_count,
            active_alerts = alert_count,
            "Engine state restored from audit store"
        );
        Ok((rule_count, alert_count))
    }
}
