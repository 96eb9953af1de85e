use crate::error::EngineError;
use crate::history::MetricHistory;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tradewatch_common::types::AlertRule;

/// Result of evaluating one rule against the latest sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Condition was not met before and is now: a candidate for firing.
    NewlyMet,
    /// Condition continues to hold while an alert is active.
    StillMet,
    /// Condition cleared while an alert was active: triggers resolution.
    NotMet,
    /// Condition does not hold and no alert is active.
    NeverMet,
}

/// Decides whether a rule's condition is currently satisfied, and for
/// rules with a duration whether it has held for the whole trailing window.
pub struct RuleEvaluator {
    history: Arc<MetricHistory>,
}

impl RuleEvaluator {
    pub fn new(history: Arc<MetricHistory>) -> Self {
        Self { history }
    }

    /// Evaluates `rule` at `now`.
    ///
    /// `value` is the sample that triggered this evaluation (for
    /// zero-duration rules it decides alone); `was_active` is whether an
    /// alert for this rule is currently tracked.
    ///
    /// Sustained semantics: every sample strictly newer than
    /// `now - duration` must satisfy the condition, and at least two such
    /// samples must exist; fewer means the window is not yet decidable. A
    /// single non-conforming sample resets the sustained state; there is no
    /// flapping grace period. A sample aged exactly `duration` falls
    /// outside the window.
    pub fn evaluate(
        &self,
        rule: &AlertRule,
        value: f64,
        now: DateTime<Utc>,
        was_active: bool,
    ) -> Result<Outcome, EngineError> {
        if !value.is_finite() {
            return Err(EngineError::NonFiniteValue {
                service: rule.service.clone(),
                metric: rule.metric.clone(),
            });
        }

        let met = if rule.duration_secs == 0 {
            rule.condition.holds(value, rule.threshold)
        } else {
            let cutoff = now - Duration::seconds(rule.duration_secs as i64);
            let in_window: Vec<f64> = self
                .history
                .window(&rule.service, &rule.metric, cutoff)
                .iter()
                .filter(|(ts, _)| *ts > cutoff)
                .map(|(_, v)| *v)
                .collect();

            in_window.len() >= 2
                && in_window
                    .iter()
                    .all(|v| rule.condition.holds(*v, rule.threshold))
        };

        Ok(match (was_active, met) {
            (false, true) => Outcome::NewlyMet,
            (true, true) => Outcome::StillMet,
            (true, false) => Outcome::NotMet,
            (false, false) => Outcome::NeverMet,
        })
    }
}
