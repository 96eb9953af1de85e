use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tradewatch_common::types::{AlertCondition, AlertRule, Severity};

/// In-memory set of rule definitions, keyed by rule id.
///
/// Mutations may happen concurrently with evaluation; readers get cheap
/// `Arc` snapshots so a slow evaluation never holds up rule administration.
pub struct RuleStore {
    rules: RwLock<HashMap<String, Arc<AlertRule>>>,
}

impl RuleStore {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(HashMap::new()),
        }
    }

    /// Upsert by id. Validation and persistence happen before this call.
    pub fn upsert(&self, rule: AlertRule) {
        let mut rules = self.rules.write().unwrap_or_else(|p| p.into_inner());
        rules.insert(rule.id.clone(), Arc::new(rule));
    }

    pub fn get(&self, id: &str) -> Option<Arc<AlertRule>> {
        let rules = self.rules.read().unwrap_or_else(|p| p.into_inner());
        rules.get(id).cloned()
    }

    /// Enabled rules bound to this `(service, metric)` pair.
    pub fn rules_for(&self, service: &str, metric: &str) -> Vec<Arc<AlertRule>> {
        let rules = self.rules.read().unwrap_or_else(|p| p.into_inner());
        rules
            .values()
            .filter(|r| r.enabled && r.service == service && r.metric == metric)
            .cloned()
            .collect()
    }

    /// All rules, enabled or not.
    pub fn all(&self) -> Vec<Arc<AlertRule>> {
        let rules = self.rules.read().unwrap_or_else(|p| p.into_inner());
        rules.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        let rules = self.rules.read().unwrap_or_else(|p| p.into_inner());
        rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replaces the whole set, e.g. when restoring from the audit store.
    pub fn replace_all(&self, new_rules: Vec<AlertRule>) {
        let mut rules = self.rules.write().unwrap_or_else(|p| p.into_inner());
        rules.clear();
        for rule in new_rules {
            rules.insert(rule.id.clone(), Arc::new(rule));
        }
    }
}

impl Default for RuleStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Untyped rule definition as it arrives from seed files or admin APIs.
///
/// Unlike [`AlertRule`], the condition and severity are free-form strings
/// and the intervals are signed; conversion is where unknown operators and
/// negative durations are rejected as configuration errors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub service: String,
    pub metric: String,
    pub condition: String,
    pub threshold: f64,
    #[serde(default = "default_severity")]
    pub severity: String,
    #[serde(default)]
    pub duration_secs: i64,
    #[serde(default)]
    pub cooldown_secs: i64,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_severity() -> String {
    "medium".to_string()
}

fn default_enabled() -> bool {
    true
}

impl TryFrom<RuleDefinition> for AlertRule {
    type Error = ConfigError;

    fn try_from(def: RuleDefinition) -> Result<Self, Self::Error> {
        let condition: AlertCondition = def
            .condition
            .parse()
            .map_err(|_| ConfigError::UnknownOperator(def.condition.clone()))?;
        let severity: Severity = def
            .severity
            .parse()
            .map_err(|_| ConfigError::UnknownSeverity(def.severity.clone()))?;
        if def.duration_secs < 0 {
            return Err(ConfigError::NegativeInterval {
                rule_id: def.id,
                field: "duration",
                value: def.duration_secs,
            });
        }
        if def.cooldown_secs < 0 {
            return Err(ConfigError::NegativeInterval {
                rule_id: def.id,
                field: "cooldown",
                value: def.cooldown_secs,
            });
        }

        let rule = AlertRule {
            id: def.id,
            name: def.name,
            description: def.description,
            service: def.service,
            metric: def.metric,
            condition,
            threshold: def.threshold,
            severity,
            duration_secs: def.duration_secs as u64,
            cooldown_secs: def.cooldown_secs as u64,
            tags: def.tags,
            enabled: def.enabled,
        };
        rule.validate()?;
        Ok(rule)
    }
}
