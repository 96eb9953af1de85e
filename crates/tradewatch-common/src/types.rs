use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A single scalar measurement reported by a producer.
///
/// Samples are immutable once recorded; the engine retains only a bounded
/// ring of recent samples per `(service, metric)` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricSample {
    pub service: String,
    pub metric: String,
    pub value: f64,
    pub tags: HashMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl MetricSample {
    pub fn new(
        service: impl Into<String>,
        metric: impl Into<String>,
        value: f64,
        tags: HashMap<String, String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            service: service.into(),
            metric: metric.into(),
            value,
            tags,
            timestamp,
        }
    }
}

/// Alert severity level, ordered from lowest to highest.
///
/// # Examples
///
/// ```
/// use tradewatch_common::types::Severity;
///
/// let sev: Severity = "high".parse().unwrap();
/// assert_eq!(sev, Severity::High);
/// assert_eq!(sev.to_string(), "high");
/// assert!(Severity::Critical > Severity::Low);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {s}")),
        }
    }
}

/// Scalar comparison applied between a sample value and a rule threshold.
///
/// `Equal`/`NotEqual` are exact f64 comparisons. Callers supplying derived
/// floats must round before reporting if exact-match semantics are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertCondition {
    GreaterThan,
    LessThan,
    GreaterEqual,
    LessEqual,
    Equal,
    NotEqual,
}

impl AlertCondition {
    pub fn holds(&self, value: f64, threshold: f64) -> bool {
        match self {
            Self::GreaterThan => value > threshold,
            Self::LessThan => value < threshold,
            Self::GreaterEqual => value >= threshold,
            Self::LessEqual => value <= threshold,
            Self::Equal => value == threshold,
            Self::NotEqual => value != threshold,
        }
    }

    /// Human-readable phrase used in alert descriptions.
    pub fn phrase(&self) -> &'static str {
        match self {
            Self::GreaterThan => "above",
            Self::LessThan => "below",
            Self::GreaterEqual => "at or above",
            Self::LessEqual => "at or below",
            Self::Equal => "equal to",
            Self::NotEqual => "not equal to",
        }
    }
}

impl std::str::FromStr for AlertCondition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greater_than" | "gt" => Ok(Self::GreaterThan),
            "less_than" | "lt" => Ok(Self::LessThan),
            "greater_equal" | "gte" => Ok(Self::GreaterEqual),
            "less_equal" | "lte" => Ok(Self::LessEqual),
            "equal" | "eq" => Ok(Self::Equal),
            "not_equal" | "neq" => Ok(Self::NotEqual),
            _ => Err(format!("unknown compare operator: {s}")),
        }
    }
}

impl std::fmt::Display for AlertCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GreaterThan => write!(f, "greater_than"),
            Self::LessThan => write!(f, "less_than"),
            Self::GreaterEqual => write!(f, "greater_equal"),
            Self::LessEqual => write!(f, "less_equal"),
            Self::Equal => write!(f, "equal"),
            Self::NotEqual => write!(f, "not_equal"),
        }
    }
}

/// A rule definition rejected at registration time.
#[derive(Debug, thiserror::Error)]
pub enum RuleValidationError {
    #[error("rule id must not be empty")]
    EmptyId,
    #[error("rule '{0}': service and metric must not be empty")]
    EmptyTarget(String),
    #[error("rule '{0}': threshold must be a finite number")]
    NonFiniteThreshold(String),
}

/// A named threshold condition bound to one `(service, metric)` pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub service: String,
    pub metric: String,
    pub condition: AlertCondition,
    pub threshold: f64,
    pub severity: Severity,
    /// The condition must hold for every sample in this trailing window
    /// before the rule fires. Zero means the latest sample alone decides.
    pub duration_secs: u64,
    /// Minimum seconds between repeat fire notifications for the same
    /// (rule, entity) pair.
    pub cooldown_secs: u64,
    pub tags: HashMap<String, String>,
    pub enabled: bool,
}

impl AlertRule {
    /// Validates invariants that the type system cannot enforce.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if self.id.is_empty() {
            return Err(RuleValidationError::EmptyId);
        }
        if self.service.is_empty() || self.metric.is_empty() {
            return Err(RuleValidationError::EmptyTarget(self.id.clone()));
        }
        if !self.threshold.is_finite() {
            return Err(RuleValidationError::NonFiniteThreshold(self.id.clone()));
        }
        Ok(())
    }

    /// Logical id of the alert this rule produces.
    pub fn alert_id(&self) -> String {
        format!("{}:{}:{}", self.service, self.metric, self.id)
    }
}

/// Lifecycle status of an alert.
///
/// `Resolved` is terminal: a later violation opens a fresh instance under
/// the same logical id instead of reopening the resolved one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    Active,
    Acknowledged,
    Suppressed,
    Resolved,
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertStatus::Active => write!(f, "active"),
            AlertStatus::Acknowledged => write!(f, "acknowledged"),
            AlertStatus::Suppressed => write!(f, "suppressed"),
            AlertStatus::Resolved => write!(f, "resolved"),
        }
    }
}

impl std::str::FromStr for AlertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AlertStatus::Active),
            "acknowledged" => Ok(AlertStatus::Acknowledged),
            "suppressed" => Ok(AlertStatus::Suppressed),
            "resolved" => Ok(AlertStatus::Resolved),
            _ => Err(format!("unknown alert status: {s}")),
        }
    }
}

/// A sustained threshold violation, tracked from first firing to resolution.
///
/// The id is derived as `service:metric:rule_id`; one instance exists per
/// rule at a time and repeat firings update `current_value` in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub service: String,
    pub metric: String,
    pub threshold: f64,
    pub current_value: f64,
    pub timestamp: DateTime<Utc>,
    pub status: AlertStatus,
    pub tags: HashMap<String, String>,
    pub details: HashMap<String, String>,
}

/// Outcome of delivering one alert event through one channel.
///
/// Append-only audit record; one per channel per dispatch event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationAttempt {
    pub alert_id: String,
    pub channel_name: String,
    pub success: bool,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Format a tag map into a stable human-readable string.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use tradewatch_common::types::format_tags;
///
/// let mut tags = HashMap::new();
/// tags.insert("symbol".to_string(), "BTCUSDT".to_string());
/// tags.insert("venue".to_string(), "binance".to_string());
/// assert_eq!(format_tags(&tags), "symbol=BTCUSDT, venue=binance");
/// ```
pub fn format_tags(tags: &HashMap<String, String>) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let mut pairs: Vec<String> = tags.iter().map(|(k, v)| format!("{k}={v}")).collect();
    pairs.sort();
    pairs.join(", ")
}
