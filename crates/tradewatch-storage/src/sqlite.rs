use crate::{AuditStore, Result, StorageError};
use chrono::DateTime;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;
use tradewatch_common::types::{
    Alert, AlertCondition, AlertRule, NotificationAttempt, Severity,
};

/// SQLite-backed [`AuditStore`].
///
/// One database file holds the three audit tables: `alerts` (keyed by
/// logical id, status-mutable), `alert_rules` (keyed by id, mutable) and
/// `notification_attempts` (append-only, AUTOINCREMENT key).
pub struct SqliteAuditStore {
    conn: Mutex<Connection>,
}

/// Raw `alerts` row before the string columns are parsed back into enums.
type AlertRow = (
    String, // id
    String, // rule_id
    String, // title
    String, // description
    String, // severity
    String, // service
    String, // metric
    f64,    // threshold
    f64,    // current_value
    i64,    // timestamp (millis)
    String, // status
    String, // tags json
    String, // details json
);

const ALERT_COLUMNS: &str = "id, rule_id, title, description, severity, service, metric, \
     threshold, current_value, timestamp, status, tags, details";

fn read_alert_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AlertRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
        row.get(8)?,
        row.get(9)?,
        row.get(10)?,
        row.get(11)?,
        row.get(12)?,
    ))
}

fn to_alert(row: AlertRow) -> Result<Alert> {
    let (
        id,
        rule_id,
        title,
        description,
        severity_str,
        service,
        metric,
        threshold,
        current_value,
        ts_ms,
        status_str,
        tags_json,
        details_json,
    ) = row;
    Ok(Alert {
        id,
        rule_id,
        title,
        description,
        severity: severity_str.parse().map_err(StorageError::Other)?,
        service,
        metric,
        threshold,
        current_value,
        timestamp: DateTime::from_timestamp_millis(ts_ms).unwrap_or_default(),
        status: status_str.parse().map_err(StorageError::Other)?,
        tags: serde_json::from_str(&tags_json)?,
        details: serde_json::from_str(&details_json)?,
    })
}

impl SqliteAuditStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store. Used in tests and for ephemeral deployments.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS alerts (
                id            TEXT PRIMARY KEY,
                rule_id       TEXT NOT NULL,
                title         TEXT NOT NULL,
                description   TEXT NOT NULL,
                severity      TEXT NOT NULL,
                service       TEXT NOT NULL,
                metric        TEXT NOT NULL,
                threshold     REAL NOT NULL,
                current_value REAL NOT NULL,
                timestamp     INTEGER NOT NULL,
                status        TEXT NOT NULL,
                tags          TEXT NOT NULL,
                details       TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS alert_rules (
                id            TEXT PRIMARY KEY,
                name          TEXT NOT NULL,
                description   TEXT NOT NULL,
                service       TEXT NOT NULL,
                metric        TEXT NOT NULL,
                condition     TEXT NOT NULL,
                threshold     REAL NOT NULL,
                severity      TEXT NOT NULL,
                duration_secs INTEGER NOT NULL,
                cooldown_secs INTEGER NOT NULL,
                tags          TEXT NOT NULL,
                enabled       INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS notification_attempts (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                alert_id     TEXT NOT NULL,
                channel_name TEXT NOT NULL,
                success      INTEGER NOT NULL,
                error        TEXT,
                timestamp    INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_alerts_status ON alerts(status);
            CREATE INDEX IF NOT EXISTS idx_attempts_alert
                ON notification_attempts(alert_id);",
        )?;
        Ok(())
    }

    /// Converts a missing alert into [`StorageError::NotFound`].
    pub fn require_alert(&self, id: &str) -> Result<Alert> {
        self.get_alert(id)?.ok_or_else(|| StorageError::NotFound {
            entity: "alert",
            id: id.to_string(),
        })
    }
}

impl AuditStore for SqliteAuditStore {
    fn upsert_rule(&self, rule: &AlertRule) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let tags_json = serde_json::to_string(&rule.tags)?;
        let mut stmt = conn.prepare_cached(
            "INSERT OR REPLACE INTO alert_rules
                 (id, name, description, service, metric, condition, threshold,
                  severity, duration_secs, cooldown_secs, tags, enabled)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        )?;
        stmt.execute(rusqlite::params![
            &rule.id,
            &rule.name,
            &rule.description,
            &rule.service,
            &rule.metric,
            rule.condition.to_string(),
            rule.threshold,
            rule.severity.to_string(),
            rule.duration_secs as i64,
            rule.cooldown_secs as i64,
            tags_json,
            rule.enabled,
        ])?;
        Ok(())
    }

    fn list_rules(&self) -> Result<Vec<AlertRule>> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt = conn.prepare_cached(
            "SELECT id, name, description, service, metric, condition, threshold,
                    severity, duration_secs, cooldown_secs, tags, enabled
             FROM alert_rules ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, f64>(6)?,
                row.get::<_, String>(7)?,
                row.get::<_, i64>(8)?,
                row.get::<_, i64>(9)?,
                row.get::<_, String>(10)?,
                row.get::<_, bool>(11)?,
            ))
        })?;

        let mut rules = Vec::new();
        for row in rows {
            let (
                id,
                name,
                description,
                service,
                metric,
                condition_str,
                threshold,
                severity_str,
                duration_secs,
                cooldown_secs,
                tags_json,
                enabled,
            ) = row?;

            // Skip rows that no longer parse instead of failing the load.
            let condition: AlertCondition = match condition_str.parse() {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(rule_id = %id, error = %e, "Skipping rule with invalid condition");
                    continue;
                }
            };
            let severity: Severity = match severity_str.parse() {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(rule_id = %id, error = %e, "Skipping rule with invalid severity");
                    continue;
                }
            };
            if duration_secs < 0 || cooldown_secs < 0 {
                tracing::warn!(rule_id = %id, "Skipping rule with negative duration or cooldown");
                continue;
            }

            rules.push(AlertRule {
                id,
                name,
                description,
                service,
                metric,
                condition,
                threshold,
                severity,
                duration_secs: duration_secs as u64,
                cooldown_secs: cooldown_secs as u64,
                tags: serde_json::from_str(&tags_json).unwrap_or_default(),
                enabled,
            });
        }
        Ok(rules)
    }

    fn upsert_alert(&self, alert: &Alert) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let tags_json = serde_json::to_string(&alert.tags)?;
        let details_json = serde_json::to_string(&alert.details)?;
        let mut stmt = conn.prepare_cached(
            "INSERT OR REPLACE INTO alerts
                 (id, rule_id, title, description, severity, service, metric,
                  threshold, current_value, timestamp, status, tags, details)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        )?;
        stmt.execute(rusqlite::params![
            &alert.id,
            &alert.rule_id,
            &alert.title,
            &alert.description,
            alert.severity.to_string(),
            &alert.service,
            &alert.metric,
            alert.threshold,
            alert.current_value,
            alert.timestamp.timestamp_millis(),
            alert.status.to_string(),
            tags_json,
            details_json,
        ])?;
        Ok(())
    }

    fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt =
            conn.prepare_cached(&format!("SELECT {ALERT_COLUMNS} FROM alerts WHERE id = ?1"))?;
        let mut rows = stmt.query_map([id], read_alert_row)?;
        match rows.next() {
            Some(row) => Ok(Some(to_alert(row?)?)),
            None => Ok(None),
        }
    }

    fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts
             WHERE status != 'resolved' ORDER BY timestamp DESC"
        ))?;
        let rows = stmt.query_map([], read_alert_row)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(to_alert(row?)?);
        }
        Ok(alerts)
    }

    fn alert_history(&self, limit: usize, offset: usize) -> Result<Vec<Alert>> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {ALERT_COLUMNS} FROM alerts
             ORDER BY timestamp DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(rusqlite::params![limit as i64, offset as i64], read_alert_row)?;
        let mut alerts = Vec::new();
        for row in rows {
            alerts.push(to_alert(row?)?);
        }
        Ok(alerts)
    }

    fn record_attempt(&self, attempt: &NotificationAttempt) -> Result<()> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt = conn.prepare_cached(
            "INSERT INTO notification_attempts
                 (alert_id, channel_name, success, error, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )?;
        stmt.execute(rusqlite::params![
            &attempt.alert_id,
            &attempt.channel_name,
            attempt.success,
            attempt.error.as_deref(),
            attempt.timestamp.timestamp_millis(),
        ])?;
        Ok(())
    }

    fn attempts_for_alert(&self, alert_id: &str) -> Result<Vec<NotificationAttempt>> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let mut stmt = conn.prepare_cached(
            "SELECT alert_id, channel_name, success, error, timestamp
             FROM notification_attempts WHERE alert_id = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([alert_id], |row| {
            let ts_ms: i64 = row.get(4)?;
            Ok(NotificationAttempt {
                alert_id: row.get(0)?,
                channel_name: row.get(1)?,
                success: row.get(2)?,
                error: row.get(3)?,
                timestamp: DateTime::from_timestamp_millis(ts_ms).unwrap_or_default(),
            })
        })?;
        let mut attempts = Vec::new();
        for row in rows {
            attempts.push(row?);
        }
        Ok(attempts)
    }

    fn count_failed_attempts(&self) -> Result<u64> {
        let conn = self.conn.lock().unwrap_or_else(|p| p.into_inner());
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notification_attempts WHERE success = 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}
