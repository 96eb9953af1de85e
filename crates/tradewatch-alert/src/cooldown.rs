use crate::shard::ShardedMap;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tradewatch_common::types::format_tags;

type CooldownKey = (String, String);

/// Tracks the last fire time per `(rule, entity)` and suppresses repeat
/// notification dispatch inside the cooldown window.
///
/// Keyed per entity so two trading pairs breaching the same rule do not
/// suppress each other. Cooldown gates dispatch only; evaluation and
/// lifecycle tracking continue while suppressed, so resolution is still
/// detected promptly.
pub struct CooldownController {
    last_fired: ShardedMap<CooldownKey, DateTime<Utc>>,
}

impl CooldownController {
    pub fn new() -> Self {
        Self {
            last_fired: ShardedMap::new(),
        }
    }

    /// True if no prior fire is recorded for this key, or the cooldown has
    /// elapsed since the last one.
    pub fn may_fire(
        &self,
        rule_id: &str,
        entity: &str,
        cooldown_secs: u64,
        now: DateTime<Utc>,
    ) -> bool {
        let key = (rule_id.to_string(), entity.to_string());
        match self.last_fired.get_clone(&key) {
            None => true,
            Some(last) => now - last >= Duration::seconds(cooldown_secs as i64),
        }
    }

    pub fn record_fire(&self, rule_id: &str, entity: &str, at: DateTime<Utc>) {
        self.last_fired
            .insert((rule_id.to_string(), entity.to_string()), at);
    }
}

impl Default for CooldownController {
    fn default() -> Self {
        Self::new()
    }
}

/// The distinguishing key that lets one rule fire independently per
/// subject: the canonical rendering of the sample's tags, or the service
/// name when no tags are supplied.
pub fn entity_key(service: &str, tags: &HashMap<String, String>) -> String {
    if tags.is_empty() {
        service.to_string()
    } else {
        format_tags(tags)
    }
}
