use crate::plugin::ChannelPlugin;
use crate::{ChannelAdapter, NotifyError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tradewatch_common::types::{format_tags, Alert};

/// Chat-robot webhook channel (Slack/Mattermost style `{"text": ...}`
/// payload).
pub struct ChatWebhookChannel {
    name: String,
    client: reqwest::Client,
    webhook_url: String,
}

impl ChatWebhookChannel {
    pub fn new(name: &str, webhook_url: &str) -> Self {
        Self {
            name: name.to_string(),
            client: reqwest::Client::new(),
            webhook_url: webhook_url.to_string(),
        }
    }

    fn text(alert: &Alert, resolved: bool) -> String {
        let marker = if resolved { ":white_check_mark:" } else { ":rotating_light:" };
        let state = if resolved { "resolved" } else { "firing" };
        let tags_str = format_tags(&alert.tags);
        let tags_part = if tags_str.is_empty() {
            String::new()
        } else {
            format!(" [{tags_str}]")
        };
        format!(
            "{marker} *{title}* ({severity}, {state})\n{service}/{metric}{tags_part}: {value:.2} (threshold {threshold:.2})\n{message}",
            marker = marker,
            title = alert.title,
            severity = alert.severity,
            state = state,
            service = alert.service,
            metric = alert.metric,
            tags_part = tags_part,
            value = alert.current_value,
            threshold = alert.threshold,
            message = alert.description,
        )
    }

    async fn post(&self, alert: &Alert, resolved: bool) -> Result<()> {
        let payload = serde_json::json!({ "text": Self::text(alert, resolved) });
        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                service: "chat".to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for ChatWebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_alert(&self, alert: &Alert) -> Result<()> {
        self.post(alert, false).await
    }

    async fn send_resolution(&self, alert: &Alert) -> Result<()> {
        self.post(alert, true).await
    }
}

// Plugin

#[derive(Deserialize)]
struct ChatConfig {
    webhook_url: String,
}

pub struct ChatWebhookPlugin;

impl ChannelPlugin for ChatWebhookPlugin {
    fn name(&self) -> &str {
        "chat"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<ChatConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("chat: {e}")))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_name: &str,
        config: &Value,
    ) -> Result<std::sync::Arc<dyn ChannelAdapter>> {
        let cfg: ChatConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("chat: {e}")))?;
        Ok(std::sync::Arc::new(ChatWebhookChannel::new(
            instance_name,
            &cfg.webhook_url,
        )))
    }
}
