use crate::plugin::ChannelPlugin;
use crate::{ChannelAdapter, NotifyError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tradewatch_common::types::{format_tags, Alert};

/// Generic HTTP webhook channel.
///
/// Posts a JSON rendering of the alert, or a caller-supplied body template
/// with `{{placeholder}}` substitution.
pub struct GenericWebhookChannel {
    name: String,
    client: reqwest::Client,
    url: String,
    body_template: Option<String>,
}

impl GenericWebhookChannel {
    pub fn new(name: &str, url: &str, body_template: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            client: reqwest::Client::new(),
            url: url.to_string(),
            body_template,
        }
    }

    pub(crate) fn render_body(&self, alert: &Alert, resolved: bool) -> String {
        let state = if resolved { "resolved" } else { "firing" };
        if let Some(template) = &self.body_template {
            template
                .replace("{{alert_id}}", &alert.id)
                .replace("{{rule_id}}", &alert.rule_id)
                .replace("{{title}}", &alert.title)
                .replace("{{service}}", &alert.service)
                .replace("{{metric}}", &alert.metric)
                .replace("{{value}}", &format!("{:.2}", alert.current_value))
                .replace("{{threshold}}", &format!("{:.2}", alert.threshold))
                .replace("{{severity}}", &alert.severity.to_string())
                .replace("{{message}}", &alert.description)
                .replace("{{timestamp}}", &alert.timestamp.to_rfc3339())
                .replace("{{tags}}", &format_tags(&alert.tags))
                .replace("{{state}}", state)
        } else {
            serde_json::json!({
                "alert_id": alert.id,
                "rule_id": alert.rule_id,
                "title": alert.title,
                "service": alert.service,
                "metric": alert.metric,
                "severity": alert.severity.to_string(),
                "message": alert.description,
                "value": alert.current_value,
                "threshold": alert.threshold,
                "timestamp": alert.timestamp.to_rfc3339(),
                "tags": alert.tags,
                "state": state,
            })
            .to_string()
        }
    }

    async fn post(&self, alert: &Alert, resolved: bool) -> Result<()> {
        let body = self.render_body(alert, resolved);
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(NotifyError::Api {
                service: "webhook".to_string(),
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for GenericWebhookChannel {
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
struct WebhookConfig {
    url: String,
    body_template: Option<String>,
}

pub struct GenericWebhookPlugin;

impl ChannelPlugin for GenericWebhookPlugin {
    fn name(&self) -> &str {
        "webhook"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<WebhookConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook: {e}")))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_name: &str,
        config: &Value,
    ) -> Result<std::sync::Arc<dyn ChannelAdapter>> {
        let cfg: WebhookConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("webhook: {e}")))?;
        Ok(std::sync::Arc::new(GenericWebhookChannel::new(
            instance_name,
            &cfg.url,
            cfg.body_template,
        )))
    }
}
