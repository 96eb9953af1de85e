use crate::plugin::ChannelPlugin;
use crate::{ChannelAdapter, NotifyError, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use serde_json::Value;
use tradewatch_common::types::{format_tags, Alert};

pub struct EmailChannel {
    name: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    recipients: Vec<Mailbox>,
}

impl EmailChannel {
    pub fn new(
        name: &str,
        smtp_host: &str,
        smtp_port: u16,
        username: Option<&str>,
        password: Option<&str>,
        from: &str,
        recipients: &[String],
    ) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(smtp_host)
            .map_err(|e| NotifyError::Smtp(e.to_string()))?
            .port(smtp_port);

        if let (Some(user), Some(pass)) = (username, password) {
            builder = builder.credentials(Credentials::new(user.to_string(), pass.to_string()));
        }

        let from = from
            .parse()
            .map_err(|e| NotifyError::InvalidConfig(format!("bad from address: {e}")))?;
        let recipients = recipients
            .iter()
            .map(|r| {
                r.parse()
                    .map_err(|e| NotifyError::InvalidConfig(format!("bad recipient '{r}': {e}")))
            })
            .collect::<Result<Vec<Mailbox>>>()?;

        Ok(Self {
            name: name.to_string(),
            transport: builder.build(),
            from,
            recipients,
        })
    }

    fn subject(alert: &Alert, resolved: bool) -> String {
        let tag = if resolved { "[RESOLVED]" } else { "" };
        format!(
            "[tradewatch][{}]{} {} - {}",
            alert.severity, tag, alert.title, alert.service
        )
    }

    fn body(alert: &Alert, resolved: bool) -> String {
        let tags_str = format_tags(&alert.tags);
        let tags_line = if tags_str.is_empty() {
            String::new()
        } else {
            format!("\nTags: {tags_str}")
        };
        let status_line = if resolved { "\nStatus: resolved" } else { "" };
        format!(
            "Alert: {severity}{status_line}\nRule: {title}\nService: {service}\nMetric: {metric}{tags_line}\nValue: {value:.2}\nThreshold: {threshold:.2}\nMessage: {message}\nTime: {time}",
            severity = alert.severity,
            status_line = status_line,
            title = alert.title,
            service = alert.service,
            metric = alert.metric,
            tags_line = tags_line,
            value = alert.current_value,
            threshold = alert.threshold,
            message = alert.description,
            time = alert.timestamp,
        )
    }

    async fn deliver(&self, alert: &Alert, resolved: bool) -> Result<()> {
        let subject = Self::subject(alert, resolved);
        let body = Self::body(alert, resolved);

        for recipient in &self.recipients {
            let email = Message::builder()
                .from(self.from.clone())
                .to(recipient.clone())
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| NotifyError::Smtp(e.to_string()))?;

            self.transport
                .send(email)
                .await
                .map_err(|e| NotifyError::Smtp(e.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for EmailChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_alert(&self, alert: &Alert) -> Result<()> {
        self.deliver(alert, false).await
    }

    async fn send_resolution(&self, alert: &Alert) -> Result<()> {
        self.deliver(alert, true).await
    }
}

// Plugin

#[derive(Deserialize)]
struct EmailConfig {
    smtp_host: String,
    smtp_port: u16,
    smtp_username: Option<String>,
    smtp_password: Option<String>,
    from: String,
    recipients: Vec<String>,
}

pub struct EmailPlugin;

impl ChannelPlugin for EmailPlugin {
    fn name(&self) -> &str {
        "email"
    }

    fn validate_config(&self, config: &Value) -> Result<()> {
        serde_json::from_value::<EmailConfig>(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("email: {e}")))?;
        Ok(())
    }

    fn create_channel(
        &self,
        instance_name: &str,
        config: &Value,
    ) -> Result<std::sync::Arc<dyn ChannelAdapter>> {
        let cfg: EmailConfig = serde_json::from_value(config.clone())
            .map_err(|e| NotifyError::InvalidConfig(format!("email: {e}")))?;
        let channel = EmailChannel::new(
            instance_name,
            &cfg.smtp_host,
            cfg.smtp_port,
            cfg.smtp_username.as_deref(),
            cfg.smtp_password.as_deref(),
            &cfg.from,
            &cfg.recipients,
        )?;
        Ok(std::sync::Arc::new(channel))
    }

    fn redact_config(&self, config: &Value) -> Value {
        let mut redacted = config.clone();
        if let Some(obj) = redacted.as_object_mut() {
            if obj.contains_key("smtp_password") {
                obj.insert(
                    "smtp_password".to_string(),
                    Value::String("***".to_string()),
                );
            }
        }
        redacted
    }
}
