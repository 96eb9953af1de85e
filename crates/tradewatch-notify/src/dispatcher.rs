use crate::{ChannelAdapter, DispatchEvent};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tradewatch_common::types::{Alert, NotificationAttempt};

/// Best-effort concurrent fan-out of one alert event to every registered
/// channel.
///
/// Channel sends run on a bounded worker pool with an independent
/// per-channel timeout, so a slow or hung channel can neither starve the
/// others nor block the call indefinitely. `dispatch` returns once every
/// channel has succeeded, failed or timed out; it never retries; resend
/// policy belongs to the caller.
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn ChannelAdapter>>,
    pool: Arc<Semaphore>,
    channel_timeout: Duration,
}

impl NotificationDispatcher {
    pub fn new(
        channels: Vec<Arc<dyn ChannelAdapter>>,
        pool_size: usize,
        channel_timeout: Duration,
    ) -> Self {
        Self {
            channels,
            pool: Arc::new(Semaphore::new(pool_size.max(1))),
            channel_timeout,
        }
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Fans `event` out to all channels and returns one attempt per channel.
    pub async fn dispatch(
        &self,
        alert: &Alert,
        event: DispatchEvent,
    ) -> HashMap<String, NotificationAttempt> {
        let mut handles = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let name = channel.name().to_string();

            // Acquiring before spawn bounds in-flight sends to the pool size.
            let permit = match self.pool.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    // Semaphore closed: only possible during teardown.
                    handles.push((name, None));
                    continue;
                }
            };

            let channel = channel.clone();
            let alert = alert.clone();
            let timeout = self.channel_timeout;
            let handle = tokio::spawn(async move {
                let send = async {
                    match event {
                        DispatchEvent::Fire => channel.send_alert(&alert).await,
                        DispatchEvent::Resolve => channel.send_resolution(&alert).await,
                    }
                };
                let outcome = match tokio::time::timeout(timeout, send).await {
                    Ok(Ok(())) => (true, None),
                    Ok(Err(e)) => (false, Some(e.to_string())),
                    Err(_) => (
                        false,
                        Some(format!("timed out after {}s", timeout.as_secs())),
                    ),
                };
                drop(permit);
                outcome
            });
            handles.push((name, Some(handle)));
        }

        let mut attempts = HashMap::with_capacity(handles.len());
        for (name, handle) in handles {
            let (success, error) = match handle {
                Some(handle) => match handle.await {
                    Ok(outcome) => outcome,
                    // A panicking channel is isolated like any other failure.
                    Err(e) => (false, Some(format!("channel task failed: {e}"))),
                },
                None => (false, Some("dispatcher worker pool closed".to_string())),
            };

            if success {
                tracing::debug!(channel = %name, alert_id = %alert.id, event = %event, "Notification delivered");
            } else {
                tracing::error!(
                    channel = %name,
                    alert_id = %alert.id,
                    event = %event,
                    error = error.as_deref().unwrap_or("unknown"),
                    "Notification failed"
                );
            }

            attempts.insert(
                name.clone(),
                NotificationAttempt {
                    alert_id: alert.id.clone(),
                    channel_name: name,
                    success,
                    error,
                    timestamp: Utc::now(),
                },
            );
        }
        attempts
    }
}
