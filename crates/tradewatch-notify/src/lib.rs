//! Notification delivery with pluggable channel support.
//!
//! Alert fire and resolve events are fanned out to every registered
//! [`ChannelAdapter`] concurrently by the
//! [`dispatcher::NotificationDispatcher`]; per-channel failures are
//! recorded as failed attempts and never affect sibling channels.
//! Built-in channels cover email (SMTP), chat webhooks and generic HTTP
//! webhooks.

pub mod channels;
pub mod dispatcher;
pub mod error;
pub mod plugin;

#[cfg(test)]
mod tests;

pub use error::{NotifyError, Result};

use async_trait::async_trait;
use tradewatch_common::types::Alert;

/// The dispatch event kind: a new firing or the matching resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchEvent {
    Fire,
    Resolve,
}

impl std::fmt::Display for DispatchEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchEvent::Fire => write!(f, "fire"),
            DispatchEvent::Resolve => write!(f, "resolve"),
        }
    }
}

/// A notification delivery channel that sends alert events to an external
/// service (e.g. SMTP, chat robot, HTTP endpoint).
///
/// Implementations are created by the corresponding
/// [`plugin::ChannelPlugin`] and registered with the dispatcher. Channels
/// must not assume any ordering relative to other channels.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Instance name, used as the key in dispatch results and audit rows.
    fn name(&self) -> &str;

    /// Delivers a firing alert through this channel.
    async fn send_alert(&self, alert: &Alert) -> Result<()>;

    /// Delivers the resolution of a previously fired alert.
    async fn send_resolution(&self, alert: &Alert) -> Result<()>;
}
