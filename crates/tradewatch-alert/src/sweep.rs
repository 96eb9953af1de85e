use crate::engine::{AlertEngine, AlertSignal};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};

/// Periodic re-evaluation loop.
///
/// Re-checks every active alert against the latest history on a fixed
/// interval and forwards resulting resolutions to the dispatch queue. No
/// new cycle starts once shutdown is signalled.
pub struct Sweeper {
    engine: Arc<AlertEngine>,
    interval_secs: u64,
    outbox: mpsc::UnboundedSender<AlertSignal>,
}

impl Sweeper {
    pub fn new(
        engine: Arc<AlertEngine>,
        interval_secs: u64,
        outbox: mpsc::UnboundedSender<AlertSignal>,
    ) -> Self {
        Self {
            engine,
            interval_secs,
            outbox,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_secs = self.interval_secs, "Sweep loop started");
        let mut tick = interval(Duration::from_secs(self.interval_secs.max(1)));
        // The first tick completes immediately; skip it so a fresh engine
        // is not swept before any samples arrive.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    for signal in self.engine.sweep(Utc::now()) {
                        if self.outbox.send(signal).is_err() {
                            tracing::warn!("Dispatch queue closed, stopping sweep loop");
                            return;
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("Sweep loop stopped");
    }
}
