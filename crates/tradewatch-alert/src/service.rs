use crate::config::EngineConfig;
use crate::engine::{AlertEngine, AlertSignal, AlertSummary};
use crate::error::{ConfigError, EngineError};
use crate::rules::RuleDefinition;
use crate::sweep::Sweeper;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tradewatch_common::types::{Alert, AlertRule, MetricSample};
use tradewatch_notify::dispatcher::NotificationDispatcher;
use tradewatch_notify::ChannelAdapter;
use tradewatch_storage::AuditStore;

/// The assembled alerting subsystem: evaluation core, FIFO dispatch worker
/// and periodic sweep loop.
///
/// Construct one instance per process (or per test) and pass it around
/// explicitly; there is no global singleton. `check_metric` is synchronous
/// and safe to call from many producers at once; dispatch happens on the
/// worker task, so a slow channel never blocks a producer.
pub struct AlertService {
    engine: Arc<AlertEngine>,
    outbox: mpsc::UnboundedSender<AlertSignal>,
    shutdown: watch::Sender<bool>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AlertService {
    /// Builds the engine and spawns the dispatch worker and sweep loop.
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: EngineConfig,
        audit: Arc<dyn AuditStore>,
        channels: Vec<Arc<dyn ChannelAdapter>>,
    ) -> Arc<Self> {
        let dispatcher = Arc::new(NotificationDispatcher::new(
            channels,
            config.dispatch_pool_size,
            Duration::from_secs(config.channel_timeout_secs),
        ));
        let engine = Arc::new(AlertEngine::new(&config, audit.clone()));
        let (outbox, inbox) = mpsc::unbounded_channel();
        let (shutdown, shutdown_rx) = watch::channel(false);

        let worker = DispatchWorker {
            inbox,
            dispatcher,
            audit,
            dispatch_failures: engine.dispatch_failure_counter(),
        };
        let worker_handle = tokio::spawn(worker.run(shutdown_rx.clone()));

        let sweeper = Sweeper::new(engine.clone(), config.sweep_interval_secs, outbox.clone());
        let sweeper_handle = tokio::spawn(sweeper.run(shutdown_rx));

        Arc::new(Self {
            engine,
            outbox,
            shutdown,
            workers: Mutex::new(vec![worker_handle, sweeper_handle]),
        })
    }

    /// Records one measurement and runs it through every matching rule.
    ///
    /// Never blocks on I/O and never fails toward the producer: dispatch
    /// requests are queued for the worker, evaluation errors are counted
    /// and logged internally.
    pub fn check_metric(
        &self,
        service: &str,
        metric: &str,
        value: f64,
        tags: HashMap<String, String>,
    ) {
        let sample = MetricSample::new(service, metric, value, tags, Utc::now());
        for signal in self.engine.ingest(&sample) {
            if self.outbox.send(signal).is_err() {
                tracing::warn!("Dispatch queue closed, dropping notification");
            }
        }
    }

    pub fn add_alert_rule(&self, rule: AlertRule) -> Result<(), ConfigError> {
        self.engine.add_rule(rule)
    }

    pub fn add_rule_definition(&self, def: RuleDefinition) -> Result<(), ConfigError> {
        self.engine.add_rule_definition(def)
    }

    /// Active alerts, most recent first.
    pub fn get_active_alerts(&self) -> Vec<Alert> {
        self.engine.active_alerts()
    }

    pub fn acknowledge_alert(&self, alert_id: &str) -> Result<Alert, EngineError> {
        self.engine.acknowledge(alert_id)
    }

    pub fn suppress_alert(&self, alert_id: &str) -> Result<Alert, EngineError> {
        self.engine.suppress(alert_id)
    }

    pub fn get_alert_summary(&self) -> AlertSummary {
        self.engine.summary()
    }

    /// Direct access to the evaluation core, mainly for embedding and
    /// warm-start (`restore_from_audit`).
    pub fn engine(&self) -> &Arc<AlertEngine> {
        &self.engine
    }

    /// Signals shutdown and waits for the workers.
    ///
    /// No new sweep cycles start afterwards; queued and in-flight
    /// dispatches finish or time out before the worker exits.
    pub async fn shutdown(&self) {
        let _ = self.shutdown.send(true);
        let handles: Vec<JoinHandle<()>> = {
            let mut workers = self.workers.lock().unwrap_or_else(|p| p.into_inner());
            workers.drain(..).collect()
        };
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Alerting worker task failed");
            }
        }
        tracing::info!("Alert service stopped");
    }
}

/// Consumes dispatch requests in FIFO order so a resolve never overtakes
/// the fire it belongs to, fans each one out to the channels and records
/// the per-channel attempts in the audit store.
struct DispatchWorker {
    inbox: mpsc::UnboundedReceiver<AlertSignal>,
    dispatcher: Arc<NotificationDispatcher>,
    audit: Arc<dyn AuditStore>,
    dispatch_failures: Arc<AtomicU64>,
}

impl DispatchWorker {
    async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                maybe_signal = self.inbox.recv() => match maybe_signal {
                    Some(signal) => self.handle(signal).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        // Drain already-queued work, then stop.
                        while let Ok(signal) = self.inbox.try_recv() {
                            self.handle(signal).await;
                        }
                        break;
                    }
                }
            }
        }
        tracing::info!("Dispatch worker stopped");
    }

    async fn handle(&self, signal: AlertSignal) {
        if self.dispatcher.is_empty() {
            return;
        }
        let attempts = self.dispatcher.dispatch(&signal.alert, signal.event).await;
        for attempt in attempts.values() {
            if !attempt.success {
                self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
            }
            if let Err(e) = self.audit.record_attempt(attempt) {
                tracing::error!(
                    alert_id = %attempt.alert_id,
                    channel = %attempt.channel_name,
                    error = %e,
                    "Failed to record notification attempt"
                );
            }
        }
    }
}
