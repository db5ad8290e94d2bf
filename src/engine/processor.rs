//! The risk processor: queued, worker-pool-driven evaluation cycles.
//!
//! Cycle shape: run the selected evaluators concurrently (each under its own
//! timeout and failure isolation), deduplicate and store the atomics,
//! re-read the user's active pattern set, compose, aggregate, publish. A
//! full queue drops new work instead of blocking producers; the system
//! degrades by skipping cycles.

use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::aggregation::{RiskAggregator, RiskReport};
use crate::composition::CompositionEngine;
use crate::config::Config;
use crate::evaluators::{EvaluatorRegistry, EvaluatorSelection, Preset};
use crate::pattern::{AtomicPattern, PatternStore};
use crate::state::{ActivityEvent, EquityStore, JobStore, PositionStore};

use super::publisher::ReportPublisher;

/// One queued unit of work: evaluate a user with a set of evaluators.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub user_id: String,
    pub evaluator_ids: Vec<String>,
}

#[derive(Debug, Default)]
struct ProcessorMetrics {
    cycles_completed: AtomicU64,
    cycles_failed: AtomicU64,
    reports_published: AtomicU64,
    requests_dropped: AtomicU64,
    evaluator_failures: AtomicU64,
    evaluator_timeouts: AtomicU64,
}

/// Point-in-time metrics view for status logging.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct MetricsSnapshot {
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub reports_published: u64,
    pub requests_dropped: u64,
    pub evaluator_failures: u64,
    pub evaluator_timeouts: u64,
}

/// Coordinates evaluators, stores, composition, aggregation, and publishing
/// for continuous per-user risk evaluation.
pub struct RiskProcessor {
    registry: EvaluatorRegistry,
    composition: CompositionEngine,
    aggregator: RiskAggregator,
    store: Arc<PatternStore>,
    jobs: Arc<JobStore>,
    positions: Arc<PositionStore>,
    equity: Arc<EquityStore>,
    publisher: Arc<dyn ReportPublisher>,
    config: Config,
    tx: mpsc::Sender<EvaluationRequest>,
    rx: Mutex<Option<mpsc::Receiver<EvaluationRequest>>>,
    shutdown: AtomicBool,
    shutdown_notify: Notify,
    metrics: ProcessorMetrics,
}

impl RiskProcessor {
    /// Wire up a processor. Call `start` to launch its background loops.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Config,
        registry: EvaluatorRegistry,
        composition: CompositionEngine,
        store: Arc<PatternStore>,
        jobs: Arc<JobStore>,
        positions: Arc<PositionStore>,
        equity: Arc<EquityStore>,
        publisher: Arc<dyn ReportPublisher>,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::channel(config.engine.queue_capacity);
        let aggregator = RiskAggregator::new(config.aggregation.clone());

        Arc::new(Self {
            registry,
            composition,
            aggregator,
            store,
            jobs,
            positions,
            equity,
            publisher,
            config,
            tx,
            rx: Mutex::new(Some(rx)),
            shutdown: AtomicBool::new(false),
            shutdown_notify: Notify::new(),
            metrics: ProcessorMetrics::default(),
        })
    }

    /// Launch the dispatcher and the periodic position sweep.
    pub fn start(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        if let Some(rx) = self.rx.lock().unwrap().take() {
            let this = self.clone();
            handles.push(tokio::spawn(async move { this.dispatch_loop(rx).await }));
        } else {
            warn!("Dispatcher already started, ignoring");
        }

        let this = self.clone();
        handles.push(tokio::spawn(async move { this.sweep_loop().await }));

        info!(
            queue_capacity = self.config.engine.queue_capacity,
            max_concurrent_batches = self.config.engine.max_concurrent_batches,
            sweep_interval_secs = self.config.engine.sweep_interval_secs,
            "🚀 [ENGINE] Risk processor started"
        );
        handles
    }

    /// Signal the background loops to stop after their current poll.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.shutdown_notify.notify_waiters();
    }

    /// Route an inbound activity update into the state stores.
    pub fn record_event(&self, event: ActivityEvent) {
        match event {
            ActivityEvent::Job(job) => self.jobs.record_job(job),
            ActivityEvent::PositionUpdate(position) => self.positions.upsert(position),
            ActivityEvent::PositionClosed {
                user_id,
                position_key,
            } => {
                self.positions.close(&user_id, &position_key);
            }
            ActivityEvent::EquitySnapshot {
                user_id,
                equity,
                timestamp,
            } => self.equity.record(&user_id, equity, timestamp),
        }
    }

    /// Request an evaluation cycle. Returns false when the queue is full
    /// (the request is dropped and logged) or the engine is shutting down.
    pub fn enqueue_evaluation(&self, user_id: &str, selection: EvaluatorSelection) -> bool {
        let request = EvaluationRequest {
            user_id: user_id.to_string(),
            evaluator_ids: selection.ids(),
        };
        match self.tx.try_send(request) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(request)) => {
                self.metrics.requests_dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    user_id = %request.user_id,
                    "⚠️  [QUEUE] Evaluation queue full, dropping request"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Run one evaluation cycle inline and return the published report.
    pub async fn evaluate_user_now(
        &self,
        user_id: &str,
        selection: EvaluatorSelection,
    ) -> Result<RiskReport> {
        let request = EvaluationRequest {
            user_id: user_id.to_string(),
            evaluator_ids: selection.ids(),
        };
        self.run_cycle(&request).await
    }

    /// Current metrics counters.
    pub fn metrics(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            cycles_completed: self.metrics.cycles_completed.load(Ordering::Relaxed),
            cycles_failed: self.metrics.cycles_failed.load(Ordering::Relaxed),
            reports_published: self.metrics.reports_published.load(Ordering::Relaxed),
            requests_dropped: self.metrics.requests_dropped.load(Ordering::Relaxed),
            evaluator_failures: self.metrics.evaluator_failures.load(Ordering::Relaxed),
            evaluator_timeouts: self.metrics.evaluator_timeouts.load(Ordering::Relaxed),
        }
    }

    /// Drain the request queue, handing batches to the bounded worker pool.
    async fn dispatch_loop(self: Arc<Self>, mut rx: mpsc::Receiver<EvaluationRequest>) {
        let pool = Arc::new(Semaphore::new(self.config.engine.max_concurrent_batches));

        while !self.shutdown.load(Ordering::SeqCst) {
            // Short-timeout poll: an empty poll is a non-event, just a
            // chance to observe the shutdown flag.
            let request = match tokio::time::timeout(
                Duration::from_millis(500),
                rx.recv(),
            )
            .await
            {
                Err(_) => continue,
                Ok(None) => break,
                Ok(Some(request)) => request,
            };

            let permit = pool.clone().acquire_owned().await.unwrap();
            let this = self.clone();
            tokio::spawn(async move {
                let _permit = permit;
                let user_id = request.user_id.clone();
                match this.run_cycle(&request).await {
                    Ok(report) => {
                        debug!(
                            user_id = %user_id,
                            level = %report.top_risk_level,
                            "Evaluation cycle complete"
                        );
                    }
                    Err(e) => {
                        this.metrics.cycles_failed.fetch_add(1, Ordering::Relaxed);
                        error!(user_id = %user_id, error = %e, "Evaluation cycle failed");
                    }
                }
            });
        }
        info!("🛑 [ENGINE] Dispatcher stopped");
    }

    /// Re-run the position preset for every user with open positions on a
    /// fixed interval, independent of inbound events.
    async fn sweep_loop(self: Arc<Self>) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.engine.sweep_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = self.shutdown_notify.notified() => break,
            }
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let users = self.positions.users_with_positions();
            if users.is_empty() {
                continue;
            }
            debug!(users = users.len(), "📡 [SWEEP] Position sweep tick");
            for user_id in users {
                self.enqueue_evaluation(
                    &user_id,
                    EvaluatorSelection::Preset(Preset::PositionsOnly),
                );
            }
        }
        info!("🛑 [ENGINE] Sweep loop stopped");
    }

    /// One full evaluation cycle for one user.
    async fn run_cycle(&self, request: &EvaluationRequest) -> Result<RiskReport> {
        let user_id = &request.user_id;
        let started = Utc::now();
        let evaluators = self.registry.resolve(&request.evaluator_ids);
        let timeout = Duration::from_secs(self.config.engine.evaluator_timeout_secs);

        // Every evaluator runs concurrently, each isolated and bounded.
        let tasks: Vec<(&'static str, JoinHandle<_>)> = evaluators
            .into_iter()
            .map(|evaluator| {
                let id = evaluator.id();
                let user = user_id.clone();
                let handle = tokio::spawn(async move {
                    tokio::time::timeout(timeout, evaluator.evaluate(&user)).await
                });
                (id, handle)
            })
            .collect();

        let mut collected: Vec<AtomicPattern> = Vec::new();
        let (ids, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        for (id, joined) in ids.into_iter().zip(join_all(handles).await) {
            match joined {
                Ok(Ok(Ok(patterns))) => collected.extend(patterns),
                Ok(Ok(Err(e))) => {
                    self.metrics.evaluator_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(user_id = %user_id, evaluator = id, error = %e, "Evaluator failed, treating as empty");
                }
                Ok(Err(_elapsed)) => {
                    self.metrics.evaluator_timeouts.fetch_add(1, Ordering::Relaxed);
                    warn!(user_id = %user_id, evaluator = id, "Evaluator timed out, result discarded");
                }
                Err(e) => {
                    self.metrics.evaluator_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(user_id = %user_id, evaluator = id, error = %e, "Evaluator task aborted");
                }
            }
        }

        // Deduplicate by (pattern_id, position_key), keeping the higher
        // severity duplicate.
        let mut deduped: HashMap<(String, Option<String>), AtomicPattern> = HashMap::new();
        for pattern in collected {
            let key = (pattern.pattern_id.clone(), pattern.position_key.clone());
            match deduped.get(&key) {
                Some(existing) if existing.severity >= pattern.severity => {}
                _ => {
                    deduped.insert(key, pattern);
                }
            }
        }
        let fresh: Vec<AtomicPattern> = deduped.into_values().collect();
        debug!(
            user_id = %user_id,
            patterns = fresh.len(),
            "📊 [CYCLE] Evaluators returned patterns"
        );

        self.store.store_patterns(user_id, fresh);

        // Read-after-write: composition and aggregation observe the set
        // including this cycle's atomics.
        let (mut atomics, mut composites) = self
            .store
            .get_user_patterns(user_id, self.config.patterns.lookback_hours);

        match self.composition.process(user_id, &mut atomics) {
            Ok(new_composites) => {
                let consumed: Vec<String> = atomics
                    .iter()
                    .filter(|p| p.consumed)
                    .map(|p| p.id.clone())
                    .collect();
                self.store.mark_consumed(user_id, &consumed);
                self.store
                    .store_composites(user_id, new_composites.clone());
                composites.extend(new_composites);
            }
            Err(e) => {
                // Fall back to aggregating the plain atomic set so a report
                // still goes out.
                warn!(user_id = %user_id, error = %e, "Composition failed, aggregating atomics only");
            }
        }

        let report = self.aggregator.aggregate(&atomics, &composites, user_id);

        if let Err(e) = self
            .publisher
            .publish(&report)
            .await
            .context("Publishing risk report")
        {
            // Stored pattern state is not rolled back; publish is not
            // transactional with state mutation.
            error!(user_id = %user_id, error = %e, "❌ [PUBLISH] Report publish failed");
        } else {
            self.metrics.reports_published.fetch_add(1, Ordering::Relaxed);
        }

        self.metrics.cycles_completed.fetch_add(1, Ordering::Relaxed);
        debug!(
            user_id = %user_id,
            elapsed_ms = (Utc::now() - started).num_milliseconds(),
            "✅ [CYCLE] Cycle finished"
        );
        Ok(report)
    }
}
