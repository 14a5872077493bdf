//! Sync engine: drains the mutation queue against the remote collaborator.
//!
//! A pass reads every queued mutation, orders it by enqueue time and applies
//! it remotely one at a time. Each mutation is claimed right before dispatch,
//! which stops local writes from folding into a create already on the wire.
//! Successful mutations leave the queue; failed ones stay (with their retry
//! counter bumped) for the next pass, and never stop later mutations from
//! being attempted.
//!
//! Passes are triggered by [`SyncEngine::start`], a periodic timer, and
//! offline-to-online transitions of the [`ConnectivityMonitor`]. At most one
//! pass runs at a time per engine.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::connectivity::ConnectivityMonitor;
use super::remote::{RemoteCollaborator, RemoteResult};
use crate::error::Result;
use crate::models::{ActionKind, MutationAction, MutationRecord};
use crate::services::LocalStore;
use crate::state::EngineState;

const MIN_INTERVAL: Duration = Duration::from_millis(10);

const UNRESOLVED_REASON: &str = "entity has no authoritative id; its create never synced";

/// Outcome of one completed pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PassReport {
    pub attempted: usize,
    pub synced: usize,
    pub failed: usize,
    /// Mutations moved to the dead-letter table during the pass
    pub dead_lettered: usize,
}

/// Handle to a sync engine; clones share the same engine.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    store: LocalStore,
    remote: Arc<dyn RemoteCollaborator>,
    connectivity: ConnectivityMonitor,
    max_retries: Option<u32>,
    running: AtomicBool,
    passes_completed: AtomicU64,
    /// Stop signal for the current timer and connectivity listener
    triggers: Mutex<Option<watch::Sender<bool>>>,
}

impl SyncEngine {
    /// Create an idle engine.
    ///
    /// With `max_retries` set, a mutation that has failed that many times is
    /// moved to the dead-letter table; with `None` it is retried forever.
    pub fn new(
        store: LocalStore,
        remote: Arc<dyn RemoteCollaborator>,
        connectivity: ConnectivityMonitor,
        max_retries: Option<u32>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                remote,
                connectivity,
                max_retries,
                running: AtomicBool::new(false),
                passes_completed: AtomicU64::new(0),
                triggers: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> EngineState {
        EngineState::from_running(self.inner.running.load(Ordering::Acquire))
    }

    /// Number of passes that ran to completion
    pub fn passes_completed(&self) -> u64 {
        self.inner.passes_completed.load(Ordering::Acquire)
    }

    /// Whether a timer and connectivity listener are active
    pub fn is_started(&self) -> bool {
        self.lock_triggers().is_some()
    }

    pub fn store(&self) -> &LocalStore {
        &self.inner.store
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.inner.connectivity
    }

    /// Start periodic syncing.
    ///
    /// Replaces any timer and listener from an earlier call, listens for the
    /// host coming online, runs one pass right away, then schedules a pass
    /// every `interval`.
    pub async fn start(&self, interval: Duration) {
        let interval = interval.max(MIN_INTERVAL);
        let stop = self.install_triggers();

        spawn_listener(
            Arc::downgrade(&self.inner),
            self.inner.connectivity.subscribe(),
            stop.clone(),
        );
        info!(
            interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            "Sync engine started"
        );

        self.run_pass_logged("start").await;
        spawn_timer(Arc::downgrade(&self.inner), interval, stop);
    }

    /// Stop scheduling passes. A pass already in progress runs to completion.
    pub fn stop(&self) {
        if let Some(triggers) = self.lock_triggers().take() {
            triggers.send_replace(true);
            info!("Sync engine stopped");
        }
    }

    /// Run one synchronization pass.
    ///
    /// Returns `Ok(None)` without touching anything when the host is offline
    /// or another pass is running. Per-mutation failures are contained in the
    /// report; only failing to read the queue is returned as an error.
    pub async fn run_pass(&self) -> Result<Option<PassReport>> {
        if !self.inner.connectivity.is_online() {
            debug!("Skipping sync pass while offline");
            return Ok(None);
        }
        let Some(_running) = RunningGuard::claim(&self.inner.running) else {
            debug!("Skipping sync pass; another pass is running");
            return Ok(None);
        };

        let mut pending = self.inner.store.list_pending().await?;
        pending.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));
        debug!(pending = pending.len(), "Starting sync pass");

        let mut report = PassReport::default();
        for queued in &pending {
            let claimed = match self.inner.store.claim(&queued.id).await {
                Ok(Some(mutation)) => mutation,
                Ok(None) => {
                    debug!(mutation_id = %queued.id, "Mutation left the queue before dispatch");
                    continue;
                }
                Err(error) => {
                    report.attempted += 1;
                    report.failed += 1;
                    error!(mutation_id = %queued.id, "Failed to claim mutation: {error}");
                    continue;
                }
            };
            let mutation = &claimed;
            report.attempted += 1;

            if mutation.kind() != ActionKind::Create && mutation.entity_id().is_temporary() {
                report.failed += 1;
                if self.dead_letter(mutation, UNRESOLVED_REASON).await {
                    report.dead_lettered += 1;
                }
                continue;
            }

            match dispatch(self.inner.remote.as_ref(), mutation).await {
                Ok(()) => match self.inner.store.acknowledge(mutation).await {
                    Ok(stranded) => {
                        report.synced += 1;
                        report.dead_lettered += stranded;
                    }
                    Err(error) => {
                        report.failed += 1;
                        error!(
                            mutation_id = %mutation.id,
                            table = %mutation.table,
                            "Mutation applied remotely but not dequeued: {error}"
                        );
                    }
                },
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        mutation_id = %mutation.id,
                        table = %mutation.table,
                        action = %mutation.kind(),
                        entity_id = %mutation.entity_id(),
                        retries = mutation.retries,
                        "Sync dispatch failed: {error}"
                    );
                    if self.record_failure(mutation, &error.to_string()).await {
                        report.dead_lettered += 1;
                    }
                }
            }
        }

        self.inner.passes_completed.fetch_add(1, Ordering::AcqRel);
        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                synced = report.synced,
                failed = report.failed,
                dead_lettered = report.dead_lettered,
                "Sync pass complete"
            );
        }
        Ok(Some(report))
    }

    async fn run_pass_logged(&self, trigger: &'static str) {
        if let Err(error) = self.run_pass().await {
            error!(trigger, "Sync pass failed: {error}");
        }
    }

    /// Bump the retry counter; returns whether the mutation was dead-lettered
    async fn record_failure(&self, mutation: &MutationRecord, message: &str) -> bool {
        let retries = match self.inner.store.record_failure(mutation, message).await {
            Ok(Some(retries)) => retries,
            Ok(None) => return false,
            Err(error) => {
                error!(mutation_id = %mutation.id, "Failed to record sync failure: {error}");
                return false;
            }
        };

        let Some(limit) = self.inner.max_retries else {
            return false;
        };
        if retries < limit {
            return false;
        }

        let reason = format!("gave up after {retries} attempts: {message}");
        self.dead_letter(mutation, &reason).await
    }

    /// Move a mutation out of the queue; returns whether it moved
    async fn dead_letter(&self, mutation: &MutationRecord, reason: &str) -> bool {
        match self.inner.store.dead_letter(&mutation.id, reason).await {
            Ok(()) => {
                warn!(
                    mutation_id = %mutation.id,
                    table = %mutation.table,
                    reason,
                    "Moved mutation to dead-letter table"
                );
                true
            }
            Err(error) => {
                error!(mutation_id = %mutation.id, "Failed to dead-letter mutation: {error}");
                false
            }
        }
    }

    fn install_triggers(&self) -> watch::Receiver<bool> {
        let (sender, receiver) = watch::channel(false);
        if let Some(previous) = self.lock_triggers().replace(sender) {
            previous.send_replace(true);
            debug!("Replaced previous sync timer");
        }
        receiver
    }

    fn lock_triggers(&self) -> std::sync::MutexGuard<'_, Option<watch::Sender<bool>>> {
        self.inner
            .triggers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Apply one mutation remotely according to its action
async fn dispatch(remote: &dyn RemoteCollaborator, mutation: &MutationRecord) -> RemoteResult<()> {
    match &mutation.action {
        MutationAction::Create(record) => {
            remote
                .create(&mutation.table, &record.remote_payload())
                .await
        }
        MutationAction::Update(record) => remote.update(&mutation.table, record).await,
        MutationAction::Delete(key) => remote.delete(&mutation.table, key).await,
    }
}

/// Holds the engine in `Running`; dropping it returns to `Idle`
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn spawn_timer(engine: Weak<EngineInner>, interval: Duration, mut stop: watch::Receiver<bool>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let Some(inner) = engine.upgrade() else {
                        break;
                    };
                    SyncEngine { inner }.run_pass_logged("timer").await;
                }
            }
        }
        debug!("Sync timer exited");
    });
}

fn spawn_listener(
    engine: Weak<EngineInner>,
    mut online: watch::Receiver<bool>,
    mut stop: watch::Receiver<bool>,
) {
    let mut was_online = *online.borrow_and_update();

    tokio::spawn(async move {
        loop {
            if *stop.borrow() {
                break;
            }
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                changed = online.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let is_online = *online.borrow_and_update();
                    if is_online && !was_online {
                        let Some(inner) = engine.upgrade() else {
                            break;
                        };
                        SyncEngine { inner }.run_pass_logged("online").await;
                    }
                    was_online = is_online;
                }
            }
        }
        debug!("Connectivity listener exited");
    });
}
