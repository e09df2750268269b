//! Debounced, single-flight write-back of the computed progress.
//!
//! The detail view recomputes progress on every input change and hands the
//! value to [`ProgressSync`]. A write is scheduled only when the value differs
//! from the last one known to be stored; further changes inside the quiet
//! window replace the pending write. When the window elapses while a previous
//! write is still in flight, the new write is dropped for that cycle. A failed
//! write leaves the cached value alone, so the next recompute schedules again.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use gradtrack_core::model::{ApplicationId, ApplicationPatch, Progress};
use storage::repository::{ApplicationRepository, StorageError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::notify::Notifier;

pub const DEFAULT_QUIET_WINDOW: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub quiet_window: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            quiet_window: DEFAULT_QUIET_WINDOW,
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn with_quiet_window(quiet_window: Duration) -> Self {
        Self { quiet_window }
    }
}

/// Where progress values are written.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    async fn write_progress(
        &self,
        application_id: ApplicationId,
        progress: Progress,
    ) -> Result<(), StorageError>;
}

/// Writes progress through the application repository.
#[derive(Clone)]
pub struct RepositoryProgressStore {
    applications: Arc<dyn ApplicationRepository>,
}

impl RepositoryProgressStore {
    #[must_use]
    pub fn new(applications: Arc<dyn ApplicationRepository>) -> Self {
        Self { applications }
    }
}

#[async_trait]
impl ProgressStore for RepositoryProgressStore {
    async fn write_progress(
        &self,
        application_id: ApplicationId,
        progress: Progress,
    ) -> Result<(), StorageError> {
        self.applications
            .update_application(application_id, &ApplicationPatch::progress(progress))
            .await
    }
}

/// A cancellable fire-once timer.
///
/// Scheduling replaces (and aborts) any earlier pending timer. The callback
/// runs synchronously when the delay elapses, so cancelling can only ever
/// prevent it from starting, never interrupt it.
#[derive(Default)]
pub struct DelayedTask {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DelayedTask {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule<F>(&self, delay: Duration, on_fire: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire();
        });
        let previous = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Returns `true` if a timer was still pending.
    pub fn cancel(&self) -> bool {
        let pending = self
            .handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match pending {
            Some(task) if !task.is_finished() => {
                task.abort();
                true
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }
}

impl Drop for DelayedTask {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Single-slot "write in flight" marker.
#[derive(Debug, Default)]
pub struct InFlightSlot {
    busy: AtomicBool,
}

impl InFlightSlot {
    /// Claim the slot; `None` if it is already taken.
    #[must_use]
    pub fn try_acquire(self: &Arc<Self>) -> Option<InFlightGuard> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                slot: Arc::clone(self),
            })
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Releases the slot when dropped, whatever way the write ends.
#[derive(Debug)]
pub struct InFlightGuard {
    slot: Arc<InFlightSlot>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.slot.busy.store(false, Ordering::Release);
    }
}

/// What `ProgressSync::on_inputs_changed` did with a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncDecision {
    /// Matches the last stored value; any pending write was cancelled.
    InSync,
    /// A write of this value is pending.
    Scheduled,
}

/// Keeps the stored progress of one application in step with the computed one.
pub struct ProgressSync {
    application_id: ApplicationId,
    store: Arc<dyn ProgressStore>,
    notifier: Notifier,
    config: SyncConfig,
    last_persisted: Arc<AtomicU8>,
    in_flight: Arc<InFlightSlot>,
    timer: DelayedTask,
}

impl ProgressSync {
    #[must_use]
    pub fn new(
        application_id: ApplicationId,
        stored: Progress,
        store: Arc<dyn ProgressStore>,
        notifier: Notifier,
        config: SyncConfig,
    ) -> Self {
        Self {
            application_id,
            store,
            notifier,
            config,
            last_persisted: Arc::new(AtomicU8::new(stored.value())),
            in_flight: Arc::new(InFlightSlot::default()),
            timer: DelayedTask::new(),
        }
    }

    /// Last value known to be stored.
    #[must_use]
    pub fn last_persisted(&self) -> Progress {
        Progress::saturating(u64::from(self.last_persisted.load(Ordering::Acquire)))
    }

    #[must_use]
    pub fn is_write_pending(&self) -> bool {
        self.timer.is_pending()
    }

    #[must_use]
    pub fn is_write_in_flight(&self) -> bool {
        self.in_flight.is_busy()
    }

    /// Feed a freshly computed value. Must be called from a Tokio runtime.
    pub fn on_inputs_changed(&self, computed: Progress) -> SyncDecision {
        self.timer.cancel();
        if computed == self.last_persisted() {
            return SyncDecision::InSync;
        }

        let application_id = self.application_id;
        let store = Arc::clone(&self.store);
        let notifier = self.notifier.clone();
        let last_persisted = Arc::clone(&self.last_persisted);
        let in_flight = Arc::clone(&self.in_flight);

        debug!(%application_id, %computed, "progress write scheduled");
        self.timer.schedule(self.config.quiet_window, move || {
            let Some(guard) = in_flight.try_acquire() else {
                debug!(%application_id, %computed, "progress write in flight; dropping this cycle");
                return;
            };
            tokio::spawn(async move {
                let _guard = guard;
                match store.write_progress(application_id, computed).await {
                    Ok(()) => {
                        last_persisted.store(computed.value(), Ordering::Release);
                        info!(%application_id, %computed, "progress saved");
                    }
                    Err(err) => {
                        warn!(%application_id, %computed, error = %err, "progress write failed");
                        notifier.error(format!("Could not save progress: {err}"));
                    }
                }
            });
        });
        SyncDecision::Scheduled
    }

    /// Drop any pending write. A write already in flight runs to completion.
    pub fn cancel(&self) {
        if self.timer.cancel() {
            debug!(application_id = %self.application_id, "pending progress write cancelled");
        }
    }
}

impl Drop for ProgressSync {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::notify::NotificationLevel;

    /// Records writes; optionally fails or takes time.
    #[derive(Default)]
    struct RecordingStore {
        writes: Mutex<Vec<Progress>>,
        fail: AtomicBool,
        latency: Mutex<Duration>,
    }

    impl RecordingStore {
        fn writes(&self) -> Vec<Progress> {
            self.writes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProgressStore for RecordingStore {
        async fn write_progress(
            &self,
            _application_id: ApplicationId,
            progress: Progress,
        ) -> Result<(), StorageError> {
            let latency = *self.latency.lock().unwrap();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            self.writes.lock().unwrap().push(progress);
            if self.fail.load(Ordering::SeqCst) {
                return Err(StorageError::Connection("offline".into()));
            }
            Ok(())
        }
    }

    fn p(v: i64) -> Progress {
        Progress::new(v).unwrap()
    }

    fn sync_with(store: &Arc<RecordingStore>, notifier: Notifier) -> ProgressSync {
        let store: Arc<dyn ProgressStore> = store.clone();
        ProgressSync::new(
            ApplicationId::new(1),
            Progress::ZERO,
            store,
            notifier,
            SyncConfig::default(),
        )
    }

    async fn wait(ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn rapid_changes_coalesce_into_one_write() {
        let store = Arc::new(RecordingStore::default());
        let sync = sync_with(&store, Notifier::default());

        assert_eq!(sync.on_inputs_changed(p(10)), SyncDecision::Scheduled);
        wait(100).await;
        sync.on_inputs_changed(p(20));
        wait(100).await;
        sync.on_inputs_changed(p(30));
        wait(300).await;

        assert_eq!(store.writes(), vec![p(30)]);
        assert_eq!(sync.last_persisted(), p(30));
        assert!(!sync.is_write_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn value_matching_stored_cancels_pending_write() {
        let store = Arc::new(RecordingStore::default());
        let sync = sync_with(&store, Notifier::default());

        sync.on_inputs_changed(p(40));
        wait(100).await;
        assert_eq!(sync.on_inputs_changed(Progress::ZERO), SyncDecision::InSync);
        wait(500).await;

        assert!(store.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_keeps_cache_and_same_value_reschedules() {
        let store = Arc::new(RecordingStore::default());
        store.fail.store(true, Ordering::SeqCst);
        let notifier = Notifier::default();
        let mut rx = notifier.subscribe();
        let sync = sync_with(&store, notifier);

        sync.on_inputs_changed(p(63));
        wait(300).await;
        assert_eq!(sync.last_persisted(), Progress::ZERO);
        let note = rx.recv().await.unwrap();
        assert_eq!(note.level, NotificationLevel::Error);
        assert!(note.message.contains("offline"));

        store.fail.store(false, Ordering::SeqCst);
        assert_eq!(sync.on_inputs_changed(p(63)), SyncDecision::Scheduled);
        wait(300).await;
        assert_eq!(store.writes(), vec![p(63), p(63)]);
        assert_eq!(sync.last_persisted(), p(63));
    }

    #[tokio::test(start_paused = true)]
    async fn write_is_dropped_while_another_is_in_flight() {
        let store = Arc::new(RecordingStore::default());
        *store.latency.lock().unwrap() = Duration::from_secs(1);
        let sync = sync_with(&store, Notifier::default());

        sync.on_inputs_changed(p(25));
        wait(300).await;
        assert!(sync.is_write_in_flight());

        // Fires at ~550ms while the first write still runs until ~1250ms.
        sync.on_inputs_changed(p(50));
        wait(2000).await;

        assert_eq!(store.writes(), vec![p(25)]);
        assert_eq!(sync.last_persisted(), p(25));
        assert!(!sync.is_write_in_flight());

        // Divergence persists, so the next change goes through.
        sync.on_inputs_changed(p(50));
        wait(1500).await;
        assert_eq!(store.writes(), vec![p(25), p(50)]);
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_cancels_pending_but_not_in_flight() {
        let store = Arc::new(RecordingStore::default());
        let sync = sync_with(&store, Notifier::default());
        sync.on_inputs_changed(p(80));
        wait(100).await;
        drop(sync);
        wait(500).await;
        assert!(store.writes().is_empty());

        *store.latency.lock().unwrap() = Duration::from_millis(500);
        let sync = sync_with(&store, Notifier::default());
        sync.on_inputs_changed(p(90));
        wait(300).await;
        assert!(sync.is_write_in_flight());
        sync.cancel();
        drop(sync);
        wait(1000).await;
        assert_eq!(store.writes(), vec![p(90)]);
    }

    #[tokio::test]
    async fn guard_releases_slot() {
        let slot = Arc::new(InFlightSlot::default());
        let guard = slot.try_acquire().unwrap();
        assert!(slot.try_acquire().is_none());
        drop(guard);
        assert!(slot.try_acquire().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_task_fires_once_unless_cancelled() {
        let fired = Arc::new(AtomicU8::new(0));
        let task = DelayedTask::new();

        let counter = Arc::clone(&fired);
        task.schedule(Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(task.is_pending());
        wait(100).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!task.cancel());

        let counter = Arc::clone(&fired);
        task.schedule(Duration::from_millis(50), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(task.cancel());
        wait(100).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
