//! SyncEngine — keeps one user's remote document in step with the session.
//!
//! Outbound, every local change re-arms a trailing-edge debounce; when it
//! fires, the whole snapshot is written with [`WriteMode::Merge`]. Inbound, a
//! listener task applies each remote notification to the session with
//! [`ChangeOrigin::Remote`](crate::reactive::ChangeOrigin::Remote), which the
//! outbound observer ignores. Local changes landing within the settle window
//! after a remote apply are held back and pushed once the window closes.
//!
//! Manual [`push_now`](SyncEngine::push_now) and
//! [`pull_now`](SyncEngine::pull_now) skip the debounce and return errors
//! to the caller. Debounced pushes log and drop their errors.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex as TokioMutex};
use tokio::task::JoinHandle;

use crate::{
    error::SyncError,
    reactive::{ChangeEvent, ListenerId},
    session::Session,
    types::SyncSnapshot,
};

use super::debounce::Debouncer;
use super::types::*;

// ============================================================================
// SyncEngine
// ============================================================================

pub struct SyncEngine {
    inner: Arc<Inner>,
}

struct Inner {
    session: Arc<Session>,
    remote: Arc<dyn RemoteStore>,
    debounce: Duration,
    settle: Duration,
    state: Mutex<EngineState>,
    /// Serializes start/stop.
    lifecycle: TokioMutex<()>,
    /// Serializes every write to the remote document.
    push_lock: TokioMutex<()>,
    applying_remote: AtomicBool,
    /// A local change arrived while `applying_remote` was set.
    deferred: AtomicBool,
    /// A local change has not yet been captured by a push.
    dirty: AtomicBool,
    progress: Mutex<Progress>,
}

struct EngineState {
    phase: SyncState,
    active: Option<Active>,
}

/// Everything that lives only while a user is signed in.
struct Active {
    user: String,
    observer: ListenerId,
    listener: JoinHandle<()>,
    push_timer: Arc<Debouncer>,
    settle_timer: Arc<Debouncer>,
    /// Debounced pushes spawned by the timer and possibly still running.
    pushes: Vec<JoinHandle<()>>,
}

#[derive(Default)]
struct Progress {
    pushing: bool,
    pulling: bool,
    last_push_time: Option<chrono::DateTime<Utc>>,
    last_pull_time: Option<chrono::DateTime<Utc>>,
}

impl SyncEngine {
    pub fn new(session: Arc<Session>, remote: Arc<dyn RemoteStore>, options: SyncEngineOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                session,
                remote,
                debounce: Duration::from_millis(options.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
                settle: Duration::from_millis(options.settle_ms.unwrap_or(DEFAULT_SETTLE_MS)),
                state: Mutex::new(EngineState {
                    phase: SyncState::Idle,
                    active: None,
                }),
                lifecycle: TokioMutex::new(()),
                push_lock: TokioMutex::new(()),
                applying_remote: AtomicBool::new(false),
                deferred: AtomicBool::new(false),
                dirty: AtomicBool::new(false),
                progress: Mutex::new(Progress::default()),
            }),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }

    pub fn status(&self) -> SyncStatus {
        let (state, user) = {
            let state = self.inner.state.lock();
            (state.phase, state.active.as_ref().map(|a| a.user.clone()))
        };
        let progress = self.inner.progress.lock();
        SyncStatus {
            state,
            user,
            pushing: progress.pushing,
            pulling: progress.pulling,
            last_push_time: progress.last_push_time,
            last_pull_time: progress.last_pull_time,
        }
    }

    pub fn is_pushing(&self) -> bool {
        self.inner.progress.lock().pushing
    }

    pub fn is_pulling(&self) -> bool {
        self.inner.progress.lock().pulling
    }

    /// Whether a debounced push is waiting for its quiet period.
    pub fn has_pending_push(&self) -> bool {
        self.inner
            .state
            .lock()
            .active
            .as_ref()
            .is_some_and(|a| a.push_timer.is_pending())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Sign `user` in: subscribe to their document and start mirroring local
    /// changes. A previous user is stopped first. On subscription failure the
    /// engine returns to `Idle`.
    pub async fn start(&self, user: impl Into<String>) -> Result<(), SyncError> {
        let user = user.into();
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.teardown().await;

        self.inner.state.lock().phase = SyncState::LoadingLocal;
        let rx = match self.inner.remote.watch(&user).await {
            Ok(rx) => rx,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "remote subscription failed");
                self.inner.state.lock().phase = SyncState::Idle;
                return Err(e.into());
            }
        };

        let runtime = Handle::current();
        let weak = Arc::downgrade(&self.inner);
        let push_timer = Arc::new(Debouncer::new(runtime.clone(), self.inner.debounce, {
            let weak = weak.clone();
            Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.spawn_push();
                }
            })
        }));
        let settle_timer = Arc::new(Debouncer::new(runtime.clone(), self.inner.settle, {
            let weak = weak.clone();
            Arc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.settled();
                }
            })
        }));
        let observer = self.inner.session.on_change({
            let weak = weak.clone();
            move |event: &ChangeEvent| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_local_change(event);
                }
            }
        });
        let skip_first = self.inner.session.booted_with_data() || !self.inner.session.snapshot().is_empty();

        {
            // The listener is spawned under the state lock so its first
            // notification cannot observe the engine before it is active.
            let mut state = self.inner.state.lock();
            let listener = runtime.spawn(listen(weak, rx, skip_first));
            state.phase = SyncState::Active;
            state.active = Some(Active {
                user: user.clone(),
                observer,
                listener,
                push_timer,
                settle_timer,
                pushes: Vec::new(),
            });
        }
        tracing::info!(user = %user, "sync engine started");
        Ok(())
    }

    /// Sign out: flush a pending push, wait for pushes in flight, then drop
    /// the subscription. Local state is kept.
    pub async fn stop(&self) {
        let _lifecycle = self.inner.lifecycle.lock().await;
        self.inner.teardown().await;
    }

    // -----------------------------------------------------------------------
    // Manual overrides
    // -----------------------------------------------------------------------

    /// Replace the remote document with the local snapshot now.
    pub async fn push_now(&self) -> Result<SyncOutcome, SyncError> {
        let Some(user) = self.inner.active_user() else {
            tracing::debug!("push requested with no signed-in user");
            return Ok(SyncOutcome::Idle);
        };
        self.inner.cancel_pending_push();
        let at = self.inner.push(&user, WriteMode::Replace).await?;
        tracing::info!(user = %user, "manual push completed");
        Ok(SyncOutcome::Synced(at))
    }

    /// Read the remote document once and, if it exists, overwrite the local
    /// fields it carries.
    pub async fn pull_now(&self) -> Result<SyncOutcome, SyncError> {
        let Some(user) = self.inner.active_user() else {
            tracing::debug!("pull requested with no signed-in user");
            return Ok(SyncOutcome::Idle);
        };
        self.inner.progress.lock().pulling = true;
        let result = self.inner.pull(&user).await;
        self.inner.progress.lock().pulling = false;

        let outcome = result?;
        if let SyncOutcome::Synced(at) = outcome {
            self.inner.progress.lock().last_pull_time = Some(at);
            tracing::info!(user = %user, "manual pull completed");
        }
        Ok(outcome)
    }
}

impl Inner {
    fn active_user(&self) -> Option<String> {
        self.state.lock().active.as_ref().map(|a| a.user.clone())
    }

    fn timers(&self) -> Option<(Arc<Debouncer>, Arc<Debouncer>)> {
        self.state
            .lock()
            .active
            .as_ref()
            .map(|a| (a.push_timer.clone(), a.settle_timer.clone()))
    }

    fn cancel_pending_push(&self) {
        self.deferred.store(false, Ordering::SeqCst);
        if let Some((push_timer, _)) = self.timers() {
            if push_timer.cancel() {
                tracing::debug!("pending push superseded");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------------

    fn on_local_change(&self, event: &ChangeEvent) {
        if event.is_remote() {
            return;
        }
        let Some((push_timer, _)) = self.timers() else {
            return;
        };
        self.dirty.store(true, Ordering::SeqCst);
        if self.applying_remote.load(Ordering::SeqCst) {
            tracing::debug!(?event, "local change during remote apply, deferring push");
            self.deferred.store(true, Ordering::SeqCst);
            return;
        }
        tracing::debug!(?event, "push scheduled");
        push_timer.schedule();
    }

    /// Called by the push timer. Spawns the push as its own task so a later
    /// reschedule never cancels a write that has already started.
    fn spawn_push(self: Arc<Self>) {
        let mut state = self.state.lock();
        let Some(active) = state.active.as_mut() else {
            return;
        };
        let user = active.user.clone();
        let inner = self.clone();
        active.pushes.retain(|h| !h.is_finished());
        active.pushes.push(tokio::spawn(async move {
            inner.push_debounced(&user).await;
        }));
    }

    async fn push_debounced(&self, user: &str) {
        if let Err(e) = self.push(user, WriteMode::Merge).await {
            tracing::warn!(user = %user, error = %e, "debounced push failed, dropping");
        }
    }

    async fn push(&self, user: &str, mode: WriteMode) -> Result<chrono::DateTime<Utc>, SyncError> {
        let _guard = self.push_lock.lock().await;
        self.progress.lock().pushing = true;
        let result = self.write_snapshot(user, mode).await;
        let mut progress = self.progress.lock();
        progress.pushing = false;
        let at = result?;
        progress.last_push_time = Some(at);
        Ok(at)
    }

    async fn write_snapshot(&self, user: &str, mode: WriteMode) -> Result<chrono::DateTime<Utc>, SyncError> {
        self.dirty.store(false, Ordering::SeqCst);
        let snapshot = SyncSnapshot::from_snapshot(self.session.snapshot());
        let doc = encode_snapshot(&snapshot)?;
        tracing::debug!(user = %user, ?mode, receipts = snapshot.receipts.len(), "pushing snapshot");
        self.remote.set(user, doc, mode).await?;
        Ok(Utc::now())
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    async fn pull(&self, user: &str) -> Result<SyncOutcome, SyncError> {
        let Some(value) = self.remote.get(user).await? else {
            tracing::debug!(user = %user, "no remote document to pull");
            return Ok(SyncOutcome::NoDocument);
        };
        let doc = RemoteDocument::decode(value)?;
        self.session.apply_remote(doc.receipts, doc.category_data);
        Ok(SyncOutcome::Synced(Utc::now()))
    }

    fn apply_notification(&self, value: Option<Value>) {
        let Some(value) = value else {
            tracing::debug!("remote document does not exist");
            return;
        };
        let doc = match RemoteDocument::decode(value) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(error = %e, "undecodable remote notification, dropping");
                return;
            }
        };
        if doc.is_empty() {
            return;
        }
        let Some((_, settle_timer)) = self.timers() else {
            return;
        };
        self.applying_remote.store(true, Ordering::SeqCst);
        let outcome = self.session.apply_remote(doc.receipts, doc.category_data);
        tracing::debug!(applied = outcome.is_applied(), "remote notification applied");
        settle_timer.schedule();
    }

    /// Called by the settle timer.
    fn settled(&self) {
        self.applying_remote.store(false, Ordering::SeqCst);
        if self.deferred.swap(false, Ordering::SeqCst) {
            if let Some((push_timer, _)) = self.timers() {
                tracing::debug!("releasing push deferred by remote apply");
                push_timer.schedule();
            }
        }
    }

    // -----------------------------------------------------------------------
    // Teardown
    // -----------------------------------------------------------------------

    async fn teardown(&self) {
        let active = {
            let mut state = self.state.lock();
            state.phase = SyncState::Idle;
            state.active.take()
        };
        let Some(mut active) = active else {
            return;
        };
        self.session.off_change(active.observer);
        active.settle_timer.cancel();
        self.applying_remote.store(false, Ordering::SeqCst);

        active.push_timer.cancel();
        self.deferred.store(false, Ordering::SeqCst);
        for push in active.pushes.drain(..) {
            if let Err(e) = push.await {
                tracing::warn!(error = %e, "push task did not complete");
            }
        }
        // Also covers a timer that fired after `active` was taken, whose push
        // was never spawned.
        if self.dirty.load(Ordering::SeqCst) {
            tracing::debug!(user = %active.user, "flushing pending push before sign-out");
            self.push_debounced(&active.user).await;
        }
        active.listener.abort();
        tracing::info!(user = %active.user, "sync engine stopped");
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(active) = self.state.get_mut().active.take() {
            self.session.off_change(active.observer);
            active.listener.abort();
        }
    }
}

async fn listen(inner: Weak<Inner>, mut rx: mpsc::UnboundedReceiver<Option<Value>>, skip_first: bool) {
    let mut first = true;
    while let Some(value) = rx.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        if std::mem::take(&mut first) && skip_first {
            tracing::debug!("discarding initial remote snapshot, local state is not empty");
            continue;
        }
        inner.apply_notification(value);
    }
}
