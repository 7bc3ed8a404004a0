//! Debouncer — trailing-edge single-slot timer.
//!
//! Each [`schedule`](Debouncer::schedule) replaces the pending timer, so the
//! action fires once, `delay` after the last call. The action must be quick
//! and must not block: long work (a push) is spawned from it as its own task,
//! which keeps rescheduling from ever cancelling work already under way.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

pub type DebounceAction = Arc<dyn Fn() + Send + Sync>;

pub struct Debouncer {
    delay: Duration,
    action: DebounceAction,
    runtime: Handle,
    slot: Arc<Mutex<Slot>>,
}

#[derive(Default)]
struct Slot {
    /// Bumped on every schedule/cancel; a waking timer fires only if the
    /// generation it was armed with is still current.
    generation: u64,
    timer: Option<JoinHandle<()>>,
}

impl Debouncer {
    /// Timers are spawned on `runtime`, so `schedule` may be called from
    /// threads outside it.
    pub fn new(runtime: Handle, delay: Duration, action: DebounceAction) -> Self {
        Self {
            delay,
            action,
            runtime,
            slot: Arc::new(Mutex::new(Slot::default())),
        }
    }

    /// Arm the timer, replacing any pending one.
    pub fn schedule(&self) {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        if let Some(timer) = slot.timer.take() {
            timer.abort();
        }
        let generation = slot.generation;
        let delay = self.delay;
        let action = self.action.clone();
        let shared = self.slot.clone();
        slot.timer = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let current = {
                let mut slot = shared.lock();
                if slot.generation == generation {
                    slot.timer = None;
                    true
                } else {
                    false
                }
            };
            if current {
                action();
            }
        }));
    }

    /// Drop the pending timer. Returns whether one was pending.
    pub fn cancel(&self) -> bool {
        let mut slot = self.slot.lock();
        slot.generation += 1;
        match slot.timer.take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.slot.lock().timer.is_some()
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
