//! MemoryRemoteStore — in-process [`RemoteStore`].
//!
//! Holds one document per user, broadcasts every write to that user's
//! watchers, and records each `set` call. [`inject`](MemoryRemoteStore::inject)
//! stands in for a write made by another device.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;

use super::types::{RemoteError, RemoteStore, WriteMode};

/// One `set` call as the store received it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedWrite {
    pub user: String,
    pub doc: Value,
    pub mode: WriteMode,
}

#[derive(Default)]
pub struct MemoryRemoteStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<String, Value>,
    watchers: HashMap<String, Vec<mpsc::UnboundedSender<Option<Value>>>>,
    writes: Vec<RecordedWrite>,
    failure: Option<RemoteError>,
}

impl MemoryRemoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `error`, or succeed again with
    /// `None`.
    pub fn set_failure(&self, error: Option<RemoteError>) {
        self.inner.lock().failure = error;
    }

    pub fn document(&self, user: &str) -> Option<Value> {
        self.inner.lock().docs.get(user).cloned()
    }

    pub fn writes(&self) -> Vec<RecordedWrite> {
        self.inner.lock().writes.clone()
    }

    pub fn write_count(&self) -> usize {
        self.inner.lock().writes.len()
    }

    pub fn watcher_count(&self, user: &str) -> usize {
        let mut inner = self.inner.lock();
        match inner.watchers.get_mut(user) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.len()
            }
            None => 0,
        }
    }

    /// Replace the user's document as if another device wrote it, notifying
    /// watchers. Not recorded in [`writes`](Self::writes).
    pub fn inject(&self, user: &str, doc: Value) {
        let mut inner = self.inner.lock();
        inner.docs.insert(user.to_string(), doc);
        inner.broadcast(user);
    }

    /// Delete the user's document, notifying watchers with `None`.
    pub fn remove(&self, user: &str) {
        let mut inner = self.inner.lock();
        inner.docs.remove(user);
        inner.broadcast(user);
    }

    fn check_failure(&self) -> Result<(), RemoteError> {
        match &self.inner.lock().failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl Inner {
    fn broadcast(&mut self, user: &str) {
        let doc = self.docs.get(user).cloned();
        if let Some(senders) = self.watchers.get_mut(user) {
            senders.retain(|tx| tx.send(doc.clone()).is_ok());
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn get(&self, user: &str) -> Result<Option<Value>, RemoteError> {
        self.check_failure()?;
        Ok(self.document(user))
    }

    async fn set(&self, user: &str, doc: Value, mode: WriteMode) -> Result<(), RemoteError> {
        self.check_failure()?;
        let mut inner = self.inner.lock();
        inner.writes.push(RecordedWrite {
            user: user.to_string(),
            doc: doc.clone(),
            mode,
        });
        let merged = match (mode, inner.docs.remove(user)) {
            (WriteMode::Merge, Some(Value::Object(mut existing))) => match doc {
                Value::Object(fields) => {
                    existing.extend(fields);
                    Value::Object(existing)
                }
                other => other,
            },
            _ => doc,
        };
        inner.docs.insert(user.to_string(), merged);
        inner.broadcast(user);
        Ok(())
    }

    async fn watch(&self, user: &str) -> Result<mpsc::UnboundedReceiver<Option<Value>>, RemoteError> {
        self.check_failure()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock();
        // The receiver is alive, so the initial send cannot fail.
        let _ = tx.send(inner.docs.get(user).cloned());
        inner.watchers.entry(user.to_string()).or_default().push(tx);
        Ok(rx)
    }
}
