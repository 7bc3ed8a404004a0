//! Remote sync: mirrors the session into one document per user and applies
//! remote changes back.

pub mod debounce;
pub mod engine;
pub mod memory;
pub mod types;

pub use debounce::Debouncer;
pub use engine::SyncEngine;
pub use memory::{MemoryRemoteStore, RecordedWrite};
pub use types::{
    RemoteDocument, RemoteError, RemoteErrorKind, RemoteStore, SyncEngineOptions, SyncOutcome,
    SyncState, SyncStatus, WriteMode,
};
