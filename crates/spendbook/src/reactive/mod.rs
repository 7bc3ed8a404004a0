//! Change notification for the session.
//!
//! [`Session`](crate::session::Session) emits a [`ChangeEvent`] after every
//! committed mutation, once the new state is durable. The sync engine is the
//! main listener; UI collaborators may register their own.

pub mod event;
pub mod event_emitter;

pub use event::{ChangeEvent, ChangeOrigin};
pub use event_emitter::{EventEmitter, ListenerId};
