pub mod memory;
pub mod persistence;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod traits;

pub use memory::MemoryStore;
pub use persistence::{LoadedState, Persistence};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStore;
pub use traits::KeyValueStore;
