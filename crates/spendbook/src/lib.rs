pub mod error;
pub mod types;

pub mod backup;
pub mod ledger;
pub mod reactive;
pub mod report;
pub mod session;
pub mod storage;
pub mod sync;
pub mod taxonomy;
