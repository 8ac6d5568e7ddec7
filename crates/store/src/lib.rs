// Session state hub: durable keyed store, change broadcast, settings

pub mod events;
pub mod kv;
pub mod notice;
pub mod session;
pub mod settings;

pub use kv::{KvStore, StoreError};
pub use session::{SessionState, StoredRecord, STORAGE_KEY};
