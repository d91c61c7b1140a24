//! Long-poll synchronization with the config service.

mod engine;
pub mod protocol;

pub use engine::{
    DEFAULT_LONG_POLL_TIMEOUT, DEFAULT_SERVER_REFRESH_INTERVAL, DEFAULT_SYNC_INTERVAL, SyncEngine,
    SyncOptions,
};
pub use protocol::ConfigSnapshot;
