//! # apollo-client
//!
//! Client runtime for an Apollo-style configuration center.
//!
//! ## Overview
//!
//! `apollo-client` keeps a local, always-readable copy of an application's
//! configuration namespaces and keeps it current:
//! - Per-namespace caches with lock-free reads using `arc-swap`
//! - A long-poll sync loop that fetches only changed namespaces
//! - Key-level change events routed to listeners by regex pattern
//! - Retries, down-node tracking and failover across config servers
//! - Local backup files used when the config service is unreachable
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use apollo_client::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<()> {
//! // APOLLO_APP_ID=order-service APOLLO_IP=http://config:8080
//! let app = AppConfigLoader::new()
//!     .with_env_overrides("APOLLO", "__")
//!     .load()?;
//!
//! let client = ApolloClient::builder(app).build()?;
//! client.start().await?;
//!
//! // Reads never block and never touch the network
//! let timeout = client.get_int("http.timeout", 30);
//!
//! // Blocking reads wait until the namespace has been loaded once
//! if let Some(db) = client.namespace("db.yaml") {
//!     let host = db.get_ready("db.host").await;
//! }
//!
//! client.add_listener(
//!     Arc::new(|event: &KeyEvent| println!("{} changed: {:?}", event.key, event.kind)),
//!     &[r"^db\."],
//! )?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `metrics`: OpenTelemetry counters and histograms for the sync loop
//!
//! ```toml
//! [dependencies]
//! apollo-client = { version = "0.1", features = ["metrics"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod error;
pub mod notify;
pub mod sources;
pub mod store;
pub mod sync;
pub mod transport;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{ApolloClient, ApolloClientBuilder, AppConfig, AppConfigLoader};
    pub use crate::error::{ConfigError, Result};
    pub use crate::notify::{ChangeDispatcher, EventListener, KeyEvent};
    pub use crate::store::{
        ChangeEvent, ChangeKind, ChangeListener, ConfigChange, FullChangeEvent, NamespaceConfig,
        ReadMode,
    };
    pub use crate::transport::{
        FirstAvailable, LoadBalance, RandomBalance, RequestSigner, RoundRobin,
    };
}
