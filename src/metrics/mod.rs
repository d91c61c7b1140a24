//! Built-in metrics for the sync engine.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Sync cycles and long-poll duration
//! - Failed notification and config requests
//! - Backup fallbacks
//! - Snapshots applied per namespace
//!
//! # Examples
//!
//! ```rust,no_run
//! use apollo_client::prelude::*;
//! use opentelemetry::global;
//!
//! # async fn example() -> Result<()> {
//! let client = ApolloClient::builder(AppConfig::new("svc", "http://config:8080"))
//!     .with_metrics(global::meter("my-app"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod sync_metrics;

pub use sync_metrics::SyncMetrics;
