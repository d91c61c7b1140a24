//! HTTP transport to the config-server cluster.

mod auth;
mod balance;
mod request;
mod server_pool;

pub use auth::RequestSigner;
pub use balance::{FirstAvailable, LoadBalance, RandomBalance, RoundRobin};
pub use request::{ConnectConfig, Decoder, Outcome, Transport, TransportBuilder, TransportOptions};
pub use server_pool::{DEFAULT_DOWN_WINDOW, ServerInfo, ServerPool};
