//! Application identity, sync state and the client handle.

mod app_config;
mod builder;
mod client;
mod loader;
mod state;

pub use app_config::{AppConfig, DEFAULT_CLUSTER, DEFAULT_NAMESPACE, split_namespaces};
pub use builder::ApolloClientBuilder;
pub use client::ApolloClient;
pub use loader::{AppConfigLoader, DEFAULT_ENV_PREFIX};
pub use state::{DEFAULT_NOTIFICATION_ID, Notification, NotificationMap, ReleaseKeyMap};
