//! Policies for picking an alternate config server.

use super::server_pool::ServerInfo;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Chooses one available server from a pool snapshot.
pub trait LoadBalance: Send + Sync {
    /// Return a server whose `is_down` is false, or `None` if there is none.
    fn select(&self, servers: &[ServerInfo]) -> Option<ServerInfo>;
}

/// Always picks the first server that is not down. This is the default.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAvailable;

impl LoadBalance for FirstAvailable {
    fn select(&self, servers: &[ServerInfo]) -> Option<ServerInfo> {
        servers.iter().find(|server| !server.is_down).cloned()
    }
}

/// Rotates through the available servers.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: AtomicUsize,
}

impl RoundRobin {
    /// Create a policy starting at the first server.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalance for RoundRobin {
    fn select(&self, servers: &[ServerInfo]) -> Option<ServerInfo> {
        let available: Vec<&ServerInfo> = servers.iter().filter(|s| !s.is_down).collect();
        if available.is_empty() {
            return None;
        }
        let index = self.next.fetch_add(1, Ordering::Relaxed) % available.len();
        Some(available[index].clone())
    }
}

/// Picks a random available server.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomBalance;

impl LoadBalance for RandomBalance {
    fn select(&self, servers: &[ServerInfo]) -> Option<ServerInfo> {
        let available: Vec<&ServerInfo> = servers.iter().filter(|s| !s.is_down).collect();
        if available.is_empty() {
            return None;
        }
        Some(available[fastrand::usize(..available.len())].clone())
    }
}
