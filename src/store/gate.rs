//! One-shot readiness signal for a namespace.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;

/// A one-shot broadcast released on a namespace's first successful load.
///
/// Any number of threads or tasks can wait on it. Opening it a second time is
/// a no-op, and waiting on an open gate returns immediately.
#[derive(Default)]
pub struct InitGate {
    open: AtomicBool,
    lock: Mutex<()>,
    cond: Condvar,
    notify: Notify,
}

impl InitGate {
    /// Create a closed gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the gate has been opened.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Open the gate and wake every waiter.
    ///
    /// Returns `true` only for the call that actually opened it.
    pub fn open(&self) -> bool {
        if self.open.swap(true, Ordering::AcqRel) {
            return false;
        }
        // Taking the lock orders this wake-up after any waiter's flag check.
        let _guard = self.lock.lock();
        self.cond.notify_all();
        self.notify.notify_waiters();
        true
    }

    /// Block the calling thread until the gate opens.
    ///
    /// Must not be called from inside an async task; use [`wait`](Self::wait).
    pub fn wait_blocking(&self) {
        if self.is_open() {
            return;
        }
        let mut guard = self.lock.lock();
        while !self.is_open() {
            self.cond.wait(&mut guard);
        }
    }

    /// Wait asynchronously until the gate opens.
    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_open() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_open_is_one_shot() {
        let gate = InitGate::new();
        assert!(!gate.is_open());
        assert!(gate.open());
        assert!(!gate.open());
        assert!(gate.is_open());
    }

    #[test]
    fn test_wait_on_open_gate_returns() {
        let gate = InitGate::new();
        gate.open();
        gate.wait_blocking();
    }

    #[test]
    fn test_blocking_waiters_released() {
        let gate = Arc::new(InitGate::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || gate.wait_blocking())
            })
            .collect();

        std::thread::sleep(Duration::from_millis(20));
        gate.open();

        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[tokio::test]
    async fn test_async_waiters_released() {
        let gate = Arc::new(InitGate::new());
        let waiter = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move { gate.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        gate.open();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
