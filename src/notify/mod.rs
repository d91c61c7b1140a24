//! Change notification for registered listeners.

mod dispatcher;

pub use dispatcher::{ChangeDispatcher, EventListener, KeyEvent};

/// Run a listener callback without waiting for it.
///
/// Uses the blocking pool of the current tokio runtime when there is one,
/// otherwise a dedicated thread.
pub(crate) fn spawn_listener<F>(callback: F)
where
    F: FnOnce() + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn_blocking(callback);
        }
        Err(_) => {
            std::thread::spawn(callback);
        }
    }
}
