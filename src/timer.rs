use std::{future::Future, sync::Mutex, time::Duration};
use tokio::task::JoinHandle;

/// A delayed action owned by some piece of UI state.
///
/// At most one action is pending at a time: arming again aborts the previous
/// one. Dropping the owner aborts whatever is still pending, so an action can
/// never fire against state that has been torn down.
#[derive(Debug, Default)]
pub struct DelayedReset {
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl DelayedReset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` after `delay`, replacing any action still waiting.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(&self, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
        });
        if let Some(previous) = self.slot().replace(handle) {
            previous.abort();
        }
    }

    /// Abort the pending action, if any.
    pub fn cancel(&self) {
        if let Some(previous) = self.slot().take() {
            previous.abort();
        }
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.slot().as_ref().is_some_and(|h| !h.is_finished())
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        // A poisoned slot still holds a valid handle.
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for DelayedReset {
    fn drop(&mut self) {
        self.cancel();
    }
}
