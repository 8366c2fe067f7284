use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Spawns delayed actions on the current tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct Scheduler;

impl Scheduler {
    pub fn new() -> Self {
        Self
    }

    /// Run `action` once `delay` has elapsed, unless the returned handle is
    /// cancelled first. Must be called from within a tokio runtime.
    pub fn schedule<F>(&self, delay: Duration, action: F) -> ScheduledTask
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let cancel = Arc::new(Notify::new());
        let signal = cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => action.await,
                _ = signal.notified() => {}
            }
        });
        ScheduledTask { cancel, handle }
    }
}

/// Handle to a scheduled action. Dropping it leaves the action scheduled.
#[derive(Debug)]
pub struct ScheduledTask {
    cancel: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Prevent the action from starting. An action that is already running
    /// is left to finish.
    pub fn cancel(self) {
        self.cancel.notify_one();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the action (or its cancellation) to complete.
    pub async fn join(self) {
        let _ = self.handle.await;
    }
}
