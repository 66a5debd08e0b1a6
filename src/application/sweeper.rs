//! Periodic background cleanup.
//!
//! A sweeper is a tokio task that runs a cleanup closure on a fixed interval
//! until it is told to stop or the closure reports there is nothing left to
//! clean.

use std::ops::ControlFlow;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Error returned when a sweeper task fails to stop cleanly.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShutdownError {
    /// The sweep task panicked during execution
    #[error("sweeper task panicked during execution")]
    TaskPanicked,
    /// The sweep task was cancelled before it could stop
    #[error("sweeper task was cancelled")]
    TaskCancelled,
}

impl From<tokio::task::JoinError> for ShutdownError {
    fn from(error: tokio::task::JoinError) -> Self {
        if error.is_panic() {
            ShutdownError::TaskPanicked
        } else {
            ShutdownError::TaskCancelled
        }
    }
}

/// Handle for controlling a running sweeper.
///
/// Dropping the handle does NOT stop the task. Call `shutdown()` to stop it
/// and wait for an in-progress sweep to finish.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown_tx: oneshot::Sender<()>,
    join_handle: JoinHandle<()>,
}

impl SweeperHandle {
    /// Signal the sweeper to stop and wait for it.
    ///
    /// # Errors
    /// Returns `ShutdownError` if the task panicked or was aborted.
    pub async fn shutdown(self) -> Result<(), ShutdownError> {
        // The task may already have exited on its own
        let _ = self.shutdown_tx.send(());
        self.join_handle.await?;
        Ok(())
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.join_handle.is_finished()
    }
}

/// Spawn a task that calls `sweep` once per `period`.
///
/// The first sweep runs one full period after spawning. Ticks missed while
/// a sweep was running are not replayed.
pub(crate) fn spawn<F>(period: Duration, mut sweep: F) -> SweeperHandle
where
    F: FnMut() -> ControlFlow<()> + Send + 'static,
{
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

    let join_handle = tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                _ = ticker.tick() => {
                    if sweep().is_break() {
                        break;
                    }
                }
            }
        }
    });

    SweeperHandle {
        shutdown_tx,
        join_handle,
    }
}
