//! Periodic window reset.
//!
//! Each limiter gets its own recurring task that opens a new accounting window
//! every window length, whether or not anything is being published. The task
//! only holds a weak reference, so it never keeps a limiter alive; it exits on
//! explicit shutdown or at the first tick after the limiter is dropped.

use crate::application::limiter::PublishRateLimiter;
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Error returned when the reset task fails to shut down.
#[derive(Debug, Error)]
pub enum ShutdownError {
    /// The task panicked or was aborted before it could stop cleanly
    #[error("window reset task failed: {0}")]
    Join(#[from] JoinError),
}

/// Drives [`PublishRateLimiter::on_window_reset`] on a fixed period.
#[derive(Debug)]
pub struct WindowResetter {
    limiter: Weak<PublishRateLimiter>,
    topic: String,
    period: Duration,
}

impl WindowResetter {
    /// Create a resetter for `limiter`, ticking once per limiter window.
    pub fn new(limiter: &Arc<PublishRateLimiter>) -> Self {
        Self {
            limiter: Arc::downgrade(limiter),
            topic: limiter.topic().to_string(),
            period: limiter.window(),
        }
    }

    /// Get the reset period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the reset task on the current tokio runtime.
    ///
    /// The first reset fires one period after this call, since a new limiter
    /// already starts with a full window. Ticks missed under load are skipped
    /// rather than replayed.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn start(self) -> ResetHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {
                        match self.limiter.upgrade() {
                            Some(limiter) => limiter.on_window_reset(),
                            None => break,
                        }
                    }
                }
            }

            debug!(topic = %self.topic, "window reset task stopped");
        });

        ResetHandle {
            shutdown_tx: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a running window reset task.
///
/// Call [`shutdown`](Self::shutdown) when the topic is unloaded. Dropping the
/// handle also stops the task, without waiting for it. A task whose limiter
/// has been dropped stops on its own at the next tick.
#[derive(Debug)]
pub struct ResetHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ResetHandle {
    /// Stop the task and wait for it to finish.
    ///
    /// Once this returns, no further reset will run. A reset already in
    /// progress completes first.
    ///
    /// # Errors
    /// Returns `ShutdownError::Join` if the task panicked.
    pub async fn shutdown(mut self) -> Result<(), ShutdownError> {
        if let Some(tx) = self.shutdown_tx.take() {
            // The task may already be gone if its limiter was dropped
            let _ = tx.send(());
        }
        self.task.await?;
        Ok(())
    }

    /// True once the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl PublishRateLimiter {
    /// Spawn the recurring window reset for this limiter.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn start_reset_task(self: &Arc<Self>) -> ResetHandle {
        WindowResetter::new(self).start()
    }
}
