//! Idle timeout of a connection.
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::Disconnect;

/// Inactivity timer; expiry pushes [`Disconnect::IdleTimeout`] into the session's signal channel
pub struct IdleTimer {
    reset: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl IdleTimer {
    pub fn spawn(ttl: Duration, disconnect: mpsc::Sender<Disconnect>) -> Self {
        let (reset, mut resets) = mpsc::channel::<()>(1);

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = tokio::time::sleep(ttl) => {
                        let _ = disconnect.try_send(Disconnect::IdleTimeout);
                        return;
                    }
                    reset = resets.recv() => {
                        if reset.is_none() {
                            return;
                        }
                    }
                }
            }
        });

        Self { reset, task }
    }

    /// Restart the countdown; a reset already pending covers this one
    pub fn reset(&self) {
        let _ = self.reset.try_send(());
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        self.task.abort();
    }
}
