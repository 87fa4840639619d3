//! Cancellable background work with a result channel.
//!
//! A [`WorkerTask`] runs a future on the Tokio runtime and hands its result
//! back over a one-shot channel. The caller may cancel it, or give up after a
//! timeout. Cancelling drops the future, so any child process it owns should
//! be killed on drop. [`crate::engines::ExternalTool`] does that for the tool
//! and its whole process group.

use std::time::Duration;

use futures::channel::oneshot;

use crate::prelude::*;

/// A handle to a unit of work running in the background.
///
/// Dropping the handle cancels the work.
pub struct WorkerTask<T>
where
    T: Send + 'static,
{
    /// Human-readable name, for error messages.
    name: String,

    /// Where our result arrives.
    result_rx: oneshot::Receiver<Result<T>>,

    /// Sending on (or dropping) this cancels the work.
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl<T> WorkerTask<T>
where
    T: Send + 'static,
{
    /// Start running `future` in the background.
    pub fn spawn<Fut>(name: impl Into<String>, future: Fut) -> Self
    where
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let name = name.into();
        let (result_tx, result_rx) = oneshot::channel();
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        let task_name = name.clone();
        tokio::spawn(async move {
            let result = tokio::select! {
                result = future => result,
                _ = cancel_rx => Err(anyhow!("{} was cancelled", task_name)),
            };
            if result_tx.send(result).is_err() {
                debug!(task = %task_name, "worker result dropped because receiver went away");
            }
        });
        Self {
            name,
            result_rx,
            cancel_tx: Some(cancel_tx),
        }
    }

    /// Ask the work to stop. The result will be a cancellation error unless the
    /// work already finished.
    pub fn cancel(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            // The worker may already be gone, which is fine.
            let _ = cancel_tx.send(());
        }
    }

    /// Wait for the work to finish and return its result, cancelling it if
    /// `timeout` expires first. `None` waits forever.
    pub async fn join_with_timeout(mut self, timeout: Option<Duration>) -> Result<T> {
        let received = match timeout {
            None => (&mut self.result_rx).await,
            Some(timeout) => {
                match tokio::time::timeout(timeout, &mut self.result_rx).await {
                    Ok(received) => received,
                    Err(_elapsed) => {
                        self.cancel();
                        // Wait for the cancelled future to be dropped, so that
                        // any child process is gone before we return.
                        let _ = (&mut self.result_rx).await;
                        return Err(anyhow!(
                            "{} timed out after {:?}",
                            self.name,
                            timeout
                        ));
                    }
                }
            }
        };
        received
            .with_context(|| format!("{} exited without a result", self.name))?
    }
}
