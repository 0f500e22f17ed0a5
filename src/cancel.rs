//! Cooperative cancellation plumbing.
//!
//! One signal per campaign, observed at every suspension point. Deadlines
//! are handled separately by the individual calls; they never synthesize
//! cancellation.

use std::time::Duration;

use tokio::sync::watch;

use crate::errors::FetchError;

/// Owning side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Cloneable receiver checked at suspension points.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the signal fires. If the handle is dropped without
    /// firing, the future stays pending (an abandoned handle is not a
    /// cancellation).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// A signal that never fires, for callers without an owner.
    pub fn never() -> Self {
        lazy_static::lazy_static! {
            static ref NEVER: (watch::Sender<bool>, watch::Receiver<bool>) = watch::channel(false);
        }
        Self {
            rx: NEVER.1.clone(),
        }
    }
}

pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelSignal { rx })
}

/// Sleep that observes the cancellation signal.
pub async fn sleep_cancellable(duration: Duration, cancel: &CancelSignal) -> Result<(), FetchError> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        _ = cancel.cancelled() => Err(FetchError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_is_interrupted_by_cancel() {
        let (handle, signal) = cancel_pair();
        let sleeper = tokio::spawn(async move {
            sleep_cancellable(Duration::from_secs(3600), &signal).await
        });
        tokio::task::yield_now().await;
        handle.cancel();
        let result = sleeper.await.unwrap();
        assert!(matches!(result, Err(FetchError::Cancelled)));
    }

    #[tokio::test]
    async fn dropped_handle_does_not_cancel() {
        let (handle, signal) = cancel_pair();
        drop(handle);
        assert!(!signal.is_cancelled());
        let quick = sleep_cancellable(Duration::from_millis(5), &signal).await;
        assert!(quick.is_ok());
    }
}
