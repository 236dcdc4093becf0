//! Cooperative cancellation for workflow threads
//!
//! A [`CancelHandle`] is held by whoever may abort the thread (timeout
//! sweeper, administrative abort); the matching [`CancelToken`] is cloned
//! into every handler invocation. Cancellation is cooperative: handlers
//! check [`CancelToken::is_cancelled`] at provider-call boundaries and
//! return early, and the executor records a `Cancelled` terminal snapshot
//! once outstanding handlers have unwound.

use tokio::sync::watch;

/// Create a connected cancel handle/token pair
pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

/// Sender half: set once to request cancellation
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Subscribe a new token observing this handle
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }
}

/// Receiver half: handlers poll or await this
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        while !*rx.borrow() {
            if rx.changed().await.is_err() {
                // Handle dropped without cancelling: never resolves
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_observed_by_token() {
        let (handle, token) = cancel_pair();
        assert!(!token.is_cancelled());

        handle.cancel();
        assert!(token.is_cancelled());
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let (handle, token) = cancel_pair();

        let waiter = tokio::spawn(async move {
            token.cancelled().await;
        });

        handle.cancel();
        waiter.await.unwrap();
    }

    #[tokio::test]
    async fn test_subscribed_token_sees_prior_cancel() {
        let (handle, _token) = cancel_pair();
        handle.cancel();
        assert!(handle.token().is_cancelled());
    }
}
