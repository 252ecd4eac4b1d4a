//! External Cancellation
//!
//! A cloneable signal that carries the reason it fired. The recognition loop
//! races it against inbound data and errors; the first reason sticks.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation signal with a reason
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<Option<String>>>,
}

impl Default for CancelSignal {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }
}

impl CancelSignal {
    /// Create a signal that has not fired
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire the signal
    ///
    /// Returns `false` if it had already fired; the earlier reason is kept.
    pub fn cancel(&self, reason: impl Into<String>) -> bool {
        let reason = reason.into();
        let fired = self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if fired {
            tracing::debug!("Cancellation requested");
        }
        fired
    }

    /// Check whether the signal has fired
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Reason the signal fired with, if it has
    #[must_use]
    pub fn reason(&self) -> Option<String> {
        self.tx.borrow().clone()
    }

    /// Wait until the signal fires and return its reason
    pub async fn cancelled(&self) -> String {
        let mut rx = self.tx.subscribe();
        let reason = rx
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|current| current.clone());
        match reason {
            Some(reason) => reason,
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_first_reason_wins() {
        let signal = CancelSignal::new();
        assert!(!signal.is_cancelled());

        assert!(signal.cancel("interrupted"));
        assert!(!signal.cancel("timeout"));
        assert_eq!(signal.reason().as_deref(), Some("interrupted"));
    }

    #[tokio::test]
    async fn test_cancelled_resolves_for_clones() {
        let signal = CancelSignal::new();
        let waiter = signal.clone();

        let handle = tokio::spawn(async move { waiter.cancelled().await });
        tokio::task::yield_now().await;
        signal.cancel("shutdown");

        assert_eq!(handle.await.unwrap(), "shutdown");
    }

    #[tokio::test]
    async fn test_cancelled_after_fire_returns_immediately() {
        let signal = CancelSignal::new();
        signal.cancel("early");
        let reason = tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .unwrap();
        assert_eq!(reason, "early");
    }
}
