//! One-shot settlement signal
//!
//! A resolve-once cell that any number of waiters can await. Waiters that
//! arrive after resolution get the stored value straight away.

use tokio::sync::watch;

/// Externally resolvable, one-shot signal
#[derive(Debug)]
pub struct SettlementSignal<S> {
    sender: watch::Sender<Option<S>>,
}

impl<S: Clone> SettlementSignal<S> {
    /// Create an unresolved signal
    pub fn new() -> Self {
        let (sender, _) = watch::channel(None);
        Self { sender }
    }

    /// Resolve the signal. Returns false if it was already resolved.
    pub fn resolve(&self, value: S) -> bool {
        self.sender.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(value);
            true
        })
    }

    /// Current value, if resolved
    pub fn peek(&self) -> Option<S> {
        self.sender.borrow().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.sender.borrow().is_some()
    }

    /// Wait for resolution
    pub async fn wait(&self) -> S {
        let mut receiver = self.sender.subscribe();
        // The sender lives in `self`, so `wait_for` cannot observe a closed channel.
        let resolved = match receiver.wait_for(Option::is_some).await {
            Ok(slot) => (*slot).clone(),
            Err(_) => None,
        };
        match resolved {
            Some(value) => value,
            None => std::future::pending().await,
        }
    }
}

impl<S: Clone> Default for SettlementSignal<S> {
    fn default() -> Self {
        Self::new()
    }
}
