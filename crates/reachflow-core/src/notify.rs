//! Change notification for the presentation layer.

use tokio::sync::watch;

/// Revision counter bumped on every externally visible change.
///
/// Observers hold a `watch::Receiver<u64>` and re-read provider state when it
/// changes; the counter value itself carries no meaning beyond "changed".
#[derive(Debug)]
pub struct ChangeNotifier {
    tx: watch::Sender<u64>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    pub fn notify(&self) {
        self.tx.send_modify(|revision| *revision = revision.wrapping_add(1));
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.tx.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.tx.borrow()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notify_without_subscribers() {
        let notifier = ChangeNotifier::new();
        notifier.notify();
        notifier.notify();
        assert_eq!(notifier.revision(), 2);
    }

    #[tokio::test]
    async fn test_subscriber_sees_change() {
        let notifier = ChangeNotifier::new();
        let mut rx = notifier.subscribe();
        notifier.notify();
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), 1);
    }
}
