//! Shared online/offline signal.

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable handle to the process-wide connectivity signal.
///
/// Holds the latest online flag; components that need to react to
/// transitions can await them through [`Connectivity::watch`]. The
/// engine reads the flag synchronously when deciding whether to queue.
#[derive(Debug, Clone)]
pub struct Connectivity {
    sender: Arc<watch::Sender<bool>>,
}

impl Connectivity {
    pub fn new(online: bool) -> Self {
        let (sender, _receiver) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Records a transition. Setting the current value again is a no-op
    /// and wakes no watchers.
    pub fn set_online(&self, online: bool) {
        self.sender.send_if_modified(|current| {
            if *current != online {
                *current = online;
                true
            } else {
                false
            }
        });
    }

    /// Receiver that yields every subsequent online/offline transition.
    pub fn watch(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for Connectivity {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_flag() {
        assert!(Connectivity::new(true).is_online());
        assert!(!Connectivity::new(false).is_online());
    }

    #[test]
    fn test_set_online_visible_to_clones() {
        let connectivity = Connectivity::new(true);
        let clone = connectivity.clone();

        connectivity.set_online(false);
        assert!(!clone.is_online());
    }

    #[tokio::test]
    async fn test_watch_sees_transition() {
        let connectivity = Connectivity::new(true);
        let mut receiver = connectivity.watch();

        connectivity.set_online(false);
        receiver.changed().await.unwrap();
        assert!(!*receiver.borrow());
    }

    #[tokio::test]
    async fn test_noop_transition_wakes_nobody() {
        let connectivity = Connectivity::new(true);
        let mut receiver = connectivity.watch();

        connectivity.set_online(true);
        assert!(!receiver.has_changed().unwrap());
    }
}
