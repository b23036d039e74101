//! Change notification for the rule mirror.
//!
//! The current snapshot lives in an [`ArcSwap`] so evaluation paths read it
//! without locking. Every publication is also broadcast on a
//! [`tokio::sync::watch`] channel, which keeps only the latest value: a new
//! subscriber sees the current snapshot first, and a slow one skips straight
//! to the newest snapshot instead of queuing stale ones.

use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::ruleset::RuleSet;

/// Stream of rule snapshots, starting with the current one.
pub type RuleSetStream = WatchStream<RuleSet>;

/// Holds the latest [`RuleSet`] and notifies subscribers of changes.
pub struct RulePublisher {
    current: ArcSwap<RuleSet>,
    sender: watch::Sender<RuleSet>,
}

impl RulePublisher {
    pub fn new(initial: RuleSet) -> Self {
        let (sender, _) = watch::channel(initial.clone());
        Self {
            current: ArcSwap::from_pointee(initial),
            sender,
        }
    }

    /// Current snapshot. Lock-free.
    pub fn snapshot(&self) -> RuleSet {
        RuleSet::clone(&self.current.load())
    }

    /// Replace the current snapshot and notify subscribers.
    ///
    /// The snapshot is stored before it is broadcast, so a subscriber woken by
    /// this call always finds it in [`snapshot`](Self::snapshot) too.
    pub fn publish(&self, rules: RuleSet) {
        self.current.store(Arc::new(rules.clone()));
        // send_replace succeeds without receivers; later subscribers still get it
        self.sender.send_replace(rules);
    }

    /// Subscribe to snapshots. The first item is the current snapshot.
    pub fn subscribe(&self) -> RuleSetStream {
        WatchStream::new(self.sender.subscribe())
    }

    /// Raw watch receiver, for callers that prefer `changed()`/`borrow()`.
    pub fn receiver(&self) -> watch::Receiver<RuleSet> {
        self.sender.subscribe()
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for RulePublisher {
    fn default() -> Self {
        Self::new(RuleSet::empty())
    }
}

impl std::fmt::Debug for RulePublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RulePublisher")
            .field("rules", &self.current.load().len())
            .field("subscribers", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rule::{BlockRule, Category};
    use std::time::Duration;
    use tokio_stream::StreamExt;

    fn set_of(ids: &[i64]) -> RuleSet {
        ids.iter()
            .map(|&id| BlockRule::user(id, Category::Blacklist).with_id(id))
            .collect()
    }

    #[test]
    fn test_snapshot_follows_publish() {
        let publisher = RulePublisher::default();
        assert!(publisher.snapshot().is_empty());

        publisher.publish(set_of(&[1, 2]));
        assert_eq!(publisher.snapshot().len(), 2);
    }

    #[test]
    fn test_old_snapshots_are_unaffected() {
        let publisher = RulePublisher::new(set_of(&[1]));
        let old = publisher.snapshot();
        publisher.publish(set_of(&[1, 2, 3]));

        assert_eq!(old.len(), 1);
        assert_eq!(publisher.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn test_late_subscriber_gets_latest() {
        let publisher = RulePublisher::default();
        publisher.publish(set_of(&[7]));

        let mut stream = publisher.subscribe();
        let first = stream.next().await.unwrap();
        assert!(first.get(7).is_some());
    }

    #[tokio::test]
    async fn test_subscriber_sees_changes() {
        let publisher = RulePublisher::default();
        let mut stream = publisher.subscribe();

        assert!(stream.next().await.unwrap().is_empty());

        publisher.publish(set_of(&[1]));
        assert_eq!(stream.next().await.unwrap().len(), 1);

        // Intermediate values may be skipped, the last one is never lost
        publisher.publish(set_of(&[1, 2]));
        publisher.publish(set_of(&[1, 2, 3]));
        assert_eq!(stream.next().await.unwrap().len(), 3);

        let idle = tokio::time::timeout(Duration::from_millis(20), stream.next()).await;
        assert!(idle.is_err());
    }

    #[tokio::test]
    async fn test_receiver() {
        let publisher = RulePublisher::default();
        let mut receiver = publisher.receiver();
        assert_eq!(publisher.subscriber_count(), 1);

        publisher.publish(set_of(&[4]));
        receiver.changed().await.unwrap();
        assert!(receiver.borrow().get(4).is_some());
    }
}
