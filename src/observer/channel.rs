use tokio::sync::broadcast;

use crate::error::Result;

use super::{AdEventObserver, AdEventOutcome};

/// Publishes outcomes on a broadcast channel for in-process consumers.
/// Lagging or absent receivers never fail delivery.
pub struct ChannelObserver {
    name: String,
    sender: broadcast::Sender<AdEventOutcome>,
}

impl ChannelObserver {
    pub fn new(capacity: usize) -> (Self, broadcast::Receiver<AdEventOutcome>) {
        let (sender, receiver) = broadcast::channel(capacity);
        (
            Self {
                name: "channel".to_string(),
                sender,
            },
            receiver,
        )
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AdEventOutcome> {
        self.sender.subscribe()
    }
}

impl AdEventObserver for ChannelObserver {
    fn name(&self) -> &str {
        &self.name
    }

    fn notify(&self, outcome: &AdEventOutcome) -> Result<()> {
        // A send error only means there are currently no receivers.
        let _ = self.sender.send(outcome.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::AdEventType;

    #[test]
    fn subscribers_receive_published_outcomes() {
        let (observer, mut receiver) = ChannelObserver::new(8);
        observer
            .notify(&AdEventOutcome::Failed {
                placement_id: "p-1".into(),
                creative_instance_id: "c-1".into(),
                event_type: AdEventType::Clicked,
            })
            .unwrap();

        let outcome = receiver.try_recv().unwrap();
        assert_eq!(outcome.placement_id(), "p-1");
    }

    #[test]
    fn notify_without_receivers_is_not_an_error() {
        let (observer, receiver) = ChannelObserver::new(8);
        drop(receiver);
        observer
            .notify(&AdEventOutcome::Failed {
                placement_id: "p-1".into(),
                creative_instance_id: "c-1".into(),
                event_type: AdEventType::Served,
            })
            .unwrap();
    }
}
