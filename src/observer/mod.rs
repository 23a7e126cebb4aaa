use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tracing::error;

use crate::{
    config::{ObserverConfig, ObserverDefinition},
    error::Result,
    placement::{AdEventType, AdPlacementInfo},
};

mod channel;
pub use channel::ChannelObserver;
mod log;
use log::LogObserver;
mod webhook;
use webhook::WebhookObserver;

/// Terminal outcome of one `fire_event` call, fanned out to every
/// registered observer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AdEventOutcome {
    Served(AdPlacementInfo),
    Viewed(AdPlacementInfo),
    Clicked(AdPlacementInfo),
    Failed {
        placement_id: String,
        creative_instance_id: String,
        event_type: AdEventType,
    },
}

impl AdEventOutcome {
    pub fn placement_id(&self) -> &str {
        match self {
            AdEventOutcome::Served(placement)
            | AdEventOutcome::Viewed(placement)
            | AdEventOutcome::Clicked(placement) => &placement.placement_id,
            AdEventOutcome::Failed { placement_id, .. } => placement_id,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, AdEventOutcome::Failed { .. })
    }
}

pub trait AdEventObserver: Send + Sync {
    fn name(&self) -> &str;
    fn notify(&self, outcome: &AdEventOutcome) -> Result<()>;
}

/// Fan-out registry. Observer failures are logged, never propagated: one
/// broken sink must not block delivery to the rest.
#[derive(Clone, Default)]
pub struct ObserverSet {
    observers: Arc<RwLock<Vec<Arc<dyn AdEventObserver>>>>,
}

impl ObserverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(definitions: &[ObserverDefinition]) -> Self {
        let set = Self::new();
        for definition in definitions {
            if !definition.enabled {
                continue;
            }
            set.add_observer(instantiate_observer(definition));
        }
        set
    }

    pub fn add_observer(&self, observer: Arc<dyn AdEventObserver>) {
        self.observers.write().push(observer);
    }

    pub fn remove_observer(&self, name: &str) {
        self.observers
            .write()
            .retain(|observer| observer.name() != name);
    }

    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    pub fn notify(&self, outcome: &AdEventOutcome) {
        let observers = self.observers.read();
        for observer in observers.iter() {
            if let Err(err) = observer.notify(outcome) {
                error!("observer {} failed: {}", observer.name(), err);
            }
        }
    }
}

pub fn instantiate_observer(definition: &ObserverDefinition) -> Arc<dyn AdEventObserver> {
    let name = definition.name.clone();
    match &definition.config {
        ObserverConfig::Log(settings) => Arc::new(LogObserver::new(name, settings.clone())),
        ObserverConfig::Webhook(settings) => Arc::new(WebhookObserver::new(name, settings.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct RecordingObserver {
        outcomes: Arc<Mutex<Vec<AdEventOutcome>>>,
    }

    impl AdEventObserver for RecordingObserver {
        fn name(&self) -> &str {
            "recording"
        }

        fn notify(&self, outcome: &AdEventOutcome) -> Result<()> {
            self.outcomes.lock().push(outcome.clone());
            Ok(())
        }
    }

    #[test]
    fn notify_reaches_every_observer() {
        let set = ObserverSet::new();
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        set.add_observer(Arc::new(RecordingObserver {
            outcomes: Arc::clone(&outcomes),
        }));

        set.notify(&AdEventOutcome::Failed {
            placement_id: "p-1".into(),
            creative_instance_id: "c-1".into(),
            event_type: AdEventType::Viewed,
        });

        let seen = outcomes.lock();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].is_failure());
        assert_eq!(seen[0].placement_id(), "p-1");
    }

    #[test]
    fn removed_observer_is_no_longer_notified() {
        let set = ObserverSet::new();
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        set.add_observer(Arc::new(RecordingObserver {
            outcomes: Arc::clone(&outcomes),
        }));
        set.remove_observer("recording");

        set.notify(&AdEventOutcome::Failed {
            placement_id: "p-1".into(),
            creative_instance_id: "c-1".into(),
            event_type: AdEventType::Served,
        });

        assert!(outcomes.lock().is_empty());
        assert!(set.is_empty());
    }
}
