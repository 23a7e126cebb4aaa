use std::{path::PathBuf, time::Instant};

use chrono::{DateTime, Duration, Utc};
use metrics::{counter, histogram};
use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options};
use serde::{Deserialize, Serialize};

use crate::{
    builder::{Conversion, Deposit},
    error::{AdEventError, Result},
    event_id::{EventId, EventIdGenerator},
    placement::{AdEventType, AdPlacementInfo, AdType},
    user_activity::UserActivityEvent,
};

const SEP: u8 = 0x1F;
const PREFIX_EVENT: &str = "evt";
const PREFIX_DEPOSIT: &str = "deposit";
const PREFIX_CONVERSION: &str = "conv";
const PREFIX_ACTIVITY: &str = "act";

/// One immutable row in the append-only ad-event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdEventRecord {
    pub event_id: EventId,
    pub placement_id: String,
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub ad_type: AdType,
    pub event_type: AdEventType,
    pub created_at: DateTime<Utc>,
    pub hash: String,
}

impl AdEventRecord {
    pub fn build(
        event_id: EventId,
        placement: &AdPlacementInfo,
        event_type: AdEventType,
    ) -> Self {
        let created_at = Utc::now();
        let hash = hash_event(placement, event_type, created_at);
        Self {
            event_id,
            placement_id: placement.placement_id.clone(),
            creative_instance_id: placement.creative_instance_id.clone(),
            creative_set_id: placement.creative_set_id.clone(),
            ad_type: placement.ad_type,
            event_type,
            created_at,
            hash,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreCounts {
    pub events: u64,
    pub deposits: u64,
    pub conversions: u64,
    pub activity_events: u64,
}

impl StoreCounts {
    pub fn total_writes(&self) -> u64 {
        self.events + self.deposits + self.conversions + self.activity_events
    }
}

/// Storage seam the orchestrator runs against. The production
/// implementation is [`EventStore`]; tests substitute doubles.
pub trait PlacementStore: Send + Sync {
    /// Put-if-absent keyed by creative instance: the deposit for a
    /// placement is written once and never mutated.
    fn save_deposit(&self, deposit: &Deposit) -> Result<()>;

    /// Put-if-absent keyed by creative set.
    fn save_conversion(&self, conversion: &Conversion) -> Result<()>;

    /// Ordered scan of the append-only log for one ad type.
    fn events_for_type(&self, ad_type: AdType) -> Result<Vec<AdEventRecord>>;

    /// Appends exactly one immutable event record.
    fn append_event(&self, record: &AdEventRecord) -> Result<()>;

    fn counts(&self) -> Result<StoreCounts>;
}

pub struct EventStore {
    db: DBWithThreadMode<MultiThreaded>,
    event_ids: EventIdGenerator,
}

impl EventStore {
    pub fn open(path: PathBuf, worker_id: u16) -> Result<Self> {
        let mut options = Options::default();
        options.create_if_missing(true);
        let db = DBWithThreadMode::<MultiThreaded>::open(&options, path)
            .map_err(|err| AdEventError::Storage(err.to_string()))?;
        Ok(Self {
            db,
            event_ids: EventIdGenerator::new(worker_id),
        })
    }

    pub fn open_read_only(path: PathBuf) -> Result<Self> {
        let options = Options::default();
        let db = DBWithThreadMode::<MultiThreaded>::open_for_read_only(&options, path, false)
            .map_err(|err| AdEventError::Storage(err.to_string()))?;
        Ok(Self {
            db,
            event_ids: EventIdGenerator::new(0),
        })
    }

    pub fn next_event_id(&self) -> EventId {
        self.event_ids.next_id()
    }

    /// All ad events across every ad type, in key order.
    pub fn list_events(&self) -> Result<Vec<AdEventRecord>> {
        self.scan_prefix(&prefix_key(&[PREFIX_EVENT]))
    }

    pub fn record_user_activity(&self, event: &UserActivityEvent) -> Result<()> {
        let key = activity_key(event);
        let value = serde_json::to_vec(event)?;
        self.db
            .put(key, value)
            .map_err(|err| AdEventError::Storage(err.to_string()))?;
        counter!("adpulse_store_activity_recorded_total").increment(1);
        Ok(())
    }

    pub fn user_activity_for_window(&self, window: Duration) -> Result<Vec<UserActivityEvent>> {
        let cutoff = Utc::now() - window;
        let events: Vec<UserActivityEvent> = self.scan_prefix(&prefix_key(&[PREFIX_ACTIVITY]))?;
        Ok(events
            .into_iter()
            .filter(|event| event.created_at >= cutoff)
            .collect())
    }

    fn put_if_absent(&self, key: Vec<u8>, value: Vec<u8>) -> Result<bool> {
        let existing = self
            .db
            .get(&key)
            .map_err(|err| AdEventError::Storage(err.to_string()))?;
        if existing.is_some() {
            return Ok(false);
        }
        self.db
            .put(key, value)
            .map_err(|err| AdEventError::Storage(err.to_string()))?;
        Ok(true)
    }

    fn scan_prefix<T: serde::de::DeserializeOwned>(&self, prefix: &[u8]) -> Result<Vec<T>> {
        let started = Instant::now();
        let mut results = Vec::new();
        let iterator = self.db.iterator(IteratorMode::From(
            prefix,
            Direction::Forward,
        ));
        for entry in iterator {
            let (key, value) = entry.map_err(|err| AdEventError::Storage(err.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push(serde_json::from_slice(&value)?);
        }
        histogram!("adpulse_store_scan_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(results)
    }

    fn count_prefix(&self, prefix: &[u8]) -> Result<u64> {
        let mut count = 0;
        let iterator = self.db.iterator(IteratorMode::From(
            prefix,
            Direction::Forward,
        ));
        for entry in iterator {
            let (key, _) = entry.map_err(|err| AdEventError::Storage(err.to_string()))?;
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
        }
        Ok(count)
    }
}

impl PlacementStore for EventStore {
    fn save_deposit(&self, deposit: &Deposit) -> Result<()> {
        let key = prefix_key(&[PREFIX_DEPOSIT, &deposit.creative_instance_id]);
        let value = serde_json::to_vec(deposit)?;
        if self.put_if_absent(key, value)? {
            counter!("adpulse_store_deposits_saved_total").increment(1);
        }
        Ok(())
    }

    fn save_conversion(&self, conversion: &Conversion) -> Result<()> {
        let key = prefix_key(&[PREFIX_CONVERSION, &conversion.creative_set_id]);
        let value = serde_json::to_vec(conversion)?;
        if self.put_if_absent(key, value)? {
            counter!("adpulse_store_conversions_saved_total").increment(1);
        }
        Ok(())
    }

    fn events_for_type(&self, ad_type: AdType) -> Result<Vec<AdEventRecord>> {
        self.scan_prefix(&prefix_key(&[PREFIX_EVENT, ad_type.as_str()]))
    }

    fn append_event(&self, record: &AdEventRecord) -> Result<()> {
        let key = event_key(record.ad_type, record.event_id);
        let value = serde_json::to_vec(record)?;
        self.db
            .put(key, value)
            .map_err(|err| AdEventError::Storage(err.to_string()))?;
        counter!("adpulse_store_events_appended_total").increment(1);
        Ok(())
    }

    fn counts(&self) -> Result<StoreCounts> {
        Ok(StoreCounts {
            events: self.count_prefix(&prefix_key(&[PREFIX_EVENT]))?,
            deposits: self.count_prefix(&prefix_key(&[PREFIX_DEPOSIT]))?,
            conversions: self.count_prefix(&prefix_key(&[PREFIX_CONVERSION]))?,
            activity_events: self.count_prefix(&prefix_key(&[PREFIX_ACTIVITY]))?,
        })
    }
}

fn prefix_key(segments: &[&str]) -> Vec<u8> {
    let mut key = Vec::new();
    for segment in segments {
        key.extend_from_slice(segment.as_bytes());
        key.push(SEP);
    }
    key
}

// Zero-padded decimal ids keep lexicographic key order equal to numeric
// (and therefore chronological) order.
fn event_key(ad_type: AdType, event_id: EventId) -> Vec<u8> {
    let mut key = prefix_key(&[PREFIX_EVENT, ad_type.as_str()]);
    key.extend_from_slice(format!("{:020}", event_id.as_u64()).as_bytes());
    key
}

fn activity_key(event: &UserActivityEvent) -> Vec<u8> {
    let mut key = prefix_key(&[PREFIX_ACTIVITY]);
    key.extend_from_slice(
        format!("{:020}", event.created_at.timestamp_millis().max(0)).as_bytes(),
    );
    key.push(SEP);
    key.extend_from_slice(event.event_type.as_str().as_bytes());
    key.push(SEP);
    // Disambiguates same-type events landing in the same millisecond.
    key.extend_from_slice(uuid::Uuid::new_v4().simple().to_string().as_bytes());
    key
}

fn hash_event(
    placement: &AdPlacementInfo,
    event_type: AdEventType,
    created_at: DateTime<Utc>,
) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(placement.placement_id.as_bytes());
    hasher.update(placement.creative_instance_id.as_bytes());
    hasher.update(placement.ad_type.as_str().as_bytes());
    hasher.update(event_type.as_str().as_bytes());
    hasher.update(created_at.timestamp_millis().to_be_bytes());

    hex::encode(hasher.finalize())
}

/// True when a record of the given event type has already fired for the
/// placement. "Already viewed" is exactly this check for `Viewed`.
pub fn has_fired_event(
    events: &[AdEventRecord],
    placement_id: &str,
    event_type: AdEventType,
) -> bool {
    events
        .iter()
        .any(|event| event.placement_id == placement_id && event.event_type == event_type)
}
