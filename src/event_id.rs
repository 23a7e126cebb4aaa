use std::{
    fmt,
    str::FromStr,
    thread::sleep,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use parking_lot::Mutex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Custom epoch (2024-01-01T00:00:00Z) expressed in milliseconds.
const EPOCH_MILLIS: u64 = 1_704_067_200_000;
const WORKER_ID_BITS: u8 = 10;
const SEQUENCE_BITS: u8 = 12;
const MAX_SEQUENCE: u16 = (1 << SEQUENCE_BITS) - 1;

pub const MAX_WORKER_ID: u16 = (1 << WORKER_ID_BITS) - 1;

/// Time-ordered 64-bit event id: 42 bits of millis since the custom epoch,
/// 10 bits of worker id, 12 bits of per-millisecond sequence.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EventId(u64);

impl EventId {
    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EventId").field(&self.0).finish()
    }
}

impl FromStr for EventId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>().map(EventId)
    }
}

// Serialized as a string so JSON consumers never truncate the high bits.
impl Serialize for EventId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value
            .parse::<EventId>()
            .map_err(|err| serde::de::Error::custom(err.to_string()))
    }
}

#[derive(Debug)]
struct GeneratorState {
    last_timestamp: u64,
    sequence: u16,
}

#[derive(Debug)]
pub struct EventIdGenerator {
    worker_id: u16,
    state: Mutex<GeneratorState>,
}

impl EventIdGenerator {
    pub fn new(worker_id: u16) -> Self {
        Self {
            worker_id: worker_id.min(MAX_WORKER_ID),
            state: Mutex::new(GeneratorState {
                last_timestamp: 0,
                sequence: 0,
            }),
        }
    }

    pub fn next_id(&self) -> EventId {
        let mut state = self.state.lock();
        loop {
            let mut timestamp = current_millis();
            if timestamp < state.last_timestamp {
                // Clock went backwards; wait it out rather than risk a
                // duplicate id.
                let wait = state.last_timestamp - timestamp;
                sleep(Duration::from_millis(wait));
                continue;
            }

            if timestamp == state.last_timestamp {
                state.sequence = (state.sequence + 1) & MAX_SEQUENCE;
                if state.sequence == 0 {
                    timestamp = wait_next_millis(state.last_timestamp);
                }
            } else {
                state.sequence = 0;
            }

            state.last_timestamp = timestamp;
            let elapsed = timestamp - EPOCH_MILLIS;
            let id = (elapsed << (WORKER_ID_BITS + SEQUENCE_BITS))
                | ((self.worker_id as u64) << SEQUENCE_BITS)
                | state.sequence as u64;
            return EventId(id);
        }
    }
}

fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before unix epoch")
        .as_millis() as u64
}

fn wait_next_millis(last_timestamp: u64) -> u64 {
    loop {
        let timestamp = current_millis();
        if timestamp > last_timestamp {
            return timestamp;
        }
        sleep(Duration::from_micros(100));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_strictly_increasing() {
        let generator = EventIdGenerator::new(7);
        let mut previous = generator.next_id();
        for _ in 0..4096 {
            let next = generator.next_id();
            assert!(next > previous);
            previous = next;
        }
    }

    #[test]
    fn id_round_trips_through_string() {
        let generator = EventIdGenerator::new(1);
        let id = generator.next_id();
        assert_eq!(id.to_string().parse::<EventId>().unwrap(), id);
    }
}
