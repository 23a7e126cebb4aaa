use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::user_activity::{
    MISSING_VALUE, UserActivityEvent, UserActivityEventType, number_of_events,
    time_since_last_event,
};

/// Activity window covariate values are computed over.
pub const TRAINING_WINDOW_MINUTES: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CovariateDataType {
    Bool,
    Int,
    Double,
    String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CovariateKind {
    NumberOfEvents(UserActivityEventType),
    TimeSinceLastEvent(UserActivityEventType),
    ImpressionServedAt,
    WasClicked,
}

impl fmt::Display for CovariateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CovariateKind::NumberOfEvents(event_type) => {
                write!(f, "number_of_{}_events", event_type)
            }
            CovariateKind::TimeSinceLastEvent(event_type) => {
                write!(f, "time_since_last_{}_event", event_type)
            }
            CovariateKind::ImpressionServedAt => f.write_str("impression_served_at"),
            CovariateKind::WasClicked => f.write_str("was_clicked"),
        }
    }
}

impl Serialize for CovariateKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// One named feature row handed to downstream training consumers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Covariate {
    pub kind: CovariateKind,
    pub data_type: CovariateDataType,
    pub value: String,
}

pub trait CovariateEntry: Send + Sync {
    fn kind(&self) -> CovariateKind;
    fn data_type(&self) -> CovariateDataType;
    fn value(&self, history: &[UserActivityEvent], now: DateTime<Utc>) -> String;
}

struct EventCountEntry(UserActivityEventType);

impl CovariateEntry for EventCountEntry {
    fn kind(&self) -> CovariateKind {
        CovariateKind::NumberOfEvents(self.0)
    }

    fn data_type(&self) -> CovariateDataType {
        CovariateDataType::Int
    }

    fn value(&self, history: &[UserActivityEvent], _now: DateTime<Utc>) -> String {
        number_of_events(history, self.0).to_string()
    }
}

struct TimeSinceLastEventEntry(UserActivityEventType);

impl CovariateEntry for TimeSinceLastEventEntry {
    fn kind(&self) -> CovariateKind {
        CovariateKind::TimeSinceLastEvent(self.0)
    }

    fn data_type(&self) -> CovariateDataType {
        CovariateDataType::Int
    }

    fn value(&self, history: &[UserActivityEvent], now: DateTime<Utc>) -> String {
        time_since_last_event(history, self.0, now).to_string()
    }
}

struct ImpressionServedAtEntry(DateTime<Utc>);

impl CovariateEntry for ImpressionServedAtEntry {
    fn kind(&self) -> CovariateKind {
        CovariateKind::ImpressionServedAt
    }

    fn data_type(&self) -> CovariateDataType {
        CovariateDataType::Int
    }

    fn value(&self, _history: &[UserActivityEvent], _now: DateTime<Utc>) -> String {
        self.0.timestamp().to_string()
    }
}

struct WasClickedEntry(bool);

impl CovariateEntry for WasClickedEntry {
    fn kind(&self) -> CovariateKind {
        CovariateKind::WasClicked
    }

    fn data_type(&self) -> CovariateDataType {
        CovariateDataType::Bool
    }

    fn value(&self, _history: &[UserActivityEvent], _now: DateTime<Utc>) -> String {
        self.0.to_string()
    }
}

/// Registry of covariate entries, keyed by kind. Registering a kind twice
/// replaces the earlier entry.
pub struct CovariateLog {
    entries: BTreeMap<CovariateKind, Box<dyn CovariateEntry>>,
}

impl CovariateLog {
    pub fn new() -> Self {
        let mut log = Self {
            entries: BTreeMap::new(),
        };
        for event_type in UserActivityEventType::ALL {
            log.set_entry(Box::new(EventCountEntry(event_type)));
            log.set_entry(Box::new(TimeSinceLastEventEntry(event_type)));
        }
        log
    }

    pub fn set_entry(&mut self, entry: Box<dyn CovariateEntry>) {
        self.entries.insert(entry.kind(), entry);
    }

    pub fn set_impression_served_at(&mut self, served_at: DateTime<Utc>) {
        self.set_entry(Box::new(ImpressionServedAtEntry(served_at)));
    }

    pub fn set_was_clicked(&mut self, was_clicked: bool) {
        self.set_entry(Box::new(WasClickedEntry(was_clicked)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot every registered entry over the supplied history.
    pub fn training_covariates(
        &self,
        history: &[UserActivityEvent],
        now: DateTime<Utc>,
    ) -> Vec<Covariate> {
        self.entries
            .values()
            .map(|entry| Covariate {
                kind: entry.kind(),
                data_type: entry.data_type(),
                value: entry.value(history, now),
            })
            .collect()
    }
}

impl Default for CovariateLog {
    fn default() -> Self {
        Self::new()
    }
}

pub fn training_window() -> Duration {
    Duration::minutes(TRAINING_WINDOW_MINUTES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user_activity::UserActivityTracker;

    #[test]
    fn snapshot_without_activity_covers_every_activity_type() {
        let log = CovariateLog::new();
        let covariates = log.training_covariates(&[], Utc::now());

        assert_eq!(covariates.len(), 22);
        assert!(covariates
            .iter()
            .filter(|covariate| matches!(covariate.kind, CovariateKind::NumberOfEvents(_)))
            .all(|covariate| covariate.value == "0"));
        assert!(covariates
            .iter()
            .filter(|covariate| matches!(covariate.kind, CovariateKind::TimeSinceLastEvent(_)))
            .all(|covariate| covariate.value == MISSING_VALUE.to_string()));
    }

    #[test]
    fn snapshot_with_ad_lifecycle_entries() {
        let tracker = UserActivityTracker::new();
        for event_type in UserActivityEventType::ALL {
            tracker.record_event(event_type);
        }

        let mut log = CovariateLog::new();
        log.set_impression_served_at(Utc::now());
        log.set_was_clicked(true);

        let history = tracker.history_for_window(training_window());
        let covariates = log.training_covariates(&history, Utc::now());

        assert_eq!(covariates.len(), 24);
        let clicked = covariates
            .iter()
            .find(|covariate| covariate.kind == CovariateKind::WasClicked)
            .expect("was_clicked entry present");
        assert_eq!(clicked.value, "true");
        assert_eq!(clicked.data_type, CovariateDataType::Bool);
    }

    #[test]
    fn setting_a_kind_twice_replaces_the_entry() {
        let mut log = CovariateLog::new();
        log.set_was_clicked(false);
        log.set_was_clicked(true);

        let covariates = log.training_covariates(&[], Utc::now());
        let clicked: Vec<_> = covariates
            .iter()
            .filter(|covariate| covariate.kind == CovariateKind::WasClicked)
            .collect();
        assert_eq!(clicked.len(), 1);
        assert_eq!(clicked[0].value, "true");
    }

    #[test]
    fn count_entries_reflect_recorded_activity() {
        let tracker = UserActivityTracker::new();
        tracker.record_event(UserActivityEventType::OpenedNewTab);
        tracker.record_event(UserActivityEventType::OpenedNewTab);

        let log = CovariateLog::new();
        let history = tracker.history_for_window(training_window());
        let covariates = log.training_covariates(&history, Utc::now());

        let count = covariates
            .iter()
            .find(|covariate| {
                covariate.kind
                    == CovariateKind::NumberOfEvents(UserActivityEventType::OpenedNewTab)
            })
            .expect("count entry present");
        assert_eq!(count.value, "2");
    }
}
