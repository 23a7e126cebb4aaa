use chrono::{DateTime, Duration, Utc};

use crate::{
    error::{AdEventError, Result},
    placement::AdEventType,
    store::AdEventRecord,
};

/// Boolean predicate over recent event history. Denial carries the reason
/// surfaced in the `NotPermitted` failure.
pub trait PermissionRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(
        &self,
        events: &[AdEventRecord],
        now: DateTime<Utc>,
    ) -> std::result::Result<(), String>;
}

fn served_events_in_window(
    events: &[AdEventRecord],
    now: DateTime<Utc>,
    window: Duration,
) -> usize {
    let cutoff = now - window;
    events
        .iter()
        .filter(|event| event.event_type == AdEventType::Served && event.created_at >= cutoff)
        .count()
}

pub struct AdsPerHourRule {
    cap: u32,
}

impl AdsPerHourRule {
    pub fn new(cap: u32) -> Self {
        Self { cap }
    }
}

impl PermissionRule for AdsPerHourRule {
    fn name(&self) -> &'static str {
        "ads_per_hour"
    }

    fn check(
        &self,
        events: &[AdEventRecord],
        now: DateTime<Utc>,
    ) -> std::result::Result<(), String> {
        let served = served_events_in_window(events, now, Duration::hours(1));
        if served >= self.cap as usize {
            return Err(format!(
                "exceeded {} ads per hour (served {} in the past hour)",
                self.cap, served
            ));
        }
        Ok(())
    }
}

pub struct AdsPerDayRule {
    cap: u32,
}

impl AdsPerDayRule {
    pub fn new(cap: u32) -> Self {
        Self { cap }
    }
}

impl PermissionRule for AdsPerDayRule {
    fn name(&self) -> &'static str {
        "ads_per_day"
    }

    fn check(
        &self,
        events: &[AdEventRecord],
        now: DateTime<Utc>,
    ) -> std::result::Result<(), String> {
        let served = served_events_in_window(events, now, Duration::days(1));
        if served >= self.cap as usize {
            return Err(format!(
                "exceeded {} ads per day (served {} in the past day)",
                self.cap, served
            ));
        }
        Ok(())
    }
}

/// Evaluates every configured rule; the first denial wins.
pub struct PermissionGate {
    rules: Vec<Box<dyn PermissionRule>>,
}

impl PermissionGate {
    pub fn new(rules: Vec<Box<dyn PermissionRule>>) -> Self {
        Self { rules }
    }

    pub fn with_caps(ads_per_hour: u32, ads_per_day: u32) -> Self {
        Self::new(vec![
            Box::new(AdsPerHourRule::new(ads_per_hour)),
            Box::new(AdsPerDayRule::new(ads_per_day)),
        ])
    }

    /// Permissive gate for surfaces that carry no frequency caps.
    pub fn allow_all() -> Self {
        Self::new(Vec::new())
    }

    pub fn evaluate(&self, events: &[AdEventRecord], now: DateTime<Utc>) -> Result<()> {
        for rule in &self.rules {
            if let Err(reason) = rule.check(events, now) {
                return Err(AdEventError::NotPermitted(format!(
                    "{}: {}",
                    rule.name(),
                    reason
                )));
            }
        }
        Ok(())
    }
}
