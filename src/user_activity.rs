use std::{collections::VecDeque, fmt, str::FromStr};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Sentinel for "no such event in the window".
pub const MISSING_VALUE: i64 = -1;

/// How long recorded activity is kept before pruning.
fn retention() -> Duration {
    Duration::hours(24)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserActivityEventType {
    BrowserDidBecomeActive,
    BrowserWindowIsInactive,
    OpenedNewTab,
    ClosedTab,
    FocusedOnExistingTab,
    ClickedBackOrForwardNavigationButtons,
    ClickedReloadButton,
    ClickedLink,
    TypedUrl,
    SubmittedForm,
    PlayedMedia,
}

impl UserActivityEventType {
    pub const ALL: [UserActivityEventType; 11] = [
        UserActivityEventType::BrowserDidBecomeActive,
        UserActivityEventType::BrowserWindowIsInactive,
        UserActivityEventType::OpenedNewTab,
        UserActivityEventType::ClosedTab,
        UserActivityEventType::FocusedOnExistingTab,
        UserActivityEventType::ClickedBackOrForwardNavigationButtons,
        UserActivityEventType::ClickedReloadButton,
        UserActivityEventType::ClickedLink,
        UserActivityEventType::TypedUrl,
        UserActivityEventType::SubmittedForm,
        UserActivityEventType::PlayedMedia,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UserActivityEventType::BrowserDidBecomeActive => "browser_did_become_active",
            UserActivityEventType::BrowserWindowIsInactive => "browser_window_is_inactive",
            UserActivityEventType::OpenedNewTab => "opened_new_tab",
            UserActivityEventType::ClosedTab => "closed_tab",
            UserActivityEventType::FocusedOnExistingTab => "focused_on_existing_tab",
            UserActivityEventType::ClickedBackOrForwardNavigationButtons => {
                "clicked_back_or_forward_navigation_buttons"
            }
            UserActivityEventType::ClickedReloadButton => "clicked_reload_button",
            UserActivityEventType::ClickedLink => "clicked_link",
            UserActivityEventType::TypedUrl => "typed_url",
            UserActivityEventType::SubmittedForm => "submitted_form",
            UserActivityEventType::PlayedMedia => "played_media",
        }
    }
}

impl fmt::Display for UserActivityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserActivityEventType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        UserActivityEventType::ALL
            .iter()
            .copied()
            .find(|event_type| event_type.as_str() == normalized)
            .ok_or_else(|| format!("unknown user activity event type '{value}'"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivityEvent {
    pub event_type: UserActivityEventType,
    pub created_at: DateTime<Utc>,
}

/// In-process recorder of timestamped activity events. History older than
/// the retention window is pruned on every write.
#[derive(Debug, Default)]
pub struct UserActivityTracker {
    events: Mutex<VecDeque<UserActivityEvent>>,
}

impl UserActivityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self, event_type: UserActivityEventType) {
        self.record_event_at(event_type, Utc::now());
    }

    pub fn record_event_at(&self, event_type: UserActivityEventType, created_at: DateTime<Utc>) {
        let mut events = self.events.lock();
        events.push_back(UserActivityEvent {
            event_type,
            created_at,
        });
        let cutoff = Utc::now() - retention();
        while events
            .front()
            .map(|event| event.created_at < cutoff)
            .unwrap_or(false)
        {
            events.pop_front();
        }
    }

    pub fn history_for_window(&self, window: Duration) -> Vec<UserActivityEvent> {
        let cutoff = Utc::now() - window;
        self.events
            .lock()
            .iter()
            .filter(|event| event.created_at >= cutoff)
            .copied()
            .collect()
    }
}

pub fn number_of_events(events: &[UserActivityEvent], event_type: UserActivityEventType) -> i64 {
    events
        .iter()
        .filter(|event| event.event_type == event_type)
        .count() as i64
}

/// Seconds since the most recent event of the given type, or
/// [`MISSING_VALUE`] when none is present.
pub fn time_since_last_event(
    events: &[UserActivityEvent],
    event_type: UserActivityEventType,
    now: DateTime<Utc>,
) -> i64 {
    events
        .iter()
        .rev()
        .find(|event| event.event_type == event_type)
        .map(|event| (now - event.created_at).num_seconds())
        .unwrap_or(MISSING_VALUE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_events_of_one_type() {
        let tracker = UserActivityTracker::new();
        tracker.record_event(UserActivityEventType::OpenedNewTab);
        tracker.record_event(UserActivityEventType::OpenedNewTab);
        tracker.record_event(UserActivityEventType::ClosedTab);

        let history = tracker.history_for_window(Duration::minutes(30));
        assert_eq!(number_of_events(&history, UserActivityEventType::OpenedNewTab), 2);
        assert_eq!(number_of_events(&history, UserActivityEventType::ClosedTab), 1);
        assert_eq!(number_of_events(&history, UserActivityEventType::TypedUrl), 0);
    }

    #[test]
    fn time_since_last_event_uses_most_recent() {
        let tracker = UserActivityTracker::new();
        let now = Utc::now();
        tracker.record_event_at(UserActivityEventType::ClickedLink, now - Duration::seconds(90));
        tracker.record_event_at(UserActivityEventType::ClickedLink, now - Duration::seconds(10));

        let history = tracker.history_for_window(Duration::minutes(30));
        assert_eq!(
            time_since_last_event(&history, UserActivityEventType::ClickedLink, now),
            10
        );
    }

    #[test]
    fn time_since_last_event_reports_missing() {
        let history = Vec::new();
        assert_eq!(
            time_since_last_event(&history, UserActivityEventType::PlayedMedia, Utc::now()),
            MISSING_VALUE
        );
    }

    #[test]
    fn history_window_excludes_old_events() {
        let tracker = UserActivityTracker::new();
        let now = Utc::now();
        tracker.record_event_at(UserActivityEventType::TypedUrl, now - Duration::minutes(45));
        tracker.record_event_at(UserActivityEventType::TypedUrl, now - Duration::minutes(5));

        let history = tracker.history_for_window(Duration::minutes(30));
        assert_eq!(history.len(), 1);
    }
}
