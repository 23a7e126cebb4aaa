use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of ad surface a placement belongs to. Each kind keeps its own
/// section of the append-only event log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdType {
    SearchResult,
    NewTabPage,
    Notification,
}

impl AdType {
    pub fn as_str(self) -> &'static str {
        match self {
            AdType::SearchResult => "search_result",
            AdType::NewTabPage => "new_tab_page",
            AdType::Notification => "notification",
        }
    }
}

impl fmt::Display for AdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "search_result" => Ok(AdType::SearchResult),
            "new_tab_page" => Ok(AdType::NewTabPage),
            "notification" => Ok(AdType::Notification),
            other => Err(format!("unknown ad type '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdEventType {
    Served,
    Viewed,
    Clicked,
}

impl AdEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            AdEventType::Served => "served",
            AdEventType::Viewed => "viewed",
            AdEventType::Clicked => "clicked",
        }
    }
}

impl fmt::Display for AdEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AdEventType {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "served" => Ok(AdEventType::Served),
            "viewed" => Ok(AdEventType::Viewed),
            "clicked" => Ok(AdEventType::Clicked),
            other => Err(format!("unknown ad event type '{other}'")),
        }
    }
}

/// Conversion attribution carried by a creative: which landing URLs count,
/// how long after the impression they still attribute, and when the rule
/// stops applying.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionDescriptor {
    pub conversion_type: String,
    pub url_pattern: String,
    pub advertiser_public_key: String,
    pub observation_window_days: u32,
    pub expire_at: DateTime<Utc>,
}

/// Inbound ad payload as handed over by the serving surface, before it is
/// bound to a placement id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdDescriptor {
    pub creative_instance_id: String,
    pub creative_set_id: String,
    #[serde(default)]
    pub campaign_id: String,
    #[serde(default)]
    pub advertiser_id: String,
    #[serde(default)]
    pub target_url: String,
    #[serde(default)]
    pub headline_text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion: Option<ConversionDescriptor>,
}

/// One concrete showing of an ad: a descriptor bound to a placement id and
/// an ad type. `placement_id` and `creative_instance_id` must both be
/// non-empty before any event fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdPlacementInfo {
    pub placement_id: String,
    pub ad_type: AdType,
    pub creative_instance_id: String,
    pub creative_set_id: String,
    pub campaign_id: String,
    pub advertiser_id: String,
    pub target_url: String,
    pub headline_text: String,
    pub description: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversion: Option<ConversionDescriptor>,
}

impl AdPlacementInfo {
    pub fn is_valid(&self) -> bool {
        !self.placement_id.is_empty() && !self.creative_instance_id.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ad_type_round_trips_through_str() {
        for ad_type in [AdType::SearchResult, AdType::NewTabPage, AdType::Notification] {
            assert_eq!(ad_type.as_str().parse::<AdType>().unwrap(), ad_type);
        }
    }

    #[test]
    fn event_type_parsing_is_case_insensitive() {
        assert_eq!("Viewed".parse::<AdEventType>().unwrap(), AdEventType::Viewed);
        assert!("hovered".parse::<AdEventType>().is_err());
    }
}
