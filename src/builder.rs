use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::placement::{AdDescriptor, AdPlacementInfo, AdType};

/// Ledger currency deposits are denominated in.
pub const DEPOSIT_CURRENCY: &str = "TKN";

/// Reward escrowed for a creative instance. Written once per placement,
/// before the first event, and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub creative_instance_id: String,
    pub value: f64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Attribution rule derived from the creative set. Written once per
/// placement alongside the deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversion {
    pub creative_set_id: String,
    pub conversion_type: String,
    pub url_pattern: String,
    pub advertiser_public_key: String,
    pub observation_window_days: u32,
    pub expire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

pub fn build_placement(
    placement_id: &str,
    ad_type: AdType,
    descriptor: AdDescriptor,
) -> AdPlacementInfo {
    AdPlacementInfo {
        placement_id: placement_id.to_string(),
        ad_type,
        creative_instance_id: descriptor.creative_instance_id,
        creative_set_id: descriptor.creative_set_id,
        campaign_id: descriptor.campaign_id,
        advertiser_id: descriptor.advertiser_id,
        target_url: descriptor.target_url,
        headline_text: descriptor.headline_text,
        description: descriptor.description,
        value: descriptor.value,
        conversion: descriptor.conversion,
    }
}

pub fn build_deposit(placement: &AdPlacementInfo) -> Deposit {
    Deposit {
        creative_instance_id: placement.creative_instance_id.clone(),
        value: placement.value,
        currency: DEPOSIT_CURRENCY.to_string(),
        created_at: Utc::now(),
    }
}

/// `None` when the descriptor carries no conversion attribution.
pub fn build_conversion(placement: &AdPlacementInfo) -> Option<Conversion> {
    let descriptor = placement.conversion.as_ref()?;
    Some(Conversion {
        creative_set_id: placement.creative_set_id.clone(),
        conversion_type: descriptor.conversion_type.clone(),
        url_pattern: descriptor.url_pattern.clone(),
        advertiser_public_key: descriptor.advertiser_public_key.clone(),
        observation_window_days: descriptor.observation_window_days,
        expire_at: descriptor.expire_at,
        created_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::placement::ConversionDescriptor;

    fn descriptor() -> AdDescriptor {
        AdDescriptor {
            creative_instance_id: "creative-1".into(),
            creative_set_id: "set-1".into(),
            campaign_id: "campaign-1".into(),
            advertiser_id: "advertiser-1".into(),
            target_url: "https://example.com/landing".into(),
            headline_text: "headline".into(),
            description: "description".into(),
            value: 0.05,
            conversion: Some(ConversionDescriptor {
                conversion_type: "postview".into(),
                url_pattern: "https://example.com/checkout/*".into(),
                advertiser_public_key: "pk".into(),
                observation_window_days: 30,
                expire_at: Utc::now(),
            }),
        }
    }

    #[test]
    fn placement_binds_descriptor_to_id_and_type() {
        let placement = build_placement("placement-1", AdType::SearchResult, descriptor());
        assert_eq!(placement.placement_id, "placement-1");
        assert_eq!(placement.ad_type, AdType::SearchResult);
        assert_eq!(placement.creative_instance_id, "creative-1");
    }

    #[test]
    fn deposit_carries_value_and_currency() {
        let placement = build_placement("placement-1", AdType::SearchResult, descriptor());
        let deposit = build_deposit(&placement);
        assert_eq!(deposit.creative_instance_id, "creative-1");
        assert_eq!(deposit.value, 0.05);
        assert_eq!(deposit.currency, DEPOSIT_CURRENCY);
    }

    #[test]
    fn conversion_is_derived_from_creative_set() {
        let placement = build_placement("placement-1", AdType::SearchResult, descriptor());
        let conversion = build_conversion(&placement).expect("descriptor carries a conversion");
        assert_eq!(conversion.creative_set_id, "set-1");
        assert_eq!(conversion.url_pattern, "https://example.com/checkout/*");
        assert_eq!(conversion.observation_window_days, 30);
    }

    #[test]
    fn conversion_is_absent_without_attribution() {
        let mut bare = descriptor();
        bare.conversion = None;
        let placement = build_placement("placement-1", AdType::SearchResult, bare);
        assert!(build_conversion(&placement).is_none());
    }
}
