use crate::{
    error::{AdEventError, Result},
    placement::AdPlacementInfo,
};

pub const MAX_ID_LENGTH: usize = 128;

fn ensure_identifier(label: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(AdEventError::InvalidPlacement(format!(
            "{label} must not be empty"
        )));
    }
    if value.trim() != value {
        return Err(AdEventError::InvalidPlacement(format!(
            "{label} cannot include leading or trailing whitespace"
        )));
    }
    if value.len() > MAX_ID_LENGTH {
        return Err(AdEventError::InvalidPlacement(format!(
            "{label} cannot exceed {MAX_ID_LENGTH} characters"
        )));
    }
    Ok(())
}

pub fn ensure_placement_id(value: &str) -> Result<()> {
    ensure_identifier("placement_id", value)
}

pub fn ensure_creative_instance_id(value: &str) -> Result<()> {
    ensure_identifier("creative_instance_id", value)
}

/// Both ids must hold before a placement is allowed anywhere near the store.
pub fn ensure_placement(placement: &AdPlacementInfo) -> Result<()> {
    ensure_placement_id(&placement.placement_id)?;
    ensure_creative_instance_id(&placement.creative_instance_id)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_id_must_not_be_empty() {
        let err = ensure_placement_id("").unwrap_err();
        assert!(matches!(err, AdEventError::InvalidPlacement(_)));
    }

    #[test]
    fn placement_id_rejects_surrounding_whitespace() {
        let err = ensure_placement_id(" abc").unwrap_err();
        assert!(matches!(err, AdEventError::InvalidPlacement(_)));
    }

    #[test]
    fn placement_id_enforces_length_cap() {
        let oversized = "x".repeat(MAX_ID_LENGTH + 1);
        let err = ensure_placement_id(&oversized).unwrap_err();
        assert!(matches!(err, AdEventError::InvalidPlacement(_)));
    }

    #[test]
    fn creative_instance_id_must_not_be_empty() {
        let err = ensure_creative_instance_id("").unwrap_err();
        assert!(matches!(err, AdEventError::InvalidPlacement(_)));
    }
}
